use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The source assumed for chunks that don't name their producer.
pub const DEFAULT_SOURCE: &str = "assistant";

/// The kind of a [`Chunk`], without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Regular text produced by an agent.
    Content,
    /// Text returned by a tool the agent ran.
    ToolOutput,
    /// A function the agent wants to call (or has called).
    FunctionCall,
    /// A failure to be shown to the user.
    Error,
    /// The end-of-stream sentinel.
    End,
}

/// Describes a function call made by an agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// The name of the function.
    pub name: String,
    /// The argument pairs passed to the function.
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Whether the user may trigger this call from the view.
    #[serde(default)]
    pub executable: bool,
}

/// The payload of a [`Chunk`], tagged by its kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum ChunkBody {
    /// Regular text produced by an agent.
    Content(String),
    /// Text returned by a tool the agent ran.
    ToolOutput(String),
    /// A function call.
    FunctionCall(FunctionCall),
    /// A failure to be shown to the user.
    Error(String),
    /// The end-of-stream sentinel. It carries nothing and never ends up
    /// in a transcript.
    End,
}

/// One decoded unit of a streamed response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The agent or node that produced this chunk.
    pub source: String,
    /// The payload.
    #[serde(flatten)]
    pub body: ChunkBody,
}

impl Chunk {
    /// Creates a chunk with the given source and body.
    #[inline]
    pub fn new<S: Into<String>>(source: S, body: ChunkBody) -> Self {
        Self {
            source: source.into(),
            body,
        }
    }

    /// Creates a `Content` chunk.
    #[inline]
    pub fn content<S: Into<String>, T: Into<String>>(source: S, text: T) -> Self {
        Self::new(source, ChunkBody::Content(text.into()))
    }

    /// Creates a `ToolOutput` chunk.
    #[inline]
    pub fn tool_output<S: Into<String>, T: Into<String>>(
        source: S,
        text: T,
    ) -> Self {
        Self::new(source, ChunkBody::ToolOutput(text.into()))
    }

    /// Creates a `FunctionCall` chunk.
    #[inline]
    pub fn function_call<S: Into<String>>(source: S, call: FunctionCall) -> Self {
        Self::new(source, ChunkBody::FunctionCall(call))
    }

    /// Creates an `Error` chunk.
    #[inline]
    pub fn error<S: Into<String>, T: Into<String>>(source: S, text: T) -> Self {
        Self::new(source, ChunkBody::Error(text.into()))
    }

    /// Creates the end-of-stream sentinel.
    #[inline]
    pub fn end() -> Self {
        Self::new(DEFAULT_SOURCE, ChunkBody::End)
    }

    /// Returns the kind of this chunk.
    pub fn kind(&self) -> ChunkKind {
        match self.body {
            ChunkBody::Content(_) => ChunkKind::Content,
            ChunkBody::ToolOutput(_) => ChunkKind::ToolOutput,
            ChunkBody::FunctionCall(_) => ChunkKind::FunctionCall,
            ChunkBody::Error(_) => ChunkKind::Error,
            ChunkBody::End => ChunkKind::End,
        }
    }

    /// Returns `true` for the end-of-stream sentinel.
    #[inline]
    pub fn is_end(&self) -> bool {
        matches!(self.body, ChunkBody::End)
    }

    /// Returns the text body, if this kind carries one.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ChunkBody::Content(text)
            | ChunkBody::ToolOutput(text)
            | ChunkBody::Error(text) => Some(text),
            ChunkBody::FunctionCall(_) | ChunkBody::End => None,
        }
    }
}
