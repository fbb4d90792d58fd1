use std::fmt::{self, Display};

use chatstream_model::{Chunk, ChunkBody, DEFAULT_SOURCE, FunctionCall};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const DATA_FIELD: &str = "data:";

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireKind {
    #[serde(alias = "AIMessage")]
    Content,
    #[serde(alias = "ToolMessage")]
    ToolOutput,
    FunctionCall,
    Error,
    End,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Map<String, Value>,
    #[serde(default, alias = "canExecute")]
    executable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
struct WireChunk {
    #[serde(alias = "type")]
    kind: WireKind,
    #[serde(default, alias = "node")]
    source: Option<String>,
    #[serde(default, alias = "value")]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<WireFunctionCall>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueryBody<'a> {
    pub query: &'a str,
}

/// Why a frame could not be turned into a [`Chunk`].
///
/// Decode errors are local to one frame. Readers log them and move on to
/// the next frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame has no `data:` field.
    MissingData,
    /// The payload is not a recognized JSON object.
    InvalidPayload(String),
    /// The payload lacks a field its kind requires.
    MissingField(&'static str),
}

impl DecodeError {
    /// Returns `true` for frames that carry no payload at all, such as
    /// keep-alive comments. Those are routine, not malformed.
    #[inline]
    pub fn is_empty_frame(&self) -> bool {
        matches!(self, DecodeError::MissingData)
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MissingData => write!(f, "frame has no data field"),
            DecodeError::InvalidPayload(reason) => {
                write!(f, "invalid payload: {reason}")
            }
            DecodeError::MissingField(field) => {
                write!(f, "payload is missing `{field}`")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decodes one frame into a chunk.
///
/// Every `data:` line contributes to the payload (joined by line feeds),
/// comment lines starting with `:` and other fields are ignored.
pub fn decode_frame(frame: &str) -> Result<Chunk, DecodeError> {
    let mut data: Option<String> = None;
    for line in frame.lines() {
        let Some(value) = line.strip_prefix(DATA_FIELD) else {
            continue;
        };
        let value = value.trim_start();
        match &mut data {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => data = Some(value.to_owned()),
        }
    }
    let data = data.ok_or(DecodeError::MissingData)?;

    let wire = serde_json::from_str::<WireChunk>(&data)
        .map_err(|err| DecodeError::InvalidPayload(format!("{err}")))?;
    create_chunk(wire)
}

// -----------
// Conversions
// -----------

fn create_chunk(wire: WireChunk) -> Result<Chunk, DecodeError> {
    let source = wire
        .source
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SOURCE.to_owned());
    let body = match wire.kind {
        WireKind::End => return Ok(Chunk::end()),
        WireKind::Content => ChunkBody::Content(required_content(wire.content)?),
        WireKind::ToolOutput => {
            ChunkBody::ToolOutput(required_content(wire.content)?)
        }
        WireKind::Error => ChunkBody::Error(required_content(wire.content)?),
        WireKind::FunctionCall => {
            let call = wire
                .function_call
                .ok_or(DecodeError::MissingField("function_call"))?;
            ChunkBody::FunctionCall(FunctionCall {
                name: call.name,
                arguments: call.arguments,
                executable: call.executable,
            })
        }
    };
    Ok(Chunk::new(source, body))
}

#[inline]
fn required_content(content: Option<String>) -> Result<String, DecodeError> {
    content.ok_or(DecodeError::MissingField("content"))
}
