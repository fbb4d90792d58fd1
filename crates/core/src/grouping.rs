//! Display projections over a turn's chunks.

use chatstream_model::{Chunk, ChunkBody};

/// Number of characters kept in a collapsed tool output preview.
pub const PREVIEW_LEN: usize = 160;

/// Appended to a preview that had to be cut.
pub const ELLIPSIS: &str = "…";

/// A run of consecutive chunks from the same source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkGroup<'a> {
    /// The source shared by every chunk in this group.
    pub source: &'a str,
    /// The chunks, in their original order.
    pub chunks: &'a [Chunk],
}

/// Partitions `chunks` into runs of consecutive chunks with the same
/// source.
///
/// Groups come in the order their first chunk appears and keep the
/// original chunk order, so concatenating them yields `chunks` again. A
/// source that shows up twice with something in between forms two
/// groups.
pub fn group_chunks(chunks: &[Chunk]) -> Vec<ChunkGroup<'_>> {
    chunks
        .chunk_by(|a, b| a.source == b.source)
        .map(|run| ChunkGroup {
            source: &run[0].source,
            chunks: run,
        })
        .collect()
}

/// How a chunk should be displayed when space is limited.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollapseHint {
    /// Whether the chunk starts out collapsed.
    pub collapsed: bool,
    /// Text to show while collapsed.
    pub preview: String,
    /// Whether `preview` is shorter than the full text.
    pub truncated: bool,
}

/// Returns the collapse hint for tool outputs, `None` for other kinds.
pub fn collapse_hint(chunk: &Chunk) -> Option<CollapseHint> {
    let ChunkBody::ToolOutput(text) = &chunk.body else {
        return None;
    };
    let (preview, truncated) = match text.char_indices().nth(PREVIEW_LEN) {
        Some((cut, _)) => (format!("{}{ELLIPSIS}", &text[..cut]), true),
        None => (text.clone(), false),
    };
    Some(CollapseHint {
        collapsed: true,
        preview,
        truncated,
    })
}
