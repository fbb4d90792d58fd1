use chatstream_model::Chunk;
use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    /// Delivers a chunk.
    #[serde(rename = "chunk")]
    Chunk(Chunk),
    /// Fails the response as if the connection dropped.
    #[serde(rename = "transport_error")]
    TransportError,
    /// Never delivers anything again.
    #[serde(rename = "hang")]
    Hang,
}

/// The preset response for one query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the query will fail in the first `failures` attempts.
    /// `Some(0)` means the query will fail infinitely.
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
        }
    }

    /// Creates a `PresetResponse` that delivers `chunks` followed by the
    /// end marker.
    pub fn with_chunks(chunks: impl IntoIterator<Item = Chunk>) -> Self {
        let events = chunks
            .into_iter()
            .chain([Chunk::end()])
            .map(PresetEvent::Chunk)
            .collect::<Vec<_>>();
        Self::with_events(events)
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }
}
