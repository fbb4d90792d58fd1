//! Transcript-related types.

use std::fmt::{self, Display};
use std::sync::Arc;

use chatstream_model::Chunk;

use crate::grouping::{ChunkGroup, group_chunks};

/// Who a turn belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// The person typing queries.
    User,
    /// The assistant answering them.
    Assistant,
}

impl Role {
    /// Returns the role name, which doubles as the default chunk source.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// The lifecycle status of a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TurnStatus {
    /// The response is still streaming.
    Loading,
    /// The turn is final.
    Complete,
    /// The response failed; the turn holds a single error chunk.
    Error,
}

impl TurnStatus {
    /// Returns `true` for statuses a turn never leaves.
    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(self, TurnStatus::Loading)
    }
}

/// Identifies a turn within a transcript.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(String);

impl TurnId {
    #[inline]
    pub(crate) fn new(created_at_ms: u128, seq: u64, tag: &str) -> Self {
        Self(format!("{created_at_ms}-{seq}-{tag}"))
    }

    /// Returns the id as a string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One message in the transcript, either the user's query or the
/// assistant's response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub(crate) id: TurnId,
    pub(crate) role: Role,
    pub(crate) status: TurnStatus,
    pub(crate) chunks: Vec<Chunk>,
}

impl Turn {
    #[inline]
    pub(crate) fn user(id: TurnId, query: &str) -> Self {
        Self {
            id,
            role: Role::User,
            status: TurnStatus::Complete,
            chunks: vec![Chunk::content(Role::User.as_str(), query)],
        }
    }

    #[inline]
    pub(crate) fn loading(id: TurnId) -> Self {
        Self {
            id,
            role: Role::Assistant,
            status: TurnStatus::Loading,
            chunks: vec![],
        }
    }

    #[inline]
    pub(crate) fn failed(id: TurnId, message: &str) -> Self {
        Self {
            id,
            role: Role::Assistant,
            status: TurnStatus::Error,
            chunks: vec![Chunk::error(Role::Assistant.as_str(), message)],
        }
    }

    /// Returns the id of this turn.
    #[inline]
    pub fn id(&self) -> &TurnId {
        &self.id
    }

    /// Returns the role of this turn.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the status of this turn.
    #[inline]
    pub fn status(&self) -> TurnStatus {
        self.status
    }

    /// Returns the chunks in arrival order.
    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Returns `true` while the response for this turn is streaming.
    #[inline]
    pub fn is_loading(&self) -> bool {
        self.status == TurnStatus::Loading
    }

    /// Partitions the chunks into runs by source, see [`group_chunks`].
    #[inline]
    pub fn groups(&self) -> Vec<ChunkGroup<'_>> {
        group_chunks(&self.chunks)
    }
}

/// The ordered turns of the current session.
///
/// Turns are shared between the transcript and its snapshots. Updating a
/// turn that a snapshot still holds creates a new turn value, so
/// snapshots never change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Arc<Turn>>,
}

impl Transcript {
    /// Returns the number of turns.
    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns `true` if there are no turns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Iterates over the turns in order.
    #[inline]
    pub fn turns(&self) -> impl ExactSizeIterator<Item = &Turn> + '_ {
        self.turns.iter().map(AsRef::as_ref)
    }

    /// Returns the turn at `idx`.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Turn> {
        self.turns.get(idx).map(AsRef::as_ref)
    }

    /// Returns the last turn.
    #[inline]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last().map(AsRef::as_ref)
    }

    /// Looks up a turn by id.
    pub fn find(&self, id: &TurnId) -> Option<&Turn> {
        self.turns().find(|turn| &turn.id == id)
    }

    /// Returns the turn whose response is streaming, if any.
    pub fn loading_turn(&self) -> Option<&Turn> {
        self.turns().find(|turn| turn.is_loading())
    }

    #[inline]
    pub(crate) fn position(&self, id: &TurnId) -> Option<usize> {
        self.turns.iter().position(|turn| &turn.id == id)
    }

    #[inline]
    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(Arc::new(turn));
    }

    #[inline]
    pub(crate) fn remove(&mut self, idx: usize) -> Arc<Turn> {
        self.turns.remove(idx)
    }

    #[inline]
    pub(crate) fn turn_mut(&mut self, idx: usize) -> &mut Turn {
        Arc::make_mut(&mut self.turns[idx])
    }
}

/// An immutable view of the transcript, published after every transition.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    version: u64,
    in_flight: bool,
    transcript: Arc<Transcript>,
}

impl Snapshot {
    #[inline]
    pub(crate) fn new(version: u64, in_flight: bool, transcript: Transcript) -> Self {
        Self {
            version,
            in_flight,
            transcript: Arc::new(transcript),
        }
    }

    /// Returns the number of transitions applied before this snapshot.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns `true` if a request was in flight when this snapshot was
    /// taken.
    #[inline]
    pub fn is_request_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Returns the transcript.
    #[inline]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }
}
