use std::fmt::{self, Display};
use std::time::{SystemTime, UNIX_EPOCH};

use chatstream_model::Chunk;

use crate::transcript::{Role, Transcript, Turn, TurnId, TurnStatus};

/// Where the current request is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No request in flight.
    #[default]
    Idle,
    /// The loading turn exists but has no chunks yet.
    AwaitingFirstChunk,
    /// At least one chunk has been applied to the loading turn.
    Streaming,
}

/// Why a response stream failed.
///
/// The reason is only for logs. Users see [`FailureReason::user_message`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// The provider or the transport failed.
    Provider(String),
    /// The caller cancelled the request.
    Cancelled,
    /// No chunk arrived within the idle timeout.
    TimedOut,
}

impl FailureReason {
    /// Returns the plain-language message shown in the transcript.
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureReason::Provider(_) => {
                "Sorry, I couldn't process your request. Please try again."
            }
            FailureReason::Cancelled => "The response was cancelled.",
            FailureReason::TimedOut => {
                "The assistant stopped responding. Please try again."
            }
        }
    }
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Provider(reason) => write!(f, "provider: {reason}"),
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::TimedOut => write!(f, "idle timeout"),
        }
    }
}

/// A transition the reducer refused. The transcript is left untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransitionError {
    /// The query is empty or only whitespace.
    EmptyQuery,
    /// Another request is still in flight.
    RequestInFlight,
    /// A stream event arrived while no request is in flight.
    NotInFlight,
}

impl Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::EmptyQuery => write!(f, "Empty query"),
            TransitionError::RequestInFlight => {
                write!(f, "A request is already in flight")
            }
            TransitionError::NotInFlight => write!(f, "No request in flight"),
        }
    }
}

impl std::error::Error for TransitionError {}

/// An input to the reducer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// The user submitted a query.
    Submit(String),
    /// A chunk of the response was decoded.
    Chunk(Chunk),
    /// The response stream ended.
    StreamEnd,
    /// The response stream failed.
    StreamError(FailureReason),
}

/// The state machine that owns the transcript.
///
/// Every method is a synchronous transition. A rejected transition
/// returns an error and changes nothing; an accepted one that affects the
/// transcript bumps [`Reducer::version`].
#[derive(Debug, Default)]
pub struct Reducer {
    transcript: Transcript,
    phase: Phase,
    loading: Option<TurnId>,
    next_seq: u64,
    version: u64,
}

impl Reducer {
    /// Creates a reducer with an empty transcript.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the transcript.
    #[inline]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Returns the current phase.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns `true` unless the reducer is idle.
    #[inline]
    pub fn is_request_in_flight(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Returns the number of transitions that changed the transcript.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Applies any event.
    pub fn apply(&mut self, event: Event) -> Result<(), TransitionError> {
        match event {
            Event::Submit(query) => self.submit(&query),
            Event::Chunk(chunk) => self.on_chunk(chunk),
            Event::StreamEnd => self.on_stream_end(),
            Event::StreamError(reason) => self.on_stream_error(&reason),
        }
    }

    /// Appends the user turn and a loading assistant turn.
    pub fn submit(&mut self, query: &str) -> Result<(), TransitionError> {
        if self.phase != Phase::Idle {
            return Err(TransitionError::RequestInFlight);
        }
        if query.trim().is_empty() {
            return Err(TransitionError::EmptyQuery);
        }

        let user_id = self.next_id(Role::User.as_str());
        self.transcript.push(Turn::user(user_id, query));
        let loading_id = self.next_id("loading");
        self.transcript.push(Turn::loading(loading_id.clone()));

        self.loading = Some(loading_id);
        self.phase = Phase::AwaitingFirstChunk;
        self.version += 1;
        Ok(())
    }

    /// Adds a chunk to the loading turn. The end marker is ignored.
    pub fn on_chunk(&mut self, chunk: Chunk) -> Result<(), TransitionError> {
        if chunk.is_end() {
            return Ok(());
        }
        let idx = self.loading_index()?;

        let turn = self.transcript.turn_mut(idx);
        match self.phase {
            // The first chunk replaces whatever placeholder the turn shows.
            Phase::AwaitingFirstChunk => turn.chunks = vec![chunk],
            _ => turn.chunks.push(chunk),
        }

        self.phase = Phase::Streaming;
        self.version += 1;
        Ok(())
    }

    /// Marks the loading turn as complete.
    pub fn on_stream_end(&mut self) -> Result<(), TransitionError> {
        let idx = self.loading_index()?;
        self.transcript.turn_mut(idx).status = TurnStatus::Complete;
        self.finish();
        Ok(())
    }

    /// Replaces the loading turn with a turn holding one error chunk.
    pub fn on_stream_error(
        &mut self,
        reason: &FailureReason,
    ) -> Result<(), TransitionError> {
        let idx = self.loading_index()?;
        debug!("response failed: {reason}");

        self.transcript.remove(idx);
        let error_id = self.next_id("error");
        self.transcript
            .push(Turn::failed(error_id, reason.user_message()));
        self.finish();
        Ok(())
    }

    fn loading_index(&self) -> Result<usize, TransitionError> {
        let Some(id) = &self.loading else {
            return Err(TransitionError::NotInFlight);
        };
        let idx = self.transcript.position(id);
        debug_assert!(idx.is_some(), "loading turn {id} is missing");
        idx.ok_or(TransitionError::NotInFlight)
    }

    #[inline]
    fn finish(&mut self) {
        self.loading = None;
        self.phase = Phase::Idle;
        self.version += 1;
    }

    fn next_id(&mut self, tag: &str) -> TurnId {
        self.next_seq += 1;
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        TurnId::new(now_ms, self.next_seq, tag)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chatstream_model::{ChunkBody, ChunkKind};

    use super::*;

    fn chunks() -> Vec<Chunk> {
        vec![
            Chunk::content("supervisor", "c1"),
            Chunk::tool_output("calendar", "c2"),
            Chunk::content("supervisor", "c3"),
        ]
    }

    fn run(events: impl IntoIterator<Item = Event>) -> Reducer {
        let mut reducer = Reducer::new();
        for event in events {
            reducer.apply(event).unwrap();
        }
        reducer
    }

    #[test]
    fn test_submit() {
        let mut reducer = Reducer::new();
        reducer.submit("What's on my calendar?").unwrap();
        assert_eq!(reducer.phase(), Phase::AwaitingFirstChunk);
        assert!(reducer.is_request_in_flight());

        let transcript = reducer.transcript();
        assert_eq!(transcript.len(), 2);
        let user = transcript.get(0).unwrap();
        assert_eq!(user.role(), Role::User);
        assert_eq!(user.status(), TurnStatus::Complete);
        assert_eq!(user.chunks(), [Chunk::content(
            "user",
            "What's on my calendar?"
        )]);
        let assistant = transcript.get(1).unwrap();
        assert_eq!(assistant.role(), Role::Assistant);
        assert!(assistant.is_loading());
        assert!(assistant.chunks().is_empty());
    }

    #[test]
    fn test_rejected_submissions() {
        let mut reducer = Reducer::new();
        assert_eq!(reducer.submit("   \n"), Err(TransitionError::EmptyQuery));
        assert!(reducer.transcript().is_empty());
        assert_eq!(reducer.version(), 0);

        reducer.submit("first").unwrap();
        assert_eq!(
            reducer.submit("second"),
            Err(TransitionError::RequestInFlight)
        );
        assert_eq!(reducer.transcript().len(), 2);
        assert_eq!(reducer.version(), 1);
    }

    #[test]
    fn test_first_chunk_then_append() {
        let mut reducer = Reducer::new();
        reducer.submit("Hi").unwrap();
        for chunk in chunks() {
            reducer.on_chunk(chunk).unwrap();
            assert_eq!(reducer.phase(), Phase::Streaming);
            assert!(reducer.transcript().last().unwrap().is_loading());
        }
        assert_eq!(reducer.transcript().last().unwrap().chunks(), chunks());

        reducer.on_stream_end().unwrap();
        let turn = reducer.transcript().last().unwrap();
        assert_eq!(turn.status(), TurnStatus::Complete);
        assert_eq!(turn.chunks(), chunks());
        assert_eq!(reducer.phase(), Phase::Idle);
        assert!(reducer.transcript().loading_turn().is_none());
    }

    #[test]
    fn test_end_chunk_is_inert() {
        let mut with_end = vec![Event::Submit("Hi".to_owned())];
        with_end.extend(chunks().into_iter().map(Event::Chunk));
        let mut without_end = with_end.clone();
        with_end.push(Event::Chunk(Chunk::end()));
        with_end.push(Event::StreamEnd);
        without_end.push(Event::StreamEnd);

        let a = run(with_end);
        let b = run(without_end);
        let strip_ids = |r: &Reducer| {
            r.transcript()
                .turns()
                .map(|t| (t.role(), t.status(), t.chunks().to_vec()))
                .collect::<Vec<_>>()
        };
        assert_eq!(strip_ids(&a), strip_ids(&b));
        assert_eq!(a.version(), b.version());
        assert!(
            a.transcript()
                .turns()
                .flat_map(|t| t.chunks())
                .all(|c| c.kind() != ChunkKind::End)
        );
    }

    #[test]
    fn test_end_before_first_chunk() {
        let mut reducer = Reducer::new();
        reducer.submit("Hi").unwrap();
        reducer.on_chunk(Chunk::end()).unwrap();
        assert_eq!(reducer.phase(), Phase::AwaitingFirstChunk);
        reducer.on_stream_end().unwrap();

        let turn = reducer.transcript().last().unwrap();
        assert_eq!(turn.status(), TurnStatus::Complete);
        assert!(turn.chunks().is_empty());
    }

    #[test]
    fn test_error_replaces_loading_turn() {
        let mut reducer = Reducer::new();
        for query in ["one", "two"] {
            reducer.submit(query).unwrap();
            reducer.on_chunk(Chunk::content("assistant", "ok")).unwrap();
            reducer.on_stream_end().unwrap();
        }
        let prior = reducer.transcript().len();

        reducer.submit("three").unwrap();
        reducer.on_chunk(Chunk::content("assistant", "partial")).unwrap();
        reducer
            .on_stream_error(&FailureReason::Provider(
                "connection reset by peer".to_owned(),
            ))
            .unwrap();

        let transcript = reducer.transcript();
        assert_eq!(transcript.len(), prior + 2);
        assert!(transcript.loading_turn().is_none());
        let failed = transcript.last().unwrap();
        assert_eq!(failed.role(), Role::Assistant);
        assert_eq!(failed.status(), TurnStatus::Error);
        assert_eq!(failed.chunks().len(), 1);
        let ChunkBody::Error(message) = &failed.chunks()[0].body else {
            panic!("not an error chunk");
        };
        assert!(!message.contains("connection reset"));
        assert_eq!(reducer.phase(), Phase::Idle);

        // The session stays usable.
        reducer.submit("four").unwrap();
        assert_eq!(reducer.transcript().len(), prior + 4);
    }

    #[test]
    fn test_events_without_request() {
        let mut reducer = Reducer::new();
        assert_eq!(
            reducer.on_chunk(Chunk::content("assistant", "stray")),
            Err(TransitionError::NotInFlight)
        );
        assert_eq!(reducer.on_stream_end(), Err(TransitionError::NotInFlight));
        assert_eq!(
            reducer.on_stream_error(&FailureReason::Cancelled),
            Err(TransitionError::NotInFlight)
        );
        assert!(reducer.transcript().is_empty());

        reducer.submit("Hi").unwrap();
        reducer.on_stream_end().unwrap();
        assert_eq!(reducer.on_stream_end(), Err(TransitionError::NotInFlight));
        assert_eq!(
            reducer.transcript().last().unwrap().status(),
            TurnStatus::Complete
        );
    }

    #[test]
    fn test_turn_ids_are_unique() {
        let mut reducer = Reducer::new();
        for _ in 0..3 {
            reducer.submit("Hi").unwrap();
            reducer.on_stream_error(&FailureReason::TimedOut).unwrap();
        }
        let ids = reducer
            .transcript()
            .turns()
            .map(|t| t.id().clone())
            .collect::<HashSet<_>>();
        assert_eq!(ids.len(), 6);
    }
}
