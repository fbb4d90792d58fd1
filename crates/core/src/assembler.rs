mod builder;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chatstream_model::{ChatRequest, Chunk};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::reducer::{Event, FailureReason, Reducer, TransitionError};
use crate::stream_client::{StreamClient, StreamOptions};
use crate::transcript::Snapshot;
pub use builder::AssemblerBuilder;

type OnChange = Box<dyn Fn(&Snapshot) + Send + Sync>;

/// The streaming transcript assembler.
///
/// It owns the transcript, sends each submitted query to the provider and
/// folds the streamed chunks into the transcript. Every transition is
/// published as an immutable [`Snapshot`].
///
/// At most one request is in flight. Submissions made meanwhile are
/// rejected instead of queued.
///
/// Cloned handles share the same session. Dropping the last handle aborts
/// the in-flight request.
#[derive(Clone)]
pub struct Assembler {
    inner: Arc<Inner>,
}

struct Inner {
    client: StreamClient,
    options: StreamOptions,
    state: Mutex<State>,
    snapshot_tx: watch::Sender<Snapshot>,
    on_change: Option<OnChange>,
}

#[derive(Default)]
struct State {
    reducer: Reducer,
    request: Option<InFlight>,
    next_request_id: u64,
}

struct InFlight {
    id: u64,
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Assembler {
    /// Submits a query and starts streaming its response.
    ///
    /// Empty queries and queries submitted while another request is in
    /// flight are rejected without touching the transcript. Callers may
    /// ignore the error.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn submit_query(&self, query: &str) -> Result<(), TransitionError> {
        let mut state = self.inner.lock_state();
        if let Err(err) = state.reducer.submit(query) {
            debug!("query rejected: {err}");
            return Err(err);
        }

        state.next_request_id += 1;
        let id = state.next_request_id;
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(run_request(
            Arc::downgrade(&self.inner),
            self.inner.client.clone(),
            self.inner.options,
            id,
            ChatRequest::new(query),
            cancel_rx,
        ));
        state.request = Some(InFlight {
            id,
            cancel_tx,
            task,
        });

        self.inner.publish(&state);
        Ok(())
    }

    /// Returns the snapshot of the latest transition.
    #[inline]
    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Returns `true` if a response is being streamed.
    #[inline]
    pub fn is_request_in_flight(&self) -> bool {
        self.inner.lock_state().reducer.is_request_in_flight()
    }

    /// Subscribes to snapshot changes.
    ///
    /// The receiver only keeps the latest snapshot, so fast transitions may
    /// be coalesced. Use [`AssemblerBuilder::on_change`] to observe every
    /// transition.
    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Cancels the in-flight request.
    ///
    /// The loading turn is replaced with an error turn right away. Returns
    /// `false` if there was nothing to cancel.
    pub fn cancel(&self) -> bool {
        let mut state = self.inner.lock_state();
        let Some(request) = state.request.take() else {
            return false;
        };
        debug!("cancelling request {}", request.id);

        // The task stops at its next suspension point. Anything it still
        // reports is ignored, since the request is no longer current.
        request.cancel_tx.send_replace(true);
        if let Err(err) =
            state.reducer.on_stream_error(&FailureReason::Cancelled)
        {
            error!("failed to cancel request {}: {err}", request.id);
        }
        self.inner.publish(&state);
        true
    }
}

impl Assembler {
    fn from_builder(builder: AssemblerBuilder) -> Self {
        let AssemblerBuilder {
            client,
            options,
            on_change,
        } = builder;

        let inner = Inner {
            client,
            options,
            state: Default::default(),
            snapshot_tx: watch::Sender::new(Snapshot::default()),
            on_change,
        };
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl Inner {
    #[inline]
    fn lock_state(&self) -> MutexGuard<'_, State> {
        // The state is consistent after every transition, so a panic in
        // another thread leaves nothing half-done.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies an event reported by request `id`.
    fn dispatch(&self, id: u64, event: Event) {
        let mut state = self.lock_state();
        if state.request.as_ref().map(|r| r.id) != Some(id) {
            trace!("dropping event of stale request {id}");
            return;
        }

        let finished = matches!(event, Event::StreamEnd | Event::StreamError(_));
        let version = state.reducer.version();
        if let Err(err) = state.reducer.apply(event) {
            error!("failed to apply event of request {id}: {err}");
        }
        if finished {
            trace!("request {id} finished");
            state.request = None;
        }
        if state.reducer.version() != version {
            self.publish(&state);
        }
    }

    /// Publishes the current state. Must be called with the state locked,
    /// so notifications are delivered in transition order.
    fn publish(&self, state: &State) {
        let reducer = &state.reducer;
        let snapshot = Snapshot::new(
            reducer.version(),
            reducer.is_request_in_flight(),
            reducer.transcript().clone(),
        );
        self.snapshot_tx.send_replace(snapshot.clone());
        if let Some(on_change) = &self.on_change {
            on_change(&snapshot);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(request) = state.request.take() {
            debug!("assembler dropped, aborting request {}", request.id);
            request.task.abort();
        }
    }
}

async fn run_request(
    inner: Weak<Inner>,
    client: StreamClient,
    options: StreamOptions,
    id: u64,
    req: ChatRequest,
    cancel_rx: watch::Receiver<bool>,
) {
    let on_chunk = {
        let inner = inner.clone();
        move |chunk: Chunk| {
            if let Some(inner) = inner.upgrade() {
                inner.dispatch(id, Event::Chunk(chunk));
            }
        }
    };
    let result = client.stream(req, options, cancel_rx, on_chunk).await;

    let Some(inner) = inner.upgrade() else {
        return;
    };
    let event = match result {
        Ok(()) => Event::StreamEnd,
        Err(reason) => Event::StreamError(reason),
    };
    inner.dispatch(id, event);
}
