use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use chatstream_model::{
    ChatProvider, ChatProviderError, ChatRequest, ChatResponse, Chunk,
};
use tokio::select;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::Instrument;

use crate::reducer::FailureReason;

const INITIAL_RETRY_INTERVAL: Duration = Duration::from_millis(250);
const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(5);

type StreamResult = Result<(), FailureReason>;
type BoxedStreamFuture = Pin<Box<dyn Future<Output = StreamResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ChatRequest, StreamOptions, watch::Receiver<bool>, Box<dyn FnMut(Chunk) + Send>)
        -> BoxedStreamFuture + Send + Sync
>;

/// Limits applied to one request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamOptions {
    /// Fails the request when the provider stays silent for this long.
    pub idle_timeout: Option<Duration>,
    /// How many times a retryable connect failure is retried.
    pub connect_retries: u32,
}

/// A wrapper around a chat provider that drives one response to its end
/// and provides a type-erased interface for the other modules.
#[derive(Clone)]
pub struct StreamClient {
    handler_fn: HandlerFn,
}

impl StreamClient {
    #[inline]
    pub fn new<P: ChatProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `StreamClient` doesn't have a
        // generic parameter and we don't want it either.
        let provider = Arc::new(provider);
        let handler_fn: HandlerFn =
            Arc::new(move |req, options, cancel_rx, on_chunk| {
                let provider = Arc::clone(&provider);
                Box::pin(
                    async move {
                        trace!("got a request: {:?}", req);
                        handle_request(provider, req, options, cancel_rx, on_chunk)
                            .await
                    }
                    .instrument(trace_span!("chat request")),
                )
            });
        Self { handler_fn }
    }

    /// Streams the response to `req`, handing every chunk (the end marker
    /// included) to `on_chunk` in arrival order.
    ///
    /// Returns `Ok(())` once the end marker arrives or the stream is
    /// exhausted. Setting the value behind `cancel_rx` to `true`, or
    /// dropping its sender, stops reading and fails the request with
    /// [`FailureReason::Cancelled`].
    #[inline]
    pub async fn stream(
        &self,
        req: ChatRequest,
        options: StreamOptions,
        cancel_rx: watch::Receiver<bool>,
        on_chunk: impl FnMut(Chunk) + Send + 'static,
    ) -> StreamResult {
        (self.handler_fn)(req, options, cancel_rx, Box::new(on_chunk)).await
    }
}

async fn handle_request<P: ChatProvider + 'static>(
    provider: Arc<P>,
    req: ChatRequest,
    options: StreamOptions,
    mut cancel_rx: watch::Receiver<bool>,
    mut on_chunk: Box<dyn FnMut(Chunk) + Send>,
) -> StreamResult {
    let resp = connect(&*provider, &req, options, &mut cancel_rx).await?;

    trace!("start receiving chunks");

    let mut pinned_resp = pin!(resp);
    loop {
        let next_chunk = poll_fn(|cx| pinned_resp.as_mut().poll_next_chunk(cx));
        let chunk_or_err = select! {
            biased;

            _ = cancelled(&mut cancel_rx) => {
                debug!("request cancelled while streaming");
                return Err(FailureReason::Cancelled);
            }
            res = with_idle_timeout(options.idle_timeout, next_chunk) => {
                res.ok_or(FailureReason::TimedOut)?
            }
        };

        let chunk = match chunk_or_err {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                debug!("stream exhausted without an end marker");
                break;
            }
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(FailureReason::Provider(format!("{err}")));
            }
        };
        trace!("got a chunk: {chunk:?}");

        let is_end = chunk.is_end();
        on_chunk(chunk);
        if is_end {
            break;
        }
    }

    trace!("finished a request");
    Ok(())
}

async fn connect<P: ChatProvider>(
    provider: &P,
    req: &ChatRequest,
    options: StreamOptions,
    cancel_rx: &mut watch::Receiver<bool>,
) -> Result<P::Response, FailureReason> {
    let mut backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(INITIAL_RETRY_INTERVAL)
        .with_max_interval(MAX_RETRY_INTERVAL)
        .with_max_elapsed_time(None)
        .build();
    let mut retries = 0;

    loop {
        let resp_fut = provider.send_query(req);
        let resp_or_err = select! {
            biased;

            _ = cancelled(cancel_rx) => {
                debug!("request cancelled while connecting");
                return Err(FailureReason::Cancelled);
            }
            res = with_idle_timeout(options.idle_timeout, resp_fut) => {
                res.ok_or(FailureReason::TimedOut)?
            }
        };

        let err = match resp_or_err {
            Ok(resp) => return Ok(resp),
            Err(err) => err,
        };
        if !err.kind().is_retryable() || retries >= options.connect_retries {
            error!("got an error: {err:?}");
            return Err(FailureReason::Provider(format!("{err}")));
        }

        retries += 1;
        let delay = backoff.next_backoff().unwrap_or(MAX_RETRY_INTERVAL);
        warn!("request failed ({err}), retry {retries} in {delay:?}");
        select! {
            biased;

            _ = cancelled(cancel_rx) => return Err(FailureReason::Cancelled),
            _ = sleep(delay) => {}
        }
    }
}

/// Resolves once cancellation is requested or the sender is gone.
async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    let _ = cancel_rx.wait_for(|cancelled| *cancelled).await;
}

async fn with_idle_timeout<F: Future>(
    idle_timeout: Option<Duration>,
    fut: F,
) -> Option<F::Output> {
    match idle_timeout {
        Some(duration) => timeout(duration, fut).await.ok(),
        None => Some(fut.await),
    }
}
