//! A local scripted chat provider for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use chatstream_model::{
    ChatProvider, ChatProviderError, ChatRequest, ChatResponse, Chunk,
    ErrorKind,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ChatProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestChatResponse {
    events: VecDeque<PresetEvent>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ChatResponse for TestChatResponse {
    type Error = crate::Error;

    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<Chunk>, Self::Error>> {
        let this = self.get_mut();

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            return match this.events.front() {
                None => Poll::Ready(Ok(None)),
                // Stays at the front so every later poll hangs as well.
                Some(PresetEvent::Hang) => Poll::Pending,
                Some(_) => match this.events.pop_front() {
                    Some(PresetEvent::Chunk(chunk)) => {
                        Poll::Ready(Ok(Some(chunk)))
                    }
                    _ => {
                        // A failed response delivers nothing afterwards.
                        this.events.clear();
                        Poll::Ready(Err(Error {
                            message: "connection dropped",
                            kind: ErrorKind::Transport,
                        }))
                    }
                },
            };
        }
        if matches!(this.events.front(), Some(PresetEvent::Hang)) {
            return Poll::Pending;
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_chunk(cx)
    }
}

#[derive(Default)]
struct Counters {
    // Number of queries answered with a response.
    served: AtomicUsize,
    // Failed attempts for the response that is up next.
    failed: AtomicU64,
    attempts: AtomicU64,
}

/// A local scripted provider for testing purpose.
///
/// Before sending queries, you need to setup the script, which is how the
/// provider should respond to each query. Every successful query consumes
/// the next response in the script. If there are no enough responses in
/// the script, an error will be returned.
///
/// Clones share their progress through the script.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestChatProvider {
    script: Vec<PresetResponse>,
    delay: Option<Duration>,
    counters: Arc<Counters>,
}

impl TestChatProvider {
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.script.push(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns how many times `send_query` has been called.
    #[inline]
    pub fn attempts(&self) -> u64 {
        self.counters.attempts.load(Ordering::Relaxed)
    }
}

impl ChatProvider for TestChatProvider {
    type Error = crate::Error;
    type Response = TestChatResponse;

    fn send_query(
        &self,
        _req: &ChatRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let counters = &self.counters;
        counters.attempts.fetch_add(1, Ordering::Relaxed);

        let result = 'blk: {
            let step_idx = counters.served.load(Ordering::Relaxed);
            let Some(preset) = self.script.get(step_idx) else {
                break 'blk Err(Error {
                    message: "no enough responses",
                    kind: ErrorKind::Other,
                });
            };

            if let Some(failures) = preset.failures {
                let failed = counters.failed.load(Ordering::Relaxed);
                if failures == 0 || failed < failures {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    break 'blk Err(Error {
                        message: "preset failure",
                        kind: ErrorKind::Transport,
                    });
                }
            }

            counters.served.fetch_add(1, Ordering::Relaxed);
            counters.failed.store(0, Ordering::Relaxed);
            Ok(TestChatResponse {
                events: preset.events.iter().cloned().collect(),
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                sleep: None,
            })
        };
        ready(result)
    }
}
