use std::pin::Pin;
use std::task::{self, Poll};

use crate::chunk::Chunk;
use crate::provider::ChatProviderError;

/// A streamed response from the chat provider.
pub trait ChatResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ChatProviderError;

    /// Attempts to pull out the next chunk from the response.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next chunk. Implementations will ensure that the current
    ///   task will be notified when the next chunk may be ready.
    /// - `Poll::Ready(Ok(Some(chunk)))` means the response has a chunk
    ///   to deliver. An [`End`](crate::ChunkBody::End) chunk is the last
    ///   one a response delivers.
    /// - `Poll::Ready(Ok(None))` means the underlying stream is exhausted,
    ///   whether or not an `End` chunk was seen.
    /// - `Poll::Ready(Err(error))` means the transport failed. Payloads
    ///   that merely fail to decode are not errors; implementations skip
    ///   them.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<Chunk>, Self::Error>>;
}
