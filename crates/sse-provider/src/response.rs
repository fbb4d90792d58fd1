use std::pin::Pin;
use std::task::{Context, Poll, ready};

use chatstream_model::{ChatResponse, Chunk, ErrorKind};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::FrameReader;
use crate::proto;

struct PartialState {
    frames: FrameReader,
    // Frames dropped because they couldn't be decoded. Only reported in logs.
    decode_failures: usize,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextChunk = Result<(Option<Chunk>, PartialState), Error>;

pin_project! {
    /// A response whose chunks are decoded from server-sent event frames.
    pub struct SseResponse {
        next_chunk_fut: Option<PinnedFuture<NextChunk>>,
    }
}

impl SseResponse {
    /// Creates a response that reads chunks from `frames`.
    #[inline]
    pub fn from_frames(frames: FrameReader) -> Self {
        let partial_state = PartialState {
            frames,
            decode_failures: 0,
        };
        Self::resume(partial_state)
    }

    #[inline]
    fn resume(partial_state: PartialState) -> Self {
        let next_chunk_fut = async move { next_chunk(partial_state).await };
        Self {
            next_chunk_fut: Some(Box::pin(next_chunk_fut)),
        }
    }
}

impl ChatResponse for SseResponse {
    type Error = crate::Error;

    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<Chunk>, Self::Error>> {
        let this = self.project();
        let Some(next_chunk_fut) = this.next_chunk_fut else {
            return Poll::Ready(Ok(None));
        };
        let (chunk, partial_state) =
            match ready!(next_chunk_fut.as_mut().poll(cx)) {
                Ok((Some(chunk), partial_state)) => (chunk, partial_state),
                Ok((None, partial_state)) => {
                    debug!(
                        "stream exhausted without an end marker, {} frames dropped",
                        partial_state.decode_failures
                    );
                    *this.next_chunk_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_chunk_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        if chunk.is_end() {
            // Nothing after the end marker is read.
            debug!(
                "got end marker, {} frames dropped",
                partial_state.decode_failures
            );
            *this.next_chunk_fut = None;
        } else {
            let next_chunk_fut = async move { next_chunk(partial_state).await };
            *this.next_chunk_fut = Some(Box::pin(next_chunk_fut));
        }

        Poll::Ready(Ok(Some(chunk)))
    }
}

async fn next_chunk(mut partial_state: PartialState) -> NextChunk {
    loop {
        let frame = match partial_state.frames.next_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok((None, partial_state)),
            Err(err) => {
                return Err(Error::new(format!("{err}"), ErrorKind::Transport));
            }
        };
        trace!("got frame: {frame}");

        match proto::decode_frame(&frame) {
            Ok(chunk) => return Ok((Some(chunk), partial_state)),
            Err(err) if err.is_empty_frame() => {
                trace!("skipping frame without data");
            }
            Err(err) => {
                warn!("discarding frame: {err}");
                partial_state.decode_failures += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;
    use chatstream_model::{ChatProviderError, ChunkBody};
    use futures_util::stream;

    use super::*;
    use crate::Chunks;

    fn response_from(parts: &[&'static [u8]]) -> SseResponse {
        let items = parts
            .iter()
            .map(|part| Ok::<_, Infallible>(Bytes::from_static(part)))
            .collect::<Vec<_>>();
        let chunks = Chunks::from_stream(stream::iter(items));
        SseResponse::from_frames(FrameReader::new(chunks))
    }

    async fn collect_chunks(resp: SseResponse) -> Vec<Chunk> {
        let mut resp = pin!(resp);
        let mut chunks = vec![];
        while let Some(chunk) = poll_fn(|cx| resp.as_mut().poll_next_chunk(cx))
            .await
            .unwrap()
        {
            chunks.push(chunk);
        }
        chunks
    }

    #[tokio::test]
    async fn test_recorded_response() {
        let resp = response_from(&[include_bytes!("../fixtures/response.txt")]);
        let chunks = collect_chunks(resp).await;
        let sources = chunks
            .iter()
            .map(|c| c.source.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            sources,
            [
                "supervisor",
                "event_schedular_agent",
                "event_schedular_agent",
                "event_schedular_agent",
                "supervisor",
                "assistant"
            ]
        );
        assert!(chunks.last().unwrap().is_end());
        assert!(matches!(chunks[2].body, ChunkBody::FunctionCall(_)));
    }

    #[tokio::test]
    async fn test_malformed_frame_is_skipped() {
        let resp = response_from(&[
            b"data: {\"kind\": \"content\", \"content\": \"one\"}\n\n",
            b"data: {\"kind\": \"content\", \"cont",
            b"\n\ndata: {\"kind\": \"content\", \"content\": \"two\"}\n\n",
        ]);
        let chunks = collect_chunks(resp).await;
        assert_eq!(chunks, [
            Chunk::content("assistant", "one"),
            Chunk::content("assistant", "two"),
        ]);
    }

    #[tokio::test]
    async fn test_nothing_after_end_is_read() {
        let resp = response_from(&[
            b"data: {\"kind\": \"end\"}\n\n",
            b"data: {\"kind\": \"content\", \"content\": \"late\"}\n\n",
        ]);
        let chunks = collect_chunks(resp).await;
        assert_eq!(chunks, [Chunk::end()]);
    }

    #[tokio::test]
    async fn test_transport_error() {
        let items = vec![
            Ok(Bytes::from_static(b"data: {\"kind\": \"content\", \"content\": \"a\"}\n\n")),
            Err("reset by peer"),
        ];
        let chunks = Chunks::from_stream(stream::iter(items));
        let resp = SseResponse::from_frames(FrameReader::new(chunks));
        let mut resp = pin!(resp);

        let first = poll_fn(|cx| resp.as_mut().poll_next_chunk(cx)).await;
        assert_eq!(first.unwrap().unwrap(), Chunk::content("assistant", "a"));
        let err = poll_fn(|cx| resp.as_mut().poll_next_chunk(cx))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        let after = poll_fn(|cx| resp.as_mut().poll_next_chunk(cx)).await;
        assert_eq!(after.unwrap(), None);
    }
}
