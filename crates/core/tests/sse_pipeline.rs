use std::convert::Infallible;
use std::future::ready;
use std::time::Duration;

use bytes::Bytes;
use chatstream_core::AssemblerBuilder;
use chatstream_core::transcript::{Snapshot, TurnStatus};
use chatstream_model::{ChatProvider, ChatRequest, ChunkBody};
use chatstream_sse::{Chunks, FrameReader, SseResponse};
use futures_util::stream;
use tokio::time::timeout;

/// Replays a fixed response body, cut into reads of `read_size` bytes.
struct ReplayProvider {
    body: &'static str,
    read_size: usize,
}

impl ChatProvider for ReplayProvider {
    type Error = chatstream_sse::Error;
    type Response = SseResponse;

    fn send_query(
        &self,
        _req: &ChatRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let reads: Vec<_> = self
            .body
            .as_bytes()
            .chunks(self.read_size)
            .map(|read| Ok::<_, Infallible>(Bytes::copy_from_slice(read)))
            .collect();
        let frames = FrameReader::new(Chunks::from_stream(stream::iter(reads)));
        ready(Ok(SseResponse::from_frames(frames)))
    }
}

async fn run(body: &'static str, read_size: usize) -> Snapshot {
    let provider = ReplayProvider { body, read_size };
    let assembler = AssemblerBuilder::with_provider(provider).build();
    assembler.submit_query("What's on my calendar?").unwrap();

    let mut snapshot_rx = assembler.subscribe();
    timeout(
        Duration::from_secs(5),
        snapshot_rx.wait_for(|s| !s.is_request_in_flight()),
    )
    .await
    .unwrap()
    .unwrap()
    .clone()
}

const BODY: &str = concat!(
    "data: {\"kind\": \"content\", \"source\": \"supervisor\", \"content\": \"Let me check your calendar.\"}\n\n",
    "data: {\"kind\": \"tool_output\", \"source\": \"calendar_agent\", \"content\": \"3 events on 周一 ☕\"}\n\n",
    "data: {not json at all\n\n",
    "data: {\"type\": \"AIMessage\", \"node\": \"calendar_agent\", \"value\": \"You have 3 events on Monday.\"}\n\n",
    ": keep-alive\n\n",
    "data: {\"kind\": \"content\", \"source\": \"supervisor\", \"content\": \"Anything else?\"}\n\n",
    "data: {\"kind\": \"end\"}\n\n",
);

#[tokio::test]
async fn test_pipeline_survives_any_read_size() {
    for read_size in [1, 2, 3, 7, 64, BODY.len()] {
        let snapshot = run(BODY, read_size).await;
        let transcript = snapshot.transcript();
        assert_eq!(transcript.len(), 2, "read size {read_size}");

        let turn = transcript.get(1).unwrap();
        assert_eq!(turn.status(), TurnStatus::Complete);

        // The malformed frame and the comment-only frame are dropped.
        let texts: Vec<_> = turn.chunks().iter().filter_map(|c| c.text()).collect();
        assert_eq!(
            texts,
            [
                "Let me check your calendar.",
                "3 events on 周一 ☕",
                "You have 3 events on Monday.",
                "Anything else?",
            ],
            "read size {read_size}"
        );
        assert!(matches!(turn.chunks()[1].body, ChunkBody::ToolOutput(_)));

        let groups: Vec<_> = turn
            .groups()
            .into_iter()
            .map(|g| (g.source, g.chunks.len()))
            .collect();
        assert_eq!(
            groups,
            [("supervisor", 1), ("calendar_agent", 2), ("supervisor", 1)]
        );
    }
}

#[tokio::test]
async fn test_stream_without_end_marker() {
    let body = concat!(
        "data: {\"kind\": \"content\", \"content\": \"Partial answer\"}\n\n",
        "data: {\"kind\": \"content\", \"content\": \"never termin",
    );
    let snapshot = run(body, 5).await;

    // The dangling fragment is dropped and the turn still completes.
    let turn = snapshot.transcript().get(1).unwrap();
    assert_eq!(turn.status(), TurnStatus::Complete);
    assert_eq!(turn.chunks().len(), 1);
    assert_eq!(turn.chunks()[0].source, "assistant");
}

#[tokio::test]
async fn test_error_chunk_from_server() {
    let body = concat!(
        "data: {\"kind\": \"content\", \"source\": \"supervisor\", \"content\": \"Working\"}\n\n",
        "data: {\"kind\": \"error\", \"source\": \"supervisor\", \"content\": \"Tool unavailable\"}\n\n",
        "data: {\"kind\": \"end\"}\n\n",
    );
    let snapshot = run(body, 16).await;

    // An error chunk is ordinary content of the turn, not a stream failure.
    let turn = snapshot.transcript().get(1).unwrap();
    assert_eq!(turn.status(), TurnStatus::Complete);
    assert!(matches!(&turn.chunks()[1].body, ChunkBody::Error(text) if text == "Tool unavailable"));
}
