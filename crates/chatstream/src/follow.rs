use std::pin::pin;
use std::time::Duration;

use chatstream_core::Assembler;
use chatstream_core::transcript::Snapshot;
use tokio::select;
use tokio::time::sleep;

use crate::TranscriptPrinter;

/// How often [`ResponseEvent::Waiting`] repeats while nothing arrives.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Progress of the response being followed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseEvent<'a> {
    /// The request is in flight but its first chunk hasn't arrived.
    Waiting,
    /// Rendered text for the chunks that arrived since the last event.
    Output(&'a str),
}

/// Renders the in-flight response of `assembler` until it finishes.
///
/// Resolving `interrupt` cancels the request; it is polled at most until
/// it resolves once. Returns immediately if no request is in flight.
pub async fn follow_response<I: Future>(
    assembler: &Assembler,
    printer: &mut TranscriptPrinter,
    interrupt: I,
    mut on_event: impl FnMut(ResponseEvent<'_>),
) {
    let mut snapshot_rx = assembler.subscribe();
    let mut interrupt = pin!(interrupt);
    let mut interrupted = false;

    loop {
        let snapshot = snapshot_rx.borrow_and_update().clone();
        let output = printer.render(&snapshot);
        if !output.is_empty() {
            on_event(ResponseEvent::Output(&output));
        }
        if !snapshot.is_request_in_flight() {
            break;
        }
        if awaiting_first_chunk(&snapshot) {
            on_event(ResponseEvent::Waiting);
        }

        select! {
            changed = snapshot_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = &mut interrupt, if !interrupted => {
                interrupted = true;
                debug!("interrupted, cancelling the request");
                assembler.cancel();
            }
            _ = sleep(TICK_INTERVAL) => {}
        }
    }
}

fn awaiting_first_chunk(snapshot: &Snapshot) -> bool {
    snapshot
        .transcript()
        .loading_turn()
        .is_some_and(|turn| turn.chunks().is_empty())
}
