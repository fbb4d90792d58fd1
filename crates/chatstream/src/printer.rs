use std::collections::HashMap;
use std::fmt::Write as _;
use std::mem;

use chatstream_core::grouping::collapse_hint;
use chatstream_core::transcript::{Role, Snapshot, TurnId};
use chatstream_model::{Chunk, ChunkBody, FunctionCall};
use owo_colors::{OwoColorize, Style};

const BAR_CHAR: &str = "▎";

/// Renders transcript snapshots for a terminal, printing every chunk
/// once.
///
/// User turns are skipped, since the user has just typed them. Each
/// [`group`](chatstream_core::grouping::group_chunks) of a turn starts with
/// a header naming its source.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    colored: bool,
    // Number of chunks already rendered, per turn.
    rendered: HashMap<TurnId, usize>,
}

impl TranscriptPrinter {
    /// Creates a printer. Without `colored`, the output is plain text.
    #[inline]
    pub fn new(colored: bool) -> Self {
        Self {
            colored,
            ..Default::default()
        }
    }

    /// Returns the text for everything `snapshot` has that previous
    /// snapshots didn't.
    pub fn render(&mut self, snapshot: &Snapshot) -> String {
        let mut out = String::new();
        for turn in snapshot.transcript().turns() {
            if turn.role() == Role::User {
                continue;
            }
            let rendered = self.rendered.entry(turn.id().clone()).or_default();
            let start = mem::replace(rendered, turn.chunks().len());

            let mut group_end = 0;
            for group in turn.groups() {
                let group_start = group_end;
                group_end += group.chunks.len();
                if group_end <= start {
                    continue;
                }
                // A group that was partly printed before keeps its header.
                if group_start >= start {
                    let header = self.paint(
                        &format!("{BAR_CHAR}{}", group.source),
                        Style::new().bright_cyan().bold(),
                    );
                    _ = writeln!(out, "{header}");
                }
                for chunk in &group.chunks[start.saturating_sub(group_start)..] {
                    self.render_chunk(chunk, &mut out);
                }
            }
        }
        out
    }

    fn render_chunk(&self, chunk: &Chunk, out: &mut String) {
        let line = match &chunk.body {
            ChunkBody::Content(text) => {
                self.paint(text, Style::new().bright_white())
            }
            ChunkBody::ToolOutput(_) => {
                let preview = collapse_hint(chunk)
                    .map(|hint| hint.preview)
                    .unwrap_or_default();
                self.paint(&format!("  ↳ {preview}"), Style::new().dimmed())
            }
            ChunkBody::FunctionCall(call) => self.paint(
                &format_function_call(call),
                Style::new().bright_yellow(),
            ),
            ChunkBody::Error(text) => self.paint(text, Style::new().red()),
            ChunkBody::End => return,
        };
        _ = writeln!(out, "{line}");
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.colored {
            text.style(style).to_string()
        } else {
            text.to_owned()
        }
    }
}

fn format_function_call(call: &FunctionCall) -> String {
    let arguments = serde_json::to_string_pretty(&call.arguments)
        .unwrap_or_else(|_| "{}".to_owned());
    let mut text = format!("  ⚙ {}", call.name);
    if call.executable {
        text.push_str(" (executable)");
    }
    for line in arguments.lines() {
        text.push_str("\n    ");
        text.push_str(line);
    }
    text
}
