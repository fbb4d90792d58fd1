//! An interactive chat client for the terminal.

#[macro_use]
extern crate tracing;

use std::io::Write as _;

use chatstream::core::AssemblerBuilder;
use chatstream::{ResponseEvent, Settings, TranscriptPrinter, follow_response};
use chatstream_sse::{SseConfigBuilder, SseProvider};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::signal;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };
    debug!("settings: {settings:?}");

    let config =
        SseConfigBuilder::with_base_url(settings.base_url.clone()).build();
    let mut builder = AssemblerBuilder::with_provider(SseProvider::new(config))
        .with_connect_retries(settings.connect_retries);
    if let Some(idle_timeout) = settings.idle_timeout {
        builder = builder.with_idle_timeout(idle_timeout);
    }
    let assembler = builder.build();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let mut printer = TranscriptPrinter::new(true);

    println!(
        "{} {}",
        "Connected to".dimmed(),
        settings.base_url.bright_white()
    );

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let line = select! {
            line = read_line() => line,
            _ = signal::ctrl_c() => {
                println!();
                None
            }
        };
        let Some(line) = line else {
            break;
        };
        if let Err(err) = assembler.submit_query(line.trim()) {
            debug!("not submitted: {err}");
            continue;
        }

        let mut progress_bar: Option<ProgressBar> = None;
        follow_response(&assembler, &mut printer, signal::ctrl_c(), |event| {
            match event {
                ResponseEvent::Waiting => {
                    progress_bar
                        .get_or_insert_with(|| {
                            let progress_bar = ProgressBar::new_spinner();
                            progress_bar.set_style(progress_style.clone());
                            progress_bar.set_message("🤔 Thinking...");
                            progress_bar
                        })
                        .inc(1);
                }
                ResponseEvent::Output(output) => {
                    // Finish the progress bar before printing anything else.
                    if let Some(progress_bar) = progress_bar.take() {
                        progress_bar.finish_and_clear();
                    }
                    print!("{output}");
                    std::io::stdout().flush().ok();
                }
            }
        })
        .await;
        if let Some(progress_bar) = progress_bar {
            progress_bar.finish_and_clear();
        }
        println!();
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
