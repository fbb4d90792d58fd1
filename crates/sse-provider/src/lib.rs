//! A chat provider that reads server-sent events over HTTP.
//!
//! The response body is split into frames by [`FrameReader`], every frame
//! is decoded by [`decode_frame`], and frames that fail to decode are
//! logged and skipped without interrupting the stream.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use chatstream_model::{
    ChatProvider, ChatProviderError, ChatRequest, ErrorKind,
};
use mime::Mime;
use reqwest::{Client, Response, Url, header};

pub use config::{SseConfig, SseConfigBuilder};
pub use io::{Chunks, ChunksError, FrameReader};
pub use proto::{DecodeError, decode_frame};
pub use response::SseResponse;

/// Error type for [`SseProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = match err.status() {
            Some(status) if status.is_server_error() => ErrorKind::Transport,
            Some(_) => ErrorKind::InvalidResponse,
            None => ErrorKind::Transport,
        };
        Self::new(format!("{err}"), kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ChatProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A chat provider backed by an HTTP endpoint that streams server-sent
/// events.
#[derive(Clone, Debug)]
pub struct SseProvider {
    client: Client,
    config: Arc<SseConfig>,
}

impl SseProvider {
    /// Creates a new `SseProvider` with the given configuration.
    #[inline]
    pub fn new(config: SseConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl ChatProvider for SseProvider {
    type Error = Error;
    type Response = SseResponse;

    fn send_query(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let flush_trailing_frame = self.config.flush_trailing_frame;
        let resp_fut =
            Url::parse_with_params(&self.config.url, [("message", &req.query)])
                .map(|url| {
                    self.client
                        .post(url)
                        .header(header::ACCEPT, "text/event-stream")
                        .json(&proto::QueryBody { query: &req.query })
                        .send()
                })
                .map_err(|err| {
                    Error::new(format!("invalid url: {err}"), ErrorKind::Other)
                });

        async move {
            let resp = resp_fut?
                .await
                .and_then(Response::error_for_status)
                .map_err(Error::from_reqwest)?;

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_event_stream = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| {
                    m.essence_str() == mime::TEXT_EVENT_STREAM.essence_str()
                })
                .unwrap_or(false);
            if !is_event_stream {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::InvalidResponse,
                ));
            }

            // Here we got a streaming response.
            let frames = FrameReader::new(Chunks::from_response(resp))
                .with_flush_trailing_frame(flush_trailing_frame);
            Ok(SseResponse::from_frames(frames))
        }
    }
}
