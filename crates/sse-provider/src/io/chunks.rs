use std::fmt::{self, Display};
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Response;

/// A read from the underlying byte stream failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error(String);

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to read the response body: {}", self.0)
    }
}

impl std::error::Error for Error {}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// An adapter for streaming byte chunks.
pub enum Chunks {
    /// The body of an HTTP response.
    Response(Response),
    /// Any other byte stream, e.g. a recorded response.
    Stream(ByteStream),
}

impl Chunks {
    /// Reads the body of `response`.
    #[inline]
    pub fn from_response(response: Response) -> Self {
        Chunks::Response(response)
    }

    /// Reads from an arbitrary stream of byte buffers.
    pub fn from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Display,
    {
        let stream = stream.map(|item| item.map_err(|err| Error(err.to_string())));
        Chunks::Stream(Box::pin(stream))
    }

    /// Waits for the next buffer. `Ok(None)` means the stream has ended.
    #[inline]
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            Chunks::Response(response) => {
                response.chunk().await.map_err(|err| Error(err.to_string()))
            }
            Chunks::Stream(stream) => stream.next().await.transpose(),
        }
    }
}

impl fmt::Debug for Chunks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chunks::Response(response) => {
                f.debug_tuple("Response").field(&response.url()).finish()
            }
            Chunks::Stream(_) => f.write_str("Stream"),
        }
    }
}
