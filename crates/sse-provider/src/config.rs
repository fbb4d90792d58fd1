const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_ENDPOINT: &str = "/chat";

/// Builder for [`SseConfig`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SseConfigBuilder {
    base_url: Option<String>,
    endpoint: Option<String>,
    flush_trailing_frame: bool,
}

impl SseConfigBuilder {
    /// Creates a builder with the given base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Default::default()
        }
    }

    /// Sets the path of the chat endpoint, `/chat` by default.
    #[inline]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Delivers a frame the server didn't terminate before closing the
    /// stream. Such a frame is dropped by default.
    #[inline]
    pub fn with_flush_trailing_frame(mut self, flush: bool) -> Self {
        self.flush_trailing_frame = flush;
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> SseConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        SseConfig {
            url: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            ),
            flush_trailing_frame: self.flush_trailing_frame,
        }
    }
}

/// Configuration for the event-stream provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SseConfig {
    pub(crate) url: String,
    pub(crate) flush_trailing_frame: bool,
}

impl SseConfig {
    /// Returns the full URL of the chat endpoint.
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }
}
