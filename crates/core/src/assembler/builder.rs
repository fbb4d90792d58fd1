use std::time::Duration;

use chatstream_model::ChatProvider;

use super::{Assembler, OnChange};
use crate::stream_client::{StreamClient, StreamOptions};
use crate::transcript::Snapshot;

/// [`Assembler`] builder.
pub struct AssemblerBuilder {
    pub(crate) client: StreamClient,
    pub(crate) options: StreamOptions,
    pub(crate) on_change: Option<OnChange>,
}

impl AssemblerBuilder {
    /// Creates a new builder with the specified chat provider.
    #[inline]
    pub fn with_provider<P: ChatProvider + 'static>(provider: P) -> Self {
        Self {
            client: StreamClient::new(provider),
            options: StreamOptions::default(),
            on_change: None,
        }
    }

    /// Fails a request when no chunk arrives within `duration`.
    ///
    /// The timer restarts after every chunk. There is no timeout by
    /// default.
    #[inline]
    pub fn with_idle_timeout(mut self, duration: Duration) -> Self {
        self.options.idle_timeout = Some(duration);
        self
    }

    /// Retries a failed connection up to `retries` times, with an
    /// exponential backoff in between.
    ///
    /// Only transport failures that happen before the response starts are
    /// retried. Defaults to `0`.
    #[inline]
    pub fn with_connect_retries(mut self, retries: u32) -> Self {
        self.options.connect_retries = retries;
        self
    }

    /// Attaches a callback to be invoked after every transition.
    ///
    /// The callback runs while the assembler is locked. It may read
    /// [`Assembler::snapshot`], which already returns the snapshot being
    /// notified, but must not call the other methods of the assembler.
    #[inline]
    pub fn on_change(
        mut self,
        on_change: impl Fn(&Snapshot) + Send + Sync + 'static,
    ) -> Self {
        self.on_change = Some(Box::new(on_change));
        self
    }

    /// Builds the assembler.
    #[inline]
    pub fn build(self) -> Assembler {
        Assembler::from_builder(self)
    }
}
