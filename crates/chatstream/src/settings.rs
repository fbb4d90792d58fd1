use std::env;
use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::str::FromStr;
use std::time::Duration;

/// Base URL used when `CHATSTREAM_BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

const BASE_URL_VAR: &str = "CHATSTREAM_BASE_URL";
const IDLE_TIMEOUT_VAR: &str = "CHATSTREAM_IDLE_TIMEOUT_SECS";
const CONNECT_RETRIES_VAR: &str = "CHATSTREAM_CONNECT_RETRIES";

/// Settings of the terminal client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Base URL of the chat service.
    pub base_url: String,
    /// Gives up on a response after this long without a chunk.
    pub idle_timeout: Option<Duration>,
    /// Retries of a failed connection.
    pub connect_retries: u32,
}

/// An environment variable holds a value that can't be used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettingsError {
    name: &'static str,
    value: String,
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.name, self.value)
    }
}

impl StdError for SettingsError {}

impl Settings {
    /// Reads the settings from the process environment.
    #[inline]
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the settings with `lookup`, which returns the value of an
    /// environment variable.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let base_url = lookup(BASE_URL_VAR)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());

        let idle_timeout = parse::<u64>(&lookup, IDLE_TIMEOUT_VAR)?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let connect_retries =
            parse(&lookup, CONNECT_RETRIES_VAR)?.unwrap_or_default();

        Ok(Self {
            base_url,
            idle_timeout,
            connect_retries,
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, SettingsError> {
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| SettingsError { name, value })
}
