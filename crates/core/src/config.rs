//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the store and
//! controller. Library code never reads process environment variables; binaries read them
//! and hand the raw values to the `*_from_env_value` helpers below.

use crate::constants::{DEFAULT_API_BASE_URL, DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT};
use crate::{QueueError, QueueResult};
use std::fmt;
use std::time::Duration;

/// Queue configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    api_base_url: String,
    poll_interval: Duration,
    request_timeout: Duration,
}

impl QueueConfig {
    /// Create a new `QueueConfig`.
    ///
    /// The base URL is stored without a trailing slash.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidInput`] if:
    /// - the base URL is blank or not `http(s)://`,
    /// - either duration is zero,
    /// - the request timeout is longer than the poll interval (a poll must resolve before
    ///   the next one is due).
    pub fn new(
        api_base_url: impl Into<String>,
        poll_interval: Duration,
        request_timeout: Duration,
    ) -> QueueResult<Self> {
        let api_base_url = api_base_url.into().trim().trim_end_matches('/').to_string();
        if api_base_url.is_empty() {
            return Err(QueueError::InvalidInput(
                "api_base_url cannot be empty".into(),
            ));
        }
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(QueueError::InvalidInput(format!(
                "api_base_url must start with http:// or https://: {api_base_url}"
            )));
        }
        if poll_interval.is_zero() {
            return Err(QueueError::InvalidInput(
                "poll_interval must be greater than zero".into(),
            ));
        }
        if request_timeout.is_zero() {
            return Err(QueueError::InvalidInput(
                "request_timeout must be greater than zero".into(),
            ));
        }
        if request_timeout > poll_interval {
            return Err(QueueError::InvalidInput(format!(
                "request_timeout ({}s) cannot exceed poll_interval ({}s)",
                request_timeout.as_secs_f64(),
                poll_interval.as_secs_f64()
            )));
        }

        Ok(Self {
            api_base_url,
            poll_interval,
            request_timeout,
        })
    }

    /// Configuration pointing at `api_base_url` with default timings.
    pub fn with_defaults(api_base_url: impl Into<String>) -> QueueResult<Self> {
        Self::new(api_base_url, DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Explicit session context handed to the controller at construction.
///
/// Replaces ambient cross-page storage: whoever builds the controller decides which staff
/// member and token it acts for.
#[derive(Clone, Default)]
pub struct SessionContext {
    staff_id: Option<String>,
    session_token: Option<String>,
}

impl SessionContext {
    pub fn new(staff_id: Option<String>, session_token: Option<String>) -> Self {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            staff_id: clean(staff_id),
            session_token: clean(session_token),
        }
    }

    pub fn staff_id(&self) -> Option<&str> {
        self.staff_id.as_deref()
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("staff_id", &self.staff_id)
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Resolve the API base URL from an optional environment value.
///
/// If `value` is `None` or blank, returns [`DEFAULT_API_BASE_URL`].
pub fn api_base_url_from_env_value(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
}

/// Parse a whole-seconds duration from an optional environment value.
///
/// If `value` is `None` or blank, returns `default`.
///
/// # Errors
///
/// Returns [`QueueError::InvalidInput`] naming `name` if the value is not a positive integer.
pub fn duration_secs_from_env_value(
    name: &str,
    value: Option<String>,
    default: Duration,
) -> QueueResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let Some(raw) = value else {
        return Ok(default);
    };

    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(QueueError::InvalidInput(format!(
            "{name} must be a positive whole number of seconds, got {raw:?}"
        ))),
    }
}
