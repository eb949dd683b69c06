use std::time::Duration;

/// Configuration for talking to the upstream scheduler.
///
/// The scheduler address is an explicit value threaded through the client
/// constructor rather than process-wide state, so tests can point several
/// clients at several fixture servers in the same run.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Base URL of the scheduler, e.g. "http://scheduler.internal:4400".
    pub base_url: String,
    /// Per-request timeout for all upstream calls.
    pub request_timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Retry once on a transient transport failure (never on an HTTP
    /// error status).
    pub retry_transient: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4400".to_string(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            retry_transient: true,
        }
    }
}

impl SchedulerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            ..Default::default()
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_retry_transient(mut self, enabled: bool) -> Self {
        self.retry_transient = enabled;
        self
    }
}
