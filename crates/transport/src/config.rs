//! Configuration for the reqwest-backed client.

use std::time::Duration;

/// Default timeout for task requests: 30 seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tuning knobs for [`ReqwestClient`](crate::ReqwestClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Network-level timeout; expiry turns into a TIMEDOUT task outcome.
    pub timeout: Duration,
    /// User-Agent header sent with every task request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("rusty-orchestrator/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
