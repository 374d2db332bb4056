// crates/core/src/config.rs
//! Monitor configuration.

use std::time::Duration;

/// Server the email backend listens on in a default local install.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8081";

/// Stream endpoint; `{job_id}` is replaced with the url-encoded job id.
pub const DEFAULT_STREAM_PATH: &str = "/api/accounts/{job_id}/sync-stream";

/// Grace period between a terminal snapshot and the automatic close.
pub const DEFAULT_AUTO_CLOSE_DELAY: Duration = Duration::from_millis(5000);

/// Upper bound on the stream handshake. Never applied to the open stream.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for a [`ProgressMonitor`](crate::ProgressMonitor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Scheme + host (+ optional prefix) of the backend, without trailing slash.
    pub base_url: String,
    /// Path template containing `{job_id}`.
    pub stream_path: String,
    pub auto_close_delay: Duration,
    pub connect_timeout: Duration,
    /// Bound of the transport → session channel.
    pub channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            stream_path: DEFAULT_STREAM_PATH.into(),
            auto_close_delay: DEFAULT_AUTO_CLOSE_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl MonitorConfig {
    /// Defaults overridden by `SYNCWATCH_BASE_URL`, `SYNCWATCH_AUTO_CLOSE_MS`
    /// and `SYNCWATCH_CONNECT_TIMEOUT_MS`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("SYNCWATCH_BASE_URL").filter(|u| !u.trim().is_empty()) {
            config.base_url = url;
        }
        if let Some(ms) = lookup("SYNCWATCH_AUTO_CLOSE_MS").and_then(|v| v.parse().ok()) {
            config.auto_close_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = lookup("SYNCWATCH_CONNECT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.connect_timeout = Duration::from_millis(ms);
        }
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_auto_close_delay(mut self, delay: Duration) -> Self {
        self.auto_close_delay = delay;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Stream endpoint for `job_id`, without the token query.
    pub fn stream_target(&self, job_id: &str) -> String {
        let path = self
            .stream_path
            .replace("{job_id}", &urlencoding::encode(job_id));
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Full stream url. The token travels as a query parameter because the
    /// streaming transport cannot inject an Authorization header.
    pub fn stream_url(&self, job_id: &str, token: &str) -> String {
        format!(
            "{}?token={}",
            self.stream_target(job_id),
            urlencoding::encode(token)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_matches_backend_layout() {
        let config = MonitorConfig::default();
        assert_eq!(config.auto_close_delay, Duration::from_millis(5000));
        assert_eq!(
            config.stream_target("acc-1"),
            "http://localhost:8081/api/accounts/acc-1/sync-stream"
        );
    }

    #[test]
    fn stream_url_encodes_job_id_and_token() {
        let config = MonitorConfig::default().with_base_url("https://mail.example.com/");
        assert_eq!(
            config.stream_url("a/b c", "tok+en=="),
            "https://mail.example.com/api/accounts/a%2Fb%20c/sync-stream?token=tok%2Ben%3D%3D"
        );
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("SYNCWATCH_BASE_URL", "http://10.0.0.2:9000"),
            ("SYNCWATCH_AUTO_CLOSE_MS", "250"),
            ("SYNCWATCH_CONNECT_TIMEOUT_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let config = MonitorConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.base_url, "http://10.0.0.2:9000");
        assert_eq!(config.auto_close_delay, Duration::from_millis(250));
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }
}
