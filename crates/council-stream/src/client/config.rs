use std::time::Duration;

use crate::errors::ClientError;

/// Address the council backend listens on by default.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8001";

/// Configuration for the council HTTP client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the council backend.
    pub base_url: String,
    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,
    /// Optional overall request timeout.
    ///
    /// Unset by default: a council answer streams for as long as the slowest
    /// model takes.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Builds a config from `COUNCIL_API_URL` and
    /// `COUNCIL_CONNECT_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Result<Self, ClientError> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("COUNCIL_API_URL")
            && !url.trim().is_empty()
        {
            config.base_url = url.trim().to_string();
        }
        if let Ok(raw) = std::env::var("COUNCIL_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout = parse_secs("COUNCIL_CONNECT_TIMEOUT_SECS", &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ClientError::Config("base_url must not be empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "base_url must start with http:// or https://, got {url}"
            )));
        }
        Ok(())
    }

    pub(crate) fn stream_url(&self, conversation_id: &str) -> String {
        format!(
            "{}/api/conversations/{}/message/stream",
            self.base_url.trim_end_matches('/'),
            conversation_id
        )
    }

    pub(crate) fn defaults_url(&self) -> String {
        format!("{}/api/config", self.base_url.trim_end_matches('/'))
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration, ClientError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ClientError::Config(format!("{key} must be a whole number of seconds, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_ignore_trailing_slash() {
        let config = ClientConfig::new("http://council.local:8001/");
        assert_eq!(
            config.stream_url("abc"),
            "http://council.local:8001/api/conversations/abc/message/stream"
        );
        assert_eq!(config.defaults_url(), "http://council.local:8001/api/config");
    }

    #[test]
    fn validate_rejects_non_http_urls() {
        assert!(ClientConfig::new("localhost:8001").validate().is_err());
        assert!(ClientConfig::new(" ").validate().is_err());
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn parse_secs_reports_key() {
        assert_eq!(parse_secs("K", " 5 ").expect("parse"), Duration::from_secs(5));
        let err = parse_secs("K", "soon").expect_err("invalid");
        assert!(matches!(err, ClientError::Config(msg) if msg.contains("K")));
    }

    #[test]
    fn streams_have_no_overall_timeout_by_default() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
