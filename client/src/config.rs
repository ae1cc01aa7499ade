//! Connection configuration: validated at construction rather than
//! loaded from the process environment, since this crate is a library
//! embedded in an application, not a standalone service with its own
//! env.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use strand_engine::{Error, Result};

const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_RECONNECT_BASE_MS: u64 = 1000;
const DEFAULT_RECONNECT_FACTOR: u32 = 2;

/// Where a connection gets its bearer token from: a fixed string, or a
/// callback invoked fresh on every `connect()` so a refreshed token is
/// picked up across reconnects.
#[derive(Clone)]
pub enum BearerTokenSource {
    Static(String),
    Provider(Arc<dyn Fn() -> Result<String> + Send + Sync>),
}

impl fmt::Debug for BearerTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BearerTokenSource::Static(_) => write!(f, "BearerTokenSource::Static(..)"),
            BearerTokenSource::Provider(_) => write!(f, "BearerTokenSource::Provider(..)"),
        }
    }
}

impl BearerTokenSource {
    /// Resolve the token to send on this connect attempt, re-validating
    /// its shape since a provider callback may hand back a refreshed (and
    /// possibly malformed) token at any time.
    pub fn resolve(&self) -> Result<String> {
        let token = match self {
            BearerTokenSource::Static(t) => t.clone(),
            BearerTokenSource::Provider(provider) => provider()?,
        };
        validate_bearer_token(&token)?;
        Ok(token)
    }
}

/// `<b64url>.<b64url>.<b64url>`: three dot-separated base64url segments,
/// none empty.
fn validate_bearer_token(token: &str) -> Result<()> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(Error::validation(
            "bearer token must have the form <b64url>.<b64url>.<b64url>",
        ));
    }
    let is_b64url = |s: &&str| {
        s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    };
    if !segments.iter().all(is_b64url) {
        return Err(Error::validation(
            "bearer token segments must be base64url (characters [A-Za-z0-9_-])",
        ));
    }
    Ok(())
}

fn validate_api_key(api_key: &str) -> Result<()> {
    if api_key.is_empty() {
        return Err(Error::validation("api key must not be empty"));
    }
    let valid = api_key
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if !valid {
        return Err(Error::validation(
            "api key must contain only characters [A-Za-z0-9_-]",
        ));
    }
    Ok(())
}

/// Everything a [`crate::Connection`] needs to open and maintain a
/// WebSocket session: the server URL, credentials, and the reconnect
/// backoff policy.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub url: Url,
    pub api_key: String,
    pub bearer_token: Option<BearerTokenSource>,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay: Duration,
    pub reconnect_factor: u32,
}

impl ConnectionConfig {
    /// Validate `url` (must be `ws://` or `wss://`) and `api_key` (must be
    /// non-empty and drawn from `[A-Za-z0-9_-]`) up front, so a
    /// misconfigured client fails at construction rather than on first
    /// `connect()`.
    pub fn new(url: impl AsRef<str>, api_key: impl Into<String>) -> Result<Self> {
        let url = Url::parse(url.as_ref())
            .map_err(|e| Error::validation(format!("invalid connection url: {e}")))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::validation(
                "connection url must use the ws or wss scheme",
            ));
        }
        let api_key = api_key.into();
        validate_api_key(&api_key)?;
        Ok(Self {
            url,
            api_key,
            bearer_token: None,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_base_delay: Duration::from_millis(DEFAULT_RECONNECT_BASE_MS),
            reconnect_factor: DEFAULT_RECONNECT_FACTOR,
        })
    }

    /// A fixed bearer token, validated against `<b64url>.<b64url>.<b64url>`
    /// immediately rather than deferred to `connect()`.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        validate_bearer_token(&token)?;
        self.bearer_token = Some(BearerTokenSource::Static(token));
        Ok(self)
    }

    /// A callback invoked fresh on every `connect()`, so a token refreshed
    /// between reconnects is picked up without reconstructing the config.
    pub fn with_bearer_token_provider(
        mut self,
        provider: impl Fn() -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        self.bearer_token = Some(BearerTokenSource::Provider(Arc::new(provider)));
        self
    }

    pub fn with_reconnect_policy(mut self, max_attempts: u32, base_delay: Duration, factor: u32) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self.reconnect_base_delay = base_delay;
        self.reconnect_factor = factor;
        self
    }

    /// The backoff delay before reconnect attempt `attempt` (0-indexed).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.reconnect_base_delay * self.reconnect_factor.pow(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_ws_scheme() {
        let err = ConnectionConfig::new("https://example.com", "key").unwrap_err();
        assert_eq!(err.kind(), strand_engine::ErrorKind::Validation);
    }

    #[test]
    fn rejects_empty_api_key() {
        let err = ConnectionConfig::new("wss://example.com/sync", "").unwrap_err();
        assert_eq!(err.kind(), strand_engine::ErrorKind::Validation);
    }

    #[test]
    fn accepts_valid_config() {
        let config = ConnectionConfig::new("wss://example.com/sync", "abc123").unwrap();
        assert_eq!(config.url.scheme(), "wss");
        assert_eq!(config.max_reconnect_attempts, DEFAULT_MAX_RECONNECT_ATTEMPTS);
    }

    #[test]
    fn backoff_delay_doubles_per_attempt() {
        let config = ConnectionConfig::new("ws://localhost:8080", "k").unwrap();
        assert_eq!(config.backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(config.backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(4000));
    }

    #[test]
    fn rejects_api_key_outside_charset() {
        let err = ConnectionConfig::new("wss://example.com", "bad key!").unwrap_err();
        assert_eq!(err.kind(), strand_engine::ErrorKind::Validation);
    }

    #[test]
    fn accepts_static_bearer_token() {
        let config = ConnectionConfig::new("wss://example.com", "key")
            .unwrap()
            .with_bearer_token("aaaa.bbbb.cccc")
            .unwrap();
        matches!(config.bearer_token, Some(BearerTokenSource::Static(_)));
    }

    #[test]
    fn rejects_malformed_bearer_token() {
        let err = ConnectionConfig::new("wss://example.com", "key")
            .unwrap()
            .with_bearer_token("not-a-jwt")
            .unwrap_err();
        assert_eq!(err.kind(), strand_engine::ErrorKind::Validation);
    }

    #[test]
    fn provider_token_is_validated_on_resolve() {
        let config = ConnectionConfig::new("wss://example.com", "key")
            .unwrap()
            .with_bearer_token_provider(|| Ok("not-a-jwt".to_string()));
        let source = config.bearer_token.unwrap();
        assert!(source.resolve().is_err());
    }
}
