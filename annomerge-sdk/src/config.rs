//! Client configuration.
//!
//! Everything needed to reach an annotation server: base URL, API token
//! and the `Authorization` header spelling it expects, timeouts, and any
//! extra headers.

use crate::error::{SdkError, SdkResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How the API token is presented to the server.
///
/// Modern servers accept `Authorization: Bearer <token>`; older ones only
/// understand the legacy `Authorization: Token <token>` spelling.
/// [`Auto`](AuthStyle::Auto) lets `StudioClient::connect` probe once and
/// pin whichever the server accepts for the rest of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStyle {
    /// Probe Bearer first, then legacy Token, at connect time
    #[default]
    Auto,
    /// Always send `Authorization: Bearer <token>`
    Bearer,
    /// Always send `Authorization: Token <token>`
    Legacy,
}

impl AuthStyle {
    /// Render the authorization header value for `token` under this style.
    ///
    /// `Auto` renders as Bearer; it only exists as a pre-probe state.
    pub fn header_value(&self, token: &str) -> String {
        match self {
            AuthStyle::Auto | AuthStyle::Bearer => format!("Bearer {}", token),
            AuthStyle::Legacy => format!("Token {}", token),
        }
    }
}

impl fmt::Display for AuthStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStyle::Auto => write!(f, "auto"),
            AuthStyle::Bearer => write!(f, "bearer"),
            AuthStyle::Legacy => write!(f, "legacy"),
        }
    }
}

impl std::str::FromStr for AuthStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(AuthStyle::Auto),
            "bearer" => Ok(AuthStyle::Bearer),
            "legacy" | "token" => Ok(AuthStyle::Legacy),
            other => Err(format!("unknown auth style: {}", other)),
        }
    }
}

/// Connection settings for one annotation server.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Server base URL, scheme included
    pub base_url: String,

    /// API token; `None` sends unauthenticated requests
    pub token: Option<String>,

    /// Authorization header spelling for the token
    pub auth_style: AuthStyle,

    /// Per-request timeout
    pub timeout: Duration,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// `User-Agent` sent with every request
    pub user_agent: String,

    /// Log requests and response bodies at debug level
    pub enable_logging: bool,

    /// Extra headers attached to every request
    pub custom_headers: Vec<(String, String)>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            auth_style: AuthStyle::Auto,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: format!("annomerge-sdk/{}", env!("CARGO_PKG_VERSION")),
            enable_logging: false,
            custom_headers: Vec::new(),
        }
    }
}

impl SdkConfig {
    /// Configuration pointing at `base_url`, defaults everywhere else.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the API token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Pin the authorization header style, skipping the connect-time probe.
    pub fn with_auth_style(mut self, style: AuthStyle) -> Self {
        self.auth_style = style;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the TCP connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Toggle request/response debug logging.
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }

    /// Attach an extra header to every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Check that the configuration can produce working requests.
    pub fn validate(&self) -> SdkResult<()> {
        if self.base_url.is_empty() {
            return Err(SdkError::ConfigurationError(
                "base URL must not be empty".to_string(),
            ));
        }
        url::Url::parse(&self.base_url)?;

        if self.timeout.is_zero() {
            return Err(SdkError::ConfigurationError(
                "request timeout must be non-zero".to_string(),
            ));
        }
        if matches!(&self.token, Some(token) if token.trim().is_empty()) {
            return Err(SdkError::ConfigurationError(
                "token must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}
