//! Transport layer shared by all resource clients.
//!
//! Wraps `reqwest` with base-URL joining, authorization injection, and
//! response-to-error mapping. Every request is sent exactly once; retry
//! policy is left to callers so a flaky server cannot silently stretch
//! a merge run.

use crate::config::SdkConfig;
use crate::error::{SdkError, SdkResult};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Shared HTTP transport for the annotation server API.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: Arc<SdkConfig>,
}

fn base_headers(config: &SdkConfig) -> header::HeaderMap {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json"),
    );
    for (name, value) in &config.custom_headers {
        let name = match header::HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => name,
            Err(_) => continue,
        };
        if let Ok(value) = header::HeaderValue::from_str(value) {
            headers.insert(name, value);
        }
    }
    headers
}

impl HttpClient {
    /// Build a transport from a validated configuration.
    pub fn new(config: SdkConfig) -> SdkResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(base_headers(&config))
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(SdkError::NetworkError)?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// The configuration backing this transport.
    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Join an endpoint path onto the configured base URL.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// GET an endpoint and decode the JSON body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> SdkResult<T> {
        self.run(self.authorized(Method::GET, path)).await
    }

    /// GET with query parameters, decoding the JSON body.
    pub async fn get_with_query<T: DeserializeOwned, Q: Serialize>(
        &self,
        path: &str,
        query: &Q,
    ) -> SdkResult<T> {
        self.run(self.authorized(Method::GET, path).query(query))
            .await
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: B,
    ) -> SdkResult<T> {
        self.run(self.authorized(Method::POST, path).json(&body))
            .await
    }

    /// GET a raw payload, e.g. an export archive.
    pub async fn get_bytes(&self, path: &str) -> SdkResult<Vec<u8>> {
        let response = dispatch(self.authorized(Method::GET, path)).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(SdkError::NetworkError)?;
            return Err(error_for(status, &body));
        }
        let bytes = response.bytes().await.map_err(SdkError::NetworkError)?;
        Ok(bytes.to_vec())
    }

    fn authorized(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        if self.config.enable_logging {
            debug!("Request: {} {}", method, url);
        }
        let request = self.client.request(method, url);
        match &self.config.token {
            Some(token) => request.header(
                header::AUTHORIZATION,
                self.config.auth_style.header_value(token),
            ),
            None => request,
        }
    }

    async fn run<T: DeserializeOwned>(&self, request: RequestBuilder) -> SdkResult<T> {
        let response = dispatch(request).await?;

        let status = response.status();
        let body = response.text().await.map_err(SdkError::NetworkError)?;
        if self.config.enable_logging {
            debug!("Response body: {}", body);
        }
        if !status.is_success() {
            return Err(error_for(status, &body));
        }
        serde_json::from_str(&body).map_err(SdkError::SerializationError)
    }
}

async fn dispatch(request: RequestBuilder) -> SdkResult<Response> {
    request.send().await.map_err(SdkError::NetworkError)
}

fn error_for(status: StatusCode, body: &str) -> SdkError {
    match status {
        StatusCode::UNAUTHORIZED => {
            SdkError::AuthenticationError("Invalid or missing authentication".to_string())
        }
        StatusCode::FORBIDDEN => SdkError::AuthorizationError("Access denied".to_string()),
        _ => SdkError::from_response(status.as_u16(), body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthStyle;

    #[test]
    fn url_joining_normalizes_slashes() {
        let client = HttpClient::new(SdkConfig::new("http://annotate.example.com/")).unwrap();

        for path in ["/api/projects/", "api/projects/"] {
            assert_eq!(
                client.url(path),
                "http://annotate.example.com/api/projects/"
            );
        }
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        assert!(HttpClient::new(SdkConfig::new("")).is_err());
    }

    #[test]
    fn config_survives_construction() {
        let config = SdkConfig::new("http://annotate.example.com")
            .with_token("secret")
            .with_auth_style(AuthStyle::Legacy);
        let client = HttpClient::new(config).unwrap();

        assert_eq!(client.config().auth_style, AuthStyle::Legacy);
        assert_eq!(client.config().token.as_deref(), Some("secret"));
    }

    #[test]
    fn status_codes_map_to_error_variants() {
        assert!(matches!(
            error_for(StatusCode::UNAUTHORIZED, ""),
            SdkError::AuthenticationError(_)
        ));
        assert!(matches!(
            error_for(StatusCode::FORBIDDEN, ""),
            SdkError::AuthorizationError(_)
        ));
    }
}
