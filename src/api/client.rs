use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, COOKIE, SET_COOKIE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::error::ApiError;
use super::types::{HealthStatus, SessionSummary, VersionInfo};
use super::BackendApi;
use crate::transport::{SseConnector, TransportError, SESSION_COOKIE};

#[derive(Serialize)]
struct LoginRequest<'a> {
    password: &'a str,
}

/// HTTP client for the monitor backend's polled endpoints.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
    session_token: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::Config("base url cannot be empty".to_string()));
        }
        if timeout.is_zero() {
            return Err(ApiError::Config(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|error| ApiError::Config(error.to_string()))?,
            session_token: None,
        })
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Exchange the password for a session cookie, kept for every later
    /// request and stream connection.
    pub async fn login(&mut self, password: &str) -> Result<(), ApiError> {
        let endpoint = "/api/login";
        let response = self
            .client
            .post(self.url(endpoint))
            .json(&LoginRequest { password })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized("invalid password".to_string()));
        }
        if !status.is_success() {
            return Err(http_error(endpoint, status, response.text().await.unwrap_or_default()));
        }

        let token = session_cookie(response.headers()).ok_or_else(|| ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: format!("missing {SESSION_COOKIE} cookie"),
        })?;
        info!("logged in to {}", self.base_url);
        self.session_token = Some(token);
        Ok(())
    }

    /// SSE connector sharing this client's base URL and session cookie.
    pub fn stream_connector(&self) -> Result<SseConnector, TransportError> {
        SseConnector::new(&self.base_url, self.session_token.as_deref())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let mut request = self.client.get(self.url(endpoint));
        if let Some(token) = &self.session_token {
            request = request.header(COOKIE, format!("{SESSION_COOKIE}={token}"));
        }

        debug!("GET {endpoint}");
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized(format!(
                "{endpoint} returned status {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(http_error(endpoint, status, response.text().await.unwrap_or_default()));
        }

        response.json::<T>().await.map_err(|error| ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: error.to_string(),
        })
    }
}

#[async_trait]
impl BackendApi for BackendClient {
    async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.get_json("/api/health").await
    }

    async fn sessions(&self) -> Result<Vec<SessionSummary>, ApiError> {
        self.get_json("/api/sessions").await
    }

    async fn system(&self) -> Result<serde_json::Value, ApiError> {
        self.get_json("/api/system").await
    }

    async fn version(&self) -> Result<VersionInfo, ApiError> {
        self.get_json("/api/version").await
    }
}

fn http_error(endpoint: &str, status: StatusCode, body: String) -> ApiError {
    ApiError::Http {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        message: body.trim().to_string(),
    }
}

pub(crate) fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie| {
            let pair = cookie.split(';').next()?.trim();
            let (name, value) = pair.split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
        })
}
