//! HTTP gateway client
//!
//! Thin request/response layer over the fuzz.ly REST services. Requests are
//! addressed to a [`Service`] plus a path; the client resolves the host from
//! its [`ServiceHosts`] and turns non-success statuses into [`GatewayError`]s
//! carrying an [`HttpErrorKind`].

use crate::hosts::{Service, ServiceHosts};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// Error Types
// =============================================================================

/// Category of a gateway failure, derived from the HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 409
    Conflict,
    /// 422
    UnprocessableEntity,
    /// 429
    TooManyRequests,
    /// 502
    BadGateway,
    /// 503
    ServiceUnavailable,
    /// Any other 5xx
    InternalServerError,
    /// Any other unexpected status
    Unexpected,
    /// The request never produced a response
    Network,
    /// The response body could not be read or decoded
    Parse,
}

impl HttpErrorKind {
    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => HttpErrorKind::BadRequest,
            401 => HttpErrorKind::Unauthorized,
            403 => HttpErrorKind::Forbidden,
            404 => HttpErrorKind::NotFound,
            409 => HttpErrorKind::Conflict,
            422 => HttpErrorKind::UnprocessableEntity,
            429 => HttpErrorKind::TooManyRequests,
            502 => HttpErrorKind::BadGateway,
            503 => HttpErrorKind::ServiceUnavailable,
            500..=599 => HttpErrorKind::InternalServerError,
            _ => HttpErrorKind::Unexpected,
        }
    }
}

/// Gateway error with HTTP status and message
///
/// # Examples
/// ```
/// use fuzzly_client::{GatewayError, HttpErrorKind};
///
/// let error = GatewayError::from_status(404, "user not found");
/// assert_eq!(error.kind(), HttpErrorKind::NotFound);
/// assert!(error.is_not_found());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    status: u16,
    kind: HttpErrorKind,
    message: String,
}

impl GatewayError {
    /// Create an error for an HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self { status, kind: HttpErrorKind::from_status(status), message: message.into() }
    }

    /// Create an error for a request that never got a response
    pub fn network(message: impl Into<String>) -> Self {
        Self { status: 0, kind: HttpErrorKind::Network, message: message.into() }
    }

    /// Create an error for an unreadable response
    pub fn parse(status: u16, message: impl Into<String>) -> Self {
        Self { status, kind: HttpErrorKind::Parse, message: message.into() }
    }

    /// HTTP status code, 0 when no response was received
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Error category
    pub fn kind(&self) -> HttpErrorKind {
        self.kind
    }

    /// Human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.kind == HttpErrorKind::NotFound
    }

    /// Whether the failure is transient and worth retrying
    pub fn is_network_error(&self) -> bool {
        matches!(
            self.kind,
            HttpErrorKind::Network
                | HttpErrorKind::TooManyRequests
                | HttpErrorKind::BadGateway
                | HttpErrorKind::ServiceUnavailable
        )
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gateway error {} ({:?}): {}", self.status, self.kind, self.message)
    }
}

impl std::error::Error for GatewayError {}

/// Error body returned by fuzz.ly services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

// =============================================================================
// Request Types
// =============================================================================

/// HTTP method for gateway requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
}

/// A request to one endpoint of a fuzz.ly service
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Path below the service host, starting with `/`
    pub path: String,
    /// Query parameters
    pub params: Vec<(String, String)>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// JSON request body
    pub body: Option<Vec<u8>>,
}

impl GatewayRequest {
    fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), params: Vec::new(), headers: HashMap::new(), body: None }
    }

    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Create a POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Attach a bearer token
    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    /// Set the request body from JSON
    pub fn json_body<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(value)?);
        Ok(self)
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Decoded response from a service
#[derive(Debug, Clone)]
pub struct GatewayResponse<T> {
    /// HTTP status code
    pub status: u16,
    /// Response data
    pub data: T,
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the gateway client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service base URLs
    pub hosts: ServiceHosts,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Headers included in every request
    pub default_headers: HashMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hosts: ServiceHosts::default(),
            timeout: Duration::from_secs(30),
            user_agent: format!("fuzzly/{}", env!("CARGO_PKG_VERSION")),
            default_headers: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Create a config for a set of hosts
    pub fn new(hosts: ServiceHosts) -> Self {
        Self { hosts, ..Default::default() }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a default header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Gateway Client
// =============================================================================

use reqwest::{Client as ReqwestClient, Response as ReqwestResponse};

/// HTTP client for the fuzz.ly services
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: ReqwestClient,
    config: ClientConfig,
}

impl GatewayClient {
    /// Build a client from a configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client, config })
    }

    /// Send a request to a service and decode the JSON response
    pub async fn send<T>(
        &self,
        service: Service,
        request: GatewayRequest,
    ) -> std::result::Result<GatewayResponse<T>, GatewayError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.config.hosts.host(service), request.path);
        tracing::debug!(?service, method = ?request.method, %url, "gateway request");

        let mut req = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };

        if !request.params.is_empty() {
            req = req.query(&request.params);
        }

        for (key, value) in &self.config.default_headers {
            req = req.header(key, value);
        }

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body {
            req = req.header("Content-Type", "application/json").body(body);
        }

        let response = req
            .send()
            .await
            .map_err(|e| GatewayError::network(format!("Request failed: {}", e)))?;

        self.parse_response(response).await
    }

    async fn parse_response<T>(
        &self,
        response: ReqwestResponse,
    ) -> std::result::Result<GatewayResponse<T>, GatewayError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status().as_u16();

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status, "gateway request failed");

            let message = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(error_response) => error_response.error,
                Err(_) => format!("HTTP {}: {}", status, body),
            };

            return Err(GatewayError::from_status(status, message));
        }

        let body = response.text().await.map_err(|e| {
            GatewayError::parse(status, format!("Failed to read response: {}", e))
        })?;

        let data: T = serde_json::from_str(&body).map_err(|e| {
            GatewayError::parse(status, format!("Failed to parse JSON: {}", e))
        })?;

        Ok(GatewayResponse { status, data })
    }

    /// Get the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Base URL of a service
    pub fn host(&self, service: Service) -> &str {
        self.config.hosts.host(service)
    }
}

// =============================================================================
// Tests
// =============================================================================
