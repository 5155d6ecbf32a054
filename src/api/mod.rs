//! REST client for the RentGuy backend.
//!
//! Every request carries the bearer token read from a [`TokenSource`] (the
//! auth store in practice), and every failure is normalized into an
//! [`ApiError`].

pub mod http_client;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

pub use http_client::{HttpClient, HttpMethod, HttpResponse, ReqwestHttpClient};

/// Backend endpoints
pub mod endpoints {
    pub const LOGIN: &str = "/api/v1/auth/login";
    pub const ME: &str = "/api/v1/auth/me";
    pub const ROLE: &str = "/api/v1/auth/role";
    pub const INVENTORY_ITEMS: &str = "/api/v1/inventory/items";
    pub const PROJECTS: &str = "/api/v1/projects";
    pub const INVOICES: &str = "/api/v1/invoices";
}

/// Supplies the token attached to outgoing requests
pub trait TokenSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed token, mostly for tests and scripts
impl TokenSource for Option<String> {
    fn bearer_token(&self) -> Option<String> {
        self.clone()
    }
}

/// JSON client with the bearer-token interceptor
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: Arc<dyn HttpClient>,
    tokens: Arc<dyn TokenSource>,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, http: Arc<dyn HttpClient>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            tokens,
            timeout: Duration::from_secs(config.timeout_seconds.max(1)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("accept".to_string(), "application/json".to_string());
        headers.insert("content-type".to_string(), "application/json".to_string());

        if let Some(token) = self.tokens.bearer_token().filter(|t| !t.trim().is_empty()) {
            headers.insert("authorization".to_string(), format!("Bearer {}", token.trim()));
        }
        headers
    }

    async fn with_timeout<F>(&self, request: F) -> ApiResult<HttpResponse>
    where
        F: std::future::Future<Output = ApiResult<HttpResponse>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::timeout(self.timeout)),
        }
    }

    fn decode<T: DeserializeOwned>(path: &str, response: HttpResponse) -> ApiResult<T> {
        if !response.is_success() {
            let err = ApiError::from_status(response.status(), response.body());
            warn!(path = %path, status = response.status(), code = %err.code, "Request failed");
            return Err(err);
        }
        serde_json::from_str(response.body()).map_err(ApiError::decode)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let url = self.url(path);
        debug!(path = %path, "GET");
        let response = self.with_timeout(self.http.get(&url, self.headers())).await?;
        Self::decode(path, response)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let body = serde_json::to_string(body).map_err(ApiError::decode)?;
        debug!(path = %path, "POST");
        let response = self
            .with_timeout(self.http.post(&url, self.headers(), body))
            .await?;
        Self::decode(path, response)
    }
}
