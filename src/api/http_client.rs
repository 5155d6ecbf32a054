use std::collections::HashMap;
use std::time::Duration;

use tracing::trace;

use crate::error::ApiResult;

/// HTTP method enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    GET,
    POST,
}

/// Response data captured from the transport
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    status_code: u16,
    /// Response body
    body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status_code: status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status_code
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Check if successful (2xx status)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Trait for HTTP client operations, allowing for mocking
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str, headers: HashMap<String, String>) -> ApiResult<HttpResponse>;

    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> ApiResult<HttpResponse>;
}

/// Implementation of HttpClient using reqwest
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> ApiResult<HttpResponse> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        trace!(status, "HTTP response received");
        Ok(HttpResponse::new(status, body))
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, headers: HashMap<String, String>) -> ApiResult<HttpResponse> {
        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(key, value);
        }
        self.send(request).await
    }

    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> ApiResult<HttpResponse> {
        let mut request = self.client.post(url).body(body);
        for (key, value) in headers {
            request = request.header(key, value);
        }
        self.send(request).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn test_reqwest_client_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/ping")
            .match_header("x-test", "1")
            .with_status(200)
            .with_body("pong")
            .create_async()
            .await;
        let created = server
            .mock("POST", "/items")
            .match_body("{\"name\":\"tent\"}")
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;

        let client = ReqwestHttpClient::new(Duration::from_secs(5));

        let mut headers = HashMap::new();
        headers.insert("x-test".to_string(), "1".to_string());
        let response = client
            .get(&format!("{}/ping", server.url()), headers)
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), "pong");
        assert!(response.is_success());

        let response = client
            .post(
                &format!("{}/items", server.url()),
                HashMap::new(),
                "{\"name\":\"tent\"}".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 201);

        ok.assert_async().await;
        created.assert_async().await;
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_error() {
        let client = ReqwestHttpClient::new(Duration::from_secs(2));
        // Port 9 (discard) on localhost is essentially never listening
        let err = client
            .get("http://127.0.0.1:9/unreachable", HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err.code, ErrorCode::Network | ErrorCode::Timeout));
    }
}
