use async_trait::async_trait;
use flowrun_core::error::{ExternalCallError, Result};
use flowrun_core::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use serde_json::Value;
use tracing::debug;

const SERVICE: &str = "http";

fn to_reqwest(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
    }
}

/// [`HttpClient`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(to_reqwest(request.method), &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            None => builder,
            Some(Value::String(text)) => builder.body(text),
            Some(json) => builder.json(&json),
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ExternalCallError::Timeout {
                    service: SERVICE.into(),
                    after_ms: request.timeout.as_millis() as u64,
                }
            } else {
                ExternalCallError::transport(SERVICE, e)
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| ExternalCallError::transport(SERVICE, e))?;
        debug!(status, bytes = body.len(), "http response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one canned response and report the first bytes of the request.
    async fn serve_once(response: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        (format!("http://{addr}"), rx)
    }

    fn request(method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest {
            method,
            url,
            headers: vec![("X-Trace".into(), "7".into())],
            body: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn methods_map_one_to_one() {
        assert_eq!(to_reqwest(HttpMethod::Patch), reqwest::Method::PATCH);
        assert_eq!(to_reqwest(HttpMethod::Head), reqwest::Method::HEAD);
    }

    #[tokio::test]
    async fn returns_status_headers_and_body() {
        let (base, seen) = serve_once(
            "HTTP/1.1 201 Created\r\ncontent-type: application/json\r\ncontent-length: 11\r\nconnection: close\r\n\r\n{\"id\": 42}\n",
        )
        .await;
        let client = ReqwestHttpClient::new();
        let response = client
            .send(request(HttpMethod::Post, format!("{base}/items")))
            .await
            .unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(response.body_value()["id"], serde_json::json!(42));
        assert!(
            response
                .headers
                .iter()
                .any(|(k, v)| k == "content-type" && v == "application/json")
        );
        let raw = seen.await.unwrap();
        assert!(raw.starts_with("POST /items HTTP/1.1"));
        assert!(raw.to_ascii_lowercase().contains("x-trace: 7"));
    }

    #[tokio::test]
    async fn error_statuses_are_returned_not_raised() {
        let (base, _seen) = serve_once(
            "HTTP/1.1 404 Not Found\r\ncontent-length: 4\r\nconnection: close\r\n\r\ngone",
        )
        .await;
        let response = ReqwestHttpClient::new()
            .send(request(HttpMethod::Get, base))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.body, "gone");
    }

    #[tokio::test]
    async fn connection_failures_are_transport_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = ReqwestHttpClient::new()
            .send(request(HttpMethod::Get, format!("http://{addr}")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("http"));
    }
}
