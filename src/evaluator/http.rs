use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::{parse_payload, EvaluationBackend, EvaluationError, ScorePayload};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Talks to the evaluation API (`GET /evaluate?url=..&age=..`).
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .with_context(|| format!("invalid evaluator url '{base_url}'"))?;
        // `join` replaces the last segment unless the base ends in a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .build()
            .context("failed to build evaluator http client")?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, EvaluationError> {
        self.base_url.join(path).map_err(|err| EvaluationError::Remote {
            code: None,
            message: format!("cannot build {path} url: {err}"),
        })
    }
}

#[async_trait]
impl EvaluationBackend for HttpBackend {
    async fn evaluate(
        &self,
        unit_url: &str,
        context_param: f64,
    ) -> Result<ScorePayload, EvaluationError> {
        let endpoint = self.endpoint("evaluate")?;
        debug!("GET {endpoint} url={unit_url} age={context_param}");

        let response = self
            .client
            .get(endpoint)
            .query(&[("url", unit_url.to_string()), ("age", context_param.to_string())])
            .send()
            .await
            .map_err(|err| EvaluationError::Remote {
                code: err.status().map(|status| status.as_u16()),
                message: err.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| EvaluationError::Remote {
            code: Some(status.as_u16()),
            message: format!("failed to read response body: {err}"),
        })?;

        if !status.is_success() {
            return Err(EvaluationError::Remote {
                code: Some(status.as_u16()),
                message: error_message(status, &body),
            });
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|err| EvaluationError::BadPayload(format!("response is not JSON: {err}")))?;
        parse_payload(value)
    }

    async fn health(&self) -> bool {
        let Ok(endpoint) = self.endpoint("health") else {
            return false;
        };
        match self.client.get(endpoint).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!("health probe failed: {err}");
                false
            }
        }
    }
}

/// Prefers the API's `message`, then `error`, then the raw body.
fn error_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|value| value.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    field("message")
        .or_else(|| field("error"))
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    /// Serves one canned response and hands back the request line it saw.
    async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                let read = socket.read(&mut buf).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            let request = String::from_utf8_lossy(&request).into_owned();
            request.lines().next().unwrap_or_default().to_string()
        });
        (base_url, task)
    }

    #[tokio::test]
    async fn evaluate_reads_flat_scores() {
        let (base_url, server) =
            serve_once("200 OK", r#"{"dev_score": 72.5, "brainrot_index": 18.0}"#).await;
        let backend = HttpBackend::new(&base_url).unwrap();

        let payload = backend
            .evaluate("https://www.youtube.com/watch?v=jNQXAC9IVRw", 7.0)
            .await
            .unwrap();
        assert_eq!(payload.primary_score, 72.5);
        assert_eq!(payload.risk_score, 18.0);

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("GET /evaluate?"), "{request_line}");
        assert!(
            request_line.contains("url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3DjNQXAC9IVRw"),
            "{request_line}"
        );
        assert!(request_line.contains("&age=7 "), "{request_line}");
    }

    #[tokio::test]
    async fn evaluate_reads_nested_scores() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"overall_scores": {"development_score": 55.0, "brainrot_index": 41.0}}"#,
        )
        .await;
        let backend = HttpBackend::new(&base_url).unwrap();

        let payload = backend
            .evaluate("https://www.youtube.com/watch?v=abc", 12.5)
            .await
            .unwrap();
        assert_eq!(payload.primary_score, 55.0);
        assert_eq!(payload.risk_score, 41.0);
        assert!(server.await.unwrap().contains("age=12.5"));
    }

    #[tokio::test]
    async fn evaluate_surfaces_the_api_error_message() {
        let (base_url, server) = serve_once(
            "400 Bad Request",
            r#"{"error": "Invalid age", "message": "Age must be between 0 and 18"}"#,
        )
        .await;
        let backend = HttpBackend::new(&base_url).unwrap();

        let err = backend
            .evaluate("https://www.youtube.com/watch?v=abc", 30.0)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EvaluationError::Remote {
                code: Some(400),
                message: "Age must be between 0 and 18".into(),
            }
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn evaluate_rejects_a_body_that_is_not_json() {
        let (base_url, server) = serve_once("200 OK", "<html>maintenance</html>").await;
        let backend = HttpBackend::new(&base_url).unwrap();

        let err = backend
            .evaluate("https://www.youtube.com/watch?v=abc", 7.0)
            .await
            .unwrap_err();
        assert!(
            matches!(&err, EvaluationError::BadPayload(message) if message.starts_with("response is not JSON")),
            "{err:?}"
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn evaluate_reports_an_unreachable_service_without_a_code() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);
        let backend = HttpBackend::new(&base_url).unwrap();

        let err = backend
            .evaluate("https://www.youtube.com/watch?v=abc", 7.0)
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Remote { code: None, .. }), "{err:?}");
    }

    #[test]
    fn error_message_prefers_message_field() {
        let body = r#"{"error": "Invalid age", "message": "Age must be between 0 and 18"}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, body),
            "Age must be between 0 and 18"
        );
    }

    #[test]
    fn error_message_falls_back_to_error_then_body_then_reason() {
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, r#"{"error": "File not found"}"#),
            "File not found"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream exploded"),
            "upstream exploded"
        );
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, "  "),
            "Internal Server Error"
        );
    }

    #[test]
    fn endpoints_resolve_against_base_url() {
        let backend = HttpBackend::new("http://localhost:5001/").unwrap();
        assert_eq!(
            backend.endpoint("evaluate").unwrap().as_str(),
            "http://localhost:5001/evaluate"
        );
        assert_eq!(
            backend.endpoint("health").unwrap().as_str(),
            "http://localhost:5001/health"
        );
    }

    #[test]
    fn base_url_with_path_keeps_its_prefix() {
        let backend = HttpBackend::new("http://evaluator.internal/api").unwrap();
        assert_eq!(
            backend.endpoint("evaluate").unwrap().as_str(),
            "http://evaluator.internal/api/evaluate"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(HttpBackend::new("not a url").is_err());
    }
}
