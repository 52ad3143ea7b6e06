//! HTTP seam for the save pipeline.
//!
//! The orchestrator only sees the [`Transport`] trait; the real
//! implementation posts multipart uploads with a process-wide shared
//! `reqwest` client, and tests substitute an in-memory fake.

use std::future::Future;
use std::sync::OnceLock;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {detail}")]
    Status { status: u16, detail: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    pub file_name: String,
    /// Target location on the document server; `None` lets the server pick.
    pub destination: Option<String>,
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedDocument {
    pub url: String,
}

pub trait Transport {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    fn upload(
        &self,
        endpoint: &str,
        request: UploadRequest,
    ) -> impl Future<Output = Result<UploadedDocument, TransportError>> + Send;
}

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Transport backed by the process-wide client. The first call builds
    /// the client; every later call reuses it, so this is safe to call from
    /// anywhere without re-running setup.
    pub fn shared() -> Self {
        Self { client: SHARED_CLIENT.get_or_init(reqwest::Client::new).clone() }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                detail: extract_detail(&body),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn upload(
        &self,
        endpoint: &str,
        request: UploadRequest,
    ) -> Result<UploadedDocument, TransportError> {
        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(request.bytes)
                    .file_name(request.file_name)
                    .mime_str("application/pdf")?,
            )
            .text("overwrite", if request.overwrite { "true" } else { "false" });

        if let Some(destination) = request.destination {
            form = form.text("destination", destination);
        }

        let response = self.client.post(endpoint).multipart(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                detail: extract_detail(&body),
            });
        }

        Ok(response.json::<UploadedDocument>().await?)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Pulls a human-readable detail out of a JSON error payload, falling back
/// to the raw body.
fn extract_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(payload) => payload.message.or(payload.error).unwrap_or_else(|| body.to_owned()),
        Err(_) => body.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_prefers_message_field() {
        assert_eq!(extract_detail(r#"{"message":"quota exceeded"}"#), "quota exceeded");
        assert_eq!(extract_detail(r#"{"error":"not found"}"#), "not found");
    }

    #[test]
    fn detail_falls_back_to_raw_body() {
        assert_eq!(extract_detail("internal server error"), "internal server error");
        assert_eq!(extract_detail(r#"{"code":500}"#), r#"{"code":500}"#);
    }
}
