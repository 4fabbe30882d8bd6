//! Cloud conversion fallbacks.
//!
//! When local Ghostscript passes fail, the engine consults up to two
//! network conversion services in configured order. Each call uploads the
//! document as multipart form data with the target profile as form fields
//! and expects either the converted PDF directly or a JSON body pointing at
//! a download URL.
//!
//! Failure classification drives the group policy:
//!
//! * transport-level failures (DNS, refused connection, TLS trust, timeout)
//!   are [`StageError::CloudUnreachable`] — the host has no working network
//!   path, so the rest of the group is skipped;
//! * an HTTP error status is [`StageError::CloudRejected`] — specific to
//!   this service, the next one may still be tried.

use crate::config::{CloudServiceConfig, ComplianceThresholds};
use crate::error::StageError;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};

/// Response body shape when a service returns a download pointer instead of
/// the document itself.
#[derive(Debug, serde::Deserialize)]
struct ConvertedPointer {
    url: String,
}

/// One configured cloud conversion service.
#[derive(Debug)]
pub struct CloudConverter<'a> {
    service: &'a CloudServiceConfig,
    timeout: Duration,
}

impl<'a> CloudConverter<'a> {
    pub fn new(service: &'a CloudServiceConfig, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    pub fn name(&self) -> &str {
        &self.service.name
    }

    /// Upload `input` for conversion to the target profile and return the
    /// converted document bytes.
    pub async fn convert(
        &self,
        input: &[u8],
        filename: &str,
        thresholds: &ComplianceThresholds,
    ) -> Result<Vec<u8>, StageError> {
        info!(
            "cloud conversion via '{}' ({} bytes)",
            self.service.name,
            input.len()
        );

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| self.unreachable(format!("client construction: {e}")))?;

        let file_part = Part::bytes(input.to_vec())
            .file_name(filename.to_string())
            .mime_str("application/pdf")
            .map_err(|e| self.unreachable(format!("multipart assembly: {e}")))?;
        let form = Form::new()
            .part("file", file_part)
            .text("targetDpi", thresholds.required_dpi.to_string())
            .text("colorSpace", thresholds.required_color_space)
            .text(
                "bitDepth",
                thresholds.required_bits_per_component.to_string(),
            );

        let response = client
            .post(&self.service.endpoint)
            .bearer_auth(&self.service.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = body_snippet(response).await;
            return Err(StageError::CloudRejected {
                service: self.service.name.clone(),
                status: status.as_u16(),
                detail,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let bytes = if content_type.starts_with("application/pdf") {
            response
                .bytes()
                .await
                .map_err(|e| self.classify(e))?
                .to_vec()
        } else {
            // JSON pointer: fetch the converted document from the URL the
            // service handed back.
            let pointer: ConvertedPointer = response
                .json()
                .await
                .map_err(|e| self.rejected(status, format!("unexpected response body: {e}")))?;
            debug!("'{}' returned pointer {}", self.service.name, pointer.url);
            let download = client
                .get(&pointer.url)
                .bearer_auth(&self.service.api_key)
                .send()
                .await
                .map_err(|e| self.classify(e))?;
            let dl_status = download.status();
            if !dl_status.is_success() {
                let detail = body_snippet(download).await;
                return Err(self.rejected(dl_status, format!("download failed: {detail}")));
            }
            download
                .bytes()
                .await
                .map_err(|e| self.classify(e))?
                .to_vec()
        };

        if bytes.is_empty() {
            return Err(StageError::EmptyArtifact {
                stage: format!("cloud-{}", self.service.name),
            });
        }
        Ok(bytes)
    }

    /// Map a transport error onto the group-vs-service distinction. Every
    /// pre-response reqwest failure is transport-level from the engine's
    /// point of view; HTTP status errors never reach this path.
    fn classify(&self, e: reqwest::Error) -> StageError {
        let kind = if e.is_timeout() {
            "timeout"
        } else if e.is_connect() {
            "connect"
        } else {
            "transport"
        };
        self.unreachable(format!("{kind}: {e}"))
    }

    fn unreachable(&self, detail: String) -> StageError {
        StageError::CloudUnreachable {
            service: self.service.name.clone(),
            detail,
        }
    }

    fn rejected(&self, status: StatusCode, detail: String) -> StageError {
        StageError::CloudRejected {
            service: self.service.name.clone(),
            status: status.as_u16(),
            detail,
        }
    }
}

/// First part of an error response body, for attempt records.
async fn body_snippet(response: reqwest::Response) -> String {
    const MAX: usize = 200;
    match response.text().await {
        Ok(body) => {
            let trimmed = body.trim();
            let cut = trimmed
                .char_indices()
                .nth(MAX)
                .map(|(i, _)| i)
                .unwrap_or(trimmed.len());
            trimmed[..cut].to_string()
        }
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(endpoint: &str) -> CloudServiceConfig {
        CloudServiceConfig {
            name: "test-svc".into(),
            endpoint: endpoint.into(),
            api_key: "secret".into(),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_connectivity_class() {
        // Port 9 on localhost: nothing listens there, connect is refused
        // immediately, no external network is touched.
        let svc = service("https://127.0.0.1:9/convert");
        let converter = CloudConverter::new(&svc, Duration::from_secs(2));
        let err = converter
            .convert(b"%PDF-1.4", "doc.pdf", &ComplianceThresholds::default())
            .await
            .unwrap_err();
        assert!(err.is_connectivity(), "got: {err:?}");
    }

    #[test]
    fn pointer_body_shape() {
        let p: ConvertedPointer =
            serde_json::from_str(r#"{"url": "https://cdn.example/out.pdf", "extra": 1}"#).unwrap();
        assert_eq!(p.url, "https://cdn.example/out.pdf");
    }
}
