// src/ocr_client.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::{info, warn};

use crate::config::OcrSection;
use crate::errors::ReceiptError;
use crate::types::OcrPayload;

/// Anything that turns image bytes into OCR fragments.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<OcrPayload, ReceiptError>;
}

/// Client for the OCR service's `POST /ocr` endpoint.
pub struct HttpOcrEngine {
    client: Client,
    base_url: String,
}

impl HttpOcrEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(ocr: &OcrSection) -> Self {
        Self::new(&ocr.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the OCR server answers at all.
    pub async fn is_reachable(&self) -> bool {
        match self
            .client
            .get(&self.base_url)
            .timeout(Duration::from_secs(3))
            .send()
            .await
        {
            Ok(resp) => {
                info!(status = %resp.status(), "OCR server is reachable");
                true
            }
            Err(e) => {
                warn!(error = %e, url = %self.base_url, "OCR server not reachable");
                false
            }
        }
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    async fn recognize(&self, image: &[u8]) -> Result<OcrPayload, ReceiptError> {
        let url = format!("{}/ocr", self.base_url);
        let form = Form::new().part("file", Part::bytes(image.to_vec()).file_name("receipt.jpg"));

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ReceiptError::OcrUnavailable {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReceiptError::OcrResponse(format!("{status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ReceiptError::OcrUnavailable {
                reason: e.to_string(),
            })?;
        let payload: OcrPayload = serde_json::from_str(&body)
            .map_err(|e| ReceiptError::OcrResponse(format!("malformed OCR payload: {e}")))?;

        info!(
            fragments = payload.results.len(),
            processing_time = ?payload.processing_time,
            "OCR response received"
        );
        Ok(payload)
    }
}

/// Run `engine` with a hard deadline.
///
/// A timeout surfaces as [`ReceiptError::OcrUnavailable`], never as an empty
/// payload, so callers cannot mistake it for "not a receipt". No retries.
pub async fn recognize_with_timeout<E>(
    engine: &E,
    image: &[u8],
    timeout: Duration,
) -> Result<OcrPayload, ReceiptError>
where
    E: OcrEngine + ?Sized,
{
    match tokio::time::timeout(timeout, engine.recognize(image)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "OCR call timed out");
            Err(ReceiptError::OcrUnavailable {
                reason: format!("no response within {}ms", timeout.as_millis()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OcrFragment;

    struct StubEngine;

    #[async_trait]
    impl OcrEngine for StubEngine {
        async fn recognize(&self, image: &[u8]) -> Result<OcrPayload, ReceiptError> {
            Ok(OcrPayload {
                results: vec![OcrFragment::text_only(format!("{} bytes", image.len()))],
                ..OcrPayload::default()
            })
        }
    }

    struct SlowEngine;

    #[async_trait]
    impl OcrEngine for SlowEngine {
        async fn recognize(&self, _image: &[u8]) -> Result<OcrPayload, ReceiptError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(OcrPayload::default())
        }
    }

    struct DownEngine;

    #[async_trait]
    impl OcrEngine for DownEngine {
        async fn recognize(&self, _image: &[u8]) -> Result<OcrPayload, ReceiptError> {
            Err(ReceiptError::OcrUnavailable {
                reason: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn fast_engine_result_passes_through() {
        let payload = recognize_with_timeout(&StubEngine, b"abc", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(payload.results[0].text, "3 bytes");
    }

    #[tokio::test]
    async fn slow_engine_is_reported_unavailable() {
        let err = recognize_with_timeout(&SlowEngine, b"abc", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, ReceiptError::OcrUnavailable { .. }));
    }

    #[tokio::test]
    async fn engine_errors_are_not_swallowed() {
        let engine: Box<dyn OcrEngine> = Box::new(DownEngine);
        let err = recognize_with_timeout(engine.as_ref(), b"", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let engine = HttpOcrEngine::new("http://localhost:8000/");
        assert_eq!(engine.base_url(), "http://localhost:8000");
    }
}
