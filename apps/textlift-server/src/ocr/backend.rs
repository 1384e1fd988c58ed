//! OCR Backends
//!
//! Defines the backend trait and implementations for the OCR programs the
//! service can delegate to.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::types::{LanguageCode, OcrBackendKind, OcrError, ProgressSink, Recognition, RecognitionPhase};
use crate::source::LoadedImage;

/// OCR backend trait
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Get the backend type
    fn kind(&self) -> OcrBackendKind;

    /// Check if the backend is available
    async fn is_available(&self) -> bool;

    /// Perform OCR on an image
    async fn recognize(
        &self,
        image: &LoadedImage,
        language: LanguageCode,
        progress: &dyn ProgressSink,
    ) -> Result<Recognition, OcrError>;
}

/// Tesseract OCR backend (shells out to the `tesseract` binary)
pub struct TesseractBackend {
    /// Path or name of the tesseract executable
    binary: String,
}

impl TesseractBackend {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

#[async_trait]
impl OcrBackend for TesseractBackend {
    fn kind(&self) -> OcrBackendKind {
        OcrBackendKind::Tesseract
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    async fn recognize(
        &self,
        image: &LoadedImage,
        language: LanguageCode,
        progress: &dyn ProgressSink,
    ) -> Result<Recognition, OcrError> {
        let input_path = std::env::temp_dir().join(format!(
            "textlift_input_{}.{}",
            uuid::Uuid::new_v4(),
            image.extension()
        ));

        tokio::fs::write(&input_path, &image.bytes)
            .await
            .map_err(|e| OcrError::ProcessingError(format!("Failed to write temp file: {}", e)))?;

        progress.report(RecognitionPhase::InitializingApi, 1.0);
        progress.report(RecognitionPhase::RecognizingText, 0.0);

        // "stdout" as the output base makes tesseract print instead of writing a file
        let output = Command::new(&self.binary)
            .arg(&input_path)
            .arg("stdout")
            .arg("-l")
            .arg(language.code())
            .arg("--oem")
            .arg("3")
            .arg("--psm")
            .arg("3")
            .output()
            .await;

        let _ = tokio::fs::remove_file(&input_path).await;

        let output = output
            .map_err(|e| OcrError::ProcessingError(format!("Failed to run tesseract: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::ProcessingError(format!(
                "Tesseract failed: {}",
                stderr.trim()
            )));
        }

        progress.report(RecognitionPhase::RecognizingText, 1.0);

        Ok(Recognition {
            text: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            backend: OcrBackendKind::Tesseract,
        })
    }
}

/// Ollama vision model backend
pub struct OllamaBackend {
    client: reqwest::Client,
    /// Ollama API URL
    base_url: String,
    /// Model name (e.g., "llava", "bakllava")
    model: String,
}

/// Connect timeout for every Ollama request
const OLLAMA_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Whole-request timeout for the `/api/tags` availability check
const OLLAMA_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(OLLAMA_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build Ollama client with timeout: {}, using defaults", e);
                reqwest::Client::new()
            });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl OcrBackend for OllamaBackend {
    fn kind(&self) -> OcrBackendKind {
        OcrBackendKind::Ollama
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).timeout(OLLAMA_PROBE_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn recognize(
        &self,
        image: &LoadedImage,
        language: LanguageCode,
        progress: &dyn ProgressSink,
    ) -> Result<Recognition, OcrError> {
        use base64::Engine;

        let url = format!("{}/api/generate", self.base_url);
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(&image.bytes);

        let prompt = format!(
            "Extract all text from this image exactly as written. The text is in {}. Return only the extracted text, nothing else.",
            language.display_name()
        );

        let request = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "images": [image_base64],
            "stream": false
        });

        progress.report(RecognitionPhase::InitializingApi, 1.0);
        progress.report(RecognitionPhase::RecognizingText, 0.0);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| OcrError::ApiError(format!("Failed to call Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::ApiError(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OcrError::ApiError(format!("Failed to parse response: {}", e)))?;

        let text = result["response"].as_str().unwrap_or("").trim().to_string();

        progress.report(RecognitionPhase::RecognizingText, 1.0);

        Ok(Recognition {
            text,
            backend: OcrBackendKind::Ollama,
        })
    }
}

/// Mock backend for testing
#[cfg(test)]
pub struct MockBackend {
    pub kind: OcrBackendKind,
    pub available: bool,
    pub outcome: Result<String, String>,
    pub calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockBackend {
    pub fn ok(kind: OcrBackendKind, text: &str) -> Self {
        Self {
            kind,
            available: true,
            outcome: Ok(text.to_string()),
            calls: Default::default(),
        }
    }

    pub fn failing(kind: OcrBackendKind, message: &str) -> Self {
        Self {
            kind,
            available: true,
            outcome: Err(message.to_string()),
            calls: Default::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl OcrBackend for MockBackend {
    fn kind(&self) -> OcrBackendKind {
        self.kind
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn recognize(
        &self,
        _image: &LoadedImage,
        _language: LanguageCode,
        progress: &dyn ProgressSink,
    ) -> Result<Recognition, OcrError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        progress.report(RecognitionPhase::RecognizingText, 0.5);
        match &self.outcome {
            Ok(text) => {
                progress.report(RecognitionPhase::RecognizingText, 1.0);
                Ok(Recognition {
                    text: text.clone(),
                    backend: self.kind,
                })
            }
            Err(message) => Err(OcrError::ProcessingError(message.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_tesseract_binary_is_unavailable() {
        let backend = TesseractBackend::new("/nonexistent/textlift-tesseract");
        assert!(!backend.is_available().await);
        assert_eq!(backend.kind(), OcrBackendKind::Tesseract);
    }

    #[test]
    fn test_ollama_base_url_trailing_slash() {
        let backend = OllamaBackend::new("http://localhost:11434/", "llava");
        assert_eq!(backend.base_url, "http://localhost:11434");
        assert_eq!(backend.model, "llava");
    }

    #[tokio::test]
    async fn test_unreachable_ollama_fails_fast() {
        // Non-routable address; the connect never completes on its own
        let backend = OllamaBackend::new("http://10.255.255.1:11434", "llava");
        let available = tokio::time::timeout(Duration::from_secs(10), backend.is_available())
            .await
            .expect("availability check should be bounded by the client timeouts");
        assert!(!available);
    }
}
