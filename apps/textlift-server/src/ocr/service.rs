//! OCR Service
//!
//! Loads the image behind a reference and hands it to the first available
//! backend, falling through to the next one on failure.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    backend::{OcrBackend, OllamaBackend, TesseractBackend},
    engine::RecognitionEngine,
    types::{LanguageCode, OcrBackendKind, OcrError, ProgressSink, Recognition, RecognitionPhase},
};
use crate::source::{ImageLoader, ImageReference};

/// OCR service configuration
#[derive(Debug, Clone)]
pub struct OcrServiceConfig {
    /// Preferred backend order
    pub backends: Vec<OcrBackendKind>,
    /// Tesseract executable
    pub tesseract_path: String,
    /// Ollama base URL
    pub ollama_url: String,
    /// Ollama model name
    pub ollama_model: String,
}

impl Default for OcrServiceConfig {
    fn default() -> Self {
        Self {
            backends: vec![OcrBackendKind::Tesseract, OcrBackendKind::Ollama],
            tesseract_path: "tesseract".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llava".to_string(),
        }
    }
}

/// OCR service for recognizing session images
pub struct OcrService {
    loader: ImageLoader,
    backends: Vec<Arc<dyn OcrBackend>>,
}

impl OcrService {
    /// Create a new OCR service
    pub fn new(config: &OcrServiceConfig, loader: ImageLoader) -> Self {
        let mut backends: Vec<Arc<dyn OcrBackend>> = Vec::new();

        for kind in &config.backends {
            if backends.iter().any(|b| b.kind() == *kind) {
                continue;
            }
            match kind {
                OcrBackendKind::Tesseract => {
                    backends.push(Arc::new(TesseractBackend::new(&config.tesseract_path)));
                }
                OcrBackendKind::Ollama => {
                    backends.push(Arc::new(OllamaBackend::new(
                        &config.ollama_url,
                        &config.ollama_model,
                    )));
                }
            }
        }

        Self { loader, backends }
    }

    /// Create a service over an explicit backend list
    pub fn with_backends(loader: ImageLoader, backends: Vec<Arc<dyn OcrBackend>>) -> Self {
        Self { loader, backends }
    }

    /// Get available backends
    pub async fn available_backends(&self) -> Vec<OcrBackendKind> {
        let mut available = Vec::new();
        for backend in &self.backends {
            if backend.is_available().await {
                available.push(backend.kind());
            }
        }
        available
    }
}

#[async_trait]
impl RecognitionEngine for OcrService {
    async fn recognize(
        &self,
        image: &ImageReference,
        language: LanguageCode,
        progress: &dyn ProgressSink,
    ) -> Result<Recognition, OcrError> {
        progress.report(RecognitionPhase::LoadingImage, 0.0);
        let loaded = self.loader.load(image).await?;
        progress.report(RecognitionPhase::LoadingImage, 1.0);

        tracing::debug!(
            format = ?loaded.format,
            bytes = loaded.bytes.len(),
            language = %language,
            "Image loaded for recognition"
        );

        // Try backends in order
        for backend in &self.backends {
            if !backend.is_available().await {
                tracing::debug!("OCR backend {:?} unavailable, skipping", backend.kind());
                continue;
            }

            match backend.recognize(&loaded, language, progress).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(
                        "OCR backend {:?} failed: {}, trying next",
                        backend.kind(),
                        e
                    );
                    continue;
                }
            }
        }

        Err(OcrError::BackendNotAvailable(
            "No OCR backends available".to_string(),
        ))
    }
}
