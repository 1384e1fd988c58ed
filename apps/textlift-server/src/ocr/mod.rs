//! OCR Module
//!
//! Provides the Recognition Engine used by sessions.
//!
//! Supports multiple backends:
//! - Tesseract (local, requires the `tesseract` binary)
//! - Ollama vision models (local LLM)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use textlift_server::ocr::{LanguageCode, OcrService, OcrServiceConfig, RecognitionEngine};
//!
//! let service = OcrService::new(&OcrServiceConfig::default(), loader);
//!
//! // Check available backends
//! let backends = service.available_backends().await;
//!
//! let result = service
//!     .recognize(&reference, LanguageCode::Eng, &|phase, fraction| {
//!         println!("{phase}: {fraction}");
//!     })
//!     .await?;
//! ```

mod backend;
mod engine;
mod service;
mod types;

pub use backend::{OcrBackend, OllamaBackend, TesseractBackend};
pub use engine::RecognitionEngine;
pub use service::{OcrService, OcrServiceConfig};
pub use types::{
    LanguageCode, OcrBackendKind, OcrError, ProgressSink, Recognition, RecognitionPhase,
};
