//! OCR Types
//!
//! Defines the language set, progress phases and results shared by the
//! recognition engine and its backends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::source::LoadError;

/// OCR backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackendKind {
    /// Tesseract OCR (local binary)
    Tesseract,
    /// Ollama vision model (local LLM)
    Ollama,
}

impl Default for OcrBackendKind {
    fn default() -> Self {
        Self::Tesseract
    }
}

impl FromStr for OcrBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tesseract" => Ok(Self::Tesseract),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown OCR engine: {}", other)),
        }
    }
}

/// Recognition language (Tesseract traineddata code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    Eng,
    Deu,
    Fra,
    Spa,
    Por,
    Urd,
}

impl LanguageCode {
    /// Every supported language, in picker order
    pub const ALL: [LanguageCode; 6] = [
        LanguageCode::Eng,
        LanguageCode::Deu,
        LanguageCode::Fra,
        LanguageCode::Spa,
        LanguageCode::Por,
        LanguageCode::Urd,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Eng => "eng",
            Self::Deu => "deu",
            Self::Fra => "fra",
            Self::Spa => "spa",
            Self::Por => "por",
            Self::Urd => "urd",
        }
    }

    /// Human readable name for pickers and LLM prompts
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Eng => "English",
            Self::Deu => "German",
            Self::Fra => "French",
            Self::Spa => "Spanish",
            Self::Por => "Portuguese",
            Self::Urd => "Urdu",
        }
    }
}

impl Default for LanguageCode {
    fn default() -> Self {
        Self::Eng
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LanguageCode {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.code() == wanted)
            .ok_or_else(|| OcrError::UnsupportedLanguage(s.to_string()))
    }
}

/// Stage an engine reports progress for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionPhase {
    LoadingImage,
    InitializingApi,
    RecognizingText,
}

impl RecognitionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadingImage => "loading image",
            Self::InitializingApi => "initializing api",
            Self::RecognizingText => "recognizing text",
        }
    }
}

impl fmt::Display for RecognitionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives progress notifications while a recognition runs.
///
/// `fraction` is the engine's own completion estimate for `phase`, in `0.0..=1.0`.
pub trait ProgressSink: Send + Sync {
    fn report(&self, phase: RecognitionPhase, fraction: f32);
}

impl<F> ProgressSink for F
where
    F: Fn(RecognitionPhase, f32) + Send + Sync,
{
    fn report(&self, phase: RecognitionPhase, fraction: f32) {
        self(phase, fraction)
    }
}

/// OCR result
#[derive(Debug, Clone, Serialize)]
pub struct Recognition {
    /// Recognized text
    pub text: String,
    /// Backend that produced the text
    pub backend: OcrBackendKind,
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] LoadError),

    #[error("OCR processing failed: {0}")]
    ProcessingError(String),

    #[error("API error: {0}")]
    ApiError(String),
}
