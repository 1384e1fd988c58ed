//! Configuration management for Textlift Server

use std::env;

use crate::ocr::{LanguageCode, OcrBackendKind, OcrServiceConfig};
use crate::session::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_EXPIRY_MINUTES};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub images: ImageConfig,
    pub sessions: SessionConfig,
    pub clipboard: ClipboardMode,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub engines: Vec<OcrBackendKind>,
    pub tesseract_path: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub default_language: LanguageCode,
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Timeout for fetching URL images
    pub fetch_timeout_secs: u64,
    /// Largest accepted image, uploaded or fetched
    pub max_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_sessions: usize,
    pub expiry_minutes: i64,
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardMode {
    Memory,
    System,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            ocr: OcrConfig {
                engines: vec![OcrBackendKind::Tesseract, OcrBackendKind::Ollama],
                tesseract_path: "tesseract".to_string(),
                ollama_url: "http://localhost:11434".to_string(),
                ollama_model: "llava".to_string(),
                default_language: LanguageCode::Eng,
            },
            images: ImageConfig {
                fetch_timeout_secs: 30,
                max_bytes: 20 * 1024 * 1024,
            },
            sessions: SessionConfig {
                max_sessions: DEFAULT_MAX_SESSIONS,
                expiry_minutes: DEFAULT_SESSION_EXPIRY_MINUTES,
                cleanup_interval_secs: 300,
            },
            clipboard: ClipboardMode::Memory,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let engines = match env::var("OCR_ENGINES") {
            Ok(list) => list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<OcrBackendKind>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|reason| ConfigError::Invalid {
                    name: "OCR_ENGINES",
                    reason,
                })?,
            Err(_) => defaults.ocr.engines,
        };

        let default_language = match env::var("OCR_DEFAULT_LANGUAGE") {
            Ok(code) => code.parse().map_err(|e: crate::ocr::OcrError| ConfigError::Invalid {
                name: "OCR_DEFAULT_LANGUAGE",
                reason: e.to_string(),
            })?,
            Err(_) => defaults.ocr.default_language,
        };

        let clipboard = match env::var("CLIPBOARD").unwrap_or_default().as_str() {
            "system" => ClipboardMode::System,
            _ => ClipboardMode::Memory,
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_or("SERVER_PORT", defaults.server.port),
            },
            ocr: OcrConfig {
                engines,
                tesseract_path: env::var("TESSERACT_PATH").unwrap_or(defaults.ocr.tesseract_path),
                ollama_url: env::var("OLLAMA_URL").unwrap_or(defaults.ocr.ollama_url),
                ollama_model: env::var("OLLAMA_MODEL").unwrap_or(defaults.ocr.ollama_model),
                default_language,
            },
            images: ImageConfig {
                fetch_timeout_secs: parse_or("FETCH_TIMEOUT_SECS", defaults.images.fetch_timeout_secs),
                max_bytes: parse_or("MAX_IMAGE_BYTES", defaults.images.max_bytes),
            },
            sessions: SessionConfig {
                max_sessions: parse_or("MAX_SESSIONS", defaults.sessions.max_sessions),
                expiry_minutes: parse_or("SESSION_EXPIRY_MINUTES", defaults.sessions.expiry_minutes),
                cleanup_interval_secs: parse_or(
                    "SESSION_CLEANUP_SECS",
                    defaults.sessions.cleanup_interval_secs,
                ),
            },
            clipboard,
        })
    }

    pub fn ocr_service_config(&self) -> OcrServiceConfig {
        OcrServiceConfig {
            backends: self.ocr.engines.clone(),
            tesseract_path: self.ocr.tesseract_path.clone(),
            ollama_url: self.ocr.ollama_url.clone(),
            ollama_model: self.ocr.ollama_model.clone(),
        }
    }
}

/// Read a numeric variable, falling back when missing or malformed
fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.ocr.default_language, LanguageCode::Eng);
        assert_eq!(config.clipboard, ClipboardMode::Memory);

        let ocr = config.ocr_service_config();
        assert_eq!(ocr.backends, vec![OcrBackendKind::Tesseract, OcrBackendKind::Ollama]);
        assert_eq!(ocr.ollama_model, "llava");
    }

    #[test]
    fn test_parse_or_falls_back() {
        assert_eq!(parse_or("TEXTLIFT_TEST_UNSET_VARIABLE", 42u16), 42);
    }
}
