//! Application state management

use std::sync::Arc;
use std::time::Duration;

use crate::clipboard::{ClipboardSink, MemoryClipboard};
use crate::config::{ClipboardMode, Config};
use crate::ocr::{OcrBackendKind, OcrService};
use crate::session::SessionManager;
use crate::source::ImageLoader;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    sessions: SessionManager,
    ocr: Arc<OcrService>,
    loader: ImageLoader,
    clipboard: Arc<dyn ClipboardSink>,
}

impl AppState {
    /// Build the state from configuration
    pub fn new(config: Config) -> Self {
        let loader = ImageLoader::new(
            Duration::from_secs(config.images.fetch_timeout_secs),
            config.images.max_bytes,
        );
        let ocr = Arc::new(OcrService::new(&config.ocr_service_config(), loader.clone()));
        let clipboard = clipboard_for(config.clipboard);

        Self::from_parts(config, ocr, loader, clipboard)
    }

    /// Assemble the state from prebuilt parts
    pub fn from_parts(
        config: Config,
        ocr: Arc<OcrService>,
        loader: ImageLoader,
        clipboard: Arc<dyn ClipboardSink>,
    ) -> Self {
        let sessions = SessionManager::with_limits(
            ocr.clone(),
            config.ocr.default_language,
            config.sessions.max_sessions,
            chrono::Duration::minutes(config.sessions.expiry_minutes),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                sessions,
                ocr,
                loader,
                clipboard,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the session manager
    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    /// Get the image loader (used for previews)
    pub fn loader(&self) -> &ImageLoader {
        &self.inner.loader
    }

    /// Get the clipboard sink
    pub fn clipboard(&self) -> &dyn ClipboardSink {
        self.inner.clipboard.as_ref()
    }

    /// OCR backends that currently respond
    pub async fn available_engines(&self) -> Vec<OcrBackendKind> {
        self.inner.ocr.available_backends().await
    }
}

fn clipboard_for(mode: ClipboardMode) -> Arc<dyn ClipboardSink> {
    match mode {
        ClipboardMode::Memory => Arc::new(MemoryClipboard::new()),
        #[cfg(feature = "system-clipboard")]
        ClipboardMode::System => Arc::new(crate::clipboard::SystemClipboard),
        #[cfg(not(feature = "system-clipboard"))]
        ClipboardMode::System => {
            tracing::warn!("Built without system-clipboard feature, copying to memory instead");
            Arc::new(MemoryClipboard::new())
        }
    }
}
