//! Clipboard sinks
//!
//! The copy action writes the extracted text to a [`ClipboardSink`]. The
//! server keeps the last copied text in memory by default; the host clipboard
//! is available behind the `system-clipboard` feature.

use async_trait::async_trait;
use parking_lot::Mutex;

/// Clipboard error types
#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to write clipboard: {0}")]
    Write(String),

    #[error("Clipboard task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[async_trait]
pub trait ClipboardSink: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Keeps the last copied text
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    last: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.last.lock().clone()
    }
}

#[async_trait]
impl ClipboardSink for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        *self.last.lock() = Some(text.to_string());
        Ok(())
    }
}

/// Host clipboard via arboard
#[cfg(feature = "system-clipboard")]
#[derive(Debug, Default)]
pub struct SystemClipboard;

#[cfg(feature = "system-clipboard")]
#[async_trait]
impl ClipboardSink for SystemClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let text = text.to_string();

        // arboard talks to the display server synchronously
        tokio::task::spawn_blocking(move || {
            let mut clipboard = arboard::Clipboard::new()
                .map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
            clipboard
                .set_text(text)
                .map_err(|e| ClipboardError::Write(e.to_string()))
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_clipboard_keeps_last_text() {
        let clipboard = MemoryClipboard::new();
        assert_eq!(clipboard.contents(), None);

        clipboard.write_text("first").await.unwrap();
        clipboard.write_text("second").await.unwrap();
        assert_eq!(clipboard.contents().as_deref(), Some("second"));
    }
}
