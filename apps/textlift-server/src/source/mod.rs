//! Image Source Module
//!
//! Normalizes the two ways a client can supply an image into a single
//! [`ImageReference`]:
//! - an uploaded file (multipart body or a base64 `data:` URL)
//! - a remote URL typed by the user
//!
//! Only one of them is authoritative when a conversion starts. Uploading
//! clears the URL. Typing a URL leaves an earlier upload in place, and a
//! non-empty URL wins at extraction time.

mod loader;

pub use loader::{ImageLoader, LoadError, LoadedImage};

use base64::Engine;
use serde::Serialize;

/// Image bytes supplied by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Declared MIME type (may be `application/octet-stream`)
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Decode a `data:<mime>;base64,<payload>` string
    pub fn from_data_url(data_url: &str) -> Result<Self, SourceError> {
        let rest = data_url
            .trim()
            .strip_prefix("data:")
            .ok_or(SourceError::InvalidDataUrl("missing data: prefix"))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or(SourceError::InvalidDataUrl("missing payload separator"))?;
        let mime_type = meta
            .strip_suffix(";base64")
            .ok_or(SourceError::InvalidDataUrl("only base64 data URLs are supported"))?;

        let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
        if bytes.is_empty() {
            return Err(SourceError::Empty);
        }

        let mime_type = if mime_type.is_empty() {
            "application/octet-stream"
        } else {
            mime_type
        };

        Ok(Self::new(mime_type, bytes))
    }

    /// Re-encode as a `data:` URL
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// The image a recognition job runs against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    Upload(UploadedImage),
    Url(String),
}

impl ImageReference {
    pub fn kind(&self) -> ImageKind {
        match self {
            Self::Upload(_) => ImageKind::Upload,
            Self::Url(_) => ImageKind::Url,
        }
    }
}

/// Which input mode is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Upload,
    Url,
}

/// Holds the upload and URL candidates for one session
#[derive(Debug, Clone, Default)]
pub struct ImageSourceResolver {
    upload: Option<UploadedImage>,
    url: String,
}

impl ImageSourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select an uploaded image; clears any URL
    pub fn set_upload(&mut self, image: UploadedImage) {
        self.upload = Some(image);
        self.url.clear();
    }

    /// Store the URL candidate as typed. No validation happens here.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn url(&self) -> Option<&str> {
        if self.url.is_empty() {
            None
        } else {
            Some(&self.url)
        }
    }

    pub fn upload(&self) -> Option<&UploadedImage> {
        self.upload.as_ref()
    }

    pub fn has_image(&self) -> bool {
        self.upload.is_some() || !self.url.is_empty()
    }

    /// The reference a conversion would use right now (URL first)
    pub fn authoritative(&self) -> Option<ImageReference> {
        if !self.url.is_empty() {
            return Some(ImageReference::Url(self.url.clone()));
        }
        self.upload.clone().map(ImageReference::Upload)
    }

    pub fn clear(&mut self) {
        self.upload = None;
        self.url.clear();
    }
}

/// Errors raised while accepting client supplied image data
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(&'static str),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Uploaded image is empty")]
    Empty,

    #[error("Uploaded image is too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },
}
