//! Image loading
//!
//! Turns an [`ImageReference`] into bytes the OCR backends can consume and
//! checks that the bytes actually look like an image.

use std::time::Duration;

use super::{ImageReference, UploadedImage};

/// Image bytes plus the sniffed format
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub bytes: Vec<u8>,
    pub format: image::ImageFormat,
}

impl LoadedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// File extension to use for temp files handed to external tools
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

/// Image loading error types
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch image: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Image server returned {0}")]
    Status(u16),

    #[error("Image too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Content is not a recognizable image")]
    NotAnImage,

    #[error("Invalid data URL: {0}")]
    DataUrl(#[from] super::SourceError),
}

/// Fetches and validates images
#[derive(Clone)]
pub struct ImageLoader {
    client: reqwest::Client,
    max_bytes: usize,
}

impl ImageLoader {
    pub fn new(timeout: Duration, max_bytes: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}, using defaults", e);
                reqwest::Client::new()
            });

        Self { client, max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Resolve a reference into validated image bytes
    pub async fn load(&self, reference: &ImageReference) -> Result<LoadedImage, LoadError> {
        let bytes = match reference {
            ImageReference::Upload(upload) => upload.bytes.clone(),
            ImageReference::Url(url) => self.fetch(url).await?,
        };

        self.validate(bytes)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let url = url.trim();

        // Browsers accept data URLs in an <img src>, so the URL field does too
        if url.starts_with("data:") {
            return Ok(UploadedImage::from_data_url(url)?.bytes);
        }

        let parsed = reqwest::Url::parse(url).map_err(|e| LoadError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LoadError::InvalidUrl(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        tracing::debug!(url = %parsed, "Fetching image");

        let mut response = self.client.get(parsed).send().await?;
        if !response.status().is_success() {
            return Err(LoadError::Status(response.status().as_u16()));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_bytes {
                return Err(LoadError::TooLarge {
                    size: length as usize,
                    max: self.max_bytes,
                });
            }
        }

        // Content-Length is optional, so the cap is enforced while reading
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let size = bytes.len() + chunk.len();
            if size > self.max_bytes {
                return Err(LoadError::TooLarge {
                    size,
                    max: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(bytes)
    }

    fn validate(&self, bytes: Vec<u8>) -> Result<LoadedImage, LoadError> {
        if bytes.len() > self.max_bytes {
            return Err(LoadError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }

        let format = image::guess_format(&bytes).map_err(|_| LoadError::NotAnImage)?;
        Ok(LoadedImage { bytes, format })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn loader() -> ImageLoader {
        ImageLoader::new(Duration::from_secs(1), 1024)
    }

    #[tokio::test]
    async fn test_upload_is_sniffed() {
        let reference = ImageReference::Upload(UploadedImage::new("image/png", PNG_MAGIC.to_vec()));
        let loaded = loader().load(&reference).await.unwrap();
        assert_eq!(loaded.format, image::ImageFormat::Png);
        assert_eq!(loaded.mime_type(), "image/png");
        assert_eq!(loaded.extension(), "png");
    }

    #[tokio::test]
    async fn test_non_image_upload_rejected() {
        let reference = ImageReference::Upload(UploadedImage::new("text/plain", b"hello".to_vec()));
        let result = loader().load(&reference).await;
        assert!(matches!(result, Err(LoadError::NotAnImage)));
    }

    #[tokio::test]
    async fn test_oversize_upload_rejected() {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.resize(2048, 0);
        let reference = ImageReference::Upload(UploadedImage::new("image/png", bytes));
        let result = loader().load(&reference).await;
        assert!(matches!(result, Err(LoadError::TooLarge { size: 2048, max: 1024 })));
    }

    #[tokio::test]
    async fn test_url_scheme_validation() {
        let reference = ImageReference::Url("ftp://example.com/a.png".to_string());
        assert!(matches!(
            loader().load(&reference).await,
            Err(LoadError::InvalidUrl(_))
        ));

        let reference = ImageReference::Url("not a url".to_string());
        assert!(matches!(
            loader().load(&reference).await,
            Err(LoadError::InvalidUrl(_))
        ));
    }

    /// Serve one chunked response without a Content-Length header and
    /// report how many body bytes were written before the client hung up
    async fn serve_chunked(total: usize) -> (String, tokio::task::JoinHandle<usize>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;

            let head = "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nTransfer-Encoding: chunked\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return 0;
            }

            let mut chunk = vec![0u8; 64 * 1024];
            chunk[..PNG_MAGIC.len()].copy_from_slice(&PNG_MAGIC);
            let mut sent = 0;
            while sent < total {
                let frame = [
                    format!("{:x}\r\n", chunk.len()).into_bytes(),
                    chunk.clone(),
                    b"\r\n".to_vec(),
                ]
                .concat();
                if socket.write_all(&frame).await.is_err() {
                    break;
                }
                sent += chunk.len();
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
            sent
        });

        (format!("http://{}/big.png", addr), handle)
    }

    #[tokio::test]
    async fn test_chunked_body_stops_at_cap() {
        let total = 64 * 1024 * 1024;
        let (url, server) = serve_chunked(total).await;

        let result = loader().load(&ImageReference::Url(url)).await;

        match result {
            Err(LoadError::TooLarge { size, max }) => {
                assert_eq!(max, 1024);
                assert!(size <= 1024 + 64 * 1024, "read {} bytes past the cap", size);
            }
            other => panic!("expected TooLarge, got {:?}", other.map(|i| i.bytes.len())),
        }

        let sent = tokio::time::timeout(Duration::from_secs(10), server)
            .await
            .unwrap()
            .unwrap();
        assert!(sent < total);
    }

    #[tokio::test]
    async fn test_data_url_in_url_field() {
        let data_url = UploadedImage::new("image/png", PNG_MAGIC.to_vec()).to_data_url();
        let loaded = loader().load(&ImageReference::Url(data_url)).await.unwrap();
        assert_eq!(loaded.bytes, PNG_MAGIC.to_vec());
    }
}
