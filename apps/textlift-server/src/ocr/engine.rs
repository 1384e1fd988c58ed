//! Recognition Engine seam
//!
//! The job controller only knows this trait. Anything that can turn an image
//! reference and a language into text while reporting progress can drive a
//! session.

use async_trait::async_trait;

use super::types::{LanguageCode, OcrError, ProgressSink, Recognition};
use crate::source::ImageReference;

#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Recognize the text in `image`.
    ///
    /// Progress is reported through `progress` as it happens. The returned
    /// future resolves exactly once, with the text or the failure.
    async fn recognize(
        &self,
        image: &ImageReference,
        language: LanguageCode,
        progress: &dyn ProgressSink,
    ) -> Result<Recognition, OcrError>;
}
