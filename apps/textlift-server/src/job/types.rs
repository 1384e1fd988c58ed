//! Job types
//!
//! The recognition job record, its read-only snapshots and the messages
//! shown to users.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ocr::LanguageCode;
use crate::source::ImageKind;

// ============================================================================
// User-facing messages
// ============================================================================

pub const NO_IMAGE_MESSAGE: &str = "Please upload an image or enter an image URL.";
pub const BUSY_MESSAGE: &str = "A conversion is already running.";
pub const INVALID_IMAGE_URL_MESSAGE: &str = "Invalid image URL";
pub const RECOGNITION_FAILED_MESSAGE: &str = "Error processing the image. Please try again.";
pub const NO_TEXT_FOUND: &str = "No text found in the image.";

pub const CONVERT_LABEL: &str = "Convert Image to Text";

// ============================================================================
// Job Record
// ============================================================================

/// Lifecycle state of a recognition job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Idle
    }
}

/// One recognition attempt. Only the controller writes to it.
#[derive(Debug, Clone, Default)]
pub struct RecognitionJob {
    pub status: JobStatus,
    pub progress_percent: u8,
    pub result_text: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RecognitionJob {
    /// Enter `running` with a clean slate
    pub fn begin(&mut self) {
        *self = Self {
            status: JobStatus::Running,
            started_at: Some(Utc::now()),
            ..Self::default()
        };
    }

    /// Apply an engine progress fraction; returns whether the value moved
    pub fn advance(&mut self, fraction: f32) -> bool {
        let percent = percent_of(fraction);
        if percent <= self.progress_percent {
            return false;
        }
        self.progress_percent = percent;
        true
    }

    pub fn succeed(&mut self, text: String) {
        self.status = JobStatus::Succeeded;
        self.result_text = Some(if text.trim().is_empty() {
            NO_TEXT_FOUND.to_string()
        } else {
            text
        });
        self.error_message = None;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self) {
        self.status = JobStatus::Failed;
        self.result_text = None;
        self.error_message = Some(RECOGNITION_FAILED_MESSAGE.to_string());
        self.finished_at = Some(Utc::now());
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            status: self.status,
            progress_percent: self.progress_percent,
            result_text: self.result_text.clone(),
            error_message: self.error_message.clone(),
        }
    }
}

/// Engine fraction to a whole percentage in `0..=100`
fn percent_of(fraction: f32) -> u8 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}

// ============================================================================
// Snapshots
// ============================================================================

/// Immutable view of a job for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub progress_percent: u8,
    pub result_text: Option<String>,
    pub error_message: Option<String>,
}

/// Everything a client needs to draw a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub job: JobSnapshot,
    /// Active input mode at extraction time
    pub image: Option<ImageKind>,
    /// URL field contents
    pub image_url: Option<String>,
    pub language: LanguageCode,
    /// Label for the convert control
    pub convert_label: String,
    pub can_convert: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SessionView {
    pub fn label_for(job: &RecognitionJob) -> String {
        if job.is_running() {
            format!("Converting... {}%", job.progress_percent)
        } else {
            CONVERT_LABEL.to_string()
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Why a conversion could not start
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("{}", NO_IMAGE_MESSAGE)]
    NoImage,

    #[error("{}", BUSY_MESSAGE)]
    Busy,
}
