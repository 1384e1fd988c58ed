//! Recognition jobs
//!
//! A session runs at most one recognition job at a time. The controller
//! starts it on the engine, folds progress notifications into the job record
//! and publishes a fresh view after every change.

mod controller;
mod types;

pub use controller::{JobController, JobTicket};
pub use types::{
    JobError, JobSnapshot, JobStatus, RecognitionJob, SessionView, BUSY_MESSAGE, CONVERT_LABEL,
    INVALID_IMAGE_URL_MESSAGE, NO_IMAGE_MESSAGE, NO_TEXT_FOUND, RECOGNITION_FAILED_MESSAGE,
};
