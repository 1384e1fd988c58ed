//! Textlift Server Library
//!
//! Image to text conversion sessions over HTTP. The binary in main.rs wires
//! configuration, tracing and the router together.
//!
//! # Modules
//!
//! - `source`: Image references (upload or URL) and image loading
//! - `ocr`: Recognition engine and OCR backends
//! - `job`: Per-session recognition job controller
//! - `session`: Session manager with idle expiry
//! - `routes`: HTTP API

pub mod clipboard;
pub mod config;
pub mod error;
pub mod job;
pub mod ocr;
pub mod routes;
pub mod session;
pub mod source;
pub mod state;
