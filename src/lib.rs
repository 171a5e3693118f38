//! Diagnostic assistant backend
//!
//! Users describe symptoms over several messages and/or upload a photo.
//! The text pipeline accumulates confident messages and ranks candidate
//! conditions over the whole conversation; the image pipeline triages the
//! photo by body region and classifies it zero-shot.

pub mod api;
pub mod classifier;
pub mod config;
pub mod conversation;
pub mod error;
pub mod metrics;
pub mod server;
pub mod telemetry;
pub mod vision;

pub use config::Config;
pub use error::{AppError, Result};
