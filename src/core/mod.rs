//! Core business logic module
//!
//! Contains the job data models, URL classification, configuration
//! persistence, the download job state machine and the job runner.

pub mod config;
pub mod events;
pub mod job;
pub mod models;
pub mod runner;
pub mod url;


// Re-export main types
pub use config::{ConfigStore, JobConfig};
pub use events::{EngineSignal, ProgressEvent};
pub use job::DownloadJob;
pub use models::{AppError, AppResult, JobState, UrlKind};
pub use runner::JobRunner;
