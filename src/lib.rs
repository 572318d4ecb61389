//! AudioPipe - Audio Download Orchestrator
//!
//! This library turns a submitted video or playlist URL into locally stored
//! audio files: URL classification, job configuration, the download job
//! state machine and the runner that dispatches one worker per job against
//! an external media-extraction engine.

pub mod core;
pub mod engine;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{
    config::{ConfigStore, JobConfig},
    events::{EngineSignal, ProgressEvent},
    job::DownloadJob,
    models::{AppError, AppResult, JobState, UrlKind},
    runner::{EventReceiver, EventSender, JobRunner},
};
pub use crate::engine::{ytdlp::YtDlpEngine, EngineOptions, MediaEngine, Metadata};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize the library with default settings
pub fn init() -> anyhow::Result<()> {
    utils::logging::init_tracing();
    tracing::info!("📚 {} v{} initialized", NAME, VERSION);
    Ok(())
}
