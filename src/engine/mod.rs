//! Media extraction engine boundary
//!
//! The runner treats the engine as an opaque capability: probe a URL for
//! metadata, then fetch it while streaming raw signals back over a channel.

pub mod ytdlp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::core::events::EngineSignal;
use crate::core::models::AppResult;

/// Channel half the engine pushes raw signals into during a fetch
pub type SignalSender = mpsc::UnboundedSender<EngineSignal>;

/// Channel half the runner drains signals from
pub type SignalReceiver = mpsc::UnboundedReceiver<EngineSignal>;

/// Metadata obtained by probing a URL without downloading anything
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub is_playlist: bool,
    pub entry_count: Option<usize>,
}

/// Options for one fetch, snapshotted from the job's configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub format_selector: String,
    pub target_codec: String,
    pub target_bitrate: u32,
    pub embed_thumbnail: bool,
    /// Output path template, e.g. `downloads/%(title)s.%(ext)s`
    pub output_template: PathBuf,
    /// Restrict the fetch to a single video even if the URL names a list
    pub no_playlist: bool,
}

/// A media extraction engine
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Resolve metadata for a URL without fetching any media
    async fn probe(&self, url: &str) -> AppResult<Metadata>;

    /// Download the media behind `url`, streaming signals into `sink`.
    ///
    /// The returned result reports whether the engine itself ran to
    /// completion; per-file outcomes travel through the sink.
    async fn fetch(&self, url: &str, options: &EngineOptions, sink: SignalSender)
        -> AppResult<()>;
}
