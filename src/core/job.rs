//! Download job state machine
//!
//! A job tracks one submitted URL from `Pending` through `Running` to a
//! terminal state, translating raw engine signals into normalized progress
//! events. State transitions are monotonic; once terminal, further signals
//! are ignored.

use chrono::{DateTime, Utc};

use crate::core::config::JobConfig;
use crate::core::events::{parse_percent, EngineSignal, ProgressEvent};
use crate::core::models::{JobState, UrlKind};

#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    pub kind: UrlKind,
    pub config: JobConfig,
    pub state: JobState,
    /// Progress of the file currently downloading, resets per file
    pub progress_percent: f32,
    pub current_file: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DownloadJob {
    pub fn new(url: impl Into<String>, kind: UrlKind, config: JobConfig) -> Self {
        let now = Utc::now();
        Self {
            url: url.into(),
            kind,
            config,
            state: JobState::Pending,
            progress_percent: 0.0,
            current_file: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the job running once the probe produced metadata
    pub fn start(&mut self, title: &str, is_playlist: bool) -> ProgressEvent {
        if self.state == JobState::Pending {
            self.state = JobState::Running;
        }
        self.touch();
        ProgressEvent::Started {
            title: title.to_string(),
            is_playlist,
        }
    }

    /// Apply one engine signal, producing the events it translates to.
    ///
    /// Signals arriving after a terminal state produce nothing.
    pub fn apply(&mut self, signal: EngineSignal) -> Vec<ProgressEvent> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        self.touch();

        match signal {
            EngineSignal::Downloading { percent, filename } => {
                let parsed = parse_percent(&percent);
                match filename {
                    Some(name) if self.current_file.as_deref() != Some(name.as_str()) => {
                        // a new file starts, progress baseline resets
                        self.current_file = Some(name);
                        self.progress_percent = parsed;
                    }
                    _ => {
                        self.progress_percent = self.progress_percent.max(parsed);
                    }
                }
                // events carry the engine's value as parsed, including the
                // forced 0 of a garbled line
                vec![ProgressEvent::Progress {
                    percent: parsed,
                    file_name: self.current_file.clone(),
                }]
            }
            EngineSignal::Finished {
                filename: Some(name),
            } => {
                self.current_file = Some(name.clone());
                let mut events = vec![ProgressEvent::FileFinished { file_name: name }];
                // a single-video job is done once its only file is in
                if self.kind == UrlKind::Single {
                    events.push(self.complete());
                }
                events
            }
            EngineSignal::Finished { filename: None } => {
                vec![self.complete()]
            }
            EngineSignal::Error { message } => {
                vec![self.fail_now(message)]
            }
        }
    }

    /// Fail the job from outside the signal stream (probe failure, timeout).
    /// Returns `None` if the job is already terminal.
    pub fn fail(&mut self, reason: impl Into<String>) -> Option<ProgressEvent> {
        if self.state.is_terminal() {
            return None;
        }
        self.touch();
        Some(self.fail_now(reason.into()))
    }

    fn complete(&mut self) -> ProgressEvent {
        self.progress_percent = 100.0;
        self.state = JobState::Succeeded;
        ProgressEvent::JobFinished {
            is_playlist: self.kind == UrlKind::Playlist,
        }
    }

    fn fail_now(&mut self, reason: String) -> ProgressEvent {
        self.last_error = Some(reason.clone());
        self.state = JobState::Failed;
        ProgressEvent::Failed { reason }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
