//! Progress event vocabulary and engine signal decoding

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Raw signals emitted by the extraction engine during a fetch
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    /// A progress report. The percentage arrives as raw text and may carry
    /// terminal formatting artifacts.
    Downloading {
        percent: String,
        filename: Option<String>,
    },
    /// A file finished, or the whole fetch finished when no filename is given
    Finished { filename: Option<String> },
    /// The engine reported a fatal error
    Error { message: String },
}

/// Normalized per-job events delivered to the observer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The probe succeeded and the download phase is starting
    Started { title: String, is_playlist: bool },
    /// A progress update for the file currently downloading
    Progress {
        percent: f32,
        file_name: Option<String>,
    },
    /// One file of the job finished downloading
    FileFinished { file_name: String },
    /// The whole job completed successfully
    JobFinished { is_playlist: bool },
    /// The job failed; `reason` carries the engine's error text
    Failed { reason: String },
}

impl ProgressEvent {
    /// Terminal events end the job's event stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::JobFinished { .. } | ProgressEvent::Failed { .. }
        )
    }
}

lazy_static! {
    // ANSI SGR color sequences, e.g. "\x1b[0;94m"
    static ref ANSI_RE: Regex = Regex::new(r"\x1b\[[0-9;]*m").unwrap();
}

/// Parse a textual percentage such as `" 12.3%"`.
///
/// ANSI color sequences, surrounding whitespace and the trailing `%` sign
/// are stripped before parsing. Anything left unparseable yields 0 rather
/// than an error, so a malformed progress line can never fail a job.
pub fn parse_percent(raw: &str) -> f32 {
    let cleaned = ANSI_RE.replace_all(raw, "");
    let cleaned = cleaned.trim().trim_matches('%').trim();
    cleaned.parse::<f32>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_percent() {
        assert_eq!(parse_percent("12.3%"), 12.3);
        assert_eq!(parse_percent(" 45.0% "), 45.0);
        assert_eq!(parse_percent("100%"), 100.0);
        assert_eq!(parse_percent("0.0%"), 0.0);
    }

    #[test]
    fn test_parse_colored_percent() {
        assert_eq!(parse_percent("\x1b[32m45.0%\x1b[0m"), 45.0);
        assert_eq!(parse_percent("\x1b[0;94m 12.3%\x1b[0m"), 12.3);
    }

    #[test]
    fn test_parse_garbage_yields_zero() {
        assert_eq!(parse_percent("bogus"), 0.0);
        assert_eq!(parse_percent(""), 0.0);
        assert_eq!(parse_percent("%"), 0.0);
        assert_eq!(parse_percent("NaN%x"), 0.0);
    }

    #[test]
    fn test_terminal_events() {
        assert!(ProgressEvent::JobFinished { is_playlist: false }.is_terminal());
        assert!(ProgressEvent::Failed {
            reason: "x".to_string()
        }
        .is_terminal());
        assert!(!ProgressEvent::Started {
            title: "t".to_string(),
            is_playlist: false
        }
        .is_terminal());
        assert!(!ProgressEvent::Progress {
            percent: 50.0,
            file_name: None
        }
        .is_terminal());
    }
}
