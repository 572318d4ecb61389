//! yt-dlp engine adapter
//!
//! Shells out to the `yt-dlp` binary and translates its line-oriented
//! stdout into [`EngineSignal`]s. The child process is spawned with
//! `kill_on_drop` so aborting the owning task also kills the download.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::core::events::EngineSignal;
use crate::core::models::{AppError, AppResult};
use crate::engine::{EngineOptions, MediaEngine, Metadata, SignalSender};

lazy_static! {
    // "[download]  12.3% of 4.5MiB at ..."
    static ref PROGRESS_RE: Regex = Regex::new(r"\[download\]\s+([0-9.]+%)").unwrap();
    // "[download] Destination: downloads/My Song.webm"
    static ref DEST_RE: Regex = Regex::new(r"\[download\] Destination:\s+(.+)").unwrap();
    // "[ExtractAudio] Destination: downloads/My Song.mp3"
    static ref AUDIO_DEST_RE: Regex = Regex::new(r"\[ExtractAudio\] Destination:\s+(.+)").unwrap();
    // "[download] downloads/My Song.webm has already been downloaded"
    static ref ALREADY_RE: Regex =
        Regex::new(r"\[download\]\s+(.+?) has already been downloaded").unwrap();
}

/// Configuration for the yt-dlp adapter
#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    /// Name or path of the yt-dlp binary
    pub binary: PathBuf,
    /// Time limit for a metadata probe
    pub probe_timeout: Duration,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            probe_timeout: Duration::from_secs(30),
        }
    }
}

/// Engine implementation backed by the external yt-dlp binary
#[derive(Debug, Clone, Default)]
pub struct YtDlpEngine {
    config: YtDlpConfig,
}

impl YtDlpEngine {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }
}

/// Command-line arguments for one fetch
fn fetch_args(url: &str, options: &EngineOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-f".into(),
        options.format_selector.clone().into(),
        "--extract-audio".into(),
        "--audio-format".into(),
        options.target_codec.clone().into(),
        "--audio-quality".into(),
        format!("{}K", options.target_bitrate).into(),
        "--output".into(),
        options.output_template.clone().into(),
        "--newline".into(),
        "--no-warnings".into(),
    ];
    if options.embed_thumbnail {
        args.push("--embed-thumbnail".into());
    }
    if options.no_playlist {
        args.push("--no-playlist".into());
    } else {
        args.push("--yes-playlist".into());
    }
    args.push(url.into());
    args
}

/// Translate one stdout line into signals, tracking the file in flight.
///
/// A new destination line implies the previous file finished; yt-dlp
/// prints no explicit marker between playlist entries.
fn scan_line(line: &str, current_file: &mut Option<String>) -> Vec<EngineSignal> {
    if let Some(caps) = DEST_RE.captures(line) {
        let name = caps[1].trim().to_string();
        let mut signals = Vec::new();
        if let Some(done) = current_file.take() {
            signals.push(EngineSignal::Finished {
                filename: Some(done),
            });
        }
        signals.push(EngineSignal::Downloading {
            percent: "0%".to_string(),
            filename: Some(name.clone()),
        });
        *current_file = Some(name);
        return signals;
    }
    if let Some(caps) = AUDIO_DEST_RE.captures(line) {
        // post-processing renames the download to its final audio file
        *current_file = Some(caps[1].trim().to_string());
        return Vec::new();
    }
    if let Some(caps) = ALREADY_RE.captures(line) {
        let name = caps[1].trim().to_string();
        *current_file = Some(name.clone());
        return vec![EngineSignal::Downloading {
            percent: "100%".to_string(),
            filename: Some(name),
        }];
    }
    if let Some(caps) = PROGRESS_RE.captures(line) {
        return vec![EngineSignal::Downloading {
            percent: caps[1].to_string(),
            filename: current_file.clone(),
        }];
    }
    Vec::new()
}

/// Pick the most useful error line out of yt-dlp's stderr
fn extract_error(stderr: &str, fallback: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().find(|l| !l.trim().is_empty()))
        .map(|l| l.trim().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

#[async_trait::async_trait]
impl MediaEngine for YtDlpEngine {
    async fn probe(&self, url: &str) -> AppResult<Metadata> {
        debug!("Probing metadata for {}", url);
        let run = Command::new(&self.config.binary)
            .args([
                "--dump-single-json",
                "--flat-playlist",
                "--skip-download",
                "--no-warnings",
                url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.config.probe_timeout, run)
            .await
            .map_err(|_| {
                AppError::Engine(format!(
                    "Probe timed out after {}s",
                    self.config.probe_timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Engine(extract_error(
                &stderr,
                &format!("yt-dlp probe exited with {}", output.status),
            )));
        }

        let info: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| AppError::Engine(format!("Unreadable probe output: {}", e)))?;

        let entries = info.get("entries").and_then(Value::as_array);
        let is_playlist =
            entries.is_some() || info.get("_type").and_then(Value::as_str) == Some("playlist");
        let entry_count = entries
            .map(Vec::len)
            .or_else(|| info.get("playlist_count").and_then(Value::as_u64).map(|n| n as usize));
        let title = info
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();

        Ok(Metadata {
            title,
            is_playlist,
            entry_count,
        })
    }

    async fn fetch(
        &self,
        url: &str,
        options: &EngineOptions,
        sink: SignalSender,
    ) -> AppResult<()> {
        let args = fetch_args(url, options);
        debug!("Spawning {:?} for {}", self.config.binary, url);

        let mut child = Command::new(&self.config.binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Engine("Failed to capture yt-dlp stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Engine("Failed to capture yt-dlp stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut collected = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                collected.push_str(&line);
                collected.push('\n');
            }
            collected
        });

        let mut current_file: Option<String> = None;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            for signal in scan_line(&line, &mut current_file) {
                // receiver gone means the job was torn down; keep draining
                // the child so it exits cleanly
                let _ = sink.send(signal);
            }
        }

        let status = child.wait().await?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if status.success() {
            if let Some(done) = current_file.take() {
                let _ = sink.send(EngineSignal::Finished {
                    filename: Some(done),
                });
            }
            let _ = sink.send(EngineSignal::Finished { filename: None });
            Ok(())
        } else {
            let message = extract_error(
                &stderr_text,
                &format!("yt-dlp exited with {}", status),
            );
            warn!("yt-dlp failed for {}: {}", url, message);
            let _ = sink.send(EngineSignal::Error {
                message: message.clone(),
            });
            Err(AppError::Engine(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(no_playlist: bool) -> EngineOptions {
        EngineOptions {
            format_selector: "best".to_string(),
            target_codec: "mp3".to_string(),
            target_bitrate: 192,
            embed_thumbnail: true,
            output_template: PathBuf::from("downloads/%(title)s.%(ext)s"),
            no_playlist,
        }
    }

    #[test]
    fn test_fetch_args_single() {
        let args = fetch_args("https://youtu.be/abc", &options(true));
        assert!(args.contains(&OsString::from("--no-playlist")));
        assert!(!args.contains(&OsString::from("--yes-playlist")));
        assert!(args.contains(&OsString::from("--embed-thumbnail")));
        assert!(args.contains(&OsString::from("192K")));
        assert_eq!(args.last(), Some(&OsString::from("https://youtu.be/abc")));
    }

    #[test]
    fn test_fetch_args_playlist() {
        let mut opts = options(false);
        opts.embed_thumbnail = false;
        let args = fetch_args("u", &opts);
        assert!(args.contains(&OsString::from("--yes-playlist")));
        assert!(!args.contains(&OsString::from("--no-playlist")));
        assert!(!args.contains(&OsString::from("--embed-thumbnail")));
    }

    #[test]
    fn test_scan_progress_line() {
        let mut current = Some("downloads/a.webm".to_string());
        let signals = scan_line(
            "[download]  12.3% of 4.50MiB at 1.2MiB/s ETA 00:03",
            &mut current,
        );
        assert_eq!(
            signals,
            vec![EngineSignal::Downloading {
                percent: "12.3%".to_string(),
                filename: Some("downloads/a.webm".to_string()),
            }]
        );
    }

    #[test]
    fn test_scan_destination_finishes_previous_file() {
        let mut current = Some("downloads/a.webm".to_string());
        let signals = scan_line("[download] Destination: downloads/b.webm", &mut current);
        assert_eq!(
            signals,
            vec![
                EngineSignal::Finished {
                    filename: Some("downloads/a.webm".to_string())
                },
                EngineSignal::Downloading {
                    percent: "0%".to_string(),
                    filename: Some("downloads/b.webm".to_string()),
                },
            ]
        );
        assert_eq!(current, Some("downloads/b.webm".to_string()));
    }

    #[test]
    fn test_scan_extract_audio_renames_current_file() {
        let mut current = Some("downloads/a.webm".to_string());
        let signals = scan_line("[ExtractAudio] Destination: downloads/a.mp3", &mut current);
        assert!(signals.is_empty());
        assert_eq!(current, Some("downloads/a.mp3".to_string()));
    }

    #[test]
    fn test_scan_already_downloaded() {
        let mut current = None;
        let signals = scan_line(
            "[download] downloads/a.webm has already been downloaded",
            &mut current,
        );
        assert_eq!(
            signals,
            vec![EngineSignal::Downloading {
                percent: "100%".to_string(),
                filename: Some("downloads/a.webm".to_string()),
            }]
        );
    }

    #[test]
    fn test_scan_unrelated_line() {
        let mut current = None;
        assert!(scan_line("[youtube] abc: Downloading webpage", &mut current).is_empty());
        assert!(current.is_none());
    }

    #[test]
    fn test_extract_error_prefers_error_lines() {
        let stderr = "WARNING: something\nERROR: Video unavailable\n";
        assert_eq!(extract_error(stderr, "fb"), "ERROR: Video unavailable");
        assert_eq!(extract_error("", "fb"), "fb");
        assert_eq!(extract_error("plain failure\n", "fb"), "plain failure");
    }
}
