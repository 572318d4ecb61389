//! Job runner
//!
//! Owns the registry of active jobs, keyed by URL. Each accepted submission
//! spawns one worker task that probes the URL, drives the engine fetch and
//! forwards normalized progress events to the submitter's observer channel.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::config::JobConfig;
use crate::core::events::{EngineSignal, ProgressEvent};
use crate::core::job::DownloadJob;
use crate::core::models::{AppError, AppResult, UrlKind};
use crate::core::url;
use crate::engine::{EngineOptions, MediaEngine, SignalReceiver, SignalSender};

/// Channel half progress events are delivered into
pub type EventSender = mpsc::UnboundedSender<ProgressEvent>;

/// Channel half the submitter drains events from
pub type EventReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

/// Registry entry for a job in flight
struct ActiveJob {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Dispatches and tracks download jobs against a media engine
pub struct JobRunner<E: MediaEngine> {
    engine: Arc<E>,
    config: Arc<parking_lot::RwLock<JobConfig>>,
    active: Arc<RwLock<HashMap<String, ActiveJob>>>,
    downloads_dir: PathBuf,
    job_timeout: Option<Duration>,
}

impl<E: MediaEngine + 'static> JobRunner<E> {
    pub fn new(engine: Arc<E>, config: JobConfig, downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            config: Arc::new(parking_lot::RwLock::new(config)),
            active: Arc::new(RwLock::new(HashMap::new())),
            downloads_dir: downloads_dir.into(),
            job_timeout: None,
        }
    }

    /// Apply an overall per-job time limit
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.job_timeout = Some(limit);
        self
    }

    /// Submit a URL for download under the runner's current configuration.
    /// Returns without blocking on the job; progress arrives through
    /// `observer`.
    pub async fn submit(&self, raw_url: &str, observer: EventSender) -> AppResult<()> {
        let config = self.config.read().clone();
        self.submit_with(raw_url, config, observer).await
    }

    /// Submit a URL with an explicit configuration snapshot
    pub async fn submit_with(
        &self,
        raw_url: &str,
        config: JobConfig,
        observer: EventSender,
    ) -> AppResult<()> {
        let kind = url::classify(raw_url);
        if kind == UrlKind::Invalid {
            warn!("Rejected invalid URL: {:?}", raw_url);
            return Err(AppError::InvalidUrl(raw_url.to_string()));
        }

        tokio::fs::create_dir_all(&self.downloads_dir).await?;

        let cancel = Arc::new(AtomicBool::new(false));
        {
            // duplicate check, spawn and insertion form one critical
            // section, so a cancel can never observe a half-registered job
            let mut active = self.active.write().await;
            if active.contains_key(raw_url) {
                warn!("Rejected duplicate submission: {}", raw_url);
                return Err(AppError::DuplicateJob(raw_url.to_string()));
            }
            let handle = tokio::spawn(Self::run_worker(
                Arc::clone(&self.engine),
                raw_url.to_string(),
                kind,
                config,
                self.downloads_dir.clone(),
                observer,
                cancel.clone(),
                self.job_timeout,
                Arc::clone(&self.active),
            ));
            active.insert(raw_url.to_string(), ActiveJob { cancel, handle });
        }

        info!("🚀 Submitted download job: {}", raw_url);
        Ok(())
    }

    /// Cancel an active job. After this returns no further events for the
    /// job are delivered. Returns false for unknown URLs.
    pub async fn cancel(&self, url: &str) -> bool {
        match self.active.write().await.remove(url) {
            Some(entry) => {
                entry.cancel.store(true, Ordering::SeqCst);
                entry.handle.abort();
                info!("Cancelled download job: {}", url);
                true
            }
            None => false,
        }
    }

    /// Replace the configuration used by future submissions.
    /// Jobs already running keep their snapshot.
    pub fn update_config(&self, config: JobConfig) {
        *self.config.write() = config;
        info!("Updated job configuration");
    }

    pub fn current_config(&self) -> JobConfig {
        self.config.read().clone()
    }

    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }

    pub async fn is_active(&self, url: &str) -> bool {
        self.active.read().await.contains_key(url)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_worker(
        engine: Arc<E>,
        url: String,
        kind: UrlKind,
        config: JobConfig,
        downloads_dir: PathBuf,
        observer: EventSender,
        cancel: Arc<AtomicBool>,
        job_timeout: Option<Duration>,
        active: Arc<RwLock<HashMap<String, ActiveJob>>>,
    ) {
        let mut job = DownloadJob::new(url.clone(), kind, config.clone());

        // metadata probe before any fetch; a probe failure ends the job
        match engine.probe(&url).await {
            Ok(meta) => {
                let event = job.start(&meta.title, meta.is_playlist);
                Self::deliver(&observer, &cancel, event);
            }
            Err(err) => {
                warn!("Probe failed for {}: {}", url, err);
                Self::deliver_failure(&mut job, &observer, &cancel, err);
                Self::release_slot(&active, &url, &cancel).await;
                return;
            }
        }

        let options = EngineOptions {
            format_selector: config.format.clone(),
            target_codec: config.codec.clone(),
            target_bitrate: config.bitrate,
            embed_thumbnail: config.embed_thumbnail,
            output_template: downloads_dir.join("%(title)s.%(ext)s"),
            no_playlist: !url::allows_playlist(&url),
        };

        let drive = Self::drive(&engine, &url, &options, &mut job, &observer, &cancel);
        match job_timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, drive).await.is_err() {
                    warn!("Job timed out after {:?}: {}", limit, url);
                    if let Some(event) =
                        job.fail(format!("Timed out after {}s", limit.as_secs()))
                    {
                        Self::deliver(&observer, &cancel, event);
                    }
                }
            }
            None => drive.await,
        }

        match &job.state {
            s if s.is_terminal() => debug!("Job {} for {}", s, url),
            s => warn!("Worker exiting with non-terminal job state {} for {}", s, url),
        }
        Self::release_slot(&active, &url, &cancel).await;
    }

    /// Remove the worker's own registry entry. After a cancel plus
    /// resubmission the slot under this URL belongs to a successor job,
    /// identified by its cancel flag, and must stay.
    async fn release_slot(
        active: &RwLock<HashMap<String, ActiveJob>>,
        url: &str,
        cancel: &Arc<AtomicBool>,
    ) {
        let mut active = active.write().await;
        let owns_slot = active
            .get(url)
            .map_or(false, |entry| Arc::ptr_eq(&entry.cancel, cancel));
        if owns_slot {
            active.remove(url);
        }
    }

    /// Run the engine fetch and translate its signal stream until the job
    /// reaches a terminal state or the stream ends.
    async fn drive(
        engine: &Arc<E>,
        url: &str,
        options: &EngineOptions,
        job: &mut DownloadJob,
        observer: &EventSender,
        cancel: &Arc<AtomicBool>,
    ) {
        let (tx, mut rx): (SignalSender, SignalReceiver) = mpsc::unbounded_channel();
        let fetch_fut = {
            let engine = Arc::clone(engine);
            let url = url.to_string();
            let options = options.clone();
            async move { engine.fetch(&url, &options, tx).await }
        };
        tokio::pin!(fetch_fut);
        let mut fetch_result: Option<AppResult<()>> = None;

        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(signal) => {
                        if cancel.load(Ordering::SeqCst) {
                            return;
                        }
                        for event in job.apply(signal) {
                            Self::deliver(observer, cancel, event);
                        }
                        if job.state.is_terminal() {
                            return;
                        }
                    }
                    // sink dropped, engine sent everything it will send
                    None => break,
                },
                result = &mut fetch_fut, if fetch_result.is_none() => {
                    fetch_result = Some(result);
                }
            }
        }

        let result = match fetch_result {
            Some(result) => result,
            None => fetch_fut.await,
        };
        if cancel.load(Ordering::SeqCst) || job.state.is_terminal() {
            return;
        }
        match result {
            // the engine finished cleanly without announcing completion
            Ok(()) => {
                for event in job.apply(EngineSignal::Finished { filename: None }) {
                    Self::deliver(observer, cancel, event);
                }
            }
            Err(err) => Self::deliver_failure(job, observer, cancel, err),
        }
    }

    fn deliver(observer: &EventSender, cancel: &Arc<AtomicBool>, event: ProgressEvent) {
        if cancel.load(Ordering::SeqCst) {
            return;
        }
        if observer.send(event).is_err() {
            debug!("Observer dropped, progress event discarded");
        }
    }

    fn deliver_failure(
        job: &mut DownloadJob,
        observer: &EventSender,
        cancel: &Arc<AtomicBool>,
        err: AppError,
    ) {
        // engine messages travel verbatim, everything else keeps its prefix
        let reason = match err {
            AppError::Engine(message) => message,
            other => other.to_string(),
        };
        if let Some(event) = job.fail(reason) {
            Self::deliver(observer, cancel, event);
        }
    }
}
