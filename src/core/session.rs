//! Download session controller
//!
//! Owns the per-session state (fetched video, selected format, active poll)
//! and sequences the backend calls. Observers learn about everything through
//! `SessionEvent`s; nothing here touches the terminal.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::backend::Backend;
use crate::core::downloader::FileSink;
use crate::core::poller::{self, PollContext};
use crate::error::{Result, VidgrabError};
use crate::types::{
    ControlState, DownloadRequest, Format, PollOutcome, PollState, SessionEvent, Severity, VideoInfo,
};

/// Handle to the one running status poll of a session
pub struct ActivePoll {
    job_id: String,
    cancel: CancellationToken,
    state: watch::Receiver<PollState>,
    handle: JoinHandle<PollOutcome>,
}

impl ActivePoll {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Transient state of one download session
#[derive(Default)]
pub struct SessionState {
    pub selected_format: Option<usize>,
    pub current_video: Option<VideoInfo>,
    pub active_poll: Option<ActivePoll>,
}

/// Drives fetch -> select -> start -> poll for one user
pub struct SessionController {
    backend: Arc<dyn Backend>,
    sink: Arc<dyn FileSink>,
    events: mpsc::UnboundedSender<SessionEvent>,
    poll_interval: Duration,
    state: SessionState,
}

impl SessionController {
    pub fn new(
        backend: Arc<dyn Backend>,
        sink: Arc<dyn FileSink>,
        poll_interval: Duration,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            backend,
            sink,
            events,
            poll_interval,
            state: SessionState::default(),
        }
    }

    pub fn current_video(&self) -> Option<&VideoInfo> {
        self.state.current_video.as_ref()
    }

    pub fn selected_format(&self) -> Option<usize> {
        self.state.selected_format
    }

    pub fn active_job(&self) -> Option<&str> {
        self.state.active_poll.as_ref().map(ActivePoll::job_id)
    }

    /// State of the current (or most recent, until reset) poll loop
    pub fn poll_state(&self) -> PollState {
        self.state
            .active_poll
            .as_ref()
            .map(|p| *p.state.borrow())
            .unwrap_or(PollState::Idle)
    }

    /// Check the backend is up
    pub async fn health_check(&self) -> Result<()> {
        match self.backend.health().await {
            Ok(()) => {
                self.notify("Server connected successfully!", Severity::Success);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "health check failed");
                self.notify(
                    "Backend server is not running. Please start the backend server to use download functionality.",
                    Severity::Warning,
                );
                Err(err)
            }
        }
    }

    /// Fetch metadata for `url` and make it the session's video
    pub async fn fetch_metadata(&mut self, url: &str) -> Result<&VideoInfo> {
        let url = url.trim();
        if let Err(err) = validate_url(url) {
            return Err(self.report(err));
        }

        let video = match self.backend.fetch_video(url).await {
            Ok(video) => video,
            Err(err) => return Err(self.report(err)),
        };
        tracing::debug!(title = %video.title, formats = video.formats.len(), "video loaded");

        self.cancel_poll();
        self.state.selected_format = None;
        self.emit(SessionEvent::VideoLoaded(video.clone()));
        self.emit(SessionEvent::Control(ControlState::Disabled));
        self.notify("Video information fetched successfully!", Severity::Success);

        Ok(&*self.state.current_video.insert(video))
    }

    /// Select format `index` of the current video.
    ///
    /// # Panics
    ///
    /// If no video is loaded or `index` is out of range. Front-ends only
    /// offer indices of the loaded format list.
    pub fn select_format(&mut self, index: usize) -> &Format {
        let video = self
            .state
            .current_video
            .as_ref()
            .expect("select_format called before a video was fetched");
        let format = video.formats.get(index).unwrap_or_else(|| {
            panic!(
                "format index {} out of range ({} formats)",
                index,
                video.formats.len()
            )
        });

        self.state.selected_format = Some(index);
        self.emit(SessionEvent::FormatSelected {
            index,
            format: format.clone(),
        });
        self.emit(SessionEvent::Control(ControlState::Ready {
            label: format!("Download {}", format.label()),
        }));
        format
    }

    /// Start a backend job for the selected format and begin polling it
    pub async fn start_download(&mut self) -> Result<String> {
        let (video, format) = match (self.state.current_video.as_ref(), self.state.selected_format) {
            (Some(video), Some(index)) => (video, video.formats[index].clone()),
            _ => {
                return Err(self.report(VidgrabError::Precondition(
                    "Please select a format first".into(),
                )));
            }
        };
        let request = DownloadRequest::for_format(&video.url, &format);

        // At most one poll per session: a new start replaces the old job.
        self.cancel_poll();
        self.emit(SessionEvent::Control(ControlState::Starting));

        let job_id = match self.backend.start_download(&request).await {
            Ok(id) => id,
            Err(err) => {
                self.emit(SessionEvent::Control(ControlState::Ready {
                    label: format!("Download {}", format.label()),
                }));
                let err = match err {
                    VidgrabError::Backend(message) if !message.starts_with("Download failed") => {
                        VidgrabError::Backend(format!("Download failed: {}", message))
                    }
                    other => other,
                };
                return Err(self.report(err));
            }
        };
        tracing::info!(job_id = %job_id, quality = %format.quality, "download started");

        self.emit(SessionEvent::Control(ControlState::Busy));
        self.spawn_poll(job_id.clone(), format);
        Ok(job_id)
    }

    /// Wait for the active poll to reach a terminal state
    pub async fn wait_for_download(&mut self) -> Option<PollOutcome> {
        let handle = &mut self.state.active_poll.as_mut()?.handle;
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancelled() => PollOutcome::Cancelled,
            Err(err) => PollOutcome::Terminated {
                message: format!("Download failed: {}", err),
            },
        };
        self.state.active_poll = None;
        Some(outcome)
    }

    /// Abandon the session: cancel any poll and forget video and selection
    pub fn reset(&mut self) {
        self.cancel_poll();
        self.state = SessionState::default();
        self.emit(SessionEvent::Reset);
    }

    fn spawn_poll(&mut self, job_id: String, format: Format) {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(PollState::Polling);
        let ctx = PollContext {
            backend: Arc::clone(&self.backend),
            sink: Arc::clone(&self.sink),
            events: self.events.clone(),
            state: state_tx,
            interval: self.poll_interval,
            format,
        };
        let handle = tokio::spawn(poller::run(ctx, job_id.clone(), cancel.clone()));

        self.state.active_poll = Some(ActivePoll {
            job_id,
            cancel,
            state: state_rx,
            handle,
        });
    }

    fn cancel_poll(&mut self) {
        if let Some(poll) = self.state.active_poll.take() {
            tracing::debug!(job_id = %poll.job_id, "cancelling poll");
            poll.cancel();
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn notify(&self, message: impl Into<String>, severity: Severity) {
        self.emit(SessionEvent::Notify {
            message: message.into(),
            severity,
        });
    }

    /// Surface `err` as the one notification of a failed call
    fn report(&self, err: VidgrabError) -> VidgrabError {
        let (message, severity) = match &err {
            VidgrabError::Precondition(_) => (err.to_string(), Severity::Warning),
            _ => (err.to_string(), Severity::Error),
        };
        self.notify(message, severity);
        err
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(poll) = &self.state.active_poll {
            poll.cancel();
        }
    }
}

/// Non-empty and parseable as an absolute URL
pub fn validate_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(VidgrabError::Validation("Please enter a video URL".into()));
    }
    url::Url::parse(url)
        .map(|_| ())
        .map_err(|_| VidgrabError::Validation("Please enter a valid URL".into()))
}
