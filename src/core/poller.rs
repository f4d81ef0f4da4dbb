//! Download-status polling
//!
//! `PollMachine` is the pure transition function; `run` drives it on a
//! fixed cadence against a `Backend` until a terminal state or cancellation.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::backend::Backend;
use crate::core::downloader::FileSink;
use crate::error::VidgrabError;
use crate::types::{
    ControlState, Format, JobStatus, PollOutcome, PollState, SessionEvent, Severity, StatusSnapshot,
};

const DEFAULT_FILENAME: &str = "video";

/// What the loop should do after one observation
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep {
    Progress { percent: f64, speed: Option<String> },
    Processing,
    Completed {
        download_url: Option<String>,
        filename: String,
        file_size: Option<String>,
    },
    Failed { message: String },
    Terminated { message: String },
}

/// Pure polling state machine for a single job
#[derive(Debug, Clone)]
pub struct PollMachine {
    job_id: String,
    state: PollState,
    last_percent: f64,
}

impl PollMachine {
    /// A machine for a job that was just started; it begins in `Polling`
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: PollState::Polling,
            last_percent: 0.0,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Last displayed percentage
    pub fn percent(&self) -> f64 {
        self.last_percent
    }

    /// Apply one status reply
    pub fn observe(&mut self, snapshot: &StatusSnapshot) -> PollStep {
        debug_assert!(!self.state.is_terminal(), "observe after terminal state");

        match snapshot.status {
            JobStatus::Downloading => {
                // Display only: the client does not enforce monotonic progress
                let percent = snapshot.progress.unwrap_or(0.0).clamp(0.0, 100.0);
                self.last_percent = percent;
                PollStep::Progress {
                    percent,
                    speed: snapshot.speed.clone().filter(|s| !s.is_empty()),
                }
            }
            JobStatus::Completed => {
                self.state = PollState::Completed;
                self.last_percent = 100.0;
                PollStep::Completed {
                    download_url: snapshot.download_url.clone().filter(|u| !u.is_empty()),
                    filename: snapshot
                        .filename
                        .clone()
                        .filter(|f| !f.is_empty())
                        .unwrap_or_else(|| DEFAULT_FILENAME.into()),
                    file_size: snapshot.file_size.clone(),
                }
            }
            JobStatus::Failed => {
                self.state = PollState::Failed;
                PollStep::Failed {
                    message: snapshot
                        .error
                        .clone()
                        .filter(|e| !e.trim().is_empty())
                        .unwrap_or_else(|| "Download failed".into()),
                }
            }
            JobStatus::Processing => PollStep::Processing,
        }
    }

    /// A status request did not produce a usable reply
    pub fn fail(&mut self, err: &VidgrabError) -> PollStep {
        self.state = PollState::Terminated;
        PollStep::Terminated {
            message: format!("Download failed: {}", err),
        }
    }
}

/// Everything a running poll loop needs
pub struct PollContext {
    pub backend: Arc<dyn Backend>,
    pub sink: Arc<dyn FileSink>,
    pub events: mpsc::UnboundedSender<SessionEvent>,
    pub state: watch::Sender<PollState>,
    pub interval: Duration,
    /// The format being downloaded, for messages and the restored control
    pub format: Format,
}

impl PollContext {
    fn emit(&self, event: SessionEvent) {
        // The observer may have gone away; the loop still runs to a terminal state.
        let _ = self.events.send(event);
    }

    fn notify(&self, message: impl Into<String>, severity: Severity) {
        self.emit(SessionEvent::Notify {
            message: message.into(),
            severity,
        });
    }

    fn restore_control(&self) {
        self.emit(SessionEvent::Control(ControlState::Ready {
            label: format!("Download {}", self.format.label()),
        }));
    }
}

/// Poll `job_id` until it reaches a terminal state or `cancel` fires.
///
/// The first request goes out one interval after the call. Cancellation also
/// abandons a file delivery that is still in flight. Exactly one
/// `PollStopped` event is emitted, on the way out.
pub async fn run(ctx: PollContext, job_id: String, cancel: CancellationToken) -> PollOutcome {
    let mut machine = PollMachine::new(job_id.clone());
    let _ = ctx.state.send(machine.state());

    let mut ticker = interval_at(Instant::now() + ctx.interval, ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let outcome = loop {
        tokio::select! {
            _ = cancel.cancelled() => break PollOutcome::Cancelled,
            _ = ticker.tick() => {}
        }

        let reply = tokio::select! {
            _ = cancel.cancelled() => break PollOutcome::Cancelled,
            reply = ctx.backend.download_status(&job_id) => reply,
        };

        let step = match reply {
            Ok(snapshot) => machine.observe(&snapshot),
            Err(err) => {
                tracing::warn!(job_id = %job_id, error = %err, "status poll failed");
                machine.fail(&err)
            }
        };
        tracing::debug!(job_id = %job_id, ?step, "poll tick");

        match step {
            PollStep::Progress { percent, speed } => {
                ctx.emit(SessionEvent::Progress {
                    job_id: job_id.clone(),
                    percent,
                    speed,
                });
            }
            PollStep::Processing => {
                ctx.emit(SessionEvent::Processing {
                    job_id: job_id.clone(),
                });
            }
            PollStep::Completed {
                download_url,
                filename,
                file_size,
            } => {
                break complete(&ctx, download_url, &filename, file_size, &cancel).await;
            }
            PollStep::Failed { message } => {
                ctx.restore_control();
                ctx.notify(message.clone(), Severity::Error);
                break PollOutcome::Failed { message };
            }
            PollStep::Terminated { message } => {
                ctx.restore_control();
                ctx.notify(message.clone(), Severity::Error);
                break PollOutcome::Terminated { message };
            }
        }
    };

    let _ = ctx.state.send(outcome.state());
    tracing::debug!(job_id = %job_id, ?outcome, "polling stopped");
    ctx.emit(SessionEvent::PollStopped {
        job_id,
        outcome: outcome.clone(),
    });
    outcome
}

async fn complete(
    ctx: &PollContext,
    download_url: Option<String>,
    filename: &str,
    file_size: Option<String>,
    cancel: &CancellationToken,
) -> PollOutcome {
    let mut file = None;

    if let Some(download_url) = download_url {
        let delivered = match ctx.backend.resolve_file_url(&download_url) {
            Ok(url) => tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(%download_url, "file delivery abandoned");
                    return PollOutcome::Cancelled;
                }
                delivered = ctx.sink.deliver(&url, filename) => delivered,
            },
            Err(err) => Err(err),
        };
        match delivered {
            Ok(path) => {
                ctx.emit(SessionEvent::FileDelivered { path: path.clone() });
                file = Some(path);
            }
            Err(err) => {
                tracing::warn!(%download_url, error = %err, "could not save finished file");
                ctx.notify(format!("Could not save file: {}", err), Severity::Error);
            }
        }
    }

    ctx.emit(SessionEvent::Control(ControlState::Complete));
    ctx.notify(
        format!(
            "Successfully downloaded {}! File size: {}",
            ctx.format.quality,
            file_size.as_deref().unwrap_or("Unknown")
        ),
        Severity::Success,
    );

    PollOutcome::Completed { file, file_size }
}
