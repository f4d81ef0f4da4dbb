//! Type definitions for vidgrab
//!
//! Source of truth for all data structures shared between the backend
//! client, the session controller and the terminal front-end.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

// ============================================
// Video Types
// ============================================

/// Kind of media a format produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    /// Also covers any type the client does not know
    #[default]
    #[serde(other)]
    Video,
}

/// One selectable quality/container combination of a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Format {
    #[serde(rename = "type", default)]
    pub media_type: MediaType,
    /// "720p", "128kbps", ...
    #[serde(default, deserialize_with = "lenient_string")]
    pub quality: String,
    /// Container name, e.g. "MP4"
    #[serde(default, deserialize_with = "lenient_string")]
    pub format: String,
    /// Human readable size, e.g. "45.2 MB"
    #[serde(default, deserialize_with = "lenient_string")]
    pub size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
}

impl Format {
    /// Backend format selector, "best" when the backend gave none
    pub fn resolved_format_id(&self) -> &str {
        self.format_id.as_deref().unwrap_or("best")
    }

    /// Output extension, defaulting per media type
    pub fn resolved_ext(&self) -> &str {
        match (&self.ext, self.media_type) {
            (Some(ext), _) => ext,
            (None, MediaType::Audio) => "mp3",
            (None, MediaType::Video) => "mp4",
        }
    }

    /// Short name such as "720p MP4" or "128kbps MP3"
    pub fn label(&self) -> String {
        match self.media_type {
            MediaType::Video => format!("{} {}", self.quality, self.format),
            MediaType::Audio => format!("{} MP3", self.quality),
        }
    }
}

/// Metadata returned by the backend for a submitted URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub thumbnail: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub duration: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub views: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub channel: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default)]
    pub formats: Vec<Format>,
}

// ============================================
// Backend Wire Types
// ============================================

/// Body of `POST {base}/download/`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadRequest {
    pub url: String,
    pub format_id: String,
    pub quality: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub ext: String,
}

impl DownloadRequest {
    pub fn for_format(url: &str, format: &Format) -> Self {
        Self {
            url: url.to_string(),
            format_id: format.resolved_format_id().to_string(),
            quality: format.quality.clone(),
            media_type: format.media_type,
            ext: format.resolved_ext().to_string(),
        }
    }
}

/// Reply to a start-download call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub download_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Any backend reply that may carry an `error` field
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// Job status as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Downloading,
    Completed,
    Failed,
    /// Queued, unspecified or anything the client does not know
    #[default]
    #[serde(other)]
    Processing,
}

/// One reply of `GET {base}/download-status/{id}/`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: JobStatus,
    #[serde(default, deserialize_with = "lenient_number")]
    pub progress: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub speed: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub file_size: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// ============================================
// Session Types
// ============================================

/// State of the download-status polling machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Completed,
    Failed,
    /// Stopped by a transport or protocol failure
    Terminated,
    /// Stopped by a session reset
    Cancelled,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Idle | PollState::Polling)
    }
}

/// How a polling loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed {
        /// Local path of the delivered file, if any was delivered
        file: Option<PathBuf>,
        file_size: Option<String>,
    },
    Failed {
        message: String,
    },
    Terminated {
        message: String,
    },
    Cancelled,
}

impl PollOutcome {
    pub fn state(&self) -> PollState {
        match self {
            PollOutcome::Completed { .. } => PollState::Completed,
            PollOutcome::Failed { .. } => PollState::Failed,
            PollOutcome::Terminated { .. } => PollState::Terminated,
            PollOutcome::Cancelled => PollState::Cancelled,
        }
    }
}

/// What the download control should currently offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlState {
    /// No format selected yet
    Disabled,
    /// A format is selected and can be downloaded
    Ready { label: String },
    /// Start request in flight
    Starting,
    /// A job is being polled
    Busy,
    /// The last job finished and its file was handed over
    Complete,
}

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Everything the session controller reports to its observers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A fetch succeeded, render the preview
    VideoLoaded(VideoInfo),
    FormatSelected { index: usize, format: Format },
    Control(ControlState),
    Progress {
        job_id: String,
        percent: f64,
        speed: Option<String>,
    },
    Processing { job_id: String },
    FileDelivered { path: PathBuf },
    /// Emitted once per polling loop, when it exits
    PollStopped { job_id: String, outcome: PollOutcome },
    Notify { message: String, severity: Severity },
    /// The session was abandoned and its state dropped
    Reset,
}

// ============================================
// Config Types
// ============================================

/// User configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend API root (default: "http://localhost:8000/api")
    pub api_base_url: String,
    /// Status poll cadence in milliseconds (default: 2000)
    pub poll_interval_ms: u64,
    /// How long a notification stays visible (default: 5)
    pub notification_timeout_secs: u64,
    /// Per-request timeout (default: 30)
    pub request_timeout_secs: u64,
    /// Download directory path, empty means the OS download dir
    pub download_dir: String,
    /// Editor command used by --edit
    pub editor: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".into(),
            poll_interval_ms: 2000,
            notification_timeout_secs: 5,
            request_timeout_secs: 30,
            download_dir: String::new(), // Set at runtime to ~/Downloads
            editor: std::env::var("EDITOR").unwrap_or_else(|_| "nano".into()),
        }
    }
}

// ============================================
// Selector Types
// ============================================

/// Item displayed in selector menu
#[derive(Debug, Clone)]
pub struct MenuItem<T> {
    /// Display text
    pub label: String,
    /// Underlying value
    pub value: T,
}

// ============================================
// State Machine Types
// ============================================

/// Front-end state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Health check and greeting
    Init,
    /// Ask for a URL
    Prompt,
    /// Fetch metadata for the URL
    Fetch,
    /// Pick a format
    Select,
    /// Start the job and follow it
    Download,
    /// Offer another round
    Done,
    /// Exit application
    Exit,
}

// ============================================
// Lenient Deserializers
// ============================================

fn scalar_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Accept strings, numbers or null where the backend is loose about types
fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(value.and_then(scalar_to_string).unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(value.and_then(scalar_to_string))
}

fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    })
}

fn lenient_status<'de, D: Deserializer<'de>>(d: D) -> Result<JobStatus, D::Error> {
    let value = Option::<String>::deserialize(d)?;
    Ok(match value.as_deref() {
        Some("downloading") => JobStatus::Downloading,
        Some("completed") => JobStatus::Completed,
        Some("failed") => JobStatus::Failed,
        _ => JobStatus::Processing,
    })
}
