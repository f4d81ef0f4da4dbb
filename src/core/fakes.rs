//! In-memory stand-ins for the backend and the file sink

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use url::Url;

use crate::core::backend::Backend;
use crate::core::downloader::FileSink;
use crate::error::{Result, VidgrabError};
use crate::types::{DownloadRequest, Format, JobStatus, MediaType, StatusSnapshot, VideoInfo};

/// Replays queued replies and records what it was asked
#[derive(Default)]
pub struct ScriptedBackend {
    fetch_replies: Mutex<VecDeque<Result<VideoInfo>>>,
    start_replies: Mutex<VecDeque<Result<String>>>,
    status_replies: Mutex<VecDeque<Result<StatusSnapshot>>>,
    healthy: bool,
    pub fetch_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub start_requests: Mutex<Vec<DownloadRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Default::default()
        }
    }

    pub fn unhealthy() -> Self {
        Self::default()
    }

    pub fn with_video(self, video: VideoInfo) -> Self {
        self.push_fetch(Ok(video));
        self
    }

    pub fn push_fetch(&self, reply: Result<VideoInfo>) {
        self.fetch_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_start(&self, reply: Result<String>) {
        self.start_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_status(&self, reply: Result<StatusSnapshot>) {
        self.status_replies.lock().unwrap().push_back(reply);
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> Vec<DownloadRequest> {
        self.start_requests.lock().unwrap().clone()
    }

    pub fn polls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn health(&self) -> Result<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(VidgrabError::Transport("connection refused".into()))
        }
    }

    async fn fetch_video(&self, _url: &str) -> Result<VideoInfo> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(VidgrabError::Backend("no scripted video".into())))
    }

    async fn start_download(&self, request: &DownloadRequest) -> Result<String> {
        self.start_requests.lock().unwrap().push(request.clone());
        self.start_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(VidgrabError::Backend("Download failed".into())))
    }

    async fn download_status(&self, _job_id: &str) -> Result<StatusSnapshot> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        // An exhausted script looks like a job that never leaves the queue
        self.status_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(StatusSnapshot::default()))
    }

    fn resolve_file_url(&self, download_url: &str) -> Result<Url> {
        Url::parse("http://localhost:8000/api/")
            .and_then(|base| base.join(download_url))
            .map_err(|e| VidgrabError::Backend(e.to_string()))
    }
}

/// Records deliveries instead of touching the network or disk
#[derive(Default)]
pub struct RecordingSink {
    pub delivered: Mutex<Vec<(Url, String)>>,
}

impl RecordingSink {
    pub fn deliveries(&self) -> Vec<(Url, String)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileSink for RecordingSink {
    async fn deliver(&self, url: &Url, filename: &str) -> Result<PathBuf> {
        self.delivered
            .lock()
            .unwrap()
            .push((url.clone(), filename.to_string()));
        Ok(PathBuf::from("downloads").join(filename))
    }
}

/// A sink whose transfer hangs for `delay` before it completes
pub struct StalledSink {
    delay: Duration,
    started: Notify,
    finished: AtomicBool,
}

impl StalledSink {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: Notify::new(),
            finished: AtomicBool::new(false),
        }
    }

    /// Resolves once a delivery is under way
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSink for StalledSink {
    async fn deliver(&self, _url: &Url, filename: &str) -> Result<PathBuf> {
        self.started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(PathBuf::from("downloads").join(filename))
    }
}

pub fn downloading(progress: f64) -> StatusSnapshot {
    StatusSnapshot {
        status: JobStatus::Downloading,
        progress: Some(progress),
        ..Default::default()
    }
}

pub fn sample_video() -> VideoInfo {
    VideoInfo {
        url: "https://example.com/v".into(),
        title: "Sample clip".into(),
        thumbnail: "https://example.com/t.jpg".into(),
        duration: "3:45".into(),
        views: "1.2M views".into(),
        channel: "Example".into(),
        description: "A clip".into(),
        formats: vec![
            Format {
                media_type: MediaType::Video,
                quality: "720p".into(),
                format: "MP4".into(),
                size: "45 MB".into(),
                format_id: Some("22".into()),
                ext: Some("mp4".into()),
            },
            Format {
                media_type: MediaType::Audio,
                quality: "128kbps".into(),
                format: "M4A".into(),
                size: "3 MB".into(),
                format_id: None,
                ext: None,
            },
        ],
    }
}
