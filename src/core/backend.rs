//! Backend HTTP client
//!
//! Thin wrapper over the four calls the backend exposes. Everything that
//! decides *what* to do with a reply lives in the session controller.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::error::{Result, VidgrabError};
use crate::types::{DownloadRequest, ErrorBody, StartResponse, StatusSnapshot, VideoInfo};

const USER_AGENT: &str = concat!("vidgrab/", env!("CARGO_PKG_VERSION"));

/// The remote service that extracts videos and runs download jobs
#[async_trait]
pub trait Backend: Send + Sync {
    /// Any 2xx from the health endpoint
    async fn health(&self) -> Result<()>;

    /// Metadata and formats for a video URL
    async fn fetch_video(&self, url: &str) -> Result<VideoInfo>;

    /// Start a job, returning its id
    async fn start_download(&self, request: &DownloadRequest) -> Result<String>;

    /// Latest status of a job
    async fn download_status(&self, job_id: &str) -> Result<StatusSnapshot>;

    /// Qualify a `download_url` from a status reply against the server
    fn resolve_file_url(&self, download_url: &str) -> Result<Url>;
}

/// `Backend` over HTTP/JSON
pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| VidgrabError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base: parse_base_url(base_url)?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| VidgrabError::InvalidConfig(format!("Bad endpoint {}: {}", path, e)))
    }

    async fn read(&self, request: reqwest::RequestBuilder) -> Result<(StatusCode, String)> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(%status, bytes = body.len(), "backend replied");
        Ok((status, body))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn health(&self) -> Result<()> {
        let url = self.endpoint("health/")?;
        let (status, _) = self.read(self.client.get(url)).await?;
        if !status.is_success() {
            return Err(VidgrabError::Backend(format!(
                "Server health check failed (HTTP {})",
                status
            )));
        }
        Ok(())
    }

    async fn fetch_video(&self, url: &str) -> Result<VideoInfo> {
        let endpoint = self.endpoint("fetch-video/")?;
        tracing::debug!(%endpoint, video = url, "fetching metadata");
        let body = serde_json::json!({ "url": url });
        let (status, text) = self.read(self.client.post(endpoint).json(&body)).await?;
        decode_reply(status, &text, "Failed to fetch video")
    }

    async fn start_download(&self, request: &DownloadRequest) -> Result<String> {
        let endpoint = self.endpoint("download/")?;
        tracing::debug!(%endpoint, format_id = %request.format_id, "starting download");
        let (status, text) = self.read(self.client.post(endpoint).json(request)).await?;
        let reply: StartResponse = decode_reply(status, &text, "Download failed")?;
        job_id_from(reply)
    }

    async fn download_status(&self, job_id: &str) -> Result<StatusSnapshot> {
        let endpoint = self.endpoint(&status_path(job_id))?;
        let (status, text) = self.read(self.client.get(endpoint)).await?;
        decode_reply(status, &text, "Failed to get download status")
    }

    fn resolve_file_url(&self, download_url: &str) -> Result<Url> {
        self.base.join(download_url).map_err(|e| {
            VidgrabError::Backend(format!("Invalid download URL {}: {}", download_url, e))
        })
    }
}

/// Parse and normalise the configured API root so endpoint joins stay
/// underneath it.
pub fn parse_base_url(base_url: &str) -> Result<Url> {
    let mut normalised = base_url.trim().to_string();
    if !normalised.ends_with('/') {
        normalised.push('/');
    }
    let url = Url::parse(&normalised)
        .map_err(|e| VidgrabError::InvalidConfig(format!("api_base_url {}: {}", base_url, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(VidgrabError::InvalidConfig(format!(
            "api_base_url must be http(s), got {}",
            url.scheme()
        )));
    }
    Ok(url)
}

fn status_path(job_id: &str) -> String {
    format!("download-status/{}/", urlencoding::encode(job_id))
}

/// Turn a raw reply into `T`, or the backend's own error message
pub(crate) fn decode_reply<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
    fallback: &str,
) -> Result<T> {
    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string());
        tracing::warn!(%status, %message, "backend rejected request");
        return Err(VidgrabError::Backend(message));
    }

    serde_json::from_str(body)
        .map_err(|e| VidgrabError::Backend(format!("Malformed response from server: {}", e)))
}

fn job_id_from(reply: StartResponse) -> Result<String> {
    match reply {
        StartResponse {
            success: true,
            download_id: Some(id),
            ..
        } if !id.is_empty() => Ok(id),
        StartResponse { error, .. } => Err(VidgrabError::Backend(
            error.unwrap_or_else(|| "Download failed".into()),
        )),
    }
}
