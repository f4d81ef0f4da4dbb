//! Downloader module - saves finished job files locally

use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::{Result, VidgrabError};
use crate::utils::paths::ensure_dir;

const DEFAULT_FILENAME: &str = "video";

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).expect("Invalid regex"));

/// Where a completed job's file ends up
#[async_trait]
pub trait FileSink: Send + Sync {
    /// Fetch `url` and store it as `filename`, returning the local path
    async fn deliver(&self, url: &Url, filename: &str) -> Result<PathBuf>;
}

/// Streams files over HTTP into a directory, with a progress bar
pub struct HttpFileSink {
    client: reqwest::Client,
    output_dir: PathBuf,
}

impl HttpFileSink {
    /// `timeout` bounds connecting and each read, not the whole transfer
    pub fn new(output_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| VidgrabError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            output_dir: output_dir.into(),
        })
    }

    fn progress_bar(&self, total: Option<u64>) -> ProgressBar {
        match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {msg}")
                {
                    bar.set_style(style.progress_chars("=> "));
                }
                bar
            }
            None => {
                let spinner = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {bytes} {msg}") {
                    spinner.set_style(style);
                }
                spinner
            }
        }
    }
}

#[async_trait]
impl FileSink for HttpFileSink {
    async fn deliver(&self, url: &Url, filename: &str) -> Result<PathBuf> {
        ensure_dir(&self.output_dir.to_string_lossy()).await?;

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(VidgrabError::Backend(format!(
                "File download failed (HTTP {})",
                response.status()
            )));
        }

        let (target, mut file) = create_unique(&self.output_dir, &sanitize_filename(filename)).await?;
        let partial = PartialFile::new(target);
        tracing::debug!(%url, target = %partial.path.display(), "saving file");

        let bar = self.progress_bar(response.content_length());
        bar.set_message(
            partial
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        );

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    bar.abandon();
                    return Err(err.into());
                }
            };
            file.write_all(&chunk).await?;
            bar.inc(chunk.len() as u64);
        }
        file.flush().await?;
        bar.finish_and_clear();

        Ok(partial.keep())
    }
}

/// Removes a file that never finished downloading, including when the
/// delivery future is dropped mid-transfer
struct PartialFile {
    path: PathBuf,
    done: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, done: false }
    }

    fn keep(mut self) -> PathBuf {
        self.done = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.done {
            if let Err(err) = std::fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %err, "could not remove partial file");
            }
        }
    }
}

/// Make a server-supplied name safe to use as a single path component
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_matches('.').trim();
    if cleaned.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Create `dir/name`, or `dir/name (n).ext` if that is taken
async fn create_unique(dir: &Path, name: &str) -> Result<(PathBuf, fs::File)> {
    let path = Path::new(name);
    let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let ext = path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();

    for n in 0u32.. {
        let candidate = match n {
            0 => dir.join(name),
            n => dir.join(format!("{} ({}){}", stem, n, ext)),
        };
        match fs::OpenOptions::new().write(true).create_new(true).open(&candidate).await {
            Ok(file) => return Ok((candidate, file)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Err(VidgrabError::File(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free name for {}", name),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio_test::assert_err;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("abc123.mp4"), "abc123.mp4");
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("a:b?.mp3"), "a_b_.mp3");
        assert_eq!(sanitize_filename("  "), "video");
        assert_eq!(sanitize_filename(".."), "video");
    }

    #[tokio::test]
    async fn test_create_unique_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let (first, _) = create_unique(dir.path(), "clip.mp4").await.unwrap();
        assert_eq!(first, dir.path().join("clip.mp4"));

        let (second, _) = create_unique(dir.path(), "clip.mp4").await.unwrap();
        assert_eq!(second, dir.path().join("clip (1).mp4"));

        let (bare, _) = create_unique(dir.path(), "video").await.unwrap();
        assert_eq!(bare, dir.path().join("video"));
        let (bare_again, _) = create_unique(dir.path(), "video").await.unwrap();
        assert_eq!(bare_again, dir.path().join("video (1)"));
    }

    /// Serve one response whose body stops short of its Content-Length
    async fn truncated_server() -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100000\r\n\r\n0123456789")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });
        Url::parse(&format!("http://{}/files/abc.mp4", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_interrupted_transfer_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = HttpFileSink::new(dir.path(), Duration::from_secs(5)).unwrap();
        let url = truncated_server().await;

        assert_err!(sink.deliver(&url, "abc.mp4").await);

        let left: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(left.is_empty(), "partial file left behind: {:?}", left);
    }

    #[test]
    fn test_partial_file_removed_unless_kept() {
        let dir = tempfile::tempdir().unwrap();
        let dropped = dir.path().join("dropped.mp4");
        let kept = dir.path().join("kept.mp4");
        std::fs::write(&dropped, b"x").unwrap();
        std::fs::write(&kept, b"x").unwrap();

        drop(PartialFile::new(dropped.clone()));
        assert_eq!(PartialFile::new(kept.clone()).keep(), kept);

        assert!(!dropped.exists());
        assert!(kept.exists());
    }
}
