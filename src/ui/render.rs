//! Terminal rendering of session events

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

use crate::types::{ControlState, SessionEvent, Severity, VideoInfo};
use crate::ui::notifier::{Notification, Notifier};

const DESCRIPTION_LIMIT: usize = 200;

/// Observes session events and draws them
pub struct Renderer {
    notifier: Notifier,
    progress: Option<ProgressBar>,
}

impl Renderer {
    pub fn new(notification_timeout: Duration) -> Self {
        Self {
            notifier: Notifier::new(notification_timeout),
            progress: None,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Drop notifications whose display time has passed
    pub fn tick(&mut self) {
        self.notifier.expire(Instant::now());
    }

    pub fn handle(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::VideoLoaded(video) => {
                self.clear_progress();
                for line in preview_lines(video) {
                    println!("{}", line);
                }
            }
            SessionEvent::FormatSelected { format, .. } => {
                self.print(format!("{} {}", "Selected:".dimmed(), format.label()));
            }
            SessionEvent::Control(state) => self.control(state),
            SessionEvent::Progress { percent, speed, .. } => {
                let bar = self.progress_bar();
                bar.set_position(percent.round() as u64);
                bar.set_message(progress_message(*percent, speed.as_deref()));
            }
            SessionEvent::Processing { .. } => {
                self.progress_bar().set_message("Processing...");
            }
            SessionEvent::FileDelivered { path } => {
                self.print(format!("{} {}", "Saved to".green(), path.display()));
            }
            SessionEvent::PollStopped { .. } => self.clear_progress(),
            SessionEvent::Notify { message, severity } => {
                let id = self.notifier.notify(message.clone(), *severity);
                if let Some(entry) = self.notifier.get(id) {
                    let line = format_notification(entry);
                    self.print(line);
                }
            }
            SessionEvent::Reset => {
                self.clear_progress();
                self.notifier.dismiss_all();
            }
        }
    }

    fn control(&mut self, state: &ControlState) {
        match state {
            ControlState::Disabled => {}
            ControlState::Ready { label } => {
                self.clear_progress();
                self.print(format!("{} {}", "▶".cyan(), label));
            }
            ControlState::Starting => {
                self.progress_bar().set_message("Starting download...");
            }
            ControlState::Busy => {
                self.progress_bar().set_message("Initializing download...");
            }
            ControlState::Complete => {
                if let Some(bar) = self.progress.take() {
                    bar.set_position(100);
                    bar.finish_with_message("Download complete!");
                }
            }
        }
    }

    fn progress_bar(&mut self) -> &ProgressBar {
        self.progress.get_or_insert_with(|| {
            let bar = ProgressBar::new(100);
            if let Ok(style) =
                ProgressStyle::default_bar().template("{spinner:.green} [{bar:30.cyan/blue}] {msg}")
            {
                bar.set_style(style.progress_chars("=> "));
            }
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        })
    }

    fn clear_progress(&mut self) {
        if let Some(bar) = self.progress.take() {
            bar.finish_and_clear();
        }
    }

    /// Print above the progress bar, if one is showing
    fn print(&self, line: String) {
        match &self.progress {
            Some(bar) => bar.println(line),
            None => println!("{}", line),
        }
    }
}

/// "Downloading... 45% (1.2MiB/s)"
pub fn progress_message(percent: f64, speed: Option<&str>) -> String {
    let mut msg = format!("Downloading... {}%", format_percent(percent));
    if let Some(speed) = speed {
        msg.push_str(&format!(" ({})", speed));
    }
    msg
}

fn format_percent(percent: f64) -> String {
    if percent.fract() == 0.0 {
        format!("{:.0}", percent)
    } else {
        format!("{:.1}", percent)
    }
}

pub fn format_notification(entry: &Notification) -> String {
    let stamp = entry.created_at.format("%H:%M:%S").to_string();
    let (icon, message) = match entry.severity {
        Severity::Info => ("ℹ".blue(), entry.message.normal()),
        Severity::Success => ("✓".green(), entry.message.green()),
        Severity::Warning => ("⚠".yellow(), entry.message.yellow()),
        Severity::Error => ("✗".red(), entry.message.red()),
    };
    format!("{} {} {}", stamp.dimmed(), icon, message)
}

/// Preview block shown after a successful fetch
pub fn preview_lines(video: &VideoInfo) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        html_escape::decode_html_entities(&video.title).bold().to_string(),
    ];

    let facts: Vec<String> = [
        ("⏱", &video.duration),
        ("👁", &video.views),
        ("📺", &video.channel),
    ]
    .iter()
    .filter(|(_, value)| !value.is_empty())
    .map(|(icon, value)| format!("{} {}", icon, value))
    .collect();
    if !facts.is_empty() {
        lines.push(facts.join("  ").cyan().to_string());
    }

    let description = html_escape::decode_html_entities(video.description.trim()).to_string();
    if !description.is_empty() {
        lines.push(truncate(&description, DESCRIPTION_LIMIT).dimmed().to_string());
    }
    if !video.thumbnail.is_empty() {
        lines.push(format!("{} {}", "Thumbnail:".dimmed(), video.thumbnail));
    }

    if video.formats.is_empty() {
        lines.push("No downloadable formats.".yellow().to_string());
    }
    lines
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Format, MediaType};

    fn plain() {
        colored::control::set_override(false);
    }

    fn video() -> VideoInfo {
        VideoInfo {
            url: "https://example.com/v".into(),
            title: "Tom &amp; Jerry".into(),
            thumbnail: String::new(),
            duration: "3:45".into(),
            views: String::new(),
            channel: "Cartoons".into(),
            description: "x".repeat(250),
            formats: vec![Format {
                media_type: MediaType::Video,
                quality: "720p".into(),
                format: "MP4".into(),
                size: "45 MB".into(),
                format_id: None,
                ext: None,
            }],
        }
    }

    #[test]
    fn test_progress_message() {
        assert_eq!(progress_message(30.0, None), "Downloading... 30%");
        assert_eq!(
            progress_message(42.5, Some("1.2MiB/s")),
            "Downloading... 42.5% (1.2MiB/s)"
        );
    }

    #[test]
    fn test_preview_lines() {
        plain();
        let lines = preview_lines(&video());
        assert_eq!(lines[1], "Tom & Jerry");
        assert_eq!(lines[2], "⏱ 3:45  📺 Cartoons");
        assert_eq!(lines[3].chars().count(), DESCRIPTION_LIMIT + 1);
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_notification_line_has_message() {
        plain();
        let mut n = Notifier::new(Duration::from_secs(5));
        let id = n.notify("disk full", Severity::Error);
        let line = format_notification(n.get(id).unwrap());
        assert!(line.ends_with("✗ disk full"));
    }

    #[test]
    fn test_renderer_tracks_notifications() {
        let mut r = Renderer::new(Duration::from_secs(5));
        r.handle(&SessionEvent::Notify {
            message: "Server connected successfully!".into(),
            severity: Severity::Success,
        });
        assert_eq!(r.notifier().len(), 1);

        r.handle(&SessionEvent::Reset);
        assert!(r.notifier().is_empty());
    }

    #[test]
    fn test_renderer_expires_notifications() {
        let mut r = Renderer::new(Duration::ZERO);
        r.handle(&SessionEvent::Notify {
            message: "gone".into(),
            severity: Severity::Info,
        });
        r.tick();
        assert!(r.notifier().is_empty());
    }
}
