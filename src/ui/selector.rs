//! Interactive prompts built on dialoguer

use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

use crate::types::{MediaType, MenuItem, VideoInfo};

/// Menu entries for a video's formats, valued by format index
pub fn format_items(video: &VideoInfo) -> Vec<MenuItem<usize>> {
    video
        .formats
        .iter()
        .enumerate()
        .map(|(index, format)| {
            let icon = match format.media_type {
                MediaType::Video => "🎬",
                MediaType::Audio => "🎵",
            };
            let size = if format.size.is_empty() {
                String::new()
            } else {
                format!(" [{}]", format.size)
            };
            MenuItem {
                label: format!("{} {}{}", icon, format.label(), size.dimmed()),
                value: index,
            }
        })
        .collect()
}

/// Let the user pick one of `items`; None when cancelled or empty
pub fn select<T: Clone>(items: &[MenuItem<T>], prompt: &str) -> Option<T> {
    if items.is_empty() {
        return None;
    }

    let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&labels)
        .default(0)
        .interact_opt()
        .ok()
        .flatten()?;

    items.get(selection).map(|item| item.value.clone())
}

/// Ask for a video URL; None when the user enters nothing or aborts
pub fn prompt_url() -> Option<String> {
    let input: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Video URL")
        .allow_empty(true)
        .interact_text()
        .ok()?;

    let input = input.trim().to_string();
    (!input.is_empty()).then_some(input)
}

pub fn confirm(prompt: &str, default: bool) -> bool {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default)
        .interact_opt()
        .ok()
        .flatten()
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Format;

    #[test]
    fn test_format_items_map_to_indices() {
        colored::control::set_override(false);
        let video = VideoInfo {
            url: "https://example.com/v".into(),
            title: String::new(),
            thumbnail: String::new(),
            duration: String::new(),
            views: String::new(),
            channel: String::new(),
            description: String::new(),
            formats: vec![
                Format {
                    media_type: MediaType::Video,
                    quality: "1080p".into(),
                    format: "MP4".into(),
                    size: "120 MB".into(),
                    format_id: None,
                    ext: None,
                },
                Format {
                    media_type: MediaType::Audio,
                    quality: "320kbps".into(),
                    format: "WEBM".into(),
                    size: String::new(),
                    format_id: None,
                    ext: None,
                },
            ],
        };

        let items = format_items(&video);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, "🎬 1080p MP4 [120 MB]");
        assert_eq!(items[1].label, "🎵 320kbps MP3");
        assert_eq!(items[1].value, 1);
    }

    #[test]
    fn test_select_empty_is_none() {
        let items: Vec<MenuItem<usize>> = Vec::new();
        assert_eq!(select(&items, "Pick"), None);
    }
}
