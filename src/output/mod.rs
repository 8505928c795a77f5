use anyhow::Result;
use std::fmt::Write;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::feed::VideoRecord;
use crate::pipeline::VideoWithTranscript;
use crate::utils::preview_text;

/// Characters of transcript shown in text output
pub const TRANSCRIPT_PREVIEW_CHARS: usize = 200;

/// Render scraper results grouped by scraper name
pub fn render_results(results: &[(String, Vec<VideoWithTranscript>)], format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => {
            let mut out = String::new();
            for (name, items) in results {
                let _ = writeln!(out, "{} scraper results ({} videos):", name, items.len());
                out.push_str(&format_as_text(items));
            }
            Ok(out)
        }
        OutputFormat::Json => {
            let mut map = serde_json::Map::new();
            for (name, items) in results {
                map.insert(name.clone(), serde_json::to_value(items)?);
            }
            Ok(serde_json::to_string_pretty(&map)?)
        }
    }
}

/// Human-readable listing with a transcript preview per video
pub fn format_as_text(items: &[VideoWithTranscript]) -> String {
    let mut out = String::new();

    for item in items {
        write_video(&mut out, &item.video);
        match &item.transcript {
            Some(transcript) => {
                let _ = writeln!(
                    out,
                    "  Transcript: {}...",
                    preview_text(&transcript.text, TRANSCRIPT_PREVIEW_CHARS)
                );
            }
            None => out.push_str("  Transcript: (not available)\n"),
        }
    }

    out
}

/// Listing of videos without transcripts
pub fn format_videos(videos: &[VideoRecord]) -> String {
    let mut out = String::new();
    for video in videos {
        write_video(&mut out, video);
    }
    out
}

fn write_video(out: &mut String, video: &VideoRecord) {
    let _ = writeln!(out, "\n  Title: {}", video.title);
    let _ = writeln!(out, "  URL: {}", video.url);
    let _ = writeln!(out, "  Video ID: {}", video.video_id);
    if let Some(published) = video.published_at {
        let _ = writeln!(out, "  Published: {}", published.to_rfc3339());
    }
}

/// Save rendered results to file
pub async fn save_to_file(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }
    fs_err::write(path, content)?;
    Ok(())
}
