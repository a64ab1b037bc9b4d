//! Transcript intake: file-type sniffing and normalisation.
//!
//! Transcripts arrive as plain text or as subtitle files (SRT, WebVTT).
//! Subtitle cues are flattened to one `[MM:SS] text` line per cue so the
//! text-generation API sees timing hints it can turn into step timestamps.

use std::path::Path;

use regex::Regex;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info};

/// Upper bound for transcript files.
pub const MAX_TRANSCRIPT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptFormat {
    Plain,
    Srt,
    WebVtt,
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("transcript is {bytes} bytes, limit is {limit}")]
    TooLarge { bytes: usize, limit: usize },

    #[error("transcript is not valid UTF-8 text")]
    NotUtf8,

    #[error("transcript is empty")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedTranscript {
    pub format: TranscriptFormat,
    pub text: String,
}

/// Renders a cue start as `MM:SS`. Minutes are not wrapped into hours, so
/// an hour-long video yields `62:03`. Negative input clamps to `00:00`.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Guesses the transcript format from the file extension, falling back to
/// the content.
pub fn sniff_format(file_name: Option<&str>, content: &str) -> TranscriptFormat {
    let ext = file_name
        .and_then(|n| Path::new(n).extension())
        .map(|e| e.to_string_lossy().to_lowercase());
    match ext.as_deref() {
        Some("vtt") => return TranscriptFormat::WebVtt,
        Some("srt") => return TranscriptFormat::Srt,
        _ => {}
    }

    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with("WEBVTT") {
        return TranscriptFormat::WebVtt;
    }

    let mut lines = trimmed.lines();
    if let (Some(first), Some(second)) = (lines.next(), lines.next()) {
        if first.trim().chars().all(|c| c.is_ascii_digit())
            && !first.trim().is_empty()
            && second.contains("-->")
        {
            return TranscriptFormat::Srt;
        }
    }

    TranscriptFormat::Plain
}

fn cue_start_seconds(cue_timing: &Regex, timing: &str) -> Option<f64> {
    let caps = cue_timing.captures(timing)?;
    let hours: f64 = match caps.get(1) {
        Some(h) => h.as_str().parse().ok()?,
        None => 0.0,
    };
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn normalize_cues(content: &str) -> String {
    let (Ok(tags), Ok(cue_timing)) = (
        Regex::new(r"<[^>]+>"),
        Regex::new(r"^\s*(?:(\d+):)?(\d{1,2}):(\d{2})(?:[,.](\d{1,3}))?"),
    ) else {
        return content.trim().to_string();
    };

    let mut lines = Vec::new();
    let mut last_text: Option<String> = None;

    for block in content.split("\n\n") {
        let Some(timing_idx) = block.lines().position(|l| l.contains("-->")) else {
            continue;
        };
        let Some(timing) = block.lines().nth(timing_idx) else {
            continue;
        };
        let Some(start) = cue_start_seconds(&cue_timing, timing) else {
            continue;
        };

        let text = block
            .lines()
            .skip(timing_idx + 1)
            .map(|l| tags.replace_all(l.trim(), "").to_string())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if text.is_empty() || last_text.as_deref() == Some(text.as_str()) {
            continue;
        }
        lines.push(format!("[{}] {}", format_timestamp(start), text));
        last_text = Some(text);
    }

    lines.join("\n")
}

/// Flattens `content` to the text sent to the generator.
pub fn normalize_transcript(content: &str, format: TranscriptFormat) -> String {
    let content = content.replace("\r\n", "\n");
    let content = content.trim_start_matches('\u{feff}');
    match format {
        TranscriptFormat::Plain => content.trim().to_string(),
        TranscriptFormat::Srt | TranscriptFormat::WebVtt => normalize_cues(content),
    }
}

/// Checks size and encoding of raw transcript bytes, then sniffs and
/// normalises them.
pub fn parse_transcript(
    file_name: Option<&str>,
    bytes: Vec<u8>,
) -> Result<LoadedTranscript, TranscriptError> {
    if bytes.len() > MAX_TRANSCRIPT_BYTES {
        return Err(TranscriptError::TooLarge {
            bytes: bytes.len(),
            limit: MAX_TRANSCRIPT_BYTES,
        });
    }
    let content = String::from_utf8(bytes).map_err(|_| TranscriptError::NotUtf8)?;
    let format = sniff_format(file_name, &content);
    let text = normalize_transcript(&content, format);
    if text.is_empty() {
        return Err(TranscriptError::Empty);
    }
    debug!(?format, chars = text.chars().count(), "Transcript normalised");
    Ok(LoadedTranscript { format, text })
}

/// Load a transcript file from disk.
pub async fn load_transcript(path: &Path) -> Result<LoadedTranscript, TranscriptError> {
    info!(path = %path.display(), "Loading transcript");
    let bytes = fs::read(path).await?;
    let file_name = path.file_name().map(|n| n.to_string_lossy().to_string());
    parse_transcript(file_name.as_deref(), bytes)
}
