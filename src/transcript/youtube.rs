use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;

use super::{CaptionSegment, CaptionTrack, TranscriptProvider};
use crate::feed::WATCH_URL;
use crate::http::HttpClient;
use crate::utils::decode_xml_entities;
use crate::TranscriptError;

/// Marker preceding the player response embedded in the watch page
const PLAYER_RESPONSE_MARKER: &str = "ytInitialPlayerResponse = ";

static TEXT_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<text\b([^>]*)>(.*?)</text>").expect("Failed to compile caption text regex")
});

static START_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bstart="([0-9.]+)""#).expect("Failed to compile start regex"));

static DUR_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bdur="([0-9.]+)""#).expect("Failed to compile dur regex"));

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("Failed to compile markup regex"));

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    playability_status: Option<PlayabilityStatus>,
    captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: String,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Captions {
    player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    #[serde(default)]
    caption_tracks: Vec<RawTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrack {
    base_url: String,
    language_code: String,
    name: Option<TrackName>,
    kind: Option<String>,
    #[serde(default)]
    is_translatable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackName {
    simple_text: Option<String>,
    #[serde(default)]
    runs: Vec<TextRun>,
}

#[derive(Debug, Deserialize)]
struct TextRun {
    text: String,
}

impl From<RawTrack> for CaptionTrack {
    fn from(raw: RawTrack) -> Self {
        let language_name = raw
            .name
            .and_then(|n| {
                n.simple_text
                    .or_else(|| (!n.runs.is_empty()).then(|| n.runs.into_iter().map(|r| r.text).collect()))
            })
            .unwrap_or_else(|| raw.language_code.clone());

        Self {
            is_generated: raw.kind.as_deref() == Some("asr"),
            language_code: raw.language_code,
            language_name,
            is_translatable: raw.is_translatable,
            base_url: raw.base_url,
        }
    }
}

/// Caption provider backed by the public watch page and its timed-text URLs
pub struct WatchPageProvider {
    http: Arc<dyn HttpClient>,
}

impl WatchPageProvider {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    async fn get_ok(&self, url: &str) -> Result<String, TranscriptError> {
        let response = self
            .http
            .get(url)
            .await
            .and_then(|r| r.error_for_status(url))
            .map_err(TranscriptError::Transport)?;
        Ok(response.body)
    }
}

#[async_trait]
impl TranscriptProvider for WatchPageProvider {
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>, TranscriptError> {
        let url = format!("{}{}", WATCH_URL, urlencoding::encode(video_id));
        let page = self.get_ok(&url).await?;
        parse_caption_tracks(&page)
    }

    async fn fetch_track(&self, track: &CaptionTrack) -> Result<Vec<CaptionSegment>, TranscriptError> {
        let body = self.get_ok(&track.base_url).await?;
        Ok(parse_timed_text(&body))
    }
}

/// Extract the caption tracks advertised in a watch page
pub fn parse_caption_tracks(page: &str) -> Result<Vec<CaptionTrack>, TranscriptError> {
    let player = extract_player_response(page)?;

    if let Some(status) = &player.playability_status {
        if status.status != "OK" {
            let reason = status.reason.clone().unwrap_or_else(|| status.status.clone());
            return Err(TranscriptError::VideoUnavailable(reason));
        }
    }

    let renderer = player
        .captions
        .and_then(|c| c.player_captions_tracklist_renderer)
        .ok_or(TranscriptError::TranscriptsDisabled)?;

    if renderer.caption_tracks.is_empty() {
        return Err(TranscriptError::NoTranscriptFound);
    }

    Ok(renderer.caption_tracks.into_iter().map(CaptionTrack::from).collect())
}

fn extract_player_response(page: &str) -> Result<PlayerResponse, TranscriptError> {
    let start = page
        .find(PLAYER_RESPONSE_MARKER)
        .and_then(|marker| page[marker..].find('{').map(|brace| marker + brace))
        .ok_or_else(|| TranscriptError::Malformed("player response not found".to_string()))?;

    // Parse only the first JSON value; the script continues after it.
    let mut de = serde_json::Deserializer::from_str(&page[start..]);
    PlayerResponse::deserialize(&mut de).map_err(|e| TranscriptError::Malformed(e.to_string()))
}

/// Parse a timed-text document into segments in document order
pub fn parse_timed_text(xml: &str) -> Vec<CaptionSegment> {
    TEXT_ELEMENT
        .captures_iter(xml)
        .map(|caps| {
            let attrs = &caps[1];
            let number = |re: &Regex| {
                re.captures(attrs)
                    .and_then(|c| c[1].parse::<f64>().ok())
                    .unwrap_or(0.0)
            };

            let unescaped = decode_xml_entities(&caps[2]);
            let stripped = MARKUP.replace_all(&unescaped, "");
            let text = decode_xml_entities(&stripped).trim().to_string();

            CaptionSegment {
                text,
                start: number(&*START_ATTR),
                duration: number(&*DUR_ATTR),
            }
        })
        .collect()
}
