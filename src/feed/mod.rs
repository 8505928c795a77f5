use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::http::HttpClient;
use crate::resolver::CanonicalChannelId;
use crate::utils::trim_trailing_slashes;
use crate::FetchError;

/// Public uploads feed, parameterized by channel ID
pub const CHANNEL_FEED_URL: &str = "https://www.youtube.com/feeds/videos.xml?channel_id=";

/// Canonical watch URL prefix
pub const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

static ENTRY_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<entry(?:\s[^>]*)?>.*?</entry>").expect("Failed to compile feed entry regex")
});

/// `<yt:videoId>`, which the generic feed model does not keep
static YT_VIDEO_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<yt:videoId>\s*([^<\s]+)\s*</yt:videoId>").expect("Failed to compile video ID regex")
});

/// One video discovered in a channel feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    /// Video title, empty when the feed omits it
    pub title: String,

    /// Canonical watch URL
    pub url: String,

    /// Video ID, empty when the entry carries no derivable identifier
    pub video_id: String,

    /// Publication time if the feed supplied a parseable value
    pub published_at: Option<DateTime<Utc>>,

    /// Summary text
    pub description: Option<String>,

    /// Channel whose feed produced this record
    pub channel_id: String,
}

/// The feed fields a video record is built from, each explicitly optional
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub video_id: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

impl FeedEntry {
    /// Map a parsed Atom/RSS entry onto the known feed schema
    pub fn from_feed_rs(entry: &feed_rs::model::Entry) -> Self {
        let media = entry.media.first();

        let video_id = entry
            .id
            .strip_prefix("yt:video:")
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let link = entry
            .links
            .iter()
            .find(|l| l.rel.as_deref().map_or(true, |rel| rel.eq_ignore_ascii_case("alternate")))
            .or_else(|| entry.links.first())
            .map(|l| l.href.clone());

        let title = entry
            .title
            .as_ref()
            .or_else(|| media.and_then(|m| m.title.as_ref()))
            .map(|t| t.content.clone());

        let summary = entry
            .summary
            .as_ref()
            .or_else(|| media.and_then(|m| m.description.as_ref()))
            .map(|t| t.content.clone());

        Self {
            video_id,
            link,
            title,
            published: entry.published,
            summary,
        }
    }
}

impl VideoRecord {
    /// Build a record from one feed entry. Always produces a record, even with an empty ID.
    pub fn from_entry(entry: FeedEntry, channel_id: &str) -> Self {
        let link = entry.link.unwrap_or_default();

        let video_id = entry
            .video_id
            .unwrap_or_else(|| video_id_from_link(&link));

        let url = if video_id.is_empty() {
            link
        } else {
            format!("{}{}", WATCH_URL, video_id)
        };

        Self {
            title: entry.title.unwrap_or_default(),
            url,
            video_id,
            published_at: entry.published,
            description: entry.summary,
            channel_id: channel_id.to_string(),
        }
    }

    pub fn has_video_id(&self) -> bool {
        !self.video_id.is_empty()
    }
}

/// Derive a video ID from a link: the `v` query parameter, else the final path segment
pub fn video_id_from_link(link: &str) -> String {
    let link = link.trim();

    if let Ok(parsed) = url::Url::parse(link) {
        if let Some((_, v)) = parsed.query_pairs().find(|(key, _)| key == "v") {
            return v.into_owned();
        }
        return parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .unwrap_or("")
            .to_string();
    }

    // Relative or malformed links
    if let Some((_, query)) = link.split_once('?') {
        let query = query.split('#').next().unwrap_or("");
        if let Some(v) = query.split('&').find_map(|pair| pair.strip_prefix("v=")) {
            return v.to_string();
        }
    }

    let path = link.split(|c: char| c == '?' || c == '#').next().unwrap_or("");
    trim_trailing_slashes(path)
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_string()
}

/// `<yt:videoId>` of each `<entry>` in the document, by position
pub fn dedicated_video_ids(body: &str) -> Vec<Option<String>> {
    ENTRY_BLOCK
        .find_iter(body)
        .map(|entry| {
            YT_VIDEO_ID
                .captures(entry.as_str())
                .map(|caps| caps[1].to_string())
        })
        .collect()
}

/// Feed URL for a channel
pub fn feed_url(channel_id: &CanonicalChannelId) -> String {
    format!("{}{}", CHANNEL_FEED_URL, channel_id)
}

/// Parse a feed document into at most `cap` records, in document order.
///
/// An unparseable document yields no records.
pub fn parse_feed(body: &str, channel_id: &CanonicalChannelId, cap: usize) -> Vec<VideoRecord> {
    let feed = match feed_rs::parser::parse(body.as_bytes()) {
        Ok(feed) => feed,
        Err(e) => {
            tracing::warn!("Could not parse feed for channel {}: {}", channel_id, e);
            return Vec::new();
        }
    };

    let mut dedicated_ids = dedicated_video_ids(body);
    if dedicated_ids.len() != feed.entries.len() {
        tracing::debug!("Feed entries and <yt:videoId> blocks do not line up for {}", channel_id);
        dedicated_ids.clear();
    }

    feed.entries
        .iter()
        .enumerate()
        .take(cap)
        .map(|(index, entry)| {
            let mut fields = FeedEntry::from_feed_rs(entry);
            if let Some(id) = dedicated_ids.get(index).cloned().flatten() {
                fields.video_id = Some(id);
            }
            VideoRecord::from_entry(fields, channel_id.as_str())
        })
        .collect()
}

/// Fetch a channel's upload feed and return its first `cap` videos.
///
/// Transport failures and non-2xx statuses are returned to the caller.
pub async fn fetch_channel_feed(
    http: &dyn HttpClient,
    channel_id: &CanonicalChannelId,
    cap: usize,
) -> Result<Vec<VideoRecord>, FetchError> {
    let url = feed_url(channel_id);
    tracing::debug!("Fetching feed for channel {}", channel_id);

    let response = http.get(&url).await?.error_for_status(&url)?;
    let videos = parse_feed(&response.body, channel_id, cap);

    tracing::info!("Found {} video(s) for channel {}", videos.len(), channel_id);
    Ok(videos)
}
