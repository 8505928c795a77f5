use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::http::HttpClient;
use crate::utils::trim_trailing_slashes;
use crate::ResolveError;

/// Base URL for channel page lookups
pub const YOUTUBE_BASE_URL: &str = "https://www.youtube.com";

/// `.../channel/UC...` or a bare `UC...` identifier
static CHANNEL_ID_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|/)channel/(UC[A-Za-z0-9_-]{22})(?:[/?#]|$)|^(UC[A-Za-z0-9_-]{22})$")
        .expect("Failed to compile channel ID regex")
});

static HANDLE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|/)@([^/?#\s]+)").expect("Failed to compile handle regex"));

static CUSTOM_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|/)c/([^/?#\s]+)").expect("Failed to compile custom URL regex"));

static USER_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|/)user/([^/?#\s]+)").expect("Failed to compile username regex"));

/// Owner ID in the channel metadata of a channel page
static EXTERNAL_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""externalId"\s*:\s*"(UC[A-Za-z0-9_-]{22})""#).expect("Failed to compile external ID regex")
});

static CANONICAL_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<link\s+rel="canonical"\s+href="[^"]*/channel/(UC[A-Za-z0-9_-]{22})""#)
        .expect("Failed to compile canonical link regex")
});

static META_CHANNEL_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<meta\s+itemprop="(?:channelId|identifier)"\s+content="(UC[A-Za-z0-9_-]{22})""#)
        .expect("Failed to compile channel meta regex")
});

/// Any `channelId` key; featured and related channels use it too
static ANY_CHANNEL_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""channelId"\s*:\s*"(UC[A-Za-z0-9_-]{22})""#).expect("Failed to compile channel token regex")
});

/// Stable platform-assigned channel identifier (`UC` + 22 characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalChannelId(String);

impl CanonicalChannelId {
    /// Accept only strings in the canonical shape
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let valid = value.len() == 24
            && value.starts_with("UC")
            && value[2..]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

        valid.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recognized shapes of a channel reference, in resolution priority order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceShape {
    /// Canonical ID present in the reference itself
    ChannelId(CanonicalChannelId),
    /// `@handle`
    Handle(String),
    /// `/c/<custom-name>`
    Custom(String),
    /// `/user/<legacy-username>`
    Username(String),
}

impl ReferenceShape {
    /// Page to scrape for the embedded channel ID, `None` when no lookup is needed
    pub fn lookup_url(&self) -> Option<String> {
        match self {
            ReferenceShape::ChannelId(_) => None,
            ReferenceShape::Handle(name) => Some(format!("{}/@{}", YOUTUBE_BASE_URL, encode_segment(name))),
            ReferenceShape::Custom(name) => Some(format!("{}/c/{}", YOUTUBE_BASE_URL, encode_segment(name))),
            ReferenceShape::Username(name) => {
                Some(format!("{}/user/{}", YOUTUBE_BASE_URL, encode_segment(name)))
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ReferenceShape::ChannelId(_) => "channel id",
            ReferenceShape::Handle(_) => "handle",
            ReferenceShape::Custom(_) => "custom url",
            ReferenceShape::Username(_) => "username",
        }
    }
}

/// Classify a reference without touching the network. First matching shape wins.
pub fn classify(reference: &str) -> Option<ReferenceShape> {
    let normalized = trim_trailing_slashes(reference.trim());
    if normalized.is_empty() {
        return None;
    }

    if let Some(caps) = CHANNEL_ID_PATH.captures(normalized) {
        let id = caps.get(1).or_else(|| caps.get(2))?.as_str();
        return CanonicalChannelId::parse(id).map(ReferenceShape::ChannelId);
    }

    let capture = |re: &Regex| re.captures(normalized).map(|caps| caps[1].to_string());

    if let Some(name) = capture(&*HANDLE_PATH) {
        return Some(ReferenceShape::Handle(name));
    }
    if let Some(name) = capture(&*CUSTOM_PATH) {
        return Some(ReferenceShape::Custom(name));
    }
    if let Some(name) = capture(&*USER_PATH) {
        return Some(ReferenceShape::Username(name));
    }

    None
}

/// Find the owning channel's ID in a channel page body.
///
/// Sources are tried from most to least specific: the metadata `externalId`,
/// the canonical link, the `channelId` meta tag and finally any `channelId` key.
pub fn extract_channel_id_token(body: &str) -> Option<CanonicalChannelId> {
    [&*EXTERNAL_ID, &*CANONICAL_LINK, &*META_CHANNEL_ID, &*ANY_CHANNEL_ID]
        .into_iter()
        .find_map(|re| re.captures(body).and_then(|caps| CanonicalChannelId::parse(&caps[1])))
}

/// Resolve a reference, reporting why resolution failed.
///
/// Performs at most one page fetch, and only for handle, custom and username shapes.
pub async fn resolve_reference(
    http: &dyn HttpClient,
    reference: &str,
) -> Result<CanonicalChannelId, ResolveError> {
    let shape = classify(reference).ok_or(ResolveError::Unrecognized)?;

    if let ReferenceShape::ChannelId(id) = shape {
        return Ok(id);
    }
    let url = shape.lookup_url().ok_or(ResolveError::Unrecognized)?;

    tracing::debug!("Looking up {} page: {}", shape.kind(), url);

    let page = http
        .get(&url)
        .await
        .and_then(|response| response.error_for_status(&url))
        .map_err(ResolveError::Lookup)?;

    extract_channel_id_token(&page.body).ok_or(ResolveError::TokenNotFound)
}

/// Resolve a reference to a canonical channel ID, or `None` if it cannot be resolved.
///
/// Never fails: lookup errors are logged and reported as absent.
pub async fn resolve(http: &dyn HttpClient, reference: &str) -> Option<CanonicalChannelId> {
    match resolve_reference(http, reference).await {
        Ok(id) => {
            tracing::info!("Resolved {} to {}", reference, id);
            Some(id)
        }
        Err(e) => {
            tracing::warn!("Could not resolve channel ID from {}: {}", reference, e);
            None
        }
    }
}

fn encode_segment(name: &str) -> String {
    let decoded = urlencoding::decode(name)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| name.to_string());
    urlencoding::encode(&decoded).into_owned()
}
