//! TubeDigest - collect recent YouTube uploads and their transcripts without an API key
//!
//! This library resolves loosely specified channel references to canonical channel IDs,
//! reads each channel's public upload feed and fetches a best-effort transcript for every
//! video. Per-item failures shrink the result set instead of aborting the batch.

pub mod cli;
pub mod config;
pub mod feed;
pub mod http;
pub mod output;
pub mod pipeline;
pub mod resolver;
pub mod scrapers;
pub mod transcript;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use feed::{fetch_channel_feed, VideoRecord};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use pipeline::{get_videos_with_transcripts, BatchOptions, VideoWithTranscript};
pub use resolver::{resolve, CanonicalChannelId};
pub use scrapers::{Scraper, ScraperRunner, YouTubeScraper};
pub use transcript::{fetch_transcript, Transcript, TranscriptProvider};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Errors raised by the HTTP layer
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
}

/// Reasons a channel reference could not be resolved
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Unrecognized channel reference")]
    Unrecognized,

    #[error("Channel page lookup failed: {0}")]
    Lookup(FetchError),

    #[error("No channel ID token found on channel page")]
    TokenNotFound,
}

/// Outcomes reported by a transcript provider
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("Transcripts are disabled for this video")]
    TranscriptsDisabled,

    #[error("No transcript found")]
    NoTranscriptFound,

    #[error("Video is unavailable: {0}")]
    VideoUnavailable(String),

    #[error("Transcript request failed: {0}")]
    Transport(FetchError),

    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

/// Errors raised by the scraper dispatch layer
#[derive(thiserror::Error, Debug)]
pub enum ScraperError {
    #[error("No channel references configured")]
    NoChannels,

    #[error("Scraper '{name}' not found. Available: {available:?}")]
    NotFound { name: String, available: Vec<String> },
}
