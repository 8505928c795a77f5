use async_trait::async_trait;
use std::sync::Arc;

use crate::http::HttpClient;
use crate::pipeline::{get_videos_with_transcripts, BatchOptions, VideoWithTranscript};
use crate::transcript::TranscriptProvider;
use crate::{Result, ScraperError};

/// A named, argument-less unit of scraping work
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Stable name the scraper is registered under
    fn name(&self) -> &str;

    /// Run the scraper
    async fn run(&self) -> Result<Vec<VideoWithTranscript>>;
}

/// Latest uploads and transcripts for a fixed set of channels
pub struct YouTubeScraper {
    http: Arc<dyn HttpClient>,
    provider: Arc<dyn TranscriptProvider>,
    channels: Vec<String>,
    options: BatchOptions,
}

impl YouTubeScraper {
    pub const NAME: &'static str = "youtube";

    /// Create a scraper for `channels`; an empty channel list is a configuration error
    pub fn new(
        http: Arc<dyn HttpClient>,
        provider: Arc<dyn TranscriptProvider>,
        channels: Vec<String>,
        options: BatchOptions,
    ) -> std::result::Result<Self, ScraperError> {
        if channels.is_empty() {
            return Err(ScraperError::NoChannels);
        }

        Ok(Self {
            http,
            provider,
            channels,
            options,
        })
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }
}

#[async_trait]
impl Scraper for YouTubeScraper {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self) -> Result<Vec<VideoWithTranscript>> {
        Ok(get_videos_with_transcripts(
            self.http.as_ref(),
            self.provider.as_ref(),
            &self.channels,
            &self.options,
        )
        .await)
    }
}

/// Registry for managing and running named scrapers
#[derive(Default)]
pub struct ScraperRunner {
    scrapers: Vec<Box<dyn Scraper>>,
}

impl ScraperRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scraper, replacing any scraper already registered under the same name
    pub fn register(&mut self, scraper: Box<dyn Scraper>) {
        let name = scraper.name().to_string();

        match self.scrapers.iter().position(|s| s.name() == name) {
            Some(index) => self.scrapers[index] = scraper,
            None => self.scrapers.push(scraper),
        }

        tracing::info!("Registered scraper: {}", name);
    }

    /// Remove a scraper by name
    pub fn unregister(&mut self, name: &str) {
        let before = self.scrapers.len();
        self.scrapers.retain(|s| s.name() != name);

        if self.scrapers.len() != before {
            tracing::info!("Unregistered scraper: {}", name);
        }
    }

    /// Names of all registered scrapers, in registration order
    pub fn list_scrapers(&self) -> Vec<String> {
        self.scrapers.iter().map(|s| s.name().to_string()).collect()
    }

    /// Run one scraper by name
    pub async fn run(&self, name: &str) -> Result<Vec<VideoWithTranscript>> {
        let scraper = self
            .scrapers
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| ScraperError::NotFound {
                name: name.to_string(),
                available: self.list_scrapers(),
            })?;

        tracing::info!("Running scraper: {}", name);
        match scraper.run().await {
            Ok(result) => {
                tracing::info!("Scraper '{}' completed successfully", name);
                Ok(result)
            }
            Err(e) => {
                tracing::error!("Scraper '{}' failed: {:#}", name, e);
                Err(e)
            }
        }
    }

    /// Run every registered scraper in order; failed scrapers are left out of the result
    pub async fn run_all(&self) -> Vec<(String, Vec<VideoWithTranscript>)> {
        let mut results = Vec::new();

        for name in self.list_scrapers() {
            match self.run(&name).await {
                Ok(result) => results.push((name, result)),
                Err(e) => tracing::warn!("Skipping scraper '{}' due to error: {}", name, e),
            }
        }

        results
    }
}
