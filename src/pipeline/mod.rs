use futures_util::future;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::feed::{fetch_channel_feed, VideoRecord};
use crate::http::HttpClient;
use crate::resolver::{resolve, CanonicalChannelId};
use crate::transcript::{fetch_transcript, Transcript, TranscriptProvider};

/// Knobs for one batch run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Maximum videos taken from each channel feed
    pub cap_per_channel: usize,

    /// Preferred transcript languages, in order
    pub languages: Vec<String>,

    /// Maximum in-flight resolutions or transcript lookups
    pub concurrency: usize,

    /// Work not finished by this instant counts as failed
    pub deadline: Option<Instant>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            cap_per_channel: 3,
            languages: vec!["en".to_string()],
            concurrency: 4,
            deadline: None,
        }
    }
}

impl BatchOptions {
    /// Set a deadline `after` from now
    pub fn with_deadline_after(mut self, after: Duration) -> Self {
        self.deadline = Some(Instant::now() + after);
        self
    }

    fn workers(&self) -> usize {
        self.concurrency.max(1)
    }
}

/// A video paired with its transcript, if one could be retrieved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoWithTranscript {
    pub video: VideoRecord,
    pub transcript: Option<Transcript>,
}

/// Run `fut` to completion, or give up once the deadline passes
async fn before_deadline<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(at) => tokio::time::timeout_at(at, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// Resolve references in input order, dropping the ones that cannot be resolved
/// and repeated channels.
pub async fn resolve_all(
    http: &dyn HttpClient,
    references: &[String],
    options: &BatchOptions,
) -> Vec<CanonicalChannelId> {
    let deadline = options.deadline;

    let resolved: Vec<CanonicalChannelId> = stream::iter(references.iter().cloned())
        .map(|reference| async move {
            match before_deadline(deadline, resolve(http, &reference)).await {
                Some(id) => id,
                None => {
                    tracing::warn!("Deadline reached while resolving {}", reference);
                    None
                }
            }
        })
        .buffered(options.workers())
        .filter_map(future::ready)
        .collect()
        .await;

    let unresolved = references.len() - resolved.len();
    if unresolved > 0 {
        tracing::warn!(
            "{} of {} channel reference(s) could not be resolved",
            unresolved,
            references.len()
        );
    }

    let (channel_ids, duplicates) = dedupe_channels(resolved);
    if duplicates > 0 {
        tracing::info!("Ignoring {} repeated channel reference(s)", duplicates);
    }
    channel_ids
}

/// Keep the first occurrence of each channel, returning how many repeats were dropped
fn dedupe_channels(ids: Vec<CanonicalChannelId>) -> (Vec<CanonicalChannelId>, usize) {
    let total = ids.len();
    let mut seen = HashSet::new();
    let unique: Vec<CanonicalChannelId> = ids
        .into_iter()
        .filter(|id| {
            let first = seen.insert(id.clone());
            if !first {
                tracing::debug!("Channel {} listed more than once", id);
            }
            first
        })
        .collect();

    let duplicates = total - unique.len();
    (unique, duplicates)
}

/// Fetch feeds one channel at a time, concatenating videos in channel order.
///
/// A channel whose feed cannot be fetched is skipped.
pub async fn collect_videos(
    http: &dyn HttpClient,
    channel_ids: &[CanonicalChannelId],
    options: &BatchOptions,
) -> Vec<VideoRecord> {
    let mut videos = Vec::new();

    for channel_id in channel_ids {
        match before_deadline(
            options.deadline,
            fetch_channel_feed(http, channel_id, options.cap_per_channel),
        )
        .await
        {
            Some(Ok(channel_videos)) => videos.extend(channel_videos),
            Some(Err(e)) => tracing::warn!("Skipping channel {}: {}", channel_id, e),
            None => tracing::warn!("Skipping channel {}: batch deadline reached", channel_id),
        }
    }

    videos
}

/// Pair each video with its transcript, keeping the input order
pub async fn attach_transcripts(
    provider: &dyn TranscriptProvider,
    videos: Vec<VideoRecord>,
    options: &BatchOptions,
) -> Vec<VideoWithTranscript> {
    let deadline = options.deadline;
    let languages = options.languages.as_slice();

    stream::iter(videos)
        .map(|video| async move {
            let transcript = if video.has_video_id() {
                before_deadline(deadline, fetch_transcript(provider, &video.video_id, languages))
                    .await
                    .flatten()
            } else {
                None
            };
            VideoWithTranscript { video, transcript }
        })
        .buffered(options.workers())
        .collect()
        .await
}

/// Resolve channel references, fetch their latest videos and attach transcripts.
///
/// Never fails: unresolvable references, failing channels and missing transcripts
/// shrink the result instead. Output order is channel order, then feed order.
pub async fn get_videos_with_transcripts(
    http: &dyn HttpClient,
    provider: &dyn TranscriptProvider,
    references: &[String],
    options: &BatchOptions,
) -> Vec<VideoWithTranscript> {
    tracing::info!("Resolving {} channel reference(s)", references.len());
    let channel_ids = resolve_all(http, references, options).await;

    let videos = collect_videos(http, &channel_ids, options).await;
    tracing::info!(
        "Fetching transcripts for {} video(s) from {} channel(s)",
        videos.len(),
        channel_ids.len()
    );

    let results = attach_transcripts(provider, videos, options).await;

    let with_transcript = results.iter().filter(|r| r.transcript.is_some()).count();
    tracing::info!(
        "Collected {} video(s), {} with transcripts",
        results.len(),
        with_transcript
    );

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::transcript::{CaptionSegment, CaptionTrack};
    use crate::{FetchError, TranscriptError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const CHANNEL_A: &str = "UCAAAAAAAAAAAAAAAAAAAAAA";
    const CHANNEL_B: &str = "UCBBBBBBBBBBBBBBBBBBBBBB";

    /// Serves canned responses by URL; unknown URLs fail like a refused connection
    #[derive(Default)]
    struct FakeHttp {
        pages: HashMap<String, HttpResponse>,
        calls: AtomicUsize,
    }

    impl FakeHttp {
        fn page(mut self, url: &str, status: u16, body: impl Into<String>) -> Self {
            self.pages.insert(url.to_string(), HttpResponse::new(status, body));
            self
        }

        fn feed(self, channel: &str, ids: &[&str]) -> Self {
            let entries: String = ids
                .iter()
                .map(|id| {
                    format!(
                        r#"<entry><id>yt:video:{id}</id><title>Video {id}</title><link rel="alternate" href="https://www.youtube.com/watch?v={id}"/><published>2024-05-01T10:00:00+00:00</published><updated>2024-05-01T10:00:00+00:00</updated></entry>"#
                    )
                })
                .collect();
            let body = format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><feed xmlns="http://www.w3.org/2005/Atom"><id>yt:channel:{channel}</id><title>Channel</title>{entries}</feed>"#
            );
            self.page(
                &format!("https://www.youtube.com/feeds/videos.xml?channel_id={}", channel),
                200,
                body,
            )
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpClient for FakeHttp {
        async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Transport(format!("connection refused: {}", url)))
        }
    }

    /// Provider with one English track per known video; slower for earlier videos
    #[derive(Default)]
    struct FakeProvider {
        texts: HashMap<String, Vec<String>>,
        delays_ms: HashMap<String, u64>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn with(mut self, video_id: &str, lines: &[&str], delay_ms: u64) -> Self {
            self.texts
                .insert(video_id.to_string(), lines.iter().map(|l| l.to_string()).collect());
            self.delays_ms.insert(video_id.to_string(), delay_ms);
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TranscriptProvider for FakeProvider {
        async fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>, TranscriptError> {
            self.requested.lock().unwrap().push(video_id.to_string());
            if let Some(ms) = self.delays_ms.get(video_id) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            if !self.texts.contains_key(video_id) {
                return Err(TranscriptError::TranscriptsDisabled);
            }
            Ok(vec![CaptionTrack {
                language_code: "en".into(),
                language_name: "English".into(),
                is_generated: false,
                is_translatable: true,
                base_url: video_id.to_string(),
            }])
        }

        async fn fetch_track(&self, track: &CaptionTrack) -> Result<Vec<CaptionSegment>, TranscriptError> {
            let lines = self
                .texts
                .get(&track.base_url)
                .ok_or(TranscriptError::NoTranscriptFound)?;
            Ok(lines
                .iter()
                .map(|l| CaptionSegment {
                    text: l.clone(),
                    start: 0.0,
                    duration: 1.0,
                })
                .collect())
        }
    }

    fn refs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn ids(results: &[VideoWithTranscript]) -> Vec<&str> {
        results.iter().map(|r| r.video.video_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_one_resolving_channel_one_unresolvable() {
        let http = FakeHttp::default().feed(CHANNEL_A, &["a1", "a2"]);
        let provider = FakeProvider::default().with("a1", &["first", "line"], 0);

        let options = BatchOptions {
            cap_per_channel: 3,
            ..Default::default()
        };
        let results = get_videos_with_transcripts(
            &http,
            &provider,
            &refs(&[
                format!("https://www.youtube.com/channel/{}", CHANNEL_A).as_str(),
                "https://www.youtube.com/@doesnotexist",
            ]),
            &options,
        )
        .await;

        assert_eq!(ids(&results), vec!["a1", "a2"]);
        assert_eq!(results[0].transcript.as_ref().unwrap().text, "first\nline");
        assert!(results[1].transcript.is_none());
        assert!(results.iter().all(|r| r.video.channel_id == CHANNEL_A));
    }

    #[tokio::test]
    async fn test_failing_feed_skips_only_that_channel() {
        let http = FakeHttp::default()
            .page(
                &format!("https://www.youtube.com/feeds/videos.xml?channel_id={}", CHANNEL_A),
                500,
                "boom",
            )
            .feed(CHANNEL_B, &["b1"]);
        let provider = FakeProvider::default();

        let results = get_videos_with_transcripts(
            &http,
            &provider,
            &refs(&[CHANNEL_A, CHANNEL_B]),
            &BatchOptions::default(),
        )
        .await;

        assert_eq!(ids(&results), vec!["b1"]);
        assert!(results[0].transcript.is_none());
    }

    #[tokio::test]
    async fn test_channel_order_and_cap_with_concurrency() {
        let http = FakeHttp::default()
            .feed(CHANNEL_A, &["a1", "a2", "a3", "a4"])
            .feed(CHANNEL_B, &["b1", "b2"])
            .page("https://www.youtube.com/@second", 200, format!(r#""externalId":"{}""#, CHANNEL_B));
        // Earlier videos finish last, so completion order is the reverse of input order.
        let provider = FakeProvider::default()
            .with("b2", &["b2 text"], 5)
            .with("b1", &["b1 text"], 15)
            .with("a3", &["a3 text"], 25)
            .with("a2", &["a2 text"], 35)
            .with("a1", &["a1 text"], 45);

        let options = BatchOptions {
            cap_per_channel: 3,
            concurrency: 8,
            ..Default::default()
        };
        let results = get_videos_with_transcripts(
            &http,
            &provider,
            &refs(&[CHANNEL_A, "https://www.youtube.com/@second/"]),
            &options,
        )
        .await;

        assert_eq!(ids(&results), vec!["a1", "a2", "a3", "b1", "b2"]);
        for r in &results {
            assert_eq!(
                r.transcript.as_ref().unwrap().text,
                format!("{} text", r.video.video_id)
            );
        }
    }

    #[tokio::test]
    async fn test_sequential_and_concurrent_runs_agree() {
        let build = || {
            (
                FakeHttp::default()
                    .feed(CHANNEL_A, &["a1", "a2"])
                    .feed(CHANNEL_B, &["b1"]),
                FakeProvider::default()
                    .with("a1", &["x"], 20)
                    .with("b1", &["y"], 1),
            )
        };
        let references = refs(&[CHANNEL_B, CHANNEL_A]);

        let (http, provider) = build();
        let sequential = get_videos_with_transcripts(
            &http,
            &provider,
            &references,
            &BatchOptions {
                concurrency: 1,
                ..Default::default()
            },
        )
        .await;

        let (http, provider) = build();
        let concurrent = get_videos_with_transcripts(
            &http,
            &provider,
            &references,
            &BatchOptions {
                concurrency: 16,
                ..Default::default()
            },
        )
        .await;

        assert_eq!(sequential, concurrent);
        assert_eq!(ids(&sequential), vec!["b1", "a1", "a2"]);
    }

    #[tokio::test]
    async fn test_empty_video_id_is_not_fetched() {
        let videos = vec![
            VideoRecord {
                title: "no id".into(),
                url: String::new(),
                video_id: String::new(),
                published_at: None,
                description: None,
                channel_id: CHANNEL_A.into(),
            },
            VideoRecord {
                title: "with id".into(),
                url: "https://www.youtube.com/watch?v=a1".into(),
                video_id: "a1".into(),
                published_at: None,
                description: None,
                channel_id: CHANNEL_A.into(),
            },
        ];
        let provider = FakeProvider::default().with("a1", &["hi"], 0);

        let results = attach_transcripts(&provider, videos, &BatchOptions::default()).await;

        assert_eq!(results.len(), 2);
        assert!(results[0].transcript.is_none());
        assert!(results[1].transcript.is_some());
        assert_eq!(provider.requested(), vec!["a1".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_channels_are_fetched_once() {
        let http = FakeHttp::default().feed(CHANNEL_A, &["a1"]);
        let channel_url = format!("https://www.youtube.com/channel/{}", CHANNEL_A);

        let resolved = resolve_all(&http, &refs(&[CHANNEL_A, channel_url.as_str()]), &BatchOptions::default()).await;

        assert_eq!(resolved.len(), 1);
        assert_eq!(http.calls(), 0);
    }

    #[test]
    fn test_dedupe_counts_repeats_separately() {
        let a = CanonicalChannelId::parse(CHANNEL_A).unwrap();
        let b = CanonicalChannelId::parse(CHANNEL_B).unwrap();

        let (unique, duplicates) = dedupe_channels(vec![a.clone(), b.clone(), a.clone(), a.clone()]);

        assert_eq!(unique, vec![a, b]);
        assert_eq!(duplicates, 2);
    }

    #[tokio::test]
    async fn test_deadline_degrades_transcripts_to_absent() {
        let http = FakeHttp::default().feed(CHANNEL_A, &["a1", "a2"]);
        let provider = FakeProvider::default()
            .with("a1", &["slow"], 500)
            .with("a2", &["slow"], 500);

        let channel_ids = resolve_all(&http, &refs(&[CHANNEL_A]), &BatchOptions::default()).await;
        let videos = collect_videos(&http, &channel_ids, &BatchOptions::default()).await;
        assert_eq!(videos.len(), 2);

        let options = BatchOptions::default().with_deadline_after(Duration::from_millis(50));
        let results = attach_transcripts(&provider, videos, &options).await;

        assert_eq!(ids(&results), vec!["a1", "a2"]);
        assert!(results.iter().all(|r| r.transcript.is_none()));
    }

    #[tokio::test]
    async fn test_no_references_yields_empty_batch() {
        let http = FakeHttp::default();
        let provider = FakeProvider::default();

        let results = get_videos_with_transcripts(&http, &provider, &[], &BatchOptions::default()).await;

        assert!(results.is_empty());
        assert_eq!(http.calls(), 0);
    }
}
