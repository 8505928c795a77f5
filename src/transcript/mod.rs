use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::TranscriptError;

pub mod youtube;

pub use youtube::WatchPageProvider;

/// One language/version of timed-text captions advertised for a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionTrack {
    /// Language code (e.g. `en`, `es`, `pt-BR`)
    pub language_code: String,

    /// Human-readable language name
    pub language_name: String,

    /// Auto-generated (speech recognition) track
    pub is_generated: bool,

    /// Track the provider can machine-translate from
    pub is_translatable: bool,

    /// Provider URL the track's segments are fetched from
    pub base_url: String,
}

/// Individual caption segment with timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionSegment {
    /// Segment text
    pub text: String,

    /// Start time in seconds
    pub start: f64,

    /// Duration in seconds
    pub duration: f64,
}

/// Concatenated caption text for a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub video_id: String,
    pub language_code: String,
    pub is_generated: bool,
    /// Segment texts joined by `\n`, never empty
    pub text: String,
}

/// Caption track source: list the tracks for a video, then fetch one of them
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// List every caption track the provider advertises for a video
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>, TranscriptError>;

    /// Fetch the segments of one track, in the order the provider sends them
    async fn fetch_track(&self, track: &CaptionTrack) -> Result<Vec<CaptionSegment>, TranscriptError>;
}

/// Pick the track to fetch.
///
/// Preferred languages are tried in order, a manually created track beating an
/// auto-generated one for the same language. Without a match, the first
/// translation-eligible track is used, then the first track of any language.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    for lang in languages {
        let matching = |generated: bool| {
            tracks
                .iter()
                .find(|t| t.is_generated == generated && t.language_code.eq_ignore_ascii_case(lang))
        };
        if let Some(track) = matching(false).or_else(|| matching(true)) {
            return Some(track);
        }
    }

    tracks
        .iter()
        .find(|t| t.is_translatable)
        .or_else(|| tracks.first())
}

/// Join segment texts with a single newline
pub fn join_segments(segments: &[CaptionSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fetch a transcript, reporting why none is available
pub async fn try_fetch_transcript(
    provider: &dyn TranscriptProvider,
    video_id: &str,
    languages: &[String],
) -> Result<Transcript, TranscriptError> {
    let tracks = provider.list_tracks(video_id).await?;

    let track = select_track(&tracks, languages).ok_or(TranscriptError::NoTranscriptFound)?;
    tracing::debug!(
        "Using {} track '{}' for {}",
        if track.is_generated { "generated" } else { "manual" },
        track.language_code,
        video_id
    );

    let segments = provider.fetch_track(track).await?;
    let text = join_segments(&segments);
    if text.trim().is_empty() {
        return Err(TranscriptError::NoTranscriptFound);
    }

    Ok(Transcript {
        video_id: video_id.to_string(),
        language_code: track.language_code.clone(),
        is_generated: track.is_generated,
        text,
    })
}

/// Fetch a transcript for a video, or `None` when none can be retrieved.
///
/// A missing transcript is an expected outcome, so every provider failure degrades to `None`.
pub async fn fetch_transcript(
    provider: &dyn TranscriptProvider,
    video_id: &str,
    languages: &[String],
) -> Option<Transcript> {
    if video_id.is_empty() {
        return None;
    }

    match try_fetch_transcript(provider, video_id, languages).await {
        Ok(transcript) => Some(transcript),
        Err(
            e @ (TranscriptError::TranscriptsDisabled
            | TranscriptError::NoTranscriptFound
            | TranscriptError::VideoUnavailable(_)),
        ) => {
            tracing::debug!("No transcript for {}: {}", video_id, e);
            None
        }
        Err(e) => {
            tracing::warn!("Transcript lookup for {} failed: {}", video_id, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FetchError;

    fn track(lang: &str, generated: bool, translatable: bool) -> CaptionTrack {
        CaptionTrack {
            language_code: lang.to_string(),
            language_name: lang.to_uppercase(),
            is_generated: generated,
            is_translatable: translatable,
            base_url: format!("https://captions.test/{}/{}", lang, generated),
        }
    }

    fn segments(texts: &[&str]) -> Vec<CaptionSegment> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| CaptionSegment {
                text: t.to_string(),
                start: i as f64,
                duration: 1.0,
            })
            .collect()
    }

    fn langs(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_select_preferred_order() {
        let tracks = vec![track("es", false, true), track("en", false, true)];
        assert_eq!(select_track(&tracks, &langs(&["en", "es"])).unwrap().language_code, "en");
        assert_eq!(select_track(&tracks, &langs(&["es", "en"])).unwrap().language_code, "es");
    }

    #[test]
    fn test_select_manual_over_generated() {
        let tracks = vec![track("en", true, true), track("en", false, false)];
        assert!(!select_track(&tracks, &langs(&["en"])).unwrap().is_generated);
    }

    #[test]
    fn test_fallback_prefers_translation_eligible_track() {
        let tracks = vec![track("de", true, false), track("fr", false, true)];
        assert_eq!(select_track(&tracks, &langs(&["en"])).unwrap().language_code, "fr");
    }

    #[test]
    fn test_fallback_without_translatable_tracks_takes_first_any_language() {
        // The provider advertises nothing translatable; any caption track still beats none.
        let tracks = vec![track("de", true, false), track("fr", false, false)];
        assert_eq!(select_track(&tracks, &langs(&["en"])).unwrap().language_code, "de");
        assert!(select_track(&[], &langs(&["en"])).is_none());
    }

    #[tokio::test]
    async fn test_spanish_only_video_with_en_es_preference() {
        let mut provider = MockTranscriptProvider::new();
        provider
            .expect_list_tracks()
            .withf(|id| id == "vid1")
            .times(1)
            .returning(|_| Ok(vec![track("es", false, true)]));
        provider
            .expect_fetch_track()
            .withf(|t| t.language_code == "es")
            .times(1)
            .returning(|_| Ok(segments(&["Hola", "a todos"])));

        let transcript = fetch_transcript(&provider, "vid1", &langs(&["en", "es"])).await.unwrap();
        assert_eq!(transcript.text, "Hola\na todos");
        assert_eq!(transcript.language_code, "es");
        assert_eq!(transcript.video_id, "vid1");
    }

    #[tokio::test]
    async fn test_provider_errors_degrade_to_absent() {
        for err in [
            TranscriptError::TranscriptsDisabled,
            TranscriptError::NoTranscriptFound,
            TranscriptError::VideoUnavailable("private".into()),
            TranscriptError::Transport(FetchError::Timeout),
            TranscriptError::Malformed("garbage".into()),
        ] {
            let mut provider = MockTranscriptProvider::new();
            provider
                .expect_list_tracks()
                .times(1)
                .returning(move |_| Err(err.clone()));
            provider.expect_fetch_track().times(0);

            assert!(fetch_transcript(&provider, "vid1", &langs(&["en"])).await.is_none());
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_degrades_to_absent() {
        let mut provider = MockTranscriptProvider::new();
        provider
            .expect_list_tracks()
            .returning(|_| Ok(vec![track("en", false, true)]));
        provider
            .expect_fetch_track()
            .times(1)
            .returning(|_| Err(TranscriptError::Transport(FetchError::Transport("reset".into()))));

        assert!(fetch_transcript(&provider, "vid1", &langs(&["en"])).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_text_is_absent() {
        let mut provider = MockTranscriptProvider::new();
        provider
            .expect_list_tracks()
            .returning(|_| Ok(vec![track("en", false, true)]));
        provider.expect_fetch_track().returning(|_| Ok(segments(&["", " "])));

        assert_eq!(
            try_fetch_transcript(&provider, "vid1", &langs(&["en"])).await,
            Err(TranscriptError::NoTranscriptFound)
        );
    }

    #[tokio::test]
    async fn test_empty_video_id_skips_provider() {
        let mut provider = MockTranscriptProvider::new();
        provider.expect_list_tracks().times(0);

        assert!(fetch_transcript(&provider, "", &langs(&["en"])).await.is_none());
    }
}
