use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::producers::{SpeechSynthesizer, VoiceCloner};
use crate::app::Config;
use crate::cache::{content_hash, narration_key, voice_key, GenerationCache};
use crate::constants::{NARRATION_FILE_EXTENSION, NARRATION_FILE_PREFIX};
use crate::utils::{short_key, CacheError};

/// Where narration audio goes and which voice to fall back on
#[derive(Debug, Clone)]
pub struct NarrationSettings {
    pub uploads_dir: PathBuf,
    pub public_prefix: String,
    pub default_voice_id: String,
}

impl NarrationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            uploads_dir: config.uploads_dir(),
            public_prefix: config.narration.public_prefix.clone(),
            default_voice_id: config.narration.default_voice_id.clone(),
        }
    }
}

/// Produces narration audio for story pages, reusing cloned voices and
/// previously synthesized pages through the two generation caches.
pub struct NarrationService {
    voices: Arc<GenerationCache>,
    narrations: Arc<GenerationCache>,
    cloner: Arc<dyn VoiceCloner>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    settings: NarrationSettings,
}

impl NarrationService {
    pub fn new(
        voices: Arc<GenerationCache>,
        narrations: Arc<GenerationCache>,
        cloner: Arc<dyn VoiceCloner>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        settings: NarrationSettings,
    ) -> Self {
        Self {
            voices,
            narrations,
            cloner,
            synthesizer,
            settings,
        }
    }

    /// Pick the voice for a narrator.
    ///
    /// A sample is cloned at most once per distinct content; without a sample,
    /// or when cloning fails, the default voice is used.
    pub async fn resolve_voice(&self, sample: Option<&[u8]>) -> String {
        let sample = match sample {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => {
                info!("No voice sample, using default voice");
                return self.settings.default_voice_id.clone();
            }
        };

        let resolved = match voice_key(sample) {
            Ok(key) => {
                self.voices
                    .get_or_create(&key, || self.cloner.clone_voice(sample))
                    .await
            }
            Err(e) => Err(e),
        };

        match resolved {
            Ok(voice_id) => voice_id,
            Err(e) => {
                warn!("Voice cloning failed, falling back to default voice: {}", e);
                self.settings.default_voice_id.clone()
            }
        }
    }

    /// Narrate one page, reusing the audio if this narrator already read it
    pub async fn narrate_page(
        &self,
        story_id: &str,
        narrator_id: &str,
        page: usize,
        voice_id: &str,
        text: &str,
    ) -> Result<String, CacheError> {
        let key = narration_key(story_id, narrator_id, page)?;
        if text.trim().is_empty() {
            return Err(CacheError::missing("narration text"));
        }

        self.narrations
            .get_or_create(&key, || self.synthesize_to_file(&key, page, voice_id, text))
            .await
    }

    /// Narrate every page of a story in order.
    ///
    /// Pages are synthesized one at a time. A page that fails is `None` in the
    /// result and does not stop the pages after it. Invalid story or narrator
    /// ids are rejected before any producer runs.
    pub async fn narrate_story(
        &self,
        story_id: &str,
        narrator_id: &str,
        voice_sample: Option<&[u8]>,
        texts: &[String],
    ) -> Result<Vec<Option<String>>, CacheError> {
        narration_key(story_id, narrator_id, 0)?;

        let voice_id = self.resolve_voice(voice_sample).await;
        info!(
            "Narrating {} pages of story {} with voice {}",
            texts.len(),
            story_id,
            short_key(&voice_id)
        );

        let mut narrations = Vec::with_capacity(texts.len());
        for (page, text) in texts.iter().enumerate() {
            match self
                .narrate_page(story_id, narrator_id, page, &voice_id, text)
                .await
            {
                Ok(url) => narrations.push(Some(url)),
                Err(e) => {
                    warn!("Narration failed for page {} of story {}: {}", page + 1, story_id, e);
                    narrations.push(None);
                }
            }
        }

        Ok(narrations)
    }

    async fn synthesize_to_file(
        &self,
        key: &str,
        page: usize,
        voice_id: &str,
        text: &str,
    ) -> anyhow::Result<String> {
        let audio = self.synthesizer.synthesize(voice_id, text).await?;
        if audio.is_empty() {
            anyhow::bail!("Synthesizer returned no audio");
        }

        tokio::fs::create_dir_all(&self.settings.uploads_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.settings.uploads_dir.display()))?;

        // The key digest keeps names unique across narrators within one millisecond
        let digest = content_hash(key.as_bytes());
        let filename = format!(
            "{}-{}-{}-{}.{}",
            NARRATION_FILE_PREFIX,
            chrono::Utc::now().timestamp_millis(),
            &digest[..12],
            page,
            NARRATION_FILE_EXTENSION
        );
        let filepath = self.settings.uploads_dir.join(&filename);
        tokio::fs::write(&filepath, &audio)
            .await
            .with_context(|| format!("Failed to write {}", filepath.display()))?;

        info!("Narration saved: {}", filename);
        Ok(format!(
            "{}/{}",
            self.settings.public_prefix.trim_end_matches('/'),
            filename
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheKind, CorruptPolicy, FileStore};
    use crate::narration::producers::{MockSpeechSynthesizer, MockVoiceCloner};
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn caches(dir: &TempDir) -> (Arc<GenerationCache>, Arc<GenerationCache>) {
        let open = |kind: CacheKind, file: &str| {
            let store = FileStore::new(dir.path().join(file), kind);
            Arc::new(GenerationCache::load(store, CorruptPolicy::Discard).unwrap())
        };
        (
            open(CacheKind::Voice, "voice-cache.json"),
            open(CacheKind::Narration, "narration-cache.json"),
        )
    }

    fn service(
        dir: &TempDir,
        cloner: MockVoiceCloner,
        synthesizer: MockSpeechSynthesizer,
    ) -> NarrationService {
        let (voices, narrations) = caches(dir);
        NarrationService::new(
            voices,
            narrations,
            Arc::new(cloner),
            Arc::new(synthesizer),
            NarrationSettings {
                uploads_dir: dir.path().join("uploads"),
                public_prefix: "/uploads/".to_string(),
                default_voice_id: "default-voice".to_string(),
            },
        )
    }

    fn texts(pages: &[&str]) -> Vec<String> {
        pages.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_identical_samples_clone_once() {
        let temp_dir = TempDir::new().unwrap();
        let mut cloner = MockVoiceCloner::new();
        cloner
            .expect_clone_voice()
            .times(1)
            .returning(|_| Ok("cloned-voice".to_string()));
        let service = service(&temp_dir, cloner, MockSpeechSynthesizer::new());

        let first = service.resolve_voice(Some(b"voice bytes".as_slice())).await;
        let second = service.resolve_voice(Some(b"voice bytes".to_vec().as_slice())).await;

        assert_eq!(first, "cloned-voice");
        assert_eq!(second, "cloned-voice");
    }

    #[tokio::test]
    async fn test_missing_or_failed_voice_uses_default() {
        let temp_dir = TempDir::new().unwrap();
        let mut cloner = MockVoiceCloner::new();
        cloner
            .expect_clone_voice()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("invalid audio")));
        let service = service(&temp_dir, cloner, MockSpeechSynthesizer::new());

        assert_eq!(service.resolve_voice(None).await, "default-voice");
        assert_eq!(service.resolve_voice(Some(b"".as_slice())).await, "default-voice");
        assert_eq!(service.resolve_voice(Some(b"bad".as_slice())).await, "default-voice");
        assert!(service.voices.is_empty());
    }

    #[tokio::test]
    async fn test_batch_marks_failed_pages() {
        let temp_dir = TempDir::new().unwrap();
        let mut synthesizer = MockSpeechSynthesizer::new();
        synthesizer.expect_synthesize().times(3).returning(|_, text| {
            if text == "b" {
                Err(anyhow::anyhow!("rate limited"))
            } else {
                Ok(Bytes::from_static(b"ID3 audio"))
            }
        });
        let service = service(&temp_dir, MockVoiceCloner::new(), synthesizer);

        let result = service
            .narrate_story("story-1", "narrator-1", None, &texts(&["a", "b", "c"]))
            .await
            .unwrap();

        assert_eq!(result.len(), 3);
        assert!(result[0].as_deref().unwrap().starts_with("/uploads/narration-"));
        assert_eq!(result[1], None);
        assert!(result[2].as_deref().unwrap().ends_with("-2.mp3"));
        assert!(service.narrations.lookup(&narration_key("story-1", "narrator-1", 1).unwrap()).is_none());

        let saved = result[0].as_deref().unwrap().trim_start_matches("/uploads/");
        assert_eq!(
            std::fs::read(temp_dir.path().join("uploads").join(saved)).unwrap(),
            b"ID3 audio"
        );
    }

    #[tokio::test]
    async fn test_repeat_batch_only_retries_failed_pages() {
        let temp_dir = TempDir::new().unwrap();
        let mut synthesizer = MockSpeechSynthesizer::new();
        let mut seq = mockall::Sequence::new();
        synthesizer
            .expect_synthesize()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Bytes::from_static(b"page one")));
        synthesizer
            .expect_synthesize()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(anyhow::anyhow!("timeout")));
        synthesizer
            .expect_synthesize()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, text| {
                assert_eq!(text, "two");
                Ok(Bytes::from_static(b"page two"))
            });
        let service = service(&temp_dir, MockVoiceCloner::new(), synthesizer);
        let pages = texts(&["one", "two"]);

        let first = service.narrate_story("s", "n", None, &pages).await.unwrap();
        assert!(first[0].is_some());
        assert!(first[1].is_none());

        let second = service.narrate_story("s", "n", None, &pages).await.unwrap();
        assert_eq!(second[0], first[0]);
        assert!(second[1].is_some());
    }

    #[tokio::test]
    async fn test_invalid_ids_rejected_before_producers() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir, MockVoiceCloner::new(), MockSpeechSynthesizer::new());

        let result = service
            .narrate_story("", "narrator", Some(b"sample".as_slice()), &texts(&["a"]))
            .await;
        assert!(matches!(result, Err(CacheError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_empty_page_text_is_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir, MockVoiceCloner::new(), MockSpeechSynthesizer::new());

        let result = service.narrate_page("s", "n", 0, "voice", "   ").await;
        assert!(matches!(result, Err(CacheError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_empty_audio_is_a_producer_failure() {
        let temp_dir = TempDir::new().unwrap();
        let mut synthesizer = MockSpeechSynthesizer::new();
        synthesizer
            .expect_synthesize()
            .returning(|_, _| Ok(Bytes::new()));
        let service = service(&temp_dir, MockVoiceCloner::new(), synthesizer);

        let result = service.narrate_page("s", "n", 0, "voice", "hello").await;
        assert!(matches!(result, Err(CacheError::Producer(_))));
    }
}
