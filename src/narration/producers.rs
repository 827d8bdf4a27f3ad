use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Turns a voice sample into a reusable voice identifier.
///
/// Cloning is slow and rate-limited, so callers go through the voice cache.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceCloner: Send + Sync {
    async fn clone_voice(&self, sample: &[u8]) -> Result<String>;
}

/// Reads text aloud in a given voice and returns the encoded audio
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Bytes>;
}
