use anyhow::{Context as _, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::producers::{SpeechSynthesizer, VoiceCloner};
use crate::app::{ElevenLabsConfig, NarrationConfig};
use crate::constants::HTTP_REQUEST_TIMEOUT_SECS;

/// ElevenLabs client covering instant voice cloning and text-to-speech
pub struct ElevenLabsClient {
    client: Client,
    base_url: String,
    api_key: String,
    model_id: String,
    output_format: String,
}

#[derive(Deserialize)]
struct AddVoiceResponse {
    voice_id: String,
}

impl ElevenLabsClient {
    /// Create a client, reading the API key from the configured environment variable
    pub fn new(config: &ElevenLabsConfig, narration: &NarrationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("{} is not set", config.api_key_env))?;

        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
                .build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model_id: narration.model_id.clone(),
            output_format: narration.output_format.clone(),
        })
    }
}

#[async_trait]
impl VoiceCloner for ElevenLabsClient {
    async fn clone_voice(&self, sample: &[u8]) -> Result<String> {
        let url = format!("{}/v1/voices/add", self.base_url);
        let name = format!("User Voice {}", chrono::Utc::now().timestamp_millis());

        let form = multipart::Form::new().text("name", name).part(
            "files",
            multipart::Part::bytes(sample.to_vec()).file_name("voice-sample"),
        );

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Failed to reach ElevenLabs")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Voice cloning failed ({}): {}", status, body);
        }

        let voice: AddVoiceResponse = response.json().await?;
        info!("Voice clone created with ID: {}", voice.voice_id);
        Ok(voice.voice_id)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Bytes> {
        let url = format!("{}/v1/text-to-speech/{}", self.base_url, voice_id);

        let response = self
            .client
            .post(&url)
            .query(&[("output_format", self.output_format.as_str())])
            .header("xi-api-key", &self.api_key)
            .json(&json!({
                "text": text,
                "model_id": self.model_id,
            }))
            .send()
            .await
            .context("Failed to reach ElevenLabs")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Speech synthesis failed ({}): {}", status, body);
        }

        Ok(response.bytes().await?)
    }
}
