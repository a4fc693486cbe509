use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::{Client, Response};
use serde_json::{json, Value};

use super::{EffectSynthesizer, NarrationSynthesizer};
use crate::{audio::AudioTrack, config::GenerationConfig, Result, StoryMixError};

pub const GEMINI_TTS_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-preview-tts:generateContent";
pub const ELEVENLABS_SOUND_URL: &str = "https://api.elevenlabs.io/v1/sound-generation";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini text-to-speech. The service answers with base64 encoded raw
/// 16-bit mono PCM.
#[derive(Debug, Clone)]
pub struct GeminiNarrator {
    client: Client,
    api_key: String,
    endpoint: String,
    style_prefix: String,
    sample_rate: u32,
}

impl GeminiNarrator {
    pub fn new(api_key: impl Into<String>, config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            api_key: api_key.into(),
            endpoint: GEMINI_TTS_URL.to_string(),
            style_prefix: config.narration_style_prefix.clone(),
            sample_rate: config.narration_sample_rate,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request_body(&self, text: &str, voice: &str) -> Value {
        json!({
            "contents": [{ "parts": [{ "text": format!("{}{}", self.style_prefix, text) }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } }
                }
            }
        })
    }
}

impl NarrationSynthesizer for GeminiNarrator {
    fn synthesize(&self, text: &str, voice: &str) -> Result<AudioTrack> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(text, voice))
            .send()?;
        let payload: Value = ensure_success("Gemini", response)?.json()?;
        let pcm = inline_audio(&payload)?;
        AudioTrack::from_pcm_i16_le(&pcm, self.sample_rate, 1)
    }
}

/// Pulls the base64 audio out of a `generateContent` response.
pub fn inline_audio(payload: &Value) -> Result<Vec<u8>> {
    let data = payload
        .pointer("/candidates/0/content/parts/0/inlineData/data")
        .and_then(Value::as_str)
        .ok_or_else(|| StoryMixError::Generation("response carries no inline audio".to_string()))?;
    STANDARD
        .decode(data)
        .map_err(|err| StoryMixError::Generation(format!("inline audio is not base64: {err}")))
}

/// ElevenLabs sound generation. Returns the encoded clip as sent by the
/// service (MP3).
#[derive(Debug, Clone)]
pub struct ElevenLabsEffects {
    client: Client,
    api_key: String,
    endpoint: String,
    prompt_influence: f64,
}

impl ElevenLabsEffects {
    pub fn new(api_key: impl Into<String>, config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            api_key: api_key.into(),
            endpoint: ELEVENLABS_SOUND_URL.to_string(),
            prompt_influence: config.prompt_influence,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request_body(&self, description: &str, duration_seconds: f64) -> Value {
        json!({
            "text": description,
            "duration_seconds": duration_seconds,
            "prompt_influence": self.prompt_influence,
        })
    }
}

impl EffectSynthesizer for ElevenLabsEffects {
    fn synthesize(&self, description: &str, duration_seconds: f64) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("xi-api-key", &self.api_key)
            .json(&self.request_body(description, duration_seconds))
            .send()?;
        let bytes = ensure_success("ElevenLabs", response)?.bytes()?;
        Ok(bytes.to_vec())
    }
}

fn build_client() -> Result<Client> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

fn ensure_success(service: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(StoryMixError::Generation(format!(
        "{service} returned {status}: {body}"
    )))
}
