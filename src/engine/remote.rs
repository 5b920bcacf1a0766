use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, info};

use super::{EngineOutput, SpeechEngine, TranscriptSegment};
use crate::config::EngineConfig;
use crate::language;

/// Probability reported when the endpoint doesn't include one.
const DEFAULT_LANGUAGE_PROBABILITY: f32 = 0.8;

/// Remote transcription backend speaking the OpenAI-compatible
/// `POST /audio/transcriptions` protocol (whisper.cpp servers, OpenAI
/// itself, and various proxies all expose it).
pub struct RemoteWhisperEngine {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct VerboseResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f32>,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    #[serde(default)]
    text: String,
    #[serde(default)]
    avg_logprob: Option<f32>,
}

impl RemoteWhisperEngine {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build transcription HTTP client")?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            anyhow::bail!("engine.base_url must not be empty");
        }

        info!(url = %base_url, model = %config.model, "transcription engine configured");

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    /// Wraps normalized samples in a mono 16-bit WAV container in memory.
    fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut buffer = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
        {
            let mut writer = hound::WavWriter::new(&mut buffer, spec)
                .context("Failed to create in-memory WAV writer")?;
            for &sample in samples {
                let pcm = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
                writer
                    .write_sample(pcm)
                    .context("Failed to write sample to WAV buffer")?;
            }
            writer.finalize().context("Failed to finalize WAV buffer")?;
        }

        Ok(buffer.into_inner())
    }
}

#[async_trait]
impl SpeechEngine for RemoteWhisperEngine {
    fn name(&self) -> &str {
        "remote-whisper"
    }

    async fn transcribe(
        &self,
        samples: &[f32],
        sample_rate: u32,
        language_hint: Option<&str>,
    ) -> Result<EngineOutput> {
        let wav = Self::encode_wav(samples, sample_rate)?;
        let duration = samples.len() as f32 / sample_rate as f32;

        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");

        if let Some(hint) = language_hint.filter(|h| *h != language::AUTO) {
            form = form.text("language", hint.to_string());
        }

        let url = format!("{}/audio/transcriptions", self.base_url);
        let mut request = self.client.post(&url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach transcription endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("transcription endpoint returned {}: {}", status, body);
        }

        let parsed: VerboseResponse = response
            .json()
            .await
            .context("Failed to parse transcription response")?;

        // Some servers only fill `text`; treat it as a single segment then.
        let segments: Vec<TranscriptSegment> = if parsed.segments.is_empty() {
            if parsed.text.trim().is_empty() {
                Vec::new()
            } else {
                vec![TranscriptSegment {
                    text: parsed.text.clone(),
                    avg_logprob: 0.0,
                }]
            }
        } else {
            parsed
                .segments
                .into_iter()
                .map(|s| TranscriptSegment {
                    text: s.text,
                    avg_logprob: s.avg_logprob.unwrap_or(0.0),
                })
                .collect()
        };

        // The endpoint reports a language name ("english"); fold it back to
        // a code, passing codes through untouched.
        let language = match parsed.language.as_deref() {
            Some(l) => match language::code_for_engine_name(l) {
                Some(code) => code.to_string(),
                None if language::is_supported(l) => l.to_string(),
                None => language::DEFAULT_LANGUAGE.to_string(),
            },
            None => language::DEFAULT_LANGUAGE.to_string(),
        };

        debug!(
            segments = segments.len(),
            language = %language,
            "transcription response received"
        );

        Ok(EngineOutput {
            segments,
            language,
            language_probability: DEFAULT_LANGUAGE_PROBABILITY,
            duration: parsed.duration.unwrap_or(duration),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_encoding_produces_riff_header() {
        let samples = vec![0.0f32; 160];
        let wav = RemoteWhisperEngine::encode_wav(&samples, 16000).unwrap();
        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header + 2 bytes per sample
        assert_eq!(wav.len(), 44 + samples.len() * 2);
    }

    #[test]
    fn wav_encoding_clamps_out_of_range_samples() {
        let samples = vec![2.0f32, -2.0];
        let wav = RemoteWhisperEngine::encode_wav(&samples, 16000).unwrap();
        let first = i16::from_le_bytes([wav[44], wav[45]]);
        let second = i16::from_le_bytes([wav[46], wav[47]]);
        assert_eq!(first, 32767);
        assert_eq!(second, -32767);
    }
}
