//! Speech-recognition engine boundary.
//!
//! The engine is a black box to the rest of the pipeline: a sample buffer
//! plus an optional language hint in, timestamped text segments and a
//! detected language out. The shipped backend talks to an
//! OpenAI-compatible transcription endpoint; tests plug in stubs.

mod remote;

pub use remote::RemoteWhisperEngine;

use anyhow::Result;
use async_trait::async_trait;

/// One piece of recognized text.
#[derive(Debug, Clone)]
pub struct TranscriptSegment {
    pub text: String,
    /// Average log-probability reported by the engine, used downstream as
    /// the transcription confidence.
    pub avg_logprob: f32,
}

/// Everything the engine returns for one buffer.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub segments: Vec<TranscriptSegment>,
    /// Detected language code (e.g. "en"), the engine's acoustic guess.
    pub language: String,
    pub language_probability: f32,
    /// Audio duration as seen by the engine, seconds.
    pub duration: f32,
}

/// The transcription capability consumed by the scheduler.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Transcribes a mono buffer of normalized f32 samples.
    ///
    /// `language_hint` is a supported code, or `None` to let the engine
    /// auto-detect. Failures are recoverable: the caller drops the batch,
    /// counts the error and moves on.
    async fn transcribe(
        &self,
        samples: &[f32],
        sample_rate: u32,
        language_hint: Option<&str>,
    ) -> Result<EngineOutput>;
}
