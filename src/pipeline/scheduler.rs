use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::audio;
use crate::engine::SpeechEngine;
use crate::language;
use crate::session::{AudioChunk, ServerStats, Session, SessionRegistry};
use crate::translate::{TranslationRouter, PASSTHROUGH_CONFIDENCE};
use crate::ws::dispatcher;
use crate::ws::messages::{now_secs, ServerMessage, TranscriptionResult};

/// Knobs for the drain/transcribe/translate loop.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Chunks drained per session per pass.
    pub batch_size: usize,
    /// Idle sleep between passes.
    pub pass_interval: Duration,
    /// Size of the offload worker pool; saturation queues batches.
    pub workers: usize,
    /// Batches scoring below this never reach the engine.
    pub min_quality: f32,
    /// Segments shorter than this many chars are discarded as noise.
    pub min_segment_chars: usize,
    /// Hard bound on one engine call.
    pub engine_timeout: Duration,
    /// Inbound PCM sample rate.
    pub sample_rate: u32,
    /// Language-heuristic confidence above which it overrides the engine's
    /// acoustic guess.
    pub heuristic_override_confidence: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            pass_interval: Duration::from_millis(100),
            workers: 4,
            min_quality: 0.2,
            min_segment_chars: 3,
            engine_timeout: Duration::from_secs(30),
            sample_rate: 16000,
            heuristic_override_confidence: 0.5,
        }
    }
}

/// Releases a session's in-flight claim when the worker finishes,
/// including on early return.
struct InFlightGuard(Arc<Session>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.end_processing();
    }
}

/// Drains session queues and drives batches through the quality gate, the
/// speech engine and the translation router, broadcasting each result.
///
/// Runs independently of connection I/O: engine and translation calls are
/// offloaded to a bounded worker pool so one slow session never delays the
/// next pass or any other session's drain.
pub struct Scheduler {
    registry: Arc<SessionRegistry>,
    engine: Arc<dyn SpeechEngine>,
    translator: Arc<TranslationRouter>,
    stats: Arc<ServerStats>,
    workers: Arc<Semaphore>,
    config: PipelineConfig,
}

impl Scheduler {
    pub fn new(
        registry: Arc<SessionRegistry>,
        engine: Arc<dyn SpeechEngine>,
        translator: Arc<TranslationRouter>,
        stats: Arc<ServerStats>,
        config: PipelineConfig,
    ) -> Self {
        let workers = Arc::new(Semaphore::new(config.workers.max(1)));
        Self {
            registry,
            engine,
            translator,
            stats,
            workers,
            config,
        }
    }

    /// Runs forever. Spawn this on its own task.
    pub async fn run(self: Arc<Self>) {
        loop {
            self.pass().await;
            tokio::time::sleep(self.config.pass_interval).await;
        }
    }

    /// One scheduler pass: drain every active session and offload the
    /// non-empty batches. Public so tests can drive passes deterministically.
    pub async fn pass(self: &Arc<Self>) {
        for session in self.registry.snapshot().await {
            if !session.is_active() {
                continue;
            }
            // Skip sessions whose previous batch is still in a worker; this
            // is what keeps per-session results in enqueue order.
            if !session.begin_processing() {
                continue;
            }
            let guard = InFlightGuard(Arc::clone(&session));

            let batch = session.drain(self.config.batch_size).await;
            if batch.is_empty() {
                drop(guard);
                continue;
            }

            let permit = match Arc::clone(&self.workers).acquire_owned().await {
                Ok(p) => p,
                Err(_) => return, // pool closed, shutting down
            };

            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                let _permit = permit;
                let _guard = guard;
                scheduler.process_batch(session, batch).await;
            });
        }
    }

    /// Gate, transcribe, translate and broadcast one drained batch.
    async fn process_batch(&self, session: Arc<Session>, batch: Vec<AudioChunk>) {
        let speaker_id = batch[0].speaker_id.clone();
        let speaker_name = batch[0].speaker_name.clone();

        let combined: Vec<u8> = batch.into_iter().flat_map(|c| c.payload).collect();
        let started = Instant::now();

        let (samples, metrics) = audio::process(&combined, self.config.sample_rate);
        if samples.is_empty() {
            return;
        }

        if !metrics.is_voice || metrics.quality < self.config.min_quality {
            debug!(
                session = %session.id,
                is_voice = metrics.is_voice,
                quality = metrics.quality,
                "batch dropped by quality gate"
            );
            return;
        }

        self.stats.add_audio_secs(metrics.duration_secs as f64);

        let hint = session.native_language().await;
        let hint = (hint != language::AUTO).then_some(hint);

        let output = match tokio::time::timeout(
            self.config.engine_timeout,
            self.engine
                .transcribe(&samples, self.config.sample_rate, hint.as_deref()),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!(session = %session.id, engine = %self.engine.name(), "transcription failed: {}", e);
                session.counters.errors.fetch_add(1, Ordering::Relaxed);
                self.stats.error_recorded();
                return;
            }
            Err(_) => {
                error!(
                    session = %session.id,
                    engine = %self.engine.name(),
                    timeout_secs = self.config.engine_timeout.as_secs(),
                    "transcription timed out, dropping batch"
                );
                session.counters.errors.fetch_add(1, Ordering::Relaxed);
                self.stats.error_recorded();
                return;
            }
        };

        let processing_time = started.elapsed().as_secs_f64();
        self.stats.record_latency(processing_time);

        for segment in output.segments {
            let original_text = segment.text.trim().to_string();
            if original_text.chars().count() < self.config.min_segment_chars {
                continue;
            }

            // The text heuristic outranks the engine's acoustic guess when
            // it is confident; code-switching defeats acoustic ID.
            let (heuristic_lang, heuristic_conf) = language::detect(&original_text);
            let detected_language = if heuristic_conf > self.config.heuristic_override_confidence
            {
                heuristic_lang.to_string()
            } else {
                output.language.clone()
            };

            // Every listener gets the segment in their own target language.
            // Sessions are grouped by target so each language is translated
            // once regardless of how many listeners want it.
            let listeners = self.registry.snapshot().await;
            let mut by_target: HashMap<String, Vec<Arc<Session>>> = HashMap::new();
            for listener in listeners {
                if !listener.is_active() {
                    continue;
                }
                let target = listener.target_language().await;
                by_target.entry(target).or_default().push(listener);
            }

            let mut any_translated = false;

            for (target_language, group) in by_target {
                let (translated_text, translation_confidence) =
                    if detected_language != target_language {
                        self.translator
                            .translate(&original_text, &target_language, &detected_language)
                            .await
                    } else {
                        (original_text.clone(), PASSTHROUGH_CONFIDENCE)
                    };

                let translated = translated_text != original_text;

                let result = TranscriptionResult {
                    speaker_id: speaker_id.clone(),
                    speaker_name: speaker_name.clone(),
                    original_text: original_text.clone(),
                    original_language: detected_language.clone(),
                    original_language_confidence: output.language_probability,
                    translated_text,
                    target_language,
                    transcription_confidence: segment.avg_logprob,
                    translation_confidence,
                    is_final: true,
                    timestamp: now_secs(),
                    audio_duration: metrics.duration_secs,
                    processing_time,
                    is_voice: metrics.is_voice,
                    audio_quality: metrics.quality,
                };

                dispatcher::deliver(
                    &self.registry,
                    &group,
                    &ServerMessage::TranscriptionResult { data: result },
                )
                .await;

                if translated {
                    any_translated = true;
                    self.stats.translation_emitted();
                }
            }

            session
                .counters
                .transcriptions_sent
                .fetch_add(1, Ordering::Relaxed);
            self.stats.transcription_emitted();
            if any_translated {
                session
                    .counters
                    .translations_sent
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

// A oneline sanity check lives here rather than tests/: the guard must
// release the claim even when the worker bails early.
#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn in_flight_guard_releases_on_drop() {
        let (tx, _rx) = mpsc::channel(1);
        let session = Arc::new(Session::new(
            "s1".into(),
            "Test".into(),
            "en".into(),
            "auto".into(),
            4,
            tx,
        ));

        assert!(session.begin_processing());
        assert!(!session.begin_processing());
        drop(InFlightGuard(Arc::clone(&session)));
        assert!(session.begin_processing());
    }
}
