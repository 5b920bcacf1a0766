use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Smoothing factor for the processing-latency moving average.
const LATENCY_SMOOTHING: f64 = 0.9;

/// Process-wide aggregate counters.
///
/// Observational only: nothing on a correctness-critical path reads these.
pub struct ServerStats {
    started_at: DateTime<Utc>,
    total_sessions: AtomicU64,
    /// Total gated audio duration, in milliseconds.
    total_audio_ms: AtomicU64,
    total_transcriptions: AtomicU64,
    total_translations: AtomicU64,
    error_count: AtomicU64,
    /// Exponential moving average of batch processing time, seconds.
    avg_processing_secs: Mutex<f64>,
}

/// Serializable snapshot of [`ServerStats`].
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatsSnapshot {
    pub active_sessions: usize,
    pub total_sessions: u64,
    pub total_audio_processed_secs: f64,
    pub total_transcriptions: u64,
    pub total_translations: u64,
    pub error_count: u64,
    pub average_processing_secs: f64,
    pub uptime_secs: f64,
    pub started_at: DateTime<Utc>,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            total_sessions: AtomicU64::new(0),
            total_audio_ms: AtomicU64::new(0),
            total_transcriptions: AtomicU64::new(0),
            total_translations: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            avg_processing_secs: Mutex::new(0.0),
        }
    }

    pub fn session_registered(&self) {
        self.total_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_audio_secs(&self, secs: f64) {
        let ms = (secs * 1000.0).max(0.0) as u64;
        self.total_audio_ms.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn transcription_emitted(&self) {
        self.total_transcriptions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn translation_emitted(&self) {
        self.total_translations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn error_recorded(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Folds a batch latency sample into the moving average:
    /// `avg = avg * 0.9 + sample * 0.1`.
    pub fn record_latency(&self, secs: f64) {
        let mut avg = self
            .avg_processing_secs
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *avg = *avg * LATENCY_SMOOTHING + secs * (1.0 - LATENCY_SMOOTHING);
    }

    pub fn average_processing_secs(&self) -> f64 {
        *self
            .avg_processing_secs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self, active_sessions: usize) -> ServerStatsSnapshot {
        let uptime = Utc::now().signed_duration_since(self.started_at);
        ServerStatsSnapshot {
            active_sessions,
            total_sessions: self.total_sessions.load(Ordering::Relaxed),
            total_audio_processed_secs: self.total_audio_ms.load(Ordering::Relaxed) as f64
                / 1000.0,
            total_transcriptions: self.total_transcriptions.load(Ordering::Relaxed),
            total_translations: self.total_translations.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            average_processing_secs: self.average_processing_secs(),
            uptime_secs: uptime.num_milliseconds() as f64 / 1000.0,
            started_at: self.started_at,
        }
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}
