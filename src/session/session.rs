use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::warn;

use crate::language;

/// One queued piece of speaker audio. Immutable after creation; ownership
/// moves from the connection handler into the session queue and from there
/// into the scheduler.
#[derive(Debug)]
pub struct AudioChunk {
    /// Raw little-endian PCM16 bytes.
    pub payload: Vec<u8>,
    /// Who was speaking (may differ from the session owner for relayed audio).
    pub speaker_id: String,
    pub speaker_name: String,
    /// When the chunk entered the queue.
    pub enqueued_at: Instant,
}

impl AudioChunk {
    pub fn new(payload: Vec<u8>, speaker_id: &str, speaker_name: &str) -> Self {
        Self {
            payload,
            speaker_id: speaker_id.to_string(),
            speaker_name: speaker_name.to_string(),
            enqueued_at: Instant::now(),
        }
    }
}

/// Per-session processing counters.
#[derive(Debug, Default)]
pub struct SessionCounters {
    pub chunks_received: AtomicU64,
    pub transcriptions_sent: AtomicU64,
    pub translations_sent: AtomicU64,
    pub errors: AtomicU64,
}

/// Serializable snapshot of [`SessionCounters`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionCountersSnapshot {
    pub chunks_received: u64,
    pub transcriptions_sent: u64,
    pub translations_sent: u64,
    pub errors: u64,
}

impl SessionCounters {
    pub fn snapshot(&self) -> SessionCountersSnapshot {
        SessionCountersSnapshot {
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            transcriptions_sent: self.transcriptions_sent.load(Ordering::Relaxed),
            translations_sent: self.translations_sent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
struct LanguagePrefs {
    target: String,
    native: String,
}

/// Why a delivery attempt to a session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The connection side of the channel is gone; the session should be
    /// cleaned up.
    Closed,
    /// The outbound channel is full (slow consumer). Transient; the session
    /// stays active and this message is dropped.
    Lagged,
}

/// One connected participant: language preferences, a bounded audio queue,
/// counters, and the sender half of the connection's outbound channel.
///
/// Owned exclusively by the [`SessionRegistry`](super::SessionRegistry);
/// connection handlers and the scheduler only ever hold an `Arc`.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub display_name: String,
    languages: RwLock<LanguagePrefs>,
    /// Unix millis of the last inbound activity.
    last_activity_ms: AtomicU64,
    queue: Mutex<VecDeque<AudioChunk>>,
    queue_capacity: usize,
    active: AtomicBool,
    /// Set while the scheduler has a drained batch of ours in a worker.
    in_flight: AtomicBool,
    pub counters: SessionCounters,
    outbound: mpsc::Sender<String>,
}

impl Session {
    pub fn new(
        id: String,
        display_name: String,
        target_language: String,
        native_language: String,
        queue_capacity: usize,
        outbound: mpsc::Sender<String>,
    ) -> Self {
        let session = Self {
            id,
            display_name,
            languages: RwLock::new(LanguagePrefs {
                target: target_language,
                native: native_language,
            }),
            last_activity_ms: AtomicU64::new(0),
            queue: Mutex::new(VecDeque::with_capacity(queue_capacity)),
            queue_capacity,
            active: AtomicBool::new(true),
            in_flight: AtomicBool::new(false),
            counters: SessionCounters::default(),
            outbound,
        };
        session.touch();
        session
    }

    /// Enqueues an audio chunk, silently dropping it when the queue is at
    /// capacity. Audio never blocks the connection loop; under backlog we
    /// favor latency over completeness.
    pub async fn push_audio(&self, chunk: AudioChunk) {
        self.touch();
        self.counters.chunks_received.fetch_add(1, Ordering::Relaxed);

        let mut queue = self.queue.lock().await;
        if queue.len() >= self.queue_capacity {
            warn!(session = %self.id, "audio queue full, dropping chunk");
            return;
        }
        queue.push_back(chunk);
    }

    /// Removes and returns up to `max` chunks in enqueue order. Never waits:
    /// an empty queue yields an empty batch.
    pub async fn drain(&self, max: usize) -> Vec<AudioChunk> {
        let mut queue = self.queue.lock().await;
        let take = max.min(queue.len());
        queue.drain(..take).collect()
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn target_language(&self) -> String {
        self.languages.read().await.target.clone()
    }

    pub async fn native_language(&self) -> String {
        self.languages.read().await.native.clone()
    }

    /// Applies the subset of the requested changes whose codes are in the
    /// supported set; unsupported codes are ignored without error. Returns
    /// the resulting `(target, native)` pair.
    pub async fn set_languages(
        &self,
        target: Option<&str>,
        native: Option<&str>,
    ) -> (String, String) {
        let mut prefs = self.languages.write().await;
        if let Some(code) = target {
            if language::is_supported(code) {
                prefs.target = code.to_string();
            }
        }
        if let Some(code) = native {
            if language::is_supported(code) {
                prefs.native = code.to_string();
            }
        }
        (prefs.target.clone(), prefs.native.clone())
    }

    pub fn touch(&self) {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.last_activity_ms.store(now, Ordering::Relaxed);
    }

    pub fn last_activity_ms(&self) -> u64 {
        self.last_activity_ms.load(Ordering::Relaxed)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    /// Claims the session for batch processing. Returns `false` when a
    /// previous batch is still in a worker, in which case the caller must
    /// skip this session for the current pass.
    pub fn begin_processing(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_processing(&self) {
        self.in_flight.store(false, Ordering::Release);
    }

    /// Attempts to hand a serialized message to the connection task.
    pub fn try_deliver(&self, message: &str) -> Result<(), DeliveryError> {
        match self.outbound.try_send(message.to_string()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DeliveryError::Closed),
            Err(mpsc::error::TrySendError::Full(_)) => Err(DeliveryError::Lagged),
        }
    }
}
