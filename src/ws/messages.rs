use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::session::{ServerStatsSnapshot, SessionCountersSnapshot};

/// Everything a client may send us, dispatched on the JSON `type` tag.
///
/// A closed enum with a single unknown arm: unrecognized types get the
/// generic error reply, they never close the connection.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Connect {
        user_id: Option<String>,
        display_name: Option<String>,
        display_language: Option<String>,
        native_language: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    AudioData {
        /// Base64-encoded PCM16 payload.
        audio_data: String,
        speaker_id: Option<String>,
        speaker_name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    LanguageUpdate {
        display_language: Option<String>,
        native_language: Option<String>,
    },
    Ping,
    GetStats,
    #[serde(other)]
    Unknown,
}

/// One processed utterance, broadcast to every connected participant.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionResult {
    pub speaker_id: String,
    pub speaker_name: String,
    pub original_text: String,
    pub original_language: String,
    pub original_language_confidence: f32,
    pub translated_text: String,
    pub target_language: String,
    pub transcription_confidence: f32,
    pub translation_confidence: f32,
    pub is_final: bool,
    /// Unix timestamp, seconds.
    pub timestamp: f64,
    /// Duration of the underlying audio batch, seconds.
    pub audio_duration: f32,
    /// Wall-clock processing latency for the batch, seconds.
    pub processing_time: f64,
    pub is_voice: bool,
    pub audio_quality: f32,
}

/// Registration acknowledgement payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub model: String,
    pub supported_languages: Vec<String>,
    pub features: Vec<String>,
}

/// Aggregate + per-session counters returned for `get_stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    #[serde(flatten)]
    pub server: ServerStatsSnapshot,
    pub client_stats: SessionCountersSnapshot,
    /// Unix millis of the requesting session's last inbound activity.
    pub last_activity_ms: u64,
    /// Successful translations per provider name.
    pub translation_providers: std::collections::HashMap<String, u64>,
}

/// Everything the server sends, tagged the same way as [`ClientMessage`].
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    ConnectionEstablished {
        user_id: String,
        server_info: ServerInfo,
    },
    TranscriptionResult {
        data: TranscriptionResult,
    },
    #[serde(rename_all = "camelCase")]
    LanguageUpdated {
        display_language: String,
        native_language: String,
    },
    Pong {
        timestamp: f64,
    },
    StatsResponse {
        data: StatsReport,
    },
    ServerStatsBroadcast {
        data: ServerStatsSnapshot,
    },
    Error {
        message: String,
        timestamp: f64,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            timestamp: now_secs(),
        }
    }

    pub fn pong() -> Self {
        Self::Pong {
            timestamp: now_secs(),
        }
    }

    /// Serializes to the wire text. Serialization of these types cannot
    /// fail; an empty string would only appear if it somehow did.
    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Current wall clock as fractional Unix seconds.
pub fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
