use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use base64::Engine as _;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::language;
use crate::session::{AudioChunk, ClientProfile, ServerStats, Session, SessionRegistry};
use crate::translate::TranslationRouter;
use crate::ws::messages::{ClientMessage, ServerInfo, ServerMessage, StatsReport};

/// Depth of the per-connection outbound channel. Bounded so one stalled
/// socket backs pressure up to [`Session::try_deliver`] instead of growing
/// without limit.
const OUTBOUND_BUFFER: usize = 64;

/// Shared state handed to every connection handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub stats: Arc<ServerStats>,
    pub translator: Arc<TranslationRouter>,
    /// Engine name advertised in the registration acknowledgement.
    pub model: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /ws
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Owns one WebSocket for its whole life: pumps serialized replies out of
/// the session's channel, dispatches inbound frames, and removes the
/// session from the registry when either direction closes.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    let pump = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut session: Option<Arc<Session>> = None;

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                handle_client_message(&text, &state, &tx, &mut session).await;
            }
            // Raw binary frames are accepted as PCM audio from registered
            // clients, skipping the base64 detour.
            Ok(Message::Binary(payload)) => match &session {
                Some(session) => {
                    session
                        .push_audio(AudioChunk::new(payload, &session.id, &session.display_name))
                        .await;
                }
                None => {
                    send(&tx, &ServerMessage::error("Client not registered"));
                }
            },
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {} // ping/pong handled by axum
        }
    }

    if let Some(session) = session {
        state.registry.cleanup(&session.id).await;
        info!(session = %session.id, "client disconnected");
    }
    pump.abort();
}

/// Dispatches one inbound text frame. `session` is the connection's
/// registration state; `Connect` fills it, everything else requires it.
pub async fn handle_client_message(
    text: &str,
    state: &AppState,
    tx: &mpsc::Sender<String>,
    session: &mut Option<Arc<Session>>,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            debug!("unparseable client frame: {}", e);
            send(tx, &ServerMessage::error("Invalid JSON format"));
            return;
        }
    };

    match message {
        ClientMessage::Connect {
            user_id,
            display_name,
            display_language,
            native_language,
        } => {
            // A repeat connect would strand the existing registry entry
            // against the capacity limit; the connection keeps its session.
            if let Some(existing) = session {
                warn!(session = %existing.id, "duplicate connect on registered connection");
                send(tx, &ServerMessage::error("Already registered"));
                return;
            }
            let profile = ClientProfile {
                user_id,
                display_name,
                display_language,
                native_language,
            };
            match state.registry.register(profile, tx.clone()).await {
                Ok(registered) => {
                    send(
                        tx,
                        &ServerMessage::ConnectionEstablished {
                            user_id: registered.id.clone(),
                            server_info: server_info(state),
                        },
                    );
                    *session = Some(registered);
                }
                Err(e) => {
                    warn!("registration rejected: {}", e);
                    send(tx, &ServerMessage::error(e.to_string()));
                }
            }
        }
        ClientMessage::AudioData {
            audio_data,
            speaker_id,
            speaker_name,
        } => {
            let Some(session) = session else {
                send(tx, &ServerMessage::error("Client not registered"));
                return;
            };
            match base64::engine::general_purpose::STANDARD.decode(&audio_data) {
                Ok(payload) => {
                    let speaker_id = speaker_id.as_deref().unwrap_or(&session.id);
                    let speaker_name = speaker_name.as_deref().unwrap_or(&session.display_name);
                    session
                        .push_audio(AudioChunk::new(payload, speaker_id, speaker_name))
                        .await;
                }
                Err(e) => {
                    warn!(session = %session.id, "invalid base64 audio payload: {}", e);
                    send(tx, &ServerMessage::error("Invalid audio payload"));
                }
            }
        }
        ClientMessage::LanguageUpdate {
            display_language,
            native_language,
        } => {
            let Some(session) = session else {
                send(tx, &ServerMessage::error("Client not registered"));
                return;
            };
            let (target, native) = session
                .set_languages(display_language.as_deref(), native_language.as_deref())
                .await;
            info!(session = %session.id, target = %target, native = %native, "languages updated");
            send(
                tx,
                &ServerMessage::LanguageUpdated {
                    display_language: target,
                    native_language: native,
                },
            );
        }
        ClientMessage::Ping => {
            if let Some(session) = session {
                session.touch();
            }
            send(tx, &ServerMessage::pong());
        }
        ClientMessage::GetStats => {
            let Some(session) = session else {
                send(tx, &ServerMessage::error("Client not registered"));
                return;
            };
            let report = StatsReport {
                server: state.stats.snapshot(state.registry.active_count()),
                client_stats: session.counters.snapshot(),
                last_activity_ms: session.last_activity_ms(),
                translation_providers: state.translator.success_counts().await,
            };
            send(tx, &ServerMessage::StatsResponse { data: report });
        }
        ClientMessage::Unknown => {
            send(tx, &ServerMessage::error("Unknown message type"));
        }
    }
}

fn server_info(state: &AppState) -> ServerInfo {
    ServerInfo {
        model: state.model.clone(),
        supported_languages: language::SUPPORTED_LANGUAGES
            .iter()
            .map(|s| s.to_string())
            .collect(),
        features: vec![
            "real_time_transcription".to_string(),
            "auto_translation".to_string(),
            "voice_activity_detection".to_string(),
        ],
    }
}

/// Replies go through the same bounded channel the broadcaster uses. A
/// full or closed channel here just drops the reply; the connection-level
/// cleanup handles the closed case.
fn send(tx: &mpsc::Sender<String>, message: &ServerMessage) {
    let _ = tx.try_send(message.to_wire());
}
