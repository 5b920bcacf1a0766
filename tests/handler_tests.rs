// Integration tests for the connection-level message dispatch.

use std::sync::Arc;

use babelcast::session::{RegistryLimits, ServerStats, Session, SessionRegistry};
use babelcast::translate::{RouterConfig, TranslationRouter};
use babelcast::ws::handler::{handle_client_message, AppState};
use serde_json::Value;
use tokio::sync::mpsc;

fn state() -> AppState {
    let stats = Arc::new(ServerStats::new());
    AppState {
        registry: Arc::new(SessionRegistry::new(
            RegistryLimits::default(),
            Arc::clone(&stats),
        )),
        stats,
        translator: Arc::new(TranslationRouter::new(Vec::new(), RouterConfig::default())),
        model: "test-model".to_string(),
    }
}

async fn reply(rx: &mut mpsc::Receiver<String>) -> Value {
    let wire = rx.try_recv().expect("a reply was sent");
    serde_json::from_str(&wire).expect("valid wire JSON")
}

#[tokio::test]
async fn test_connect_registers_and_acknowledges() {
    let state = state();
    let (tx, mut rx) = mpsc::channel(16);
    let mut session: Option<Arc<Session>> = None;

    handle_client_message(
        r#"{"type": "connect", "userId": "u1", "displayLanguage": "vi"}"#,
        &state,
        &tx,
        &mut session,
    )
    .await;

    let ack = reply(&mut rx).await;
    assert_eq!(ack["type"], "connection_established");
    assert_eq!(ack["userId"], "u1");
    assert_eq!(ack["serverInfo"]["model"], "test-model");
    assert!(session.is_some());
    assert_eq!(state.registry.len().await, 1);
}

#[tokio::test]
async fn test_duplicate_connect_is_rejected_and_keeps_the_session() {
    let state = state();
    let (tx, mut rx) = mpsc::channel(16);
    let mut session: Option<Arc<Session>> = None;

    handle_client_message(r#"{"type": "connect", "userId": "u1"}"#, &state, &tx, &mut session)
        .await;
    assert_eq!(reply(&mut rx).await["type"], "connection_established");

    // A second connect on the same connection must not replace the session
    // or leave an orphaned registry entry behind.
    handle_client_message(r#"{"type": "connect", "userId": "u2"}"#, &state, &tx, &mut session)
        .await;

    let err = reply(&mut rx).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["message"], "Already registered");

    assert_eq!(session.as_ref().unwrap().id, "u1");
    assert_eq!(state.registry.len().await, 1);
    assert!(state.registry.get("u1").await.is_some());
    assert!(state.registry.get("u2").await.is_none());
}

#[tokio::test]
async fn test_messages_before_registration_get_an_error() {
    let state = state();
    let (tx, mut rx) = mpsc::channel(16);
    let mut session: Option<Arc<Session>> = None;

    for frame in [
        r#"{"type": "audio_data", "audioData": "AAAA"}"#,
        r#"{"type": "language_update", "displayLanguage": "vi"}"#,
        r#"{"type": "get_stats"}"#,
    ] {
        handle_client_message(frame, &state, &tx, &mut session).await;
        let err = reply(&mut rx).await;
        assert_eq!(err["type"], "error");
        assert_eq!(err["message"], "Client not registered");
    }
    assert!(session.is_none());
}

#[tokio::test]
async fn test_malformed_json_and_unknown_types_are_tolerated() {
    let state = state();
    let (tx, mut rx) = mpsc::channel(16);
    let mut session: Option<Arc<Session>> = None;

    handle_client_message("{not json", &state, &tx, &mut session).await;
    assert_eq!(reply(&mut rx).await["message"], "Invalid JSON format");

    handle_client_message(r#"{"type": "frobnicate"}"#, &state, &tx, &mut session).await;
    assert_eq!(reply(&mut rx).await["message"], "Unknown message type");
}

#[tokio::test]
async fn test_audio_data_lands_in_the_session_queue() {
    let state = state();
    let (tx, mut rx) = mpsc::channel(16);
    let mut session: Option<Arc<Session>> = None;

    handle_client_message(r#"{"type": "connect", "userId": "u1"}"#, &state, &tx, &mut session)
        .await;
    reply(&mut rx).await;

    // 4 base64 chars decode to 3 bytes of PCM.
    handle_client_message(
        r#"{"type": "audio_data", "audioData": "AAAA"}"#,
        &state,
        &tx,
        &mut session,
    )
    .await;

    let registered = session.as_ref().unwrap();
    assert_eq!(registered.queue_len().await, 1);
    assert!(rx.try_recv().is_err(), "audio has no synchronous reply");
}
