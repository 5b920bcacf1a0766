// Wire-format tests for the client/server JSON protocol.

use babelcast::ws::messages::{ClientMessage, ServerMessage};

#[test]
fn test_connect_message_parses_camel_case_fields() {
    let json = r#"{
        "type": "connect",
        "userId": "u1",
        "displayName": "Alice",
        "displayLanguage": "vi",
        "nativeLanguage": "en"
    }"#;

    let msg: ClientMessage = serde_json::from_str(json).unwrap();
    match msg {
        ClientMessage::Connect {
            user_id,
            display_name,
            display_language,
            native_language,
        } => {
            assert_eq!(user_id.as_deref(), Some("u1"));
            assert_eq!(display_name.as_deref(), Some("Alice"));
            assert_eq!(display_language.as_deref(), Some("vi"));
            assert_eq!(native_language.as_deref(), Some("en"));
        }
        other => panic!("parsed as {:?}", other),
    }
}

#[test]
fn test_connect_fields_are_all_optional() {
    let msg: ClientMessage = serde_json::from_str(r#"{"type": "connect"}"#).unwrap();
    match msg {
        ClientMessage::Connect { user_id, .. } => assert!(user_id.is_none()),
        other => panic!("parsed as {:?}", other),
    }
}

#[test]
fn test_audio_data_message_parses() {
    let json = r#"{"type": "audio_data", "audioData": "AAAA", "speakerId": "s1"}"#;
    let msg: ClientMessage = serde_json::from_str(json).unwrap();
    match msg {
        ClientMessage::AudioData {
            audio_data,
            speaker_id,
            speaker_name,
        } => {
            assert_eq!(audio_data, "AAAA");
            assert_eq!(speaker_id.as_deref(), Some("s1"));
            assert!(speaker_name.is_none());
        }
        other => panic!("parsed as {:?}", other),
    }
}

#[test]
fn test_unknown_type_parses_to_unknown_not_error() {
    let msg: ClientMessage = serde_json::from_str(r#"{"type": "frobnicate"}"#).unwrap();
    assert!(matches!(msg, ClientMessage::Unknown));
}

#[test]
fn test_bare_type_tags_parse() {
    assert!(matches!(
        serde_json::from_str::<ClientMessage>(r#"{"type": "ping"}"#).unwrap(),
        ClientMessage::Ping
    ));
    assert!(matches!(
        serde_json::from_str::<ClientMessage>(r#"{"type": "get_stats"}"#).unwrap(),
        ClientMessage::GetStats
    ));
}

#[test]
fn test_error_reply_wire_shape() {
    let wire = ServerMessage::error("Client not registered").to_wire();
    let value: serde_json::Value = serde_json::from_str(&wire).unwrap();

    assert_eq!(value["type"], "error");
    assert_eq!(value["message"], "Client not registered");
    assert!(value["timestamp"].as_f64().unwrap() > 0.0);
}

#[test]
fn test_pong_carries_timestamp() {
    let wire = ServerMessage::pong().to_wire();
    let value: serde_json::Value = serde_json::from_str(&wire).unwrap();

    assert_eq!(value["type"], "pong");
    assert!(value["timestamp"].as_f64().is_some());
}

#[test]
fn test_language_updated_uses_camel_case() {
    let wire = ServerMessage::LanguageUpdated {
        display_language: "vi".to_string(),
        native_language: "auto".to_string(),
    }
    .to_wire();
    let value: serde_json::Value = serde_json::from_str(&wire).unwrap();

    assert_eq!(value["type"], "language_updated");
    assert_eq!(value["displayLanguage"], "vi");
    assert_eq!(value["nativeLanguage"], "auto");
}
