// Wire formats of the room relay and the STT service

use loqa_rooms::nats::{room_subject, PresenceKind, PresenceMessage, TranscriptMessage};
use loqa_rooms::signaling::{IceCandidate, SessionDescription};
use loqa_rooms::speech::nats::to_speech_event;
use loqa_rooms::{ParticipantId, RoomId, RoomMessage, SpeechEvent};
use serde_json::{json, Value};

#[test]
fn test_offer_serialization() {
    let msg = RoomMessage::Offer {
        sender_id: None,
        target_id: Some(ParticipantId::new("client_b")),
        offer: SessionDescription::offer("v=0 o=- 1 2 IN IP4 0.0.0.0"),
    };

    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(
        value,
        json!({
            "type": "offer",
            "target_id": "client_b",
            "offer": {"type": "offer", "sdp": "v=0 o=- 1 2 IN IP4 0.0.0.0"}
        })
    );
}

#[test]
fn test_candidate_fields_are_camel_case() {
    let json = r#"{
        "type": "ice-candidate",
        "sender_id": "client_a",
        "target_id": "client_b",
        "candidate": {
            "candidate": "candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host",
            "sdpMid": "0",
            "sdpMLineIndex": 0
        }
    }"#;

    let msg: RoomMessage = serde_json::from_str(json).unwrap();
    match msg {
        RoomMessage::IceCandidate {
            sender_id,
            target_id,
            candidate,
        } => {
            assert_eq!(sender_id, Some(ParticipantId::new("client_a")));
            assert_eq!(target_id, Some(ParticipantId::new("client_b")));
            assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
            assert_eq!(candidate.sdp_m_line_index, Some(0));
            assert_eq!(candidate.username_fragment, None);
        }
        other => panic!("unexpected message: {:?}", other),
    }

    let value = serde_json::to_value(IceCandidate::new("candidate:2")).unwrap();
    assert_eq!(value, json!({"candidate": "candidate:2"}));
}

#[test]
fn test_room_clients_snapshot_with_recorder() {
    let json = r#"{
        "type": "room-clients",
        "clients": ["client_a", "client_b"],
        "recorder_id": "client_a"
    }"#;

    let msg: RoomMessage = serde_json::from_str(json).unwrap();
    assert_eq!(
        msg,
        RoomMessage::RoomClients {
            clients: vec![ParticipantId::new("client_a"), ParticipantId::new("client_b")],
            recorder_id: Some(ParticipantId::new("client_a")),
        }
    );
}

#[test]
fn test_presence_updates_tolerate_missing_member_list() {
    let msg: RoomMessage =
        serde_json::from_str(r#"{"type": "user-left", "client_id": "client_c"}"#).unwrap();
    assert_eq!(
        msg,
        RoomMessage::UserLeft {
            client_id: ParticipantId::new("client_c"),
            clients: vec![],
        }
    );
}

#[test]
fn test_recording_messages() {
    let state = RoomMessage::RecordingState {
        active: false,
        owner_id: Some(ParticipantId::new("client_a")),
        sender_id: None,
    };
    let value = serde_json::to_value(&state).unwrap();
    assert_eq!(value["type"], "recording-state");
    assert_eq!(value["active"], false);
    assert_eq!(value["owner_id"], "client_a");
    assert!(value.get("sender_id").is_none());

    let denied: RoomMessage =
        serde_json::from_str(r#"{"type": "recording-denied", "owner_id": "client_z"}"#).unwrap();
    assert_eq!(denied.kind(), "recording-denied");
}

#[test]
fn test_transcript_update_is_flat() {
    let json = r#"{
        "type": "transcript-update",
        "sender_id": "client_a",
        "committed": "good morning ",
        "interim": "every",
        "language": "en-US"
    }"#;

    let msg: RoomMessage = serde_json::from_str(json).unwrap();
    let round: Value = serde_json::to_value(&msg).unwrap();
    assert_eq!(round["committed"], "good morning ");
    assert_eq!(round["interim"], "every");
    assert_eq!(round["sender_id"], "client_a");
}

#[test]
fn test_unknown_message_type_is_rejected() {
    let result = serde_json::from_str::<RoomMessage>(r#"{"type": "screen-share"}"#);
    assert!(result.is_err());
}

#[test]
fn test_presence_message() {
    let msg = PresenceMessage {
        kind: PresenceKind::Join,
        room: RoomId::new("standup"),
        client_id: ParticipantId::new("client_a"),
    };

    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(
        value,
        json!({"type": "join", "room": "standup", "client_id": "client_a"})
    );
    assert_eq!(
        room_subject("rooms", &msg.room, "presence"),
        "rooms.standup.presence"
    );
}

#[test]
fn test_transcript_deserialization() {
    let json = r#"{
        "session_id": "standup",
        "text": "Hello world",
        "partial": false,
        "timestamp": "2025-10-27T14:30:05Z",
        "confidence": 0.95
    }"#;

    let msg: TranscriptMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg.session_id, "standup");
    assert_eq!(msg.confidence, Some(0.95));
    assert_eq!(
        to_speech_event(msg),
        SpeechEvent::Result {
            final_text: "Hello world".into(),
            interim: String::new(),
        }
    );
}

#[test]
fn test_transcript_partial_without_confidence() {
    let json = r#"{
        "session_id": "standup",
        "text": "This is a part",
        "partial": true,
        "timestamp": "2025-10-27T14:30:05Z"
    }"#;

    let msg: TranscriptMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg.confidence, None);
    assert_eq!(
        to_speech_event(msg),
        SpeechEvent::Result {
            final_text: String::new(),
            interim: "This is a part".into(),
        }
    );
}
