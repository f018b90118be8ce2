use super::*;
use serde_json::json;

// =============================================================================
// decode
// =============================================================================

#[test]
fn decode_countdown_with_progress_fields() {
    let text = r#"{"type":"countdown","data":{"value":3,"sessionId":"s-1","photoNumber":2,"totalPhotos":3}}"#;
    let event = decode(text).expect("decode").expect("known kind");
    assert_eq!(
        event,
        ServerEvent::Countdown(Countdown {
            value: Some(3),
            session_id: Some("s-1".to_owned()),
            photo_number: Some(2),
            total_photos: Some(3),
        })
    );
}

#[test]
fn decode_countdown_without_progress_fields() {
    let event = decode(r#"{"type":"countdown","data":{"value":1}}"#)
        .expect("decode")
        .expect("known kind");
    let ServerEvent::Countdown(countdown) = event else {
        panic!("expected countdown, got {event:?}");
    };
    assert_eq!(countdown.value, Some(1));
    assert!(countdown.photo_number.is_none());
    assert!(countdown.total_photos.is_none());
}

#[test]
fn decode_missing_data_uses_empty_payload() {
    let event = decode(r#"{"type":"capture_complete"}"#)
        .expect("decode")
        .expect("known kind");
    assert_eq!(event, ServerEvent::CaptureComplete(CaptureSummary::default()));
}

#[test]
fn decode_null_data_uses_empty_payload() {
    let event = decode(r#"{"type":"session_ended","data":null}"#)
        .expect("decode")
        .expect("known kind");
    assert_eq!(event, ServerEvent::SessionEnded(SessionEnded::default()));
}

#[test]
fn decode_photo_ready_reads_camel_case_urls() {
    let text = r#"{"type":"photo_ready","data":{"id":"p-1","sequence":4,"webUrl":"/w.jpg","thumbnailUrl":"/t.jpg"}}"#;
    let Some(ServerEvent::PhotoReady(photo)) = decode(text).expect("decode") else {
        panic!("expected photo_ready");
    };
    assert_eq!(photo.id.as_deref(), Some("p-1"));
    assert_eq!(photo.sequence, Some(4));
    assert_eq!(photo.web_url.as_deref(), Some("/w.jpg"));
    assert_eq!(photo.thumbnail_url.as_deref(), Some("/t.jpg"));
}

#[test]
fn decode_session_state_snapshot() {
    let text = json!({
        "type": "session_state",
        "data": {
            "sessionId": "s-1",
            "phoneId": "ab12cd34",
            "kioskConnected": true,
            "photos": [
                {"id": "p-1", "sequence": 1, "webUrl": "/1.jpg", "thumbnailUrl": "/1t.jpg"},
                {"id": "p-2", "sequence": 2, "webUrl": "/2.jpg", "thumbnailUrl": "/2t.jpg"}
            ]
        }
    })
    .to_string();
    let Some(ServerEvent::SessionState(snapshot)) = decode(&text).expect("decode") else {
        panic!("expected session_state");
    };
    assert_eq!(snapshot.photos.len(), 2);
    assert_eq!(snapshot.kiosk_connected, Some(true));
}

#[test]
fn decode_pong() {
    assert_eq!(decode(r#"{"type":"pong"}"#).expect("decode"), Some(ServerEvent::Pong));
}

#[test]
fn decode_unknown_kind_is_ignored() {
    assert_eq!(decode(r#"{"type":"ack","data":{"action":"x"}}"#).expect("decode"), None);
}

#[test]
fn decode_rejects_non_json() {
    let err = decode("not json").expect_err("should fail");
    assert!(matches!(err, CodecError::Envelope(_)));
}

#[test]
fn decode_rejects_missing_type() {
    let err = decode(r#"{"data":{}}"#).expect_err("should fail");
    assert!(matches!(err, CodecError::Envelope(_)));
}

#[test]
fn decode_rejects_mistyped_payload() {
    let err = decode(r#"{"type":"countdown","data":{"value":"three"}}"#).expect_err("should fail");
    match err {
        CodecError::Payload { kind, .. } => assert_eq!(kind, "countdown"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn decode_rejects_negative_countdown() {
    assert!(decode(r#"{"type":"countdown","data":{"value":-1}}"#).is_err());
}

// =============================================================================
// encode_event
// =============================================================================

#[test]
fn encode_event_emits_type_and_camel_case_data() {
    let event = ServerEvent::CaptureComplete(CaptureSummary {
        session_id: Some("s-1".to_owned()),
        photo_count: Some(3),
        strip_url: Some("/strip.jpg".to_owned()),
    });
    let value: Value = serde_json::from_str(&encode_event(&event)).expect("json");
    assert_eq!(value["type"], "capture_complete");
    assert_eq!(value["data"]["photoCount"], 3);
    assert_eq!(value["data"]["stripUrl"], "/strip.jpg");
}

#[test]
fn encode_event_pong_has_no_data() {
    let value: Value = serde_json::from_str(&encode_event(&ServerEvent::Pong)).expect("json");
    assert_eq!(value, json!({"type": "pong"}));
}

#[test]
fn encoded_event_decodes_to_same_event() {
    let event = ServerEvent::PhoneDisconnected(PhonePresence {
        session_id: Some("s-1".to_owned()),
        phone_id: Some("ph-1".to_owned()),
    });
    assert_eq!(decode(&encode_event(&event)).expect("decode"), Some(event));
}

// =============================================================================
// ClientMessage
// =============================================================================

#[test]
fn encode_unit_message_omits_data() {
    let value: Value = serde_json::from_str(&encode(&ClientMessage::Ping)).expect("json");
    assert_eq!(value, json!({"type": "ping"}));
}

#[test]
fn encode_join_session_uses_camel_case_field() {
    let message = ClientMessage::JoinSession { session_id: "s-9".to_owned() };
    let value: Value = serde_json::from_str(&encode(&message)).expect("json");
    assert_eq!(value, json!({"type": "join_session", "data": {"sessionId": "s-9"}}));
}

#[test]
fn encode_download_photo() {
    let message = ClientMessage::DownloadPhoto { photo_id: "p-2".to_owned() };
    let value: Value = serde_json::from_str(&encode(&message)).expect("json");
    assert_eq!(value["type"], "download_photo");
    assert_eq!(value["data"]["photoId"], "p-2");
}

#[test]
fn client_message_kind_matches_encoded_type() {
    let messages = [
        ClientMessage::NewSession,
        ClientMessage::StartCapture,
        ClientMessage::EndSession,
        ClientMessage::JoinSession { session_id: "s".to_owned() },
        ClientMessage::DownloadPhoto { photo_id: "p".to_owned() },
        ClientMessage::Ping,
    ];
    for message in messages {
        let envelope: Envelope = serde_json::from_str(&encode(&message)).expect("envelope");
        assert_eq!(envelope.kind, message.kind());
    }
}

// =============================================================================
// Failure
// =============================================================================

#[test]
fn failure_reason_prefers_error_then_message() {
    let failure = Failure {
        error: Some("camera busy".to_owned()),
        message: Some("other".to_owned()),
        ..Failure::default()
    };
    assert_eq!(failure.reason(), Some("camera busy"));

    let failure = Failure { message: Some("other".to_owned()), ..Failure::default() };
    assert_eq!(failure.reason(), Some("other"));
}

#[test]
fn failure_reason_ignores_blank_text() {
    let failure = Failure { error: Some("  ".to_owned()), ..Failure::default() };
    assert_eq!(failure.reason(), None);
}

// =============================================================================
// CloseReason
// =============================================================================

#[test]
fn close_reason_terminal_codes() {
    assert!(CloseReason::from_code(Some(1000)).is_terminal());
    assert!(CloseReason::from_code(Some(4001)).is_terminal());
    assert!(CloseReason::from_code(Some(4004)).is_terminal());
}

#[test]
fn close_reason_retryable_codes() {
    assert!(!CloseReason::from_code(None).is_terminal());
    assert!(!CloseReason::from_code(Some(1006)).is_terminal());
    assert!(!CloseReason::from_code(Some(1001)).is_terminal());
    assert!(!CloseReason::from_code(Some(1011)).is_terminal());
    assert!(!CloseReason::from_code(Some(4000)).is_terminal());
}

#[test]
fn close_reason_missing_frame_is_abnormal() {
    assert_eq!(CloseReason::from_code(None), CloseReason::Abnormal);
    assert_eq!(CloseReason::Abnormal.code(), 1006);
}

#[test]
fn close_reason_code_round_trips() {
    for code in [1000, 1001, 1006, 4001, 4004, 4999] {
        assert_eq!(CloseReason::from_code(Some(code)).code(), code);
    }
}
