use super::*;
use crate::domain::MessageSource;
use serde_json::json;

#[test]
fn encodes_commands_with_action_tag() {
    let command = ClientCommand::GetAllMessages {
        limit: 1000,
        table_name: "MessagesLogs".into(),
    };
    let encoded: Value = serde_json::from_str(&command.encode().expect("encode")).expect("json");
    assert_eq!(
        encoded,
        json!({"action": "get_all_messages", "limit": 1000, "table_name": "MessagesLogs"})
    );

    let command = ClientCommand::SendPaymentLink {
        phone: ConversationKey::new("919876543210"),
        amount: 300_000,
        duration: "30".into(),
    };
    let encoded: Value = serde_json::from_str(&command.encode().expect("encode")).expect("json");
    assert_eq!(
        encoded,
        json!({
            "action": "send_payment_link",
            "phone": "919876543210",
            "amount": 300000,
            "duration": "30"
        })
    );
}

#[test]
fn selected_user_chat_uses_cursor_or_now() {
    let cursor = Timestamp::parse("2024-05-01T10:00:00Z");
    let with_cursor =
        ClientCommand::selected_user_chat(ConversationKey::new("913333333333"), Some(&cursor));
    let ClientCommand::GetSelectedUserChat { timestamp, .. } = with_cursor else {
        panic!("unexpected command");
    };
    assert_eq!(timestamp.as_str(), "2024-05-01T10:00:00Z");

    let latest = ClientCommand::selected_user_chat(ConversationKey::new("913333333333"), None);
    let ClientCommand::GetSelectedUserChat { timestamp, .. } = latest else {
        panic!("unexpected command");
    };
    assert!(timestamp.instant().is_some());
    assert!(timestamp.as_str().ends_with('Z'));
}

#[test]
fn decodes_chunked_history() {
    let frame = ServerFrame::decode(
        &json!({
            "action": "get_data_response",
            "chunk_index": 1,
            "total_chunks": 3,
            "data": [{
                "phone_number": "911111111111",
                "message": "hi",
                "timestamp": "2024-05-01T10:00:00Z",
                "source": "User"
            }]
        })
        .to_string(),
    )
    .expect("decode");

    let ServerFrame::History(chunk) = frame else {
        panic!("expected history frame");
    };
    assert_eq!(chunk.chunk_index, Some(1));
    assert_eq!(chunk.total_chunks, Some(3));
    assert!(!chunk.replaces_store());
    assert_eq!(chunk.data[0].source, MessageSource::User);
}

#[test]
fn trims_padded_action_and_treats_unchunked_history_as_replacement() {
    let frame = ServerFrame::decode(r#"{"action":"get_data_response    ","data":[]}"#)
        .expect("decode padded action");
    let ServerFrame::History(chunk) = frame else {
        panic!("expected history frame");
    };
    assert!(chunk.replaces_store());
}

#[test]
fn decodes_live_push_with_agent_source() {
    let frame = ServerFrame::decode(
        &json!({
            "type": "dynamodb_update",
            "action": "new_message",
            "data": {
                "phone_number": "912222222222",
                "message": "on it",
                "timestamp": "2024-05-01T10:00:00Z",
                "source": "Human_Intervention"
            }
        })
        .to_string(),
    )
    .expect("decode");
    let ServerFrame::NewMessage(message) = frame else {
        panic!("expected push");
    };
    assert_eq!(message.source, MessageSource::Agent);
    assert_eq!(message.conversation_key.as_str(), "912222222222");
}

#[test]
fn user_info_extracts_and_canonicalizes_phone() {
    let frame = ServerFrame::decode(
        &json!({
            "action": "user_info_response",
            "data": {
                "Name": "Asha",
                "Please enter your what's app number": 8340346515u64,
                "Age": 31,
                "Notes": null
            }
        })
        .to_string(),
    )
    .expect("decode");
    let ServerFrame::UserInfo(info) = frame else {
        panic!("expected user info");
    };
    assert_eq!(info.phone, Some(ConversationKey::new("918340346515")));
    assert_eq!(info.fields.get("Age").map(String::as_str), Some("31"));
    assert_eq!(info.fields.get("Name").map(String::as_str), Some("Asha"));
    assert!(!info.fields.contains_key("Notes"));
}

#[test]
fn chat_page_key_falls_back_to_first_message() {
    let frame = ServerFrame::decode(
        &json!({
            "action": "selected_user_chat_response",
            "data": [{
                "phone_number": "913333333333",
                "message": "old",
                "timestamp": "2024-05-01T09:00:00Z",
                "source": "AI"
            }]
        })
        .to_string(),
    )
    .expect("decode");
    let ServerFrame::ChatPage(page) = frame else {
        panic!("expected chat page");
    };
    assert_eq!(
        page.conversation_key(),
        Some(&ConversationKey::new("913333333333"))
    );
}

#[test]
fn rejects_malformed_frames() {
    assert!(matches!(
        ServerFrame::decode("not json"),
        Err(ProtocolError::InvalidJson(_))
    ));
    assert!(matches!(
        ServerFrame::decode("[1,2]"),
        Err(ProtocolError::NotAnObject)
    ));
    assert!(matches!(
        ServerFrame::decode(r#"{"success":true}"#),
        Err(ProtocolError::MissingAction)
    ));
    assert!(matches!(
        ServerFrame::decode(r#"{"action":"mystery"}"#),
        Err(ProtocolError::UnknownAction(action)) if action == "mystery"
    ));
    assert!(matches!(
        ServerFrame::decode(r#"{"type":"dynamodb_update","action":"deleted"}"#),
        Err(ProtocolError::UnknownPush { .. })
    ));

    let err = ServerFrame::decode(
        r#"{"action":"get_data_response","data":[{"phone_number":"1","message":"x","timestamp":"t","source":"Robot"}]}"#,
    )
    .expect_err("unknown source must fail the whole frame");
    assert_eq!(err.action(), Some("get_data_response"));
}
