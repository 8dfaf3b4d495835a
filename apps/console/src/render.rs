use client_core::{Conversation, Notification, Severity};
use shared::domain::{Message, MessageSource, Profile, Timestamp};

const PREVIEW_CHARS: usize = 48;

pub fn notification_line(notification: &Notification) -> String {
    let tag = match notification.severity {
        Severity::Success => "ok",
        Severity::Info => "info",
        Severity::Warning => "warn",
        Severity::Error => "error",
    };
    format!("[{tag}] {}", notification.message)
}

pub fn conversation_line(conversation: &Conversation, name: Option<&str>) -> String {
    format!(
        "{:<16} {:<20} {} {}",
        conversation.key.display_label(),
        name.unwrap_or("-"),
        short_time(&conversation.last_message.timestamp),
        preview(&conversation.last_message.text),
    )
}

pub fn message_line(message: &Message) -> String {
    let who = match message.source {
        MessageSource::Ai => "AI",
        MessageSource::Agent => "Agent",
        MessageSource::User => "Customer",
    };
    format!(
        "  {} {who:>8}: {}",
        short_time(&message.timestamp),
        message.text
    )
}

/// One feed entry: who the message belongs to, then the message itself.
pub fn feed_line(message: &Message) -> String {
    format!(
        "{:<16}{}",
        message.conversation_key.display_label(),
        message_line(message)
    )
}

pub fn profile_lines(profile: &Profile) -> Vec<String> {
    profile
        .fields
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(name, value)| format!("  {name}: {value}"))
        .collect()
}

/// `01 May 10:05` when the timestamp parses, the raw string otherwise.
fn short_time(timestamp: &Timestamp) -> String {
    match timestamp.instant() {
        Some(instant) => instant.format("%d %b %H:%M").to_string(),
        None => timestamp.as_str().to_string(),
    }
}

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= PREVIEW_CHARS && line.len() == text.len() {
        return line.to_string();
    }
    let cut: String = line.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::ConversationKey;

    #[test]
    fn message_line_shows_time_and_speaker() {
        let message = Message::new(
            "918340346515",
            "Where is my order?",
            "2024-05-01T10:05:00Z",
            MessageSource::User,
        );
        assert_eq!(
            message_line(&message),
            "  01 May 10:05 Customer: Where is my order?"
        );
    }

    #[test]
    fn conversation_line_truncates_long_previews() {
        let last = Message::new(
            "918340346515",
            "x".repeat(80),
            "not a time",
            MessageSource::Ai,
        );
        let conversation = Conversation {
            key: ConversationKey::new("918340346515"),
            messages: vec![last.clone()],
            last_message: last,
            unread_count: 0,
        };
        let line = conversation_line(&conversation, Some("Asha"));
        assert!(line.starts_with("+91 83403 46515"));
        assert!(line.contains("Asha"));
        assert!(line.contains("not a time"));
        assert!(line.ends_with(&format!("{}...", "x".repeat(PREVIEW_CHARS))));
    }

    #[test]
    fn feed_line_leads_with_the_conversation() {
        let message = Message::new(
            "918340346515",
            "refund?",
            "2024-05-01T10:05:00Z",
            MessageSource::User,
        );
        assert_eq!(
            feed_line(&message),
            "+91 83403 46515   01 May 10:05 Customer: refund?"
        );
    }

    #[test]
    fn notification_line_tags_severity() {
        assert_eq!(
            notification_line(&Notification::error("Not connected to server")),
            "[error] Not connected to server"
        );
    }
}
