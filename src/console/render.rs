//! One-line text rendering of events and session state.

use std::fmt::Display;

use chrono::{Local, TimeZone};
use serde_json::Value;

use crate::domain::{
    connection_state::ConnectionState, conversation::ConversationId, events::ServerEvent,
    inbox::InboxState, message::Message,
};

pub const HELP_LINES: [&str; 12] = [
    "  <text>          send to the active conversation (//text for a leading slash)",
    "  /join ID        open conversation ID (leaves the current one)",
    "  /leave          leave the active conversation",
    "  /read           mark the active conversation as read",
    "  /typing on|off  tell the other side you are typing",
    "  /online on|off  change your presence",
    "  /list           conversations with unread counts",
    "  /history        messages received in the active conversation",
    "  /status         connection status",
    "  /connect        connect again after a failure",
    "  /help           this help",
    "  /quit           disconnect and exit",
];

/// Line for a delivered event, or `None` when the event is not worth a line
/// (own read receipts, typing in other conversations).
pub fn event_line(
    event: &ServerEvent,
    own_user_id: Option<i64>,
    active: Option<ConversationId>,
) -> Option<String> {
    let line = match event {
        ServerEvent::Connected { .. } => return None,
        ServerEvent::ConnectionConfirmed(_) => "* connected".to_owned(),
        ServerEvent::Disconnected { reason } => format!("* disconnected ({reason})"),
        ServerEvent::Error(error) => format!("! {}", error.message),
        ServerEvent::NewMessage(message) => message_line(message, own_user_id, active, &Local),
        ServerEvent::MessageSent(ack) => match ack.get("id").and_then(Value::as_i64) {
            Some(id) => format!("* message {id} delivered"),
            None => "* message delivered".to_owned(),
        },
        ServerEvent::MessagesRead(receipt) => {
            if Some(receipt.read_by) == own_user_id {
                return None;
            }
            let reader = receipt.read_by_name.as_deref().unwrap_or("the other side");
            format!("* #{} read by {reader}", receipt.conversation_id)
        }
        ServerEvent::UserTyping(indicator) => {
            if !indicator.is_typing || Some(indicator.conversation_id) != active {
                return None;
            }
            format!("* {} is typing...", display_name(&indicator.user_name, &indicator.username))
        }
        ServerEvent::UserStatusChange(status) => format!(
            "* {} is {}",
            display_name(&status.user_name, &status.username),
            if status.is_online { "online" } else { "offline" }
        ),
        ServerEvent::Notification(body) => format!("* notification: {}", summary(body)),
        ServerEvent::AdminNotification(body) => format!("* admin: {}", summary(body)),
        ServerEvent::ReconnectFailed => {
            "! could not reconnect; type /connect to try again".to_owned()
        }
    };

    Some(line)
}

pub fn message_line<Tz>(
    message: &Message,
    own_user_id: Option<i64>,
    active: Option<ConversationId>,
    zone: &Tz,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let time = message
        .created_at_utc()
        .map(|created| created.with_timezone(zone).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_owned());
    let sender = if Some(message.sender_id) == own_user_id {
        "you".to_owned()
    } else {
        format!(
            "{} ({})",
            message.display_sender(),
            message.sender_role.display_label()
        )
    };

    if Some(message.conversation_id) == active {
        format!("[{time}] {sender}: {}", message.text)
    } else {
        format!("[{time}] #{} {sender}: {}", message.conversation_id, message.text)
    }
}

pub fn conversation_lines(inbox: &InboxState) -> Vec<String> {
    if inbox.conversations().is_empty() {
        return vec!["  no conversations yet; /join ID to open one".to_owned()];
    }

    inbox
        .conversations()
        .iter()
        .map(|conversation| {
            let marker = if inbox.active() == Some(conversation.id) {
                '>'
            } else {
                ' '
            };
            let unread = match conversation.unread_count {
                0 => String::new(),
                count => format!(" [{count} unread]"),
            };
            let typing = if inbox.typing_in(conversation.id).is_empty() {
                ""
            } else {
                " (typing)"
            };
            let preview = conversation
                .last_message
                .as_deref()
                .map(|text| format!(": {}", truncate(text, 40)))
                .unwrap_or_default();
            format!(
                "{marker} #{} {}{unread}{typing}{preview}",
                conversation.id,
                conversation.title()
            )
        })
        .collect()
}

/// Lines for the active conversation's thread as received this session.
pub fn history_lines(inbox: &InboxState) -> Vec<String> {
    let Some(active) = inbox.active() else {
        return vec!["  no active conversation; /join ID to open one".to_owned()];
    };
    if inbox.messages().is_empty() {
        return vec![format!("  nothing received in #{active} yet")];
    }

    inbox
        .messages()
        .iter()
        .map(|message| {
            let read = if message.is_read { "" } else { " *" };
            format!(
                "{}{read}",
                message_line(message, inbox.own_user_id(), Some(active), &Local)
            )
        })
        .collect()
}

pub fn status_line(
    state: ConnectionState,
    session_id: Option<&str>,
    attempts: u32,
    inbox: &InboxState,
) -> String {
    let mut line = format!("* {}", state.as_label());
    if let ConnectionState::Reconnecting { .. } = state {
        line.push_str(&format!(" (attempt {attempts})"));
    }
    if let Some(session_id) = session_id {
        line.push_str(&format!(", session {session_id}"));
    }
    match inbox.active() {
        Some(active) => line.push_str(&format!(", in #{active}")),
        None => line.push_str(", no active conversation"),
    }
    line.push_str(&format!(", {} unread", inbox.total_unread()));
    match inbox.online_users().len() {
        0 => {}
        count => line.push_str(&format!(", {count} online")),
    }
    if let Some(error) = inbox.last_error() {
        line.push_str(&format!(", last error: {error}"));
    }
    line
}

fn display_name<'a>(name: &'a str, username: &'a str) -> &'a str {
    if !name.trim().is_empty() {
        name
    } else if !username.is_empty() {
        username
    } else {
        "someone"
    }
}

fn summary(body: &Value) -> String {
    match body {
        Value::String(text) => text.clone(),
        Value::Object(map) => match map.get("message").or_else(|| map.get("title")) {
            Some(Value::String(text)) => text.clone(),
            _ => body.to_string(),
        },
        other => other.to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::domain::{
        events::ChannelError,
        presence::{ReadReceipt, TypingIndicator, UserStatus},
    };

    fn id(raw: i64) -> ConversationId {
        ConversationId::new(raw).expect("positive id")
    }

    fn message(sender_id: i64, conversation: i64) -> Message {
        serde_json::from_value(json!({
            "id": 1,
            "inquiry_id": conversation,
            "sender_id": sender_id,
            "sender_name": "Kano Farms",
            "sender_type": "producer",
            "message": "Price is firm at $1,200/t",
            "created_at": "2026-02-14T09:30:00"
        }))
        .expect("message fixture")
    }

    #[test]
    fn message_in_active_conversation_omits_conversation_tag() {
        let line = message_line(&message(9, 42), Some(7), Some(id(42)), &Utc);

        assert_eq!(line, "[09:30] Kano Farms (producer): Price is firm at $1,200/t");
    }

    #[test]
    fn message_elsewhere_is_tagged_and_own_messages_say_you() {
        let line = message_line(&message(7, 5), Some(7), Some(id(42)), &Utc);

        assert_eq!(line, "[09:30] #5 you: Price is firm at $1,200/t");
    }

    #[test]
    fn unparseable_timestamp_renders_placeholder() {
        let mut broken = message(9, 42);
        broken.created_at = "yesterday".to_owned();

        assert!(message_line(&broken, None, None, &Utc).starts_with("[--:--]"));
    }

    #[test]
    fn typing_is_shown_only_for_active_conversation() {
        let typing = |conversation| {
            ServerEvent::UserTyping(TypingIndicator {
                conversation_id: id(conversation),
                user_id: 9,
                username: "kanofarms".to_owned(),
                user_name: String::new(),
                is_typing: true,
            })
        };

        assert_eq!(
            event_line(&typing(42), Some(7), Some(id(42))),
            Some("* kanofarms is typing...".to_owned())
        );
        assert_eq!(event_line(&typing(5), Some(7), Some(id(42))), None);
    }

    #[test]
    fn own_read_receipts_are_silent() {
        let receipt = |read_by| {
            ServerEvent::MessagesRead(ReadReceipt {
                conversation_id: id(42),
                read_by,
                read_by_name: Some("Lena".to_owned()),
            })
        };

        assert_eq!(event_line(&receipt(7), Some(7), None), None);
        assert_eq!(
            event_line(&receipt(9), Some(7), None),
            Some("* #42 read by Lena".to_owned())
        );
    }

    #[test]
    fn lifecycle_and_error_lines() {
        assert_eq!(
            event_line(
                &ServerEvent::Disconnected {
                    reason: "transport close".to_owned()
                },
                None,
                None
            ),
            Some("* disconnected (transport close)".to_owned())
        );
        assert_eq!(
            event_line(&ServerEvent::Error(ChannelError::new("Invalid token")), None, None),
            Some("! Invalid token".to_owned())
        );
        assert_eq!(
            event_line(&ServerEvent::MessageSent(json!({"id": 1})), None, None),
            Some("* message 1 delivered".to_owned())
        );
        assert_eq!(
            event_line(
                &ServerEvent::Connected { session_id: None },
                None,
                None
            ),
            None
        );
    }

    #[test]
    fn presence_and_notifications() {
        let status = ServerEvent::UserStatusChange(UserStatus {
            user_id: 3,
            username: "ada".to_owned(),
            user_name: "Ada Obi".to_owned(),
            is_online: false,
            last_seen: None,
        });

        assert_eq!(
            event_line(&status, None, None),
            Some("* Ada Obi is offline".to_owned())
        );
        assert_eq!(
            event_line(
                &ServerEvent::AdminNotification(json!({"title": "Maintenance at 22:00"})),
                None,
                None
            ),
            Some("* admin: Maintenance at 22:00".to_owned())
        );
    }

    #[test]
    fn conversation_list_shows_active_marker_unread_and_preview() {
        let mut inbox = InboxState::new(Some(7));
        inbox.apply(&ServerEvent::NewMessage(message(9, 5)));
        inbox.select(Some(id(42)));

        let lines = conversation_lines(&inbox);

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "  #5 Inquiry #5 [1 unread]: Price is firm at $1,200/t"
        );
        assert_eq!(lines[1], "> #42 Inquiry #42");
    }

    #[test]
    fn typing_marker_shows_in_conversation_list() {
        let mut inbox = InboxState::new(Some(7));
        inbox.apply(&ServerEvent::UserTyping(TypingIndicator {
            conversation_id: id(5),
            user_id: 9,
            username: "kanofarms".to_owned(),
            user_name: String::new(),
            is_typing: true,
        }));
        inbox.select(Some(id(5)));

        assert_eq!(conversation_lines(&inbox), vec!["> #5 Inquiry #5 (typing)"]);
    }

    #[test]
    fn history_requires_active_conversation() {
        let mut inbox = InboxState::new(Some(7));

        assert_eq!(
            history_lines(&inbox),
            vec!["  no active conversation; /join ID to open one"]
        );

        inbox.select(Some(id(42)));
        assert_eq!(history_lines(&inbox), vec!["  nothing received in #42 yet"]);

        inbox.apply(&ServerEvent::NewMessage(message(9, 42)));
        let lines = history_lines(&inbox);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("Kano Farms (producer): Price is firm at $1,200/t *"));
    }

    #[test]
    fn status_line_counts_online_users() {
        let mut inbox = InboxState::new(None);
        inbox.apply(&ServerEvent::UserStatusChange(UserStatus {
            user_id: 3,
            username: "ada".to_owned(),
            user_name: "Ada Obi".to_owned(),
            is_online: true,
            last_seen: None,
        }));

        assert_eq!(
            status_line(ConnectionState::Connected, Some("sid-1"), 0, &inbox),
            "* CONNECTED, session sid-1, no active conversation, 0 unread, 1 online"
        );
    }

    #[test]
    fn status_line_summarizes_session() {
        let inbox = InboxState::new(None);

        assert_eq!(
            status_line(
                ConnectionState::Reconnecting { attempt: 2 },
                None,
                2,
                &inbox
            ),
            "* RECONNECTING (attempt 2), no active conversation, 0 unread"
        );
    }

    #[test]
    fn long_previews_are_truncated() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }
}
