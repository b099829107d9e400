use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conversation::ConversationId;

/// Marketplace role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Buyer,
    Producer,
    Admin,
    #[default]
    #[serde(other)]
    Unknown,
}

impl SenderRole {
    pub fn display_label(self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Producer => "producer",
            Self::Admin => "admin",
            Self::Unknown => "user",
        }
    }
}

/// A chat message pushed by the backend (`new_message`).
///
/// Immutable once created, apart from the read flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(rename = "inquiry_id")]
    pub conversation_id: ConversationId,
    pub sender_id: i64,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub sender_username: String,
    #[serde(rename = "sender_type", default)]
    pub sender_role: SenderRole,
    #[serde(rename = "message")]
    pub text: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub buyer_name: String,
    #[serde(default)]
    pub producer_name: String,
}

impl Message {
    /// Creation time in UTC.
    ///
    /// The backend sends naive ISO-8601 UTC timestamps; offset-qualified
    /// values are accepted too.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&self.created_at) {
            return Some(parsed.with_timezone(&Utc));
        }

        NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn display_sender(&self) -> &str {
        if !self.sender_name.trim().is_empty() {
            &self.sender_name
        } else if !self.sender_username.is_empty() {
            &self.sender_username
        } else {
            "Unknown"
        }
    }

    pub fn mark_read(&mut self) {
        self.is_read = true;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    const FLASK_PAYLOAD: &str = r#"{
        "id": 501,
        "inquiry_id": 42,
        "sender_id": 7,
        "sender_name": "Chinedu Eze",
        "sender_username": "chinedu",
        "sender_type": "producer",
        "message": "We can ship by Friday.",
        "is_read": false,
        "created_at": "2026-02-14T09:30:12.345678",
        "product_name": "Sesame Seeds",
        "buyer_name": "Lena Hoffmann",
        "producer_name": "Chinedu Eze"
    }"#;

    #[test]
    fn parses_backend_message_payload() {
        let message: Message = serde_json::from_str(FLASK_PAYLOAD).expect("must parse");

        assert_eq!(message.id, 501);
        assert_eq!(message.conversation_id.get(), 42);
        assert_eq!(message.sender_role, SenderRole::Producer);
        assert_eq!(message.text, "We can ship by Friday.");
        assert!(!message.is_read);
    }

    #[test]
    fn parses_naive_utc_timestamp() {
        let message: Message = serde_json::from_str(FLASK_PAYLOAD).expect("must parse");
        let created = message.created_at_utc().expect("timestamp must parse");

        assert_eq!(created.hour(), 9);
        assert_eq!(created.minute(), 30);
    }

    #[test]
    fn parses_offset_timestamp() {
        let mut message: Message = serde_json::from_str(FLASK_PAYLOAD).expect("must parse");
        message.created_at = "2026-02-14T10:30:00+01:00".to_owned();

        let created = message.created_at_utc().expect("timestamp must parse");
        assert_eq!(created.hour(), 9);
    }

    #[test]
    fn unknown_sender_type_maps_to_unknown_role() {
        let raw = FLASK_PAYLOAD.replace("\"producer\",", "\"moderator\",");
        let message: Message = serde_json::from_str(&raw).expect("must parse");

        assert_eq!(message.sender_role, SenderRole::Unknown);
    }

    #[test]
    fn display_sender_falls_back_to_username() {
        let mut message: Message = serde_json::from_str(FLASK_PAYLOAD).expect("must parse");
        message.sender_name = "  ".to_owned();

        assert_eq!(message.display_sender(), "chinedu");
    }

    #[test]
    fn read_flag_only_moves_forward() {
        let mut message: Message = serde_json::from_str(FLASK_PAYLOAD).expect("must parse");
        message.mark_read();
        message.mark_read();

        assert!(message.is_read);
    }
}
