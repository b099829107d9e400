use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Identifier of a buyer/producer conversation.
///
/// Shares its value with the REST "inquiry" resource the conversation is
/// anchored to. Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConversationId(i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("conversation id must be positive, got {0}")]
pub struct InvalidConversationId(pub i64);

impl ConversationId {
    pub fn new(raw: i64) -> Result<Self, InvalidConversationId> {
        if raw > 0 {
            Ok(Self(raw))
        } else {
            Err(InvalidConversationId(raw))
        }
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for ConversationId {
    type Error = InvalidConversationId;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The participant on the other side of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    /// Marketplace role: `buyer`, `producer` or `admin`.
    #[serde(rename = "type", default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "inquiry_id")]
    pub id: ConversationId,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub buyer_id: Option<i64>,
    #[serde(default)]
    pub producer_id: Option<i64>,
    /// Empty for inquiries whose product was removed.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub product_name: String,
    #[serde(default)]
    pub product_image: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub buyer_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub producer_name: String,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<String>,
    #[serde(default)]
    pub other_user: Option<Participant>,
}

impl Conversation {
    /// Minimal conversation record, used when the first sign of a
    /// conversation is a pushed message rather than a fetched list.
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            product_id: None,
            buyer_id: None,
            producer_id: None,
            product_name: String::new(),
            product_image: None,
            buyer_name: String::new(),
            producer_name: String::new(),
            unread_count: 0,
            last_message: None,
            last_message_time: None,
            other_user: None,
        }
    }

    pub fn title(&self) -> String {
        match (self.product_name.is_empty(), &self.other_user) {
            (false, Some(other)) => format!("{} with {}", self.product_name, other.name),
            (false, None) => self.product_name.clone(),
            (true, Some(other)) => other.name.clone(),
            (true, None) => format!("Inquiry #{}", self.id),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
