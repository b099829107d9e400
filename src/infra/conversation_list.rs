//! Conversation lists in the shape the backend's `GET /api/conversations`
//! returns them.

use std::{fs, path::Path};

use crate::{domain::conversation::Conversation, infra::error::AppError};

pub fn load_conversations(path: &Path) -> Result<Vec<Conversation>, AppError> {
    let raw = fs::read_to_string(path).map_err(|source| AppError::ConversationListRead {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&raw).map_err(|source| AppError::ConversationListParse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_backend_conversation_list() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("conversations.json");
        fs::write(
            &path,
            r#"[
                {"inquiry_id": 12, "product_id": 3, "buyer_id": 5, "producer_id": 9,
                 "product_name": "Dried Hibiscus", "product_image": null,
                 "buyer_username": "ada", "producer_username": "kanofarms",
                 "inquiry_created_at": "Sat, 28 Feb 2026 08:00:00 GMT",
                 "unread_count": 2, "last_message": "Is 2 tonnes available?",
                 "last_message_time": "Sun, 01 Mar 2026 10:15:00 GMT",
                 "other_user": {"id": 9, "username": "kanofarms", "name": "Musa Bello",
                                "company": "Kano Farms Ltd", "type": "producer"}},
                {"inquiry_id": 14, "product_id": null, "buyer_id": 5, "producer_id": 11,
                 "product_name": null, "unread_count": 0, "last_message": null,
                 "last_message_time": null, "other_user": null}
            ]"#,
        )
        .expect("write fixture");

        let conversations = load_conversations(&path).expect("list must load");

        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0].title(), "Dried Hibiscus with Musa Bello");
        assert_eq!(conversations[0].unread_count, 2);
        assert_eq!(conversations[1].title(), "Inquiry #14");
    }

    #[test]
    fn missing_file_reports_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("absent.json");

        let error = load_conversations(&path).expect_err("missing file must fail");

        assert!(matches!(error, AppError::ConversationListRead { .. }));
        assert!(error.to_string().contains("absent.json"));
    }

    #[test]
    fn malformed_entry_is_a_parse_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("conversations.json");
        fs::write(&path, r#"[{"inquiry_id": 0}]"#).expect("write fixture");

        assert!(matches!(
            load_conversations(&path),
            Err(AppError::ConversationListParse { .. })
        ));
    }
}
