use crate::infra::{contracts::CredentialProvider, error::AppError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutOutcome {
    pub credential_removed: bool,
}

/// Forgets the stored credential. Idempotent.
pub fn logout(store: &mut dyn CredentialProvider) -> Result<LogoutOutcome, AppError> {
    let credential_removed = store.clear_credential()?;

    Ok(LogoutOutcome { credential_removed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{
        credentials::{Credential, FileCredentialStore},
        storage_layout::StorageLayout,
    };

    #[test]
    fn logout_removes_stored_credential() {
        let root = tempfile::tempdir().expect("tempdir");
        let layout = StorageLayout::under(root.path().join("tradelink"));
        let mut store = FileCredentialStore::new(&layout);
        store
            .set_credential(&Credential::new("tok-123").expect("non-empty"))
            .expect("credential should be written");

        let outcome = logout(&mut store).expect("logout should succeed");

        assert!(outcome.credential_removed);
        assert!(!layout.credential_file().exists());
        assert_eq!(store.credential().expect("read"), None);
    }

    #[test]
    fn logout_is_idempotent_when_nothing_is_stored() {
        let root = tempfile::tempdir().expect("tempdir");
        let layout = StorageLayout::under(root.path().join("tradelink"));
        let mut store = FileCredentialStore::new(&layout);

        let first = logout(&mut store).expect("logout should succeed");
        let second = logout(&mut store).expect("logout should succeed");

        assert!(!first.credential_removed);
        assert!(!second.credential_removed);
    }
}
