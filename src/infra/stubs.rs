use crate::infra::{contracts::CredentialProvider, credentials::Credential, error::AppError};

/// Process-local credential store; nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    value: Option<Credential>,
}

impl MemoryCredentialStore {
    pub fn with(credential: Credential) -> Self {
        Self {
            value: Some(credential),
        }
    }
}

impl CredentialProvider for MemoryCredentialStore {
    fn credential(&self) -> Result<Option<Credential>, AppError> {
        Ok(self.value.clone())
    }

    fn set_credential(&mut self, credential: &Credential) -> Result<(), AppError> {
        self.value = Some(credential.clone());
        Ok(())
    }

    fn clear_credential(&mut self) -> Result<bool, AppError> {
        Ok(self.value.take().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips_and_clears() {
        let mut store = MemoryCredentialStore::default();
        let credential = Credential::new("tok-123").expect("non-empty");

        store.set_credential(&credential).expect("set");
        assert_eq!(store.credential().expect("get"), Some(credential));
        assert!(store.clear_credential().expect("clear"));
        assert_eq!(store.credential().expect("get"), None);
    }
}
