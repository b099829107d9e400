use anyhow::Result;

use crate::infra::{config::AppConfig, credentials::Credential, error::AppError};

pub trait ConfigAdapter {
    fn load(&self) -> Result<AppConfig>;
}

/// Where the bearer credential lives between sessions.
pub trait CredentialProvider {
    fn credential(&self) -> Result<Option<Credential>, AppError>;
    fn set_credential(&mut self, credential: &Credential) -> Result<(), AppError>;
    /// Returns whether a stored credential was removed.
    fn clear_credential(&mut self) -> Result<bool, AppError>;
}

impl<T: CredentialProvider + ?Sized> CredentialProvider for Box<T> {
    fn credential(&self) -> Result<Option<Credential>, AppError> {
        (**self).credential()
    }

    fn set_credential(&mut self, credential: &Credential) -> Result<(), AppError> {
        (**self).set_credential(credential)
    }

    fn clear_credential(&mut self) -> Result<bool, AppError> {
        (**self).clear_credential()
    }
}
