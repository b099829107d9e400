use std::io;

use thiserror::Error;

use crate::infra::{contracts::CredentialProvider, credentials::Credential, error::AppError};

pub trait SecretPrompt {
    /// Returns `None` when input is closed.
    fn prompt_secret(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

pub struct StdTerminal;

impl SecretPrompt for StdTerminal {
    fn prompt_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match rpassword::prompt_password(prompt) {
            Ok(secret) => Ok(Some(secret)),
            Err(source) if source.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(source) => Err(source),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("no access token entered")]
    EmptyToken,
    #[error("failed to read access token: {0}")]
    Prompt(#[source] io::Error),
    #[error(transparent)]
    Store(#[from] AppError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// User id from the token's claims, when it is a readable JWT.
    pub user_id: Option<i64>,
    pub replaced_existing: bool,
}

/// Stores an access token issued by the marketplace backend, prompting for
/// it when none is given.
pub fn login(
    store: &mut dyn CredentialProvider,
    token: Option<String>,
    prompt: &mut dyn SecretPrompt,
) -> Result<LoginOutcome, LoginError> {
    let raw = match token {
        Some(token) => token,
        None => prompt
            .prompt_secret("Access token: ")
            .map_err(LoginError::Prompt)?
            .ok_or(LoginError::EmptyToken)?,
    };
    let credential = Credential::new(raw).ok_or(LoginError::EmptyToken)?;

    let replaced_existing = store.credential()?.is_some();
    store.set_credential(&credential)?;

    let user_id = credential.user_id();
    tracing::info!(user_id = ?user_id, replaced_existing, "access token stored");

    Ok(LoginOutcome {
        user_id,
        replaced_existing,
    })
}
