//! Bearer credential and its file-backed store.

use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use fs2::FileExt;
use serde_json::Value;

use crate::infra::{contracts::CredentialProvider, error::AppError, storage_layout::StorageLayout};

/// Opaque, non-empty bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        Some(Self(trimmed.to_owned()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Reads the `user_id` claim when the token is a JWT.
    ///
    /// The signature is not checked; the value only tells own messages apart
    /// from inbound ones.
    pub fn user_id(&self) -> Option<i64> {
        let payload = self.0.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claims: Value = serde_json::from_slice(&bytes).ok()?;

        match claims.get("user_id")? {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Stores the credential in the session directory, one token per file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(layout: &StorageLayout) -> Self {
        Self {
            path: layout.credential_file(),
            lock_path: layout.credential_lock_file(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_lock<T>(
        &self,
        action: impl FnOnce() -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent).map_err(|source| AppError::StorageDirCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|source| self.write_error(source))?;
        lock.lock_exclusive()
            .map_err(|source| self.write_error(source))?;

        let result = action();

        if let Err(error) = FileExt::unlock(&lock) {
            tracing::warn!(error = %error, "failed to release credential lock");
        }

        result
    }

    fn write_error(&self, source: std::io::Error) -> AppError {
        AppError::CredentialWrite {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialProvider for FileCredentialStore {
    fn credential(&self) -> Result<Option<Credential>, AppError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Credential::new(raw)),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(AppError::CredentialRead {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn set_credential(&mut self, credential: &Credential) -> Result<(), AppError> {
        self.with_lock(|| {
            let staging = self.path.with_extension("tmp");
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&staging)
                .map_err(|source| self.write_error(source))?;
            restrict_permissions(&file).map_err(|source| self.write_error(source))?;
            file.write_all(credential.expose().as_bytes())
                .and_then(|()| file.sync_all())
                .map_err(|source| self.write_error(source))?;
            fs::rename(&staging, &self.path).map_err(|source| self.write_error(source))
        })
    }

    fn clear_credential(&mut self) -> Result<bool, AppError> {
        self.with_lock(|| match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(self.write_error(source)),
        })
    }
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> std::io::Result<()> {
    Ok(())
}
