use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read config file at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config value `{field}`: {details}")]
    ConfigInvalid { field: &'static str, details: String },
    #[error("failed to initialize logging: {0}")]
    LoggingInit(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("failed to resolve storage path: {details}")]
    StoragePathResolution { details: String },
    #[error("failed to create storage directory {path}: {source}")]
    StorageDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read credential at {path}: {source}")]
    CredentialRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write credential at {path}: {source}")]
    CredentialWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read conversation list at {path}: {source}")]
    ConversationListRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse conversation list at {path}: {source}")]
    ConversationListParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to start async runtime: {0}")]
    RuntimeInit(#[source] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
