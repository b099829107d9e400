//! Infrastructure layer: adapters for config, credential storage, and logging.

pub mod config;
pub mod contracts;
pub mod conversation_list;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod secrets;
pub mod storage_layout;
pub mod stubs;

/// Returns the infra module name for smoke checks.
pub fn module_name() -> &'static str {
    "infra"
}
