//! Domain layer: marketplace messaging entities and inbox rules.

pub mod connection_state;
pub mod conversation;
pub mod events;
pub mod inbox;
pub mod message;
pub mod presence;

/// Returns the domain module name for smoke checks.
pub fn module_name() -> &'static str {
    "domain"
}
