//! Realtime layer: the messaging client, its wire codec and transports.

pub mod client;
pub mod listeners;
pub mod protocol;
#[cfg(test)]
pub mod testing;
pub mod transport;
pub mod websocket;

/// Returns the realtime module name for smoke checks.
pub fn module_name() -> &'static str {
    "realtime"
}
