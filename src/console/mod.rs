//! Line-oriented terminal front end for a chat session.

pub mod input;
pub mod render;
pub mod shell;

/// Returns the console module name for smoke checks.
pub fn module_name() -> &'static str {
    "console"
}
