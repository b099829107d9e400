//! Parsing of console input lines.

use thiserror::Error;

use crate::{domain::conversation::ConversationId, usecases::chat_session::ChatCommand};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Chat(ChatCommand),
    Connect,
    List,
    History,
    Status,
    Help,
    Quit,
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("unknown command `/{0}`; type /help")]
    UnknownCommand(String),
    #[error("usage: /{command} {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },
    #[error("`{0}` is not a conversation id")]
    InvalidConversationId(String),
    #[error("usage: /{command} on|off (got `{value}`)")]
    InvalidToggle { command: &'static str, value: String },
}

/// Plain text is a message for the active conversation; a leading `/`
/// starts a command and `//` escapes a literal slash.
pub fn parse(line: &str) -> Result<ConsoleInput, InputError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(ConsoleInput::Nothing);
    }

    let Some(command_line) = line.trim_start().strip_prefix('/') else {
        return Ok(ConsoleInput::Chat(ChatCommand::Send(line.to_owned())));
    };
    if command_line.starts_with('/') {
        return Ok(ConsoleInput::Chat(ChatCommand::Send(command_line.to_owned())));
    }

    let mut words = command_line.split_whitespace();
    let name = words.next().unwrap_or_default().to_ascii_lowercase();
    let argument = words.next();

    let input = match name.as_str() {
        "join" | "j" => {
            let raw = argument.ok_or(InputError::MissingArgument {
                command: "join",
                expected: "ID",
            })?;
            let id = raw
                .parse::<i64>()
                .ok()
                .and_then(|value| ConversationId::new(value).ok())
                .ok_or_else(|| InputError::InvalidConversationId(raw.to_owned()))?;
            ConsoleInput::Chat(ChatCommand::Join(id))
        }
        "leave" => ConsoleInput::Chat(ChatCommand::Leave),
        "read" => ConsoleInput::Chat(ChatCommand::MarkRead),
        "typing" => ConsoleInput::Chat(ChatCommand::Typing(toggle("typing", argument)?)),
        "online" => ConsoleInput::Chat(ChatCommand::Online(toggle("online", argument)?)),
        "connect" => ConsoleInput::Connect,
        "list" | "ls" => ConsoleInput::List,
        "history" | "h" => ConsoleInput::History,
        "status" => ConsoleInput::Status,
        "help" | "?" => ConsoleInput::Help,
        "quit" | "exit" | "q" => ConsoleInput::Quit,
        _ => return Err(InputError::UnknownCommand(name)),
    };

    Ok(input)
}

fn toggle(command: &'static str, argument: Option<&str>) -> Result<bool, InputError> {
    match argument.map(str::to_ascii_lowercase).as_deref() {
        Some("on" | "true" | "yes") => Ok(true),
        Some("off" | "false" | "no") => Ok(false),
        Some(other) => Err(InputError::InvalidToggle {
            command,
            value: other.to_owned(),
        }),
        None => Err(InputError::MissingArgument {
            command,
            expected: "on|off",
        }),
    }
}
