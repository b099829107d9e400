use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::conversation::ConversationId;

#[derive(Debug, Parser)]
#[command(
    name = "tradelink-rt",
    about = "Terminal client for TradeLink marketplace messaging"
)]
pub struct Cli {
    /// Path to config file (default: ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Open the chat shell (default)
    Chat(ChatArgs),
    /// Store an access token for later sessions
    Login {
        /// Token to store; prompted for when omitted
        #[arg(long)]
        token: Option<String>,
    },
    /// Forget the stored access token
    Logout,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ChatArgs {
    /// Conversation (inquiry) to open right away
    #[arg(long, value_parser = parse_conversation_id)]
    pub conversation: Option<ConversationId>,

    /// Access token to use instead of the stored one
    #[arg(long)]
    pub token: Option<String>,

    /// Keep --token in memory only
    #[arg(long, requires = "token")]
    pub no_save: bool,

    /// Conversation list saved from `GET /api/conversations` (JSON array)
    #[arg(long, value_name = "FILE")]
    pub conversations: Option<PathBuf>,
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Chat(ChatArgs::default()))
    }
}

fn parse_conversation_id(raw: &str) -> Result<ConversationId, String> {
    let value = raw
        .parse::<i64>()
        .map_err(|error| format!("`{raw}` is not a number: {error}"))?;
    ConversationId::new(value).map_err(|error| error.to_string())
}
