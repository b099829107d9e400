use std::io::{self, BufReader};

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;

use crate::{
    cli::{ChatArgs, Cli, Command},
    console::{
        self,
        shell::{self, ShellOptions},
    },
    domain,
    infra::{
        self,
        conversation_list::load_conversations,
        credentials::{Credential, FileCredentialStore},
        error::AppError,
        stubs::MemoryCredentialStore,
    },
    realtime::{
        self,
        client::{RealtimeClient, ReconnectPolicy},
        websocket::WsConnector,
    },
    usecases::{
        self, bootstrap,
        chat_session::ChatSession,
        context::AppContext,
        login::{login, StdTerminal},
        logout::logout,
    },
};

pub fn run(cli: Cli) -> Result<()> {
    let (context, _log_guard) = bootstrap::bootstrap(cli.config.as_deref())?;

    tracing::debug!(
        console = console::module_name(),
        domain = domain::module_name(),
        realtime = realtime::module_name(),
        usecases = usecases::module_name(),
        infra = infra::module_name(),
        "module boundaries loaded"
    );

    match cli.command_or_default() {
        Command::Chat(args) => run_chat(&context, args)?,
        Command::Login { token } => {
            let mut store = FileCredentialStore::new(&context.layout);
            let outcome = login(&mut store, token, &mut StdTerminal)?;
            match outcome.user_id {
                Some(user_id) => println!(
                    "Access token for user {user_id} stored in {}.",
                    store.path().display()
                ),
                None => println!("Access token stored in {}.", store.path().display()),
            }
        }
        Command::Logout => {
            let mut store = FileCredentialStore::new(&context.layout);
            let outcome = logout(&mut store)?;
            tracing::info!(
                credential_removed = outcome.credential_removed,
                path = %store.path().display(),
                "logout completed"
            );
            println!("Logged out. The next chat session needs a new access token.");
        }
    }

    Ok(())
}

fn run_chat(context: &AppContext, args: ChatArgs) -> Result<()> {
    let credential = match args.token.as_deref() {
        Some(raw) => match Credential::new(raw) {
            Some(credential) => Some(credential),
            None => bail!("--token must not be empty"),
        },
        None => None,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AppError::RuntimeInit)?;

    let outcome = runtime.block_on(async {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let connector = WsConnector::new(
            &context.config.server.url,
            context.config.transport.handshake_timeout(),
            events_tx,
        )?;
        let policy = ReconnectPolicy::from(&context.config.reconnect);

        tracing::info!(
            endpoint = %connector.endpoint(),
            max_attempts = policy.max_attempts,
            retry_delay_ms = policy.retry_delay.as_millis() as u64,
            "starting chat session"
        );

        let (client, credential) = match credential {
            Some(credential) if args.no_save => (
                RealtimeClient::new(connector, MemoryCredentialStore::with(credential), policy),
                None,
            ),
            credential => (
                RealtimeClient::new(connector, FileCredentialStore::new(&context.layout), policy),
                credential,
            ),
        };

        let mut session = ChatSession::new(client);
        if let Some(path) = args.conversations.as_deref() {
            let conversations = load_conversations(path)?;
            tracing::info!(
                path = %path.display(),
                conversations = conversations.len(),
                "conversation list loaded"
            );
            session.seed(conversations);
        }

        let mut lines = shell::spawn_line_reader(BufReader::new(io::stdin()))
            .context("failed to start console input reader")?;
        shell::run(
            &mut session,
            &mut events_rx,
            &mut lines,
            ShellOptions {
                credential,
                conversation: args.conversation,
            },
        )
        .await
    });

    // Pending link tasks are abandoned rather than awaited.
    runtime.shutdown_background();
    outcome
}

#[cfg(test)]
mod tests {
    use std::{env, fs};

    use super::*;
    use crate::{infra::storage_layout::StorageLayout, test_support::env_lock};

    #[test]
    fn login_then_logout_through_the_cli() {
        let _guard = env_lock();
        let root = tempfile::tempdir().expect("tempdir");
        let old_xdg = env::var_os("XDG_CONFIG_HOME");
        // SAFETY: env is guarded by process-wide test mutex.
        unsafe { env::set_var("XDG_CONFIG_HOME", root.path()) };

        let layout = StorageLayout::resolve().expect("layout");
        layout.ensure_dirs().expect("layout dirs should be created");
        fs::write(layout.credential_file(), "tok-123").expect("credential fixture");

        let cli = Cli {
            config: Some(root.path().join("missing-config.toml")),
            command: Some(Command::Logout),
        };
        run(cli).expect("logout should succeed");

        assert!(!layout.credential_file().exists());

        match old_xdg {
            // SAFETY: restoring env while guard is held.
            Some(value) => unsafe { env::set_var("XDG_CONFIG_HOME", value) },
            // SAFETY: restoring env while guard is held.
            None => unsafe { env::remove_var("XDG_CONFIG_HOME") },
        }
    }
}
