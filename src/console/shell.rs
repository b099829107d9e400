use std::{
    io::{self, BufRead, Write},
    thread,
};

use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::{
    domain::conversation::ConversationId,
    infra::credentials::Credential,
    realtime::{
        client::ConnectOutcome,
        transport::{Connector, TransportEvent},
    },
    usecases::chat_session::{ChatCommand, ChatSession},
};

use super::{
    input::{self, ConsoleInput},
    render,
};

const SHELL_INPUT_CLOSED: &str = "CONSOLE_INPUT_CLOSED";
const SHELL_INPUT_FAILED: &str = "CONSOLE_INPUT_FAILED";

#[derive(Debug, Clone, Default)]
pub struct ShellOptions {
    pub credential: Option<Credential>,
    pub conversation: Option<ConversationId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Reads lines on a plain thread and forwards them to the shell loop.
///
/// A read blocked on the terminal then never holds up runtime shutdown; the
/// thread ends on end of input, a read error, or once the receiver is gone.
pub fn spawn_line_reader<R>(reader: R) -> io::Result<UnboundedReceiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (lines_tx, lines_rx) = mpsc::unbounded_channel();

    thread::Builder::new()
        .name("console-input".to_owned())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if lines_tx.send(line).is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        tracing::warn!(
                            code = SHELL_INPUT_FAILED,
                            error = %error,
                            "console input read failed"
                        );
                        return;
                    }
                }
            }
        })?;

    Ok(lines_rx)
}

/// Runs the interactive loop until `/quit`, end of input or Ctrl-C.
pub async fn run<C: Connector>(
    session: &mut ChatSession<C>,
    events: &mut UnboundedReceiver<TransportEvent>,
    lines: &mut UnboundedReceiver<String>,
    options: ShellOptions,
) -> Result<()> {
    let mut out = io::stdout();

    if session.start(options.credential) == ConnectOutcome::MissingCredential {
        writeln!(
            out,
            "! no access token stored; run `tradelink-rt login` or pass --token"
        )?;
        return Ok(());
    }
    writeln!(out, "* connecting... type /help for commands")?;

    if let Some(id) = options.conversation {
        // The join is replayed once the connection is confirmed.
        session.execute(ChatCommand::Join(id))?;
        writeln!(out, "* now in #{id}")?;
    }

    loop {
        flush_feed(session, &mut out)?;
        let retry = session.retry_deadline();

        tokio::select! {
            event = events.recv() => match event {
                Some(event) => session.handle_transport_event(event),
                None => break,
            },
            line = lines.recv() => match line {
                Some(line) => {
                    if handle_line(session, &line, &mut out)? == Flow::Quit {
                        break;
                    }
                }
                None => {
                    tracing::info!(code = SHELL_INPUT_CLOSED, "console input closed");
                    break;
                }
            },
            _ = retry_timer(retry) => {
                session.poll_retry(std::time::Instant::now());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.shutdown();
    flush_feed(session, &mut out)?;

    Ok(())
}

pub fn handle_line<C, W>(session: &mut ChatSession<C>, line: &str, out: &mut W) -> io::Result<Flow>
where
    C: Connector,
    W: Write,
{
    let input = match input::parse(line) {
        Ok(input) => input,
        Err(error) => {
            writeln!(out, "! {error}")?;
            return Ok(Flow::Continue);
        }
    };

    match input {
        ConsoleInput::Nothing => {}
        ConsoleInput::Quit => return Ok(Flow::Quit),
        ConsoleInput::Help => {
            for help in render::HELP_LINES {
                writeln!(out, "{help}")?;
            }
        }
        ConsoleInput::List => {
            for entry in render::conversation_lines(&session.inbox()) {
                writeln!(out, "{entry}")?;
            }
        }
        ConsoleInput::History => {
            for entry in render::history_lines(&session.inbox()) {
                writeln!(out, "{entry}")?;
            }
        }
        ConsoleInput::Status => {
            let line = render::status_line(
                session.state(),
                session.session_id(),
                session.reconnect_attempts(),
                &session.inbox(),
            );
            writeln!(out, "{line}")?;
        }
        ConsoleInput::Connect => match session.start(None) {
            ConnectOutcome::Started => writeln!(out, "* connecting...")?,
            ConnectOutcome::AlreadyConnected => writeln!(out, "* already connected")?,
            ConnectOutcome::MissingCredential => {
                writeln!(out, "! no access token stored; run `tradelink-rt login`")?
            }
        },
        ConsoleInput::Chat(command) => {
            let joined = match &command {
                ChatCommand::Join(id) => Some(*id),
                _ => None,
            };
            match session.execute(command) {
                Ok(()) => {
                    if let Some(id) = joined {
                        writeln!(out, "* now in #{id}")?;
                    }
                }
                Err(error) => writeln!(out, "! {error}")?,
            }
        }
    }

    out.flush()?;
    Ok(Flow::Continue)
}

/// Prints every event delivered since the last flush.
pub fn flush_feed<C, W>(session: &mut ChatSession<C>, out: &mut W) -> io::Result<()>
where
    C: Connector,
    W: Write,
{
    let events = session.drain_feed();
    if events.is_empty() {
        return Ok(());
    }

    let (own_user_id, active) = {
        let inbox = session.inbox();
        (inbox.own_user_id(), inbox.active())
    };
    for event in &events {
        if let Some(line) = render::event_line(event, own_user_id, active) {
            writeln!(out, "{line}")?;
        }
    }

    out.flush()
}

async fn retry_timer(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
        }
        None => std::future::pending::<()>().await,
    }
}
