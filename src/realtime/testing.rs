//! In-memory connector that records what the client does to its links.

use std::{
    cell::{Cell, Ref, RefCell},
    rc::Rc,
};

use crate::{
    domain::events::ClientCommand,
    infra::credentials::Credential,
    realtime::transport::{Connector, Link, LinkGeneration, TransportError},
};

#[derive(Debug, Default)]
pub struct LinkLog {
    /// Generation and raw credential of every successful open.
    pub opened: Vec<(LinkGeneration, String)>,
    pub sent: Vec<(LinkGeneration, ClientCommand)>,
    pub closed: Vec<LinkGeneration>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingConnector {
    log: Rc<RefCell<LinkLog>>,
    failing_opens: Rc<Cell<u32>>,
}

impl RecordingConnector {
    pub fn log(&self) -> Ref<'_, LinkLog> {
        self.log.borrow()
    }

    /// Makes the next `count` opens fail synchronously.
    pub fn fail_next_opens(&self, count: u32) {
        self.failing_opens.set(count);
    }
}

impl Connector for RecordingConnector {
    type Link = RecordingLink;

    fn open(
        &mut self,
        generation: LinkGeneration,
        credential: &Credential,
    ) -> Result<Self::Link, TransportError> {
        let failing = self.failing_opens.get();
        if failing > 0 {
            self.failing_opens.set(failing - 1);
            return Err(TransportError::InvalidUrl {
                url: "ws://unreachable".to_owned(),
                details: "connection refused".to_owned(),
            });
        }

        self.log
            .borrow_mut()
            .opened
            .push((generation, credential.expose().to_owned()));

        Ok(RecordingLink {
            generation,
            log: Rc::clone(&self.log),
            closed: false,
        })
    }
}

#[derive(Debug)]
pub struct RecordingLink {
    generation: LinkGeneration,
    log: Rc<RefCell<LinkLog>>,
    closed: bool,
}

impl Link for RecordingLink {
    fn send(&mut self, command: &ClientCommand) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::LinkClosed);
        }
        self.log
            .borrow_mut()
            .sent
            .push((self.generation, command.clone()));
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.log.borrow_mut().closed.push(self.generation);
        }
    }
}
