use std::{
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
};

use crate::domain::events::{EventKind, ServerEvent};

const LISTENER_FAILED: &str = "REALTIME_LISTENER_FAILED";
const LISTENER_PANICKED: &str = "REALTIME_LISTENER_PANICKED";

pub type ListenerResult = anyhow::Result<()>;

type Listener = Box<dyn FnMut(&ServerEvent) -> ListenerResult>;

/// Handle returned by `on`, used to remove that one listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Ordered listeners per event kind, owned by one client instance.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
}

impl ListenerRegistry {
    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&ServerEvent) -> ListenerResult + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Removes one listener, or every listener of `kind` when `id` is
    /// `None`. Returns how many were removed.
    pub fn off(&mut self, kind: EventKind, id: Option<ListenerId>) -> usize {
        let Some(id) = id else {
            return self
                .listeners
                .remove(&kind)
                .map(|removed| removed.len())
                .unwrap_or(0);
        };

        let Some(entries) = self.listeners.get_mut(&kind) else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        before - entries.len()
    }

    /// Invokes every listener of the event's kind in registration order.
    ///
    /// A listener that errors or panics is logged and skipped; the rest
    /// still run.
    pub fn dispatch(&mut self, event: &ServerEvent) -> DispatchReport {
        let kind = event.kind();
        let mut report = DispatchReport::default();
        let Some(entries) = self.listeners.get_mut(&kind) else {
            return report;
        };

        for (id, listener) in entries.iter_mut() {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(error)) => {
                    report.failed += 1;
                    tracing::warn!(
                        code = LISTENER_FAILED,
                        event = kind.as_str(),
                        listener = id.0,
                        error = %error,
                        "event listener returned an error"
                    );
                }
                Err(payload) => {
                    report.failed += 1;
                    tracing::error!(
                        code = LISTENER_PANICKED,
                        event = kind.as_str(),
                        listener = id.0,
                        panic = panic_message(payload.as_ref()),
                        "event listener panicked"
                    );
                }
            }
        }

        report
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<_> = self
            .listeners
            .iter()
            .map(|(kind, entries)| (kind.as_str(), entries.len()))
            .collect();
        counts.sort_unstable();

        f.debug_struct("ListenerRegistry")
            .field("listeners", &counts)
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
