use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

use crate::core::Timestamp;

/// Notification kinds a player emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    TimeChanged,
    DataReady,
    /// Reserved for collaborators that stream data in near the range boundaries.
    /// Nothing in this crate emits it.
    RequiresMoreData,
    EndOfData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    TimeChanged(Timestamp),
    DataReady,
    RequiresMoreData,
    EndOfData,
}

impl Event {
    pub fn kind(&self) -> EventType {
        match self {
            Event::TimeChanged(_) => EventType::TimeChanged,
            Event::DataReady => EventType::DataReady,
            Event::RequiresMoreData => EventType::RequiresMoreData,
            Event::EndOfData => EventType::EndOfData,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&Event) -> anyhow::Result<()>>;

/// Publish/subscribe registry.
///
/// Listeners of one type run in subscription order. A listener that returns an
/// error or panics is logged and skipped; the rest still run.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: BTreeMap<EventType, Vec<(ListenerId, Listener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, kind: EventType, listener: F) -> ListenerId
    where
        F: FnMut(&Event) -> anyhow::Result<()> + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` wasn't subscribed to `kind`
    pub fn unsubscribe(&mut self, id: ListenerId, kind: EventType) -> bool {
        let Some(listeners) = self.listeners.get_mut(&kind) else {
            return false;
        };
        match listeners.iter().position(|(existing, _)| *existing == id) {
            Some(idx) => {
                drop(listeners.remove(idx));
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self, kind: EventType) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener of its type. Returns how many failed.
    pub fn emit(&mut self, event: &Event) -> usize {
        let Some(listeners) = self.listeners.get_mut(&event.kind()) else {
            return 0;
        };

        let mut failures = 0;
        for (id, listener) in listeners.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failures += 1;
                    warn!(?id, kind = ?event.kind(), "event listener failed: {err:#}");
                }
                Err(_) => {
                    failures += 1;
                    warn!(?id, kind = ?event.kind(), "event listener panicked");
                }
            }
        }
        failures
    }
}

/// Capability for anything owning an [`EventBus`]
pub trait EventEmitting {
    fn event_bus(&mut self) -> &mut EventBus;

    fn add_event_listener<F>(&mut self, kind: EventType, listener: F) -> ListenerId
    where
        F: FnMut(&Event) -> anyhow::Result<()> + 'static,
        Self: Sized,
    {
        self.event_bus().subscribe(kind, listener)
    }

    fn remove_listener(&mut self, id: ListenerId, kind: EventType) -> bool {
        self.event_bus().unsubscribe(id, kind)
    }
}
