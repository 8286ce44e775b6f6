#![forbid(unsafe_code)]

//! Observable engine events.
//!
//! Observers are plain callbacks registered on the engine. They are notified
//! synchronously, in registration order, after the state change they
//! describe has fully happened.
//!
//! # Failure Modes
//!
//! - **Observer panics**: caught and logged; the remaining observers still
//!   run and the engine state is unaffected.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::warn;

/// Something that happened inside the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A line was dispatched successfully (command echo).
    CommandExecuted { line: String },
    /// A line or operation failed.
    CommandFailed { input: String, message: String },
    /// Undo availability flipped.
    UndoAvailabilityChanged(bool),
    /// Redo availability flipped.
    RedoAvailabilityChanged(bool),
    /// Either history stack changed.
    HistoryChanged,
    /// A group was opened (`true`) or closed (`false`).
    GroupingChanged(bool),
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

type Callback = Box<dyn FnMut(&EngineEvent) + Send>;

/// Registration-ordered list of observer callbacks.
#[derive(Default)]
pub(crate) struct Observers {
    next_id: u64,
    callbacks: Vec<(SubscriberId, Callback)>,
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("subscriber_count", &self.callbacks.len())
            .finish()
    }
}

impl Observers {
    pub(crate) fn subscribe(&mut self, callback: Callback) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, callback));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(sid, _)| *sid != id);
        self.callbacks.len() != before
    }

    pub(crate) fn emit(&mut self, event: &EngineEvent) {
        for (id, callback) in &mut self.callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!(subscriber = id.0, ?event, "engine observer panicked");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.callbacks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<EngineEvent>>>, Callback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (
            seen,
            Box::new(move |e: &EngineEvent| sink.lock().unwrap().push(e.clone())),
        )
    }

    #[test]
    fn notifies_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut observers = Observers::default();
        for tag in ["a", "b"] {
            let order = Arc::clone(&order);
            observers.subscribe(Box::new(move |_: &EngineEvent| order.lock().unwrap().push(tag)));
        }
        observers.emit(&EngineEvent::HistoryChanged);
        assert_eq!(*order.lock().unwrap(), ["a", "b"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let (seen, cb) = recorder();
        let mut observers = Observers::default();
        let id = observers.subscribe(cb);
        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.emit(&EngineEvent::HistoryChanged);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(observers.len(), 0);
    }

    #[test]
    fn panicking_observer_does_not_block_others() {
        let (seen, cb) = recorder();
        let mut observers = Observers::default();
        observers.subscribe(Box::new(|_: &EngineEvent| panic!("observer bug")));
        observers.subscribe(cb);
        observers.emit(&EngineEvent::GroupingChanged(true));
        assert_eq!(*seen.lock().unwrap(), [EngineEvent::GroupingChanged(true)]);
    }

    #[test]
    fn ids_are_unique() {
        let mut observers = Observers::default();
        let a = observers.subscribe(Box::new(|_: &EngineEvent| {}));
        let b = observers.subscribe(Box::new(|_: &EngineEvent| {}));
        assert_ne!(a, b);
    }
}
