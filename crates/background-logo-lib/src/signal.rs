// SPDX-License-Identifier: MPL-2.0

//! Single-threaded signals with disposable handler ids.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Identifies one connected handler. Unique per [`HandlerIds`] source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

/// Allocates [`HandlerId`]s.
#[derive(Debug)]
pub struct HandlerIds(Cell<u64>);

impl Default for HandlerIds {
    fn default() -> Self {
        Self(Cell::new(1))
    }
}

impl HandlerIds {
    pub fn next(&self) -> HandlerId {
        let id = self.0.get();
        self.0.set(id + 1);
        HandlerId(id)
    }
}

pub type Handler<T> = Rc<RefCell<dyn FnMut(&T)>>;

pub struct Signal<T> {
    handlers: Vec<(HandlerId, Handler<T>)>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<T: 'static> Signal<T> {
    pub fn connect(&mut self, id: HandlerId, handler: impl FnMut(&T) + 'static) {
        self.handlers.push((id, Rc::new(RefCell::new(handler))));
    }

    pub fn disconnect(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    #[must_use]
    pub fn contains(&self, id: HandlerId) -> bool {
        self.handlers.iter().any(|(handler_id, _)| *handler_id == id)
    }

    /// Snapshot of the handlers, so emission can run without holding a
    /// borrow of whatever owns the signal.
    #[must_use]
    pub fn handlers(&self) -> Vec<Handler<T>> {
        self.handlers.iter().map(|(_, h)| h.clone()).collect()
    }

    /// Remove every handler, returning their ids.
    pub fn clear(&mut self) -> Vec<HandlerId> {
        self.handlers.drain(..).map(|(id, _)| id).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Invoke a handler snapshot taken with [`Signal::handlers`].
pub fn emit<T>(handlers: Vec<Handler<T>>, value: &T) {
    for handler in handlers {
        match handler.try_borrow_mut() {
            Ok(mut handler) => (&mut *handler)(value),
            Err(_) => tracing::warn!("skipping re-entrant signal handler"),
        }
    }
}
