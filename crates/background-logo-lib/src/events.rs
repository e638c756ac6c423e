// SPDX-License-Identifier: MPL-2.0

use crate::overlay::OverlayKey;
use crate::shell::ActorDestroyed;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Notifications queued by signal handlers for the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    MonitorsChanged,
    StartupPrepared,
    WorkAreasChanged,
    SettingChanged { overlay: OverlayKey, key: String },
    BackgroundChanged(OverlayKey),
    BackgroundActorDestroyed(OverlayKey, ActorDestroyed),
    /// The logo file was rewritten on disk.
    LogoFileModified,
}

/// FIFO shared between signal handlers and the controller. Handlers only
/// enqueue; the controller drains on its own turn of the event loop.
#[derive(Debug, Clone, Default)]
pub struct Mailbox(Rc<RefCell<VecDeque<ControllerEvent>>>);

impl Mailbox {
    pub fn push(&self, event: ControllerEvent) {
        self.0.borrow_mut().push_back(event);
    }

    pub fn pop(&self) -> Option<ControllerEvent> {
        self.0.borrow_mut().pop_front()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}
