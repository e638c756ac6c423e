// SPDX-License-Identifier: MPL-2.0

//! What the overlay needs from the desktop it runs in.

use crate::background::BackgroundSource;
use crate::placement::Rect;
use crate::signal::HandlerId;
use image::RgbaImage;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Monitor {
    pub index: usize,
    /// Usable area, excluding panels and other reserved space.
    pub work_area: Rect,
    pub primary: bool,
}

/// Identifies a background manager for as long as it lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagerId(pub u64);

/// A background surface and the monitor it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerInfo {
    pub id: ManagerId,
    pub monitor_index: usize,
}

/// Why a background actor went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorDestroyed {
    /// Replaced by a new actor; the manager lives on.
    Swapped,
    /// The manager itself was torn down.
    ManagerGone,
}

/// Display-side half of an overlay. Dropping the box without
/// [`OverlaySurface::destroy`] leaks nothing, but hosts may log it.
pub trait OverlaySurface {
    fn set_work_area(&mut self, area: Rect);

    /// Scaled logo, or `None` for an empty overlay.
    fn set_logo(&mut self, logo: Option<Rc<RgbaImage>>);

    /// Logo position relative to the work area.
    fn set_logo_origin(&mut self, x: i32, y: i32);

    fn set_opacity(&mut self, opacity: u8);

    fn destroy(self: Box<Self>);
}

pub type Callback = Box<dyn FnMut()>;

/// Monitors, background managers and their notifications.
///
/// Handler ids are unique across all signals of one shell, so
/// [`Shell::disconnect`] needs no signal name. Disconnecting an id that is
/// unknown or already gone returns `false`.
pub trait Shell {
    fn monitors(&self) -> Vec<Monitor>;

    fn primary_monitor(&self) -> Option<Monitor> {
        let monitors = self.monitors();
        monitors
            .iter()
            .find(|m| m.primary)
            .or_else(|| monitors.first())
            .copied()
    }

    /// Work area of monitor `index`, clamped to the last monitor when the
    /// index no longer exists.
    fn work_area(&self, index: usize) -> Option<Rect> {
        let monitors = self.monitors();
        let last = monitors.len().checked_sub(1)?;
        monitors.get(index.min(last)).map(|m| m.work_area)
    }

    fn background_managers(&self) -> Vec<ManagerInfo>;

    fn current_background(&self, manager: ManagerId) -> Option<BackgroundSource>;

    fn connect_monitors_changed(&self, callback: Callback) -> HandlerId;

    fn connect_startup_prepared(&self, callback: Callback) -> HandlerId;

    fn connect_workareas_changed(&self, callback: Callback) -> HandlerId;

    /// `None` when the manager does not exist.
    fn connect_background_changed(&self, manager: ManagerId, callback: Callback)
    -> Option<HandlerId>;

    /// Connects to the manager's *current* background actor. The handler is
    /// dropped along with that actor.
    fn connect_background_actor_destroyed(
        &self,
        manager: ManagerId,
        callback: Box<dyn FnMut(ActorDestroyed)>,
    ) -> Option<HandlerId>;

    fn disconnect(&self, id: HandlerId) -> bool;

    fn create_overlay(&self, manager: ManagerId) -> Option<Box<dyn OverlaySurface>>;
}
