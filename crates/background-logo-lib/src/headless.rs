// SPDX-License-Identifier: MPL-2.0

//! In-process desktop model implementing [`Shell`].
//!
//! The daemon drives it from configuration and command line arguments; tests
//! drive it directly to simulate monitor hotplug and wallpaper changes.

use crate::background::BackgroundSource;
use crate::placement::Rect;
use crate::shell::{
    ActorDestroyed, Callback, ManagerId, ManagerInfo, Monitor, OverlaySurface, Shell,
};
use crate::signal::{self, HandlerId, HandlerIds, Signal};
use image::RgbaImage;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerKind {
    Desktop,
    Overview,
}

#[derive(Debug)]
struct ManagerState {
    monitor_index: usize,
    kind: ManagerKind,
    changed: Signal<()>,
    actor_destroyed: Signal<ActorDestroyed>,
}

/// Last state pushed to a live overlay surface.
#[derive(Debug, Clone)]
pub struct OverlaySnapshot {
    pub manager: ManagerId,
    pub work_area: Rect,
    pub logo: Option<Rc<RgbaImage>>,
    pub origin: (i32, i32),
    pub opacity: u8,
}

#[derive(Debug, Default)]
struct State {
    monitors: Vec<Monitor>,
    background: Option<BackgroundSource>,
    managers: BTreeMap<ManagerId, ManagerState>,
    next_manager: u64,
    with_overview: bool,
    monitors_changed: Signal<()>,
    startup_prepared: Signal<()>,
    workareas_changed: Signal<()>,
    surfaces: BTreeMap<u64, OverlaySnapshot>,
    next_surface: u64,
}

impl State {
    fn spawn_managers(&mut self) {
        let kinds: &[ManagerKind] = if self.with_overview {
            &[ManagerKind::Desktop, ManagerKind::Overview]
        } else {
            &[ManagerKind::Desktop]
        };

        for kind in kinds {
            for monitor_index in 0..self.monitors.len() {
                self.next_manager += 1;
                self.managers.insert(
                    ManagerId(self.next_manager),
                    ManagerState {
                        monitor_index,
                        kind: *kind,
                        changed: Signal::default(),
                        actor_destroyed: Signal::default(),
                    },
                );
            }
        }
    }

    fn handler_count(&self) -> usize {
        self.monitors_changed.len()
            + self.startup_prepared.len()
            + self.workareas_changed.len()
            + self
                .managers
                .values()
                .map(|m| m.changed.len() + m.actor_destroyed.len())
                .sum::<usize>()
    }
}

#[derive(Debug, Default)]
pub struct HeadlessShell {
    state: Rc<RefCell<State>>,
    ids: HandlerIds,
}

impl HeadlessShell {
    /// One desktop background manager per monitor.
    #[must_use]
    pub fn new(monitors: Vec<Monitor>) -> Self {
        Self::create(monitors, false)
    }

    /// A desktop and an overview background manager per monitor.
    #[must_use]
    pub fn with_overview(monitors: Vec<Monitor>) -> Self {
        Self::create(monitors, true)
    }

    fn create(monitors: Vec<Monitor>, with_overview: bool) -> Self {
        let shell = Self::default();
        {
            let mut state = shell.state.borrow_mut();
            state.monitors = monitors;
            state.with_overview = with_overview;
            state.spawn_managers();
        }
        shell
    }

    #[must_use]
    pub fn background(&self) -> Option<BackgroundSource> {
        self.state.borrow().background.clone()
    }

    #[must_use]
    pub fn manager_kind(&self, manager: ManagerId) -> Option<ManagerKind> {
        self.state.borrow().managers.get(&manager).map(|m| m.kind)
    }

    /// Switch every manager to `background`. Each old background actor is
    /// destroyed as swapped, then `changed` fires.
    pub fn set_background(&self, background: Option<BackgroundSource>) {
        let mut destroyed = Vec::new();
        let mut changed = Vec::new();
        {
            let mut state = self.state.borrow_mut();
            state.background = background;
            for manager in state.managers.values_mut() {
                destroyed.extend(manager.actor_destroyed.handlers());
                manager.actor_destroyed.clear();
                changed.extend(manager.changed.handlers());
            }
        }

        tracing::debug!(background = ?self.background(), "background swapped");
        signal::emit(destroyed, &ActorDestroyed::Swapped);
        signal::emit(changed, &());
    }

    /// Tear down one manager, as when the compositor discards it.
    pub fn destroy_manager(&self, manager: ManagerId) {
        let removed = self.state.borrow_mut().managers.remove(&manager);
        if let Some(removed) = removed {
            signal::emit(removed.actor_destroyed.handlers(), &ActorDestroyed::ManagerGone);
        }
    }

    /// Replace the monitor layout: every manager is destroyed and rebuilt,
    /// then `monitors-changed` fires.
    pub fn set_monitors(&self, monitors: Vec<Monitor>) {
        let old: Vec<ManagerId> = self.state.borrow().managers.keys().copied().collect();
        for manager in old {
            self.destroy_manager(manager);
        }

        let handlers = {
            let mut state = self.state.borrow_mut();
            state.monitors = monitors;
            state.spawn_managers();
            state.monitors_changed.handlers()
        };
        signal::emit(handlers, &());
    }

    /// Change one monitor's work area (panel resize) and announce it.
    pub fn set_work_area(&self, index: usize, area: Rect) {
        let handlers = {
            let mut state = self.state.borrow_mut();
            let Some(monitor) = state.monitors.get_mut(index) else {
                tracing::warn!(index, "no such monitor");
                return;
            };
            monitor.work_area = area;
            state.workareas_changed.handlers()
        };
        signal::emit(handlers, &());
    }

    pub fn emit_startup_prepared(&self) {
        let handlers = self.state.borrow().startup_prepared.handlers();
        signal::emit(handlers, &());
    }

    /// Connected handlers across all signals.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.state.borrow().handler_count()
    }

    #[must_use]
    pub fn live_surfaces(&self) -> usize {
        self.state.borrow().surfaces.len()
    }

    #[must_use]
    pub fn snapshots(&self) -> Vec<OverlaySnapshot> {
        self.state.borrow().surfaces.values().cloned().collect()
    }

    fn connect_global(
        &self,
        pick: fn(&mut State) -> &mut Signal<()>,
        mut callback: Callback,
    ) -> HandlerId {
        let id = self.ids.next();
        pick(&mut self.state.borrow_mut()).connect(id, move |_: &()| callback());
        id
    }
}

impl Shell for HeadlessShell {
    fn monitors(&self) -> Vec<Monitor> {
        self.state.borrow().monitors.clone()
    }

    fn background_managers(&self) -> Vec<ManagerInfo> {
        self.state
            .borrow()
            .managers
            .iter()
            .map(|(id, m)| ManagerInfo {
                id: *id,
                monitor_index: m.monitor_index,
            })
            .collect()
    }

    fn current_background(&self, manager: ManagerId) -> Option<BackgroundSource> {
        let state = self.state.borrow();
        state
            .managers
            .contains_key(&manager)
            .then(|| state.background.clone())
            .flatten()
    }

    fn connect_monitors_changed(&self, callback: Callback) -> HandlerId {
        self.connect_global(|s| &mut s.monitors_changed, callback)
    }

    fn connect_startup_prepared(&self, callback: Callback) -> HandlerId {
        self.connect_global(|s| &mut s.startup_prepared, callback)
    }

    fn connect_workareas_changed(&self, callback: Callback) -> HandlerId {
        self.connect_global(|s| &mut s.workareas_changed, callback)
    }

    fn connect_background_changed(
        &self,
        manager: ManagerId,
        mut callback: Callback,
    ) -> Option<HandlerId> {
        let mut state = self.state.borrow_mut();
        let manager = state.managers.get_mut(&manager)?;
        let id = self.ids.next();
        manager.changed.connect(id, move |_: &()| callback());
        Some(id)
    }

    fn connect_background_actor_destroyed(
        &self,
        manager: ManagerId,
        mut callback: Box<dyn FnMut(ActorDestroyed)>,
    ) -> Option<HandlerId> {
        let mut state = self.state.borrow_mut();
        let manager = state.managers.get_mut(&manager)?;
        let id = self.ids.next();
        manager
            .actor_destroyed
            .connect(id, move |reason: &ActorDestroyed| callback(*reason));
        Some(id)
    }

    fn disconnect(&self, id: HandlerId) -> bool {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;

        state.monitors_changed.disconnect(id)
            || state.startup_prepared.disconnect(id)
            || state.workareas_changed.disconnect(id)
            || state
                .managers
                .values_mut()
                .any(|m| m.changed.disconnect(id) || m.actor_destroyed.disconnect(id))
    }

    fn create_overlay(&self, manager: ManagerId) -> Option<Box<dyn OverlaySurface>> {
        let mut state = self.state.borrow_mut();
        let monitor_index = state.managers.get(&manager)?.monitor_index;
        let work_area = state
            .monitors
            .get(monitor_index)
            .map(|m| m.work_area)
            .unwrap_or_default();

        state.next_surface += 1;
        let id = state.next_surface;
        state.surfaces.insert(
            id,
            OverlaySnapshot {
                manager,
                work_area,
                logo: None,
                origin: (0, 0),
                opacity: 0,
            },
        );

        Some(Box::new(HeadlessSurface {
            id,
            state: Rc::downgrade(&self.state),
        }))
    }
}

struct HeadlessSurface {
    id: u64,
    state: Weak<RefCell<State>>,
}

impl HeadlessSurface {
    fn update(&self, apply: impl FnOnce(&mut OverlaySnapshot)) {
        if let Some(state) = self.state.upgrade() {
            if let Some(snapshot) = state.borrow_mut().surfaces.get_mut(&self.id) {
                apply(snapshot);
            }
        }
    }
}

impl OverlaySurface for HeadlessSurface {
    fn set_work_area(&mut self, area: Rect) {
        self.update(|s| s.work_area = area);
    }

    fn set_logo(&mut self, logo: Option<Rc<RgbaImage>>) {
        self.update(|s| s.logo = logo);
    }

    fn set_logo_origin(&mut self, x: i32, y: i32) {
        self.update(|s| s.origin = (x, y));
    }

    fn set_opacity(&mut self, opacity: u8) {
        self.update(|s| s.opacity = opacity);
    }

    fn destroy(self: Box<Self>) {
        drop(self);
    }
}

impl Drop for HeadlessSurface {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.borrow_mut().surfaces.remove(&self.id);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    pub(crate) fn monitor(index: usize, x: i32, width: u32, height: u32) -> Monitor {
        Monitor {
            index,
            work_area: Rect::new(x, 0, width, height),
            primary: index == 0,
        }
    }

    #[test]
    fn managers_per_monitor() {
        let monitors = vec![monitor(0, 0, 1920, 1080), monitor(1, 1920, 1280, 1024)];
        assert_eq!(HeadlessShell::new(monitors.clone()).background_managers().len(), 2);

        let shell = HeadlessShell::with_overview(monitors);
        let managers = shell.background_managers();
        assert_eq!(managers.len(), 4);
        assert_eq!(
            managers
                .iter()
                .filter(|m| shell.manager_kind(m.id) == Some(ManagerKind::Overview))
                .count(),
            2
        );
    }

    #[test]
    fn background_swap_drops_actor_handlers() {
        let shell = HeadlessShell::new(vec![monitor(0, 0, 800, 600)]);
        let manager = shell.background_managers()[0].id;
        let swaps = Rc::new(Cell::new(0));
        let changes = Rc::new(Cell::new(0));

        {
            let swaps = swaps.clone();
            shell.connect_background_actor_destroyed(
                manager,
                Box::new(move |reason| {
                    assert_eq!(reason, ActorDestroyed::Swapped);
                    swaps.set(swaps.get() + 1);
                }),
            );
        }
        {
            let changes = changes.clone();
            shell.connect_background_changed(manager, Box::new(move || changes.set(changes.get() + 1)));
        }

        shell.set_background(Some(BackgroundSource::from_path("/a.png")));
        shell.set_background(Some(BackgroundSource::from_path("/b.png")));

        assert_eq!(swaps.get(), 1);
        assert_eq!(changes.get(), 2);
        assert_eq!(shell.handler_count(), 1);
    }

    #[test]
    fn work_area_clamps_to_last_monitor() {
        let shell = HeadlessShell::new(vec![monitor(0, 0, 800, 600), monitor(1, 800, 1024, 768)]);
        assert_eq!(shell.work_area(5), Some(Rect::new(800, 0, 1024, 768)));
        assert_eq!(HeadlessShell::new(Vec::new()).work_area(0), None);
    }

    #[test]
    fn surfaces_unregister_on_destroy() {
        let shell = HeadlessShell::new(vec![monitor(0, 0, 800, 600)]);
        let manager = shell.background_managers()[0].id;

        let mut surface = shell.create_overlay(manager).unwrap();
        surface.set_opacity(42);
        assert_eq!(shell.snapshots()[0].opacity, 42);

        surface.destroy();
        assert_eq!(shell.live_surfaces(), 0);
        assert!(shell.create_overlay(ManagerId(999)).is_none());
    }
}
