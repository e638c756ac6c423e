// SPDX-License-Identifier: MPL-2.0

//! Owns one overlay per background manager and keeps them in sync with the
//! shell and the settings.

use crate::events::{ControllerEvent, Mailbox};
use crate::logo::TextureCache;
use crate::overlay::{BackgroundLogo, OverlayEnv, OverlayKey};
use crate::shell::{ActorDestroyed, Shell};
use crate::signal::HandlerId;
use background_logo_config::desktop::DesktopContext;
use background_logo_config::{Context, LOGO_FILE};
use slotmap::SlotMap;
use std::rc::Rc;
use std::time::Instant;

pub struct OverlayController {
    shell: Rc<dyn Shell>,
    context: Context,
    desktop: DesktopContext,
    mailbox: Mailbox,
    overlays: SlotMap<OverlayKey, BackgroundLogo>,
    textures: TextureCache,
    lifecycle: Vec<HandlerId>,
    active: bool,
}

impl OverlayController {
    #[must_use]
    pub fn new(shell: Rc<dyn Shell>, context: Context, desktop: DesktopContext) -> Self {
        Self {
            shell,
            context,
            desktop,
            mailbox: Mailbox::default(),
            overlays: SlotMap::with_key(),
            textures: TextureCache::new(),
            lifecycle: Vec::new(),
            active: false,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Queue shared with every handler this controller connects. Hosts push
    /// [`ControllerEvent::LogoFileModified`] here.
    #[must_use]
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn overlays(&self) -> impl Iterator<Item = (OverlayKey, &BackgroundLogo)> {
        self.overlays.iter()
    }

    #[must_use]
    pub fn overlay(&self, key: OverlayKey) -> Option<&BackgroundLogo> {
        self.overlays.get(key)
    }

    #[must_use]
    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    /// Connect to the shell's lifecycle signals and build overlays. Calling
    /// it again while active does nothing.
    pub fn activate(&mut self) {
        if self.active {
            tracing::debug!("controller already active");
            return;
        }
        self.active = true;

        let forward = |event: ControllerEvent| -> Box<dyn FnMut()> {
            let mailbox = self.mailbox.clone();
            Box::new(move || mailbox.push(event.clone()))
        };

        self.lifecycle = vec![
            self.shell
                .connect_monitors_changed(forward(ControllerEvent::MonitorsChanged)),
            self.shell
                .connect_startup_prepared(forward(ControllerEvent::StartupPrepared)),
            self.shell
                .connect_workareas_changed(forward(ControllerEvent::WorkAreasChanged)),
        ];

        self.rebuild();
        tracing::info!(overlays = self.overlays.len(), "controller activated");
    }

    /// Disconnect everything and destroy all overlays. Safe to call at any
    /// time, including more than once.
    pub fn deactivate(&mut self) {
        for id in self.lifecycle.drain(..) {
            self.shell.disconnect(id);
        }
        self.teardown();
        self.mailbox.clear();
        self.textures.clear();

        if std::mem::take(&mut self.active) {
            tracing::info!("controller deactivated");
        }
    }

    /// Destroy the current overlays and create one per background manager.
    pub fn rebuild(&mut self) {
        self.teardown();

        let managers = self.shell.background_managers();
        let mailbox = self.mailbox.clone();
        let (overlays, mut env) = self.parts();
        for manager in managers {
            overlays.insert_with_key(|key| BackgroundLogo::new(key, manager, &mut env, &mailbox));
        }

        tracing::debug!(overlays = self.overlays.len(), "overlays rebuilt");
    }

    pub fn teardown(&mut self) {
        for (_, overlay) in self.overlays.drain() {
            overlay.destroy(&*self.shell, &self.context);
        }
    }

    /// Apply a changed logo setting to every overlay.
    pub fn on_configuration_changed(&mut self, key: &str) {
        if key == LOGO_FILE {
            self.evict_logo();
        }

        let (overlays, mut env) = self.parts();
        for overlay in overlays.values_mut() {
            overlay.on_setting_changed(key, &mut env);
        }
    }

    /// Re-read every overlay's work area from its monitor.
    pub fn on_work_areas_changed(&mut self) {
        for overlay in self.overlays.values_mut() {
            let index = overlay.manager().monitor_index;
            let area = self.shell.work_area(index).unwrap_or_default();
            overlay.set_work_area(area, &self.context);
        }
    }

    /// Decode the logo file again after it changed on disk.
    pub fn reload_logo(&mut self) {
        self.evict_logo();

        let (overlays, mut env) = self.parts();
        for overlay in overlays.values_mut() {
            overlay.update_logo(&mut env);
        }
    }

    fn evict_logo(&mut self) {
        let file = self.context.logo_file();
        tracing::debug!(%file, "evicting logo texture");
        self.textures.evict(&file);
    }

    /// Handle everything queued since the last call. Returns the number of
    /// events handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        // Every overlay queues its own `logo-file` event; decode once per batch.
        let mut logo_evicted = false;
        while let Some(event) = self.mailbox.pop() {
            handled += 1;
            if !logo_evicted
                && matches!(&event, ControllerEvent::SettingChanged { key, .. } if key == LOGO_FILE)
            {
                self.evict_logo();
                logo_evicted = true;
            }
            self.handle(event);
        }
        handled
    }

    fn handle(&mut self, event: ControllerEvent) {
        tracing::trace!(?event, "dispatching");

        match event {
            ControllerEvent::MonitorsChanged | ControllerEvent::StartupPrepared => {
                if self.active {
                    self.rebuild();
                }
            }

            ControllerEvent::WorkAreasChanged => self.on_work_areas_changed(),

            ControllerEvent::SettingChanged { overlay, key } => {
                let (overlays, mut env) = self.parts();
                if let Some(overlay) = overlays.get_mut(overlay) {
                    overlay.on_setting_changed(&key, &mut env);
                }
            }

            ControllerEvent::BackgroundChanged(overlay) => {
                let (overlays, env) = self.parts();
                if let Some(overlay) = overlays.get_mut(overlay) {
                    overlay.update_visibility(&env);
                }
            }

            ControllerEvent::BackgroundActorDestroyed(key, reason) => {
                self.on_background_actor_destroyed(key, reason);
            }

            ControllerEvent::LogoFileModified => self.reload_logo(),
        }
    }

    fn on_background_actor_destroyed(&mut self, key: OverlayKey, reason: ActorDestroyed) {
        let Some(overlay) = self.overlays.get_mut(key) else {
            return;
        };

        if !overlay.on_background_actor_destroyed(reason, &*self.shell, &self.mailbox) {
            if let Some(overlay) = self.overlays.remove(key) {
                overlay.destroy(&*self.shell, &self.context);
            }
        }
    }

    /// Advance running fades. Returns whether any is still running.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.overlays
            .values_mut()
            .fold(false, |running, overlay| overlay.tick(now) | running)
    }

    fn parts(&mut self) -> (&mut SlotMap<OverlayKey, BackgroundLogo>, OverlayEnv<'_>) {
        (
            &mut self.overlays,
            OverlayEnv {
                shell: &*self.shell,
                context: &self.context,
                desktop: &self.desktop,
                textures: &mut self.textures,
            },
        )
    }
}

impl Drop for OverlayController {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::BackgroundSource;
    use crate::headless::tests::monitor;
    use crate::headless::HeadlessShell;
    use crate::logo::tests::write_png;
    use crate::overlay::OverlayPhase;
    use crate::placement::Rect;
    use background_logo_config::{LogoPosition, LOGO_SIZE};
    use std::path::Path;
    use std::time::Duration;

    struct Fixture {
        shell: Rc<HeadlessShell>,
        controller: OverlayController,
        dir: tempfile::TempDir,
    }

    fn fixture(monitors: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let logo = dir.path().join("logo.png");
        write_png(&logo, 200, 100);

        let context = Context::in_memory();
        context.set_logo_file(logo.to_str().unwrap()).unwrap();
        context.set_logo_size(10.0).unwrap();

        let shell = Rc::new(HeadlessShell::new(
            (0..monitors)
                .map(|i| monitor(i, i as i32 * 1920, 1920, 1080))
                .collect(),
        ));
        let controller = OverlayController::new(shell.clone(), context, DesktopContext::in_memory());

        Fixture {
            shell,
            controller,
            dir,
        }
    }

    fn default_background(controller: &OverlayController) -> BackgroundSource {
        BackgroundSource::from_uri(&controller.desktop.default_picture_uri()).unwrap()
    }

    fn settle(controller: &mut OverlayController) {
        controller.dispatch_pending();
        let start = Instant::now();
        controller.tick(start);
        controller.tick(start + Duration::from_secs(2));
    }

    fn phases(controller: &OverlayController) -> Vec<OverlayPhase> {
        controller.overlays().map(|(_, o)| o.phase()).collect()
    }

    #[test]
    fn activate_builds_one_overlay_per_manager() {
        let mut f = fixture(2);
        f.controller.activate();

        assert_eq!(f.controller.overlay_count(), 2);
        assert_eq!(f.shell.live_surfaces(), 2);

        let size = f.controller.overlays().next().unwrap().1.logo_size();
        assert_eq!(size, Some((192, 96)));
    }

    #[test]
    fn activate_twice_does_not_subscribe_twice() {
        let mut f = fixture(1);
        f.controller.activate();
        let handlers = f.shell.handler_count();
        let subscribers = f.controller.context().0.subscriber_count();

        f.controller.activate();
        assert_eq!(f.shell.handler_count(), handlers);
        assert_eq!(f.controller.context().0.subscriber_count(), subscribers);
        assert_eq!(f.controller.overlay_count(), 1);
    }

    #[test]
    fn deactivate_releases_everything() {
        let mut f = fixture(2);
        f.controller.activate();
        f.controller.rebuild();
        f.controller.deactivate();

        assert_eq!(f.controller.overlay_count(), 0);
        assert_eq!(f.shell.handler_count(), 0);
        assert_eq!(f.shell.live_surfaces(), 0);
        assert_eq!(f.controller.context().0.subscriber_count(), 0);

        f.controller.deactivate();
        assert!(!f.controller.is_active());
    }

    #[test]
    fn rebuild_then_teardown_leaves_nothing() {
        let mut f = fixture(3);
        f.controller.rebuild();
        assert_eq!(f.controller.overlay_count(), 3);
        assert_eq!(f.controller.context().0.subscriber_count(), 3);

        f.controller.teardown();
        assert_eq!(f.controller.overlay_count(), 0);
        assert_eq!(f.shell.handler_count(), 0);
        assert_eq!(f.shell.live_surfaces(), 0);
        assert_eq!(f.controller.context().0.subscriber_count(), 0);

        f.controller.teardown();
    }

    #[test]
    fn rebuild_replaces_overlays_without_leaking() {
        let mut f = fixture(2);
        f.controller.activate();
        let handlers = f.shell.handler_count();

        for _ in 0..3 {
            f.controller.rebuild();
        }

        assert_eq!(f.controller.overlay_count(), 2);
        assert_eq!(f.shell.handler_count(), handlers);
        assert_eq!(f.controller.context().0.subscriber_count(), 2);
        assert_eq!(f.shell.live_surfaces(), 2);
    }

    #[test]
    fn logo_hidden_on_custom_background_and_shown_on_default() {
        let mut f = fixture(1);
        f.shell
            .set_background(Some(BackgroundSource::from_path("/tmp/holiday.jpg")));
        f.controller.activate();
        settle(&mut f.controller);

        assert_eq!(phases(&f.controller), vec![OverlayPhase::Hidden]);
        assert_eq!(f.shell.snapshots()[0].opacity, 0);

        f.shell
            .set_background(Some(default_background(&f.controller)));
        settle(&mut f.controller);

        assert_eq!(phases(&f.controller), vec![OverlayPhase::Visible]);
        assert_eq!(f.shell.snapshots()[0].opacity, 255);
    }

    #[test]
    fn always_show_overrides_background() {
        let mut f = fixture(1);
        f.shell
            .set_background(Some(BackgroundSource::from_path("/tmp/holiday.jpg")));
        f.controller.activate();
        settle(&mut f.controller);

        f.controller.context().set_always_show(true).unwrap();
        settle(&mut f.controller);
        assert_eq!(phases(&f.controller), vec![OverlayPhase::Visible]);

        f.controller.context().set_always_show(false).unwrap();
        settle(&mut f.controller);
        assert_eq!(phases(&f.controller), vec![OverlayPhase::Hidden]);
        assert_eq!(f.shell.snapshots()[0].opacity, 0);
    }

    #[test]
    fn fade_starts_on_first_tick() {
        let mut f = fixture(1);
        f.controller.context().set_always_show(true).unwrap();
        f.controller.activate();

        let (_, overlay) = f.controller.overlays().next().unwrap();
        assert!(overlay.is_animating());
        assert_eq!(overlay.opacity(), 0);

        let start = Instant::now();
        assert!(f.controller.tick(start));
        assert!(f.controller.tick(start + Duration::from_millis(500)));
        let halfway = f.shell.snapshots()[0].opacity;
        assert!(halfway > 127 && halfway < 255, "{halfway}");

        assert!(!f.controller.tick(start + Duration::from_secs(1)));
        assert_eq!(f.shell.snapshots()[0].opacity, 255);
    }

    #[test]
    fn opacity_setting_applies_while_visible() {
        let mut f = fixture(1);
        f.controller.context().set_always_show(true).unwrap();
        f.controller.activate();
        settle(&mut f.controller);

        f.controller.context().set_logo_opacity(100).unwrap();
        f.controller.dispatch_pending();
        assert_eq!(f.shell.snapshots()[0].opacity, 100);
    }

    #[test]
    fn placement_follows_settings() {
        let mut f = fixture(1);
        f.controller.activate();

        let snapshot = &f.shell.snapshots()[0];
        // 192x96 logo, border 50, bottom right of 1920x1080.
        assert_eq!(snapshot.origin, (1678, 934));

        let context = f.controller.context().clone();
        context.set_logo_position(LogoPosition::Center).unwrap();
        context.set_logo_border(0).unwrap();
        f.controller.dispatch_pending();
        assert_eq!(f.shell.snapshots()[0].origin, (864, 492));

        context.set_logo_size(20.0).unwrap();
        f.controller.dispatch_pending();
        let snapshot = &f.shell.snapshots()[0];
        assert_eq!(snapshot.logo.as_ref().unwrap().dimensions(), (384, 192));
        assert_eq!(snapshot.origin, (768, 444));
    }

    #[test]
    fn unrelated_setting_is_ignored() {
        let mut f = fixture(1);
        f.controller.activate();
        let before = f.shell.snapshots()[0].origin;

        f.controller.on_configuration_changed("picture-uri");
        assert_eq!(f.shell.snapshots()[0].origin, before);
    }

    #[test]
    fn swapped_actor_is_watched_again() {
        let mut f = fixture(1);
        f.controller.activate();
        let handlers = f.shell.handler_count();

        f.shell
            .set_background(Some(BackgroundSource::from_path("/tmp/a.jpg")));
        f.controller.dispatch_pending();
        assert_eq!(f.shell.handler_count(), handlers);

        f.shell
            .set_background(Some(BackgroundSource::from_path("/tmp/b.jpg")));
        f.controller.dispatch_pending();
        assert_eq!(f.shell.handler_count(), handlers);
        assert_eq!(f.controller.overlay_count(), 1);
    }

    #[test]
    fn manager_gone_removes_overlay() {
        let mut f = fixture(2);
        f.controller.activate();
        let (_, first) = f.controller.overlays().next().unwrap();
        let manager = first.manager().id;

        f.shell.destroy_manager(manager);
        f.controller.dispatch_pending();

        assert_eq!(f.controller.overlay_count(), 1);
        assert_eq!(f.shell.live_surfaces(), 1);
        assert_eq!(f.controller.context().0.subscriber_count(), 1);

        f.controller.deactivate();
        assert_eq!(f.shell.handler_count(), 0);
    }

    #[test]
    fn monitors_changed_rebuilds() {
        let mut f = fixture(2);
        f.controller.activate();

        f.shell.set_monitors(vec![monitor(0, 0, 1280, 1024)]);
        f.controller.dispatch_pending();

        assert_eq!(f.controller.overlay_count(), 1);
        assert_eq!(f.shell.live_surfaces(), 1);
        assert_eq!(f.controller.context().0.subscriber_count(), 1);
        // 3 lifecycle handlers, changed and actor-destroyed for one overlay.
        assert_eq!(f.shell.handler_count(), 5);
    }

    #[test]
    fn startup_prepared_rebuilds() {
        let mut f = fixture(1);
        f.controller.activate();
        let before: Vec<_> = f.controller.overlays().map(|(k, _)| k).collect();

        f.shell.emit_startup_prepared();
        f.controller.dispatch_pending();

        let after: Vec<_> = f.controller.overlays().map(|(k, _)| k).collect();
        assert_eq!(after.len(), 1);
        assert_ne!(before, after);
    }

    #[test]
    fn work_area_change_rescales() {
        let mut f = fixture(1);
        f.controller.activate();

        f.shell.set_work_area(0, Rect::new(0, 32, 1000, 800));
        f.controller.dispatch_pending();

        let snapshot = &f.shell.snapshots()[0];
        assert_eq!(snapshot.work_area, Rect::new(0, 32, 1000, 800));
        assert_eq!(snapshot.logo.as_ref().unwrap().dimensions(), (100, 50));
        assert_eq!(snapshot.origin, (850, 700));
    }

    #[test]
    fn missing_monitor_index_is_clamped() {
        let f = fixture(2);
        assert_eq!(f.shell.work_area(5), Some(Rect::new(1920, 0, 1920, 1080)));
    }

    #[test]
    fn stale_events_are_ignored() {
        let mut f = fixture(1);
        f.controller.activate();
        let (key, _) = f.controller.overlays().next().unwrap();

        f.controller.rebuild();
        f.controller.mailbox().push(ControllerEvent::SettingChanged {
            overlay: key,
            key: LOGO_SIZE.to_owned(),
        });
        f.controller
            .mailbox()
            .push(ControllerEvent::BackgroundActorDestroyed(key, ActorDestroyed::ManagerGone));

        assert_eq!(f.controller.dispatch_pending(), 2);
        assert_eq!(f.controller.overlay_count(), 1);
    }

    #[test]
    fn modified_logo_file_is_reloaded() {
        let mut f = fixture(1);
        f.controller.activate();

        let file = f.controller.context().logo_file();
        write_png(Path::new(&file), 100, 100);
        f.controller.mailbox().push(ControllerEvent::LogoFileModified);
        f.controller.dispatch_pending();

        assert_eq!(
            f.controller.overlays().next().unwrap().1.logo_size(),
            Some((192, 192))
        );
    }

    #[test]
    fn logo_file_setting_reloads_from_disk() {
        let mut f = fixture(2);
        let late = f.dir.path().join("late.png");
        let late = late.to_str().unwrap();
        f.controller.context().set_logo_file(late).unwrap();
        f.controller.activate();
        assert!(f.shell.snapshots().iter().all(|s| s.logo.is_none()));

        write_png(Path::new(late), 100, 100);
        f.controller.context().set_logo_file(late).unwrap();
        f.controller.dispatch_pending();

        let sizes: Vec<_> = f.controller.overlays().map(|(_, o)| o.logo_size()).collect();
        assert_eq!(sizes, vec![Some((192, 192)); 2]);
    }

    #[test]
    fn switching_back_to_a_rewritten_logo_decodes_it_again() {
        let mut f = fixture(1);
        let first = f.controller.context().logo_file();
        let second = f.dir.path().join("second.png");
        write_png(&second, 50, 100);

        f.controller.activate();
        f.controller
            .context()
            .set_logo_file(second.to_str().unwrap())
            .unwrap();
        f.controller.dispatch_pending();
        assert_eq!(
            f.controller.overlays().next().unwrap().1.logo_size(),
            Some((192, 384))
        );

        write_png(Path::new(&first), 100, 100);
        f.controller.context().set_logo_file(&first).unwrap();
        f.controller.dispatch_pending();
        assert_eq!(
            f.controller.overlays().next().unwrap().1.logo_size(),
            Some((192, 192))
        );
    }

    #[test]
    fn unreadable_logo_leaves_overlay_empty() {
        let mut f = fixture(1);
        f.controller
            .context()
            .set_logo_file("/nonexistent/logo.png")
            .unwrap();
        f.controller.activate();

        assert_eq!(f.controller.overlay_count(), 1);
        assert!(f.shell.snapshots()[0].logo.is_none());
    }
}
