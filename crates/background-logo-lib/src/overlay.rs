// SPDX-License-Identifier: MPL-2.0

//! One logo overlay bound to a background manager and its monitor.

use crate::background::{logo_visible, BackgroundSource};
use crate::events::{ControllerEvent, Mailbox};
use crate::fade::{Fade, FADE_ANIMATION_TIME};
use crate::logo::TextureCache;
use crate::placement::{pixel_origin, scaled_logo_size, Rect};
use crate::scaler;
use crate::shell::{ActorDestroyed, ManagerInfo, OverlaySurface, Shell};
use crate::signal::HandlerId;
use background_logo_config::desktop::DesktopContext;
use background_logo_config::{
    Context, KeyFilter, LogoPosition, SubscriptionId, ALWAYS_SHOW, LOGO_BORDER, LOGO_FILE,
    LOGO_OPACITY, LOGO_POSITION, LOGO_SIZE,
};
use image::RgbaImage;
use std::rc::Rc;
use std::time::Instant;

slotmap::new_key_type! {
    /// Arena key of an overlay owned by the controller.
    pub struct OverlayKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPhase {
    /// Created, visibility not evaluated yet.
    Building,
    Visible,
    Hidden,
}

/// Collaborators an overlay reads while handling an event.
pub(crate) struct OverlayEnv<'a> {
    pub shell: &'a dyn Shell,
    pub context: &'a Context,
    pub desktop: &'a DesktopContext,
    pub textures: &'a mut TextureCache,
}

pub struct BackgroundLogo {
    key: OverlayKey,
    manager: ManagerInfo,
    work_area: Rect,
    surface: Option<Box<dyn OverlaySurface>>,
    logo_setting: String,
    source: Option<Rc<RgbaImage>>,
    scaled: Option<Rc<RgbaImage>>,
    position: LogoPosition,
    border: u32,
    origin: (i32, i32),
    opacity: u8,
    fade: Option<Fade>,
    phase: OverlayPhase,
    settings_subscription: Option<SubscriptionId>,
    changed_handler: Option<HandlerId>,
    actor_handler: Option<HandlerId>,
}

impl BackgroundLogo {
    pub(crate) fn new(
        key: OverlayKey,
        manager: ManagerInfo,
        env: &mut OverlayEnv<'_>,
        mailbox: &Mailbox,
    ) -> Self {
        let work_area = env
            .shell
            .work_area(manager.monitor_index)
            .unwrap_or_default();

        let mut surface = env.shell.create_overlay(manager.id);
        match surface.as_mut() {
            Some(surface) => {
                surface.set_work_area(work_area);
                surface.set_opacity(0);
            }
            None => tracing::warn!(manager = ?manager.id, "no surface for overlay"),
        }

        let settings_subscription = {
            let mailbox = mailbox.clone();
            env.context.0.subscribe(KeyFilter::Any, move |changed| {
                mailbox.push(ControllerEvent::SettingChanged {
                    overlay: key,
                    key: changed.to_owned(),
                });
            })
        };

        let changed_handler = {
            let mailbox = mailbox.clone();
            env.shell.connect_background_changed(
                manager.id,
                Box::new(move || mailbox.push(ControllerEvent::BackgroundChanged(key))),
            )
        };

        let mut overlay = Self {
            key,
            manager,
            work_area,
            surface,
            logo_setting: String::new(),
            source: None,
            scaled: None,
            position: LogoPosition::default(),
            border: 0,
            origin: (0, 0),
            opacity: 0,
            fade: None,
            phase: OverlayPhase::Building,
            settings_subscription: Some(settings_subscription),
            changed_handler,
            actor_handler: None,
        };

        overlay.watch_background_actor(env.shell, mailbox);
        overlay.update_logo(env);
        overlay.update_position(env.context);
        overlay.update_border(env.context);
        overlay.update_visibility(env);

        tracing::debug!(
            manager = ?manager.id,
            monitor = manager.monitor_index,
            ?work_area,
            phase = ?overlay.phase,
            "overlay created"
        );

        overlay
    }

    fn watch_background_actor(&mut self, shell: &dyn Shell, mailbox: &Mailbox) {
        let key = self.key;
        let mailbox = mailbox.clone();
        self.actor_handler = shell.connect_background_actor_destroyed(
            self.manager.id,
            Box::new(move |reason| {
                mailbox.push(ControllerEvent::BackgroundActorDestroyed(key, reason));
            }),
        );
    }

    #[must_use]
    pub fn manager(&self) -> ManagerInfo {
        self.manager
    }

    #[must_use]
    pub fn phase(&self) -> OverlayPhase {
        self.phase
    }

    #[must_use]
    pub fn opacity(&self) -> u8 {
        self.opacity
    }

    #[must_use]
    pub fn work_area(&self) -> Rect {
        self.work_area
    }

    #[must_use]
    pub fn logo_size(&self) -> Option<(u32, u32)> {
        self.scaled.as_ref().map(|logo| logo.dimensions())
    }

    #[must_use]
    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.fade.is_some()
    }

    pub(crate) fn on_setting_changed(&mut self, key: &str, env: &mut OverlayEnv<'_>) {
        match key {
            LOGO_FILE => self.update_logo(env),
            LOGO_SIZE => self.update_scale(env.context),
            LOGO_POSITION => self.update_position(env.context),
            LOGO_BORDER => self.update_border(env.context),
            LOGO_OPACITY => self.update_opacity(env.context),
            ALWAYS_SHOW => self.update_visibility(env),
            other => tracing::trace!(key = other, "ignoring setting"),
        }
    }

    /// Returns `false` when the manager is gone and the overlay must be
    /// destroyed.
    pub(crate) fn on_background_actor_destroyed(
        &mut self,
        reason: ActorDestroyed,
        shell: &dyn Shell,
        mailbox: &Mailbox,
    ) -> bool {
        // The actor's handlers die with it.
        self.actor_handler = None;

        match reason {
            ActorDestroyed::Swapped => {
                self.watch_background_actor(shell, mailbox);
                true
            }
            ActorDestroyed::ManagerGone => {
                self.changed_handler = None;
                false
            }
        }
    }

    /// Reload the logo, from the texture cache when it still holds the file.
    pub(crate) fn update_logo(&mut self, env: &mut OverlayEnv<'_>) {
        self.logo_setting = env.context.logo_file();
        self.source = env.textures.load(&self.logo_setting);
        self.scaled = None;
        self.update_scale(env.context);
    }

    fn update_scale(&mut self, context: &Context) {
        self.scaled = self.source.as_ref().and_then(|source| {
            let (width, height) =
                scaled_logo_size(source.dimensions(), self.work_area.width, context.logo_size())?;
            scaler::resize(source, width, height).map(Rc::new)
        });

        if let Some(surface) = self.surface.as_mut() {
            surface.set_logo(self.scaled.clone());
        }
        self.relayout();
    }

    fn update_position(&mut self, context: &Context) {
        self.position = context.logo_position();
        self.relayout();
    }

    fn update_border(&mut self, context: &Context) {
        self.border = context.logo_border();
        self.relayout();
    }

    pub(crate) fn set_work_area(&mut self, area: Rect, context: &Context) {
        if area == self.work_area {
            return;
        }

        self.work_area = area;
        if let Some(surface) = self.surface.as_mut() {
            surface.set_work_area(area);
        }
        self.update_scale(context);
    }

    fn relayout(&mut self) {
        let Some(size) = self.logo_size() else {
            return;
        };

        self.origin = pixel_origin(self.position, self.work_area, size, self.border);
        if let Some(surface) = self.surface.as_mut() {
            surface.set_logo_origin(self.origin.0, self.origin.1);
        }
    }

    pub(crate) fn update_visibility(&mut self, env: &OverlayEnv<'_>) {
        let current = env.shell.current_background(self.manager.id);
        let default = BackgroundSource::from_uri(&env.desktop.default_picture_uri());
        let visible = logo_visible(env.context.always_show(), current.as_ref(), default.as_ref());

        self.phase = if visible {
            OverlayPhase::Visible
        } else {
            OverlayPhase::Hidden
        };

        let target = if visible { env.context.logo_opacity() } else { 0 };
        self.fade_to(target);
    }

    fn fade_to(&mut self, target: u8) {
        let heading_to = self.fade.as_ref().map_or(self.opacity, Fade::target);
        if heading_to != target {
            self.fade = Some(Fade::new(self.opacity, target, FADE_ANIMATION_TIME));
        }
    }

    /// Opacity follows the setting directly while visible.
    fn update_opacity(&mut self, context: &Context) {
        if self.phase != OverlayPhase::Visible {
            return;
        }

        let target = context.logo_opacity();
        match self.fade.as_mut() {
            Some(fade) => fade.retarget(target),
            None => self.apply_opacity(target),
        }
    }

    fn apply_opacity(&mut self, opacity: u8) {
        self.opacity = opacity;
        if let Some(surface) = self.surface.as_mut() {
            surface.set_opacity(opacity);
        }
    }

    /// Advance the running fade. Returns whether it is still running.
    pub(crate) fn tick(&mut self, now: Instant) -> bool {
        let Some(fade) = self.fade.as_mut() else {
            return false;
        };

        let value = fade.sample(now);
        let finished = fade.is_finished(now);
        self.apply_opacity(value);
        if finished {
            self.fade = None;
        }
        !finished
    }

    /// Release subscriptions still held and destroy the surface.
    pub(crate) fn destroy(mut self, shell: &dyn Shell, context: &Context) {
        if let Some(id) = self.settings_subscription.take() {
            context.0.unsubscribe(id);
        }
        for id in [self.changed_handler.take(), self.actor_handler.take()]
            .into_iter()
            .flatten()
        {
            shell.disconnect(id);
        }
        if let Some(surface) = self.surface.take() {
            surface.destroy();
        }

        tracing::debug!(manager = ?self.manager.id, "overlay destroyed");
    }
}
