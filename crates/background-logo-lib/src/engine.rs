// SPDX-License-Identifier: MPL-2.0

use crate::background::BackgroundSource;
use crate::controller::OverlayController;
use crate::events::ControllerEvent;
use crate::file_watch::LogoWatcher;
use crate::headless::{HeadlessShell, OverlaySnapshot};
use crate::logo;
use crate::placement::Rect;
use crate::preview::compose;
use crate::shell::Monitor;
use background_logo_config::desktop::{self, DesktopContext};
use background_logo_config::{Context, LOGO_FILE};
use calloop::timer::{TimeoutAction, Timer};
use cosmic_config::calloop::ConfigWatchSource;
use eyre::{eyre, WrapErr};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Timer period while a fade runs.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Timer period while idle.
const IDLE_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub monitors: Vec<Monitor>,
    /// Also create overview background managers.
    pub overview: bool,
    /// Write each overlay as a PNG here whenever it settles.
    pub dump_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            monitors: vec![Monitor {
                index: 0,
                work_area: Rect::new(0, 0, 1920, 1080),
                primary: true,
            }],
            overview: false,
            dump_dir: None,
        }
    }
}

struct EngineState {
    shell: Rc<HeadlessShell>,
    controller: OverlayController,
    desktop: DesktopContext,
    logo_watcher: Option<LogoWatcher>,
    dump_dir: Option<PathBuf>,
    animating: bool,
    dirty: bool,
}

impl EngineState {
    fn sync_background(&mut self) {
        let uri = self.desktop.picture_uri();
        let source = BackgroundSource::from_uri(&uri);
        if source.is_none() {
            tracing::warn!(%uri, "background is not a local file");
        }
        self.shell.set_background(source);
    }

    fn watch_logo(&mut self) {
        let setting = self.controller.context().logo_file();
        match (logo::logo_path(&setting), self.logo_watcher.as_mut()) {
            (Ok(path), Some(watcher)) => watcher.watch(&path),
            (Err(why), _) => tracing::warn!(%why, "not watching logo"),
            (Ok(_), None) => {}
        }
    }

    fn dispatch(&mut self) {
        if self.controller.dispatch_pending() > 0 {
            self.dirty = true;
        }
    }

    fn dump(&mut self) {
        let Some(dir) = self.dump_dir.as_deref() else {
            return;
        };

        for snapshot in self.shell.snapshots() {
            if let Err(why) = dump_snapshot(dir, &snapshot) {
                tracing::error!(?why, manager = ?snapshot.manager, "failed to dump overlay");
            }
        }
    }
}

#[derive(Debug)]
pub struct LogoEngine;

impl LogoEngine {
    /// Run until the event loop fails.
    pub fn run(config: EngineConfig) -> eyre::Result<()> {
        let mut event_loop: calloop::EventLoop<'static, EngineState> =
            calloop::EventLoop::try_new().wrap_err("failed to create event loop")?;

        let context = background_logo_config::context().unwrap_or_else(|why| {
            tracing::error!(?why, "Config file error, falling back to defaults");
            Context::in_memory()
        });

        let desktop = desktop::context().unwrap_or_else(|why| {
            tracing::error!(?why, "Desktop config error, falling back to defaults");
            DesktopContext::in_memory()
        });

        if let Some(config) = context.0.cosmic_config() {
            let source = ConfigWatchSource::new(config)
                .map_err(|err| eyre!("failed to create ConfigWatchSource: {err:?}"))?;

            event_loop
                .handle()
                .insert_source(source, |(_config, keys), (), state| {
                    tracing::debug!(?keys, "logo settings changed");
                    state.controller.context().0.notify(&keys);

                    if keys.iter().any(|key| key == LOGO_FILE) {
                        state.watch_logo();
                    }
                    state.dispatch();
                })
                .map_err(|err| eyre!("failed to insert config watching source: {err}"))?;
        }

        if let Some(config) = desktop.0.cosmic_config() {
            let source = ConfigWatchSource::new(config)
                .map_err(|err| eyre!("failed to create ConfigWatchSource: {err:?}"))?;

            event_loop
                .handle()
                .insert_source(source, |(_config, keys), (), state| {
                    if keys.iter().any(|key| key == desktop::PICTURE_URI) {
                        tracing::debug!("desktop background changed");
                        state.desktop.0.notify(&keys);
                        state.sync_background();
                        state.dispatch();
                    }
                })
                .map_err(|err| eyre!("failed to insert config watching source: {err}"))?;
        }

        let logo_watcher = match LogoWatcher::new(&event_loop.handle(), |state: &mut EngineState| {
            state
                .controller
                .mailbox()
                .push(ControllerEvent::LogoFileModified);
            state.dispatch();
        }) {
            Ok(watcher) => Some(watcher),
            Err(why) => {
                tracing::warn!(?why, "logo file changes will not be picked up");
                None
            }
        };

        event_loop
            .handle()
            .insert_source(Timer::immediate(), |_, _, state| {
                let running = state.controller.tick(Instant::now());
                state.dispatch();

                if state.animating && !running {
                    state.dirty = true;
                }
                state.animating = running;

                if state.dirty && !running {
                    state.dump();
                    state.dirty = false;
                }

                TimeoutAction::ToDuration(if running { FRAME_INTERVAL } else { IDLE_INTERVAL })
            })
            .map_err(|err| eyre!("failed to insert frame timer: {err}"))?;

        let shell = Rc::new(if config.overview {
            HeadlessShell::with_overview(config.monitors)
        } else {
            HeadlessShell::new(config.monitors)
        });

        let controller = OverlayController::new(shell.clone(), context, desktop.clone());

        let mut state = EngineState {
            shell,
            controller,
            desktop,
            logo_watcher,
            dump_dir: config.dump_dir,
            animating: false,
            dirty: true,
        };

        if let Some(dir) = state.dump_dir.as_deref() {
            std::fs::create_dir_all(dir)
                .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
        }

        state.sync_background();
        state.watch_logo();
        state.controller.activate();
        tracing::info!(
            overlays = state.controller.overlay_count(),
            "background logo running"
        );

        loop {
            event_loop.dispatch(None, &mut state)?;
        }
    }
}

/// Render one overlay surface the size of its work area.
fn dump_snapshot(dir: &Path, snapshot: &OverlaySnapshot) -> eyre::Result<()> {
    let area = snapshot.work_area;
    let mut canvas = RgbaImage::new(area.width.max(1), area.height.max(1));
    if let Some(logo) = snapshot.logo.as_deref() {
        compose(&mut canvas, logo, snapshot.origin.0, snapshot.origin.1, snapshot.opacity);
    }

    let path = dir.join(format!("overlay-{}.png", snapshot.manager.0));
    canvas
        .save(&path)
        .wrap_err_with(|| format!("failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), opacity = snapshot.opacity, "dumped overlay");
    Ok(())
}
