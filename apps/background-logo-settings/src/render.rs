// SPDX-License-Identifier: MPL-2.0

//! Preview rendering, once or every time the settings change.

use crate::commands::Stores;
use background_logo_config::desktop;
use background_logo_lib::{Monitor, PreviewFrame, PreviewRenderer, Rect};
use cosmic_config::calloop::ConfigWatchSource;
use eyre::{eyre, WrapErr};
use std::path::{Path, PathBuf};

fn renderer(stores: &Stores, screen: (u32, u32)) -> PreviewRenderer {
    let mut renderer = PreviewRenderer::new(stores.logo.clone(), stores.desktop.clone());
    renderer.on_viewport_changed(&Monitor {
        index: 0,
        work_area: Rect::new(0, 0, screen.0, screen.1),
        primary: true,
    });
    renderer
}

fn save(frame: &PreviewFrame, output: &Path) -> eyre::Result<()> {
    frame
        .image
        .save(output)
        .wrap_err_with(|| format!("failed to write {}", output.display()))?;

    tracing::info!(
        output = %output.display(),
        logo = ?frame.logo,
        alpha = frame.alpha,
        "preview written"
    );
    Ok(())
}

/// Render one preview of a `screen` sized monitor into `output`.
pub fn render(stores: &Stores, screen: (u32, u32), output: &Path) -> eyre::Result<PreviewFrame> {
    let frame = renderer(stores, screen).draw();
    save(&frame, output)?;
    Ok(frame)
}

struct WatchState {
    renderer: PreviewRenderer,
    output: PathBuf,
}

impl WatchState {
    fn redraw(&mut self) {
        if !self.renderer.needs_redraw() {
            return;
        }

        let frame = self.renderer.draw();
        if let Err(why) = save(&frame, &self.output) {
            tracing::error!(?why, "failed to save preview");
        }
    }
}

/// Re-render `output` whenever the logo or desktop settings change.
pub fn watch(stores: &Stores, screen: (u32, u32), output: PathBuf) -> eyre::Result<()> {
    let mut event_loop: calloop::EventLoop<'static, WatchState> =
        calloop::EventLoop::try_new().wrap_err("failed to create event loop")?;

    let logo_config = stores
        .logo
        .0
        .cosmic_config()
        .ok_or_else(|| eyre!("logo settings are not persistent"))?;
    let source = ConfigWatchSource::new(logo_config)
        .map_err(|err| eyre!("failed to create ConfigWatchSource: {err:?}"))?;
    event_loop
        .handle()
        .insert_source(source, |(_config, keys), (), state| {
            for key in &keys {
                tracing::debug!(%key, "logo setting changed");
                state.renderer.invalidate(key);
            }
            state.redraw();
        })
        .map_err(|err| eyre!("failed to insert config watching source: {err}"))?;

    if let Some(desktop_config) = stores.desktop.0.cosmic_config() {
        let source = ConfigWatchSource::new(desktop_config)
            .map_err(|err| eyre!("failed to create ConfigWatchSource: {err:?}"))?;
        event_loop
            .handle()
            .insert_source(source, |(_config, keys), (), state| {
                if keys.iter().any(|key| key == desktop::PICTURE_URI) {
                    state.renderer.on_background_changed();
                    state.redraw();
                }
            })
            .map_err(|err| eyre!("failed to insert config watching source: {err}"))?;
    }

    let mut state = WatchState {
        renderer: renderer(stores, screen),
        output,
    };
    state.redraw();

    tracing::info!(output = %state.output.display(), "watching settings");
    loop {
        event_loop.dispatch(None, &mut state)?;
    }
}
