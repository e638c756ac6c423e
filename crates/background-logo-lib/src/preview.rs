// SPDX-License-Identifier: MPL-2.0

//! Thumbnail of the primary monitor's background with the logo on top, as
//! shown by the settings tool.

use crate::background::BackgroundSource;
use crate::logo::{self, TextureCache};
use crate::placement::{pixel_origin, scaled_logo_size, Rect};
use crate::scaler;
use crate::shell::Monitor;
use background_logo_config::desktop::DesktopContext;
use background_logo_config::{Context, LOGO_FILE, LOGO_KEYS, LOGO_SIZE};
use image::{Rgba, RgbaImage};

/// Width of the preview canvas. The height follows the monitor's aspect.
pub const PREVIEW_WIDTH: u32 = 400;

/// Shown when the background cannot be loaded.
const FALLBACK_FILL: Rgba<u8> = Rgba([0x30, 0x30, 0x38, 0xff]);

/// A composited preview and where the logo landed in it.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub image: RgbaImage,
    pub logo: Option<Rect>,
    /// Logo alpha in `[0, 1]`.
    pub alpha: f64,
}

#[derive(Debug)]
struct Thumbnail {
    size: (u32, u32),
    image: RgbaImage,
}

#[derive(Debug)]
pub struct PreviewRenderer {
    context: Context,
    desktop: DesktopContext,
    textures: TextureCache,
    monitor_width: Option<u32>,
    canvas: (u32, u32),
    background: Option<Thumbnail>,
    logo: Option<Option<Thumbnail>>,
    dirty: bool,
}

impl PreviewRenderer {
    #[must_use]
    pub fn new(context: Context, desktop: DesktopContext) -> Self {
        Self {
            context,
            desktop,
            textures: TextureCache::new(),
            monitor_width: None,
            canvas: (PREVIEW_WIDTH, PREVIEW_WIDTH * 9 / 16),
            background: None,
            logo: None,
            dirty: true,
        }
    }

    #[must_use]
    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas
    }

    #[must_use]
    pub fn needs_redraw(&self) -> bool {
        self.dirty
    }

    /// Size the canvas after `primary` and drop every thumbnail.
    pub fn on_viewport_changed(&mut self, primary: &Monitor) {
        let area = primary.work_area;
        if area.width == 0 || area.height == 0 {
            tracing::warn!(?area, "ignoring empty viewport");
            return;
        }

        let height = (u64::from(PREVIEW_WIDTH) * u64::from(area.height) / u64::from(area.width)) as u32;
        self.canvas = (PREVIEW_WIDTH, height.max(1));
        self.monitor_width = Some(area.width);
        self.background = None;
        self.logo = None;
        self.dirty = true;

        tracing::debug!(canvas = ?self.canvas, "preview viewport changed");
    }

    /// React to a logo setting change.
    pub fn invalidate(&mut self, key: &str) {
        if !LOGO_KEYS.contains(&key) {
            return;
        }

        if key == LOGO_FILE {
            self.textures.clear();
        }
        if key == LOGO_FILE || key == LOGO_SIZE {
            self.logo = None;
        }
        self.dirty = true;
    }

    pub fn on_background_changed(&mut self) {
        self.background = None;
        self.dirty = true;
    }

    /// Render at the current canvas size.
    pub fn draw(&mut self) -> PreviewFrame {
        let (width, height) = self.canvas;
        self.draw_preview(width, height)
    }

    /// Composite background and logo into a `width`×`height` frame.
    pub fn draw_preview(&mut self, width: u32, height: u32) -> PreviewFrame {
        let size = (width, height);

        if self.background.as_ref().is_none_or(|t| t.size != size) {
            self.background = Some(Thumbnail {
                size,
                image: self.background_thumbnail(width, height),
            });
        }
        if self
            .logo
            .as_ref()
            .is_none_or(|t| t.as_ref().is_some_and(|t| t.size != size))
        {
            self.logo = Some(self.logo_thumbnail(width, height));
        }

        let mut image = self
            .background
            .as_ref()
            .map(|t| t.image.clone())
            .unwrap_or_else(|| RgbaImage::from_pixel(width, height, FALLBACK_FILL));

        let config = self.context.logo_config();
        let opacity = config.logo_opacity;
        let alpha = f64::from(opacity) / 255.0;

        let logo = self.logo.as_ref().and_then(Option::as_ref).map(|logo| {
            let dimensions = logo.image.dimensions();
            let monitor_width = self.monitor_width.unwrap_or(width).max(1);
            let border = (f64::from(config.logo_border) * f64::from(width)
                / f64::from(monitor_width))
            .round() as u32;

            let (x, y) = pixel_origin(
                config.logo_position,
                Rect::new(0, 0, width, height),
                dimensions,
                border,
            );
            compose(&mut image, &logo.image, x, y, opacity);
            Rect::new(x, y, dimensions.0, dimensions.1)
        });

        self.dirty = false;
        PreviewFrame { image, logo, alpha }
    }

    fn background_thumbnail(&self, width: u32, height: u32) -> RgbaImage {
        let uri = self.desktop.picture_uri();
        let Some(source) = BackgroundSource::from_uri(&uri) else {
            tracing::warn!(%uri, "background is not a local file");
            return RgbaImage::from_pixel(width, height, FALLBACK_FILL);
        };

        let loaded = source
            .current_image(chrono::Utc::now(), width, height)
            .map_err(|why| why.to_string())
            .and_then(|path| logo::load_image(&path).map_err(|why| why.to_string()));

        match loaded.map(|image| scaler::resize(&image, width, height)) {
            Ok(Some(image)) => image,
            Ok(None) => RgbaImage::from_pixel(width, height, FALLBACK_FILL),
            Err(why) => {
                tracing::warn!(%uri, %why, "failed to load background");
                RgbaImage::from_pixel(width, height, FALLBACK_FILL)
            }
        }
    }

    fn logo_thumbnail(&mut self, width: u32, height: u32) -> Option<Thumbnail> {
        let source = self.textures.load(&self.context.logo_file())?;
        let (w, h) = scaled_logo_size(source.dimensions(), width, self.context.logo_size())?;
        scaler::resize(&source, w, h).map(|image| Thumbnail {
            size: (width, height),
            image,
        })
    }
}

/// Blend `logo` onto `canvas` at `(x, y)` with its alpha scaled by `opacity`.
pub(crate) fn compose(canvas: &mut RgbaImage, logo: &RgbaImage, x: i32, y: i32, opacity: u8) {
    let mut logo = logo.clone();
    for pixel in logo.pixels_mut() {
        pixel.0[3] = ((u16::from(pixel.0[3]) * u16::from(opacity) + 127) / 255) as u8;
    }
    image::imageops::overlay(canvas, &logo, i64::from(x), i64::from(y));
}
