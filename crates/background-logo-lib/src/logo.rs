// SPDX-License-Identifier: MPL-2.0

//! Loading logo images, with a cache shared by every overlay.

use image::RgbaImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, thiserror::Error)]
pub enum LogoError {
    #[error("logo setting {0:?} does not name a local file")]
    NotLocal(String),

    #[error("failed to load {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Resolve the `logo-file` setting (path or `file://` URI) to a path.
pub fn logo_path(setting: &str) -> Result<PathBuf, LogoError> {
    crate::background::BackgroundSource::from_uri(setting)
        .map(|source| source.path().to_owned())
        .ok_or_else(|| LogoError::NotLocal(setting.to_owned()))
}

pub fn load_image(path: &Path) -> Result<RgbaImage, LogoError> {
    image::open(path)
        .map(|image| image.to_rgba8())
        .map_err(|source| LogoError::Image {
            path: path.to_owned(),
            source,
        })
}

/// Decoded images keyed by path. Failures are cached too, so a broken file
/// is reported once until it is evicted.
#[derive(Debug, Default)]
pub struct TextureCache {
    entries: HashMap<PathBuf, Option<Rc<RgbaImage>>>,
}

impl TextureCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, setting: &str) -> Option<Rc<RgbaImage>> {
        let path = match logo_path(setting) {
            Ok(path) => path,
            Err(why) => {
                tracing::warn!(%why, "logo not loaded");
                return None;
            }
        };

        self.entries
            .entry(path)
            .or_insert_with_key(|path| match load_image(path) {
                Ok(image) => {
                    tracing::debug!(path = %path.display(), width = image.width(), height = image.height(), "loaded logo");
                    Some(Rc::new(image))
                }
                Err(why) => {
                    tracing::error!(%why, "logo image unavailable");
                    None
                }
            })
            .clone()
    }

    /// Forget `setting`'s image so the next load reads the file again.
    pub fn evict(&mut self, setting: &str) {
        if let Ok(path) = logo_path(setting) {
            self.entries.remove(&path);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgba;

    pub(crate) fn write_png(path: &Path, width: u32, height: u32) {
        RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn cache_shares_and_evicts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        write_png(&path, 40, 20);
        let setting = path.to_str().unwrap();

        let mut cache = TextureCache::new();
        let first = cache.load(setting).unwrap();
        let second = cache.load(setting).unwrap();
        assert!(Rc::ptr_eq(&first, &second));

        write_png(&path, 10, 10);
        assert_eq!(cache.load(setting).unwrap().dimensions(), (40, 20));
        cache.evict(setting);
        assert_eq!(cache.load(setting).unwrap().dimensions(), (10, 10));
    }

    #[test]
    fn missing_file_is_cached_as_failure() {
        let mut cache = TextureCache::new();
        assert!(cache.load("/nonexistent/logo.png").is_none());
        assert_eq!(cache.len(), 1);
        assert!(cache.load("https://example.com/logo.png").is_none());
        assert_eq!(cache.len(), 1);
    }
}
