// SPDX-License-Identifier: MPL-2.0

//! Background identity: turning configured URIs into local files and
//! deciding whether two backgrounds are the same picture.

use crate::slideshow::{Slideshow, SlideshowError};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// A desktop background backed by a local file (image or slideshow XML).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundSource {
    path: PathBuf,
}

impl BackgroundSource {
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Accepts `file://` URIs, absolute paths and paths relative to the
    /// working directory. Other URI schemes have no local identity.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return None;
        }

        if uri.contains("://") {
            let parsed = url::Url::parse(uri).ok()?;
            if parsed.scheme() != "file" {
                tracing::debug!(uri, "background is not a local file");
                return None;
            }
            return parsed.to_file_path().ok().map(Self::from_path);
        }

        let path = Path::new(uri);
        if path.is_absolute() {
            Some(Self::from_path(path))
        } else {
            std::env::current_dir()
                .ok()
                .map(|cwd| Self::from_path(cwd.join(path)))
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn is_slideshow(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
    }

    /// Whether both refer to the same file. Uses device and inode when both
    /// files can be inspected, the path text otherwise.
    #[must_use]
    pub fn same_file(&self, other: &Self) -> bool {
        match (file_identity(&self.path), file_identity(&other.path)) {
            (Some(a), Some(b)) => a == b,
            _ => self.path == other.path,
        }
    }

    /// The image currently shown: the file itself, or the active frame of a
    /// slideshow.
    pub fn current_image(
        &self,
        now: DateTime<Utc>,
        width: u32,
        height: u32,
    ) -> Result<PathBuf, SlideshowError> {
        if !self.is_slideshow() {
            return Ok(self.path.clone());
        }

        Slideshow::load(&self.path)?
            .current_slide(now, width, height)
            .map(|slide| slide.file)
            .ok_or(SlideshowError::Empty)
    }
}

#[cfg(unix)]
fn file_identity(path: &Path) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;

    std::fs::metadata(path).ok().map(|m| (m.dev(), m.ino()))
}

#[cfg(not(unix))]
fn file_identity(_path: &Path) -> Option<(u64, u64)> {
    None
}

/// Whether the logo belongs on a background. `always_show` wins; otherwise
/// the current background must be the schema's default picture.
#[must_use]
pub fn logo_visible(
    always_show: bool,
    current: Option<&BackgroundSource>,
    default: Option<&BackgroundSource>,
) -> bool {
    if always_show {
        return true;
    }

    match (current, default) {
        (Some(current), Some(default)) => current.same_file(default),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_uris_and_paths() {
        let source = BackgroundSource::from_uri("file:///usr/share/backgrounds/a%20b.png").unwrap();
        assert_eq!(source.path(), Path::new("/usr/share/backgrounds/a b.png"));

        let plain = BackgroundSource::from_uri("/tmp/x.xml").unwrap();
        assert!(plain.is_slideshow());

        let relative = BackgroundSource::from_uri("wall.png").unwrap();
        assert!(relative.path().is_absolute());

        assert_eq!(BackgroundSource::from_uri("https://example.com/a.png"), None);
        assert_eq!(BackgroundSource::from_uri("  "), None);
    }

    #[cfg(unix)]
    #[test]
    fn identity_sees_through_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.png");
        let link = dir.path().join("link.png");
        std::fs::write(&real, b"png").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let a = BackgroundSource::from_path(&real);
        let b = BackgroundSource::from_path(&link);
        assert!(a.same_file(&b));
        assert!(!a.same_file(&BackgroundSource::from_path(dir.path().join("other.png"))));
    }

    #[test]
    fn missing_files_compare_by_path() {
        let a = BackgroundSource::from_path("/nonexistent/default.png");
        assert!(a.same_file(&BackgroundSource::from_path("/nonexistent/default.png")));
        assert!(!a.same_file(&BackgroundSource::from_path("/nonexistent/custom.png")));
    }

    #[test]
    fn visibility_rule() {
        let default = BackgroundSource::from_path("/nonexistent/default.png");
        let custom = BackgroundSource::from_path("/nonexistent/custom.png");

        for current in [None, Some(&default), Some(&custom)] {
            assert!(logo_visible(true, current, Some(&default)));
            assert!(logo_visible(true, current, None));
        }

        assert!(logo_visible(false, Some(&default), Some(&default)));
        assert!(!logo_visible(false, Some(&custom), Some(&default)));
        assert!(!logo_visible(false, None, Some(&default)));
        assert!(!logo_visible(false, Some(&default), None));
    }

    #[test]
    fn current_image_resolves_slideshow_frame() {
        let dir = tempfile::tempdir().unwrap();
        let xml = dir.path().join("show.xml");
        std::fs::write(
            &xml,
            "<background><static><duration>60</duration><file>frame.png</file></static></background>",
        )
        .unwrap();

        let source = BackgroundSource::from_path(&xml);
        assert_eq!(
            source.current_image(Utc::now(), 100, 100).unwrap(),
            dir.path().join("frame.png")
        );

        let still = BackgroundSource::from_path("/nonexistent/still.png");
        assert_eq!(
            still.current_image(Utc::now(), 100, 100).unwrap(),
            PathBuf::from("/nonexistent/still.png")
        );
    }
}
