// SPDX-License-Identifier: MPL-2.0

//! Timed slideshow backgrounds described by an XML document:
//!
//! ```xml
//! <background>
//!   <starttime><year>2024</year><month>1</month><day>1</day>
//!     <hour>7</hour><minute>0</minute><second>0</second></starttime>
//!   <static><duration>3600.0</duration><file>morning.png</file></static>
//!   <transition type="overlay"><duration>5.0</duration>
//!     <from>morning.png</from><to>night.png</to></transition>
//!   <static><duration>3600.0</duration>
//!     <file><size width="1920" height="1080">night-1080.png</size>
//!           <size width="3840" height="2160">night-2160.png</size></file>
//!   </static>
//! </background>
//! ```

use chrono::{DateTime, Local, TimeZone, Utc};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SlideshowError {
    #[error("failed to read slideshow {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed slideshow XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("slideshow has no <background> root")]
    NotASlideshow,

    #[error("slideshow contains no slides")]
    Empty,
}

/// One image, optionally tagged with the resolution it was made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizedFile {
    pub size: Option<(u32, u32)>,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Slide {
    Static {
        duration: f64,
        files: Vec<SizedFile>,
    },
    Transition {
        duration: f64,
        from: Vec<SizedFile>,
        to: Vec<SizedFile>,
    },
}

impl Slide {
    fn duration(&self) -> f64 {
        match self {
            Self::Static { duration, .. } | Self::Transition { duration, .. } => *duration,
        }
    }
}

/// Slide active at a given instant.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentSlide {
    /// Position within the slide, `0.0..1.0`.
    pub progress: f64,
    pub duration: f64,
    /// `true` for static slides.
    pub is_fixed: bool,
    pub file: PathBuf,
    /// Destination of a transition.
    pub next: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slideshow {
    start: DateTime<Utc>,
    slides: Vec<Slide>,
}

impl Slideshow {
    pub fn load(path: &Path) -> Result<Self, SlideshowError> {
        let text = std::fs::read_to_string(path).map_err(|source| SlideshowError::Io {
            path: path.to_owned(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("/"));
        Self::parse(&text, base)
    }

    /// Parse slideshow XML. Relative image paths resolve against `base`.
    pub fn parse(text: &str, base: &Path) -> Result<Self, SlideshowError> {
        let document = roxmltree::Document::parse(text)?;
        let root = document.root_element();
        if !root.has_tag_name("background") {
            return Err(SlideshowError::NotASlideshow);
        }

        let mut start = DateTime::<Utc>::UNIX_EPOCH;
        let mut slides = Vec::new();

        for node in root.children().filter(roxmltree::Node::is_element) {
            match node.tag_name().name() {
                "starttime" => {
                    if let Some(parsed) = parse_start_time(node) {
                        start = parsed;
                    }
                }
                "static" => slides.push(Slide::Static {
                    duration: child_number(node, "duration").unwrap_or(0.0),
                    files: child_files(node, "file", base),
                }),
                "transition" => slides.push(Slide::Transition {
                    duration: child_number(node, "duration").unwrap_or(0.0),
                    from: child_files(node, "from", base),
                    to: child_files(node, "to", base),
                }),
                other => tracing::trace!(element = other, "ignoring slideshow element"),
            }
        }

        if slides.is_empty() {
            return Err(SlideshowError::Empty);
        }

        Ok(Self { start, slides })
    }

    #[must_use]
    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    /// The slide showing at `now`, with image variants picked for a
    /// `width`×`height` target. `None` when no slide has a usable file.
    #[must_use]
    pub fn current_slide(&self, now: DateTime<Utc>, width: u32, height: u32) -> Option<CurrentSlide> {
        let total: f64 = self.slides.iter().map(Slide::duration).sum();
        let elapsed = (now - self.start).num_milliseconds().max(0) as f64 / 1000.0;
        let mut offset = if total > 0.0 { elapsed % total } else { 0.0 };

        let slide = self
            .slides
            .iter()
            .find(|slide| {
                if offset < slide.duration() {
                    true
                } else {
                    offset -= slide.duration();
                    false
                }
            })
            .or_else(|| self.slides.first())?;

        let duration = slide.duration();
        let progress = if duration > 0.0 {
            (offset / duration).min(1.0)
        } else {
            0.0
        };

        match slide {
            Slide::Static { files, .. } => Some(CurrentSlide {
                progress,
                duration,
                is_fixed: true,
                file: best_fit(files, width, height)?,
                next: None,
            }),
            Slide::Transition { from, to, .. } => Some(CurrentSlide {
                progress,
                duration,
                is_fixed: false,
                file: best_fit(from, width, height)?,
                next: best_fit(to, width, height),
            }),
        }
    }
}

fn parse_start_time(node: roxmltree::Node<'_, '_>) -> Option<DateTime<Utc>> {
    let field = |name: &str| child_number(node, name).map(|v| v as u32);
    let year = child_number(node, "year")? as i32;

    Local
        .with_ymd_and_hms(
            year,
            field("month")?,
            field("day")?,
            field("hour").unwrap_or(0),
            field("minute").unwrap_or(0),
            field("second").unwrap_or(0),
        )
        .earliest()
        .map(|time| time.with_timezone(&Utc))
}

fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children().find(|c| c.has_tag_name(name))
}

fn child_number(node: roxmltree::Node<'_, '_>, name: &str) -> Option<f64> {
    child(node, name)?.text()?.trim().parse().ok()
}

fn child_files(node: roxmltree::Node<'_, '_>, name: &str, base: &Path) -> Vec<SizedFile> {
    let Some(element) = child(node, name) else {
        return Vec::new();
    };

    let sized: Vec<SizedFile> = element
        .children()
        .filter(|c| c.has_tag_name("size"))
        .filter_map(|size| {
            let width = size.attribute("width")?.parse().ok()?;
            let height = size.attribute("height")?.parse().ok()?;
            Some(SizedFile {
                size: Some((width, height)),
                path: resolve(base, size.text()?),
            })
        })
        .collect();

    if !sized.is_empty() {
        return sized;
    }

    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| {
            vec![SizedFile {
                size: None,
                path: resolve(base, text),
            }]
        })
        .unwrap_or_default()
}

fn resolve(base: &Path, text: &str) -> PathBuf {
    let path = Path::new(text.trim());
    if path.is_absolute() {
        path.to_owned()
    } else {
        base.join(path)
    }
}

/// Smallest variant covering the target, else the largest one. Unsized
/// entries only win when nothing is sized.
fn best_fit(files: &[SizedFile], width: u32, height: u32) -> Option<PathBuf> {
    let area = |(w, h): (u32, u32)| u64::from(w) * u64::from(h);

    let covering = files
        .iter()
        .filter_map(|f| f.size.map(|size| (size, f)))
        .filter(|((w, h), _)| *w >= width && *h >= height)
        .min_by_key(|(size, _)| area(*size));

    let largest = || {
        files
            .iter()
            .filter_map(|f| f.size.map(|size| (size, f)))
            .max_by_key(|(size, _)| area(*size))
    };

    covering
        .or_else(largest)
        .map(|(_, f)| f)
        .or_else(|| files.first())
        .map(|f| f.path.clone())
}
