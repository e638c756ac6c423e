// SPDX-License-Identifier: MPL-2.0

//! Logo geometry shared by the live overlay and the settings preview.

use background_logo_config::LogoPosition;

/// Axis-aligned rectangle in monitor coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Top-left corner of a `logo` sized box anchored inside `area`, both given
/// as `(width, height)`. `border` only applies to the bottom anchors.
#[must_use]
pub fn logo_origin(
    position: LogoPosition,
    area: (f64, f64),
    logo: (f64, f64),
    border: f64,
) -> (f64, f64) {
    let (area_w, area_h) = area;
    let (logo_w, logo_h) = logo;

    let centered_x = (area_w - logo_w) / 2.0;
    let bottom_y = area_h - logo_h - border;

    match position {
        LogoPosition::Center => (centered_x, (area_h - logo_h) / 2.0),
        LogoPosition::BottomLeft => (border, bottom_y),
        LogoPosition::BottomCenter => (centered_x, bottom_y),
        LogoPosition::BottomRight => (area_w - logo_w - border, bottom_y),
    }
}

/// Integer pixel origin within a work area.
#[must_use]
pub fn pixel_origin(position: LogoPosition, area: Rect, logo: (u32, u32), border: u32) -> (i32, i32) {
    let (x, y) = logo_origin(
        position,
        (f64::from(area.width), f64::from(area.height)),
        (f64::from(logo.0), f64::from(logo.1)),
        f64::from(border),
    );
    (x.round() as i32, y.round() as i32)
}

/// Size of the logo when its width is `percent` of `container_width`. The
/// height keeps the source aspect ratio. `None` when either dimension would
/// collapse to zero.
#[must_use]
pub fn scaled_logo_size(source: (u32, u32), container_width: u32, percent: f64) -> Option<(u32, u32)> {
    let (source_w, source_h) = source;
    if source_w == 0 || source_h == 0 {
        return None;
    }

    let width = f64::from(container_width) * percent / 100.0;
    let height = f64::from(source_h) * width / f64::from(source_w);

    let (width, height) = (width.round() as u32, height.round() as u32);
    (width > 0 && height > 0).then_some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    const AREA: (f64, f64) = (1920.0, 1080.0);
    const LOGO: (f64, f64) = (200.0, 100.0);

    #[test]
    fn anchors_follow_position_table() {
        let cases = [
            (LogoPosition::Center, (860.0, 490.0)),
            (LogoPosition::BottomLeft, (10.0, 970.0)),
            (LogoPosition::BottomCenter, (860.0, 970.0)),
            (LogoPosition::BottomRight, (1710.0, 970.0)),
        ];

        for (position, expected) in cases {
            assert_eq!(logo_origin(position, AREA, LOGO, 10.0), expected, "{position}");
        }
    }

    #[test]
    fn center_ignores_border() {
        assert_eq!(
            logo_origin(LogoPosition::Center, AREA, LOGO, 0.0),
            logo_origin(LogoPosition::Center, AREA, LOGO, 300.0)
        );
    }

    #[test]
    fn pixel_origin_is_work_area_relative() {
        let area = Rect::new(1920, 32, 1920, 1048);
        assert_eq!(
            pixel_origin(LogoPosition::BottomRight, area, (200, 100), 10),
            (1710, 938)
        );
    }

    #[test]
    fn scaling_preserves_aspect_ratio() {
        for (source, container, percent) in [
            ((400, 200), 1000, 50.0),
            ((333, 97), 1920, 7.5),
            ((64, 640), 2560, 12.25),
        ] {
            let (w, h) = scaled_logo_size(source, container, percent).unwrap();
            let expected_w = f64::from(container) * percent / 100.0;
            let expected_h = f64::from(source.1) * expected_w / f64::from(source.0);
            assert!((f64::from(w) - expected_w).abs() <= 0.5);
            assert!((f64::from(h) - expected_h).abs() <= 0.5);
        }

        assert_eq!(scaled_logo_size((400, 200), 1000, 50.0), Some((500, 250)));
        assert_eq!(scaled_logo_size((400, 200), 1000, 0.0), None);
        assert_eq!(scaled_logo_size((0, 0), 1000, 50.0), None);
    }
}
