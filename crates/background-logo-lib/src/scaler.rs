// SPDX-License-Identifier: MPL-2.0

use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use image::RgbaImage;

/// Bilinear resize to exactly `width`×`height`. `None` for empty sizes.
#[must_use]
pub fn resize(source: &RgbaImage, width: u32, height: u32) -> Option<RgbaImage> {
    if width == 0 || height == 0 || source.width() == 0 || source.height() == 0 {
        return None;
    }

    if source.dimensions() == (width, height) {
        return Some(source.clone());
    }

    let src = match Image::from_vec_u8(
        source.width(),
        source.height(),
        source.as_raw().clone(),
        PixelType::U8x4,
    ) {
        Ok(src) => src,
        Err(why) => {
            tracing::error!(?why, "invalid source buffer for resize");
            return None;
        }
    };

    let mut dst = Image::new(width, height, PixelType::U8x4);
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));

    if let Err(why) = Resizer::new().resize(&src, &mut dst, &options) {
        tracing::error!(?why, width, height, "resize failed");
        return None;
    }

    RgbaImage::from_raw(width, height, dst.into_vec())
}
