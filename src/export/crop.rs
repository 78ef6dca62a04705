//! Crop-rectangle computation and application.
//!
//! The browser reports element geometry in CSS pixels while the screenshot is
//! captured at a higher density, so the element rect is scaled into screenshot
//! space and padded by the expansion margin before cropping.

use crate::driver::ElementRect;
use crate::{Error, Result};
use image::{DynamicImage, GenericImageView, ImageBuffer, Pixel};
use serde::{Deserialize, Serialize};

/// Screenshot pixels per CSS pixel at `scale = 1.0`.
///
/// Browsers rasterize the zoomed page at twice the CSS pixel density reported
/// for element geometry. The CDP backend pins Chrome to this ratio at launch;
/// other browsers are assumed to behave the same. Revisit this value when
/// targeting a browser whose default device pixel ratio differs.
pub const DEVICE_PIXEL_RATIO: f64 = 2.0;

/// Factor converting CSS pixels into screenshot pixels for a given zoom scale
pub fn scaling_factor(scale: f64) -> f64 {
    scale * DEVICE_PIXEL_RATIO
}

/// Region of the screenshot to keep, in screenshot pixel space.
///
/// Coordinates are not clamped to the screenshot; see [`CropRect::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl CropRect {
    /// Scale `rect` into screenshot space and pad it by `expand` CSS pixels.
    ///
    /// # Examples
    ///
    /// ```
    /// use tablesnap::driver::ElementRect;
    /// use tablesnap::export::CropRect;
    ///
    /// let rect = ElementRect { x: 10.0, y: 20.0, width: 100.0, height: 50.0 };
    /// let crop = CropRect::compute(&rect, 1.0, 5);
    /// assert_eq!((crop.left, crop.top, crop.right, crop.bottom), (10.0, 30.0, 230.0, 150.0));
    /// ```
    pub fn compute(rect: &ElementRect, scale: f64, expand: u32) -> Self {
        let factor = scaling_factor(scale);
        let expansion = f64::from(expand) * factor;
        Self {
            left: rect.x * factor - expansion,
            top: rect.y * factor - expansion,
            right: (rect.x + rect.width) * factor + expansion,
            bottom: (rect.y + rect.height) * factor + expansion,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Whole-pixel bounds `(left, top, right, bottom)`, rounding ties to even.
    pub fn pixel_bounds(&self) -> (i64, i64, i64, i64) {
        let r = |v: f64| v.round_ties_even() as i64;
        (r(self.left), r(self.top), r(self.right), r(self.bottom))
    }

    /// Crop `image` to this rectangle.
    ///
    /// Parts of the rectangle that fall outside the image are filled with
    /// zero-valued pixels, so the output always has the rectangle's size.
    pub fn apply(&self, image: &DynamicImage) -> Result<DynamicImage> {
        let (left, top, right, bottom) = self.pixel_bounds();
        if right < left || bottom < top {
            return Err(Error::InvalidCrop(format!(
                "({}, {}, {}, {}) has negative extent",
                left, top, right, bottom
            )));
        }
        let out_w = u32::try_from(right - left)
            .map_err(|_| Error::InvalidCrop(format!("width {} is too large", right - left)))?;
        let out_h = u32::try_from(bottom - top)
            .map_err(|_| Error::InvalidCrop(format!("height {} is too large", bottom - top)))?;

        let (img_w, img_h) = image.dimensions();
        let inside = left >= 0 && top >= 0 && right <= i64::from(img_w) && bottom <= i64::from(img_h);
        if inside {
            return Ok(image.crop_imm(left as u32, top as u32, out_w, out_h));
        }

        Ok(if image.color().has_alpha() {
            DynamicImage::ImageRgba8(pad_crop(&image.to_rgba8(), left, top, out_w, out_h))
        } else {
            DynamicImage::ImageRgb8(pad_crop(&image.to_rgb8(), left, top, out_w, out_h))
        })
    }
}

// Copy the part of `src` overlapping the target window onto a zeroed canvas.
fn pad_crop<P>(
    src: &ImageBuffer<P, Vec<P::Subpixel>>,
    left: i64,
    top: i64,
    width: u32,
    height: u32,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel,
{
    let mut canvas = ImageBuffer::<P, Vec<P::Subpixel>>::new(width, height);
    image::imageops::replace(&mut canvas, src, -left, -top);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn rect(x: f64, y: f64, width: f64, height: f64) -> ElementRect {
        ElementRect { x, y, width, height }
    }

    #[test]
    fn doubled_scale_doubles_factor() {
        assert_eq!(scaling_factor(1.0), 2.0);
        assert_eq!(scaling_factor(2.0), 4.0);
    }

    #[test]
    fn zero_expand_is_exact_element_bounds() {
        let c = CropRect::compute(&rect(3.0, 4.0, 10.0, 10.0), 0.5, 0);
        assert_eq!((c.left, c.top, c.right, c.bottom), (3.0, 4.0, 13.0, 14.0));
    }

    #[test]
    fn rounding_uses_ties_to_even() {
        let c = CropRect { left: 0.5, top: 1.5, right: 2.5, bottom: 3.4 };
        assert_eq!(c.pixel_bounds(), (0, 2, 2, 3));
    }

    #[test]
    fn in_bounds_crop_keeps_pixels() {
        let mut img = RgbImage::new(10, 10);
        img.put_pixel(4, 5, Rgb([9, 8, 7]));
        let crop = CropRect { left: 2.0, top: 3.0, right: 6.0, bottom: 8.0 };
        let out = crop.apply(&DynamicImage::ImageRgb8(img)).unwrap().to_rgb8();
        assert_eq!(out.dimensions(), (4, 5));
        assert_eq!(*out.get_pixel(2, 2), Rgb([9, 8, 7]));
    }

    #[test]
    fn out_of_bounds_crop_pads_with_zero() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let crop = CropRect { left: -2.0, top: -1.0, right: 6.0, bottom: 4.0 };
        let out = crop.apply(&DynamicImage::ImageRgba8(img)).unwrap();
        assert_eq!(out.dimensions(), (8, 5));

        let out = out.to_rgba8();
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(*out.get_pixel(2, 1), Rgba([255, 255, 255, 255]));
        assert_eq!(*out.get_pixel(5, 4), Rgba([255, 255, 255, 255]));
        assert_eq!(*out.get_pixel(7, 4), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn rgb_source_stays_rgb_when_padded() {
        let img = RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]));
        let crop = CropRect { left: -1.0, top: -1.0, right: 3.0, bottom: 3.0 };
        let out = crop.apply(&DynamicImage::ImageRgb8(img)).unwrap();
        assert!(!out.color().has_alpha());
        assert_eq!(out.dimensions(), (4, 4));
    }

    #[test]
    fn inverted_rect_is_rejected() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let crop = CropRect { left: 3.0, top: 0.0, right: 1.0, bottom: 2.0 };
        assert!(matches!(crop.apply(&img), Err(Error::InvalidCrop(_))));
    }
}
