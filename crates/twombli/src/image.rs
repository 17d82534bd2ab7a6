//! `image` crate glue: decoding inputs into 8-bit planes and rendering
//! masks and overlays.

use crate::error::UnitError;
use crate::ops::GapRegion;
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, Luma, Rgb, RgbImage};
use std::path::Path;
use twombli_core::density::{f32_to_u8, rgb_to_u8, u16_display_range, u16_to_u8};
use twombli_core::BinaryMask;

/// Single-channel samples at the source depth.
#[derive(Clone, Debug, PartialEq)]
pub enum Plane {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>),
}

/// Decode the first frame of `path`.
pub fn load_source(path: &Path) -> Result<DynamicImage, UnitError> {
    let decode = |source| UnitError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let img = ImageReader::open(path)
        .map_err(|e| decode(image::ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| decode(image::ImageError::IoError(e)))?
        .decode()
        .map_err(decode)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(UnitError::UnsupportedImage {
            path: path.to_path_buf(),
        });
    }
    Ok(img)
}

/// Collapse colour channels by their unweighted mean, keeping the depth.
pub fn plane(img: &DynamicImage) -> Plane {
    fn mean3_u16(p: &[u16]) -> u16 {
        ((p[0] as u32 + p[1] as u32 + p[2] as u32) / 3) as u16
    }
    fn mean3_f32(p: &[f32]) -> f32 {
        (p[0] + p[1] + p[2]) / 3.0
    }

    match img {
        DynamicImage::ImageLuma8(b) => Plane::U8(b.as_raw().clone()),
        DynamicImage::ImageLumaA8(b) => Plane::U8(b.pixels().map(|p| p[0]).collect()),
        DynamicImage::ImageRgb8(b) => Plane::U8(rgb_to_u8(b.as_raw())),
        DynamicImage::ImageRgba8(b) => {
            let rgb: Vec<u8> = b.pixels().flat_map(|p| [p[0], p[1], p[2]]).collect();
            Plane::U8(rgb_to_u8(&rgb))
        }
        DynamicImage::ImageLuma16(b) => Plane::U16(b.as_raw().clone()),
        DynamicImage::ImageLumaA16(b) => Plane::U16(b.pixels().map(|p| p[0]).collect()),
        DynamicImage::ImageRgb16(b) => {
            Plane::U16(b.as_raw().chunks_exact(3).map(mean3_u16).collect())
        }
        DynamicImage::ImageRgba16(b) => {
            Plane::U16(b.as_raw().chunks_exact(4).map(mean3_u16).collect())
        }
        DynamicImage::ImageRgb32F(b) => {
            Plane::F32(b.as_raw().chunks_exact(3).map(mean3_f32).collect())
        }
        DynamicImage::ImageRgba32F(b) => {
            Plane::F32(b.as_raw().chunks_exact(4).map(mean3_f32).collect())
        }
        other => Plane::U8(other.to_luma8().into_raw()),
    }
}

/// Reduce an image to 8-bit gray.
///
/// 8-bit samples pass through. 16-bit samples go through the display range
/// left after saturating `saturation` percent of pixels (the plain min–max
/// range for 0). Float samples are min–max scaled.
pub fn to_gray8(img: &DynamicImage, saturation: f64) -> GrayImage {
    let bytes = match plane(img) {
        Plane::U8(v) => v,
        Plane::U16(v) => match u16_display_range(&v, saturation) {
            Some((lo, hi)) => u16_to_u8(&v, lo, hi),
            None => vec![0; v.len()],
        },
        Plane::F32(v) => f32_to_u8(&v),
    };
    let w = img.width();
    // one sample per pixel of `img`
    GrayImage::from_fn(w, img.height(), |x, y| Luma([bytes[(y * w + x) as usize]]))
}

/// 8-bit base image for the density heat-map.
pub fn density_base(img: &DynamicImage) -> GrayImage {
    to_gray8(img, 0.0)
}

/// 8-bit base image for ridge detection.
pub fn ridge_base(img: &DynamicImage, contrast_saturation: f64) -> GrayImage {
    to_gray8(img, contrast_saturation)
}

/// Mask rendered with fibre at 255 and background at 0.
pub fn mask_image(mask: &BinaryMask) -> GrayImage {
    GrayImage::from_fn(mask.w as u32, mask.h as u32, |x, y| {
        Luma([if mask.at(x as usize, y as usize) { 255 } else { 0 }])
    })
}

/// Read a mask back from an 8-bit rendering; any non-zero pixel is fibre.
pub fn mask_from_image(img: &GrayImage) -> Option<BinaryMask> {
    BinaryMask::from_bytes(img.width() as usize, img.height() as usize, img.as_raw())
}

const OUTLINE: Rgb<u8> = Rgb([255, 0, 0]);
const STROKE: f64 = 3.0;

/// Mask in gray with each gap circle outlined in red.
pub fn gap_overlay(mask: &BinaryMask, regions: &[GapRegion]) -> RgbImage {
    let mut img = RgbImage::from_fn(mask.w as u32, mask.h as u32, |x, y| {
        let v = if mask.at(x as usize, y as usize) { 255 } else { 0 };
        Rgb([v, v, v])
    });
    let (w, h) = (mask.w as i64, mask.h as i64);
    for r in regions {
        let outer = r.radius + STROKE / 2.0;
        let inner = (r.radius - STROKE / 2.0).max(0.0);
        let x0 = ((r.x - outer).floor() as i64).max(0);
        let y0 = ((r.y - outer).floor() as i64).max(0);
        let x1 = ((r.x + outer).ceil() as i64).min(w - 1);
        let y1 = ((r.y + outer).ceil() as i64).min(h - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let d = (x as f64 - r.x).hypot(y as f64 - r.y);
                if d >= inner && d <= outer {
                    img.put_pixel(x as u32, y as u32, OUTLINE);
                }
            }
        }
    }
    img
}

pub fn save_png<P, C>(img: &image::ImageBuffer<P, C>, path: &Path) -> Result<(), UnitError>
where
    P: image::PixelWithColorType,
    [P::Subpixel]: image::EncodableLayout,
    C: std::ops::Deref<Target = [P::Subpixel]>,
{
    img.save_with_format(path, ImageFormat::Png)
        .map_err(|source| UnitError::Encode {
            path: path.to_path_buf(),
            source,
        })
}
