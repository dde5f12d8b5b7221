//! Crop workspace and rasterization.
//!
//! The crop result is a preview: it is rendered into a new PNG but the
//! upload pipeline always sends the original file.

use std::io::Cursor;

use ::image::{imageops, ImageError, ImageFormat, RgbaImage};
use bytes::Bytes;
use thiserror::Error;

use super::image::{data_url, ImageId};

/// Same ceiling browsers apply to a single canvas.
pub const MAX_SURFACE_PIXELS: u64 = 16_384 * 16_384;
pub const DEFAULT_ASPECT: f64 = 1.0;

#[derive(Debug, Error)]
pub enum CropError {
    #[error("crop rectangle is empty")]
    EmptyRect,
    #[error("crop surface of {width}x{height} is too large")]
    SurfaceTooLarge { width: u32, height: u32 },
    #[error("image could not be processed: {0}")]
    Image(#[from] ImageError),
}

/// Pixel rectangle in source-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Height derived from the width when an aspect lock is set.
    pub fn constrained(self, aspect: Option<f64>) -> Self {
        match aspect {
            Some(ratio) if ratio > 0.0 && ratio.is_finite() => Self {
                height: (self.width as f64 / ratio).round() as u32,
                ..self
            },
            _ => self,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CroppedImage {
    pub width: u32,
    pub height: u32,
    pub png: Bytes,
    pub preview_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CropWorkspace {
    pub target: ImageId,
    pub aspect: Option<f64>,
    pub rect: Option<CropRect>,
    pub result: Option<CroppedImage>,
}

impl CropWorkspace {
    pub fn new(target: ImageId) -> Self {
        Self {
            target,
            aspect: Some(DEFAULT_ASPECT),
            rect: None,
            result: None,
        }
    }
}

/// Draws `rect` of the encoded image `source` onto a transparent surface of
/// exactly the rectangle's size and encodes it as PNG. Parts of the
/// rectangle outside the source stay transparent.
pub fn rasterize(source: &[u8], rect: CropRect) -> Result<CroppedImage, CropError> {
    if rect.width == 0 || rect.height == 0 {
        return Err(CropError::EmptyRect);
    }
    if rect.width as u64 * rect.height as u64 > MAX_SURFACE_PIXELS {
        return Err(CropError::SurfaceTooLarge {
            width: rect.width,
            height: rect.height,
        });
    }

    let decoded = ::image::load_from_memory(source)?.to_rgba8();
    let mut surface = RgbaImage::new(rect.width, rect.height);
    imageops::replace(&mut surface, &decoded, -(rect.x as i64), -(rect.y as i64));

    let mut png = Vec::new();
    surface.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    Ok(CroppedImage {
        width: rect.width,
        height: rect.height,
        preview_url: data_url("image/png", &png),
        png: Bytes::from(png),
    })
}
