use std::path::Path;

use ::image::error::{ParameterError, ParameterErrorKind};
use ::image::{DynamicImage, ImageError, ImageResult, RgbaImage};

use crate::{BYTES_PER_PIXEL, TileError, TileGeometry};

/// A full 32 bit raster, rows top to bottom, R, G, B, A bytes per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Image {
    pub fn new(width: u32, height: u32) -> Image {
        Image {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Result<Image, TileError> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(TileError::LengthMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Image {
            width,
            height,
            pixels,
        })
    }

    /// Loads any format the `image` crate can decode, converted to RGBA.
    pub fn open<P: AsRef<Path>>(path: P) -> ImageResult<Image> {
        Ok(::image::open(path)?.to_rgba8().into())
    }

    pub fn load_from_memory(bytes: &[u8]) -> ImageResult<Image> {
        Ok(::image::load_from_memory(bytes)?.to_rgba8().into())
    }

    /// Saves in the format implied by the file extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        DynamicImage::ImageRgba8(self.to_rgba()?).save(path)
    }

    pub fn to_rgba(&self) -> ImageResult<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone()).ok_or_else(|| {
            ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            ))
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let start = self.offset(x, y);
        let mut pixel = [0; 4];
        pixel.copy_from_slice(&self.pixels[start..start + BYTES_PER_PIXEL]);
        pixel
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL
    }

    /// Visible part of tile `(row, col)`: pixel span `(x, y, columns, rows)`.
    fn tile_span(&self, geometry: TileGeometry, row: u32, col: u32) -> (u32, u32, u32, u32) {
        let x = col * geometry.width();
        let y = row * geometry.height();
        let columns = geometry.width().min(self.width.saturating_sub(x));
        let rows = geometry.height().min(self.height.saturating_sub(y));
        (x, y, columns, rows)
    }

    /// Copies tile `(row, col)` out in row-major pixel order. Parts of edge
    /// tiles outside the image are zero.
    pub fn extract_tile(&self, geometry: TileGeometry, row: u32, col: u32) -> Vec<u8> {
        let mut tile = vec![0; geometry.tile_len()];
        let (x, y, columns, rows) = self.tile_span(geometry, row, col);
        let line = columns as usize * BYTES_PER_PIXEL;
        let tile_stride = geometry.width() as usize * BYTES_PER_PIXEL;
        for i in 0..rows {
            let src = self.offset(x, y + i);
            let dst = i as usize * tile_stride;
            tile[dst..dst + line].copy_from_slice(&self.pixels[src..src + line]);
        }
        tile
    }

    /// Writes a decoded tile back, dropping whatever lies outside the image.
    pub fn place_tile(&mut self, geometry: TileGeometry, row: u32, col: u32, tile: &[u8]) {
        assert_eq!(tile.len(), geometry.tile_len());
        let (x, y, columns, rows) = self.tile_span(geometry, row, col);
        let line = columns as usize * BYTES_PER_PIXEL;
        let tile_stride = geometry.width() as usize * BYTES_PER_PIXEL;
        for i in 0..rows {
            let dst = self.offset(x, y + i);
            let src = i as usize * tile_stride;
            self.pixels[dst..dst + line].copy_from_slice(&tile[src..src + line]);
        }
    }

    /// Number of pixels that differ, or `None` when the dimensions do not match.
    pub fn count_differences(&self, other: &Image) -> Option<usize> {
        if self.width != other.width || self.height != other.height {
            return None;
        }
        Some(
            self.pixels
                .chunks_exact(BYTES_PER_PIXEL)
                .zip(other.pixels.chunks_exact(BYTES_PER_PIXEL))
                .filter(|(a, b)| a != b)
                .count(),
        )
    }
}

impl From<RgbaImage> for Image {
    fn from(rgba: RgbaImage) -> Image {
        let (width, height) = rgba.dimensions();
        Image {
            width,
            height,
            pixels: rgba.into_raw(),
        }
    }
}
