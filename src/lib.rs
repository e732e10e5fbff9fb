pub mod container;
mod greedy_packer;
pub mod huffman;
pub mod image;
pub mod lz;
mod match_finder;
pub mod planes;

use thiserror::Error;

pub use container::{ContainerError, DirectoryEntry, Header, TileFile, TileFileWriter};
pub use greedy_packer::{PackError, max_packed_size, pack};
pub use crate::image::Image;
pub use lz::{UnpackError, unpack};
pub use match_finder::MAX_DISTANCE;

pub type ProgressCallback<'a> = &'a mut dyn FnMut(usize);

/// Bytes per ARGB8888 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Pixel dimensions of one tile, the unit of compression.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TileGeometry {
    width: u32,
    height: u32,
}

impl TileGeometry {
    pub const DEFAULT: TileGeometry = TileGeometry {
        width: 8,
        height: 8,
    };

    pub fn new(width: u32, height: u32) -> Result<TileGeometry, TileError> {
        let valid = width > 0
            && height > 0
            && (width as usize)
                .checked_mul(height as usize)
                .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
                .is_some_and(|len| u32::try_from(len).is_ok());
        if !valid {
            return Err(TileError::InvalidGeometry { width, height });
        }
        Ok(TileGeometry { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw byte length of one tile.
    pub fn tile_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// Number of tile rows and columns needed to cover an image.
    pub fn grid(&self, image_width: u32, image_height: u32) -> (u32, u32) {
        (
            image_height.div_ceil(self.height),
            image_width.div_ceil(self.width),
        )
    }
}

impl Default for TileGeometry {
    fn default() -> TileGeometry {
        TileGeometry::DEFAULT
    }
}

/// The error type for the tile level functions
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TileError {
    #[error("invalid tile geometry {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },
    #[error("tile buffer holds {actual} bytes, geometry needs {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("destination buffer too small: {needed} > {available}")]
    BufferTooSmall { needed: usize, available: usize },
    #[error(transparent)]
    Pack(#[from] PackError),
    #[error(transparent)]
    Unpack(#[from] UnpackError),
}

fn check_len(geometry: TileGeometry, len: usize) -> Result<(), TileError> {
    if len != geometry.tile_len() {
        return Err(TileError::LengthMismatch {
            expected: geometry.tile_len(),
            actual: len,
        });
    }
    Ok(())
}

/// Compresses one raw tile: nibble planes first, then the greedy LZ pass.
pub fn compress_tile(tile: &[u8], geometry: TileGeometry) -> Result<Vec<u8>, TileError> {
    check_len(geometry, tile.len())?;
    Ok(pack(&planes::split_planes(tile))?)
}

/// Like [`compress_tile`], writing into `output` and returning the packed size.
///
/// `output` of [`max_packed_size`]`(geometry.tile_len())` bytes is always enough.
pub fn compress_tile_into(
    tile: &[u8],
    geometry: TileGeometry,
    output: &mut [u8],
) -> Result<usize, TileError> {
    let packed = compress_tile(tile, geometry)?;
    let available = output.len();
    let target = output
        .get_mut(..packed.len())
        .ok_or(TileError::BufferTooSmall {
            needed: packed.len(),
            available,
        })?;
    target.copy_from_slice(&packed);
    Ok(packed.len())
}

/// Reconstructs a raw tile from its packed stream.
pub fn decompress_tile(packed: &[u8], geometry: TileGeometry) -> Result<Vec<u8>, TileError> {
    let mut tile = vec![0; geometry.tile_len()];
    decompress_tile_into(packed, geometry, &mut tile)?;
    Ok(tile)
}

/// Like [`decompress_tile`]; only the first tile-length bytes of `output` are written.
pub fn decompress_tile_into(
    packed: &[u8],
    geometry: TileGeometry,
    output: &mut [u8],
) -> Result<(), TileError> {
    if output.len() < geometry.tile_len() {
        return Err(TileError::BufferTooSmall {
            needed: geometry.tile_len(),
            available: output.len(),
        });
    }
    let output = &mut output[..geometry.tile_len()];
    let planes = unpack(packed, output.len())?;
    planes::merge_planes_into(&planes, output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_rejects_empty_tiles() {
        assert_eq!(
            TileGeometry::new(0, 8),
            Err(TileError::InvalidGeometry {
                width: 0,
                height: 8
            })
        );
        assert!(TileGeometry::new(8, 0).is_err());
        assert!(TileGeometry::new(u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn grid_covers_partial_tiles() {
        let geometry = TileGeometry::new(8, 4).unwrap();
        assert_eq!(geometry.grid(17, 8), (2, 3));
        assert_eq!(geometry.grid(16, 9), (3, 2));
    }

    #[test]
    fn wrong_tile_length_is_rejected() {
        assert_eq!(
            compress_tile(&[0; 255], TileGeometry::DEFAULT),
            Err(TileError::LengthMismatch {
                expected: 256,
                actual: 255
            })
        );
    }

    #[test]
    fn undersized_output_is_rejected() {
        let tile: Vec<u8> = (0..=255).collect();
        let mut out = [0u8; 16];
        assert!(matches!(
            compress_tile_into(&tile, TileGeometry::DEFAULT, &mut out),
            Err(TileError::BufferTooSmall { available: 16, .. })
        ));
        let mut tile_out = [0u8; 100];
        assert!(matches!(
            decompress_tile_into(&[], TileGeometry::DEFAULT, &mut tile_out),
            Err(TileError::BufferTooSmall { needed: 256, .. })
        ));
    }

    #[test]
    fn repeating_pixel_tile_roundtrips() {
        let tile: Vec<u8> = std::iter::repeat(0xaabb_ccddu32.to_le_bytes())
            .take(64)
            .flatten()
            .collect();
        let packed = compress_tile(&tile, TileGeometry::DEFAULT).unwrap();
        assert!(packed.len() < 32);
        assert_eq!(decompress_tile(&packed, TileGeometry::DEFAULT).unwrap(), tile);
    }

    #[test]
    fn compress_into_matches_compress() {
        let tile: Vec<u8> = (0..256u32).map(|i| (i * 7 / 5) as u8).collect();
        let mut out = vec![0u8; max_packed_size(tile.len())];
        let size = compress_tile_into(&tile, TileGeometry::DEFAULT, &mut out).unwrap();
        assert_eq!(
            out[..size],
            compress_tile(&tile, TileGeometry::DEFAULT).unwrap()[..]
        );
        let mut back = vec![0u8; 256];
        decompress_tile_into(&out[..size], TileGeometry::DEFAULT, &mut back).unwrap();
        assert_eq!(back, tile);
    }
}
