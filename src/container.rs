//! The JLCD tile file: a fixed header, one directory entry per tile and the
//! concatenated packed tiles, so any tile can be decoded on its own.
//!
//! ```text
//! "JLCD" | image width | image height | tile width | tile height | tile count
//! (offset, size) * tile count            offsets relative to the payload
//! payload
//! ```
//! All integers are little-endian `u32`.

use std::io::{self, Read, Seek, SeekFrom, Write};

use thiserror::Error;
use tracing::{debug, info};

use crate::lz::MAX_EXPANSION;
use crate::{
    BYTES_PER_PIXEL, Image, PackError, ProgressCallback, TileError, TileGeometry, UnpackError,
    compress_tile, decompress_tile,
};

pub const MAGIC: [u8; 4] = *b"JLCD";
pub const HEADER_LEN: usize = 24;
pub const ENTRY_LEN: usize = 8;

/// The error type for reading and writing tile files
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("not a JLCD tile file")]
    InvalidMagic,
    #[error("invalid tile file header: {0}")]
    InvalidHeader(&'static str),
    #[error("tile ({row}, {col}) is outside the tile grid")]
    TileOutOfRange { row: u32, col: u32 },
    #[error("directory entry {index} points outside the payload")]
    EntryOutOfBounds { index: usize },
    #[error("tile payload exceeds 4 GiB")]
    PayloadTooLarge,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Tile(#[from] TileError),
}

impl From<PackError> for ContainerError {
    fn from(err: PackError) -> ContainerError {
        ContainerError::Tile(err.into())
    }
}

impl From<UnpackError> for ContainerError {
    fn from(err: UnpackError) -> ContainerError {
        ContainerError::Tile(err.into())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub image_width: u32,
    pub image_height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_count: u32,
}

impl Header {
    pub fn geometry(&self) -> Result<TileGeometry, TileError> {
        TileGeometry::new(self.tile_width, self.tile_height)
    }

    /// File offset of the first payload byte.
    pub fn payload_start(&self) -> u64 {
        HEADER_LEN as u64 + ENTRY_LEN as u64 * self.tile_count as u64
    }

    pub fn write_to(&self, mut writer: impl Write) -> io::Result<()> {
        writer.write_all(&MAGIC)?;
        for value in [
            self.image_width,
            self.image_height,
            self.tile_width,
            self.tile_height,
            self.tile_count,
        ] {
            writer.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn read_from(mut reader: impl Read) -> Result<Header, ContainerError> {
        let mut magic = [0; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(ContainerError::InvalidMagic);
        }
        Ok(Header {
            image_width: read_u32(&mut reader)?,
            image_height: read_u32(&mut reader)?,
            tile_width: read_u32(&mut reader)?,
            tile_height: read_u32(&mut reader)?,
            tile_count: read_u32(&mut reader)?,
        })
    }
}

fn read_u32(reader: &mut impl Read) -> io::Result<u32> {
    let mut bytes = [0; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Location of one packed tile inside the payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub offset: u32,
    pub size: u32,
}

/// Packed size statistics over the tiles of a file.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PackStats {
    pub tiles: usize,
    pub min: usize,
    pub max: usize,
    pub total: usize,
}

impl PackStats {
    pub fn from_entries(entries: &[DirectoryEntry]) -> PackStats {
        let sizes = entries.iter().map(|entry| entry.size as usize);
        PackStats {
            tiles: entries.len(),
            min: sizes.clone().min().unwrap_or(0),
            max: sizes.clone().max().unwrap_or(0),
            total: sizes.sum(),
        }
    }

    pub fn average(&self) -> f64 {
        if self.tiles == 0 {
            0.0
        } else {
            self.total as f64 / self.tiles as f64
        }
    }
}

/// Builds a tile file in memory, one tile at a time in row-major order.
pub struct TileFileWriter {
    image_width: u32,
    image_height: u32,
    geometry: TileGeometry,
    directory: Vec<DirectoryEntry>,
    payload: Vec<u8>,
}

impl TileFileWriter {
    pub fn new(image_width: u32, image_height: u32, geometry: TileGeometry) -> TileFileWriter {
        TileFileWriter {
            image_width,
            image_height,
            geometry,
            directory: Vec::new(),
            payload: Vec::new(),
        }
    }

    /// Compresses every tile of `image` in scan order.
    pub fn encode_image(
        image: &Image,
        geometry: TileGeometry,
        mut progress_callback: Option<ProgressCallback>,
    ) -> Result<TileFileWriter, ContainerError> {
        let mut writer = TileFileWriter::new(image.width(), image.height(), geometry);
        let (rows, columns) = geometry.grid(image.width(), image.height());
        for row in 0..rows {
            for col in 0..columns {
                writer.push_tile(&image.extract_tile(geometry, row, col))?;
                if let Some(ref mut cb) = progress_callback {
                    cb(writer.directory.len());
                }
            }
        }
        let raw = image.pixels().len();
        info!(
            width = image.width(),
            height = image.height(),
            tiles = writer.directory.len(),
            packed = writer.payload.len(),
            "compression ratio = {:.2}%",
            writer.payload.len() as f64 / raw.max(1) as f64 * 100.0
        );
        Ok(writer)
    }

    /// Compresses `tile` and appends it.
    pub fn push_tile(&mut self, tile: &[u8]) -> Result<DirectoryEntry, ContainerError> {
        let packed = compress_tile(tile, self.geometry)?;
        self.push_packed(&packed)
    }

    /// Appends an already packed tile.
    pub fn push_packed(&mut self, packed: &[u8]) -> Result<DirectoryEntry, ContainerError> {
        let offset = u32::try_from(self.payload.len()).map_err(|_| ContainerError::PayloadTooLarge)?;
        let size = u32::try_from(packed.len()).map_err(|_| ContainerError::PayloadTooLarge)?;
        offset
            .checked_add(size)
            .ok_or(ContainerError::PayloadTooLarge)?;
        let entry = DirectoryEntry { offset, size };
        debug!(index = self.directory.len(), offset, size, "tile packed");
        self.directory.push(entry);
        self.payload.extend_from_slice(packed);
        Ok(entry)
    }

    pub fn header(&self) -> Header {
        Header {
            image_width: self.image_width,
            image_height: self.image_height,
            tile_width: self.geometry.width(),
            tile_height: self.geometry.height(),
            tile_count: self.directory.len() as u32,
        }
    }

    pub fn directory(&self) -> &[DirectoryEntry] {
        &self.directory
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn stats(&self) -> PackStats {
        PackStats::from_entries(&self.directory)
    }

    /// Writes header, directory and payload.
    pub fn write_to(&self, mut writer: impl Write) -> Result<(), ContainerError> {
        let (rows, columns) = self.geometry.grid(self.image_width, self.image_height);
        if rows as u64 * columns as u64 != self.directory.len() as u64 {
            return Err(ContainerError::InvalidHeader(
                "tile count does not match the image grid",
            ));
        }
        self.header().write_to(&mut writer)?;
        for entry in &self.directory {
            writer.write_all(&entry.offset.to_le_bytes())?;
            writer.write_all(&entry.size.to_le_bytes())?;
        }
        writer.write_all(&self.payload)?;
        writer.flush()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ContainerError> {
        let mut bytes = Vec::with_capacity(
            HEADER_LEN + ENTRY_LEN * self.directory.len() + self.payload.len(),
        );
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }
}

/// Random access reader over a tile file.
///
/// The directory is read up front; tile payloads are read on demand.
pub struct TileFile<R> {
    reader: R,
    header: Header,
    geometry: TileGeometry,
    rows: u32,
    columns: u32,
    directory: Vec<DirectoryEntry>,
    payload_len: u64,
}

/// Rows and columns of the grid `header.tile_count` describes.
fn tile_grid(header: &Header, geometry: TileGeometry) -> Result<(u32, u32), ContainerError> {
    let ceil = geometry.grid(header.image_width, header.image_height);
    let floor = (
        header.image_height / geometry.height(),
        header.image_width / geometry.width(),
    );
    [ceil, floor]
        .into_iter()
        .find(|&(rows, columns)| rows as u64 * columns as u64 == header.tile_count as u64)
        .ok_or(ContainerError::InvalidHeader(
            "tile count does not match the image grid",
        ))
}

/// Rejects headers whose image could not have come from `payload_len` bytes,
/// before anything of that size is allocated.
fn check_sizes(
    header: &Header,
    geometry: TileGeometry,
    payload_len: u64,
) -> Result<(), ContainerError> {
    let covered = header.tile_count as u64 * geometry.tile_len() as u64;
    if covered > payload_len.saturating_mul(MAX_EXPANSION as u64) {
        return Err(ContainerError::InvalidHeader(
            "payload too small for the tile grid",
        ));
    }
    // a floor grid leaves less than one tile uncovered per axis
    let image_len = (header.image_width as u64 * header.image_height as u64)
        .saturating_mul(BYTES_PER_PIXEL as u64);
    if image_len > covered.saturating_mul(4) {
        return Err(ContainerError::InvalidHeader("image exceeds its tiles"));
    }
    usize::try_from(image_len).map_err(|_| ContainerError::InvalidHeader("image too large"))?;
    Ok(())
}

impl<R: Read + Seek> TileFile<R> {
    /// Reads and validates the header and the directory.
    ///
    /// Besides the ceiling grid written by [`TileFileWriter`], a tile count
    /// matching the floor grid is accepted; the uncovered right and bottom
    /// edges then decode as zero.
    pub fn open(mut reader: R) -> Result<TileFile<R>, ContainerError> {
        reader.seek(SeekFrom::Start(0))?;
        let header = Header::read_from(&mut reader)?;
        let geometry = header
            .geometry()
            .map_err(|_| ContainerError::InvalidHeader("bad tile size"))?;
        let (rows, columns) = tile_grid(&header, geometry)?;

        let end = reader.seek(SeekFrom::End(0))?;
        let payload_len = end
            .checked_sub(header.payload_start())
            .ok_or(ContainerError::InvalidHeader("directory exceeds file size"))?;

        reader.seek(SeekFrom::Start(HEADER_LEN as u64))?;
        let mut raw = vec![0u8; ENTRY_LEN * header.tile_count as usize];
        reader.read_exact(&mut raw)?;
        let directory: Vec<DirectoryEntry> = raw
            .chunks_exact(ENTRY_LEN)
            .map(|entry| DirectoryEntry {
                offset: u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]),
                size: u32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]]),
            })
            .collect();
        for (index, entry) in directory.iter().enumerate() {
            if entry.offset as u64 + entry.size as u64 > payload_len {
                return Err(ContainerError::EntryOutOfBounds { index });
            }
        }
        check_sizes(&header, geometry, payload_len)?;

        debug!(?header, rows, columns, payload_len, "tile file opened");
        Ok(TileFile {
            reader,
            header,
            geometry,
            rows,
            columns,
            directory,
            payload_len,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn geometry(&self) -> TileGeometry {
        self.geometry
    }

    pub fn directory(&self) -> &[DirectoryEntry] {
        &self.directory
    }

    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }

    pub fn stats(&self) -> PackStats {
        PackStats::from_entries(&self.directory)
    }

    /// Tile rows and columns stored in the file.
    pub fn grid(&self) -> (u32, u32) {
        (self.rows, self.columns)
    }

    /// Directory index of tile `(row, col)`.
    pub fn tile_index(&self, row: u32, col: u32) -> Result<usize, ContainerError> {
        if row >= self.rows || col >= self.columns {
            return Err(ContainerError::TileOutOfRange { row, col });
        }
        Ok(row as usize * self.columns as usize + col as usize)
    }

    /// Raw packed bytes of directory entry `index`.
    pub fn read_packed(&mut self, index: usize) -> Result<Vec<u8>, ContainerError> {
        let entry = *self
            .directory
            .get(index)
            .ok_or(ContainerError::EntryOutOfBounds { index })?;
        self.reader.seek(SeekFrom::Start(
            self.header.payload_start() + entry.offset as u64,
        ))?;
        let mut packed = vec![0; entry.size as usize];
        self.reader.read_exact(&mut packed)?;
        Ok(packed)
    }

    /// Decodes the raw pixels of tile `(row, col)`.
    pub fn read_tile(&mut self, row: u32, col: u32) -> Result<Vec<u8>, ContainerError> {
        let index = self.tile_index(row, col)?;
        let packed = self.read_packed(index)?;
        debug!(index, size = packed.len(), "tile read");
        Ok(decompress_tile(&packed, self.geometry)?)
    }

    /// Decodes every tile back into a full image.
    pub fn decode_image(
        &mut self,
        mut progress_callback: Option<ProgressCallback>,
    ) -> Result<Image, ContainerError> {
        let mut image = Image::new(self.header.image_width, self.header.image_height);
        let (rows, columns) = self.grid();
        for row in 0..rows {
            for col in 0..columns {
                let tile = self.read_tile(row, col)?;
                image.place_tile(self.geometry, row, col, &tile);
                if let Some(ref mut cb) = progress_callback {
                    cb((row * columns + col + 1) as usize);
                }
            }
        }
        info!(
            width = image.width(),
            height = image.height(),
            tiles = self.directory.len(),
            "image decoded"
        );
        Ok(image)
    }
}
