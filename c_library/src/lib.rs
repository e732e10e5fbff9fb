use std::ffi::c_int;

fn geometry(tile_width: c_int, tile_height: c_int) -> Option<jlcd::TileGeometry> {
    let width = u32::try_from(tile_width).ok()?;
    let height = u32::try_from(tile_height).ok()?;
    jlcd::TileGeometry::new(width, height).ok()
}

/// Compresses one `tile_width * tile_height * 4` byte tile.
///
/// Returns the packed size, or -1 when the geometry is invalid or the
/// output buffer is too small. `jlcd_max_packed_size` bytes always suffice.
#[no_mangle]
pub extern "C" fn jlcd_compress_tile(
    output_buffer: *mut u8,
    output_buffer_size: usize,
    input_buffer: *const u8,
    tile_width: c_int,
    tile_height: c_int,
) -> isize {
    let Some(geometry) = geometry(tile_width, tile_height) else {
        return -1;
    };
    let output_buffer = unsafe { std::slice::from_raw_parts_mut(output_buffer, output_buffer_size) };
    let input_buffer = unsafe { std::slice::from_raw_parts(input_buffer, geometry.tile_len()) };

    match jlcd::compress_tile_into(input_buffer, geometry, output_buffer) {
        Ok(size) => size as isize,
        Err(err) => {
            eprintln!("[jlcd] tile compression failed: {}", err);
            -1
        }
    }
}

/// Decompresses `input_size` packed bytes into a `tile_width * tile_height * 4`
/// byte tile. Returns 0 on success and -1 on corrupt input.
#[no_mangle]
pub extern "C" fn jlcd_decompress_tile(
    output_buffer: *mut u8,
    output_buffer_size: usize,
    input_buffer: *const u8,
    input_size: usize,
    tile_width: c_int,
    tile_height: c_int,
) -> c_int {
    let Some(geometry) = geometry(tile_width, tile_height) else {
        return -1;
    };
    let output_buffer = unsafe { std::slice::from_raw_parts_mut(output_buffer, output_buffer_size) };
    let input_buffer = unsafe { std::slice::from_raw_parts(input_buffer, input_size) };

    match jlcd::decompress_tile_into(input_buffer, geometry, output_buffer) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("[jlcd] compressed data corrupt: {}", err);
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn jlcd_max_packed_size(tile_width: c_int, tile_height: c_int) -> usize {
    geometry(tile_width, tile_height)
        .map(|geometry| jlcd::max_packed_size(geometry.tile_len()))
        .unwrap_or(0)
}
