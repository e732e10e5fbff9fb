#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let packed = jlcd::pack(data).unwrap();
    assert!(packed.len() <= jlcd::max_packed_size(data.len()));
    let unpacked = jlcd::unpack(&packed, data.len()).unwrap();
    assert!(unpacked == data);

    if data.len() >= 4 {
        let width = (data.len() / 4) as u32;
        let geometry = jlcd::TileGeometry::new(width, 1).unwrap();
        let tile = &data[..geometry.tile_len()];
        let packed = jlcd::compress_tile(tile, geometry).unwrap();
        assert!(jlcd::decompress_tile(&packed, geometry).unwrap() == tile);
    }
});
