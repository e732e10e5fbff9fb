#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut file) = jlcd::TileFile::open(std::io::Cursor::new(data)) {
        let _ = file.decode_image(None);
    }
});
