//! End-to-end tile compression: planes, greedy LZ and back.

use jlcd::lz::{Op, Tokens};
use jlcd::planes::{merge_planes, split_planes};
use jlcd::{TileError, TileGeometry, UnpackError, compress_tile, decompress_tile, max_packed_size};
use rand::{Rng, SeedableRng, rngs::StdRng};

fn roundtrip(tile: &[u8], geometry: TileGeometry) -> Vec<u8> {
    let packed = compress_tile(tile, geometry).unwrap();
    assert_eq!(decompress_tile(&packed, geometry).unwrap(), tile);
    packed
}

#[test]
fn repeating_argb_pattern_tile() {
    let tile: Vec<u8> = (0..64).flat_map(|_| 0xaabb_ccddu32.to_be_bytes()).collect();
    assert_eq!(tile.len(), 256);
    let planes = split_planes(&tile);
    let packed = jlcd::pack(&planes).unwrap();
    let unpacked = jlcd::unpack(&packed, planes.len()).unwrap();
    assert_eq!(merge_planes(&unpacked), tile);
    assert!(packed.len() < 20);
}

#[test]
fn random_tiles_roundtrip() {
    let mut rng = StdRng::seed_from_u64(0x4a4c4344);
    for (width, height) in [(8, 8), (16, 16), (4, 2), (1, 1), (32, 8)] {
        let geometry = TileGeometry::new(width, height).unwrap();
        for _ in 0..20 {
            let mut tile = vec![0u8; geometry.tile_len()];
            rng.fill(&mut tile[..]);
            let packed = roundtrip(&tile, geometry);
            assert!(packed.len() <= max_packed_size(tile.len()) + 1);
        }
    }
}

#[test]
fn low_entropy_tiles_roundtrip() {
    let mut rng = StdRng::seed_from_u64(11);
    let geometry = TileGeometry::DEFAULT;
    for _ in 0..200 {
        let palette: Vec<[u8; 4]> = (0..rng.gen_range(1..5)).map(|_| rng.r#gen()).collect();
        let tile: Vec<u8> = (0..64)
            .flat_map(|_| palette[rng.gen_range(0..palette.len())])
            .collect();
        roundtrip(&tile, geometry);
    }
}

#[test]
fn zero_tile_is_tiny() {
    for (width, height) in [(8, 8), (64, 64)] {
        let geometry = TileGeometry::new(width, height).unwrap();
        let packed = roundtrip(&vec![0; geometry.tile_len()], geometry);
        assert!(packed.len() <= 16 + 3 * (geometry.tile_len() / 262));
    }
}

#[test]
fn forced_literal_tail_roundtrips() {
    let mut planes = vec![0x33u8; 256];
    for (i, b) in planes[243..].iter_mut().enumerate() {
        *b = 0xa0 + i as u8;
    }
    let tile = merge_planes(&planes);
    let packed = roundtrip(&tile, TileGeometry::DEFAULT);
    let last = Tokens::new(&packed).last().unwrap().unwrap();
    assert_eq!(last, Op::Literal(&planes[243..]));
}

#[test]
fn large_tiles_keep_distances_in_window() {
    let geometry = TileGeometry::new(64, 64).unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let mut row = vec![0u8; 64 * 4];
    rng.fill(&mut row[..]);
    let mut tile = Vec::with_capacity(geometry.tile_len());
    for y in 0..64 {
        if y % 9 == 0 {
            rng.fill(&mut row[..16]);
        }
        tile.extend_from_slice(&row);
    }
    let packed = roundtrip(&tile, geometry);
    assert!(packed.len() <= max_packed_size(tile.len()));
    for op in Tokens::new(&packed) {
        match op.unwrap() {
            Op::Match {
                extension,
                distance,
            } => {
                assert!(extension >= 1);
                assert!(distance as usize <= jlcd::MAX_DISTANCE);
            }
            Op::Literal(bytes) => assert!(!bytes.is_empty() && bytes.len() <= 32),
        }
    }
}

#[test]
fn corrupt_streams_fail() {
    let geometry = TileGeometry::DEFAULT;
    let tile: Vec<u8> = (0..=255).collect();
    let packed = compress_tile(&tile, geometry).unwrap();

    assert!(matches!(
        decompress_tile(&packed[..packed.len() - 1], geometry),
        Err(TileError::Unpack(UnpackError::TruncatedStream { .. }))
    ));

    let small = TileGeometry::new(4, 4).unwrap();
    assert!(matches!(
        decompress_tile(&packed, small),
        Err(TileError::Unpack(_))
    ));
}
