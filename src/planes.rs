//! Nibble plane reordering applied around the LZ stage.
//!
//! A tile is split into two half-size planes: the first half holds the high
//! nibbles of every byte, the second half the low nibbles, two source nibbles
//! per destination byte (even index in the upper four bits). Pixel channels
//! tend to vary mostly in their low bits, so the high plane compresses well.

/// Splits `data` into its high and low nibble planes.
///
/// Panics if `data` has odd length.
pub fn split_planes(data: &[u8]) -> Vec<u8> {
    assert!(data.len() % 2 == 0, "plane split needs an even length");
    let half = data.len() / 2;
    let mut planes = vec![0u8; data.len()];
    let (high, low) = planes.split_at_mut(half);
    for ((pair, h), l) in data.chunks_exact(2).zip(high.iter_mut()).zip(low.iter_mut()) {
        *h = (pair[0] & 0xf0) | (pair[1] >> 4);
        *l = (pair[0] << 4) | (pair[1] & 0x0f);
    }
    planes
}

/// Inverse of [`split_planes`].
///
/// Panics if `planes` has odd length.
pub fn merge_planes(planes: &[u8]) -> Vec<u8> {
    let mut data = vec![0u8; planes.len()];
    merge_planes_into(planes, &mut data);
    data
}

pub(crate) fn merge_planes_into(planes: &[u8], data: &mut [u8]) {
    assert!(planes.len() % 2 == 0, "plane merge needs an even length");
    assert_eq!(planes.len(), data.len());
    let (high, low) = planes.split_at(planes.len() / 2);
    for ((pair, &h), &l) in data.chunks_exact_mut(2).zip(high).zip(low) {
        pair[0] = (h & 0xf0) | (l >> 4);
        pair[1] = (h << 4) | (l & 0x0f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    #[test]
    fn nibbles_land_in_their_planes() {
        let planes = split_planes(&[0xab, 0xcd, 0x12, 0x34]);
        assert_eq!(planes, [0xac, 0x13, 0xbd, 0x24]);
    }

    #[test]
    fn merge_inverts_split() {
        let mut rng = StdRng::seed_from_u64(7);
        for len in [0usize, 2, 4, 30, 256, 1024, 4098] {
            let mut data = vec![0u8; len];
            rng.fill(&mut data[..]);
            assert_eq!(merge_planes(&split_planes(&data)), data);
        }
    }

    #[test]
    fn every_byte_pair_survives() {
        let data: Vec<u8> = (0..=255u8).flat_map(|a| [a, a.rotate_left(3)]).collect();
        assert_eq!(merge_planes(&split_planes(&data)), data);
    }

    #[test]
    #[should_panic]
    fn odd_length_is_rejected() {
        split_planes(&[1, 2, 3]);
    }
}
