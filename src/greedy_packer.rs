use thiserror::Error;

use crate::lz::{encode_literals, encode_match};
use crate::match_finder::MatchFinder;

/// Bytes at the end of the input that are never searched for matches.
pub const TAIL_LITERALS: usize = 13;

/// The error type for the compression functions
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PackError {
    /// a match distance the 13 bit distance field cannot express
    #[error("match distance {distance} is outside the 1..=8192 byte window")]
    UnsupportedDistance {
        /// the rejected distance
        distance: usize,
    },
}

/// Upper bound of the packed size of `len` input bytes.
pub fn max_packed_size(len: usize) -> usize {
    len + len.div_ceil(crate::lz::MAX_LITERAL_RUN)
}

/// Greedy single pass compression of `data`.
///
/// Each position is looked up in a fresh [`MatchFinder`]; the first verified
/// 3 byte match is taken and extended as far as it goes.
pub fn pack(data: &[u8]) -> Result<Vec<u8>, PackError> {
    let mut out = Vec::with_capacity(max_packed_size(data.len()));
    let mut finder = MatchFinder::new(data);
    let limit = data.len().saturating_sub(TAIL_LITERALS);
    let bound = data.len().saturating_sub(4);

    let mut anchor = 0;
    let mut pos = 2;
    while pos < limit {
        let Some(reference) = finder.find(pos) else {
            pos += 1;
            continue;
        };
        let distance = pos - reference;
        encode_literals(&data[anchor..pos], &mut out);
        let extension = extend_match(data, reference + 3, pos + 3, bound);
        encode_match(extension as u32, distance as u32, &mut out)?;

        pos += extension;
        finder.insert(pos);
        finder.insert(pos + 1);
        pos += 2;
        anchor = pos;
    }

    encode_literals(&data[anchor..], &mut out);
    Ok(out)
}

/// Counts how far the match continues past its first three bytes.
///
/// The count includes the first mismatching byte: a match token covers
/// `extension + 2` bytes on top of the two already implied, so the
/// mismatch is where the next token starts.
fn extend_match(data: &[u8], mut reference: usize, mut pos: usize, bound: usize) -> usize {
    let start = pos;
    if data[reference..reference + 4] == data[pos..pos + 4] {
        reference += 4;
        pos += 4;
    }
    while pos < bound {
        let equal = data[reference] == data[pos];
        reference += 1;
        pos += 1;
        if !equal {
            break;
        }
    }
    pos - start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lz::{Op, Tokens, unpack};
    use crate::match_finder::MAX_DISTANCE;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn roundtrip(data: &[u8]) -> Vec<u8> {
        let packed = pack(data).unwrap();
        assert_eq!(unpack(&packed, data.len()).unwrap(), data);
        packed
    }

    #[test]
    fn zero_tile_packs_to_three_tokens() {
        let packed = roundtrip(&[0; 256]);
        assert_eq!(packed, [1, 0, 0, 0xe0, 240, 1, 4, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn short_inputs_stay_literal() {
        for len in 0..=16usize {
            let data: Vec<u8> = (0..len as u8).collect();
            let packed = roundtrip(&data);
            assert_eq!(packed.len(), len + len.div_ceil(32));
        }
    }

    #[test]
    fn random_input_stays_within_bound() {
        let mut rng = StdRng::seed_from_u64(1);
        for len in [64usize, 256, 1000, 4096] {
            let mut data = vec![0u8; len];
            rng.fill(&mut data[..]);
            let packed = roundtrip(&data);
            assert!(packed.len() <= max_packed_size(len) + 1);
        }
    }

    #[test]
    fn long_runs_use_overflow_chunks() {
        let packed = roundtrip(&[0x5a; 2048]);
        assert!(packed.len() < 40);
        assert!(packed.windows(2).any(|w| w == [0xe0, 253]));
    }

    #[test]
    fn distant_repeats_outside_window_stay_valid() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut block = vec![0u8; 600];
        rng.fill(&mut block[..]);
        let mut noise = vec![0u8; MAX_DISTANCE + 500];
        rng.fill(&mut noise[..]);
        let data = [&block[..], &noise[..], &block[..]].concat();
        let packed = roundtrip(&data);
        for op in Tokens::new(&packed) {
            if let Op::Match { distance, .. } = op.unwrap() {
                assert!(distance as usize <= MAX_DISTANCE);
            }
        }
    }

    #[test]
    fn match_tokens_never_alias_literals() {
        let mut rng = StdRng::seed_from_u64(3);
        for len in (4..600).step_by(7) {
            let alphabet = rng.gen_range(1..6u8);
            let data: Vec<u8> = (0..len).map(|_| rng.gen_range(0..alphabet)).collect();
            let packed = roundtrip(&data);
            for op in Tokens::new(&packed) {
                if let Op::Match { extension, .. } = op.unwrap() {
                    assert!(extension >= 1);
                }
            }
        }
    }

    #[test]
    fn unique_tail_is_kept_literal() {
        let mut data = vec![0x11u8; 243];
        data.extend(0xf0..0xfd);
        let packed = roundtrip(&data);
        assert_eq!(&packed[packed.len() - 13..], &data[243..]);
    }
}
