use thiserror::Error;

use crate::PackError;
use crate::match_finder::MAX_DISTANCE;

/// Longest literal run a single token can carry.
pub const MAX_LITERAL_RUN: usize = 32;
/// Largest extension a single match token can carry.
pub const MAX_EXTENSION: u32 = 262;

/// Most output bytes one byte of packed stream can decode to: a three byte
/// match token covers at most 264.
pub const MAX_EXPANSION: usize = (MAX_EXTENSION as usize + 2) / 3;

const LONG_EXTENSION: u8 = 7;
const OVERFLOW_EXTRA: u8 = (MAX_EXTENSION - LONG_EXTENSION as u32 - 2) as u8;

/// One token of the compressed stream.
///
/// A control byte below 32 starts a literal run of `control + 1` bytes.
/// Anything else is a match: bits 7..5 hold the extension (7 means an
/// extension byte follows), bits 4..0 the high bits of `distance - 1`,
/// and the low distance byte comes last.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op<'a> {
    Literal(&'a [u8]),
    Match { extension: u32, distance: u32 },
}

impl<'a> Op<'a> {
    /// Number of output bytes this token produces.
    pub fn len(&self) -> usize {
        match *self {
            Op::Literal(bytes) => bytes.len(),
            Op::Match { extension, .. } => extension as usize + 2,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match *self {
            Op::Literal(bytes) => {
                assert!((1..=MAX_LITERAL_RUN).contains(&bytes.len()));
                out.push(bytes.len() as u8 - 1);
                out.extend_from_slice(bytes);
            }
            Op::Match {
                extension,
                distance,
            } => {
                // extension 0 with a short distance would alias a literal control byte
                assert!((1..=MAX_EXTENSION).contains(&extension));
                assert!(distance >= 1 && distance as usize <= MAX_DISTANCE);
                let distance = distance - 1;
                let high = (distance >> 8) as u8;
                if extension < LONG_EXTENSION as u32 {
                    out.push(((extension as u8) << 5) | high);
                } else {
                    out.push((LONG_EXTENSION << 5) | high);
                    out.push((extension - LONG_EXTENSION as u32) as u8);
                }
                out.push(distance as u8);
            }
        }
    }
}

/// Appends `literals` as runs of at most [`MAX_LITERAL_RUN`] bytes.
pub fn encode_literals(literals: &[u8], out: &mut Vec<u8>) {
    for run in literals.chunks(MAX_LITERAL_RUN) {
        Op::Literal(run).encode(out);
    }
}

/// Appends a back-reference covering `extension + 2` bytes, split into
/// overflow chunks while the extension exceeds [`MAX_EXTENSION`].
///
/// Nothing is written when `distance` is outside `1..=MAX_DISTANCE`.
pub fn encode_match(
    mut extension: u32,
    distance: u32,
    out: &mut Vec<u8>,
) -> Result<(), PackError> {
    if distance == 0 || distance as usize > MAX_DISTANCE {
        return Err(PackError::UnsupportedDistance {
            distance: distance as usize,
        });
    }
    while extension > MAX_EXTENSION {
        let high = ((distance - 1) >> 8) as u8;
        out.extend_from_slice(&[
            (LONG_EXTENSION << 5) | high,
            OVERFLOW_EXTRA,
            (distance - 1) as u8,
        ]);
        extension -= MAX_EXTENSION;
    }
    Op::Match {
        extension,
        distance,
    }
    .encode(out);
    Ok(())
}

/// The error type for the decompression functions
#[derive(Error, Debug, PartialEq, Eq)]
pub enum UnpackError {
    /// a token needs more bytes than the packed data holds
    #[error("truncated stream: token needs {needed} bytes, {available} left")]
    TruncatedStream {
        /// bytes the token requires
        needed: usize,
        /// bytes left in the packed data
        available: usize,
    },
    /// a token would write past the declared output length
    #[error("output overrun: {size} > {limit}")]
    OutputOverrun {
        /// output length after the offending token
        size: usize,
        /// the declared output length
        limit: usize,
    },
    /// a match distance pointing before the start of the output
    #[error("match offset out of range: {offset} > {position}")]
    OffsetOutOfRange {
        /// the match distance
        offset: usize,
        /// the current output position
        position: usize,
    },
    /// packed data left over after the declared length was produced
    #[error("{remaining} trailing bytes after end of output")]
    TrailingData {
        /// unread packed bytes
        remaining: usize,
    },
}

/// Iterator over the tokens of a packed stream.
pub struct Tokens<'a> {
    data: &'a [u8],
}

impl<'a> Tokens<'a> {
    pub fn new(data: &'a [u8]) -> Tokens<'a> {
        Tokens { data }
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], UnpackError> {
        if needed > self.data.len() {
            return Err(UnpackError::TruncatedStream {
                needed,
                available: self.data.len(),
            });
        }
        let (head, tail) = self.data.split_at(needed);
        self.data = tail;
        Ok(head)
    }

    fn parse(&mut self) -> Result<Op<'a>, UnpackError> {
        let control = self.take(1)?[0];
        if control < MAX_LITERAL_RUN as u8 {
            return Ok(Op::Literal(self.take(control as usize + 1)?));
        }
        let mut extension = (control >> 5) as u32;
        if extension == LONG_EXTENSION as u32 {
            extension += self.take(1)?[0] as u32;
        }
        let low = self.take(1)?[0] as u32;
        Ok(Op::Match {
            extension,
            distance: ((control as u32 & 31) << 8 | low) + 1,
        })
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Result<Op<'a>, UnpackError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }
        let op = self.parse();
        if op.is_err() {
            self.data = &[];
        }
        Some(op)
    }
}

/// Uncompress a packed stream that expands to exactly `size` bytes.
pub fn unpack(packed_data: &[u8], size: usize) -> Result<Vec<u8>, UnpackError> {
    let mut result = vec![0; size];
    unpack_into(packed_data, &mut result)?;
    Ok(result)
}

/// Uncompress into `output`, whose length is the declared unpacked size.
pub fn unpack_into(packed_data: &[u8], output: &mut [u8]) -> Result<(), UnpackError> {
    let mut tokens = Tokens::new(packed_data);
    let mut position = 0usize;

    while position < output.len() {
        let op = tokens.next().unwrap_or(Err(UnpackError::TruncatedStream {
            needed: 1,
            available: 0,
        }))?;
        let end = position + op.len();
        if end > output.len() {
            return Err(UnpackError::OutputOverrun {
                size: end,
                limit: output.len(),
            });
        }
        match op {
            Op::Literal(bytes) => output[position..end].copy_from_slice(bytes),
            Op::Match { distance, .. } => {
                let offset = distance as usize;
                if offset > position {
                    return Err(UnpackError::OffsetOutOfRange { offset, position });
                }
                // overlapping copies repeat the pattern, so go byte by byte
                for i in position..end {
                    output[i] = output[i - offset];
                }
            }
        }
        position = end;
    }

    match tokens.remaining() {
        0 => Ok(()),
        remaining => Err(UnpackError::TrailingData { remaining }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(packed: &[u8]) -> Vec<Op> {
        Tokens::new(packed).collect::<Result<_, _>>().unwrap()
    }

    #[test]
    fn literal_control_is_length_minus_one() {
        let mut out = vec![];
        encode_literals(&[9; 40], &mut out);
        assert_eq!(out[0], 31);
        assert_eq!(out[33], 7);
        assert_eq!(out.len(), 42);
    }

    #[test]
    fn short_match_layout() {
        let mut out = vec![];
        encode_match(3, 0x123, &mut out).unwrap();
        assert_eq!(out, [(3 << 5) | 0x01, 0x22]);
        assert_eq!(
            ops(&out),
            [Op::Match {
                extension: 3,
                distance: 0x123
            }]
        );
    }

    #[test]
    fn long_match_layout() {
        let mut out = vec![];
        encode_match(20, 8192, &mut out).unwrap();
        assert_eq!(out, [0xff, 13, 0xff]);
        assert_eq!(ops(&out)[0].len(), 22);
    }

    #[test]
    fn overflowing_match_is_chunked() {
        let mut out = vec![];
        encode_match(MAX_EXTENSION + 10, 1, &mut out).unwrap();
        assert_eq!(out, [0xe0, 253, 0, 0xe0, 3, 0]);
        let total: usize = ops(&out).iter().map(Op::len).sum();
        assert_eq!(total, MAX_EXTENSION as usize + 12);
    }

    #[test]
    fn expansion_is_bounded() {
        let mut packed = vec![];
        encode_literals(&[0], &mut packed);
        encode_match(MAX_EXTENSION * 40, 1, &mut packed).unwrap();
        let output = unpack(&packed, MAX_EXTENSION as usize * 40 + 3).unwrap();
        assert!(output.iter().all(|&b| b == 0));
        assert!(output.len() <= MAX_EXPANSION * packed.len());
    }

    #[test]
    fn distance_outside_window_is_rejected() {
        let mut out = vec![];
        for distance in [0, MAX_DISTANCE as u32 + 1] {
            assert_eq!(
                encode_match(MAX_EXTENSION + 10, distance, &mut out),
                Err(PackError::UnsupportedDistance {
                    distance: distance as usize
                })
            );
        }
        assert!(out.is_empty());
    }

    #[test]
    fn self_overlapping_match_repeats_pattern() {
        let mut packed = vec![];
        encode_literals(b"ab", &mut packed);
        encode_match(6, 2, &mut packed).unwrap();
        assert_eq!(unpack(&packed, 10).unwrap(), b"ababababab");
    }

    #[test]
    fn truncated_literal_is_rejected() {
        assert_eq!(
            unpack(&[4, 1, 2], 5),
            Err(UnpackError::TruncatedStream {
                needed: 5,
                available: 2
            })
        );
    }

    #[test]
    fn missing_tokens_are_rejected() {
        assert!(matches!(
            unpack(&[0, 1], 4),
            Err(UnpackError::TruncatedStream { .. })
        ));
    }

    #[test]
    fn overrun_is_rejected() {
        assert_eq!(
            unpack(&[3, 1, 2, 3, 4], 2),
            Err(UnpackError::OutputOverrun { size: 4, limit: 2 })
        );
    }

    #[test]
    fn reference_before_start_is_rejected() {
        assert_eq!(
            unpack(&[0, 7, 0x20, 4], 4),
            Err(UnpackError::OffsetOutOfRange {
                offset: 5,
                position: 1
            })
        );
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        assert_eq!(
            unpack(&[0, 7, 0, 8], 1),
            Err(UnpackError::TrailingData { remaining: 2 })
        );
    }

    #[test]
    fn empty_stream_for_empty_output() {
        assert_eq!(unpack(&[], 0).unwrap(), Vec::<u8>::new());
    }
}
