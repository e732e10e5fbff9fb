pub const HASH_BITS: u32 = 12;
pub const HASH_SIZE: usize = 1 << HASH_BITS;
const HASH_SEED: u32 = 0x9e37_79b9;

/// Furthest back-reference the 13 bit distance field can express.
pub const MAX_DISTANCE: usize = 8192;

/// Direct-mapped index from 3-byte sequences to the most recent position
/// they were seen at.
///
/// Lossy: each bucket keeps a single position and inserts always
/// overwrite. Positions are absolute within one buffer, so a finder must
/// never outlive the buffer it was built for.
pub struct MatchFinder<'a> {
    data: &'a [u8],
    table: Box<[u32; HASH_SIZE]>,
}

impl<'a> MatchFinder<'a> {
    pub fn new(data: &'a [u8]) -> MatchFinder<'a> {
        MatchFinder {
            data,
            table: Box::new([0; HASH_SIZE]),
        }
    }

    /// Low 24 bits of the little-endian word at `pos`.
    pub fn key(&self, pos: usize) -> u32 {
        u32::from_le_bytes([self.data[pos], self.data[pos + 1], self.data[pos + 2], 0])
    }

    pub fn bucket(key: u32) -> usize {
        ((key ^ HASH_SEED) >> 20) as usize & (HASH_SIZE - 1)
    }

    /// Records `pos` in its bucket, returning the previous occupant.
    pub fn insert(&mut self, pos: usize) -> usize {
        let bucket = Self::bucket(self.key(pos));
        std::mem::replace(&mut self.table[bucket], pos as u32) as usize
    }

    /// Inserts `pos` and returns the previous occupant of its bucket if it
    /// really starts the same 3 bytes and lies within [`MAX_DISTANCE`].
    pub fn find(&mut self, pos: usize) -> Option<usize> {
        let candidate = self.insert(pos);
        let distance = pos.checked_sub(candidate)?;
        if distance == 0 || distance > MAX_DISTANCE {
            return None;
        }
        (self.key(candidate) == self.key(pos)).then_some(candidate)
    }
}
