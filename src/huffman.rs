//! Standalone byte-alphabet Huffman coder.
//!
//! Not used by the tile pipeline. Codes are root-to-leaf paths (left = 0)
//! and are packed MSB-first.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HuffmanError {
    #[error("symbol {0:#04x} has no code")]
    MissingSymbol(u8),
    #[error("bit stream ends inside a code")]
    TruncatedBits,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HuffmanTree {
    Leaf {
        symbol: u8,
        freq: u64,
    },
    Node {
        freq: u64,
        left: Box<HuffmanTree>,
        right: Box<HuffmanTree>,
    },
}

impl HuffmanTree {
    pub fn freq(&self) -> u64 {
        match *self {
            HuffmanTree::Leaf { freq, .. } | HuffmanTree::Node { freq, .. } => freq,
        }
    }
}

pub fn count_frequencies(data: &[u8]) -> [u32; 256] {
    let mut freq = [0u32; 256];
    for &byte in data {
        freq[byte as usize] = freq[byte as usize].saturating_add(1);
    }
    freq
}

/// Builds the tree by repeatedly merging the two lightest live nodes.
///
/// Symbols with zero frequency get no leaf; returns `None` when no symbol
/// occurs at all. Ties go to the lower slot, which keeps the result
/// deterministic.
pub fn build_tree(freq: &[u32; 256]) -> Option<HuffmanTree> {
    let mut nodes: Vec<Option<HuffmanTree>> = freq
        .iter()
        .enumerate()
        .map(|(symbol, &freq)| {
            (freq > 0).then_some(HuffmanTree::Leaf {
                symbol: symbol as u8,
                freq: freq as u64,
            })
        })
        .collect();

    loop {
        let mut first: Option<usize> = None;
        let mut second: Option<usize> = None;
        for (index, node) in nodes.iter().enumerate() {
            let Some(node) = node else { continue };
            let lighter = |slot: Option<usize>| {
                slot.and_then(|i| nodes[i].as_ref())
                    .is_none_or(|other| node.freq() < other.freq())
            };
            if lighter(first) {
                second = first;
                first = Some(index);
            } else if lighter(second) {
                second = Some(index);
            }
        }

        let first = first?;
        let Some(second) = second else {
            return nodes[first].take();
        };
        let left = nodes[first].take()?;
        let right = nodes[second].take()?;
        nodes[first] = Some(HuffmanTree::Node {
            freq: left.freq() + right.freq(),
            left: Box::new(left),
            right: Box::new(right),
        });
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Code {
    pub bits: u64,
    pub len: u8,
}

/// Code per symbol; `len == 0` marks symbols without a leaf.
pub struct CodeTable {
    codes: [Code; 256],
}

impl CodeTable {
    pub fn code(&self, symbol: u8) -> Option<Code> {
        let code = self.codes[symbol as usize];
        (code.len > 0).then_some(code)
    }
}

pub fn build_table(tree: &HuffmanTree) -> CodeTable {
    fn walk(tree: &HuffmanTree, bits: u64, len: u8, codes: &mut [Code; 256]) {
        match tree {
            HuffmanTree::Leaf { symbol, .. } => {
                // a lone leaf still needs one bit per symbol
                codes[*symbol as usize] = Code {
                    bits,
                    len: len.max(1),
                };
            }
            HuffmanTree::Node { left, right, .. } => {
                walk(left, bits << 1, len + 1, codes);
                walk(right, (bits << 1) | 1, len + 1, codes);
            }
        }
    }

    let mut codes = [Code::default(); 256];
    walk(tree, 0, 0, &mut codes);
    CodeTable { codes }
}

/// Encoded bytes plus the number of meaningful bits in them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub bit_len: usize,
}

struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    fn write(&mut self, code: Code) {
        for i in (0..code.len).rev() {
            if self.bit_len % 8 == 0 {
                self.bytes.push(0);
            }
            if (code.bits >> i) & 1 != 0 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 0x80 >> (self.bit_len % 8);
            }
            self.bit_len += 1;
        }
    }
}

pub fn encode(data: &[u8], table: &CodeTable) -> Result<Encoded, HuffmanError> {
    let mut writer = BitWriter {
        bytes: Vec::with_capacity(data.len()),
        bit_len: 0,
    };
    for &symbol in data {
        writer.write(table.code(symbol).ok_or(HuffmanError::MissingSymbol(symbol))?);
    }
    Ok(Encoded {
        bytes: writer.bytes,
        bit_len: writer.bit_len,
    })
}

/// Decodes `count` symbols by walking the tree bit by bit.
pub fn decode(tree: &HuffmanTree, bytes: &[u8], count: usize) -> Result<Vec<u8>, HuffmanError> {
    let mut bits = bytes
        .iter()
        .flat_map(|&byte| (0..8).rev().map(move |i| (byte >> i) & 1 != 0));
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        let mut node = tree;
        loop {
            match node {
                HuffmanTree::Leaf { symbol, .. } => {
                    if std::ptr::eq(node, tree) {
                        bits.next().ok_or(HuffmanError::TruncatedBits)?;
                    }
                    out.push(*symbol);
                    break;
                }
                HuffmanTree::Node { left, right, .. } => {
                    let bit = bits.next().ok_or(HuffmanError::TruncatedBits)?;
                    node = if bit { &**right } else { &**left };
                }
            }
        }
    }
    Ok(out)
}
