//! Static Huffman coding of byte streams.
//!
//! Encoding produces two artifacts: the serialized code tree and the
//! payload. The payload starts with a padding prefix of `k` one bits and a
//! zero bit (`k` in 0..=7), sized so the prefix plus the codes fill a whole
//! number of bytes, followed by the code of every input byte in order.
//!
//! ```
//! let compressed = htcode::compress(b"abracadabra")?.unwrap();
//! let restored = htcode::decompress(&compressed.tree, &compressed.payload)?;
//! assert_eq!(restored, b"abracadabra");
//! # Ok::<(), htcode::Error>(())
//! ```

use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::{debug, warn};

pub mod bit_io;
pub mod code;
pub mod error;
pub mod tree;

pub use bit_io::{BitReader, BitWriter};
pub use code::Code;
pub use error::{Error, Result};
pub use tree::{Dictionary, HuffmanTree, Node, NodeId};

/// type used to store count of bytes
/// u64 keeps `count * code length` from overflowing on any real input
pub type Count = u64;

/// How often each byte value occurs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: [Count; 256],
}

impl Default for FrequencyTable {
    fn default() -> Self {
        FrequencyTable { counts: [0; 256] }
    }
}

impl FrequencyTable {
    pub fn new() -> FrequencyTable {
        FrequencyTable::default()
    }

    pub fn from_bytes(input: &[u8]) -> FrequencyTable {
        let mut table = FrequencyTable::new();
        for &byte in input {
            table.counts[byte as usize] += 1;
        }
        table
    }

    /// counts every byte `r` yields
    pub fn from_reader<R: Read>(r: R) -> Result<FrequencyTable> {
        let mut table = FrequencyTable::new();
        for byte in r.bytes() {
            let byte = byte.map_err(Error::SourceUnavailable)?;
            table.counts[byte as usize] += 1;
        }
        Ok(table)
    }

    pub fn add(&mut self, value: u8, count: Count) {
        self.counts[value as usize] += count;
    }

    pub fn get(&self, value: u8) -> Count {
        self.counts[value as usize]
    }

    /// sum of all counts, the input length
    pub fn total(&self) -> Count {
        self.counts.iter().sum()
    }

    pub fn distinct(&self) -> usize {
        self.counts.iter().filter(|&&count| count > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&count| count == 0)
    }

    /// nonzero entries in ascending byte order
    pub fn iter(&self) -> impl Iterator<Item = (u8, Count)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count > 0)
            .map(|(value, &count)| (value as u8, count))
    }
}

/// Length of the padding prefix for a payload of `total_bits` code bits,
/// always in 1..=8. A whole byte of padding is used when the codes already
/// fill whole bytes, so the prefix is never empty.
pub fn padding_bits(total_bits: u64) -> u32 {
    8 - (total_bits % 8) as u32
}

fn write_padding<W: Write>(
    out: &mut BitWriter<W>,
    pad_bits: u32,
) -> Result<()> {
    for _ in 1..pad_bits {
        out.write_bit(true)?;
    }
    out.write_bit(false)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodeSummary {
    pub input_len: u64,
    pub distinct_symbols: usize,
    pub tree_bits: u64,
    /// code bits, not counting padding
    pub payload_bits: u64,
    pub pad_bits: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    pub bytes_written: u64,
    /// bits left over at the end that did not complete a code
    pub discarded_bits: u64,
}

/// Encodes `input`, reading it twice: once to count bytes and once to
/// write their codes.
///
/// The sinks are opened through `open_tree` and `open_payload` only once
/// there is something to write, so empty input returns `Ok(None)` without
/// creating either.
pub fn encode<R, T, P>(
    mut input: R,
    open_tree: impl FnOnce() -> io::Result<T>,
    open_payload: impl FnOnce() -> io::Result<P>,
) -> Result<Option<EncodeSummary>>
where
    R: Read + Seek,
    T: Write,
    P: Write,
{
    let frequencies = FrequencyTable::from_reader(&mut input)?;
    let tree = match HuffmanTree::from_frequencies(&frequencies) {
        Some(tree) => tree,
        None => {
            debug!("empty input, nothing to encode");
            return Ok(None);
        }
    };
    debug!(
        input_len = frequencies.total(),
        distinct = frequencies.distinct(),
        "counted byte frequencies"
    );

    let tree_sink = open_tree().map_err(Error::SinkUnavailable)?;
    let mut tree_out = BitWriter::new(tree_sink);
    tree.serialize(&mut tree_out)?;
    tree_out.finish()?;
    debug!(bits = tree.serialized_bits(), "wrote tree");

    let dictionary = tree.dictionary();
    let payload_bits = dictionary.encoded_bits(&frequencies);
    let pad_bits = padding_bits(payload_bits);

    input
        .seek(SeekFrom::Start(0))
        .map_err(Error::SourceUnavailable)?;
    let payload_sink = open_payload().map_err(Error::SinkUnavailable)?;
    let mut payload = BitWriter::new(payload_sink);
    write_padding(&mut payload, pad_bits)?;
    for byte in input.bytes() {
        let byte = byte.map_err(Error::SourceUnavailable)?;
        let code = dictionary.get(byte).ok_or(Error::UnknownSymbol(byte))?;
        for bit in code.iter() {
            payload.write_bit(bit)?;
        }
    }
    payload.finish()?;
    debug!(payload_bits, pad_bits, "wrote payload");

    Ok(Some(EncodeSummary {
        input_len: frequencies.total(),
        distinct_symbols: frequencies.distinct(),
        tree_bits: tree.serialized_bits(),
        payload_bits,
        pad_bits,
    }))
}

/// Decodes a payload with the tree it was encoded with, writing the
/// original bytes to `out`.
///
/// Bytes already written when an error occurs stay written.
pub fn decode<T, P, W>(
    tree_source: T,
    payload_source: P,
    mut out: W,
) -> Result<DecodeSummary>
where
    T: Read,
    P: Read,
    W: Write,
{
    let tree = HuffmanTree::deserialize(&mut BitReader::new(tree_source)?)?;
    if tree.branch(tree.root(), false).is_none() {
        return Err(Error::InvalidTree("root is a leaf"));
    }
    debug!(leaves = tree.leaf_count(), "read tree");

    let mut payload = BitReader::new(payload_source)?;
    skip_padding(&mut payload)?;

    let mut summary = DecodeSummary::default();
    let mut cursor = tree.root();
    let mut depth = 0;
    while !payload.is_at_end() {
        let bit = payload.read_bit()?;
        cursor = tree
            .branch(cursor, bit)
            .ok_or(Error::InvalidTree("walked past a leaf"))?;
        depth += 1;
        if let Node::Leaf(value) = tree.node(cursor) {
            out.write_all(&[value]).map_err(Error::SinkUnavailable)?;
            summary.bytes_written += 1;
            cursor = tree.root();
            depth = 0;
        }
    }
    out.flush().map_err(Error::SinkUnavailable)?;

    if depth > 0 {
        warn!(
            bits = depth,
            "discarded trailing bits that did not complete a code"
        );
        summary.discarded_bits = depth;
    }
    debug!(bytes = summary.bytes_written, "decoded payload");
    Ok(summary)
}

/// consumes ones up to and including the first zero
fn skip_padding<R: Read>(payload: &mut BitReader<R>) -> Result<()> {
    loop {
        match payload.read_bit() {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(Error::EndOfStream) => return Err(Error::MalformedPadding),
            Err(e) => return Err(e),
        }
    }
}

/// Both encoded artifacts, in memory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Compressed {
    pub tree: Vec<u8>,
    pub payload: Vec<u8>,
    pub summary: EncodeSummary,
}

/// [`encode`] over a buffer; `None` for empty input
pub fn compress(input: &[u8]) -> Result<Option<Compressed>> {
    let mut tree = Vec::new();
    let mut payload = Vec::new();
    let tree_sink = &mut tree;
    let payload_sink = &mut payload;
    let summary = encode(
        io::Cursor::new(input),
        move || Ok(tree_sink),
        move || Ok(payload_sink),
    )?;
    Ok(summary.map(|summary| Compressed {
        tree,
        payload,
        summary,
    }))
}

/// [`decode`] into a buffer
pub fn decompress(tree: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decode(tree, payload, &mut out)?;
    Ok(out)
}
