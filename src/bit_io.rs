//! Bit-granular reading and writing over byte streams.
//!
//! Bits are ordered most significant first within each byte: bit 7
//! (value 128) is the first one read or written.

use std::io::{Bytes, Read, Write};

use crate::error::{Error, Result};

/// Reads single bits and whole bytes from a byte source
///
/// One byte is always buffered ahead, so `is_at_end` can answer without
/// touching the source. A failed read from the source leaves the reader at
/// its end.
pub struct BitReader<R: Read> {
    bytes: Bytes<R>,
    /// the buffered byte, `None` once the source is exhausted
    current: Option<u8>,
    /// unread bits left in `current`, 1..=8 while `current` is `Some`
    remaining: u32,
}

impl<R: Read> BitReader<R> {
    pub fn new(source: R) -> Result<BitReader<R>> {
        let mut reader = BitReader {
            bytes: source.bytes(),
            current: None,
            remaining: 8,
        };
        reader.refill()?;
        Ok(reader)
    }

    /// Loads the next byte into `current` with all 8 bits unread
    fn refill(&mut self) -> Result<()> {
        self.current = None;
        self.remaining = 8;
        self.current = self.next_byte()?;
        Ok(())
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        self.bytes
            .next()
            .transpose()
            .map_err(Error::SourceUnavailable)
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        let byte = self.current.ok_or(Error::EndOfStream)?;
        self.remaining -= 1;
        let bit = (byte >> self.remaining) & 1 == 1;
        if self.remaining == 0 {
            self.refill()?;
        }
        Ok(bit)
    }

    /// reads the next 8 bits, which need not be byte aligned
    pub fn read_byte(&mut self) -> Result<u8> {
        let byte = self.current.ok_or(Error::EndOfStream)?;
        if self.remaining == 8 {
            self.refill()?;
            return Ok(byte);
        }
        let next = self.next_byte()?.ok_or(Error::EndOfStream)?;
        self.current = Some(next);
        // the tail of the old byte followed by the head of the new one;
        // `remaining` is the same afterwards
        Ok((byte << (8 - self.remaining)) | (next >> self.remaining))
    }

    pub fn is_at_end(&self) -> bool {
        self.current.is_none()
    }
}

/// Writes single bits and whole bytes to a byte sink
///
/// Call [`BitWriter::finish`] to write the last partial byte and flush the
/// sink. A writer dropped without `finish` still writes the partial byte,
/// but any error doing so is lost. Pass `&mut sink` to keep using the sink
/// afterwards.
pub struct BitWriter<W: Write> {
    inner: W,
    /// pending bits, right aligned
    buffer: u8,
    /// how many bits of `buffer` are pending, 0..=7
    pending: u32,
}

impl<W: Write> BitWriter<W> {
    pub fn new(sink: W) -> BitWriter<W> {
        BitWriter {
            inner: sink,
            buffer: 0,
            pending: 0,
        }
    }

    fn emit(&mut self, byte: u8) -> Result<()> {
        self.inner
            .write_all(&[byte])
            .map_err(Error::SinkUnavailable)
    }

    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.buffer = (self.buffer << 1) | bit as u8;
        self.pending += 1;
        if self.pending == 8 {
            let byte = self.buffer;
            self.buffer = 0;
            self.pending = 0;
            self.emit(byte)?;
        }
        Ok(())
    }

    /// writes all 8 bits of `value`, whatever the current bit alignment
    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        if self.pending == 0 {
            return self.emit(value);
        }
        let combined = ((self.buffer as u16) << 8) | value as u16;
        let out = (combined >> self.pending) as u8;
        self.buffer = (combined & ((1 << self.pending) - 1)) as u8;
        self.emit(out)
    }

    /// number of bits accepted but not yet written to the sink
    pub fn pending_bits(&self) -> u32 {
        self.pending
    }

    /// Left-justifies any pending bits into a final byte and flushes the
    /// sink. Nothing extra is written when the bit count is a multiple
    /// of 8.
    pub fn finish(mut self) -> Result<()> {
        self.flush_partial()?;
        self.inner.flush().map_err(Error::SinkUnavailable)
    }

    fn flush_partial(&mut self) -> Result<()> {
        if self.pending > 0 {
            let byte = self.buffer << (8 - self.pending);
            self.buffer = 0;
            self.pending = 0;
            self.emit(byte)?;
        }
        Ok(())
    }
}

impl<W: Write> Drop for BitWriter<W> {
    fn drop(&mut self) {
        if self.pending > 0 {
            let _ = self.flush_partial();
            let _ = self.inner.flush();
        }
    }
}

/// Writes the bits of `source` as text: a space between nibbles and
/// ` , ` between bytes
pub fn dump_bits<R: Read, W: Write>(source: R, mut out: W) -> Result<()> {
    let mut reader = BitReader::new(source)?;
    let mut i: u64 = 0;
    while !reader.is_at_end() {
        let sep = if i != 0 && i % 8 == 0 {
            " , "
        } else if i != 0 && i % 4 == 0 {
            " "
        } else {
            ""
        };
        let bit = if reader.read_bit()? { "1" } else { "0" };
        write!(out, "{}{}", sep, bit).map_err(Error::SinkUnavailable)?;
        i += 1;
    }
    writeln!(out).map_err(Error::SinkUnavailable)?;
    out.flush().map_err(Error::SinkUnavailable)
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    /// yields each entry in turn, `None` standing for a read error
    struct Flaky {
        script: Vec<Option<u8>>,
        pos: usize,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let step = match self.script.get(self.pos) {
                Some(step) => *step,
                None => return Ok(0),
            };
            self.pos += 1;
            match step {
                Some(byte) => {
                    buf[0] = byte;
                    Ok(1)
                }
                None => Err(io::Error::new(io::ErrorKind::Other, "flaky")),
            }
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "broken"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "broken"))
        }
    }

    fn written(bits: &[bool]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut w = BitWriter::new(&mut out);
        for &bit in bits {
            w.write_bit(bit).unwrap();
        }
        w.finish().unwrap();
        out
    }

    // "ABC" = 0100 0001 0100 0010 0100 0011
    #[test]
    fn reads_bits_and_unaligned_byte() {
        let mut r = BitReader::new(&b"ABC"[..]).unwrap();
        for &expected in &[false, true, false, false, false, false, false] {
            assert_eq!(r.read_bit().unwrap(), expected);
        }
        // last bit of 'A' then the first seven of 'B': 1010 0001
        assert_eq!(r.read_byte().unwrap(), 161);
        assert_eq!(r.read_bit().unwrap(), false);
        assert_eq!(r.read_byte().unwrap(), b'C');
        assert!(r.is_at_end());
    }

    #[test]
    fn end_of_stream() {
        let mut r = BitReader::new(&[0xff_u8][..]).unwrap();
        assert!(!r.is_at_end());
        for _ in 0..8 {
            assert!(r.read_bit().unwrap());
        }
        assert!(r.is_at_end());
        assert!(matches!(r.read_bit(), Err(Error::EndOfStream)));
        assert!(matches!(r.read_byte(), Err(Error::EndOfStream)));

        let empty = BitReader::new(&[0_u8; 0][..]).unwrap();
        assert!(empty.is_at_end());
    }

    #[test]
    fn unaligned_byte_past_the_end() {
        let mut r = BitReader::new(&[0x80_u8][..]).unwrap();
        assert!(r.read_bit().unwrap());
        assert!(matches!(r.read_byte(), Err(Error::EndOfStream)));
    }

    #[test]
    fn failed_refill_leaves_reader_at_end() {
        let source = Flaky {
            script: vec![Some(0xff), None, Some(0x00)],
            pos: 0,
        };
        let mut r = BitReader::new(source).unwrap();
        for _ in 0..7 {
            assert!(r.read_bit().unwrap());
        }
        assert!(matches!(r.read_bit(), Err(Error::SourceUnavailable(_))));
        assert!(r.is_at_end());
        assert!(matches!(r.read_bit(), Err(Error::EndOfStream)));
        assert!(matches!(r.read_byte(), Err(Error::EndOfStream)));
    }

    #[test]
    fn failed_aligned_byte_read_leaves_reader_at_end() {
        let source = Flaky {
            script: vec![Some(0x41), None],
            pos: 0,
        };
        let mut r = BitReader::new(source).unwrap();
        assert!(matches!(r.read_byte(), Err(Error::SourceUnavailable(_))));
        assert!(matches!(r.read_bit(), Err(Error::EndOfStream)));
    }

    #[test]
    fn failed_unaligned_byte_read_keeps_position() {
        let source = Flaky {
            script: vec![Some(0b1010_0000), None, Some(0xff)],
            pos: 0,
        };
        let mut r = BitReader::new(source).unwrap();
        assert!(r.read_bit().unwrap());
        assert!(matches!(r.read_byte(), Err(Error::SourceUnavailable(_))));
        // still inside the first byte: 010 0000, then 1 from 0xff
        assert_eq!(r.read_byte().unwrap(), 0b0100_0001);
    }

    #[test]
    fn unreadable_source() {
        let source = Flaky {
            script: vec![None],
            pos: 0,
        };
        assert!(matches!(
            BitReader::new(source),
            Err(Error::SourceUnavailable(_))
        ));
    }

    #[test]
    fn writes_abc_with_mixed_calls() {
        let mut out = Vec::new();
        let mut w = BitWriter::new(&mut out);
        for &bit in &[false, true, false, false, false, false, false] {
            w.write_bit(bit).unwrap();
        }
        w.write_byte(161).unwrap();
        w.write_bit(false).unwrap();
        w.write_byte(b'C').unwrap();
        w.finish().unwrap();
        assert_eq!(out, b"ABC".to_vec());
    }

    #[test]
    fn three_bits_then_byte_matches_eleven_bits() {
        let head = [true, false, true];
        let value = 0b0110_1001_u8;

        let mut mixed = Vec::new();
        let mut w = BitWriter::new(&mut mixed);
        for &bit in &head {
            w.write_bit(bit).unwrap();
        }
        w.write_byte(value).unwrap();
        w.finish().unwrap();

        let mut bits = head.to_vec();
        bits.extend((0..8).rev().map(|shift| (value >> shift) & 1 == 1));

        assert_eq!(mixed, written(&bits));
        assert_eq!(mixed, vec![0b1010_1101, 0b0010_0000]);
    }

    #[test]
    fn finish_pads_low_order_bits_only_when_needed() {
        let mut out = Vec::new();
        let mut w = BitWriter::new(&mut out);
        w.write_bit(true).unwrap();
        w.write_bit(true).unwrap();
        assert_eq!(w.pending_bits(), 2);
        w.finish().unwrap();
        assert_eq!(out, vec![0b1100_0000]);

        let mut out = Vec::new();
        let mut w = BitWriter::new(&mut out);
        w.write_byte(0x5a).unwrap();
        assert_eq!(w.pending_bits(), 0);
        w.finish().unwrap();
        assert_eq!(out, vec![0x5a]);

        assert!(written(&[]).is_empty());
    }

    #[test]
    fn drop_flushes_partial_byte() {
        let mut out = Vec::new();
        {
            let mut w = BitWriter::new(&mut out);
            w.write_bit(true).unwrap();
        }
        assert_eq!(out, vec![0x80]);
    }

    #[test]
    fn broken_sink() {
        let mut w = BitWriter::new(Broken);
        for _ in 0..7 {
            w.write_bit(true).unwrap();
        }
        assert!(matches!(w.write_bit(true), Err(Error::SinkUnavailable(_))));
        assert!(matches!(w.write_byte(0), Err(Error::SinkUnavailable(_))));

        let mut w = BitWriter::new(Broken);
        w.write_bit(true).unwrap();
        assert!(matches!(w.finish(), Err(Error::SinkUnavailable(_))));
    }

    #[test]
    fn dump_groups_nibbles_and_bytes() {
        let mut out = Vec::new();
        dump_bits(&b"AB"[..], &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "0100 0001 , 0100 0010\n"
        );
    }
}
