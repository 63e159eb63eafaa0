use std::convert::From;
use std::fmt::{self, Display};

use bitvec::prelude::{BitVec, Msb0};

/// The bit sequence assigned to one symbol; `false` is a step to the left
/// child, `true` a step to the right
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Code {
    inner: BitVec<u8, Msb0>,
}

impl Code {
    pub fn new() -> Code {
        Code {
            inner: BitVec::new(),
        }
    }

    pub fn push(&mut self, bit: bool) {
        self.inner.push(bit);
    }

    pub fn pop(&mut self) -> Option<bool> {
        self.inner.pop()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.inner.iter().by_vals()
    }

    /// true if `other` starts with every bit of `self`
    /// (a code is a prefix of itself)
    pub fn is_prefix_of(&self, other: &Code) -> bool {
        self.len() <= other.len()
            && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }

    /// a copy of this code with one more bit on the end
    pub fn with(&self, bit: bool) -> Code {
        let mut extended = self.clone();
        extended.push(bit);
        extended
    }
}

impl From<BitVec<u8, Msb0>> for Code {
    fn from(bv: BitVec<u8, Msb0>) -> Code {
        Code { inner: bv }
    }
}

impl From<&[bool]> for Code {
    fn from(bits: &[bool]) -> Code {
        Code {
            inner: bits.iter().copied().collect(),
        }
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for bit in self.iter() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}
