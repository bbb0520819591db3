/*! Sets of bytes used by character classes.

A [`CharSet`] is a 256-bits bitmap, one bit per possible byte value, plus a
polarity flag. When the flag is set the set is inverted, meaning that a byte
belongs to the set if its bit is *not* set. Sets are built by the lexer while
parsing escape sequences like `\d` and bracketed sets like `[^a-z_]`, and
they are immutable once the instruction that uses them has been emitted.
*/

use std::fmt::{Debug, Formatter};

use bitvec::array::BitArray;
use bitvec::order::Lsb0;
use bitvec::slice::BitSlice;

/// Bitmap with one bit per byte value.
pub type Bitmap = BitArray<[u8; 32], Lsb0>;

/// Named classes that can be used in escape sequences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassKind {
    /// `\d`: `0-9`.
    Digit,
    /// `\w`: `0-9`, `A-Z` and `a-z`.
    Alphanumeric,
    /// `\l`: `a-z`.
    Lowercase,
    /// `\a`: `A-Z` and `a-z`.
    Letter,
    /// `\s`: space, tab, line feed, vertical tab, form feed and carriage
    /// return.
    Whitespace,
    /// `\N`: carriage return or line feed.
    CrLf,
    /// `\i`: bytes that can start an identifier (`A-Z`, `a-z` and `_`).
    IdentStart,
    /// `\c`: bytes that can appear in an identifier after the first one.
    IdentContinue,
}

impl ClassKind {
    fn ranges(self) -> &'static [(u8, u8)] {
        match self {
            ClassKind::Digit => &[(b'0', b'9')],
            ClassKind::Alphanumeric => {
                &[(b'0', b'9'), (b'A', b'Z'), (b'a', b'z')]
            }
            ClassKind::Lowercase => &[(b'a', b'z')],
            ClassKind::Letter => &[(b'A', b'Z'), (b'a', b'z')],
            ClassKind::Whitespace => &[(b'\t', b'\r'), (b' ', b' ')],
            ClassKind::CrLf => &[(b'\n', b'\n'), (b'\r', b'\r')],
            ClassKind::IdentStart => {
                &[(b'A', b'Z'), (b'_', b'_'), (b'a', b'z')]
            }
            ClassKind::IdentContinue => {
                &[(b'0', b'9'), (b'A', b'Z'), (b'_', b'_'), (b'a', b'z')]
            }
        }
    }
}

/// A named class, possibly negated (e.g: `\D` is a negated `\d`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Class {
    pub kind: ClassKind,
    pub negated: bool,
}

/// A set of bytes.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct CharSet {
    bits: Bitmap,
    inverted: bool,
}

impl CharSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self { bits: Bitmap::ZERO, inverted: false }
    }

    /// Creates a set that contains the bytes in a named class.
    pub fn from_class(class: Class) -> Self {
        let mut set = Self::new();
        set.add_class(class);
        set
    }

    /// Flips the polarity of the set.
    pub fn invert(&mut self) -> &mut Self {
        self.inverted = !self.inverted;
        self
    }

    /// Returns true if the set is inverted.
    #[inline]
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    pub fn add_byte(&mut self, byte: u8) -> &mut Self {
        self.bits.set(byte as usize, true);
        self
    }

    /// Adds all the bytes in `lo..=hi`.
    pub fn add_range(&mut self, lo: u8, hi: u8) -> &mut Self {
        debug_assert!(lo <= hi);
        self.bits[lo as usize..=hi as usize].fill(true);
        self
    }

    /// Adds the bytes in a named class. A negated class adds every byte
    /// that is not part of the class.
    pub fn add_class(&mut self, class: Class) -> &mut Self {
        if class.negated {
            let mut members = Bitmap::ZERO;
            for (lo, hi) in class.kind.ranges() {
                members[*lo as usize..=*hi as usize].fill(true);
            }
            self.bits |= !members;
        } else {
            for (lo, hi) in class.kind.ranges() {
                self.add_range(*lo, *hi);
            }
        }
        self
    }

    /// Returns true if the set contains `byte`.
    #[inline]
    pub fn contains(&self, byte: u8) -> bool {
        self.bits[byte as usize] ^ self.inverted
    }

    /// If the set contains exactly one byte, returns that byte.
    pub fn single_byte(&self) -> Option<u8> {
        if self.inverted {
            if self.bits.count_zeros() == 1 {
                return self.bits.first_zero().map(|b| b as u8);
            }
        } else if self.bits.count_ones() == 1 {
            return self.bits.first_one().map(|b| b as u8);
        }
        None
    }

    /// Returns the bitmap of the set, ignoring its polarity.
    #[inline]
    pub fn bitmap(&self) -> &[u8; 32] {
        &self.bits.data
    }

    /// Returns the maximal runs of bits set in the bitmap, ignoring the
    /// polarity of the set.
    pub fn ranges(&self) -> Ranges<'_> {
        Ranges { bits: self.bits.as_bitslice(), next: 0 }
    }
}

impl Debug for CharSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        if self.inverted {
            write!(f, "^")?;
        }
        for (lo, hi) in self.ranges() {
            if lo == hi {
                write!(f, "{:#04x}", lo)?;
            } else {
                write!(f, "{:#04x}-{:#04x}", lo, hi)?;
            }
        }
        write!(f, "]")
    }
}

/// Iterator returned by [`CharSet::ranges`].
pub struct Ranges<'a> {
    bits: &'a BitSlice<u8, Lsb0>,
    next: usize,
}

impl<'a> Iterator for Ranges<'a> {
    type Item = (u8, u8);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next + self.bits[self.next..].first_one()?;
        let end = self.bits[start..]
            .first_zero()
            .map_or(self.bits.len(), |len| start + len);
        self.next = end;
        Some((start as u8, (end - 1) as u8))
    }
}
