/*!
This module defines the instructions executed by the backtracking matcher,
along with various types that aid in generating and decoding sequences of
instructions.

Instruction encoding format
---------------------------

For most regular expressions the code consists in long sequences of
instructions that match specific bytes. For instance, the regexp `abc.def`
could be represented by the following code:

```text
  match 'a'
  match 'b'
  match 'c'
  match any byte except newline
  match 'd'
  match 'e'
  match 'f'
```

Instead of employing a separate match opcode followed by the byte to be
matched, the byte is included directly in the instruction stream. Any other
instruction starts with a special marker that indicates that the subsequent
byte should be interpreted as an opcode. This marker is [`OPCODE_PREFIX`],
which is `0xAA` due to its relative infrequency in real-life patterns. The
example above is encoded as:

```text
    0x61  0x62  0x63  0xAA     0x03     0x64   0x65  0x66
     a     b     c   marker  any byte    d       e     f
 ```

Matching the `0xAA` byte itself is represented by including `0xAA` twice in
the instruction stream, which implies that `0xAA` can't be an opcode.

Loops
-----

A repetition is a `REPEAT` instruction followed by the code of its body. The
`REPEAT` instruction contains the bounds of the repetition, whether it is
greedy, and the length of the body, so that the matcher knows where the code
that follows the loop starts. The body ends with a `REPEAT_END` instruction
that points back to the `REPEAT`. When the body is a single instruction that
always consumes exactly one byte (a literal, `.` or a class) the loop is
flagged as a single-byte loop and `REPEAT_END` is omitted, as the matcher
handles the whole loop while executing `REPEAT`.

Loops with a finite upper bound whose body leaves choice-points behind are
flagged as `KEEP_FRAMES`. The matcher keeps those choice-points when an
iteration completes, so backtracking can resume inside a completed
iteration. Every other loop commits its iterations.
 */

use std::fmt::Formatter;
use std::mem::size_of;

use bitvec::order::Lsb0;
use bitvec::slice::{BitSlice, IterOnes};

use crate::re::UNBOUNDED;

/// Marker that indicates the start of some opcode.
pub const OPCODE_PREFIX: u8 = 0xAA;

/// Offset for jump, split and loop instructions. The offset is always
/// relative to the address where the instruction starts.
pub type Offset = i16;

/// Maximum length of the code for a single regexp. Every location within
/// the code must be reachable with an [`Offset`].
pub const MAX_CODE_LEN: usize = Offset::MAX as usize;

/// Instructions supported by the matcher.
pub enum Instr<'a> {
    /// Match for the regexp has been found.
    Match,

    /// Matches any byte except line feed.
    AnyByte,

    /// Matches a specific byte.
    Byte(u8),

    /// Matches a byte class represented by a 256-bits bitmap, one bit per
    /// byte. This instruction takes 3 bytes for the opcode and the flags,
    /// plus 32 bytes for the bitmap. For classes with a low number of
    /// non-adjacent byte ranges `ClassRanges` is preferred due to its more
    /// compact representation.
    ClassBitmap(ClassBitmap<'a>),

    /// Matches a byte class represented by 1 or more byte ranges. After the
    /// opcode and the flags comes a `u8` with the number of ranges, then
    /// one pair `[u8, u8]` per range, indicating starting and ending bytes,
    /// both inclusive.
    ClassRanges(ClassRanges<'a>),

    /// Continues at the next instruction, but creates a choice-point that
    /// resumes the execution at instruction pointer + offset when the
    /// matcher backtracks.
    Split(Offset),

    /// Relative jump.
    Jump(Offset),

    /// Starts a loop. See [`Repeat`].
    Repeat(Repeat),

    /// Ends an iteration of the loop that starts at instruction
    /// pointer + offset.
    RepeatEnd(Offset),

    /// Opens the capture group with the given index.
    CaptureStart(u8),

    /// Closes the capture group with the given index.
    CaptureEnd(u8),

    /// Matches the start of the input (^).
    Start,

    /// Matches the end of the input ($).
    End,
}

impl<'a> Instr<'a> {
    pub const MATCH: u8 = 0x00;
    pub const SPLIT: u8 = 0x01;
    pub const JUMP: u8 = 0x02;
    pub const ANY_BYTE: u8 = 0x03;
    pub const CLASS_BITMAP: u8 = 0x04;
    pub const CLASS_RANGES: u8 = 0x05;
    pub const START: u8 = 0x06;
    pub const END: u8 = 0x07;
    pub const REPEAT: u8 = 0x08;
    pub const REPEAT_END: u8 = 0x09;
    pub const CAPTURE_START: u8 = 0x0A;
    pub const CAPTURE_END: u8 = 0x0B;

    /// Returns true if the instruction consumes exactly one byte.
    #[inline]
    pub fn is_single_byte(&self) -> bool {
        matches!(
            self,
            Instr::Byte(_)
                | Instr::AnyByte
                | Instr::ClassBitmap(_)
                | Instr::ClassRanges(_)
        )
    }

    /// For instructions that consume exactly one byte, returns true if
    /// `byte` is accepted. Returns false for any other instruction.
    #[inline]
    pub fn matches_byte(&self, byte: u8) -> bool {
        match self {
            Instr::Byte(b) => *b == byte,
            Instr::AnyByte => byte != b'\n',
            Instr::ClassBitmap(class) => class.contains(byte),
            Instr::ClassRanges(class) => class.contains(byte),
            _ => false,
        }
    }
}

/// Operands of a [`Instr::Repeat`] instruction.
///
/// The instruction is encoded as the opcode followed by a flags byte, the
/// minimum and maximum number of repetitions, and a `u16` with the length of
/// the body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Repeat {
    pub min: u8,
    /// Maximum number of repetitions. [`UNBOUNDED`] means that there's no
    /// upper bound.
    pub max: u8,
    pub greedy: bool,
    /// The body is a single instruction that consumes exactly one byte.
    pub single_byte: bool,
    /// Completed iterations keep the frames pushed by the body. Only loops
    /// with a finite upper bound can have this flag.
    pub keep_frames: bool,
    /// Length of the body, including the trailing `REPEAT_END` if any.
    pub body_len: u16,
}

impl Repeat {
    pub const GREEDY: u8 = 0x01;
    pub const SINGLE_BYTE: u8 = 0x02;
    pub const KEEP_FRAMES: u8 = 0x04;

    /// Size of the encoded instruction.
    pub const SIZE: usize = 2 + 3 + size_of::<u16>();

    /// Returns true if the loop can perform another iteration after
    /// completing `count` of them.
    #[inline]
    pub fn allows_more(&self, count: usize) -> bool {
        self.max == UNBOUNDED || count < self.max as usize
    }

    #[inline]
    pub fn min(&self) -> usize {
        self.min as usize
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut flags = 0;
        if self.greedy {
            flags |= Self::GREEDY;
        }
        if self.single_byte {
            flags |= Self::SINGLE_BYTE;
        }
        if self.keep_frames {
            flags |= Self::KEEP_FRAMES;
        }
        let [lo, hi] = self.body_len.to_le_bytes();
        [OPCODE_PREFIX, Instr::REPEAT, flags, self.min, self.max, lo, hi]
    }
}

/// Flag that indicates that a class is inverted.
pub const CLASS_NEGATED: u8 = 0x01;

/// Parses a slice of bytes that contains instructions, returning individual
/// instructions and their locations.
pub(crate) struct InstrParser<'a> {
    code: &'a [u8],
    addr: usize,
}

impl<'a> InstrParser<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self { code, addr: 0 }
    }

    /// Decodes the instruction at the start of `code`, returning the
    /// instruction and its size.
    ///
    /// # Panics
    ///
    /// If the code is malformed. Code produced by the compiler, or accepted
    /// by [`crate::Regex::from_bytes`], is never malformed.
    #[inline(always)]
    pub fn decode_instr(code: &[u8]) -> (Instr, usize) {
        match Self::try_decode_instr(code) {
            Some(decoded) => decoded,
            None => unreachable!("malformed regexp code"),
        }
    }

    /// Like [`InstrParser::decode_instr`], but returns [`None`] if the code
    /// is malformed or truncated.
    pub fn try_decode_instr(code: &[u8]) -> Option<(Instr, usize)> {
        let decoded = match code[..] {
            [OPCODE_PREFIX, OPCODE_PREFIX, ..] => {
                (Instr::Byte(OPCODE_PREFIX), 2)
            }
            [OPCODE_PREFIX, Instr::MATCH, ..] => (Instr::Match, 2),
            [OPCODE_PREFIX, Instr::ANY_BYTE, ..] => (Instr::AnyByte, 2),
            [OPCODE_PREFIX, Instr::START, ..] => (Instr::Start, 2),
            [OPCODE_PREFIX, Instr::END, ..] => (Instr::End, 2),
            [OPCODE_PREFIX, Instr::SPLIT, lo, hi, ..] => {
                (Instr::Split(Offset::from_le_bytes([lo, hi])), 4)
            }
            [OPCODE_PREFIX, Instr::JUMP, lo, hi, ..] => {
                (Instr::Jump(Offset::from_le_bytes([lo, hi])), 4)
            }
            [OPCODE_PREFIX, Instr::REPEAT_END, lo, hi, ..] => {
                (Instr::RepeatEnd(Offset::from_le_bytes([lo, hi])), 4)
            }
            [OPCODE_PREFIX, Instr::CAPTURE_START, index, ..] => {
                (Instr::CaptureStart(index), 3)
            }
            [OPCODE_PREFIX, Instr::CAPTURE_END, index, ..] => {
                (Instr::CaptureEnd(index), 3)
            }
            [OPCODE_PREFIX, Instr::REPEAT, flags, min, max, lo, hi, ..] => (
                Instr::Repeat(Repeat {
                    min,
                    max,
                    greedy: flags & Repeat::GREEDY != 0,
                    single_byte: flags & Repeat::SINGLE_BYTE != 0,
                    keep_frames: flags & Repeat::KEEP_FRAMES != 0,
                    body_len: u16::from_le_bytes([lo, hi]),
                }),
                Repeat::SIZE,
            ),
            [OPCODE_PREFIX, Instr::CLASS_BITMAP, flags, ref bitmap @ ..]
                if bitmap.len() >= 32 =>
            {
                (
                    Instr::ClassBitmap(ClassBitmap {
                        negated: flags & CLASS_NEGATED != 0,
                        bitmap: &bitmap[..32],
                    }),
                    3 + 32,
                )
            }
            [OPCODE_PREFIX, Instr::CLASS_RANGES, flags, n, ref ranges @ ..]
                if ranges.len() >= 2 * n as usize =>
            {
                (
                    Instr::ClassRanges(ClassRanges {
                        negated: flags & CLASS_NEGATED != 0,
                        ranges: &ranges[..2 * n as usize],
                    }),
                    4 + 2 * n as usize,
                )
            }
            [OPCODE_PREFIX, ..] => return None,
            [b, ..] => (Instr::Byte(b), 1),
            [] => return None,
        };
        Some(decoded)
    }
}

impl<'a> Iterator for InstrParser<'a> {
    type Item = (Instr<'a>, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.code.is_empty() {
            return None;
        }
        let (instr, size) = InstrParser::decode_instr(self.code);
        let addr = self.addr;
        self.addr += size;
        self.code = &self.code[size..];
        Some((instr, addr))
    }
}

/// Returns the location resulting from applying `offset` to `ip`.
#[inline]
pub(crate) fn apply_offset(ip: usize, offset: Offset) -> usize {
    ip.wrapping_add_signed(offset.into())
}

pub struct ClassRanges<'a> {
    negated: bool,
    ranges: &'a [u8],
}

impl<'a> ClassRanges<'a> {
    /// Returns an iterator over the ranges of bytes in the class, without
    /// taking into account if the class is negated or not.
    pub fn ranges(&self) -> Ranges<'a> {
        Ranges(self.ranges)
    }

    #[inline]
    pub fn negated(&self) -> bool {
        self.negated
    }

    /// Returns true if the class contains the given byte.
    pub fn contains(&self, byte: u8) -> bool {
        self.ranges().any(|(lo, hi)| (lo..=hi).contains(&byte)) ^ self.negated
    }
}

pub struct Ranges<'a>(&'a [u8]);

impl<'a> Iterator for Ranges<'a> {
    type Item = (u8, u8);

    fn next(&mut self) -> Option<Self::Item> {
        match self.0 {
            [start, end, rest @ ..] => {
                self.0 = rest;
                Some((*start, *end))
            }
            _ => None,
        }
    }
}

pub struct ClassBitmap<'a> {
    negated: bool,
    bitmap: &'a [u8],
}

impl<'a> ClassBitmap<'a> {
    /// Returns an iterator over the bytes whose bit is set, without taking
    /// into account if the class is negated or not.
    pub fn bytes(&self) -> IterOnes<'a, u8, Lsb0> {
        BitSlice::<_, Lsb0>::from_slice(self.bitmap).iter_ones()
    }

    #[inline]
    pub fn negated(&self) -> bool {
        self.negated
    }

    /// Returns true if the class contains the given byte.
    #[inline]
    pub fn contains(&self, byte: u8) -> bool {
        BitSlice::<_, Lsb0>::from_slice(self.bitmap)[byte as usize]
            ^ self.negated
    }
}

/// Writes a human-readable listing of `code`. Used for implementing
/// `Display` in the compiler's instruction sequence and in
/// [`crate::Regex`].
pub(crate) fn fmt_code(code: &[u8], f: &mut Formatter<'_>) -> std::fmt::Result {
    writeln!(f)?;

    for (instr, addr) in InstrParser::new(code) {
        match instr {
            Instr::AnyByte => {
                writeln!(f, "{:05x}: ANY_BYTE", addr)?;
            }
            Instr::Byte(byte) => {
                writeln!(f, "{:05x}: LIT {:#04x}", addr, byte)?;
            }
            Instr::ClassRanges(class) => {
                write!(f, "{:05x}: CLASS_RANGES ", addr)?;
                if class.negated() {
                    write!(f, "NEG ")?;
                }
                for range in class.ranges() {
                    write!(f, "[{:#04x}-{:#04x}] ", range.0, range.1)?;
                }
                writeln!(f)?;
            }
            Instr::ClassBitmap(class) => {
                write!(f, "{:05x}: CLASS_BITMAP ", addr)?;
                if class.negated() {
                    write!(f, "NEG ")?;
                }
                for byte in class.bytes() {
                    write!(f, "{:#04x} ", byte)?;
                }
                writeln!(f)?;
            }
            Instr::Jump(offset) => {
                writeln!(
                    f,
                    "{:05x}: JUMP {:05x}",
                    addr,
                    apply_offset(addr, offset)
                )?;
            }
            Instr::Split(offset) => {
                writeln!(
                    f,
                    "{:05x}: SPLIT {:05x}",
                    addr,
                    apply_offset(addr, offset)
                )?;
            }
            Instr::Repeat(repeat) => {
                write!(
                    f,
                    "{:05x}: {}{} {{{},",
                    addr,
                    if repeat.single_byte {
                        "REPEAT_BYTE"
                    } else if repeat.keep_frames {
                        "REPEAT_KEEP"
                    } else {
                        "REPEAT"
                    },
                    if repeat.greedy { "" } else { "_NON_GREEDY" },
                    repeat.min,
                )?;
                if repeat.max != UNBOUNDED {
                    write!(f, "{}", repeat.max)?;
                }
                writeln!(
                    f,
                    "}} {:05x}",
                    addr + Repeat::SIZE + repeat.body_len as usize
                )?;
            }
            Instr::RepeatEnd(offset) => {
                writeln!(
                    f,
                    "{:05x}: REPEAT_END {:05x}",
                    addr,
                    apply_offset(addr, offset)
                )?;
            }
            Instr::CaptureStart(index) => {
                writeln!(f, "{:05x}: CAPTURE_START {}", addr, index)?;
            }
            Instr::CaptureEnd(index) => {
                writeln!(f, "{:05x}: CAPTURE_END {}", addr, index)?;
            }
            Instr::Start => {
                writeln!(f, "{:05x}: START", addr)?;
            }
            Instr::End => {
                writeln!(f, "{:05x}: END", addr)?;
            }
            Instr::Match => {
                writeln!(f, "{:05x}: MATCH", addr)?;
                break;
            }
        };
    }

    Ok(())
}
