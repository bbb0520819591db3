/*! Compiled patterns.

A compiled pattern is a sequence of bytes that starts with a header and is
followed by the code executed by the matcher. The header contains everything
the caller needs for sizing the matcher's buffers:

```text
  offset  size        field
  0       3           magic ("BRX")
  3       1           format version
  4       2 (LE)      length of the code
  6       2 (LE)      scratch depth
  8       1           number of capture groups
  9       ceil(n/8)   loop-bound bitmap, bit i is set if capture i is inside
                      a repetition that can iterate more than once
```

The bytes produced by the compiler are the canonical serialization of the
pattern, they can be stored anywhere (including a `static` array) and loaded
back with [`Regex::from_bytes`].
*/

use std::fmt::{Debug, Display, Formatter};

use bitvec::array::BitArray;
use bitvec::order::Lsb0;
use bitvec::slice::BitSlice;
#[cfg(feature = "logging")]
use log::*;

use crate::errors::SerializationError;
use crate::re::instr::{
    apply_offset, fmt_code, Instr, InstrParser, Repeat, MAX_CODE_LEN,
};
use crate::re::UNBOUNDED;

/// Magic bytes at the start of every compiled pattern.
pub const MAGIC: &[u8; 3] = b"BRX";

/// Version of the format produced by this crate.
pub const VERSION: u8 = 1;

/// Length of the header, without the loop-bound bitmap.
pub const FIXED_HEADER_LEN: usize = 9;

/// Maximum length of the header. Patterns have up to 255 captures, and the
/// loop-bound bitmap needs one bit per capture.
pub const MAX_HEADER_LEN: usize = FIXED_HEADER_LEN + 32;

/// Returns the length of the header for a pattern with the given number of
/// capture groups.
#[inline]
pub(crate) fn header_len(num_captures: usize) -> usize {
    FIXED_HEADER_LEN + num_captures.div_ceil(8)
}

/// A compiled pattern.
///
/// This is a read-only view over the bytes produced by
/// [`crate::Compiler::compile`], or loaded with [`Regex::from_bytes`]. It's
/// cheap to copy and can be shared between threads, each thread running its
/// own [`crate::Matcher`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Regex<'a> {
    bytes: &'a [u8],
}

impl<'a> Regex<'a> {
    /// Creates a [`Regex`] from bytes that are known to be valid.
    pub(crate) fn from_bytes_unchecked(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Loads a compiled pattern from bytes previously produced by
    /// [`crate::Compiler::compile`].
    ///
    /// Both the header and the code are validated, as the matcher relies on
    /// the code being well-formed.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self, SerializationError> {
        if bytes.len() < FIXED_HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(SerializationError::InvalidFormat);
        }

        if bytes[3] != VERSION {
            return Err(SerializationError::UnsupportedVersion(bytes[3]));
        }

        let regex = Self { bytes };
        let code_len = u16::from_le_bytes([bytes[4], bytes[5]]) as usize;

        if code_len > MAX_CODE_LEN
            || bytes.len() != header_len(regex.num_captures()) + code_len
        {
            return Err(SerializationError::InvalidFormat);
        }

        validate_code(regex.code(), regex.num_captures())?;

        #[cfg(feature = "logging")]
        debug!(
            "Loaded pattern: {} bytes of code, scratch depth: {}",
            code_len,
            regex.scratch_depth()
        );

        Ok(regex)
    }

    /// Returns the compiled pattern as a slice of bytes, header included.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Maximum number of frames that the matcher can have alive at the same
    /// time while matching this pattern. A frame buffer of this size is
    /// enough for matching any input.
    #[inline]
    pub fn scratch_depth(&self) -> usize {
        u16::from_le_bytes([self.bytes[6], self.bytes[7]]) as usize
    }

    /// Number of capture groups in the pattern.
    #[inline]
    pub fn num_captures(&self) -> usize {
        self.bytes[8] as usize
    }

    /// Returns true if capture group `index` is inside a repetition that can
    /// iterate more than once. Such groups can produce any number of spans
    /// in a single match.
    pub fn capture_in_loop(&self, index: usize) -> bool {
        index < self.num_captures() && self.loop_bound()[index]
    }

    /// Number of capture groups that are not inside a loop. Each of them
    /// produces at most one span, so a capture buffer with this number of
    /// slots is enough for patterns without loop-bound captures.
    pub fn fixed_capture_slots(&self) -> usize {
        self.num_captures() - self.loop_bound()[..self.num_captures()].count_ones()
    }

    /// Returns the code executed by the matcher.
    #[inline]
    pub fn code(&self) -> &'a [u8] {
        &self.bytes[header_len(self.num_captures())..]
    }

    fn loop_bound(&self) -> &'a BitSlice<u8, Lsb0> {
        BitSlice::from_slice(
            &self.bytes[FIXED_HEADER_LEN..header_len(self.num_captures())],
        )
    }
}

impl Display for Regex<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_code(self.code(), f)
    }
}

impl Debug for Regex<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Regex")
            .field("code_len", &self.code().len())
            .field("scratch_depth", &self.scratch_depth())
            .field("num_captures", &self.num_captures())
            .finish()
    }
}

/// Makes sure that the code is something that the compiler could have
/// produced, as far as the matcher is concerned. Every instruction must be
/// valid, jumps can go only forward and must land at the start of some
/// instruction, loops must be well-formed, and the code must end with a
/// single `MATCH`.
fn validate_code(
    code: &[u8],
    num_captures: usize,
) -> Result<(), SerializationError> {
    // One bit per byte of code, set for the bytes where instructions start.
    let mut starts: BitArray<[u64; 512], Lsb0> = BitArray::ZERO;

    let mut addr = 0;
    while addr < code.len() {
        let (_, size) = InstrParser::try_decode_instr(&code[addr..])
            .ok_or(SerializationError::InvalidCode(addr))?;
        starts.set(addr, true);
        addr += size;
    }

    // The last instruction can't be truncated, the decoder would have
    // failed above.
    debug_assert_eq!(addr, code.len());

    let is_start = |target: usize| target < code.len() && starts[target];
    let mut ends_with_match = false;

    for (instr, addr) in InstrParser::new(code) {
        let invalid = SerializationError::InvalidCode(addr);

        if ends_with_match {
            // Some instruction after MATCH.
            return Err(invalid);
        }

        match instr {
            Instr::Match => ends_with_match = true,
            Instr::Split(offset) | Instr::Jump(offset) => {
                if offset <= 0 || !is_start(apply_offset(addr, offset)) {
                    return Err(invalid);
                }
            }
            Instr::CaptureStart(index) | Instr::CaptureEnd(index) => {
                if index as usize >= num_captures {
                    return Err(invalid);
                }
            }
            Instr::Repeat(repeat) => {
                if repeat.max == 0
                    || repeat.min == UNBOUNDED
                    || (repeat.max != UNBOUNDED && repeat.min > repeat.max)
                    || (repeat.keep_frames
                        && (repeat.single_byte || repeat.max == UNBOUNDED))
                {
                    return Err(invalid);
                }
                let body = addr + Repeat::SIZE;
                let end = body + repeat.body_len as usize;
                if !is_start(body) || !is_start(end) {
                    return Err(invalid);
                }
                let (body_instr, body_size) =
                    InstrParser::decode_instr(&code[body..]);
                if repeat.single_byte {
                    if !body_instr.is_single_byte()
                        || body_size != repeat.body_len as usize
                    {
                        return Err(invalid);
                    }
                } else {
                    // The body of general loops ends with a REPEAT_END
                    // pointing back to this instruction.
                    let last = end
                        .checked_sub(4)
                        .filter(|last| *last > body && starts[*last]);
                    match last
                        .map(|last| (last, InstrParser::decode_instr(&code[last..]).0))
                    {
                        Some((last, Instr::RepeatEnd(offset)))
                            if apply_offset(last, offset) == addr => {}
                        _ => return Err(invalid),
                    }
                }
            }
            Instr::RepeatEnd(offset) => {
                let target = apply_offset(addr, offset);
                if offset >= 0 || !is_start(target) {
                    return Err(invalid);
                }
                match InstrParser::decode_instr(&code[target..]) {
                    (Instr::Repeat(repeat), _)
                        if !repeat.single_byte
                            && target
                                + Repeat::SIZE
                                + repeat.body_len as usize
                                == addr + 4 => {}
                    _ => return Err(invalid),
                }
            }
            Instr::Byte(_)
            | Instr::AnyByte
            | Instr::ClassBitmap(_)
            | Instr::ClassRanges(_)
            | Instr::Start
            | Instr::End => {}
        }
    }

    if !ends_with_match {
        return Err(SerializationError::InvalidCode(code.len()));
    }

    #[cfg(feature = "logging")]
    trace!("Validated {} bytes of code", code.len());

    Ok(())
}
