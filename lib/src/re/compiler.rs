/*! Compiles patterns into code for the backtracking matcher.

The compiler is a recursive-descent parser that emits code while it parses,
directly into the buffer provided by the caller. Each grammar production
returns the [`Props`] of the expression it compiled, which are used for
rejecting repetitions of expressions that can match the empty string, and for
computing how many backtracking frames the matcher will need.

The code for an expression is always emitted before it's known whether the
expression is followed by a quantifier, or is the first alternative of an
alternation. In those cases the `REPEAT` or `SPLIT` instruction is inserted
in front of the already emitted code, shifting it forward. Offsets are
relative to the instruction that contains them, so shifting a block of code
doesn't invalidate the offsets within the block.
*/

use std::fmt::{Display, Formatter};
use std::mem::size_of;

use bitvec::array::BitArray;
use bitvec::order::Lsb0;
#[cfg(feature = "logging")]
use bstr::BStr;
#[cfg(feature = "logging")]
use log::*;

use crate::errors::{ErrorKind, SyntaxError};
use crate::re::charset::CharSet;
use crate::re::instr::{
    fmt_code, Instr, InstrParser, Offset, Repeat, CLASS_NEGATED,
    MAX_CODE_LEN, OPCODE_PREFIX,
};
use crate::re::parser::{Lexer, TokenKind};
use crate::re::{DEFAULT_MAX_NESTING_DEPTH, UNBOUNDED};
use crate::regex::{header_len, Regex, FIXED_HEADER_LEN, MAGIC, VERSION};

/// Compiles patterns into [`Regex`].
///
/// # Example
///
/// ```
/// # use brex::Compiler;
/// let mut buf = [0; 64];
/// let regex = Compiler::new().compile(b"<[a-z]+>=\\d", &mut buf).unwrap();
///
/// assert_eq!(regex.num_captures(), 1);
/// assert_eq!(regex.scratch_depth(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct Compiler {
    max_nesting_depth: usize,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// Creates a new compiler.
    pub fn new() -> Self {
        Self { max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH }
    }

    /// Maximum level of nesting for groups. Patterns with groups nested
    /// deeper than this fail with [`ErrorKind::NestingTooDeep`]. This also
    /// bounds the recursion depth of the compiler itself.
    ///
    /// The default value is [`DEFAULT_MAX_NESTING_DEPTH`].
    pub fn max_nesting_depth(&mut self, depth: usize) -> &mut Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Compiles a pattern, writing the result to `buf`.
    ///
    /// The returned [`Regex`] borrows the part of `buf` that contains the
    /// compiled pattern. If the compiled pattern doesn't fit in `buf` the
    /// result is an error of kind [`ErrorKind::TooLarge`].
    pub fn compile<'b>(
        &self,
        pattern: &[u8],
        buf: &'b mut [u8],
    ) -> Result<Regex<'b>, SyntaxError> {
        let mut state = State {
            lexer: Lexer::new(pattern),
            code: InstrSeq::new(buf),
            num_captures: 0,
            loop_bound: BitArray::ZERO,
            max_nesting_depth: self.max_nesting_depth,
        };

        let props = state.alternation(0)?;

        let token = state.lexer.next_token()?;
        if token.kind != TokenKind::Eof {
            return Err(SyntaxError::new(
                ErrorKind::UnbalancedBracket,
                token.position,
            ));
        }

        state
            .code
            .emit_instr(Instr::MATCH)
            .map_err(|_| too_large(pattern.len()))?;

        let code_len = state.code.location();
        let header_len = header_len(state.num_captures);
        let scratch_depth =
            u16::try_from(props.peak).map_err(|_| too_large(0))?;

        let buf = state.code.into_inner();

        if buf.len() < header_len + code_len {
            return Err(too_large(pattern.len()));
        }

        buf.copy_within(0..code_len, header_len);
        buf[..MAGIC.len()].copy_from_slice(MAGIC);
        buf[3] = VERSION;
        buf[4..6].copy_from_slice(&(code_len as u16).to_le_bytes());
        buf[6..8].copy_from_slice(&scratch_depth.to_le_bytes());
        buf[8] = state.num_captures as u8;
        buf[FIXED_HEADER_LEN..header_len].copy_from_slice(
            &state.loop_bound.data[..header_len - FIXED_HEADER_LEN],
        );

        let buf: &'b [u8] = buf;
        let regex = Regex::from_bytes_unchecked(&buf[..header_len + code_len]);

        debug_assert!(Regex::from_bytes(regex.as_bytes()).is_ok());

        #[cfg(feature = "logging")]
        info!(
            "Compiled pattern {:?}: {} bytes of code, scratch depth: {}, captures: {}",
            BStr::new(pattern),
            code_len,
            scratch_depth,
            state.num_captures,
        );

        Ok(regex)
    }
}

#[inline]
fn too_large(position: usize) -> SyntaxError {
    SyntaxError::new(ErrorKind::TooLarge, position)
}

/// Properties of a compiled expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Props {
    /// The expression can match the empty string.
    nullable: bool,
    /// The code for the expression is a single instruction that consumes
    /// exactly one byte.
    single: bool,
    /// Maximum number of frames pushed by the expression that can be alive
    /// at the same time while the matcher is inside the expression.
    peak: usize,
    /// Maximum number of frames pushed by the expression that remain alive
    /// after the matcher leaves the expression.
    residual: usize,
}

impl Props {
    /// Props for expressions that consume a single byte.
    const BYTE: Props =
        Props { nullable: false, single: true, peak: 0, residual: 0 };

    /// Props for anchors.
    const ANCHOR: Props =
        Props { nullable: true, single: false, peak: 0, residual: 0 };

    /// Props for `self` followed by `next`. The frames left behind by
    /// `self` are still alive while the matcher is inside `next`.
    fn then(self, next: Props) -> Props {
        Props {
            nullable: self.nullable && next.nullable,
            single: false,
            peak: self.peak.max(self.residual.saturating_add(next.peak)),
            residual: self.residual.saturating_add(next.residual),
        }
    }

    /// Props for an alternation where `self` are the props for the
    /// alternatives processed so far and `other` is another alternative.
    fn or(self, other: Props) -> Props {
        Props {
            nullable: self.nullable || other.nullable,
            single: false,
            peak: self.peak.max(other.peak),
            residual: self.residual.max(other.residual),
        }
    }

    /// Props for a repetition of `self` whose iterations are committed, the
    /// loop keeps a single frame.
    fn committed_loop(self, min: u8) -> Props {
        Props {
            nullable: min == 0,
            single: false,
            peak: self.peak.saturating_add(1),
            residual: 1,
        }
    }

    /// Props for a repetition of `self`, up to `max` times, where completed
    /// iterations keep their frames. The loop pushes one frame before the
    /// first iteration and another one after each iteration except the last,
    /// so the frames left by `max - 1` iterations are alive during the last
    /// one.
    fn kept_loop(self, min: u8, max: u8) -> Props {
        let max = max as usize;
        Props {
            nullable: min == 0,
            single: false,
            peak: self
                .residual
                .saturating_add(1)
                .saturating_mul(max - 1)
                .saturating_add(self.peak.saturating_add(1)),
            residual: self.residual.saturating_add(1).saturating_mul(max),
        }
    }

    /// Props for a capture group around `self`. The frame that holds the
    /// start of the capture is alive while the matcher is inside the group,
    /// and after it only if some frame pushed inside the group is alive too.
    fn captured(self) -> Props {
        Props {
            nullable: self.nullable,
            single: false,
            peak: self.peak.saturating_add(1),
            residual: if self.residual > 0 {
                self.residual.saturating_add(1)
            } else {
                0
            },
        }
    }

    /// Props for an alternative that is not the last one in its alternation.
    /// The frame for the `SPLIT` preceding it is alive while the matcher is
    /// inside the alternative, and after it leaves the alternative.
    fn with_split(self) -> Props {
        Props {
            nullable: self.nullable,
            single: false,
            peak: self.peak.saturating_add(1),
            residual: self.residual.saturating_add(1),
        }
    }
}

/// State of an ongoing compilation.
struct State<'p, 'b> {
    lexer: Lexer<'p>,
    code: InstrSeq<'b>,
    num_captures: usize,
    /// Bit N is set if capture group N is inside some repetition that can
    /// iterate more than once.
    loop_bound: BitArray<[u8; 32], Lsb0>,
    max_nesting_depth: usize,
}

impl<'p, 'b> State<'p, 'b> {
    /// `alternation := sequence ('|' sequence)*`
    fn alternation(&mut self, depth: usize) -> Result<Props, SyntaxError> {
        let mut props: Option<Props> = None;
        // Location of the last JUMP emitted at the end of an alternative.
        let mut last_jump = None;

        let props = loop {
            let start = self.code.location();
            let alternative = self.sequence(depth)?;

            let token = *self.lexer.peek()?;

            if token.kind != TokenKind::Alternation {
                break match props {
                    Some(props) => props.or(alternative),
                    None => alternative,
                };
            }

            let position = token.position;
            self.lexer.next_token()?;

            self.code.insert_split(start).map_err(|_| too_large(position))?;

            last_jump = Some(
                self.code
                    .emit_jump(last_jump)
                    .map_err(|_| too_large(position))?,
            );

            // The split continues with the current alternative, and resumes
            // at the next one when the matcher backtracks. The distance is
            // lower than the maximum code size, it always fits in an offset.
            let next = self.code.location();
            self.code.set_offset(start, (next - start) as Offset);

            let alternative = alternative.with_split();

            props = Some(match props {
                Some(props) => props.or(alternative),
                None => alternative,
            });
        };

        if let Some(last_jump) = last_jump {
            let end = self.code.location();
            self.code.patch_jumps(last_jump, end);
        }

        Ok(props)
    }

    /// `sequence := atom+`
    fn sequence(&mut self, depth: usize) -> Result<Props, SyntaxError> {
        let mut props: Option<Props> = None;

        loop {
            let token = *self.lexer.peek()?;
            match token.kind {
                TokenKind::Alternation | TokenKind::Eof => {}
                TokenKind::GroupClose | TokenKind::CaptureClose
                    if depth == 0 && props.is_none() =>
                {
                    return Err(SyntaxError::new(
                        ErrorKind::UnbalancedBracket,
                        token.position,
                    ));
                }
                TokenKind::GroupClose | TokenKind::CaptureClose => {}
                _ => {
                    let atom = self.atom(depth)?;
                    props = Some(match props {
                        Some(props) => props.then(atom),
                        None => atom,
                    });
                    continue;
                }
            }
            return props.ok_or(SyntaxError::new(
                ErrorKind::EmptyExpression,
                token.position,
            ));
        }
    }

    /// `atom := element [quantifier]`
    fn atom(&mut self, depth: usize) -> Result<Props, SyntaxError> {
        let start = self.code.location();
        let first_capture = self.num_captures;

        let element = self.element(depth)?;

        let token = *self.lexer.peek()?;

        let TokenKind::Quantifier { min, max, greedy } = token.kind else {
            return Ok(element);
        };

        let position = token.position;
        self.lexer.next_token()?;

        if element.nullable {
            return Err(SyntaxError::new(
                ErrorKind::UnboundedEmptyRepetition,
                position,
            ));
        }

        if max > 1 {
            self.loop_bound[first_capture..self.num_captures].fill(true);
        }

        // Committing iterations loses nothing when the body leaves no frames
        // behind, and unbounded loops must commit them for keeping the
        // number of frames bounded.
        let keep_frames =
            max != UNBOUNDED && !element.single && element.residual > 0;

        let repeat = Repeat {
            min,
            max,
            greedy,
            single_byte: element.single,
            keep_frames,
            body_len: 0,
        };

        self.code
            .insert_repeat(start, repeat)
            .map_err(|_| too_large(position))?;

        // A quantifier can't be followed by another one, except for the `?`
        // that makes it non-greedy, and that one is consumed by the lexer.
        let token = *self.lexer.peek()?;
        if let TokenKind::Quantifier { .. } = token.kind {
            return Err(SyntaxError::new(
                ErrorKind::NothingToRepeat,
                token.position,
            ));
        }

        Ok(if keep_frames {
            element.kept_loop(min, max)
        } else {
            element.committed_loop(min)
        })
    }

    /// `element := literal | escape | '.' | set | '^' | '$' | group | capture`
    fn element(&mut self, depth: usize) -> Result<Props, SyntaxError> {
        let token = self.lexer.next_token()?;
        let position = token.position;

        let props = match token.kind {
            TokenKind::Byte(b) => {
                self.code.emit_byte(b).map_err(|_| too_large(position))?;
                Props::BYTE
            }
            TokenKind::Set(set) => {
                self.code.emit_set(&set).map_err(|_| too_large(position))?;
                Props::BYTE
            }
            TokenKind::AnyByte => {
                self.code
                    .emit_instr(Instr::ANY_BYTE)
                    .map_err(|_| too_large(position))?;
                Props::BYTE
            }
            TokenKind::Start => {
                self.code
                    .emit_instr(Instr::START)
                    .map_err(|_| too_large(position))?;
                Props::ANCHOR
            }
            TokenKind::End => {
                self.code
                    .emit_instr(Instr::END)
                    .map_err(|_| too_large(position))?;
                Props::ANCHOR
            }
            TokenKind::GroupOpen => self.group(position, depth, false)?,
            TokenKind::CaptureOpen => self.group(position, depth, true)?,
            TokenKind::Quantifier { .. } => {
                return Err(SyntaxError::new(
                    ErrorKind::NothingToRepeat,
                    position,
                ))
            }
            // `sequence` never calls `atom` with these tokens ahead.
            TokenKind::GroupClose
            | TokenKind::CaptureClose
            | TokenKind::Alternation
            | TokenKind::Eof => unreachable!(),
        };

        Ok(props)
    }

    /// `group := '(' alternation ')'`, `capture := '<' alternation '>'`
    ///
    /// `open` is the position of the opening bracket, which has been already
    /// consumed.
    fn group(
        &mut self,
        open: usize,
        depth: usize,
        capture: bool,
    ) -> Result<Props, SyntaxError> {
        if depth >= self.max_nesting_depth {
            return Err(SyntaxError::new(ErrorKind::NestingTooDeep, open));
        }

        let index = if capture {
            let index = u8::try_from(self.num_captures)
                .ok()
                .filter(|index| *index < u8::MAX)
                .ok_or(SyntaxError::new(ErrorKind::TooManyCaptures, open))?;
            self.num_captures += 1;
            self.code
                .emit_capture(Instr::CAPTURE_START, index)
                .map_err(|_| too_large(open))?;
            Some(index)
        } else {
            None
        };

        let mut props = self.alternation(depth + 1)?;

        let close = self.lexer.next_token()?;

        match (close.kind, index) {
            (TokenKind::GroupClose, None) => {}
            (TokenKind::CaptureClose, Some(index)) => {
                self.code
                    .emit_capture(Instr::CAPTURE_END, index)
                    .map_err(|_| too_large(close.position))?;
                props = props.captured();
            }
            (TokenKind::GroupClose, Some(_))
            | (TokenKind::CaptureClose, None) => {
                return Err(SyntaxError::new(
                    ErrorKind::MismatchedCaptureGroup,
                    close.position,
                ));
            }
            _ => {
                return Err(SyntaxError::new(
                    ErrorKind::UnterminatedGroup,
                    open,
                ));
            }
        }

        Ok(props)
    }
}

/// Error returned by [`InstrSeq`] when the code doesn't fit in the buffer.
#[derive(Debug)]
pub(crate) struct CodeFull;

/// A sequence of instructions for the backtracking matcher.
///
/// This type is used by the compiler while emitting code. It is a fixed
/// size buffer with a set of specialized functions for adding instructions
/// at the end of the code, or inserting them in front of code that was
/// already emitted.
pub(crate) struct InstrSeq<'b> {
    buf: &'b mut [u8],
    len: usize,
}

impl<'b> InstrSeq<'b> {
    /// Creates a new [`InstrSeq`] that writes the code to `buf`.
    pub fn new(buf: &'b mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    /// Consumes the [`InstrSeq`] and returns the buffer that contains the
    /// code.
    pub fn into_inner(self) -> &'b mut [u8] {
        self.buf
    }

    /// Returns the location where the next instruction will be put.
    #[inline]
    pub fn location(&self) -> usize {
        self.len
    }

    fn capacity(&self) -> usize {
        self.buf.len().min(MAX_CODE_LEN)
    }

    /// Appends bytes at the end of the code, returning the location where
    /// they were written.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, CodeFull> {
        let location = self.len;
        if location + bytes.len() > self.capacity() {
            return Err(CodeFull);
        }
        self.buf[location..location + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(location)
    }

    /// Inserts bytes at the given location, moving the code that starts at
    /// that location forward.
    fn insert(&mut self, location: usize, bytes: &[u8]) -> Result<(), CodeFull> {
        if self.len + bytes.len() > self.capacity() {
            return Err(CodeFull);
        }
        self.buf.copy_within(location..self.len, location + bytes.len());
        self.buf[location..location + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    /// Adds an instruction without arguments, or with offsets initialized
    /// to zero, at the end of the sequence and returns its location.
    pub fn emit_instr(&mut self, instr: u8) -> Result<usize, CodeFull> {
        match instr {
            Instr::SPLIT | Instr::JUMP | Instr::REPEAT_END => {
                // These instructions are followed by a 16-bits offset that
                // is relative to the start of the instruction.
                let mut bytes = [0; 2 + size_of::<Offset>()];
                bytes[..2].copy_from_slice(&[OPCODE_PREFIX, instr]);
                self.write(&bytes)
            }
            _ => self.write(&[OPCODE_PREFIX, instr]),
        }
    }

    /// Adds an instruction that matches a literal byte.
    pub fn emit_byte(&mut self, b: u8) -> Result<usize, CodeFull> {
        // A byte that is equal to the opcode prefix is duplicated. This
        // allows the matcher to interpret this byte as a literal, not as an
        // instruction.
        if b == OPCODE_PREFIX {
            self.write(&[b, b])
        } else {
            self.write(&[b])
        }
    }

    /// Adds a [`Instr::ClassBitmap`] or [`Instr::ClassRanges`] instruction
    /// for the given set. Sets with a single byte are emitted as literals.
    pub fn emit_set(&mut self, set: &CharSet) -> Result<usize, CodeFull> {
        let location = self.write_set(set)?;

        debug_assert!({
            let (instr, _) =
                InstrParser::decode_instr(&self.buf[location..self.len]);
            (0..=u8::MAX).all(|b| instr.matches_byte(b) == set.contains(b))
        });

        Ok(location)
    }

    fn write_set(&mut self, set: &CharSet) -> Result<usize, CodeFull> {
        if let Some(b) = set.single_byte() {
            return self.emit_byte(b);
        }

        let flags = if set.is_inverted() { CLASS_NEGATED } else { 0 };
        let num_ranges = set.ranges().count();

        // When the number of ranges is <= 15 `Instr::ClassRanges` is
        // preferred over `Instr::ClassBitmap` because of its more compact
        // representation. With 16 ranges or more `Instr::ClassBitmap` becomes
        // more compact.
        if num_ranges < 16 {
            let location = self.write(&[
                OPCODE_PREFIX,
                Instr::CLASS_RANGES,
                flags,
                num_ranges as u8,
            ])?;
            for (lo, hi) in set.ranges() {
                self.write(&[lo, hi])?;
            }
            Ok(location)
        } else {
            let location =
                self.write(&[OPCODE_PREFIX, Instr::CLASS_BITMAP, flags])?;
            self.write(set.bitmap())?;
            Ok(location)
        }
    }

    /// Adds a [`Instr::CaptureStart`] or [`Instr::CaptureEnd`] instruction.
    pub fn emit_capture(
        &mut self,
        instr: u8,
        index: u8,
    ) -> Result<usize, CodeFull> {
        self.write(&[OPCODE_PREFIX, instr, index])
    }

    /// Adds a [`Instr::Jump`] whose target is not known yet.
    ///
    /// Pending jumps form a chain, the offset of each one contains the
    /// distance to the previous jump in the chain, or zero if it's the
    /// first one. `prev` is the location of the last jump in the chain,
    /// if any. The whole chain is patched with [`InstrSeq::patch_jumps`].
    pub fn emit_jump(&mut self, prev: Option<usize>) -> Result<usize, CodeFull> {
        let location = self.emit_instr(Instr::JUMP)?;
        if let Some(prev) = prev {
            // The distance is lower than the maximum code size, it always
            // fits in an offset.
            self.set_offset(location, (location - prev) as Offset);
        }
        Ok(location)
    }

    /// Makes every jump in the chain that ends at `last` point to `target`.
    pub fn patch_jumps(&mut self, last: usize, target: usize) {
        let mut location = last;
        loop {
            let link = self.offset(location);
            self.set_offset(location, (target - location) as Offset);
            if link == 0 {
                break;
            }
            location -= link as usize;
        }
    }

    /// Inserts a [`Instr::Split`] at the given location. Its offset is set
    /// later with [`InstrSeq::set_offset`].
    pub fn insert_split(&mut self, location: usize) -> Result<(), CodeFull> {
        self.insert(location, &[OPCODE_PREFIX, Instr::SPLIT, 0, 0])
    }

    /// Turns the code that goes from `start` to the end of the sequence into
    /// the body of a loop.
    ///
    /// A [`Instr::Repeat`] is inserted at `start`. Unless the loop's body is
    /// a single instruction that consumes one byte, a [`Instr::RepeatEnd`]
    /// pointing back to the [`Instr::Repeat`] is added at the end.
    pub fn insert_repeat(
        &mut self,
        start: usize,
        mut repeat: Repeat,
    ) -> Result<(), CodeFull> {
        let mut body_len = self.len - start;

        if !repeat.single_byte {
            body_len += 2 + size_of::<Offset>();
        }

        repeat.body_len = u16::try_from(body_len).map_err(|_| CodeFull)?;

        self.insert(start, &repeat.encode())?;

        if !repeat.single_byte {
            let location = self.emit_instr(Instr::REPEAT_END)?;
            // Backward offsets are negative, and always fit in an offset
            // because the code can't be larger than `Offset::MAX`.
            self.set_offset(location, -((location - start) as Offset));
        }

        Ok(())
    }

    /// Returns the offset of the instruction at `location`, which must be
    /// a [`Instr::Split`], [`Instr::Jump`] or [`Instr::RepeatEnd`].
    fn offset(&self, location: usize) -> Offset {
        debug_assert_eq!(self.buf[location], OPCODE_PREFIX);
        Offset::from_le_bytes([self.buf[location + 2], self.buf[location + 3]])
    }

    /// Sets the offset of the instruction at `location`, which must be a
    /// [`Instr::Split`], [`Instr::Jump`] or [`Instr::RepeatEnd`].
    pub fn set_offset(&mut self, location: usize, offset: Offset) {
        debug_assert_eq!(self.buf[location], OPCODE_PREFIX);
        self.buf[location + 2..location + 4]
            .copy_from_slice(&offset.to_le_bytes());
    }
}

impl Display for InstrSeq<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fmt_code(&self.buf[..self.len], f)
    }
}
