/*! Errors returned by the compiler, the matcher and the loader of compiled
patterns. */

use thiserror::Error;

/// Kinds of errors that can occur while compiling a pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A `(` or `<` that is never closed.
    #[error("unterminated group")]
    UnterminatedGroup,

    /// A `[` that is never closed.
    #[error("unterminated character set")]
    UnterminatedSet,

    /// A `)`, `>`, `]` or `}` without a matching opening bracket.
    #[error("unbalanced bracket")]
    UnbalancedBracket,

    /// A quantifier without operand, or following another quantifier.
    #[error("nothing to repeat")]
    NothingToRepeat,

    /// An empty pattern, group or alternative.
    #[error("empty expression")]
    EmptyExpression,

    /// A malformed or out of range repetition count.
    #[error("invalid repetition count")]
    InvalidCount,

    /// Whitespace between the braces of a repetition count.
    #[error("whitespace inside braces")]
    WhitespaceInBraces,

    /// A backslash followed by something that is not a valid escape.
    #[error("unknown escape sequence")]
    UnknownEscape,

    /// A range in a character set where the start is greater than the end,
    /// or where one of the endpoints is a class.
    #[error("malformed range")]
    MalformedRange,

    /// A quantifier applied to an expression that can match the empty
    /// string.
    #[error("repetition of an expression that can be empty")]
    UnboundedEmptyRepetition,

    /// A capture group that is closed with `)`, or a non-capturing group
    /// closed with `>`.
    #[error("mismatched capture group")]
    MismatchedCaptureGroup,

    /// Groups are nested deeper than the compiler's limit.
    #[error("groups nested too deeply")]
    NestingTooDeep,

    /// The pattern has more than 255 capture groups.
    #[error("too many capture groups")]
    TooManyCaptures,

    /// The compiled code doesn't fit in the output buffer.
    #[error("pattern too large")]
    TooLarge,
}

/// Error returned by [`crate::Compiler::compile`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("{kind} at offset {position}")]
pub struct SyntaxError {
    kind: ErrorKind,
    position: usize,
}

impl SyntaxError {
    pub(crate) fn new(kind: ErrorKind, position: usize) -> Self {
        Self { kind, position }
    }

    /// Kind of error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Offset within the pattern where the error was detected.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Error returned by the matcher when the buffers provided by the caller are
/// too small.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum MatchError {
    /// The frame buffer is smaller than the pattern's scratch depth.
    #[error("backtracking scratch exhausted (capacity: {capacity})")]
    ScratchExhausted {
        /// Number of frames in the buffer.
        capacity: usize,
    },

    /// The capture buffer can't hold all the spans produced by the match.
    #[error("capture buffer exhausted (capacity: {capacity})")]
    CaptureBufferExhausted {
        /// Number of slots in the buffer.
        capacity: usize,
    },
}

/// Error returned while loading a compiled pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SerializationError {
    /// The data doesn't start with the expected header, or its length
    /// doesn't match the one indicated by the header.
    #[error("not a valid compiled pattern")]
    InvalidFormat,

    /// The data was produced by an incompatible version of this crate.
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// The code contains an invalid instruction at the given offset.
    #[error("invalid code at offset {0}")]
    InvalidCode(usize),

    /// The source snippet doesn't contain the expected array.
    #[error("invalid source snippet")]
    InvalidSnippet,
}
