/*! This module parses, compiles, and executes regular expressions.

Patterns are tokenized by the [`parser::Lexer`] and compiled by a
recursive-descent [`compiler::Compiler`] into code for a backtracking VM,
which is implemented in [`backtrack::Matcher`]. The format of the code is
described in [`instr`].

Neither the compiler nor the matcher allocate memory. The compiler writes the
code into a buffer provided by the caller, and computes the exact amount of
backtracking state that the matcher needs for the pattern. The matcher then
runs with frame and capture buffers provided by the caller, without recursion.
*/

pub mod backtrack;
pub mod charset;
pub mod compiler;
pub mod instr;

pub(crate) mod parser;

#[cfg(test)]
mod tests;

/// Maximum level of group nesting accepted by default by the compiler.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 16;

/// Value used as the upper bound of repetitions that don't have one, like
/// `a*` or `a{3,}`. It can't be used as a literal count.
pub const UNBOUNDED: u8 = 255;

/// Value returned by the callback function passed to
/// [`backtrack::Matcher::try_match`] for indicating if the matcher should
/// keep looking for alternative matches or stop with the current one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Keep looking for other matches.
    Continue,
    /// Stop with the current match.
    Stop,
}
