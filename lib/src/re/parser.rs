/*! Tokenizer for the pattern syntax.

The [`Lexer`] converts a pattern into a stream of [`Token`]s. Escape
sequences, character sets and repetition counts are fully resolved at this
level, so the compiler deals only with literals, sets, anchors, brackets and
quantifiers.
*/

use crate::errors::{ErrorKind, SyntaxError};
use crate::re::charset::{CharSet, Class, ClassKind};
use crate::re::UNBOUNDED;

/// Bytes that must be escaped for being matched literally.
const METACHARACTERS: &[u8] = b".[]()<>|?*+{}^$-";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// A literal byte.
    Byte(u8),
    /// A named class (e.g: `\d`) or a bracketed set (e.g: `[a-z]`).
    Set(CharSet),
    /// `.`
    AnyByte,
    /// `^`
    Start,
    /// `$`
    End,
    /// `(`
    GroupOpen,
    /// `)`
    GroupClose,
    /// `<`
    CaptureOpen,
    /// `>`
    CaptureClose,
    /// `|`
    Alternation,
    /// `?`, `*`, `+` or `{m,M}`, optionally followed by `?`.
    Quantifier { min: u8, max: u8, greedy: bool },
    /// End of the pattern.
    Eof,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Offset within the pattern where the token starts.
    pub position: usize,
}

/// Result of parsing an escape sequence.
enum Escaped {
    Byte(u8),
    Class(Class),
}

pub(crate) struct Lexer<'p> {
    pattern: &'p [u8],
    pos: usize,
    peeked: Option<Token>,
}

impl<'p> Lexer<'p> {
    pub fn new(pattern: &'p [u8]) -> Self {
        Self { pattern, pos: 0, peeked: None }
    }

    /// Returns the next token without consuming it.
    pub fn peek(&mut self) -> Result<&Token, SyntaxError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.scan()?);
        }
        match &self.peeked {
            Some(token) => Ok(token),
            None => unreachable!(),
        }
    }

    /// Consumes the next token.
    pub fn next_token(&mut self) -> Result<Token, SyntaxError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.scan(),
        }
    }

    fn scan(&mut self) -> Result<Token, SyntaxError> {
        let position = self.pos;

        let Some(&b) = self.pattern.get(position) else {
            return Ok(Token { kind: TokenKind::Eof, position });
        };

        self.pos += 1;

        let kind = match b {
            b'.' => TokenKind::AnyByte,
            b'^' => TokenKind::Start,
            b'$' => TokenKind::End,
            b'(' => TokenKind::GroupOpen,
            b')' => TokenKind::GroupClose,
            b'<' => TokenKind::CaptureOpen,
            b'>' => TokenKind::CaptureClose,
            b'|' => TokenKind::Alternation,
            b']' | b'}' => {
                return Err(SyntaxError::new(
                    ErrorKind::UnbalancedBracket,
                    position,
                ))
            }
            b'?' => self.quantifier(0, 1),
            b'*' => self.quantifier(0, UNBOUNDED),
            b'+' => self.quantifier(1, UNBOUNDED),
            b'{' => {
                let (min, max) = self.counts(position)?;
                self.quantifier(min, max)
            }
            b'[' => TokenKind::Set(self.set(position)?),
            b'\\' => match self.escape(position)? {
                Escaped::Byte(b) => TokenKind::Byte(b),
                Escaped::Class(class) => {
                    TokenKind::Set(CharSet::from_class(class))
                }
            },
            b => TokenKind::Byte(b),
        };

        Ok(Token { kind, position })
    }

    /// Builds a quantifier token, consuming the `?` that marks it as
    /// non-greedy, if present.
    fn quantifier(&mut self, min: u8, max: u8) -> TokenKind {
        let greedy = if self.pattern.get(self.pos) == Some(&b'?') {
            self.pos += 1;
            false
        } else {
            true
        };
        TokenKind::Quantifier { min, max, greedy }
    }

    /// Parses the contents of `{...}`. `open` is the position of the opening
    /// brace, which has been already consumed.
    fn counts(&mut self, open: usize) -> Result<(u8, u8), SyntaxError> {
        let invalid = SyntaxError::new(ErrorKind::InvalidCount, open);

        let rest = &self.pattern[self.pos..];
        let Some(len) = rest.iter().position(|b| *b == b'}') else {
            return Err(invalid);
        };

        let body = &rest[..len];

        if let Some(ws) = body.iter().position(|b| b.is_ascii_whitespace()) {
            return Err(SyntaxError::new(
                ErrorKind::WhitespaceInBraces,
                self.pos + ws,
            ));
        }

        self.pos += len + 1;

        let number = |digits: &[u8]| -> Option<u8> {
            if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
                return None;
            }
            std::str::from_utf8(digits).ok()?.parse::<u8>().ok()
        };

        let (min, max) = match body.iter().position(|b| *b == b',') {
            // {n}
            None => {
                let n = number(body).ok_or(invalid)?;
                if !(1..UNBOUNDED).contains(&n) {
                    return Err(invalid);
                }
                (n, n)
            }
            // {m,}
            Some(comma) if comma == body.len() - 1 => {
                let m = number(&body[..comma]).ok_or(invalid)?;
                if m == UNBOUNDED {
                    return Err(invalid);
                }
                (m, UNBOUNDED)
            }
            // {m,M}
            Some(comma) => {
                let m = number(&body[..comma]).ok_or(invalid)?;
                let max = number(&body[comma + 1..]).ok_or(invalid)?;
                if !(m < max || (m > 0 && m <= max && max < UNBOUNDED)) {
                    return Err(invalid);
                }
                (m, max)
            }
        };

        Ok((min, max))
    }

    /// Parses an escape sequence. `backslash` is the position of the
    /// backslash, which has been already consumed.
    fn escape(&mut self, backslash: usize) -> Result<Escaped, SyntaxError> {
        let unknown = SyntaxError::new(ErrorKind::UnknownEscape, backslash);

        let Some(&b) = self.pattern.get(self.pos) else {
            return Err(unknown);
        };

        self.pos += 1;

        let class = |kind, negated| Escaped::Class(Class { kind, negated });

        let escaped = match b {
            b'd' => class(ClassKind::Digit, false),
            b'D' => class(ClassKind::Digit, true),
            b'w' => class(ClassKind::Alphanumeric, false),
            b'W' => class(ClassKind::Alphanumeric, true),
            b'l' => class(ClassKind::Lowercase, false),
            b'a' => class(ClassKind::Letter, false),
            b's' => class(ClassKind::Whitespace, false),
            b'S' => class(ClassKind::Whitespace, true),
            b'N' => class(ClassKind::CrLf, false),
            b'i' => class(ClassKind::IdentStart, false),
            b'c' => class(ClassKind::IdentContinue, false),
            b'f' => Escaped::Byte(0x0c),
            b'r' => Escaped::Byte(b'\r'),
            b'n' => Escaped::Byte(b'\n'),
            b't' => Escaped::Byte(b'\t'),
            b'x' => {
                let hex = self
                    .pattern
                    .get(self.pos..self.pos + 2)
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                    .ok_or(unknown)?;
                self.pos += 2;
                Escaped::Byte(hex)
            }
            b'\\' => Escaped::Byte(b'\\'),
            b if METACHARACTERS.contains(&b) => Escaped::Byte(b),
            _ => return Err(unknown),
        };

        Ok(escaped)
    }

    /// Parses a bracketed set. `open` is the position of the opening
    /// bracket, which has been already consumed.
    fn set(&mut self, open: usize) -> Result<CharSet, SyntaxError> {
        let unterminated = SyntaxError::new(ErrorKind::UnterminatedSet, open);
        let mut set = CharSet::new();

        if self.pattern.get(self.pos) == Some(&b'^') {
            self.pos += 1;
            set.invert();
        }

        let mut first = true;

        loop {
            let member_pos = self.pos;
            let Some(&b) = self.pattern.get(member_pos) else {
                return Err(unterminated);
            };

            // A `]` closes the set, except when it is the first member.
            if b == b']' && !first {
                self.pos += 1;
                break;
            }

            first = false;

            let lo = self.set_member()?;

            // A `-` is a range only if it is followed by something other
            // than the closing bracket.
            let is_range = self.pattern.get(self.pos) == Some(&b'-')
                && !matches!(self.pattern.get(self.pos + 1), Some(b']') | None);

            if !is_range {
                match lo {
                    Escaped::Byte(b) => set.add_byte(b),
                    Escaped::Class(class) => set.add_class(class),
                };
                continue;
            }

            self.pos += 1;

            let malformed =
                SyntaxError::new(ErrorKind::MalformedRange, member_pos);

            match (lo, self.set_member()?) {
                (Escaped::Byte(lo), Escaped::Byte(hi)) if lo <= hi => {
                    set.add_range(lo, hi);
                }
                _ => return Err(malformed),
            }
        }

        Ok(set)
    }

    /// Parses a single member of a set, which is either a byte, or an
    /// escape sequence.
    fn set_member(&mut self) -> Result<Escaped, SyntaxError> {
        let position = self.pos;
        match self.pattern.get(position) {
            Some(b'\\') => {
                self.pos += 1;
                self.escape(position)
            }
            Some(&b) => {
                self.pos += 1;
                Ok(Escaped::Byte(b))
            }
            None => unreachable!(),
        }
    }
}
