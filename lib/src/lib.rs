/*! Regular expressions that are compiled and matched in memory provided by
the caller.

This crate is intended for environments where memory is scarce and must be
accounted for in advance. Neither compiling a pattern nor matching it
allocates memory, and the matcher doesn't use recursion, so its stack usage
doesn't depend on the pattern or the input.

There are two main types in this crate: [`Compiler`] and [`Matcher`]. The
compiler takes a pattern and produces a [`Regex`], written to a buffer
provided by the caller. Besides the code for the matcher, the [`Regex`] tells
how large the buffers used by the matcher must be. The [`Regex`] is a
read-only view over bytes that can be stored and loaded back with
[`Regex::from_bytes`], or embedded in a program as a `static` array.

# Example

```rust
use brex::{Capture, Compiler, Frame, Matcher};

let mut buf = [0; 128];
let regex = Compiler::new().compile(b"<\\a+>=<\\d+>", &mut buf).unwrap();

let mut frames = vec![Frame::default(); regex.scratch_depth()];
let mut captures = vec![Capture::default(); regex.num_captures()];

let mut matcher = Matcher::new(&regex, &mut frames, &mut captures);
let m = matcher.find_at(b"set foo=42;", 0).unwrap().unwrap();

assert_eq!(m.range(), 4..10);
assert_eq!(m.get(0), Some(4..7));
assert_eq!(m.get(1), Some(8..10));
```

# Pattern syntax

| Syntax        | Meaning                                                     |
|---------------|-------------------------------------------------------------|
| `x`           | the byte `x`                                                |
| `.`           | any byte except line feed                                   |
| `[abc]`       | any of the bytes in the set, ranges like `a-z` are allowed   |
| `[^abc]`      | any byte not in the set                                     |
| `^` / `$`     | start / end of the input                                    |
| `x\|y`        | `x` or `y`, `x` is preferred                                |
| `(x)`         | group                                                       |
| `<x>`         | capture group, numbered from 0 in order of appearance       |
| `x?`          | zero or one `x`                                             |
| `x*`          | zero or more `x`                                            |
| `x+`          | one or more `x`                                             |
| `x{n}`        | exactly `n` times `x` (`1 <= n <= 254`)                     |
| `x{m,M}`      | from `m` to `M` times `x`                                   |
| `x{m,}`       | at least `m` times `x`                                      |
| `x*?`, etc.   | non-greedy version of any quantifier                        |

Escape sequences: `\d` (digit), `\w` (alphanumeric), `\l` (lowercase),
`\a` (letter), `\s` (whitespace), `\N` (CR or LF), `\i` (identifier start),
`\c` (identifier continuation), `\D`, `\W` and `\S` (negated versions),
`\f`, `\r`, `\n`, `\t`, `\xHH`, and a backslash followed by any of
`.[]()<>|?*+{}^$-\`.

Quantifiers can't be applied to expressions that can match the empty string.
*/

#![deny(missing_docs)]

pub use errors::ErrorKind;
pub use errors::MatchError;
pub use errors::SerializationError;
pub use errors::SyntaxError;

pub use re::backtrack::Capture;
pub use re::backtrack::Frame;
pub use re::backtrack::Match;
pub use re::backtrack::Matcher;
pub use re::compiler::Compiler;
pub use re::Action;
pub use re::DEFAULT_MAX_NESTING_DEPTH;
pub use re::UNBOUNDED;

pub use regex::Regex;
pub use regex::MAX_HEADER_LEN;

mod errors;
mod re;
mod regex;

#[cfg(feature = "export")]
pub mod export;
