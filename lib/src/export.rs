/*! Export of compiled patterns as Rust source code.

Compiled patterns are plain bytes, so they can be embedded in a program as a
`static` array and loaded at runtime with [`Regex::from_bytes`], without
compiling the pattern on the target.

```
# use brex::Compiler;
# use brex::export::{from_rust_source, to_rust_source};
let mut buf = [0; 64];
let regex = Compiler::new().compile(b"a+b", &mut buf).unwrap();

let src = to_rust_source(&regex, "AB", Some(b"a+b")).unwrap();
assert!(src.contains("pub static AB: [u8; "));

assert_eq!(from_rust_source(&src, "AB").unwrap(), regex.as_bytes());
```
*/

use std::fmt::Write;

use bstr::BStr;

use crate::errors::SerializationError;
use crate::regex::Regex;

/// Number of bytes per line in the array.
const BYTES_PER_LINE: usize = 12;

/// Renders a compiled pattern as the declaration of a `static` array named
/// `name`, preceded by comments that contain the original pattern (if
/// provided) and the sizes of the buffers needed for matching it.
///
/// Returns [`SerializationError::InvalidSnippet`] if `name` is not a valid
/// identifier.
pub fn to_rust_source(
    regex: &Regex,
    name: &str,
    pattern: Option<&[u8]>,
) -> Result<String, SerializationError> {
    if !is_identifier(name) {
        return Err(SerializationError::InvalidSnippet);
    }

    let bytes = regex.as_bytes();
    let loop_bound = (0..regex.num_captures())
        .filter(|i| regex.capture_in_loop(*i))
        .count();

    let mut src = String::new();

    // Writing to a `String` never fails.
    if let Some(pattern) = pattern {
        let _ = writeln!(src, "// Pattern: {:?}", BStr::new(pattern));
    }
    let _ = writeln!(src, "// Scratch depth: {}", regex.scratch_depth());
    let _ = writeln!(
        src,
        "// Captures: {} ({} inside loops)",
        regex.num_captures(),
        loop_bound
    );
    let _ = writeln!(src, "pub static {}: [u8; {}] = [", name, bytes.len());

    for line in bytes.chunks(BYTES_PER_LINE) {
        src.push_str("   ");
        for b in line {
            let _ = write!(src, " {:#04x},", b);
        }
        src.push('\n');
    }

    src.push_str("];\n");

    Ok(src)
}

/// Parses the `static` array named `name` from source code produced by
/// [`to_rust_source`], and returns its bytes.
///
/// The bytes are validated with [`Regex::from_bytes`] before returning them.
pub fn from_rust_source(
    src: &str,
    name: &str,
) -> Result<Vec<u8>, SerializationError> {
    let invalid = SerializationError::InvalidSnippet;
    let needle = format!("static {}", name);

    // Find the declaration, making sure that the name is not the prefix of
    // some longer identifier.
    let mut rest = src;
    let decl = loop {
        let start = rest.find(&needle).ok_or(invalid)?;
        rest = &rest[start + needle.len()..];
        if let Some(decl) = rest.trim_start().strip_prefix(':') {
            break decl;
        }
    };

    let (ty, init) = decl.split_once('=').ok_or(invalid)?;

    // The type must be `[u8; N]`.
    let len = ty
        .trim()
        .strip_prefix('[')
        .and_then(|ty| ty.strip_suffix(']'))
        .and_then(|ty| ty.split_once(';'))
        .filter(|(elem, _)| elem.trim() == "u8")
        .and_then(|(_, len)| len.trim().parse::<usize>().ok())
        .ok_or(invalid)?;

    let body = init
        .trim_start()
        .strip_prefix('[')
        .and_then(|init| init.split_once(']'))
        .map(|(body, _)| body)
        .ok_or(invalid)?;

    let bytes = body
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(parse_byte)
        .collect::<Option<Vec<u8>>>()
        .ok_or(invalid)?;

    if bytes.len() != len {
        return Err(invalid);
    }

    Regex::from_bytes(&bytes)?;

    Ok(bytes)
}

fn parse_byte(item: &str) -> Option<u8> {
    match item.strip_prefix("0x").or_else(|| item.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => item.parse().ok(),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name != "_" && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
