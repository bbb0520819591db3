use std::ops::Range;

use pretty_assertions::assert_eq;

use crate::errors::ErrorKind;
use crate::re::charset::{CharSet, Class, ClassKind};
use crate::re::compiler::InstrSeq;
use crate::re::instr::InstrParser;
use crate::re::Action;
use crate::{Capture, Compiler, Frame, MatchError, Matcher, Regex};

macro_rules! assert_re_code {
    ($re:expr, $code:expr) => {{
        let mut buf = [0; 1024];
        let regex = Compiler::new().compile($re.as_bytes(), &mut buf).unwrap();
        assert_eq!($code, regex.to_string());
    }};
}

macro_rules! assert_re_error {
    ($re:expr, $kind:expr, $position:expr) => {{
        let mut buf = [0; 1024];
        let err = Compiler::new().compile($re.as_bytes(), &mut buf).unwrap_err();
        assert_eq!(
            ($kind, $position),
            (err.kind(), err.position()),
            "pattern: {}",
            $re
        );
    }};
}

type Found = (Range<usize>, Vec<(usize, Range<usize>)>);

/// Returns the leftmost match of `pattern` in `input`, with the spans of
/// all the captures.
fn find(pattern: &str, input: &[u8]) -> Option<Found> {
    let mut buf = [0; 1024];
    let regex = Compiler::new().compile(pattern.as_bytes(), &mut buf).unwrap();

    let mut frames = vec![Frame::new(); regex.scratch_depth()];
    let mut captures = vec![Capture::new(); 16];
    let mut matcher = Matcher::new(&regex, &mut frames, &mut captures);

    matcher.find_at(input, 0).unwrap().map(|m| {
        let captures =
            m.captures().iter().map(|c| (c.index(), c.range())).collect();
        (m.range(), captures)
    })
}

/// Returns the end of every match of `pattern` that starts at the beginning
/// of `input`, in the order they are reported.
fn match_ends(pattern: &str, input: &[u8]) -> Vec<usize> {
    let mut buf = [0; 1024];
    let regex = Compiler::new().compile(pattern.as_bytes(), &mut buf).unwrap();

    let mut frames = vec![Frame::new(); regex.scratch_depth()];
    let mut captures = vec![Capture::new(); 16];
    let mut matcher = Matcher::new(&regex, &mut frames, &mut captures);

    let mut ends = Vec::new();
    let stopped = matcher
        .try_match(input, 0, |m| {
            ends.push(m.end());
            Action::Continue
        })
        .unwrap();

    assert!(!stopped);
    ends
}

/// Returns every string of `a` and `b` with length up to `max_len`.
fn inputs(max_len: usize) -> Vec<Vec<u8>> {
    let mut result = vec![vec![]];
    let mut last = vec![vec![]];
    for _ in 0..max_len {
        last = last
            .iter()
            .flat_map(|prefix: &Vec<u8>| {
                [b'a', b'b'].map(|b| {
                    let mut input = prefix.clone();
                    input.push(b);
                    input
                })
            })
            .collect();
        result.extend(last.iter().cloned());
    }
    result
}

#[test]
fn re_code_1() {
    assert_re_code!(
        "abc.",
        r#"
00000: LIT 0x61
00001: LIT 0x62
00002: LIT 0x63
00003: ANY_BYTE
00005: MATCH
"#
    );
}

#[test]
fn re_code_2() {
    assert_re_code!(
        "a|b",
        r#"
00000: SPLIT 00009
00004: LIT 0x61
00005: JUMP 0000a
00009: LIT 0x62
0000a: MATCH
"#
    );
}

#[test]
fn re_code_3() {
    assert_re_code!(
        "a|b|c",
        r#"
00000: SPLIT 00009
00004: LIT 0x61
00005: JUMP 00013
00009: SPLIT 00012
0000d: LIT 0x62
0000e: JUMP 00013
00012: LIT 0x63
00013: MATCH
"#
    );
}

#[test]
fn re_code_4() {
    assert_re_code!(
        "a+?",
        r#"
00000: REPEAT_BYTE_NON_GREEDY {1,} 00008
00007: LIT 0x61
00008: MATCH
"#
    );

    assert_re_code!(
        ".*",
        r#"
00000: REPEAT_BYTE {0,} 00009
00007: ANY_BYTE
00009: MATCH
"#
    );
}

#[test]
fn re_code_5() {
    assert_re_code!(
        "(ab){2,3}",
        r#"
00000: REPEAT {2,3} 0000d
00007: LIT 0x61
00008: LIT 0x62
00009: REPEAT_END 00000
0000d: MATCH
"#
    );
}

#[test]
fn re_code_6() {
    assert_re_code!(
        r"<a>[^0-9]\xaa$",
        "
00000: CAPTURE_START 0
00003: LIT 0x61
00004: CAPTURE_END 0
00007: CLASS_RANGES NEG [0x30-0x39] \n\
0000d: LIT 0xaa
0000f: END
00011: MATCH
"
    );
}

#[test]
fn re_code_7() {
    assert_re_code!(
        "[acegikmoqsuwy02468]",
        "
00000: CLASS_BITMAP 0x30 0x32 0x34 0x36 0x38 0x61 0x63 0x65 0x67 0x69 0x6b 0x6d 0x6f 0x71 0x73 0x75 0x77 0x79 \n\
00023: MATCH
"
    );

    // Sets with a single byte are literals.
    assert_re_code!(
        r"[x]\x2e",
        r#"
00000: LIT 0x78
00001: LIT 0x2e
00002: MATCH
"#
    );
}

#[test]
fn re_code_8() {
    assert_re_code!(
        "[]a]",
        "
00000: CLASS_RANGES [0x5d-0x5d] [0x61-0x61] \n\
00008: MATCH
"
    );
}

#[test]
fn re_code_9() {
    // Bounded loops whose body leaves choice-points behind keep them.
    assert_re_code!(
        "(a|ab)?c",
        r#"
00000: REPEAT_KEEP {0,1} 00016
00007: SPLIT 00010
0000b: LIT 0x61
0000c: JUMP 00012
00010: LIT 0x61
00011: LIT 0x62
00012: REPEAT_END 00000
00016: LIT 0x63
00017: MATCH
"#
    );

    // Unbounded loops don't.
    assert_re_code!(
        "(a|ab)*c",
        r#"
00000: REPEAT {0,} 00016
00007: SPLIT 00010
0000b: LIT 0x61
0000c: JUMP 00012
00010: LIT 0x61
00011: LIT 0x62
00012: REPEAT_END 00000
00016: LIT 0x63
00017: MATCH
"#
    );
}

#[test]
fn syntax_errors() {
    assert_re_error!("", ErrorKind::EmptyExpression, 0);
    assert_re_error!("a||b", ErrorKind::EmptyExpression, 2);
    assert_re_error!("a|", ErrorKind::EmptyExpression, 2);
    assert_re_error!("()", ErrorKind::EmptyExpression, 1);
    assert_re_error!("(ab", ErrorKind::UnterminatedGroup, 0);
    assert_re_error!("a<b", ErrorKind::UnterminatedGroup, 1);
    assert_re_error!("[ab", ErrorKind::UnterminatedSet, 0);
    assert_re_error!(")a", ErrorKind::UnbalancedBracket, 0);
    assert_re_error!("a)", ErrorKind::UnbalancedBracket, 1);
    assert_re_error!("a>b", ErrorKind::UnbalancedBracket, 1);
    assert_re_error!("[a]]", ErrorKind::UnbalancedBracket, 3);
    assert_re_error!("a}", ErrorKind::UnbalancedBracket, 1);
    assert_re_error!("*a", ErrorKind::NothingToRepeat, 0);
    assert_re_error!("a|*", ErrorKind::NothingToRepeat, 2);
    assert_re_error!("a**", ErrorKind::NothingToRepeat, 2);
    assert_re_error!("a*??", ErrorKind::NothingToRepeat, 3);
    assert_re_error!("a{2}{3}", ErrorKind::NothingToRepeat, 4);
    assert_re_error!("a{0,0}", ErrorKind::InvalidCount, 1);
    assert_re_error!("a{255}", ErrorKind::InvalidCount, 1);
    assert_re_error!("a{1 }", ErrorKind::WhitespaceInBraces, 3);
    assert_re_error!(r"a\k", ErrorKind::UnknownEscape, 1);
    assert_re_error!("[b-a]", ErrorKind::MalformedRange, 1);
    assert_re_error!("a<b(cd>)+", ErrorKind::MismatchedCaptureGroup, 6);
    assert_re_error!("(a>", ErrorKind::MismatchedCaptureGroup, 2);
    assert_re_error!("<a)", ErrorKind::MismatchedCaptureGroup, 2);
}

#[test]
fn empty_repetitions() {
    assert_re_error!("(.?)+", ErrorKind::UnboundedEmptyRepetition, 4);
    assert_re_error!("(x*)?", ErrorKind::UnboundedEmptyRepetition, 4);
    assert_re_error!("(x?|y)+", ErrorKind::UnboundedEmptyRepetition, 6);
    assert_re_error!("^*", ErrorKind::UnboundedEmptyRepetition, 1);
    assert_re_error!("<$>{2,}", ErrorKind::UnboundedEmptyRepetition, 3);

    // Repetitions of expressions that can't be empty are fine, even if
    // the repetition itself can be empty.
    let mut buf = [0; 1024];
    assert!(Compiler::new().compile(b"((a|b)*c)?", &mut buf).is_ok());
    assert!(Compiler::new().compile(b"a{1,2}", &mut buf).is_ok());
}

#[test]
fn nesting_depth() {
    let nested = |n: usize| format!("{}a{}", "(".repeat(n), ")".repeat(n));

    let mut buf = [0; 1024];
    let compiler = Compiler::new();

    assert!(compiler.compile(nested(16).as_bytes(), &mut buf).is_ok());

    let err = compiler.compile(nested(17).as_bytes(), &mut buf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NestingTooDeep);
    assert_eq!(err.position(), 16);

    let mut compiler = Compiler::new();
    compiler.max_nesting_depth(2);

    assert!(compiler.compile(b"((a))(b)", &mut buf).is_ok());
    assert_eq!(
        compiler.compile(b"((<a>))", &mut buf).unwrap_err().kind(),
        ErrorKind::NestingTooDeep
    );
}

#[test]
fn too_many_captures() {
    let mut buf = [0; 4096];

    let regex = Compiler::new()
        .compile("<a>".repeat(255).as_bytes(), &mut buf)
        .unwrap();

    assert_eq!(regex.num_captures(), 255);

    let err = Compiler::new()
        .compile("<a>".repeat(256).as_bytes(), &mut buf)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TooManyCaptures);
    assert_eq!(err.position(), 255 * 3);
}

#[test]
fn too_large() {
    // The code doesn't fit in the buffer.
    let mut buf = [0; 4];
    let err = Compiler::new().compile(b"abcdef", &mut buf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooLarge);
    assert_eq!(err.position(), 4);

    // The code fits, but not with the header.
    let mut buf = [0; 8];
    let err = Compiler::new().compile(b"abcdef", &mut buf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooLarge);
    assert_eq!(err.position(), 6);

    let mut buf = [0; 17];
    assert!(Compiler::new().compile(b"abcdef", &mut buf).is_ok());

    // The code can't be larger than the maximum offset.
    let mut buf = vec![0; 65536];
    let pattern = vec![b'a'; 40000];
    let err = Compiler::new().compile(&pattern, &mut buf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooLarge);
    assert_eq!(err.position(), i16::MAX as usize);
}

#[test]
fn deterministic() {
    let pattern = br"x(<ab|cd>|e)*?y[^\n\r]{2,5}\w+$";

    let mut buf_1 = [0; 256];
    let mut buf_2 = [0xff; 512];

    let regex_1 = Compiler::new().compile(pattern, &mut buf_1).unwrap();
    let regex_2 = Compiler::new().compile(pattern, &mut buf_2).unwrap();

    assert_eq!(regex_1.as_bytes(), regex_2.as_bytes());

    let bytes = regex_1.as_bytes().to_vec();
    let loaded = Regex::from_bytes(&bytes).unwrap();

    assert_eq!(loaded.to_string(), regex_1.to_string());
    assert_eq!(loaded.scratch_depth(), regex_1.scratch_depth());
}

#[test]
fn scratch_depth() {
    let depth = |pattern: &str| {
        let mut buf = [0; 1024];
        Compiler::new()
            .compile(pattern.as_bytes(), &mut buf)
            .unwrap()
            .scratch_depth()
    };

    assert_eq!(depth("abc"), 0);
    assert_eq!(depth("^a.c$"), 0);
    assert_eq!(depth("a*"), 1);
    assert_eq!(depth("a|b|c"), 1);
    assert_eq!(depth("a*b*"), 2);
    assert_eq!(depth("(a|b)*"), 2);
    assert_eq!(depth("a?b?a?"), 3);
    assert_eq!(depth("(a(b|a)*)+"), 3);
    assert_eq!(depth("x|(a|b){2,4}"), 8);
    assert_eq!(depth("(a|b)?"), 2);
    assert_eq!(depth("(ab|a){1,2}"), 4);
    assert_eq!(depth("(ab){1,2}"), 1);
    assert_eq!(depth("<a>"), 1);
    assert_eq!(depth("<a|b>c"), 2);
    assert_eq!(depth("<(a|ab)*?>b+"), 3);
}

#[test]
fn literals() {
    assert_eq!(find("abc", b"xxabcxx"), Some((2..5, vec![])));
    assert_eq!(find("abc", b"xxabxx"), None);
    assert_eq!(find(r"\xaa\xaa", b"\x00\xaa\xaa"), Some((1..3, vec![])));
    assert_eq!(find(r"a\.b", b"a.b"), Some((0..3, vec![])));
    assert_eq!(find(r"a\.b", b"axb"), None);
}

#[test]
fn any_byte_and_classes() {
    assert_eq!(find("a.c", b"abc"), Some((0..3, vec![])));
    assert_eq!(find("a.c", b"a\nc"), None);
    assert_eq!(find(r"\d+", b"abc123d"), Some((3..6, vec![])));
    assert_eq!(find(r"\D", b"123d"), Some((3..4, vec![])));
    assert_eq!(find(r"[^a-c]", b"abcd"), Some((3..4, vec![])));
    assert_eq!(find(r"\s\S", b"a  b"), Some((2..4, vec![])));
    assert_eq!(find(r"\i\c*", b"12 _foo9-"), Some((3..8, vec![])));
    assert_eq!(find(r"\N", b"ab\r\n"), Some((2..3, vec![])));
    assert_eq!(find("[]a]+", b"x]a]y"), Some((1..4, vec![])));
    assert_eq!(find("[acegikmoqsuwy02468]+", b"bca8"), Some((1..4, vec![])));
}

#[test]
fn emitted_sets() {
    let mut even = CharSet::new();
    for b in (0..=u8::MAX).step_by(2) {
        even.add_byte(b);
    }

    let mut odd = even;
    odd.invert();

    let not_digits =
        CharSet::from_class(Class { kind: ClassKind::Digit, negated: true });

    let mut prefix = CharSet::new();
    prefix.add_byte(0xAA);

    let mut all = CharSet::new();
    all.add_range(0, u8::MAX);

    let mut not_abc_xyz = CharSet::new();
    not_abc_xyz.add_range(b'a', b'c').add_range(b'x', b'z').invert();

    for set in [even, odd, not_digits, prefix, all, not_abc_xyz] {
        let mut buf = [0; 64];
        let mut seq = InstrSeq::new(&mut buf);
        let location = seq.emit_set(&set).unwrap();
        let code = seq.into_inner();
        let (instr, _) = InstrParser::decode_instr(&code[location..]);

        for b in 0..=u8::MAX {
            assert_eq!(instr.matches_byte(b), set.contains(b), "byte {:#04x}", b);
        }
    }
}

#[test]
fn anchors() {
    assert_eq!(find("^abc$", b"abc"), Some((0..3, vec![])));
    assert_eq!(find("^abc$", b"abcd"), None);
    assert_eq!(find("^abc$", b"xabc"), None);
    assert_eq!(find("^abc$", b"xabcx"), None);
    assert_eq!(find("^b", b"ab"), None);
    assert_eq!(find("b$", b"abb"), Some((2..3, vec![])));
    assert_eq!(find("a|^b", b"xba"), Some((2..3, vec![])));
}

#[test]
fn captures() {
    assert_eq!(find("<a+>b", b"aaab"), Some((0..4, vec![(0, 0..3)])));
    assert_eq!(
        find(r"<\a+>=<\d+>", b"set foo=42;"),
        Some((4..10, vec![(0, 4..7), (1, 8..10)]))
    );
    assert_eq!(
        find(r"(<\d>)+", b"12a"),
        Some((0..2, vec![(0, 0..1), (0, 1..2)]))
    );
    assert_eq!(find("<a>?b", b"b"), Some((0..1, vec![])));
    assert_eq!(find("<a>|<b>", b"b"), Some((0..1, vec![(1, 0..1)])));
}

#[test]
fn nested_captures() {
    assert_eq!(
        find("((<a>)+b)+", b"aabab"),
        Some((0..5, vec![(0, 0..1), (0, 1..2), (0, 3..4)]))
    );

    // Spans are recorded when groups close, inner groups come first.
    assert_eq!(
        find("<(<a>b)+>", b"abab"),
        Some((0..4, vec![(1, 0..1), (1, 2..3), (0, 0..4)]))
    );
}

#[test]
fn groups() {
    let mut buf = [0; 1024];
    let regex = Compiler::new().compile(br"(<\d>)+", &mut buf).unwrap();

    let mut frames = vec![Frame::new(); regex.scratch_depth()];
    let mut captures = vec![Capture::new(); 8];
    let mut matcher = Matcher::new(&regex, &mut frames, &mut captures);

    let m = matcher.find_at(b"x123", 0).unwrap().unwrap();

    assert_eq!(m.start(), 1);
    assert_eq!(m.end(), 4);
    assert_eq!(m.group(0).collect::<Vec<_>>(), vec![1..2, 2..3, 3..4]);
    assert_eq!(m.get(0), Some(3..4));
    assert_eq!(m.get(1), None);
}

#[test]
fn alternation_priority() {
    assert_eq!(find("a|ab", b"ab"), Some((0..1, vec![])));
    assert_eq!(find("ab|a", b"ab"), Some((0..2, vec![])));
    assert_eq!(find("(a|ab)c", b"abc"), Some((0..3, vec![])));
    assert_eq!(find("x(a|b|c)+y", b"xcabay"), Some((0..6, vec![])));
}

#[test]
fn bounded_iterations() {
    // Completed iterations of bounded loops can be revisited when the rest
    // of the pattern fails.
    assert_eq!(find("x(a|ab)?c", b"xabc"), Some((0..4, vec![])));
    assert_eq!(find("(a|ab)?c", b"abc"), Some((0..3, vec![])));
    assert_eq!(find("(a|ab)??c", b"abc"), Some((0..3, vec![])));
    assert_eq!(find("<(a|ab)>{1,2}c", b"abc"), Some((0..3, vec![(0, 0..2)])));
    assert_eq!(find("(a|ab){2}c", b"aabc"), Some((0..4, vec![])));
    assert_eq!(find("(a|ab){2,3}?b", b"aab"), Some((0..3, vec![])));
    assert_eq!(
        find("(<a|ab>){1,3}c", b"abaabc"),
        Some((0..6, vec![(0, 0..2), (0, 2..3), (0, 3..5)]))
    );
}

#[test]
fn atomic_iterations() {
    // Iterations of an unbounded loop are not revisited once complete, the
    // `a` chosen by the first iteration can't be exchanged for `ab` later.
    assert_eq!(find("(a|ab)+c", b"abc"), None);
    assert_eq!(find("(ab|a)+c", b"abc"), Some((0..3, vec![])));
}

#[test]
fn repetitions() {
    assert_eq!(find("a*?b", b"aaab"), Some((0..4, vec![])));
    assert_eq!(find("a*b", b"aaab"), Some((0..4, vec![])));
    assert_eq!(find("a{2,3}", b"aaaa"), Some((0..3, vec![])));
    assert_eq!(find("a{2,3}?", b"aaaa"), Some((0..2, vec![])));
    assert_eq!(find("a{3}", b"aab"), None);
    assert_eq!(find("(ab){2}", b"ababab"), Some((0..4, vec![])));
    assert_eq!(find("(ab){2,}?", b"ababab"), Some((0..4, vec![])));
    assert_eq!(find("(ab)+?c", b"ababc"), Some((0..5, vec![])));
    assert_eq!(find("(ab)*abc", b"abababc"), Some((0..7, vec![])));
    assert_eq!(find("x(ab)*ab", b"xabab"), Some((0..5, vec![])));
    assert_eq!(find(r"\xaa+b", b"\xaa\xaa\xaab"), Some((0..4, vec![])));
    assert_eq!(find("a*", b""), Some((0..0, vec![])));
}

#[test]
fn enumeration_order() {
    assert_eq!(match_ends("a*", b"aaa"), vec![3, 2, 1, 0]);
    assert_eq!(match_ends("a*?", b"aaa"), vec![0, 1, 2, 3]);
    assert_eq!(match_ends("(ab)*", b"ababab"), vec![6, 4, 2, 0]);
    assert_eq!(match_ends("(ab)*?", b"ababab"), vec![0, 2, 4, 6]);
    assert_eq!(match_ends("a|ab|abc", b"abc"), vec![1, 2, 3]);
    assert_eq!(match_ends("a{1,2}b?", b"aab"), vec![3, 2, 1]);
    assert_eq!(match_ends("(a|ab)?", b"ab"), vec![1, 2, 0]);
    assert_eq!(match_ends("(a|ab)??", b"ab"), vec![0, 1, 2]);
    assert_eq!(match_ends("(a|ab){1,2}", b"aab"), vec![2, 3, 1]);
}

#[test]
fn try_match_stop() {
    let mut buf = [0; 1024];
    let regex = Compiler::new().compile(b"a*", &mut buf).unwrap();

    let mut frames = vec![Frame::new(); regex.scratch_depth()];
    let mut captures: Vec<Capture> = vec![];
    let mut matcher = Matcher::new(&regex, &mut frames, &mut captures);

    let mut ends = vec![];
    let stopped = matcher
        .try_match(b"aaa", 0, |m| {
            ends.push(m.end());
            if m.end() == 1 {
                Action::Stop
            } else {
                Action::Continue
            }
        })
        .unwrap();

    assert!(stopped);
    assert_eq!(ends, vec![3, 2, 1]);

    assert!(!matcher.try_match(b"aaa", 4, |_| Action::Stop).unwrap());
}

#[test]
fn match_at() {
    let mut buf = [0; 1024];
    let regex = Compiler::new().compile(b"b+", &mut buf).unwrap();

    let mut frames = vec![Frame::new(); regex.scratch_depth()];
    let mut captures: Vec<Capture> = vec![];
    let mut matcher = Matcher::new(&regex, &mut frames, &mut captures);

    assert_eq!(matcher.match_at(b"abb", 0).unwrap(), None);
    assert_eq!(matcher.match_at(b"abb", 1).unwrap().map(|m| m.range()), Some(1..3));
    assert_eq!(matcher.find_at(b"abb", 0).unwrap().map(|m| m.range()), Some(1..3));
    assert_eq!(matcher.find_at(b"abb", 3).unwrap(), None);
}

#[test]
fn scratch_exhausted() {
    let mut buf = [0; 1024];
    let regex = Compiler::new().compile(b"(a|b)*", &mut buf).unwrap();

    assert_eq!(regex.scratch_depth(), 2);

    let mut frames = vec![Frame::new(); 1];
    let mut captures: Vec<Capture> = vec![];
    let mut matcher = Matcher::new(&regex, &mut frames, &mut captures);

    assert_eq!(
        matcher.match_at(b"ab", 0),
        Err(MatchError::ScratchExhausted { capacity: 1 })
    );

    let regex = Compiler::new().compile(b"a*", &mut buf).unwrap();
    let mut frames = vec![];
    let mut matcher = Matcher::new(&regex, &mut frames, &mut captures);

    // No frames are needed when there's nothing to backtrack to.
    assert_eq!(matcher.match_at(b"", 0).unwrap().map(|m| m.range()), Some(0..0));
    assert_eq!(
        matcher.match_at(b"aa", 0),
        Err(MatchError::ScratchExhausted { capacity: 0 })
    );
}

#[test]
fn capture_buffer_exhausted() {
    let mut buf = [0; 1024];
    let regex = Compiler::new().compile(b"(<a>)+", &mut buf).unwrap();

    assert_eq!(regex.fixed_capture_slots(), 0);

    let mut frames = vec![Frame::new(); regex.scratch_depth()];
    let mut captures = vec![Capture::new(); 2];
    let mut matcher = Matcher::new(&regex, &mut frames, &mut captures);

    assert_eq!(
        matcher.match_at(b"aa", 0).unwrap().map(|m| m.captures().len()),
        Some(2)
    );
    assert_eq!(
        matcher.match_at(b"aaa", 0),
        Err(MatchError::CaptureBufferExhausted { capacity: 2 })
    );

    // Iterations that fail don't use any slot, a buffer with room for the
    // spans in the result is enough.
    let regex = Compiler::new().compile(br"(<\d>)+", &mut buf).unwrap();
    let mut frames = vec![Frame::new(); regex.scratch_depth()];
    let mut matcher = Matcher::new(&regex, &mut frames, &mut captures);

    let m = matcher.find_at(b"12a", 0).unwrap().unwrap();
    assert_eq!(m.range(), 0..2);
    assert_eq!(m.group(0).collect::<Vec<_>>(), vec![0..1, 1..2]);

    // The same for groups outside loops, which need one slot each.
    let regex = Compiler::new().compile(br"<a|ab>c|<a>b", &mut buf).unwrap();
    assert_eq!(regex.fixed_capture_slots(), 2);

    let mut frames = vec![Frame::new(); regex.scratch_depth()];
    let mut captures = vec![Capture::new(); 1];
    let mut matcher = Matcher::new(&regex, &mut frames, &mut captures);

    let m = matcher.find_at(b"abd", 0).unwrap().unwrap();
    assert_eq!(m.range(), 0..2);
    assert_eq!(m.get(1), Some(0..1));
}

#[test]
fn scratch_depth_is_enough() {
    let patterns = [
        "a*",
        "(a|b)*b",
        "((a|b)+b)*?a",
        "(a?b)+",
        "a?b?a?",
        "(ab|a)(b|a)?",
        "<(a|ab)*?>b+",
        "(a(b|a)*)+",
        "x|(a|b){2,4}",
        "(<a|b>)+",
        "(a{1,2}?b|ba*)*?b?",
        "(a|ab)?b",
        "<(a|ab)>{1,3}b?",
        "((ab|a){1,2}b)*",
        "(<a|b>|ab){0,3}?a",
        "<a|<b>b?>{2}",
    ];

    let inputs = inputs(6);

    for pattern in patterns {
        let mut buf = [0; 1024];
        let regex = Compiler::new().compile(pattern.as_bytes(), &mut buf).unwrap();
        let depth = regex.scratch_depth();

        let mut frames = vec![Frame::new(); depth];
        let mut captures = vec![Capture::new(); 64];
        let mut matcher = Matcher::new(&regex, &mut frames, &mut captures);

        for input in &inputs {
            for start in 0..=input.len() {
                let result = matcher.try_match(input, start, |_| Action::Continue);
                assert!(
                    result.is_ok(),
                    "pattern: {}, input: {:?}, start: {}",
                    pattern,
                    bstr::BStr::new(input),
                    start
                );
            }
        }

        assert!(
            matcher.peak_depth() <= depth,
            "pattern: {}, peak depth: {}, scratch depth: {}",
            pattern,
            matcher.peak_depth(),
            depth
        );
    }
}
