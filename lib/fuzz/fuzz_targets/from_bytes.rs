#![no_main]
use brex::{Capture, Frame, Matcher, Regex};
use libfuzzer_sys::fuzz_target;

// Any code accepted by `Regex::from_bytes` must be safe to run, it may fail
// with `MatchError`, but never panic or loop forever.
fuzz_target!(|data: &[u8]| {
    let Ok(regex) = Regex::from_bytes(data) else {
        return;
    };

    let mut frames = vec![Frame::new(); 64];
    let mut captures = vec![Capture::new(); 64];
    let mut matcher = Matcher::new(&regex, &mut frames, &mut captures);

    let _ = matcher.find_at(b"aaaabbbbabab\naa", 0);
});
