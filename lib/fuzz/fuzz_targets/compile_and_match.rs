#![no_main]
use brex::{Capture, Compiler, Frame, MatchError, Matcher};
use libfuzzer_sys::fuzz_target;

// The bytes up to the first NUL are the pattern, the rest is the input. Matching
// with a frame buffer of exactly `scratch_depth` frames must never run out of
// frames.
fuzz_target!(|data: &[u8]| {
    let (pattern, input) = match data.iter().position(|b| *b == 0) {
        Some(nul) => (&data[..nul], &data[nul + 1..]),
        None => (data, &[][..]),
    };

    let mut buf = [0; 4096];
    let Ok(regex) = Compiler::new().compile(pattern, &mut buf) else {
        return;
    };

    let mut frames = vec![Frame::new(); regex.scratch_depth()];
    let mut captures = vec![Capture::new(); 1024];
    let mut matcher = Matcher::new(&regex, &mut frames, &mut captures);

    match matcher.find_at(input, 0) {
        Ok(_) | Err(MatchError::CaptureBufferExhausted { .. }) => {}
        Err(err @ MatchError::ScratchExhausted { .. }) => {
            panic!("{} with pattern {:?}", err, bstr::BStr::new(pattern))
        }
    }
});
