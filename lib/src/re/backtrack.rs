/*! A backtracking matcher that runs without recursion and without allocating
memory.

The matcher executes the code produced by the [compiler][1], keeping the
choice-points it may need to return to in a stack of [`Frame`]s provided by
the caller. The spans of capture groups are recorded in a log of
[`Capture`]s, also provided by the caller.

# Frames

A `SPLIT` pushes a frame that resumes the execution at the next alternative
when the matcher backtracks. A capture group pushes a frame that holds the
position where the group starts. The span of the group is appended to the
capture log when the group closes, and the frame is discarded at that point
unless some choice-point inside the group is still alive.

Loops with a finite upper bound whose body pushes frames keep those frames
when an iteration completes, and push a frame with the number of iterations
after each of them. Backtracking can resume inside any completed iteration,
and the frame below it tells how many iterations preceded it.

Any other loop pushes a single frame that lives while the matcher is inside
the loop or anywhere after it, and tracks the number of iterations completed
so far. Its iterations are atomic: when an iteration is complete, the frames
pushed by the loop's body are discarded. When a greedy loop must retry with
fewer iterations, the matcher replays the loop from its start, stopping one
iteration earlier than in the previous attempt. Replaying is deterministic,
the body of each iteration follows the same path it followed originally.
Loops whose body consumes exactly one byte are much simpler, as the position
after N iterations is the position at the start of the loop plus N.

These rules are what make the number of frames needed for a pattern
depend only on the pattern's shape, see [`crate::Regex::scratch_depth`].

[1]: crate::re::compiler::Compiler
*/

use std::ops::Range;

use crate::errors::MatchError;
use crate::re::instr::{apply_offset, Instr, InstrParser, Repeat};
use crate::re::{Action, UNBOUNDED};
use crate::regex::Regex;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum FrameKind {
    /// Choice-point created by a `SPLIT`.
    #[default]
    Alternative,
    /// Start of a capture group.
    Capture,
    /// The loop is performing iterations for the first time.
    Iterating,
    /// The loop is performing again the first `target` iterations.
    Replaying,
    /// The loop is complete and the matcher is somewhere after it.
    Exited,
    /// Like `Exited`, but the loop can't perform more iterations because
    /// the last one didn't make any progress.
    Stalled,
    /// Iterations completed so far by a loop that keeps the frames of its
    /// iterations. On backtrack a greedy loop exits with this number of
    /// iterations, and a non-greedy one performs another iteration.
    Boundary,
    /// Like `Boundary`, but there's nothing left to try with this number of
    /// iterations.
    Counter,
}

impl FrameKind {
    #[inline]
    fn is_loop(self) -> bool {
        !matches!(self, FrameKind::Alternative | FrameKind::Capture)
    }
}

/// A backtracking frame.
///
/// Callers provide the matcher with a slice of frames, which must be at
/// least [`crate::Regex::scratch_depth`] long.
#[derive(Clone, Copy, Debug, Default)]
pub struct Frame {
    kind: FrameKind,
    /// For alternatives, the location where the execution resumes. For
    /// loops, the location of the `REPEAT` instruction. For captures, the
    /// index of the capture group.
    ip: usize,
    /// For alternatives, the input position where the execution resumes.
    /// For loops, the position after the last completed iteration. For
    /// captures, the position where the group starts.
    pos: usize,
    /// Length of the capture log, at the same point than `pos`.
    captures: usize,
    /// Input position at the start of the loop.
    start: usize,
    /// Length of the capture log at the start of the loop.
    captures_start: usize,
    /// Number of completed iterations.
    count: usize,
    /// Number of iterations to perform while replaying.
    target: usize,
}

impl Frame {
    /// Creates a new frame. Useful for initializing static arrays of
    /// frames.
    pub const fn new() -> Self {
        Self {
            kind: FrameKind::Alternative,
            ip: 0,
            pos: 0,
            captures: 0,
            start: 0,
            captures_start: 0,
            count: 0,
            target: 0,
        }
    }
}

/// The span of a capture group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capture {
    index: u8,
    start: usize,
    end: usize,
}

impl Capture {
    /// Creates a new capture. Useful for initializing static arrays of
    /// captures.
    pub const fn new() -> Self {
        Self { index: 0, start: 0, end: 0 }
    }

    /// Index of the capture group.
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Span of the capture within the input.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// A match found by the [`Matcher`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match<'a> {
    range: Range<usize>,
    captures: &'a [Capture],
}

impl<'a> Match<'a> {
    /// Span of the match within the input.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Offset where the match starts.
    #[inline]
    pub fn start(&self) -> usize {
        self.range.start
    }

    /// Offset where the match ends, exclusive.
    #[inline]
    pub fn end(&self) -> usize {
        self.range.end
    }

    /// Spans of all capture groups, in the order they were closed.
    #[inline]
    pub fn captures(&self) -> &'a [Capture] {
        self.captures
    }

    /// Returns the spans of capture group `index`, in the order they were
    /// closed. Groups that are not inside a loop produce at most one span.
    pub fn group(
        &self,
        index: usize,
    ) -> impl Iterator<Item = Range<usize>> + 'a {
        self.captures
            .iter()
            .filter(move |capture| capture.index() == index)
            .map(Capture::range)
    }

    /// Returns the last span of capture group `index`, if any.
    pub fn get(&self, index: usize) -> Option<Range<usize>> {
        self.captures
            .iter()
            .rev()
            .find(|capture| capture.index() == index)
            .map(Capture::range)
    }
}

/// Registers of the matcher while executing code.
struct State {
    /// Instruction pointer.
    ip: usize,
    /// Current position within the input.
    pos: usize,
    /// Number of frames in the stack.
    sp: usize,
    /// Number of records in the capture log.
    log: usize,
}

/// Executes the code of a [`Regex`] against some input.
pub struct Matcher<'r, 's> {
    code: &'r [u8],
    frames: &'s mut [Frame],
    captures: &'s mut [Capture],
    peak: usize,
}

impl<'r, 's> Matcher<'r, 's> {
    /// Creates a matcher for `regex` that uses the given buffers.
    ///
    /// `frames` must have at least [`Regex::scratch_depth`] frames. `captures`
    /// must have at least [`Regex::fixed_capture_slots`] slots, plus as many
    /// slots as spans the caller expects from capture groups inside loops.
    /// With smaller buffers the matcher fails with [`MatchError`].
    pub fn new(
        regex: &Regex<'r>,
        frames: &'s mut [Frame],
        captures: &'s mut [Capture],
    ) -> Self {
        Self { code: regex.code(), frames, captures, peak: 0 }
    }

    /// Maximum number of frames that were in use at the same time, since
    /// this matcher was created.
    #[inline]
    pub fn peak_depth(&self) -> usize {
        self.peak
    }

    /// Returns the first match that starts at `start`, in priority order.
    pub fn match_at(
        &mut self,
        input: &[u8],
        start: usize,
    ) -> Result<Option<Match<'_>>, MatchError> {
        Ok(self
            .run(input, start, |_| Action::Stop)?
            .map(|(range, log)| Match { range, captures: &self.captures[..log] }))
    }

    /// Returns the leftmost match that starts at `start` or after it.
    ///
    /// Patterns that start with `^` are tried only at offset 0.
    pub fn find_at(
        &mut self,
        input: &[u8],
        start: usize,
    ) -> Result<Option<Match<'_>>, MatchError> {
        let anchored = matches!(
            InstrParser::try_decode_instr(self.code),
            Some((Instr::Start, _))
        );

        for offset in start..=input.len() {
            if anchored && offset > 0 {
                break;
            }
            if let Some((range, log)) =
                self.run(input, offset, |_| Action::Stop)?
            {
                return Ok(Some(Match {
                    range,
                    captures: &self.captures[..log],
                }));
            }
        }

        Ok(None)
    }

    /// Calls `f` for every match that starts at `start`, in priority order.
    ///
    /// The `f` function must return either [`Action::Continue`] or
    /// [`Action::Stop`], the former will cause the matcher to backtrack and
    /// keep looking for other matches, while the latter stops the search.
    /// Returns true if the search was stopped by `f`.
    pub fn try_match<F>(
        &mut self,
        input: &[u8],
        start: usize,
        f: F,
    ) -> Result<bool, MatchError>
    where
        F: FnMut(&Match) -> Action,
    {
        Ok(self.run(input, start, f)?.is_some())
    }

    /// Runs the code, calling `f` for every match. When `f` returns
    /// [`Action::Stop`] returns the span of the match and the length of the
    /// capture log.
    fn run<F>(
        &mut self,
        input: &[u8],
        start: usize,
        mut f: F,
    ) -> Result<Option<(Range<usize>, usize)>, MatchError>
    where
        F: FnMut(&Match) -> Action,
    {
        if start > input.len() {
            return Ok(None);
        }

        let code = self.code;
        let mut st = State { ip: 0, pos: start, sp: 0, log: 0 };

        loop {
            let (instr, size) = InstrParser::decode_instr(&code[st.ip..]);

            let ok = match instr {
                Instr::Byte(_)
                | Instr::AnyByte
                | Instr::ClassBitmap(_)
                | Instr::ClassRanges(_) => {
                    match input.get(st.pos) {
                        Some(b) if instr.matches_byte(*b) => {
                            st.pos += 1;
                            st.ip += size;
                            true
                        }
                        _ => false,
                    }
                }
                Instr::Start => {
                    st.ip += size;
                    st.pos == 0
                }
                Instr::End => {
                    st.ip += size;
                    st.pos == input.len()
                }
                Instr::Split(offset) => {
                    self.push(
                        &mut st.sp,
                        Frame {
                            kind: FrameKind::Alternative,
                            ip: apply_offset(st.ip, offset),
                            pos: st.pos,
                            captures: st.log,
                            ..Frame::new()
                        },
                    )?;
                    st.ip += size;
                    true
                }
                Instr::Jump(offset) => {
                    st.ip = apply_offset(st.ip, offset);
                    true
                }
                Instr::CaptureStart(index) => {
                    self.push(
                        &mut st.sp,
                        Frame {
                            kind: FrameKind::Capture,
                            ip: index as usize,
                            pos: st.pos,
                            ..Frame::new()
                        },
                    )?;
                    st.ip += size;
                    true
                }
                Instr::CaptureEnd(index) => {
                    let ok = self.capture_end(index, &mut st)?;
                    st.ip += size;
                    ok
                }
                Instr::Repeat(repeat) => self.repeat(input, repeat, &mut st)?,
                Instr::RepeatEnd(offset) => self.repeat_end(
                    input,
                    apply_offset(st.ip, offset),
                    &mut st,
                )?,
                Instr::Match => {
                    let m = Match {
                        range: start..st.pos,
                        captures: &self.captures[..st.log],
                    };
                    match f(&m) {
                        Action::Stop => return Ok(Some((start..st.pos, st.log))),
                        Action::Continue => false,
                    }
                }
            };

            if !ok && !self.backtrack(input, &mut st) {
                return Ok(None);
            }
        }
    }

    #[inline]
    fn push(&mut self, sp: &mut usize, frame: Frame) -> Result<(), MatchError> {
        let capacity = self.frames.len();
        let slot = self
            .frames
            .get_mut(*sp)
            .ok_or(MatchError::ScratchExhausted { capacity })?;
        *slot = frame;
        *sp += 1;
        self.peak = self.peak.max(*sp);
        Ok(())
    }

    /// Executes a `CAPTURE_END` instruction, appending the span of the
    /// capture to the log. Returns false if the capture was never opened,
    /// which can happen only with code loaded from untrusted bytes.
    fn capture_end(
        &mut self,
        index: u8,
        st: &mut State,
    ) -> Result<bool, MatchError> {
        let Some(open) = self.frames[..st.sp].iter().rposition(|frame| {
            frame.kind == FrameKind::Capture && frame.ip == index as usize
        }) else {
            return Ok(false);
        };

        let start = self.frames[open].pos;
        let capacity = self.captures.len();
        let slot = self
            .captures
            .get_mut(st.log)
            .ok_or(MatchError::CaptureBufferExhausted { capacity })?;

        *slot = Capture { index, start, end: st.pos };
        st.log += 1;

        // Nothing inside the group can be retried.
        if open + 1 == st.sp {
            st.sp = open;
        }

        Ok(true)
    }

    /// Executes the `REPEAT` instruction at `st.ip`. Returns false if the
    /// matcher must backtrack.
    fn repeat(
        &mut self,
        input: &[u8],
        repeat: Repeat,
        st: &mut State,
    ) -> Result<bool, MatchError> {
        let body = st.ip + Repeat::SIZE;
        let after = body + repeat.body_len as usize;

        let frame = Frame {
            kind: FrameKind::Iterating,
            ip: st.ip,
            pos: st.pos,
            captures: st.log,
            start: st.pos,
            captures_start: st.log,
            count: 0,
            target: 0,
        };

        if repeat.keep_frames {
            let kind = if repeat.min == 0 {
                FrameKind::Boundary
            } else {
                FrameKind::Counter
            };
            self.push(&mut st.sp, Frame { kind, ..frame })?;
            st.ip = if repeat.greedy || repeat.min > 0 { body } else { after };
            return Ok(true);
        }

        if !repeat.single_byte {
            if !repeat.greedy && repeat.min == 0 {
                // Zero iterations is the first option, the loop is entered
                // only when backtracking.
                self.push(&mut st.sp, Frame { kind: FrameKind::Exited, ..frame })?;
                st.ip = after;
            } else {
                self.push(&mut st.sp, frame)?;
                st.ip = body;
            }
            return Ok(true);
        }

        let code = self.code;
        let (byte, _) = InstrParser::decode_instr(&code[body..]);
        let rest = &input[st.pos..];

        let count = if repeat.greedy {
            let limit = if repeat.max == UNBOUNDED {
                usize::MAX
            } else {
                repeat.max as usize
            };
            rest.iter().take_while(|b| byte.matches_byte(**b)).take(limit).count()
        } else {
            repeat.min()
        };

        if count < repeat.min()
            || count > rest.len()
            || !rest[..count].iter().all(|b| byte.matches_byte(*b))
        {
            return Ok(false);
        }

        // The frame is needed only if backtracking can try some other
        // number of iterations.
        let needs_frame = if repeat.greedy {
            count > repeat.min()
        } else {
            repeat.allows_more(count) && count < rest.len()
        };

        if needs_frame {
            self.push(
                &mut st.sp,
                Frame { kind: FrameKind::Exited, count, ..frame },
            )?;
        }

        st.pos += count;
        st.ip = after;

        Ok(true)
    }

    /// Executes a `REPEAT_END` instruction for the loop that starts at
    /// `loop_ip`. Returns false if the matcher must backtrack.
    fn repeat_end(
        &mut self,
        input: &[u8],
        loop_ip: usize,
        st: &mut State,
    ) -> Result<bool, MatchError> {
        let Some(top) = self.frames[..st.sp]
            .iter()
            .rposition(|frame| frame.ip == loop_ip && frame.kind.is_loop())
        else {
            return Ok(false);
        };

        let code = self.code;
        let (Instr::Repeat(repeat), _) = InstrParser::decode_instr(&code[loop_ip..])
        else {
            return Ok(false);
        };

        if repeat.keep_frames {
            self.keep_iteration(loop_ip, repeat, top, st)?;
            return Ok(true);
        }

        // The iteration is complete, the frames pushed by the body are not
        // needed anymore.
        st.sp = top + 1;

        let frame = &mut self.frames[top];
        let progressed = st.pos != frame.pos;

        frame.count += 1;
        frame.pos = st.pos;
        frame.captures = st.log;

        let again = match frame.kind {
            FrameKind::Replaying => frame.count < frame.target,
            FrameKind::Iterating if repeat.greedy => {
                frame.count < repeat.min()
                    || (progressed
                        && st.pos < input.len()
                        && repeat.allows_more(frame.count))
            }
            FrameKind::Iterating => frame.count < repeat.min(),
            _ => false,
        };

        if again {
            st.ip = loop_ip + Repeat::SIZE;
        } else {
            frame.kind = if progressed || repeat.greedy {
                FrameKind::Exited
            } else {
                FrameKind::Stalled
            };
            st.ip = loop_ip + Repeat::SIZE + repeat.body_len as usize;
        }

        Ok(true)
    }

    /// Completes an iteration of a loop that keeps the frames pushed by its
    /// body. `top` is the frame pushed by the loop before the iteration
    /// started.
    fn keep_iteration(
        &mut self,
        loop_ip: usize,
        repeat: Repeat,
        top: usize,
        st: &mut State,
    ) -> Result<(), MatchError> {
        let body = loop_ip + Repeat::SIZE;
        let after = body + repeat.body_len as usize;
        let count = self.frames[top].count + 1;

        if !repeat.allows_more(count) {
            st.ip = after;
            return Ok(());
        }

        let more_needed = count < repeat.min();

        self.push(
            &mut st.sp,
            Frame {
                kind: if more_needed {
                    FrameKind::Counter
                } else {
                    FrameKind::Boundary
                },
                ip: loop_ip,
                pos: st.pos,
                captures: st.log,
                count,
                ..Frame::new()
            },
        )?;

        st.ip = if repeat.greedy || more_needed { body } else { after };

        Ok(())
    }

    /// Restores the state saved in the topmost frame that offers some
    /// alternative. Returns false if there are no alternatives left.
    fn backtrack(&mut self, input: &[u8], st: &mut State) -> bool {
        let code = self.code;

        while st.sp > 0 {
            let top = st.sp - 1;
            let frame = &mut self.frames[top];

            match frame.kind {
                FrameKind::Alternative => {
                    st.sp = top;
                    st.ip = frame.ip;
                    st.pos = frame.pos;
                    st.log = frame.captures;
                    return true;
                }
                FrameKind::Capture | FrameKind::Counter => {
                    st.sp = top;
                    continue;
                }
                _ => {}
            }

            let (Instr::Repeat(repeat), _) =
                InstrParser::decode_instr(&code[frame.ip..])
            else {
                st.sp = top;
                continue;
            };

            let body = frame.ip + Repeat::SIZE;
            let after = body + repeat.body_len as usize;

            if frame.kind == FrameKind::Boundary {
                st.pos = frame.pos;
                st.log = frame.captures;
                if repeat.greedy {
                    // Exit the loop with the iterations completed so far.
                    st.sp = top;
                    st.ip = after;
                } else {
                    // One iteration more. The frame stays, it holds the
                    // count while the iteration is in progress.
                    frame.kind = FrameKind::Counter;
                    st.ip = body;
                }
                return true;
            }

            if repeat.single_byte {
                if repeat.greedy {
                    // One iteration less. The frame is not needed anymore
                    // when the minimum is reached.
                    frame.count -= 1;
                    if frame.count == repeat.min() {
                        st.sp = top;
                    }
                } else {
                    // One iteration more, if possible.
                    let (byte, _) = InstrParser::decode_instr(&code[body..]);
                    let next = frame.start + frame.count;
                    match input.get(next) {
                        Some(b)
                            if repeat.allows_more(frame.count)
                                && byte.matches_byte(*b) =>
                        {
                            frame.count += 1
                        }
                        _ => {
                            st.sp = top;
                            continue;
                        }
                    }
                }
                st.pos = frame.start + frame.count;
                st.log = frame.captures;
                st.ip = after;
                return true;
            }

            match frame.kind {
                // The body failed at some iteration, but the iterations
                // completed so far are enough.
                FrameKind::Iterating
                    if repeat.greedy && frame.count >= repeat.min() =>
                {
                    frame.kind = FrameKind::Exited;
                    st.pos = frame.pos;
                    st.log = frame.captures;
                    st.ip = after;
                    return true;
                }
                // Replay the loop from the start, with one iteration less.
                FrameKind::Exited
                    if repeat.greedy && frame.count > repeat.min() =>
                {
                    let target = frame.count - 1;
                    frame.count = 0;
                    frame.pos = frame.start;
                    frame.captures = frame.captures_start;
                    st.pos = frame.start;
                    st.log = frame.captures_start;
                    if target == 0 {
                        st.ip = after;
                    } else {
                        frame.kind = FrameKind::Replaying;
                        frame.target = target;
                        st.ip = body;
                    }
                    return true;
                }
                // Try one iteration more.
                FrameKind::Exited
                    if !repeat.greedy
                        && repeat.allows_more(frame.count)
                        && frame.pos < input.len() =>
                {
                    frame.kind = FrameKind::Iterating;
                    st.pos = frame.pos;
                    st.log = frame.captures;
                    st.ip = body;
                    return true;
                }
                _ => {
                    st.sp = top;
                }
            }
        }

        false
    }
}
