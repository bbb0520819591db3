use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use bstr::BStr;
use brex::{Capture, Frame, Matcher, Regex};
use clap::{arg, value_parser, ArgAction, ArgMatches, Command};
use yansi::Color::Cyan;
use yansi::Paint;

use crate::commands::compile_pattern;
use crate::config::Config;
use crate::help;

#[rustfmt::skip]
pub fn scan() -> Command {
    super::command("scan")
        .about("Scan files with a pattern")
        .long_about(help::SCAN_LONG_HELP)
        .arg(arg!(<PATTERN>).help("Pattern to search for"))
        .arg(
            arg!(<INPUT_PATH>)
                .help("Path to the files that will be scanned")
                .value_parser(value_parser!(PathBuf))
                .action(ArgAction::Append)
        )
        // Keep options sorted alphabetically by their long name.
        // For instance, --bar goes before --foo.
        .arg(
            arg!(--"anchored")
                .help("Match only at the start of each file")
        )
        .arg(
            arg!(--"capture-slots" <SLOTS>)
                .help("Number of slots in the capture buffer")
                .long_help(help::CAPTURE_SLOTS_LONG_HELP)
                .value_parser(value_parser!(usize))
        )
}

pub fn exec_scan(args: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    let pattern = args.get_one::<String>("PATTERN").unwrap();
    let input_paths = args.get_many::<PathBuf>("INPUT_PATH").unwrap();
    let anchored = args.get_flag("anchored");

    let capture_slots = args
        .get_one::<usize>("capture-slots")
        .copied()
        .unwrap_or(config.scan.capture_slots);

    let bytes = compile_pattern(pattern, args, config)?;
    let regex = Regex::from_bytes(&bytes)
        .context("the compiler produced an invalid pattern")?;

    let mut frames = vec![Frame::new(); regex.scratch_depth()];
    let mut captures = vec![Capture::new(); capture_slots];

    for path in input_paths {
        let input = fs::read(path)
            .with_context(|| format!("can not read `{}`", path.display()))?;

        let mut matcher = Matcher::new(&regex, &mut frames, &mut captures);

        scan_input(&mut matcher, path, &input, anchored)
            .with_context(|| format!("error scanning `{}`", path.display()))?;
    }

    Ok(())
}

/// Prints every non-overlapping match found in `input`.
fn scan_input(
    matcher: &mut Matcher,
    path: &Path,
    input: &[u8],
    anchored: bool,
) -> anyhow::Result<()> {
    let mut start = 0;
    let mut first = true;

    while start <= input.len() {
        let m = if anchored {
            matcher.match_at(input, start)?
        } else {
            matcher.find_at(input, start)?
        };

        let Some(m) = m else {
            break;
        };

        if first {
            println!("{}", path.display().paint(Cyan).bold());
            first = false;
        }

        println!(
            "{:#x}:{}: {:?}",
            m.start(),
            m.end() - m.start(),
            BStr::new(&input[m.range()])
        );

        for capture in m.captures() {
            let range = capture.range();
            println!(
                "  <{}> {:#x}:{}: {:?}",
                capture.index(),
                range.start,
                range.len(),
                BStr::new(&input[range.clone()])
            );
        }

        if anchored {
            break;
        }

        // Empty matches advance one byte, so that the same empty match is
        // not found again.
        start = if m.range().is_empty() { m.end() + 1 } else { m.end() };
    }

    Ok(())
}
