use anyhow::Context;
use brex::Regex;
use clap::{arg, ArgMatches, Command};
use yansi::Color::Green;
use yansi::Paint;

use crate::commands::compile_pattern;
use crate::config::Config;
use crate::help;

pub fn check() -> Command {
    super::command("check")
        .about("Check if a pattern is correct")
        .long_about(help::CHECK_LONG_HELP)
        .arg(arg!(<PATTERN>).help("Pattern to check"))
}

pub fn exec_check(args: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    let pattern = args.get_one::<String>("PATTERN").unwrap();
    let bytes = compile_pattern(pattern, args, config)?;
    let regex = Regex::from_bytes(&bytes)
        .context("the compiler produced an invalid pattern")?;

    println!(
        "{} {} bytes, scratch depth: {}, captures: {} ({} inside loops)",
        "ok:".paint(Green).bold(),
        bytes.len(),
        regex.scratch_depth(),
        regex.num_captures(),
        regex.num_captures() - regex.fixed_capture_slots(),
    );

    Ok(())
}
