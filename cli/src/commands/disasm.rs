use anyhow::Context;
use brex::Regex;
use clap::{arg, ArgMatches, Command};

use crate::commands::compile_pattern;
use crate::config::Config;

pub fn disasm() -> Command {
    super::command("disasm")
        .about("Show the code produced for a pattern")
        .arg(arg!(<PATTERN>).help("Pattern to disassemble"))
}

pub fn exec_disasm(args: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    let pattern = args.get_one::<String>("PATTERN").unwrap();
    let bytes = compile_pattern(pattern, args, config)?;
    let regex = Regex::from_bytes(&bytes)
        .context("the compiler produced an invalid pattern")?;

    println!("code length: {}", regex.code().len());
    println!("scratch depth: {}", regex.scratch_depth());
    println!("captures: {}", regex.num_captures());

    for i in 0..regex.num_captures() {
        if regex.capture_in_loop(i) {
            println!("  <{}> inside loop", i);
        }
    }

    print!("{}", regex);

    Ok(())
}
