use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use brex::export::to_rust_source;
use brex::Regex;
use clap::{arg, value_parser, ArgMatches, Command};

use crate::commands::compile_pattern;
use crate::config::Config;
use crate::help;

pub fn compile() -> Command {
    super::command("compile")
        .about("Compile a pattern to Rust source code")
        .long_about(help::COMPILE_LONG_HELP)
        .arg(arg!(<PATTERN>).help("Pattern to compile"))
        // Keep options sorted alphabetically by their long name.
        // For instance, --bar goes before --foo.
        .arg(
            arg!(-a --"append")
                .help("Append to the output file instead of overwriting it")
                .requires("output"),
        )
        .arg(
            arg!(-n --"name" <NAME>)
                .help("Name of the generated array")
        )
        .arg(
            arg!(-o --"output" <OUTPUT_PATH>)
                .help("Output file, the code is printed to stdout if not specified")
                .value_parser(value_parser!(PathBuf))
        )
}

pub fn exec_compile(args: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    let pattern = args.get_one::<String>("PATTERN").unwrap();
    let output_path = args.get_one::<PathBuf>("output");
    let append = args.get_flag("append");

    let name = args
        .get_one::<String>("name")
        .unwrap_or(&config.export.name);

    let bytes = compile_pattern(pattern, args, config)?;
    let regex = Regex::from_bytes(&bytes)
        .context("the compiler produced an invalid pattern")?;

    let src = to_rust_source(&regex, name, Some(pattern.as_bytes()))
        .with_context(|| format!("`{}` is not a valid name", name))?;

    let Some(output_path) = output_path else {
        print!("{}", src);
        return Ok(());
    };

    let mut output_file = OpenOptions::new()
        .write(true)
        .create(true)
        .append(append)
        .truncate(!append)
        .open(output_path)
        .with_context(|| {
            format!("can not write `{}`", output_path.display())
        })?;

    if append {
        writeln!(output_file)?;
    }

    output_file.write_all(src.as_bytes())?;

    Ok(())
}
