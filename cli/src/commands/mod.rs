mod check;
mod compile;
mod disasm;
mod scan;

pub use check::*;
pub use compile::*;
pub use disasm::*;
pub use scan::*;

use std::path::PathBuf;

use anyhow::anyhow;
use bstr::ByteSlice;
use brex::{Compiler, SyntaxError, MAX_HEADER_LEN};
use clap::{arg, command, crate_authors, value_parser, ArgMatches, Command};

use crate::config::Config;
use crate::{commands, help, APP_HELP_TEMPLATE};

pub fn command(name: &'static str) -> Command {
    Command::new(name).help_template(
        r#"{about-with-newline}
{usage-heading}
  {usage}

{all-args}
"#,
    )
}

pub fn cli() -> Command {
    command!()
        .author(crate_authors!("\n")) // requires `cargo` feature
        .arg_required_else_help(true)
        .arg(
            arg!(-C --config <CONFIG_FILE> "Config file")
                .value_parser(existing_path_parser)
                .long_help(help::CONFIG_FILE),
        )
        .arg(
            arg!(--"max-depth" <DEPTH> "Maximum level of nesting for groups")
                .long_help(help::MAX_DEPTH_LONG_HELP)
                .value_parser(value_parser!(usize))
                .global(true),
        )
        .help_template(APP_HELP_TEMPLATE)
        .subcommand_required(true)
        .subcommands(vec![
            commands::check(),
            commands::compile(),
            commands::disasm(),
            commands::scan(),
        ])
}

/// Compiles `pattern` with the settings in the config file, or the ones
/// passed as command-line arguments. Returns the bytes of the compiled
/// pattern.
pub fn compile_pattern(
    pattern: &str,
    args: &ArgMatches,
    config: &Config,
) -> anyhow::Result<Vec<u8>> {
    let max_depth = args
        .try_get_one::<usize>("max-depth")
        .ok()
        .flatten()
        .copied()
        .unwrap_or(config.compile.max_nesting_depth);

    let mut compiler = Compiler::new();
    compiler.max_nesting_depth(max_depth);

    let mut buf = vec![0; config.compile.code_capacity + MAX_HEADER_LEN];

    let len = compiler
        .compile(pattern.as_bytes(), &mut buf)
        .map_err(|err| syntax_error(pattern, err))?
        .as_bytes()
        .len();

    buf.truncate(len);

    Ok(buf)
}

/// Builds an error that shows the pattern with a caret under the position
/// where the error was found.
fn syntax_error(pattern: &str, err: SyntaxError) -> anyhow::Error {
    let prefix = &pattern.as_bytes()[..err.position().min(pattern.len())];
    anyhow!("{}\n\n  {}\n  {}^", err, pattern, " ".repeat(prefix.chars().count()))
}

/// Parses a path and makes sure that it exists.
fn existing_path_parser(input: &str) -> Result<PathBuf, anyhow::Error> {
    let path = PathBuf::from(input);
    if path.try_exists()? {
        Ok(path)
    } else {
        Err(anyhow!("file not found"))
    }
}
