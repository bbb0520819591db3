mod commands;
mod config;
mod help;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::{io, panic, process};

use anyhow::anyhow;
use clap::ArgMatches;
use crossterm::tty::IsTty;
use yansi::Color::Red;
use yansi::Paint;

use crate::commands::cli;
use crate::config::{load_config_from_file, Config};

const APP_HELP_TEMPLATE: &str = r#"brex {version}, regular expressions for tight memory budgets.

{author-with-newline}
{before-help}{usage-heading}
  {usage}

{all-args}{after-help}
"#;

const EXIT_ERROR: i32 = 1;
const CONFIG_FILE: &str = ".brex.toml";

fn main() -> anyhow::Result<()> {
    // Enable support for ANSI escape codes in Windows. In other platforms
    // this is a no-op.
    if let Err(err) = enable_ansi_support::enable_ansi_support() {
        println!("could not enable ANSI support: {}", err)
    }

    #[cfg(feature = "logging")]
    env_logger::init();

    // If stdout is not a tty (for example, because it was redirected to a
    // file) turn off colors. This way you can redirect the output to a file
    // without ANSI escape codes messing up the file content.
    if !io::stdout().is_tty() {
        yansi::disable();
    }

    let args = cli().get_matches_from(wild::args());

    // Kill the process when some panic occurs, after the default handler
    // prints the panic message.
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        process::exit(EXIT_ERROR);
    }));

    let result = load_config(&args).and_then(|config| match args.subcommand()
    {
        Some(("check", args)) => commands::exec_check(args, &config),
        Some(("compile", args)) => commands::exec_compile(args, &config),
        Some(("disasm", args)) => commands::exec_disasm(args, &config),
        Some(("scan", args)) => commands::exec_scan(args, &config),
        _ => unreachable!(),
    });

    if let Err(err) = result {
        if let Some(source) = err.source() {
            eprintln!("{} {}: {}", "error:".paint(Red).bold(), err, source);
        } else {
            eprintln!("{} {}", "error:".paint(Red).bold(), err);
        }
        process::exit(EXIT_ERROR);
    }

    Ok(())
}

/// Loads the config file passed with `--config`. If not specified, the file
/// in the user's home directory is used, and when that one doesn't exist or
/// is not valid the default configuration applies.
fn load_config(args: &ArgMatches) -> anyhow::Result<Config> {
    if let Some(path) = args.get_one::<PathBuf>("config") {
        return load_config_from_file(path).map_err(|err| {
            anyhow!("invalid config file `{}`: {}", path.display(), err)
        });
    }

    let config = match home::home_dir() {
        Some(home_path) if !home_path.as_os_str().is_empty() => {
            load_config_from_file(&home_path.join(CONFIG_FILE))
                .unwrap_or_default()
        }
        _ => Config::default(),
    };

    Ok(config)
}
