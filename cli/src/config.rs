use std::path::Path;

use brex::DEFAULT_MAX_NESTING_DEPTH;
use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Configuration for the CLI.
#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Configuration for compiling patterns, used by all commands.
    pub compile: CompileConfig,
    /// Configuration for the `scan` command.
    pub scan: ScanConfig,
    /// Configuration for the `compile` command.
    pub export: ExportConfig,
}

/// Configuration for compiling patterns.
#[derive(Deserialize, Serialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct CompileConfig {
    /// Maximum level of nesting for groups.
    pub max_nesting_depth: usize,
    /// Size of the buffer where the code is written, patterns with larger
    /// code are rejected.
    pub code_capacity: usize,
}

/// Configuration for the `scan` command.
#[derive(Deserialize, Serialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Number of slots in the capture buffer.
    pub capture_slots: usize,
}

/// Configuration for the `compile` command.
#[derive(Deserialize, Serialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Name of the generated `static` array.
    pub name: String,
}

impl Default for CompileConfig {
    fn default() -> CompileConfig {
        CompileConfig {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            code_capacity: 4096,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> ScanConfig {
        ScanConfig { capture_slots: 64 }
    }
}

impl Default for ExportConfig {
    fn default() -> ExportConfig {
        ExportConfig { name: "PATTERN".to_string() }
    }
}

/// Load a config file from a given path. Path must contain a valid TOML file
/// or this function will propagate the error. Settings missing from the file
/// take their default values.
pub fn load_config_from_file(
    config_file: &Path,
) -> Result<Config, Box<figment::Error>> {
    let config: Config =
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file_exact(config_file))
            .extract()?;
    Ok(config)
}
