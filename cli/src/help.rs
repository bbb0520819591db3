pub const CAPTURE_SLOTS_LONG_HELP: &str = r#"Number of slots in the capture buffer

Every capture group outside of loops needs one slot, groups inside loops need one
slot per iteration. Matching fails if the buffer is not large enough. The default
value is taken from the config file, or 64 if not specified there."#;

pub const CHECK_LONG_HELP: &str = r#"Check if a pattern is correct

Compiles the pattern and shows the resources needed for matching it: the number
of backtracking frames (scratch depth) and the number of capture groups."#;

pub const COMPILE_LONG_HELP: &str = r#"Compile a pattern to Rust source code

The compiled pattern is written as a `static` array of bytes that can be embedded
in a program and loaded with `Regex::from_bytes`.

Examples:

brex compile '<\d+>-<\d+>' --name RANGE -o patterns.rs
brex compile '\i\c*' --name IDENT -o patterns.rs --append"#;

pub const CONFIG_FILE: &str = r#"Config file for brex

Specifies a config file which controls the behavior of brex. If config file is not
specified, ${HOME}/.brex.toml is used. If it does not exist the default options are
applied.

Supported options:

[compile]
max_nesting_depth = 16
code_capacity = 4096

[scan]
capture_slots = 64

[export]
name = "PATTERN""#;

pub const MAX_DEPTH_LONG_HELP: &str = r#"Maximum level of nesting for groups

Patterns with groups nested deeper than this are rejected. Overrides the value in
the config file."#;

pub const SCAN_LONG_HELP: &str = r#"Scan files with a pattern

Prints every non-overlapping match of the pattern found in the given files, with
the span of each capture group.

Examples:

brex scan '<\a+>=<\d+>' config.ini
brex scan --anchored '#!/bin/\a+' script.sh"#;
