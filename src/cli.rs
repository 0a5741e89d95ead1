//! Command line interface definition (§6.1).
//!
//! No config-file layering and no localized error copy: this is a plain
//! `clap` derive struct with no extra machinery.

use camino::Utf8PathBuf;
use clap::Parser;

/// Creator: loads unit scripts, resolves the target graph, and either emits
/// a Ninja manifest or drives Ninja directly.
#[derive(Debug, Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Bind a global macro as a literal `Text` node. Repeatable.
    #[arg(short = 'D', value_name = "KEY[=VAL]")]
    pub define: Vec<String>,

    /// Bind a global macro, parsing `VAL` as a macro expression. Repeatable.
    #[arg(short = 'M', value_name = "KEY[=VAL]")]
    pub define_macro: Vec<String>,

    /// Prepend a directory to the unit search path. Repeatable.
    #[arg(short = 'i', long = "unitpath", value_name = "DIR")]
    pub unitpath: Vec<Utf8PathBuf>,

    /// Main unit identifier. If omitted, exactly one `*.crunit` file must
    /// exist in the current directory.
    #[arg(short = 'u', long = "unit", value_name = "ID")]
    pub unit: Option<String>,

    /// Target or task identifiers, `unit:name` or unit-local.
    pub targets: Vec<String>,

    /// Only export the manifest; warn on task arguments.
    #[arg(short = 'e', long = "export")]
    pub export: bool,

    /// Force skip export (run tasks directly instead of invoking Ninja).
    #[arg(short = 'n', long = "no-export")]
    pub no_export: bool,

    /// Load and set up the workspace, then exit without building.
    #[arg(short = 'd', long = "dry")]
    pub dry: bool,

    /// Override the manifest output path (default: the main unit's
    /// `$self:NinjaOut` macro, else `build.ninja`).
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,

    /// Pass `-t clean` through to Ninja.
    #[arg(short = 'c', long = "clean")]
    pub clean: bool,

    /// Pass `-v` through to Ninja and raise the tracing level.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Raw arguments forwarded verbatim to Ninja.
    #[arg(short = 'a', long = "args", value_name = "ARG")]
    pub args: Vec<String>,
}

impl Cli {
    /// Parse from `std::env::args`, exiting the process with clap's usual
    /// usage/error output on CLI misuse (exit code 2 per §6.1).
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
