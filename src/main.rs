//! Application entry point.
//!
//! Parses command-line arguments and delegates execution to the dispatcher.
//! The embedded scripting host that actually evaluates a `.crunit` file's
//! source is an external collaborator (§1, §9 Design Notes of the
//! specification this binary implements): this binary wires up
//! `UnimplementedHost`, a placeholder that reports clearly which seam a
//! real deployment needs to fill in rather than silently doing nothing.

use creator::cli::Cli;
use creator::dispatch;
use creator::error::{CreatorError, CreatorResult};
use creator::host_api::{HostApi, ScriptHost};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt;

/// Stand-in for the embedded scripting sandbox named in §6.2: this crate
/// owns the callback surface a host calls into, not the host itself. A real
/// distribution of this build system plugs in a concrete interpreter here.
struct UnimplementedHost;

impl ScriptHost for UnimplementedHost {
    fn run(&self, _source: &str, api: &mut HostApi<'_>) -> CreatorResult<()> {
        Err(CreatorError::UnitIo {
            path: std::path::PathBuf::from(api.unit_id()),
            source: std::io::Error::other(
                "no script sandbox is wired up; this build carries only the core \
                 macro/target-graph engine, not an embedded script interpreter",
            ),
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    let max_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    fmt().with_max_level(max_level).init();

    match dispatch::dispatch(&cli, &UnimplementedHost) {
        Ok(outcome) => {
            if outcome.exit_code == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err @ CreatorError::CliMisuse(_)) => {
            tracing::error!(error = %err, "creator invoked incorrectly");
            ExitCode::from(2)
        }
        Err(err) => {
            tracing::error!(error = %err, "creator failed");
            ExitCode::FAILURE
        }
    }
}
