//! Domain error types for the macro and target-graph core.
//!
//! Parser and scanner failures never reach this type: an unterminated call
//! or a stray `$` is recovered in place (see [`crate::parser`]), and an
//! unresolved macro name evaluates to the empty string (see
//! [`crate::context`]). Only the FATAL kinds from the design's error table
//! get a variant here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while evaluating macros or assembling the target graph.
#[derive(Debug, Error)]
pub enum CreatorError {
    /// A builtin function was called with the wrong number of arguments.
    #[error("builtin `{name}` expects {expected} argument(s), got {got}")]
    ArityMismatch {
        /// Builtin name.
        name: String,
        /// Human-readable arity description, e.g. `"2"` or `"at least 1"`.
        expected: String,
        /// Number of arguments actually supplied.
        got: usize,
    },

    /// A target or task name was registered twice within the same unit.
    #[error("`{0}` is already registered in this unit")]
    NameCollision(String),

    /// A context was assigned a value that is neither a string nor a node.
    #[error("cannot assign a non-string, non-node value to `{0}`")]
    TypeViolation(String),

    /// `do_setup` was invoked on a target that has already been set up.
    #[error("target `{0}` has already been set up")]
    SetupViolation(String),

    /// A unit identifier could not be resolved on the search path.
    #[error("unit `{0}` was not found on the search path")]
    UnitNotFound(String),

    /// A subprocess spawned by `shell_get` exited with a non-zero status.
    #[error("command `{command}` exited with status {status}")]
    ExitCodeError {
        /// The command line that was executed.
        command: String,
        /// The process exit status.
        status: i32,
    },

    /// A unit script file could not be read from disk.
    #[error("failed to read unit script {path}: {source}")]
    UnitIo {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// CLI flags were combined in a way §6.1 forbids, or the main unit could
    /// not be determined unambiguously. Maps to exit code 2, distinct from
    /// the exit code 1 used for every other (build/target) failure.
    #[error("{0}")]
    CliMisuse(String),
}

/// Convenience alias for results carrying a [`CreatorError`].
pub type CreatorResult<T> = Result<T, CreatorError>;
