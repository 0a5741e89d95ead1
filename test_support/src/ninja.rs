//! Helpers for working with the `ninja` binary in integration tests.

use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use tempfile::{TempDir, tempdir};

/// Errors preparing a Ninja-backed integration test.
#[derive(Debug)]
pub enum NinjaWorkspaceError {
    /// `ninja --version` failed to spawn, most likely because Ninja is not
    /// on `PATH`.
    ProbeSpawn(std::io::Error),
    /// `ninja --version` ran but returned a non-success status.
    ProbeFailed(ExitStatus),
    /// Creating the temporary workspace failed.
    Workspace(std::io::Error),
}

impl fmt::Display for NinjaWorkspaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProbeSpawn(err) => write!(f, "failed to spawn `ninja --version`: {err}"),
            Self::ProbeFailed(status) => write!(f, "`ninja --version` exited with {status}"),
            Self::Workspace(err) => write!(f, "failed to create ninja workspace: {err}"),
        }
    }
}

impl std::error::Error for NinjaWorkspaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ProbeSpawn(err) | Self::Workspace(err) => Some(err),
            Self::ProbeFailed(_) => None,
        }
    }
}

fn probe_ninja() -> Result<(), NinjaWorkspaceError> {
    let output = Command::new("ninja")
        .arg("--version")
        .output()
        .map_err(NinjaWorkspaceError::ProbeSpawn)?;
    if output.status.success() {
        Ok(())
    } else {
        Err(NinjaWorkspaceError::ProbeFailed(output.status))
    }
}

/// Ensure Ninja is on `PATH` and return a fresh temporary directory.
///
/// Callers should skip their scenario when this returns `Err`.
pub fn ninja_integration_workspace() -> Result<TempDir, NinjaWorkspaceError> {
    probe_ninja()?;
    tempdir().map_err(NinjaWorkspaceError::Workspace)
}

/// Create a fake `ninja` executable that exits with `exit_code`.
///
/// Returns the owning temporary directory and the path to the executable.
#[must_use]
pub fn fake_ninja(exit_code: i32) -> (TempDir, PathBuf) {
    let dir = tempdir().expect("temp dir for fake ninja");
    let path = dir.path().join("ninja");
    let mut file = File::create(&path).expect("create fake ninja script");
    writeln!(file, "#!/bin/sh\nexit {exit_code}").expect("write fake ninja script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&path).expect("fake ninja metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("set fake ninja permissions");
    }
    (dir, path)
}
