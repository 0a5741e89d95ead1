//! Helpers for environment manipulation in integration tests.
//!
//! Every mutation takes the process-wide [`EnvLock`] and returns a guard that
//! restores the previous value on drop, so tests that set `PATH` or
//! `CREATORPATH` never leak state into their neighbours.

use std::ffi::{OsStr, OsString};
use std::path::Path;

use creator_ninja_env::NINJA_ENV;

use crate::env_lock::EnvLock;

/// Set an environment variable, returning its previous value.
///
/// # Safety
///
/// Mutating process-wide environment state is `unsafe` in Rust 2024; the
/// caller must hold the crate-wide [`EnvLock`] for the duration, which every
/// public helper here already does.
fn set_var(key: &str, value: &OsStr) -> Option<OsString> {
    let previous = std::env::var_os(key);
    // SAFETY: caller holds `EnvLock`, serialising mutations.
    unsafe { std::env::set_var(key, value) };
    previous
}

fn remove_var(key: &str) -> Option<OsString> {
    let previous = std::env::var_os(key);
    // SAFETY: caller holds `EnvLock`, serialising mutations.
    unsafe { std::env::remove_var(key) };
    previous
}

/// Guard that restores a single environment variable on drop.
#[derive(Debug)]
pub struct VarGuard {
    key: String,
    original: Option<OsString>,
}

impl VarGuard {
    /// Set `key` to `value`, returning a guard that restores it on drop.
    #[must_use]
    pub fn set(key: &str, value: &OsStr) -> Self {
        let _lock = EnvLock::acquire();
        Self {
            key: key.to_owned(),
            original: set_var(key, value),
        }
    }

    /// Remove `key`, returning a guard that restores the prior value.
    #[must_use]
    pub fn unset(key: &str) -> Self {
        let _lock = EnvLock::acquire();
        Self {
            key: key.to_owned(),
            original: remove_var(key),
        }
    }
}

impl Drop for VarGuard {
    fn drop(&mut self) {
        let _lock = EnvLock::acquire();
        match self.original.take() {
            Some(value) => {
                // SAFETY: `EnvLock` is held for the duration of the restore.
                unsafe { std::env::set_var(&self.key, value) };
            }
            None => {
                // SAFETY: `EnvLock` is held for the duration of the restore.
                unsafe { std::env::remove_var(&self.key) };
            }
        }
    }
}

/// Prepend `dir` to the real `PATH`, returning a guard that restores it.
#[must_use]
pub fn prepend_dir_to_path(dir: &Path) -> VarGuard {
    let _lock = EnvLock::acquire();
    let original = std::env::var_os("PATH");
    let mut paths: Vec<_> = original
        .as_ref()
        .map(|os| std::env::split_paths(os).collect())
        .unwrap_or_default();
    paths.insert(0, dir.to_path_buf());
    let joined = std::env::join_paths(&paths).unwrap_or_else(|_| OsString::from(dir));
    // SAFETY: `EnvLock` is held for the duration of the set.
    unsafe { std::env::set_var("PATH", &joined) };
    VarGuard {
        key: "PATH".to_owned(),
        original,
    }
}

/// Override the Ninja executable override variable, restoring it on drop.
#[must_use]
pub fn override_ninja_env(path: &Path) -> VarGuard {
    VarGuard::set(NINJA_ENV, path.as_os_str())
}
