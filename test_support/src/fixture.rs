//! Write minimal `.crunit` unit scripts into a temporary workspace.

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A temporary unit search directory containing generated `.crunit` files.
pub struct UnitFixture {
    dir: TempDir,
}

impl UnitFixture {
    /// Create an empty fixture directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir for unit fixture"),
        }
    }

    /// Write `source` as `<id>.crunit` in the fixture directory.
    pub fn write(&self, id: &str, source: &str) -> PathBuf {
        let path = self.dir.path().join(format!("{id}.crunit"));
        fs::write(&path, source).expect("write crunit fixture");
        path
    }

    /// Path to the fixture directory, usable as a unit search path entry.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }
}

impl Default for UnitFixture {
    fn default() -> Self {
        Self::new()
    }
}
