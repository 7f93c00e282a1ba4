// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! A path under the OS temp directory that removes itself (file or directory,
//! recursively) on drop. Used by tests that stand up a node's `raft/` and
//! `cache/` directory layout (§6) without leaking fixtures between test runs.

use rand::RngCore;
use std::path::{Path, PathBuf};

pub struct TempPath {
    path: PathBuf,
    persist: bool,
}

impl TempPath {
    pub fn new() -> Self {
        let mut suffix = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut suffix);
        let path = std::env::temp_dir().join(format!("sequencer-{}", hex::encode(suffix)));
        Self {
            path,
            persist: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn create_as_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.path)
    }

    /// Prevents cleanup on drop. Useful when debugging a failed test run.
    pub fn persist(mut self) -> Self {
        self.persist = true;
        self
    }
}

impl Default for TempPath {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TempPath {
    fn drop(&mut self) {
        if self.persist {
            return;
        }
        if self.path.is_dir() {
            let _ = std::fs::remove_dir_all(&self.path);
        } else {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_up_directory_on_drop() {
        let path;
        {
            let temp = TempPath::new();
            temp.create_as_dir().unwrap();
            path = temp.path().to_path_buf();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
