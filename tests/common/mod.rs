//! Fixtures shared by the integration tests.

use std::path::{Path, PathBuf};

/// SQLite file under the temp directory, removed together with its
/// journal files when dropped.
pub struct TempDatabase {
    path: PathBuf,
}

impl TempDatabase {
    pub fn new(label: &str) -> Self {
        Self {
            path: std::env::temp_dir().join(format!(
                "degrow-{label}-test-{}.db",
                uuid::Uuid::new_v4()
            )),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDatabase {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}
