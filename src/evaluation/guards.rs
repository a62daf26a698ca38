use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info};

/// Moves a file out of the way and moves it back when dropped
#[derive(Debug)]
pub struct RenameGuard {
    original: PathBuf,
    backup: PathBuf,
    armed: bool,
}

impl RenameGuard {
    pub fn hide(original: &Path, backup: &Path) -> io::Result<Self> {
        fs::rename(original, backup)?;
        info!(path = %original.display(), backup = %backup.display(), "Dataset hidden");
        Ok(Self {
            original: original.to_path_buf(),
            backup: backup.to_path_buf(),
            armed: true,
        })
    }

    /// Restore now and report the outcome instead of only logging it
    pub fn restore(mut self) -> io::Result<()> {
        self.armed = false;
        fs::rename(&self.backup, &self.original)?;
        info!(path = %self.original.display(), "Dataset restored");
        Ok(())
    }
}

impl Drop for RenameGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = fs::rename(&self.backup, &self.original) {
            error!(
                path = %self.original.display(),
                backup = %self.backup.display(),
                error = %e,
                "Failed to restore hidden dataset"
            );
        }
    }
}

/// Deletes temporary files when dropped. Files that never got created are ignored.
#[derive(Debug, Default)]
pub struct TempFileGuard {
    paths: Vec<PathBuf>,
}

impl TempFileGuard {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    pub fn remove(mut self) -> io::Result<()> {
        let paths = std::mem::take(&mut self.paths);
        for path in &paths {
            remove_if_present(path)?;
        }
        Ok(())
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = remove_if_present(path) {
                error!(path = %path.display(), error = %e, "Failed to remove temporary file");
            }
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rename_guard_restores_on_drop() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("data.csv");
        let backup = dir.path().join("data.bak");
        fs::write(&original, "a,b\n1,2\n").unwrap();

        {
            let _guard = RenameGuard::hide(&original, &backup).unwrap();
            assert!(!original.exists());
            assert!(backup.exists());
        }
        assert_eq!(fs::read_to_string(&original).unwrap(), "a,b\n1,2\n");
        assert!(!backup.exists());
    }

    #[test]
    fn test_rename_guard_restores_during_unwind() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("data.csv");
        let backup = dir.path().join("data.bak");
        fs::write(&original, "x").unwrap();

        let result = std::panic::catch_unwind(|| {
            let _guard = RenameGuard::hide(&original, &backup).unwrap();
            panic!("run blew up");
        });
        assert!(result.is_err());
        assert!(original.exists());
    }

    #[test]
    fn test_explicit_restore() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("data.csv");
        let backup = dir.path().join("data.bak");
        fs::write(&original, "x").unwrap();

        let guard = RenameGuard::hide(&original, &backup).unwrap();
        guard.restore().unwrap();
        assert!(original.exists());
    }

    #[test]
    fn test_temp_file_guard_removes_files() {
        let dir = TempDir::new().unwrap();
        let variant = dir.path().join("variant.csv");
        let never_written = dir.path().join("variant_cleaned.csv");
        fs::write(&variant, "x").unwrap();

        drop(TempFileGuard::new([variant.clone(), never_written]));
        assert!(!variant.exists());
    }
}
