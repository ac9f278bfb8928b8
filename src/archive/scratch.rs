use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Scoped scratch directory for an extraction run.
///
/// The directory and everything extracted into it is removed when the value is
/// dropped, including when a run bails out half way.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a fresh scratch directory under the system temp dir, or under `root`
    /// when given.
    pub fn create(root: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("acsi-unzip-");
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        debug!("Created scratch directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `file` relative to the scratch root, for reporting.
    pub fn relative_name(&self, file: &Path) -> String {
        file.strip_prefix(self.dir.path())
            .unwrap_or(file)
            .to_string_lossy()
            .into_owned()
    }

    /// Remove the directory now and report failures instead of ignoring them.
    pub fn release(self) -> std::io::Result<()> {
        let path: PathBuf = self.dir.path().to_owned();
        match self.dir.close() {
            Ok(()) => {
                debug!("Removed scratch directory {}", path.display());
                Ok(())
            }
            Err(e) => {
                warn!("Failed to remove scratch directory {}: {}", path.display(), e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dir_removed_on_drop() {
        let root = TempDir::new().unwrap();
        let path = {
            let scratch = ScratchDir::create(Some(root.path())).unwrap();
            std::fs::write(scratch.path().join("a.json"), b"{}").unwrap();
            scratch.path().to_owned()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_release_removes_directory() {
        let scratch = ScratchDir::create(None).unwrap();
        let path = scratch.path().to_owned();
        assert!(path.is_dir());
        scratch.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_relative_name() {
        let scratch = ScratchDir::create(None).unwrap();
        let file = scratch.path().join("JSONs").join("A1.json");
        assert_eq!(
            scratch.relative_name(&file),
            Path::new("JSONs").join("A1.json").to_string_lossy()
        );
    }
}
