use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::utils::errors::ProvisionError;

const LOCK_FILE_NAME: &str = ".provision.lock";

/// Exclusive advisory lock on a models directory, held for the duration of a run.
/// The OS drops the lock if the process dies.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(models_dir: &Path) -> Result<Self, ProvisionError> {
        fs::create_dir_all(models_dir).map_err(|e| {
            ProvisionError::Precondition(format!(
                "cannot create models directory {}: {e}",
                models_dir.display()
            ))
        })?;

        let path = models_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| {
                ProvisionError::Precondition(format!(
                    "cannot open lock file {}: {e}",
                    path.display()
                ))
            })?;

        file.try_lock_exclusive().map_err(|_| {
            ProvisionError::Precondition(format!(
                "another provisioning run is using {} (lock: {})",
                models_dir.display(),
                path.display()
            ))
        })?;

        debug!("Acquired run lock {}", path.display());
        Ok(Self { file, path })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!("Failed to release lock {}: {}", self.path.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_on_same_dir_fails_until_released() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("models");

        let first = RunLock::acquire(&models).unwrap();
        let err = RunLock::acquire(&models).unwrap_err();
        assert!(matches!(err, ProvisionError::Precondition(_)));

        drop(first);
        assert!(RunLock::acquire(&models).is_ok());
    }
}
