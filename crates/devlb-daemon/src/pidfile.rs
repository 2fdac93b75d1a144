//! PID-file bookkeeping
//!
//! Guards against a second daemon instance racing the first for the
//! socket. The file is created at startup and removed when the guard
//! drops; a pre-existing file aborts startup with the recorded PID so the
//! operator can decide whether it is stale.

use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Guard that owns the daemon's PID file for its lifetime
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write this process's PID, refusing if a file already exists
    pub fn acquire(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let recorded = std::fs::read_to_string(path)
                .ok()
                .and_then(|raw| raw.trim().parse::<u32>().ok());
            match recorded {
                Some(pid) => bail!(
                    "existing server running (pid {pid}); remove {} if it is stale",
                    path.display()
                ),
                None => bail!(
                    "found existing PID file {} (could not read PID)",
                    path.display()
                ),
            }
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(path, format!("{}\n", std::process::id()))
            .with_context(|| format!("writing PID file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// The path being guarded
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove PID file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_writes_and_drop_removes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devlb.pid");

        let guard = PidFile::acquire(&path).unwrap();
        let recorded: u32 = std::fs::read_to_string(&path)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert_eq!(recorded, std::process::id());

        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devlb.pid");
        std::fs::write(&path, "12345\n").unwrap();

        let err = PidFile::acquire(&path).unwrap_err();
        assert!(err.to_string().contains("12345"));
        assert!(path.exists());
    }

    #[test]
    fn refuses_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devlb.pid");
        std::fs::write(&path, "not a pid\n").unwrap();

        let err = PidFile::acquire(&path).unwrap_err();
        assert!(err.to_string().contains("could not read"));
    }
}
