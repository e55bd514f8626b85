//! Host-scoped merge lock.
//!
//! A lock file, `<dir>/<name>.lock`, held with an exclusive advisory lock.
//! The OS drops the lock when the holding process dies, so acquisition
//! never deadlocks on a crashed holder. To tell a crash apart from a clean
//! release, the holder writes its pid into the file and truncates it on
//! release: an acquirer that finds a pid left behind gets
//! [`LockState::Recovered`] and must call [`HostLockGuard::mark_consistent`].

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use cstruct_core::config::StorageConfig;
use cstruct_core::errors::LockError;
use fd_lock::{RwLock, RwLockWriteGuard};

/// State of the lock when it was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Consistent,
    /// The previous holder died while holding the lock.
    Recovered { previous_holder: Option<u32> },
}

impl LockState {
    pub fn is_recovered(&self) -> bool {
        matches!(self, Self::Recovered { .. })
    }
}

pub struct HostLock {
    path: PathBuf,
    file: RwLock<File>,
}

impl HostLock {
    /// Create the lock file, or attach to the one another process created.
    pub fn open(dir: &Path, name: &str) -> Result<Self, LockError> {
        let path = dir.join(format!("{name}.lock"));
        let open_err = |e: std::io::Error| LockError::OpenFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => {
                tracing::debug!(path = %path.display(), "created host lock");
                file
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(open_err)?,
            Err(e) => return Err(open_err(e)),
        };

        Ok(Self {
            path,
            file: RwLock::new(file),
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, LockError> {
        Self::open(&config.effective_lock_dir(), config.effective_lock_name())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the lock is held. There is no timeout: the critical
    /// section is one merge transaction.
    pub fn acquire(&mut self) -> Result<HostLockGuard<'_>, LockError> {
        let path = &self.path;
        let mut guard = self.file.write().map_err(|e| LockError::AcquireFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let marker = read_marker(&mut guard).map_err(|e| marker_err(path, e))?;
        let state = match marker {
            None => {
                write_marker(&mut guard).map_err(|e| marker_err(path, e))?;
                LockState::Consistent
            }
            Some(text) => LockState::Recovered {
                previous_holder: text.trim().parse().ok(),
            },
        };

        Ok(HostLockGuard { guard, path, state })
    }
}

/// Held lock. Dropping it clears the holder marker and releases the lock.
pub struct HostLockGuard<'a> {
    guard: RwLockWriteGuard<'a, File>,
    path: &'a Path,
    state: LockState,
}

impl HostLockGuard<'_> {
    pub fn state(&self) -> LockState {
        self.state
    }

    /// Take over a lock recovered from a dead holder.
    pub fn mark_consistent(&mut self) -> Result<(), LockError> {
        write_marker(&mut self.guard).map_err(|e| marker_err(self.path, e))?;
        self.state = LockState::Consistent;
        Ok(())
    }
}

impl Drop for HostLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = clear_marker(&mut self.guard) {
            tracing::warn!(path = %self.path.display(), error = %e, "could not clear lock holder marker");
        }
    }
}

fn read_marker(file: &mut File) -> std::io::Result<Option<String>> {
    let mut text = String::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_string(&mut text)?;
    Ok(if text.trim().is_empty() { None } else { Some(text) })
}

fn write_marker(file: &mut File) -> std::io::Result<()> {
    clear_marker(file)?;
    write!(file, "{}", std::process::id())?;
    file.flush()
}

fn clear_marker(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(())
}

fn marker_err(path: &Path, e: std::io::Error) -> LockError {
    LockError::MarkerFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
