//! Advisory config-file locking using the `flock(2)` syscall directly.
//! Independent crate with no internal optkit dependencies.
//!
//! Readers take a non-blocking shared lock and give up if a writer holds the
//! file; writers wait for an exclusive lock. The guard owns the `File` whose
//! fd carries the lock, and `Drop` calls `flock(fd, LOCK_UN)` so the lock is
//! released on every exit path.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Which kind of `flock` a guard holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Config file lock guard backed by `flock(2)`.
pub struct FileLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
    released: bool,
}

impl std::fmt::Debug for FileLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLock")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let fd = self.file.as_raw_fd();
        // SAFETY: `fd` is a valid file descriptor owned by `self.file`.
        // If this fails the lock is released when the fd is closed moments later.
        unsafe {
            libc::flock(fd, libc::LOCK_UN);
        }
        self.released = true;
    }
}

impl FileLock {
    /// Path of the locked file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mode the lock was acquired in.
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// The open file carrying the lock.
    pub fn file(&mut self) -> &mut File {
        &mut self.file
    }

    /// Explicitly release the lock before drop. The file stays open.
    pub fn unlock(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        let fd = self.file.as_raw_fd();
        // SAFETY: `fd` is a valid file descriptor owned by `self.file`.
        let ret = unsafe { libc::flock(fd, libc::LOCK_UN) };
        if ret != 0 {
            return Err(io::Error::last_os_error())
                .with_context(|| format!("Failed to unlock {}", self.path.display()));
        }
        self.released = true;
        Ok(())
    }

    /// Consume the guard, releasing the lock and handing back the open file.
    pub fn into_file(mut self) -> Result<File> {
        self.unlock()?;
        let file = self.file.try_clone().context("Failed to duplicate file handle")?;
        Ok(file)
    }
}

/// Call `flock` with `operation`, retrying on `EINTR`.
///
/// Returns `Ok(false)` when a non-blocking request would block.
fn flock_retrying(file: &File, operation: libc::c_int) -> io::Result<bool> {
    let fd = file.as_raw_fd();
    loop {
        // SAFETY: `fd` is a valid file descriptor owned by `file`, which
        // outlives this call. The return value is checked below.
        let ret = unsafe { libc::flock(fd, operation) };
        if ret == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::Interrupted => continue,
            io::ErrorKind::WouldBlock => return Ok(false),
            _ => return Err(err),
        }
    }
}

/// Open `path` read-only and try a non-blocking shared lock.
///
/// Returns `Ok(None)` if another descriptor holds an exclusive lock.
/// Fails if the file cannot be opened.
pub fn try_shared_lock(path: &Path) -> Result<Option<FileLock>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open config file: {}", path.display()))?;

    let acquired = flock_retrying(&file, libc::LOCK_SH | libc::LOCK_NB)
        .with_context(|| format!("Failed to lock config file: {}", path.display()))?;
    if !acquired {
        return Ok(None);
    }

    Ok(Some(FileLock {
        file,
        path: path.to_path_buf(),
        mode: LockMode::Shared,
        released: false,
    }))
}

fn open_for_write(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open config file: {}", path.display()))
}

/// Open (creating if absent) and acquire a blocking exclusive lock.
///
/// Waits as long as necessary. The file is not truncated; callers do that
/// once the lock is held.
pub fn exclusive_lock(path: &Path) -> Result<FileLock> {
    let file = open_for_write(path)?;
    flock_retrying(&file, libc::LOCK_EX)
        .with_context(|| format!("Failed to lock config file: {}", path.display()))?;

    Ok(FileLock {
        file,
        path: path.to_path_buf(),
        mode: LockMode::Exclusive,
        released: false,
    })
}
