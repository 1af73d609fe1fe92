// src/filesystem/mod.rs

//! Filesystem port (C2): the abstract contract the rest of the core
//! consumes. `RealFilesystem` backs it with `std::fs`; `MemFilesystem`
//! backs it with an in-memory tree for tests and property checks.

mod memory;
mod real;

pub use memory::MemFilesystem;
pub use real::RealFilesystem;

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation signal threaded through every port call.
///
/// Cloning is cheap (shared `Arc`); all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Return `Err(Error::Cancelled)` if cancellation has been requested.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled(operation.to_string()))
        } else {
            Ok(())
        }
    }
}

/// Basic file metadata as surfaced by `stat`/`lstat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub size: u64,
    pub mode: u32,
    pub is_dir: bool,
    pub is_symlink: bool,
}

/// A single entry returned by `read_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub is_symlink: bool,
}

/// The abstract filesystem contract (C2).
///
/// Every method is cancellation-aware: implementations must check
/// `cancel` before (and, for longer operations, during) their work and
/// return `Error::Cancelled` promptly rather than completing a fresh
/// mutation after cancellation was observed.
pub trait Filesystem: Send + Sync {
    fn stat(&self, path: &Path, cancel: &CancelToken) -> Result<FileInfo>;
    fn lstat(&self, path: &Path, cancel: &CancelToken) -> Result<FileInfo>;
    fn read_dir(&self, path: &Path, cancel: &CancelToken) -> Result<Vec<DirEntry>>;
    fn read_link(&self, path: &Path, cancel: &CancelToken) -> Result<String>;
    fn read_file(&self, path: &Path, cancel: &CancelToken) -> Result<Vec<u8>>;
    fn write_file(&self, path: &Path, bytes: &[u8], mode: u32, cancel: &CancelToken) -> Result<()>;
    fn mkdir(&self, path: &Path, mode: u32, cancel: &CancelToken) -> Result<()>;
    fn mkdir_all(&self, path: &Path, mode: u32, cancel: &CancelToken) -> Result<()>;
    fn remove(&self, path: &Path, cancel: &CancelToken) -> Result<()>;
    fn remove_all(&self, path: &Path, cancel: &CancelToken) -> Result<()>;
    fn symlink(&self, target: &str, link_path: &Path, cancel: &CancelToken) -> Result<()>;
    fn rename(&self, old: &Path, new: &Path, cancel: &CancelToken) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn is_symlink(&self, path: &Path) -> bool;
}

/// True when an io error looks like a cross-device rename failure (EXDEV).
pub fn is_cross_device(err: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc_exdev())
    }
    #[cfg(not(unix))]
    {
        let _ = err;
        false
    }
}

#[cfg(unix)]
fn libc_exdev() -> i32 {
    // EXDEV is 18 on Linux and most other unix-likes; avoid a libc
    // dependency for a single constant.
    18
}

/// Move a path via rename, falling back to copy+remove on EXDEV.
///
/// This is the `FileMove` contract's cross-device fallback (§4.5/§4.8):
/// the reconciler schedules a plain `FileMove`, the executor decides at
/// run time whether a rename suffices or a decomposed copy is needed.
pub fn rename_or_copy(fs: &dyn Filesystem, src: &Path, dst: &Path, cancel: &CancelToken) -> Result<()> {
    match fs.rename(src, dst, cancel) {
        Ok(()) => Ok(()),
        Err(Error::FilesystemOperation { cause, .. }) if cause.contains("cross-device") => {
            copy_then_remove(fs, src, dst, cancel)
        }
        Err(e) => Err(e),
    }
}

fn copy_then_remove(fs: &dyn Filesystem, src: &Path, dst: &Path, cancel: &CancelToken) -> Result<()> {
    let info = fs.lstat(src, cancel)?;
    if info.is_symlink {
        let target = fs.read_link(src, cancel)?;
        fs.symlink(&target, dst, cancel)?;
    } else {
        let bytes = fs.read_file(src, cancel)?;
        fs.write_file(dst, &bytes, info.mode, cancel)?;
    }
    fs.remove(src, cancel)
}

pub(crate) fn not_found(path: &Path, operation: &str) -> Error {
    Error::FilesystemOperation {
        operation: operation.to_string(),
        path: path.to_path_buf(),
        cause: "not found".to_string(),
    }
}

pub(crate) fn io_err(path: &Path, operation: &str, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        Error::PermissionDenied {
            path: path.to_path_buf(),
            operation: operation.to_string(),
        }
    } else if e.kind() == std::io::ErrorKind::NotFound {
        not_found(path, operation)
    } else if is_cross_device(&e) {
        Error::FilesystemOperation {
            operation: operation.to_string(),
            path: path.to_path_buf(),
            cause: format!("cross-device: {e}"),
        }
    } else {
        Error::FilesystemOperation {
            operation: operation.to_string(),
            path: path.to_path_buf(),
            cause: e.to_string(),
        }
    }
}

pub(crate) fn parent_of(path: &Path) -> Option<PathBuf> {
    path.parent().map(|p| p.to_path_buf())
}
