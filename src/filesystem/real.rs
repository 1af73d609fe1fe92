// src/filesystem/real.rs

//! `std::fs`-backed implementation of the filesystem port.

use super::{io_err, CancelToken, DirEntry, FileInfo, Filesystem};
use crate::error::Result;
use std::fs;
use std::path::Path;

/// Filesystem port backed by the host OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFilesystem;

impl RealFilesystem {
    pub fn new() -> Self {
        Self
    }
}

fn to_info(meta: fs::Metadata) -> FileInfo {
    use std::os::unix::fs::MetadataExt;
    FileInfo {
        size: meta.size(),
        mode: meta.mode() & 0o7777,
        is_dir: meta.is_dir(),
        is_symlink: meta.file_type().is_symlink(),
    }
}

impl Filesystem for RealFilesystem {
    fn stat(&self, path: &Path, cancel: &CancelToken) -> Result<FileInfo> {
        cancel.check("stat")?;
        let meta = fs::metadata(path).map_err(|e| io_err(path, "stat", e))?;
        Ok(to_info(meta))
    }

    fn lstat(&self, path: &Path, cancel: &CancelToken) -> Result<FileInfo> {
        cancel.check("lstat")?;
        let meta = fs::symlink_metadata(path).map_err(|e| io_err(path, "lstat", e))?;
        Ok(to_info(meta))
    }

    fn read_dir(&self, path: &Path, cancel: &CancelToken) -> Result<Vec<DirEntry>> {
        cancel.check("read_dir")?;
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| io_err(path, "read_dir", e))? {
            cancel.check("read_dir")?;
            let entry = entry.map_err(|e| io_err(path, "read_dir", e))?;
            let file_type = entry.file_type().map_err(|e| io_err(path, "read_dir", e))?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: file_type.is_dir(),
                is_symlink: file_type.is_symlink(),
            });
        }
        Ok(entries)
    }

    fn read_link(&self, path: &Path, cancel: &CancelToken) -> Result<String> {
        cancel.check("read_link")?;
        let target = fs::read_link(path).map_err(|e| io_err(path, "read_link", e))?;
        Ok(target.to_string_lossy().into_owned())
    }

    fn read_file(&self, path: &Path, cancel: &CancelToken) -> Result<Vec<u8>> {
        cancel.check("read_file")?;
        fs::read(path).map_err(|e| io_err(path, "read_file", e))
    }

    fn write_file(&self, path: &Path, bytes: &[u8], mode: u32, cancel: &CancelToken) -> Result<()> {
        cancel.check("write_file")?;
        fs::write(path, bytes).map_err(|e| io_err(path, "write_file", e))?;
        set_mode(path, mode)?;
        Ok(())
    }

    fn mkdir(&self, path: &Path, mode: u32, cancel: &CancelToken) -> Result<()> {
        cancel.check("mkdir")?;
        fs::create_dir(path).map_err(|e| io_err(path, "mkdir", e))?;
        set_mode(path, mode)?;
        Ok(())
    }

    fn mkdir_all(&self, path: &Path, mode: u32, cancel: &CancelToken) -> Result<()> {
        cancel.check("mkdir_all")?;
        fs::create_dir_all(path).map_err(|e| io_err(path, "mkdir_all", e))?;
        set_mode(path, mode)?;
        Ok(())
    }

    fn remove(&self, path: &Path, cancel: &CancelToken) -> Result<()> {
        cancel.check("remove")?;
        let meta = fs::symlink_metadata(path).map_err(|e| io_err(path, "remove", e))?;
        if meta.is_dir() {
            fs::remove_dir(path).map_err(|e| io_err(path, "remove", e))
        } else {
            fs::remove_file(path).map_err(|e| io_err(path, "remove", e))
        }
    }

    fn remove_all(&self, path: &Path, cancel: &CancelToken) -> Result<()> {
        cancel.check("remove_all")?;
        fs::remove_dir_all(path).map_err(|e| io_err(path, "remove_all", e))
    }

    fn symlink(&self, target: &str, link_path: &Path, cancel: &CancelToken) -> Result<()> {
        cancel.check("symlink")?;
        std::os::unix::fs::symlink(target, link_path).map_err(|e| io_err(link_path, "symlink", e))
    }

    fn rename(&self, old: &Path, new: &Path, cancel: &CancelToken) -> Result<()> {
        cancel.check("rename")?;
        fs::rename(old, new).map_err(|e| io_err(old, "rename", e))
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }
}

fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if mode == 0 {
        return Ok(());
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| io_err(path, "set_mode", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read_roundtrips() {
        let dir = TempDir::new().unwrap();
        let fs_port = RealFilesystem::new();
        let cancel = CancelToken::new();
        let file = dir.path().join("a.txt");

        fs_port.write_file(&file, b"hello", 0o644, &cancel).unwrap();
        assert_eq!(fs_port.read_file(&file, &cancel).unwrap(), b"hello");
        assert!(fs_port.exists(&file));
        assert!(!fs_port.is_dir(&file));
    }

    #[test]
    fn symlink_roundtrips() {
        let dir = TempDir::new().unwrap();
        let fs_port = RealFilesystem::new();
        let cancel = CancelToken::new();
        let link = dir.path().join("link");

        fs_port.symlink("/tmp/target", &link, &cancel).unwrap();
        assert!(fs_port.is_symlink(&link));
        assert_eq!(fs_port.read_link(&link, &cancel).unwrap(), "/tmp/target");
    }

    #[test]
    fn mkdir_all_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let fs_port = RealFilesystem::new();
        let cancel = CancelToken::new();
        let nested = dir.path().join("a/b/c");

        fs_port.mkdir_all(&nested, 0o755, &cancel).unwrap();
        fs_port.mkdir_all(&nested, 0o755, &cancel).unwrap();
        assert!(fs_port.is_dir(&nested));
    }

    #[test]
    fn cancelled_token_short_circuits() {
        let dir = TempDir::new().unwrap();
        let fs_port = RealFilesystem::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = fs_port.write_file(&dir.path().join("x"), b"y", 0o644, &cancel);
        assert!(matches!(err, Err(crate::error::Error::Cancelled(_))));
    }
}
