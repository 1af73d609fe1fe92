// src/filesystem/memory.rs

//! In-memory filesystem port, used by unit and property tests so the
//! reconciler/executor test suite never touches real disk state.

use super::{not_found, CancelToken, DirEntry, FileInfo, Filesystem};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Node {
    File { bytes: Vec<u8>, mode: u32 },
    Dir,
    Symlink { target: String },
}

/// An in-memory tree keyed by absolute path, good enough to exercise
/// every `Filesystem` method without a real disk.
pub struct MemFilesystem {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
}

impl Default for MemFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFilesystem {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), Node::Dir);
        Self {
            nodes: Mutex::new(nodes),
        }
    }

    /// Seed a regular file directly, for test fixture setup.
    pub fn seed_file(&self, path: impl AsRef<Path>, bytes: impl Into<Vec<u8>>, mode: u32) {
        let path = path.as_ref().to_path_buf();
        self.ensure_parents(&path);
        self.nodes.lock().unwrap().insert(
            path,
            Node::File {
                bytes: bytes.into(),
                mode,
            },
        );
    }

    /// Seed a directory directly, for test fixture setup.
    pub fn seed_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.ensure_parents(&path);
        self.nodes.lock().unwrap().insert(path, Node::Dir);
    }

    /// Seed a symlink directly, for test fixture setup.
    pub fn seed_symlink(&self, path: impl AsRef<Path>, target: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        self.ensure_parents(&path);
        self.nodes.lock().unwrap().insert(
            path,
            Node::Symlink {
                target: target.into(),
            },
        );
    }

    fn ensure_parents(&self, path: &Path) {
        let mut nodes = self.nodes.lock().unwrap();
        let mut ancestors: Vec<PathBuf> = path.ancestors().skip(1).map(|p| p.to_path_buf()).collect();
        ancestors.reverse();
        for ancestor in ancestors {
            nodes.entry(ancestor).or_insert(Node::Dir);
        }
    }
}

impl Filesystem for MemFilesystem {
    fn stat(&self, path: &Path, cancel: &CancelToken) -> Result<FileInfo> {
        cancel.check("stat")?;
        let mut current = path.to_path_buf();
        // Follow symlinks (bounded, to avoid infinite loops on cycles).
        for _ in 0..32 {
            let nodes = self.nodes.lock().unwrap();
            match nodes.get(&current) {
                Some(Node::Symlink { target }) => {
                    let target = PathBuf::from(target);
                    current = if target.is_absolute() {
                        target
                    } else {
                        current.parent().unwrap_or(Path::new("/")).join(target)
                    };
                    continue;
                }
                Some(Node::Dir) => {
                    return Ok(FileInfo {
                        size: 0,
                        mode: 0o755,
                        is_dir: true,
                        is_symlink: false,
                    })
                }
                Some(Node::File { bytes, mode }) => {
                    return Ok(FileInfo {
                        size: bytes.len() as u64,
                        mode: *mode,
                        is_dir: false,
                        is_symlink: false,
                    })
                }
                None => return Err(not_found(path, "stat")),
            }
        }
        Err(Error::FilesystemOperation {
            operation: "stat".to_string(),
            path: path.to_path_buf(),
            cause: "symlink cycle".to_string(),
        })
    }

    fn lstat(&self, path: &Path, cancel: &CancelToken) -> Result<FileInfo> {
        cancel.check("lstat")?;
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(path) {
            Some(Node::Dir) => Ok(FileInfo {
                size: 0,
                mode: 0o755,
                is_dir: true,
                is_symlink: false,
            }),
            Some(Node::File { bytes, mode }) => Ok(FileInfo {
                size: bytes.len() as u64,
                mode: *mode,
                is_dir: false,
                is_symlink: false,
            }),
            Some(Node::Symlink { .. }) => Ok(FileInfo {
                size: 0,
                mode: 0o777,
                is_dir: false,
                is_symlink: true,
            }),
            None => Err(not_found(path, "lstat")),
        }
    }

    fn read_dir(&self, path: &Path, cancel: &CancelToken) -> Result<Vec<DirEntry>> {
        cancel.check("read_dir")?;
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(path) {
            Some(Node::Dir) => {}
            Some(_) => {
                return Err(Error::FilesystemOperation {
                    operation: "read_dir".to_string(),
                    path: path.to_path_buf(),
                    cause: "not a directory".to_string(),
                })
            }
            None => return Err(not_found(path, "read_dir")),
        }
        let mut entries = Vec::new();
        for (candidate, node) in nodes.iter() {
            if candidate.parent() == Some(path) {
                entries.push(DirEntry {
                    name: candidate.file_name().unwrap().to_string_lossy().into_owned(),
                    is_dir: matches!(node, Node::Dir),
                    is_symlink: matches!(node, Node::Symlink { .. }),
                });
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_link(&self, path: &Path, cancel: &CancelToken) -> Result<String> {
        cancel.check("read_link")?;
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(path) {
            Some(Node::Symlink { target }) => Ok(target.clone()),
            Some(_) => Err(Error::FilesystemOperation {
                operation: "read_link".to_string(),
                path: path.to_path_buf(),
                cause: "not a symlink".to_string(),
            }),
            None => Err(not_found(path, "read_link")),
        }
    }

    fn read_file(&self, path: &Path, cancel: &CancelToken) -> Result<Vec<u8>> {
        cancel.check("read_file")?;
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(path) {
            Some(Node::File { bytes, .. }) => Ok(bytes.clone()),
            Some(_) => Err(Error::FilesystemOperation {
                operation: "read_file".to_string(),
                path: path.to_path_buf(),
                cause: "not a regular file".to_string(),
            }),
            None => Err(not_found(path, "read_file")),
        }
    }

    fn write_file(&self, path: &Path, bytes: &[u8], mode: u32, cancel: &CancelToken) -> Result<()> {
        cancel.check("write_file")?;
        {
            let nodes = self.nodes.lock().unwrap();
            let parent = path.parent().unwrap_or(Path::new("/"));
            match nodes.get(parent) {
                Some(Node::Dir) => {}
                _ => return Err(Error::ParentNotFound(parent.to_path_buf())),
            }
        }
        self.nodes.lock().unwrap().insert(
            path.to_path_buf(),
            Node::File {
                bytes: bytes.to_vec(),
                mode,
            },
        );
        Ok(())
    }

    fn mkdir(&self, path: &Path, _mode: u32, cancel: &CancelToken) -> Result<()> {
        cancel.check("mkdir")?;
        let parent = path.parent().unwrap_or(Path::new("/"));
        {
            let nodes = self.nodes.lock().unwrap();
            match nodes.get(parent) {
                Some(Node::Dir) => {}
                _ => return Err(Error::ParentNotFound(parent.to_path_buf())),
            }
            if nodes.contains_key(path) {
                return Err(Error::FilesystemOperation {
                    operation: "mkdir".to_string(),
                    path: path.to_path_buf(),
                    cause: "already exists".to_string(),
                });
            }
        }
        self.nodes.lock().unwrap().insert(path.to_path_buf(), Node::Dir);
        Ok(())
    }

    fn mkdir_all(&self, path: &Path, _mode: u32, cancel: &CancelToken) -> Result<()> {
        cancel.check("mkdir_all")?;
        let mut ancestors: Vec<PathBuf> = path.ancestors().map(|p| p.to_path_buf()).collect();
        ancestors.reverse();
        let mut nodes = self.nodes.lock().unwrap();
        for ancestor in ancestors {
            nodes.entry(ancestor).or_insert(Node::Dir);
        }
        Ok(())
    }

    fn remove(&self, path: &Path, cancel: &CancelToken) -> Result<()> {
        cancel.check("remove")?;
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.get(path) {
            Some(Node::Dir) => {
                let has_children = nodes.keys().any(|p| p.parent() == Some(path));
                if has_children {
                    return Err(Error::FilesystemOperation {
                        operation: "remove".to_string(),
                        path: path.to_path_buf(),
                        cause: "directory not empty".to_string(),
                    });
                }
            }
            Some(_) => {}
            None => return Err(not_found(path, "remove")),
        }
        nodes.remove(path);
        Ok(())
    }

    fn remove_all(&self, path: &Path, cancel: &CancelToken) -> Result<()> {
        cancel.check("remove_all")?;
        let mut nodes = self.nodes.lock().unwrap();
        let to_remove: Vec<PathBuf> = nodes
            .keys()
            .filter(|p| *p == path || p.starts_with(path))
            .cloned()
            .collect();
        if to_remove.is_empty() {
            return Err(not_found(path, "remove_all"));
        }
        for p in to_remove {
            nodes.remove(&p);
        }
        Ok(())
    }

    fn symlink(&self, target: &str, link_path: &Path, cancel: &CancelToken) -> Result<()> {
        cancel.check("symlink")?;
        let parent = link_path.parent().unwrap_or(Path::new("/"));
        {
            let nodes = self.nodes.lock().unwrap();
            match nodes.get(parent) {
                Some(Node::Dir) => {}
                _ => return Err(Error::ParentNotFound(parent.to_path_buf())),
            }
        }
        self.nodes.lock().unwrap().insert(
            link_path.to_path_buf(),
            Node::Symlink {
                target: target.to_string(),
            },
        );
        Ok(())
    }

    fn rename(&self, old: &Path, new: &Path, cancel: &CancelToken) -> Result<()> {
        cancel.check("rename")?;
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes.remove(old).ok_or_else(|| not_found(old, "rename"))?;
        nodes.insert(new.to_path_buf(), node);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.nodes.lock().unwrap().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.nodes.lock().unwrap().get(path), Some(Node::Dir))
    }

    fn is_symlink(&self, path: &Path) -> bool {
        matches!(self.nodes.lock().unwrap().get(path), Some(Node::Symlink { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_file_reads_back() {
        let fs = MemFilesystem::new();
        fs.seed_file("/home/user/.vimrc", b"set nocompatible\n".to_vec(), 0o644);
        let cancel = CancelToken::new();
        assert_eq!(
            fs.read_file(Path::new("/home/user/.vimrc"), &cancel).unwrap(),
            b"set nocompatible\n"
        );
    }

    #[test]
    fn mkdir_all_creates_ancestors() {
        let fs = MemFilesystem::new();
        let cancel = CancelToken::new();
        fs.mkdir_all(Path::new("/a/b/c"), 0o755, &cancel).unwrap();
        assert!(fs.is_dir(Path::new("/a")));
        assert!(fs.is_dir(Path::new("/a/b")));
        assert!(fs.is_dir(Path::new("/a/b/c")));
    }

    #[test]
    fn remove_requires_empty_dir() {
        let fs = MemFilesystem::new();
        let cancel = CancelToken::new();
        fs.mkdir_all(Path::new("/a/b"), 0o755, &cancel).unwrap();
        assert!(fs.remove(Path::new("/a"), &cancel).is_err());
        fs.remove(Path::new("/a/b"), &cancel).unwrap();
        fs.remove(Path::new("/a"), &cancel).unwrap();
    }

    #[test]
    fn symlink_create_and_read() {
        let fs = MemFilesystem::new();
        let cancel = CancelToken::new();
        fs.mkdir_all(Path::new("/home/user"), 0o755, &cancel).unwrap();
        fs.symlink("/repo/vim/dot-vimrc", Path::new("/home/user/.vimrc"), &cancel)
            .unwrap();
        assert!(fs.is_symlink(Path::new("/home/user/.vimrc")));
        assert_eq!(
            fs.read_link(Path::new("/home/user/.vimrc"), &cancel).unwrap(),
            "/repo/vim/dot-vimrc"
        );
    }
}
