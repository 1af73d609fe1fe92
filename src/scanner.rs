// src/scanner.rs

//! Scanner (C4): walks a package directory into a `FileNode` tree,
//! honouring the ignore predicate, and the lower-level `scan_tree` walk
//! used by diagnostics. Goes through the filesystem port (C2) like every
//! other core module, so it runs equally well against `MemFilesystem` in
//! tests and `RealFilesystem` in production.

use crate::error::{Error, Result};
use crate::filesystem::{CancelToken, Filesystem};
use crate::ignore::IgnoreSet;
use crate::path::PackagePath;
use std::path::{Path, PathBuf};

/// A node in a scanned file tree (§3).
///
/// Deliberately a plain recursive enum rather than an arena: packages are
/// rescanned from disk on every operation rather than mutated in place, so
/// there is no need for O(1) path lookup or parent back-references — just
/// a value that can be folded into desired state and hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileNode {
    File { name: String, mode: u32 },
    Dir { name: String, entries: Vec<FileNode> },
    Symlink { name: String, link_target: String },
}

impl FileNode {
    pub fn name(&self) -> &str {
        match self {
            FileNode::File { name, .. } => name,
            FileNode::Dir { name, .. } => name,
            FileNode::Symlink { name, .. } => name,
        }
    }
}

/// A package: a named subtree under the package root (§3).
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub root: PackagePath,
    pub tree: FileNode,
}

/// Scan a package directory, pruning entries the ignore predicate
/// excludes. Per-entry read errors are tolerated (the entry is omitted,
/// not surfaced); a missing `pkg_root` is an error.
pub fn scan_package(pkg_root: &PackagePath, pkg_name: &str, ignore: &IgnoreSet, fs: &dyn Filesystem, cancel: &CancelToken) -> Result<Package> {
    if !fs.is_dir(pkg_root.as_path()) {
        return Err(Error::PackageNotFound {
            name: pkg_name.to_string(),
        });
    }

    let root_name = pkg_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| pkg_name.to_string());

    let entries = scan_dir_entries(pkg_root.as_path(), pkg_root.as_path(), ignore, fs, cancel)?;

    Ok(Package {
        name: pkg_name.to_string(),
        root: pkg_root.clone(),
        tree: FileNode::Dir {
            name: root_name,
            entries,
        },
    })
}

fn scan_dir_entries(root: &Path, dir: &Path, ignore: &IgnoreSet, fs: &dyn Filesystem, cancel: &CancelToken) -> Result<Vec<FileNode>> {
    cancel.check("scan")?;

    let mut entries = match fs.read_dir(dir, cancel) {
        Ok(entries) => entries,
        Err(_) => return Ok(Vec::new()),
    };
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let mut out = Vec::new();
    for entry in entries {
        let path = dir.join(&entry.name);
        let relative = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().replace('\\', "/");

        if ignore.is_ignored(&relative, entry.is_dir) {
            continue;
        }

        if entry.is_symlink {
            if let Ok(target) = fs.read_link(&path, cancel) {
                out.push(FileNode::Symlink {
                    name: entry.name,
                    link_target: target,
                });
            }
        } else if entry.is_dir {
            let children = scan_dir_entries(root, &path, ignore, fs, cancel)?;
            out.push(FileNode::Dir {
                name: entry.name,
                entries: children,
            });
        } else {
            let mode = fs.lstat(&path, cancel).map(|info| info.mode).unwrap_or(0o644);
            out.push(FileNode::File { name: entry.name, mode });
        }
    }
    Ok(out)
}

/// Lower-level walk with only the built-in ignore defaults (no
/// package-specific patterns), used by the diagnostic engine's deep mode
/// to discover orphaned symlinks.
pub fn scan_tree(root: &Path, fs: &dyn Filesystem, cancel: &CancelToken) -> Result<FileNode> {
    if !fs.is_dir(root) {
        return Err(Error::SourceNotFound(root.to_path_buf()));
    }
    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(FileNode::Dir {
        name: root_name,
        entries: scan_dir_entries(root, root, &IgnoreSet::with_patterns(&[]), fs, cancel)?,
    })
}

/// Walk a scanned tree and yield `(package_relative_path, node)` pairs
/// for every leaf (file or symlink), sorted by path for determinism.
pub fn walk_leaves(tree: &FileNode) -> Vec<(PathBuf, &FileNode)> {
    fn recurse<'a>(node: &'a FileNode, prefix: &Path, out: &mut Vec<(PathBuf, &'a FileNode)>) {
        match node {
            FileNode::Dir { entries, .. } => {
                for entry in entries {
                    let child_prefix = prefix.join(entry.name());
                    recurse(entry, &child_prefix, out);
                }
            }
            FileNode::File { .. } | FileNode::Symlink { .. } => {
                out.push((prefix.to_path_buf(), node));
            }
        }
    }
    let mut out = Vec::new();
    if let FileNode::Dir { entries, .. } = tree {
        for entry in entries {
            recurse(entry, Path::new(entry.name()), &mut out);
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemFilesystem;

    #[test]
    fn scans_flat_package() {
        let fs = MemFilesystem::new();
        fs.seed_file("/pkg/vim/dot-vimrc", "set nocompatible\n", 0o644);

        let root = PackagePath::new("/pkg/vim").unwrap();
        let ignore = IgnoreSet::default_set();
        let cancel = CancelToken::new();
        let pkg = scan_package(&root, "vim", &ignore, &fs, &cancel).unwrap();

        let leaves = walk_leaves(&pkg.tree);
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].0, PathBuf::from("dot-vimrc"));
    }

    #[test]
    fn prunes_ignored_entries() {
        let fs = MemFilesystem::new();
        fs.seed_file("/pkg/vim/dot-vimrc", "x", 0o644);
        fs.seed_file("/pkg/vim/.git/config", "y", 0o644);

        let root = PackagePath::new("/pkg/vim").unwrap();
        let ignore = IgnoreSet::default_set();
        let cancel = CancelToken::new();
        let pkg = scan_package(&root, "vim", &ignore, &fs, &cancel).unwrap();

        let leaves = walk_leaves(&pkg.tree);
        assert_eq!(leaves.len(), 1);
    }

    #[test]
    fn missing_root_is_error() {
        let fs = MemFilesystem::new();
        let ignore = IgnoreSet::default_set();
        let cancel = CancelToken::new();
        let root = PackagePath::new("/nonexistent/pkg/root").unwrap();
        assert!(scan_package(&root, "vim", &ignore, &fs, &cancel).is_err());
    }

    #[test]
    fn deterministic_sorted_output() {
        let fs = MemFilesystem::new();
        fs.seed_file("/pkg/shell/dot-zshrc", "z", 0o644);
        fs.seed_file("/pkg/shell/dot-bashrc", "b", 0o644);
        fs.seed_file("/pkg/shell/dot-aliases", "a", 0o644);

        let root = PackagePath::new("/pkg/shell").unwrap();
        let ignore = IgnoreSet::default_set();
        let cancel = CancelToken::new();
        let pkg = scan_package(&root, "shell", &ignore, &fs, &cancel).unwrap();
        let leaves = walk_leaves(&pkg.tree);
        let names: Vec<_> = leaves.iter().map(|(p, _)| p.to_string_lossy().into_owned()).collect();
        assert_eq!(names, vec!["dot-aliases", "dot-bashrc", "dot-zshrc"]);
    }

    #[test]
    fn nested_directory_round_trip() {
        let fs = MemFilesystem::new();
        fs.seed_file("/pkg/nvim/dot-config/nvim/init.vim", "x", 0o644);

        let root = PackagePath::new("/pkg/nvim").unwrap();
        let ignore = IgnoreSet::default_set();
        let cancel = CancelToken::new();
        let pkg = scan_package(&root, "nvim", &ignore, &fs, &cancel).unwrap();
        let leaves = walk_leaves(&pkg.tree);
        assert_eq!(leaves[0].0, PathBuf::from("dot-config/nvim/init.vim"));
    }

    #[test]
    fn symlinked_entry_is_recorded_not_followed() {
        let fs = MemFilesystem::new();
        fs.seed_dir("/pkg/vim");
        fs.seed_symlink("/pkg/vim/dot-vimrc", "/etc/vimrc");

        let root = PackagePath::new("/pkg/vim").unwrap();
        let ignore = IgnoreSet::default_set();
        let cancel = CancelToken::new();
        let pkg = scan_package(&root, "vim", &ignore, &fs, &cancel).unwrap();
        let leaves = walk_leaves(&pkg.tree);
        assert_eq!(leaves.len(), 1);
        match leaves[0].1 {
            FileNode::Symlink { link_target, .. } => assert_eq!(link_target, "/etc/vimrc"),
            other => panic!("expected a symlink node, got {other:?}"),
        }
    }
}
