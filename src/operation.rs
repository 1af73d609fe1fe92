// src/operation.rs

//! Operations: the tagged-union of reversible filesystem actions that make
//! up a plan, plus their deterministic identity.
//!
//! Per the design notes, this is "variant operations, not virtual methods":
//! one enum with per-variant `execute`/`rollback`/`describe`, dispatched by
//! a single `match`, rather than a trait object per operation kind. New
//! operation kinds are a new match arm, not a new type.

use crate::filesystem::{rename_or_copy, CancelToken, Filesystem};
use crate::error::Result;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Deterministic identity for an operation within a plan.
///
/// Never derived from time or randomness — two plans built from the same
/// inputs must produce byte-identical `OperationID`s (Testable Property 1).
/// Built from the operation's own discriminant and its primary path, which
/// is already unique per plan (the reconciler never emits two operations
/// against the same target path).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct OperationID(String);

impl OperationID {
    pub fn new(kind: &str, primary_path: &std::path::Path) -> Self {
        Self(format!("{kind}:{}", primary_path.display()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single reversible step in a plan (§4, §6).
#[derive(Debug, Clone, Serialize)]
pub enum Operation {
    LinkCreate { path: PathBuf, target: String, id: OperationID },
    LinkDelete { path: PathBuf, previous_target: String, id: OperationID },
    DirCreate { path: PathBuf, mode: u32, id: OperationID },
    DirDelete { path: PathBuf, id: OperationID },
    DirRemoveAll { path: PathBuf, id: OperationID },
    FileMove { from: PathBuf, to: PathBuf, id: OperationID },
    FileBackup { path: PathBuf, backup_path: PathBuf, id: OperationID },
    FileDelete { path: PathBuf, id: OperationID },
    DirCopy { from: PathBuf, to: PathBuf, id: OperationID },
}

impl Operation {
    pub fn link_create(path: PathBuf, target: String) -> Self {
        let id = OperationID::new("link_create", &path);
        Operation::LinkCreate { path, target, id }
    }

    pub fn link_delete(path: PathBuf, previous_target: String) -> Self {
        let id = OperationID::new("link_delete", &path);
        Operation::LinkDelete { path, previous_target, id }
    }

    pub fn dir_create(path: PathBuf, mode: u32) -> Self {
        let id = OperationID::new("dir_create", &path);
        Operation::DirCreate { path, mode, id }
    }

    pub fn dir_delete(path: PathBuf) -> Self {
        let id = OperationID::new("dir_delete", &path);
        Operation::DirDelete { path, id }
    }

    pub fn dir_remove_all(path: PathBuf) -> Self {
        let id = OperationID::new("dir_remove_all", &path);
        Operation::DirRemoveAll { path, id }
    }

    pub fn file_move(from: PathBuf, to: PathBuf) -> Self {
        let id = OperationID::new("file_move", &to);
        Operation::FileMove { from, to, id }
    }

    pub fn file_backup(path: PathBuf, backup_path: PathBuf) -> Self {
        let id = OperationID::new("file_backup", &path);
        Operation::FileBackup { path, backup_path, id }
    }

    pub fn file_delete(path: PathBuf) -> Self {
        let id = OperationID::new("file_delete", &path);
        Operation::FileDelete { path, id }
    }

    pub fn dir_copy(from: PathBuf, to: PathBuf) -> Self {
        let id = OperationID::new("dir_copy", &to);
        Operation::DirCopy { from, to, id }
    }

    pub fn id(&self) -> &OperationID {
        match self {
            Operation::LinkCreate { id, .. }
            | Operation::LinkDelete { id, .. }
            | Operation::DirCreate { id, .. }
            | Operation::DirDelete { id, .. }
            | Operation::DirRemoveAll { id, .. }
            | Operation::FileMove { id, .. }
            | Operation::FileBackup { id, .. }
            | Operation::FileDelete { id, .. }
            | Operation::DirCopy { id, .. } => id,
        }
    }

    /// The path this operation's dependency edges are computed from: its
    /// own target, and (for operations that touch two paths) both ends.
    pub fn paths(&self) -> Vec<&std::path::Path> {
        match self {
            Operation::LinkCreate { path, .. }
            | Operation::LinkDelete { path, .. }
            | Operation::DirCreate { path, .. }
            | Operation::DirDelete { path, .. }
            | Operation::DirRemoveAll { path, .. }
            | Operation::FileDelete { path, .. } => vec![path],
            Operation::FileMove { from, to, .. }
            | Operation::DirCopy { from, to, .. }
            | Operation::FileBackup { path: from, backup_path: to, .. } => vec![from, to],
        }
    }

    /// True if this operation must run after `other` (`other` creates an
    /// ancestor directory this operation's path needs, or this operation
    /// clears a path `other`'s path depends on) — the dependency-graph
    /// edges of C7.
    pub fn depends_on(&self, other: &Operation) -> bool {
        let my_paths = self.paths();
        match other {
            Operation::DirCreate { path: parent, .. } => {
                my_paths.iter().any(|p| p.starts_with(parent) && *p != parent.as_path())
            }
            Operation::FileDelete { path, .. }
            | Operation::LinkDelete { path, .. }
            | Operation::FileMove { from: path, .. } => {
                matches!(self, Operation::LinkCreate { .. } | Operation::DirCreate { .. })
                    && my_paths.iter().any(|p| *p == path.as_path())
            }
            // A delete or move of `path` must wait for a backup of that
            // same path to finish reading/copying its content first.
            Operation::FileBackup { path, .. } => {
                matches!(self, Operation::FileDelete { .. } | Operation::FileMove { .. })
                    && my_paths.iter().any(|p| *p == path.as_path())
            }
            _ => false,
        }
    }

    pub fn execute(&self, fs: &dyn Filesystem, cancel: &CancelToken) -> Result<()> {
        match self {
            Operation::LinkCreate { path, target, .. } => fs.symlink(target, path, cancel),
            Operation::LinkDelete { path, .. } | Operation::FileDelete { path, .. } => {
                fs.remove(path, cancel)
            }
            Operation::DirCreate { path, mode, .. } => fs.mkdir_all(path, *mode, cancel),
            Operation::DirDelete { path, .. } => fs.remove(path, cancel),
            Operation::DirRemoveAll { path, .. } => fs.remove_all(path, cancel),
            Operation::FileMove { from, to, .. } => rename_or_copy(fs, from, to, cancel),
            Operation::FileBackup { path, backup_path, .. } => copy_file(fs, path, backup_path, cancel),
            Operation::DirCopy { from, to, .. } => copy_dir_recursive(fs, from, to, cancel),
        }
    }

    /// The inverse action, used by the checkpoint ledger to unwind a
    /// partially-executed plan.
    pub fn rollback(&self, fs: &dyn Filesystem, cancel: &CancelToken) -> Result<()> {
        match self {
            Operation::LinkCreate { path, .. } => fs.remove(path, cancel),
            Operation::LinkDelete { path, previous_target, .. } => {
                fs.symlink(previous_target, path, cancel)
            }
            Operation::DirCreate { path, .. } => fs.remove(path, cancel),
            Operation::DirDelete { path, .. } => fs.mkdir(path, 0o755, cancel),
            Operation::DirRemoveAll { .. } => {
                // an unqualified remove_all has no cheap inverse; callers
                // relying on rollback for this variant must have taken a
                // backup operation beforehand (the reconciler always pairs
                // DirRemoveAll with a prior FileBackup/DirCopy when undo
                // matters).
                Ok(())
            }
            Operation::FileMove { from, to, .. } => rename_or_copy(fs, to, from, cancel),
            Operation::FileBackup { backup_path, .. } => fs.remove(backup_path, cancel),
            // No cheap inverse: the reconciler only emits a bare FileDelete
            // after a FileBackup of the same path has already copied its
            // content out, so nothing is lost even though this can't
            // recreate the file at `path` on its own.
            Operation::FileDelete { .. } => Ok(()),
            Operation::DirCopy { to, .. } => fs.remove_all(to, cancel),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Operation::LinkCreate { path, target, .. } => {
                format!("create symlink {} -> {}", path.display(), target)
            }
            Operation::LinkDelete { path, .. } => format!("remove symlink {}", path.display()),
            Operation::DirCreate { path, .. } => format!("create directory {}", path.display()),
            Operation::DirDelete { path, .. } => format!("remove empty directory {}", path.display()),
            Operation::DirRemoveAll { path, .. } => format!("remove directory tree {}", path.display()),
            Operation::FileMove { from, to, .. } => {
                format!("move {} -> {}", from.display(), to.display())
            }
            Operation::FileBackup { path, backup_path, .. } => {
                format!("back up {} -> {}", path.display(), backup_path.display())
            }
            Operation::FileDelete { path, .. } => format!("delete file {}", path.display()),
            Operation::DirCopy { from, to, .. } => {
                format!("copy directory {} -> {}", from.display(), to.display())
            }
        }
    }
}

/// Copy a regular file's content to `to`, leaving `from` untouched — the
/// `FileBackup` contract (§4.5, Scenario C): the conflicting file must
/// still exist for the paired `FileDelete` that follows it in the plan.
fn copy_file(fs: &dyn Filesystem, from: &std::path::Path, to: &std::path::Path, cancel: &CancelToken) -> Result<()> {
    let info = fs.stat(from, cancel)?;
    let bytes = fs.read_file(from, cancel)?;
    fs.write_file(to, &bytes, info.mode, cancel)
}

fn copy_dir_recursive(fs: &dyn Filesystem, from: &std::path::Path, to: &std::path::Path, cancel: &CancelToken) -> Result<()> {
    let info = fs.stat(from, cancel)?;
    if info.is_dir {
        fs.mkdir_all(to, info.mode, cancel)?;
        for entry in fs.read_dir(from, cancel)? {
            cancel.check("dir_copy")?;
            copy_dir_recursive(fs, &from.join(&entry.name), &to.join(&entry.name), cancel)?;
        }
        Ok(())
    } else {
        let bytes = fs.read_file(from, cancel)?;
        fs.write_file(to, &bytes, info.mode, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemFilesystem;

    #[test]
    fn link_create_ids_are_deterministic() {
        let a = Operation::link_create(PathBuf::from("/home/u/.vimrc"), "/dot/vim/vimrc".into());
        let b = Operation::link_create(PathBuf::from("/home/u/.vimrc"), "/dot/vim/vimrc".into());
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn different_paths_yield_different_ids() {
        let a = Operation::link_create(PathBuf::from("/home/u/.vimrc"), "/dot/vim/vimrc".into());
        let b = Operation::link_create(PathBuf::from("/home/u/.bashrc"), "/dot/sh/bashrc".into());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn link_create_execute_and_rollback() {
        let fs = MemFilesystem::new();
        let cancel = CancelToken::new();
        let op = Operation::link_create(PathBuf::from("/home/u/.vimrc"), "/dot/vim/vimrc".into());

        op.execute(&fs, &cancel).unwrap();
        assert!(fs.is_symlink(&PathBuf::from("/home/u/.vimrc")));

        op.rollback(&fs, &cancel).unwrap();
        assert!(!fs.exists(&PathBuf::from("/home/u/.vimrc")));
    }

    #[test]
    fn link_create_depends_on_file_move_at_same_path() {
        let mv = Operation::file_move(PathBuf::from("/home/u/.vimrc"), PathBuf::from("/pkg/vim/dot-vimrc"));
        let link = Operation::link_create(PathBuf::from("/home/u/.vimrc"), "/pkg/vim/dot-vimrc".into());
        assert!(link.depends_on(&mv));
        assert!(!mv.depends_on(&link));
    }

    #[test]
    fn dir_create_depends_used_by_link_create_child() {
        let mkdir = Operation::dir_create(PathBuf::from("/home/u/.config"), 0o755);
        let link = Operation::link_create(PathBuf::from("/home/u/.config/nvim"), "/dot/nvim".into());
        assert!(link.depends_on(&mkdir));
        assert!(!mkdir.depends_on(&link));
    }
}
