// src/reconcile.rs

//! Reconciler (C6): diffs desired state against the observed filesystem
//! and emits the typed operations needed to close the gap, applying
//! per-conflict-kind resolution policies.
//!
//! Pure given its inputs: the only filesystem access is the read-only
//! scan of `CurrentState` over exactly the paths desired state names.

use crate::desired::DesiredState;
use crate::error::Result;
use crate::filesystem::{CancelToken, Filesystem};
use crate::operation::Operation;
use crate::path::TargetPath;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    FileExists,
    WrongLinkTarget,
    TypeMismatch,
    Circular,
    PermissionDenied,
}

#[derive(Debug, Clone)]
pub struct Conflict {
    pub path: PathBuf,
    pub kind: ConflictKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    Fail,
    Backup,
    Overwrite,
    Skip,
}

/// Per-conflict-kind resolution, with a fallback for kinds not listed.
#[derive(Debug, Clone)]
pub struct ResolutionPolicies {
    pub default: Policy,
    pub overrides: HashMap<ConflictKind, Policy>,
}

impl Default for ResolutionPolicies {
    fn default() -> Self {
        Self {
            default: Policy::Fail,
            overrides: HashMap::new(),
        }
    }
}

impl ResolutionPolicies {
    pub fn fail_all() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, kind: ConflictKind, policy: Policy) -> Self {
        self.overrides.insert(kind, policy);
        self
    }

    fn policy_for(&self, kind: ConflictKind) -> &Policy {
        self.overrides.get(&kind).unwrap_or(&self.default)
    }
}

#[derive(Debug, Default, Clone)]
pub struct Warning {
    pub path: PathBuf,
    pub message: String,
}

/// Observed filesystem state, populated only for the paths desired
/// state names.
#[derive(Debug, Default, Clone)]
pub struct CurrentState {
    pub files: BTreeMap<PathBuf, FileObservation>,
    pub links: BTreeMap<PathBuf, LinkObservation>,
    pub dirs: BTreeSet<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub struct FileObservation {
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct LinkObservation {
    pub target: String,
}

#[derive(Debug, Default, Clone)]
pub struct ResolveResult {
    pub operations: Vec<Operation>,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<Warning>,
    /// Which package each entry in `operations` belongs to, in the same
    /// order, for `Plan.package_operations`.
    pub operation_packages: Vec<(crate::operation::OperationID, String)>,
}

/// Scan exactly the paths named by `desired` (the reconciler's only
/// filesystem access).
pub fn observe_current_state(
    fs: &dyn Filesystem,
    desired: &DesiredState,
    cancel: &CancelToken,
) -> Result<CurrentState> {
    let mut state = CurrentState::default();

    for target in desired.links.keys() {
        observe_path(fs, target.as_path(), cancel, &mut state)?;
    }

    for dir in desired.dirs.keys() {
        observe_path(fs, dir.as_path(), cancel, &mut state)?;
    }

    Ok(state)
}

/// Record whatever occupies `path` today, branching on its actual type
/// rather than assuming it's whatever desired state expects there —
/// used for both link targets and ancestor directories, since either can
/// be occupied by the wrong kind of thing (§4.5's `TypeMismatch`).
fn observe_path(fs: &dyn Filesystem, path: &Path, cancel: &CancelToken, state: &mut CurrentState) -> Result<()> {
    if !fs.exists(path) {
        return Ok(());
    }
    let info = fs.lstat(path, cancel)?;
    if info.is_symlink {
        let link_target = fs.read_link(path, cancel)?;
        state.links.insert(path.to_path_buf(), LinkObservation { target: link_target });
    } else if info.is_dir {
        state.dirs.insert(path.to_path_buf());
    } else {
        state.files.insert(path.to_path_buf(), FileObservation { size: info.size });
    }
    Ok(())
}

/// Build the plan of operations (unordered; C7 sorts and batches them)
/// needed to bring `current` in line with `desired`.
pub fn reconcile(
    desired: &DesiredState,
    current: &CurrentState,
    policies: &ResolutionPolicies,
    backup_dir: Option<&Path>,
    timestamp: &str,
) -> ResolveResult {
    let mut result = ResolveResult::default();

    for (dir, spec) in &desired.dirs {
        let path = dir.as_path();
        if current.dirs.contains(path) {
            continue;
        }
        if current.files.contains_key(path) || current.links.contains_key(path) {
            result.conflicts.push(Conflict {
                path: path.to_path_buf(),
                kind: ConflictKind::TypeMismatch,
                reason: "ancestor directory path is occupied by a non-directory".to_string(),
            });
            continue;
        }
        let op = Operation::dir_create(path.to_path_buf(), 0o755);
        result.operation_packages.push((op.id().clone(), spec.package_name.clone()));
        result.operations.push(op);
    }

    for (target, spec) in &desired.links {
        reconcile_link(target, spec, current, policies, backup_dir, timestamp, &mut result);
    }

    result
}

fn reconcile_link(
    target: &TargetPath,
    spec: &crate::desired::LinkSpec,
    current: &CurrentState,
    policies: &ResolutionPolicies,
    backup_dir: Option<&Path>,
    timestamp: &str,
    result: &mut ResolveResult,
) {
    let path = target.as_path();
    let desired_source = spec.source.as_path().to_string_lossy().into_owned();
    let package_name = spec.package_name.as_str();

    if let Some(link) = current.links.get(path) {
        if link.target == desired_source {
            return;
        }
        if is_circular(&link.target, path) {
            result.conflicts.push(Conflict {
                path: path.to_path_buf(),
                kind: ConflictKind::Circular,
                reason: format!("{} is a circular symlink", path.display()),
            });
            return;
        }
        push_op(result, Operation::link_delete(path.to_path_buf(), link.target.clone()), package_name);
        push_op(result, Operation::link_create(path.to_path_buf(), desired_source), package_name);
        return;
    }

    if current.dirs.contains(path) {
        result.conflicts.push(Conflict {
            path: path.to_path_buf(),
            kind: ConflictKind::TypeMismatch,
            reason: format!("{} is a directory, expected a symlink", path.display()),
        });
        return;
    }

    if current.files.contains_key(path) {
        apply_file_exists_policy(path, &desired_source, package_name, policies, backup_dir, timestamp, result);
        return;
    }

    push_op(result, Operation::link_create(path.to_path_buf(), desired_source), package_name);
}

/// Record an operation in both `result.operations` and
/// `result.operation_packages` in one step, so the two never drift.
fn push_op(result: &mut ResolveResult, op: Operation, package_name: &str) {
    result.operation_packages.push((op.id().clone(), package_name.to_string()));
    result.operations.push(op);
}

fn apply_file_exists_policy(
    path: &Path,
    desired_source: &str,
    package_name: &str,
    policies: &ResolutionPolicies,
    backup_dir: Option<&Path>,
    timestamp: &str,
    result: &mut ResolveResult,
) {
    match policies.policy_for(ConflictKind::FileExists) {
        Policy::Fail => {
            result.conflicts.push(Conflict {
                path: path.to_path_buf(),
                kind: ConflictKind::FileExists,
                reason: format!("{} already exists and is not a symlink", path.display()),
            });
        }
        Policy::Overwrite => {
            push_op(result, Operation::file_delete(path.to_path_buf()), package_name);
            push_op(result, Operation::link_create(path.to_path_buf(), desired_source.to_string()), package_name);
        }
        Policy::Skip => {
            result.warnings.push(Warning {
                path: path.to_path_buf(),
                message: format!("skipped {}: file already exists", path.display()),
            });
        }
        Policy::Backup => {
            let basename = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let backup_name = format!("{basename}.{timestamp}");
            let backup_path = backup_dir
                .map(|d| d.join(&backup_name))
                .unwrap_or_else(|| path.with_file_name(backup_name));

            push_op(result, Operation::file_backup(path.to_path_buf(), backup_path), package_name);
            push_op(result, Operation::file_delete(path.to_path_buf()), package_name);
            push_op(result, Operation::link_create(path.to_path_buf(), desired_source.to_string()), package_name);
        }
    }
}

fn is_circular(link_target: &str, link_path: &Path) -> bool {
    let target_path = Path::new(link_target);
    target_path == link_path
        || (!target_path.is_absolute() && link_path.parent().map(|p| p.join(target_path)) == Some(link_path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desired::LinkSpec;
    use crate::path::FilePath;

    fn target(p: &str) -> TargetPath {
        TargetPath::new(p).unwrap()
    }

    fn link_spec(source: &str, package: &str) -> LinkSpec {
        LinkSpec {
            source: FilePath::new(source).unwrap(),
            package_name: package.to_string(),
        }
    }

    #[test]
    fn absent_target_emits_link_create() {
        let mut desired = DesiredState::default();
        desired.links.insert(target("/home/u/.vimrc"), link_spec("/pkg/vim/dot-vimrc", "vim"));
        let current = CurrentState::default();

        let result = reconcile(&desired, &current, &ResolutionPolicies::default(), None, "20260101-000000");
        assert_eq!(result.operations.len(), 1);
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn matching_symlink_is_noop() {
        let mut desired = DesiredState::default();
        desired.links.insert(target("/home/u/.vimrc"), link_spec("/pkg/vim/dot-vimrc", "vim"));

        let mut current = CurrentState::default();
        current.links.insert(
            PathBuf::from("/home/u/.vimrc"),
            LinkObservation { target: "/pkg/vim/dot-vimrc".to_string() },
        );

        let result = reconcile(&desired, &current, &ResolutionPolicies::default(), None, "20260101-000000");
        assert!(result.operations.is_empty());
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn diverging_symlink_is_replaced() {
        let mut desired = DesiredState::default();
        desired.links.insert(target("/home/u/.vimrc"), link_spec("/pkg/vim/dot-vimrc", "vim"));

        let mut current = CurrentState::default();
        current.links.insert(
            PathBuf::from("/home/u/.vimrc"),
            LinkObservation { target: "/pkg/other/dot-vimrc".to_string() },
        );

        let result = reconcile(&desired, &current, &ResolutionPolicies::default(), None, "20260101-000000");
        assert_eq!(result.operations.len(), 2);
    }

    #[test]
    fn regular_file_conflict_defaults_to_fail() {
        let mut desired = DesiredState::default();
        desired.links.insert(target("/home/u/.vimrc"), link_spec("/pkg/vim/dot-vimrc", "vim"));

        let mut current = CurrentState::default();
        current.files.insert(PathBuf::from("/home/u/.vimrc"), FileObservation { size: 10 });

        let result = reconcile(&desired, &current, &ResolutionPolicies::default(), None, "20260101-000000");
        assert!(result.operations.is_empty());
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::FileExists);
    }

    #[test]
    fn regular_file_conflict_with_backup_policy() {
        let mut desired = DesiredState::default();
        desired.links.insert(target("/home/u/.vimrc"), link_spec("/pkg/vim/dot-vimrc", "vim"));

        let mut current = CurrentState::default();
        current.files.insert(PathBuf::from("/home/u/.vimrc"), FileObservation { size: 10 });

        let policies = ResolutionPolicies::default().with_override(ConflictKind::FileExists, Policy::Backup);
        let result = reconcile(&desired, &current, &policies, Some(Path::new("/home/u/.backup")), "20260101-000000");
        assert_eq!(result.operations.len(), 3);
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn directory_at_target_is_type_mismatch() {
        let mut desired = DesiredState::default();
        desired.links.insert(target("/home/u/.vimrc"), link_spec("/pkg/vim/dot-vimrc", "vim"));

        let mut current = CurrentState::default();
        current.dirs.insert(PathBuf::from("/home/u/.vimrc"));

        let result = reconcile(&desired, &current, &ResolutionPolicies::default(), None, "20260101-000000");
        assert_eq!(result.conflicts[0].kind, ConflictKind::TypeMismatch);
    }

    #[test]
    fn ancestor_directory_occupied_by_file_is_type_mismatch() {
        use crate::desired::DirSpec;
        use crate::filesystem::MemFilesystem;
        use crate::path::FilePath;

        let fs = MemFilesystem::new();
        fs.seed_file("/home/u/.config", "not a directory", 0o644);

        let mut desired = DesiredState::default();
        desired.dirs.insert(
            FilePath::new("/home/u/.config").unwrap(),
            DirSpec { package_name: "nvim".to_string() },
        );

        let cancel = CancelToken::new();
        let current = observe_current_state(&fs, &desired, &cancel).unwrap();
        assert!(current.files.contains_key(Path::new("/home/u/.config")));
        assert!(!current.dirs.contains(Path::new("/home/u/.config")));

        let result = reconcile(&desired, &current, &ResolutionPolicies::default(), None, "20260101-000000");
        assert!(result.operations.is_empty());
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::TypeMismatch);
    }
}
