// src/diagnostic.rs

//! Diagnostic engine (C11): validates manifest-vs-filesystem consistency
//! without writing anything. Reuses the filesystem port (C2) and the
//! manifest store (C10); "deep" mode additionally walks the target tree
//! for orphaned symlinks the manifest doesn't know about.

use crate::filesystem::{CancelToken, Filesystem};
use crate::manifest::Manifest;
use crate::scanner::{scan_tree, walk_leaves, FileNode};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// Listed link is present but points at a target that doesn't exist.
    BrokenLink,
    /// Listed link is entirely absent from the target tree.
    MissingLink,
    /// A symlink into a package directory exists but no manifest entry
    /// claims it (only populated in deep mode).
    ExtraLink,
    /// Listed link exists but points somewhere other than its recorded source.
    WrongTarget,
    /// Listed link's path exists but is not a symlink at all.
    NotSymlink,
    /// A link's recorded path was stored as absolute, which is corruption —
    /// link paths in the manifest are always target-relative.
    CorruptManifestEntry,
}

#[derive(Debug, Clone)]
pub struct Issue {
    pub package: String,
    pub path: PathBuf,
    pub kind: IssueKind,
    pub detail: String,
}

#[derive(Debug, Default, Clone)]
pub struct ValidationResult {
    pub issues: Vec<Issue>,
}

impl ValidationResult {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Validate every tracked package's listed links against the filesystem.
pub fn validate(
    manifest: &Manifest,
    target_root: &Path,
    fs: &dyn Filesystem,
    cancel: &CancelToken,
) -> ValidationResult {
    let mut result = ValidationResult::default();

    for (package_name, info) in &manifest.packages {
        for relative in &info.links {
            if relative.is_absolute() {
                result.issues.push(Issue {
                    package: package_name.clone(),
                    path: relative.clone(),
                    kind: IssueKind::CorruptManifestEntry,
                    detail: "manifest stores an absolute link path; link paths must be target-relative".to_string(),
                });
                continue;
            }

            let abs_path = target_root.join(relative);
            let expected_source = info.link_sources.get(relative).map(PathBuf::as_path);
            validate_one_link(package_name, &abs_path, expected_source, fs, cancel, &mut result);
        }
    }

    result
}

fn validate_one_link(
    package_name: &str,
    abs_path: &Path,
    expected_source: Option<&Path>,
    fs: &dyn Filesystem,
    cancel: &CancelToken,
    result: &mut ValidationResult,
) {
    if !fs.exists(abs_path) {
        result.issues.push(Issue {
            package: package_name.to_string(),
            path: abs_path.to_path_buf(),
            kind: IssueKind::MissingLink,
            detail: format!("{} does not exist", abs_path.display()),
        });
        return;
    }

    if !fs.is_symlink(abs_path) {
        result.issues.push(Issue {
            package: package_name.to_string(),
            path: abs_path.to_path_buf(),
            kind: IssueKind::NotSymlink,
            detail: format!("{} exists but is not a symlink", abs_path.display()),
        });
        return;
    }

    let target = match fs.read_link(abs_path, cancel) {
        Ok(t) => t,
        Err(e) => {
            result.issues.push(Issue {
                package: package_name.to_string(),
                path: abs_path.to_path_buf(),
                kind: IssueKind::BrokenLink,
                detail: format!("failed to read link: {e}"),
            });
            return;
        }
    };

    let resolved = resolve_link_target(abs_path, &target);
    if !fs.exists(&resolved) {
        result.issues.push(Issue {
            package: package_name.to_string(),
            path: abs_path.to_path_buf(),
            kind: IssueKind::BrokenLink,
            detail: format!("link target {} does not exist", resolved.display()),
        });
        return;
    }

    if let Some(expected) = expected_source {
        if resolved != expected {
            result.issues.push(Issue {
                package: package_name.to_string(),
                path: abs_path.to_path_buf(),
                kind: IssueKind::WrongTarget,
                detail: format!("{} points at {} but the manifest recorded {}", abs_path.display(), resolved.display(), expected.display()),
            });
        }
    }
}

fn resolve_link_target(link_path: &Path, stored_target: &str) -> PathBuf {
    let target = Path::new(stored_target);
    if target.is_absolute() {
        target.to_path_buf()
    } else {
        link_path.parent().map(|p| p.join(target)).unwrap_or_else(|| target.to_path_buf())
    }
}

/// Deep-mode addendum: walk the target directory for symlinks that
/// resolve into any tracked package directory but appear in no
/// manifest entry. Reuses the scanner's own walk rather than a bespoke
/// one, same as `validate` reuses the filesystem port.
pub fn find_orphans(manifest: &Manifest, target_root: &Path, fs: &dyn Filesystem, cancel: &CancelToken) -> Vec<Issue> {
    let package_dirs: Vec<PathBuf> = manifest
        .packages
        .values()
        .filter_map(|info| info.package_dir.clone())
        .collect();

    let known: std::collections::HashSet<PathBuf> = manifest
        .packages
        .values()
        .flat_map(|info| info.links.iter().cloned())
        .collect();

    let Ok(tree) = scan_tree(target_root, fs, cancel) else {
        return Vec::new();
    };

    let mut orphans = Vec::new();
    for (relative, node) in walk_leaves(&tree) {
        let FileNode::Symlink { link_target, .. } = node else { continue };
        let absolute = target_root.join(&relative);
        let resolved = resolve_link_target(&absolute, link_target);

        if !package_dirs.iter().any(|d| resolved.starts_with(d)) {
            continue;
        }
        if known.contains(&relative) {
            continue;
        }

        orphans.push(Issue {
            package: "<unknown>".to_string(),
            path: relative,
            kind: IssueKind::ExtraLink,
            detail: "symlink into a tracked package directory has no manifest entry".to_string(),
        });
    }
    orphans
}
