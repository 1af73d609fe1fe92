// src/config.rs

//! Core configuration: everything the facade needs to run a plan,
//! constructed explicitly by the caller. No globals or ambient state —
//! loading from a config file or environment is the CLI collaborator's
//! job (§1 Non-goals), this struct is just the resulting value.

use crate::ignore::IgnoreSet;
use crate::path::{PackagePath, TargetPath};
use crate::reconcile::ResolutionPolicies;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub package_root: PackagePath,
    pub target_root: TargetPath,
    pub manifest_dir: PathBuf,
    pub backup_dir: Option<PathBuf>,
    pub package_name_mapping: bool,
    pub parallelism: usize,
    /// How the reconciler resolves a `FileExists`/`TypeMismatch`/etc.
    /// conflict at a target path. Defaults to failing every kind (§4.5).
    pub resolution_policies: ResolutionPolicies,
}

impl CoreConfig {
    pub fn new(package_root: PackagePath, target_root: TargetPath) -> Self {
        let manifest_dir = target_root.as_path().to_path_buf();
        Self {
            package_root,
            target_root,
            manifest_dir,
            backup_dir: None,
            package_name_mapping: false,
            resolution_policies: ResolutionPolicies::default(),
            parallelism: default_parallelism(),
        }
    }

    pub fn with_manifest_dir(mut self, dir: PathBuf) -> Self {
        self.manifest_dir = dir;
        self
    }

    pub fn with_backup_dir(mut self, dir: PathBuf) -> Self {
        self.backup_dir = Some(dir);
        self
    }

    pub fn with_package_name_mapping(mut self, enabled: bool) -> Self {
        self.package_name_mapping = enabled;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn with_resolution_policies(mut self, policies: ResolutionPolicies) -> Self {
        self.resolution_policies = policies;
        self
    }

    pub fn ignore_set(&self, extra_patterns: &[String]) -> IgnoreSet {
        IgnoreSet::with_patterns(extra_patterns)
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1).min(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_manifest_dir_to_target_root() {
        let config = CoreConfig::new(
            PackagePath::new("/pkg").unwrap(),
            TargetPath::new("/home/u").unwrap(),
        );
        assert_eq!(config.manifest_dir, PathBuf::from("/home/u"));
        assert!(!config.package_name_mapping);
    }

    #[test]
    fn parallelism_is_clamped_to_at_least_one() {
        let config = CoreConfig::new(
            PackagePath::new("/pkg").unwrap(),
            TargetPath::new("/home/u").unwrap(),
        )
        .with_parallelism(0);
        assert_eq!(config.parallelism, 1);
    }
}
