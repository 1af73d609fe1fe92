// src/facade/unmanage.rs

//! Unmanage (§4.12): removes the symlinks a set of tracked packages own
//! and drops them from the manifest, grounded in the original
//! `unmanageSvc.Unmanage` / `UnmanageWithOptions` / `UnmanageAll` /
//! `PlanUnmanage` quartet.

use super::Client;
use crate::error::Result;
use crate::executor::{execute, ExecuteResult, ExecutorOptions};
use crate::filesystem::{CancelToken, Filesystem};
use crate::graph::{build_plan, package_operations_from, Plan};
use crate::manifest::PackageSource;
use crate::operation::Operation;
use chrono::Utc;

/// Options controlling how `unmanage` treats a package's links.
#[derive(Debug, Clone, Copy)]
pub struct UnmanageOptions {
    /// When true (the default), an adopted package's original file is
    /// restored from its package-directory backup before the package is
    /// dropped from the manifest, undoing `adopt`.
    pub restore_adopted: bool,
}

impl Default for UnmanageOptions {
    fn default() -> Self {
        Self { restore_adopted: true }
    }
}

impl Client {
    pub fn unmanage(&self, packages: &[String], cancel: &CancelToken) -> Result<ExecuteResult> {
        self.unmanage_with_options(packages, UnmanageOptions::default(), cancel)
    }

    pub fn unmanage_with_options(
        &self,
        packages: &[String],
        options: UnmanageOptions,
        cancel: &CancelToken,
    ) -> Result<ExecuteResult> {
        let (plan, _missing) = self.plan_unmanage(packages, cancel)?;
        let result = if plan.operations.is_empty() {
            ExecuteResult::default()
        } else {
            let _ = std::fs::create_dir_all(&self.config.manifest_dir);
            execute(
                &plan,
                self.fs.as_ref(),
                cancel,
                ExecutorOptions {
                    parallelism: self.config.parallelism,
                    journal_dir: Some(self.config.manifest_dir.clone()),
                },
            )?
        };

        self.restore_and_drop(packages, &options, cancel)?;
        Ok(result)
    }

    /// Unmanage every package currently tracked in the manifest, returning
    /// how many were removed.
    pub fn unmanage_all(&self, options: UnmanageOptions, cancel: &CancelToken) -> Result<usize> {
        let manifest = self.load_manifest()?;
        let names: Vec<String> = manifest.packages.keys().cloned().collect();
        if names.is_empty() {
            return Ok(0);
        }
        self.unmanage_with_options(&names, options, cancel)?;
        Ok(names.len())
    }

    /// Build the delete-only plan for a set of tracked packages' links.
    /// Reads the manifest rather than rescanning the package directory —
    /// the package's source tree may already be gone by the time the user
    /// unmanages it. Names absent from the manifest are reported back
    /// rather than erroring, so `unmanage` on an already-removed package
    /// is a no-op.
    pub fn plan_unmanage(&self, packages: &[String], cancel: &CancelToken) -> Result<(Plan, Vec<String>)> {
        let manifest = self.load_manifest()?;
        let mut ops = Vec::new();
        let mut op_packages = Vec::new();
        let mut missing = Vec::new();

        for name in packages {
            let Some(info) = manifest.packages.get(name) else {
                missing.push(name.clone());
                continue;
            };
            for relative in &info.links {
                let absolute = self.config.target_root.as_path().join(relative);
                if !self.fs.is_symlink(&absolute) {
                    continue;
                }
                let current_target = self.fs.read_link(&absolute, cancel)?;
                let op = Operation::link_delete(absolute, current_target);
                op_packages.push((op.id().clone(), name.clone()));
                ops.push(op);
            }
        }

        if ops.is_empty() {
            return Ok((Plan::default(), missing));
        }
        let mut plan = build_plan(ops)?;
        plan.package_operations = package_operations_from(op_packages);
        Ok((plan, missing))
    }

    fn restore_and_drop(&self, packages: &[String], options: &UnmanageOptions, cancel: &CancelToken) -> Result<()> {
        let mut manifest = self.load_manifest()?;
        let now = Utc::now();

        for name in packages {
            if options.restore_adopted {
                if let Some(info) = manifest.packages.get(name) {
                    if info.source == PackageSource::Adopted {
                        for (original, backup) in &info.backups {
                            if self.fs.exists(backup) {
                                crate::filesystem::rename_or_copy(self.fs.as_ref(), backup, original, cancel)?;
                            }
                        }
                    }
                }
            }
            manifest.remove_package(name, now);
        }

        self.save_manifest(&manifest)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::CoreConfig;
    use crate::facade::Client;
    use crate::filesystem::{CancelToken, Filesystem, MemFilesystem};
    use crate::path::{PackagePath, TargetPath};
    use std::sync::Arc;

    fn client_over(fs: Arc<MemFilesystem>) -> Client {
        let config = CoreConfig::new(PackagePath::new("/pkg").unwrap(), TargetPath::new("/home/u").unwrap());
        Client::new(fs, config)
    }

    #[test]
    fn unmanage_removes_link_and_manifest_entry() {
        let fs = Arc::new(MemFilesystem::new());
        fs.seed_dir("/pkg/vim");
        fs.seed_file("/pkg/vim/dot-vimrc", "set nocompatible\n", 0o644);

        let client = client_over(fs.clone());
        let cancel = CancelToken::new();
        client.manage(&["vim".to_string()], &cancel).unwrap();
        assert!(fs.is_symlink(&std::path::PathBuf::from("/home/u/.vimrc")));

        client.unmanage(&["vim".to_string()], &cancel).unwrap();
        assert!(!fs.exists(&std::path::PathBuf::from("/home/u/.vimrc")));

        let manifest = client.load_manifest().unwrap();
        assert!(!manifest.packages.contains_key("vim"));

        // the package source file itself is never touched
        assert!(fs.exists(&std::path::PathBuf::from("/pkg/vim/dot-vimrc")));
    }

    #[test]
    fn unmanage_on_untracked_package_is_a_noop() {
        let fs = Arc::new(MemFilesystem::new());
        let client = client_over(fs);
        let cancel = CancelToken::new();
        let result = client.unmanage(&["ghost".to_string()], &cancel).unwrap();
        assert!(result.executed.is_empty());
    }

    #[test]
    fn unmanage_all_counts_every_tracked_package() {
        let fs = Arc::new(MemFilesystem::new());
        fs.seed_dir("/pkg/vim");
        fs.seed_file("/pkg/vim/dot-vimrc", "x", 0o644);
        fs.seed_dir("/pkg/sh");
        fs.seed_file("/pkg/sh/dot-bashrc", "y", 0o644);

        let client = client_over(fs);
        let cancel = CancelToken::new();
        client.manage(&["vim".to_string(), "sh".to_string()], &cancel).unwrap();

        let count = client.unmanage_all(Default::default(), &cancel).unwrap();
        assert_eq!(count, 2);
        assert!(client.load_manifest().unwrap().packages.is_empty());
    }
}
