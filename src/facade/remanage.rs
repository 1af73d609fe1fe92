// src/facade/remanage.rs

//! Remanage (§4.11): incremental reconciliation gated on a package's
//! content hash, grounded in the original `manageSvc.Remanage` /
//! `manageSvc.PlanRemanage` pair (kept in its own file mirroring the
//! original's separate `remanage.go`, even though both delegate to the
//! same underlying service in the source).

use super::Client;
use crate::desired::build_desired_state;
use crate::error::Result;
use crate::executor::ExecuteResult;
use crate::filesystem::{CancelToken, Filesystem};
use crate::graph::{build_plan, Plan};
use crate::hash::hash_package;
use crate::manifest::Manifest;
use crate::operation::Operation;
use crate::path::TargetPath;
use crate::reconcile::{Conflict, Warning};
use crate::scanner::Package;

impl Client {
    pub fn remanage(&self, packages: &[String], cancel: &CancelToken) -> Result<ExecuteResult> {
        let (plan, conflicts, _warnings) = self.plan_remanage(packages, cancel)?;
        self.require_no_conflicts(&conflicts)?;
        if plan.operations.is_empty() {
            return Ok(ExecuteResult::default());
        }
        let result = self.run_plan(&plan, cancel)?;
        self.record_managed(packages, &plan, cancel)?;
        Ok(result)
    }

    /// Packages whose content hash matches the manifest emit no
    /// operations at all (§4.11, Testable Property 3).
    pub fn plan_remanage(&self, packages: &[String], cancel: &CancelToken) -> Result<(Plan, Vec<Conflict>, Vec<Warning>)> {
        let manifest = self.load_manifest()?;
        let scanned = self.scan_named_packages(packages, cancel)?;
        let fs = self.fs.as_ref();

        let mut changed = Vec::new();
        for package in &scanned {
            let hash = hash_package(package, fs, cancel)?;
            let unchanged = manifest
                .hashes
                .get(&package.name)
                .is_some_and(|stored| stored.as_str() == hash.as_str());
            if !unchanged {
                changed.push(package.clone());
            }
        }

        if changed.is_empty() {
            return Ok((Plan::default(), Vec::new(), Vec::new()));
        }

        let (plan, conflicts, warnings) = self.plan_for_packages(&changed, cancel)?;
        let stale = self.stale_link_deletes(&changed, &manifest, cancel)?;

        if stale.is_empty() {
            return Ok((plan, conflicts, warnings));
        }

        let mut package_operations = plan.package_operations.clone();
        let mut ops = Vec::with_capacity(stale.len() + plan.operations.len());
        for (op, package_name) in stale {
            package_operations.entry(package_name).or_default().push(op.id().clone());
            ops.push(op);
        }
        ops.extend(plan.operations);

        let mut new_plan = build_plan(ops)?;
        new_plan.package_operations = package_operations;
        new_plan.metadata = plan.metadata;
        Ok((new_plan, conflicts, warnings))
    }

    /// Links the manifest remembers for a package but a fresh scan no
    /// longer desires (a source file was deleted since the last manage),
    /// paired with the package name that owned each one.
    fn stale_link_deletes(&self, packages: &[Package], manifest: &Manifest, cancel: &CancelToken) -> Result<Vec<(Operation, String)>> {
        let mut ops = Vec::new();
        for package in packages {
            let Some(info) = manifest.packages.get(&package.name) else {
                continue;
            };
            let desired = build_desired_state(
                std::slice::from_ref(package),
                self.config.target_root.as_path(),
                self.config.package_name_mapping,
            )?;

            for relative in &info.links {
                let absolute = self.config.target_root.as_path().join(relative);
                if desired.links.contains_key(&TargetPath::from_validated(absolute.clone())) {
                    continue;
                }
                if !self.fs.is_symlink(&absolute) {
                    continue;
                }
                let current_target = self.fs.read_link(&absolute, cancel)?;
                ops.push((Operation::link_delete(absolute, current_target), package.name.clone()));
            }
        }
        Ok(ops)
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
    fn unchanged_package_emits_no_operations() {
        let fs = Arc::new(MemFilesystem::new());
        fs.seed_dir("/pkg/vim");
        fs.seed_file("/pkg/vim/dot-vimrc", "set nocompatible\n", 0o644);

        let client = client_over(fs.clone());
        let cancel = CancelToken::new();
        client.manage(&["vim".to_string()], &cancel).unwrap();

        let result = client.remanage(&["vim".to_string()], &cancel).unwrap();
        assert!(result.executed.is_empty());
    }

    #[test]
    fn changed_content_updates_hash_and_link_stays() {
        let fs = Arc::new(MemFilesystem::new());
        fs.seed_dir("/pkg/vim");
        fs.seed_file("/pkg/vim/dot-vimrc", "set nocompatible\n", 0o644);

        let client = client_over(fs.clone());
        let cancel = CancelToken::new();
        client.manage(&["vim".to_string()], &cancel).unwrap();
        let before = client.load_manifest().unwrap().hashes.get("vim").unwrap().clone();

        fs.seed_file("/pkg/vim/dot-vimrc", "set number\n", 0o644);
        client.remanage(&["vim".to_string()], &cancel).unwrap();

        let after = client.load_manifest().unwrap().hashes.get("vim").unwrap().clone();
        assert_ne!(before.as_str(), after.as_str());
        assert!(fs.is_symlink(&std::path::PathBuf::from("/home/u/.vimrc")));
    }
}
