// src/facade/manage.rs

//! Manage (§4.11/§4.12): first-time materialization of a package's
//! symlinks, grounded in the original `manageSvc.Manage` /
//! `manageSvc.PlanManage` pair. `remanage` lives in its sibling module
//! (`remanage.rs`) per the original's separate `remanage.go`, but calls
//! back into `record_managed` here since both paths write the same
//! manifest shape.

use super::Client;
use crate::desired::build_desired_state;
use crate::error::Result;
use crate::executor::ExecuteResult;
use crate::filesystem::CancelToken;
use crate::graph::Plan;
use crate::hash::hash_package;
use crate::manifest::{PackageInfo, PackageSource};
use crate::operation::Operation;
use crate::reconcile::{Conflict, Warning};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

impl Client {
    /// Scan, reconcile, and execute a plan for the named packages.
    pub fn manage(&self, packages: &[String], cancel: &CancelToken) -> Result<ExecuteResult> {
        let (plan, conflicts, _warnings) = self.plan_manage(packages, cancel)?;
        self.require_no_conflicts(&conflicts)?;
        let result = self.run_plan(&plan, cancel)?;
        self.record_managed(packages, &plan, cancel)?;
        Ok(result)
    }

    /// Compute the plan `manage` would execute, without applying it.
    pub fn plan_manage(&self, packages: &[String], cancel: &CancelToken) -> Result<(Plan, Vec<Conflict>, Vec<Warning>)> {
        let scanned = self.scan_named_packages(packages, cancel)?;
        self.plan_for_packages(&scanned, cancel)
    }

    /// Map of target path (absolute) -> backup path for every `FileBackup`
    /// operation the just-run plan contains. Used to populate a package's
    /// manifest `backups` entry after a `Backup`-policy conflict resolution
    /// (§4.5, Scenario C): the conflicting path the backup was taken from
    /// is the same path the subsequent `LinkCreate` targets.
    fn backups_in_plan(plan: &Plan) -> BTreeMap<PathBuf, PathBuf> {
        plan.operations
            .iter()
            .filter_map(|op| match op {
                Operation::FileBackup { path, backup_path, .. } => Some((path.clone(), backup_path.clone())),
                _ => None,
            })
            .collect()
    }

    /// Record each package's link set and content hash in the manifest
    /// after a successful manage/remanage execution, folding in any
    /// backups the just-run `plan` produced.
    pub(crate) fn record_managed(&self, packages: &[String], plan: &Plan, cancel: &CancelToken) -> Result<()> {
        let mut manifest = self.load_manifest()?;
        let scanned = self.scan_named_packages(packages, cancel)?;
        let now = Utc::now();
        let backups_taken = Self::backups_in_plan(plan);

        for package in &scanned {
            let desired = build_desired_state(
                std::slice::from_ref(package),
                self.config.target_root.as_path(),
                self.config.package_name_mapping,
            )?;

            let target_root = self.config.target_root.as_path();
            let links: Vec<PathBuf> = desired
                .links
                .keys()
                .filter_map(|t| t.as_path().strip_prefix(target_root).ok().map(|p| p.to_path_buf()))
                .collect();
            let link_sources: BTreeMap<PathBuf, PathBuf> = desired
                .links
                .iter()
                .filter_map(|(t, spec)| {
                    t.as_path()
                        .strip_prefix(target_root)
                        .ok()
                        .map(|relative| (relative.to_path_buf(), spec.source.as_path().to_path_buf()))
                })
                .collect();

            let hash = hash_package(package, self.fs.as_ref(), cancel)?;
            let existing = manifest.packages.get(&package.name);
            let mut backups = existing.map(|i| i.backups.clone()).unwrap_or_default();
            for target in desired.links.keys() {
                if let Some(backup_path) = backups_taken.get(target.as_path()) {
                    if let Ok(relative) = target.as_path().strip_prefix(target_root) {
                        backups.insert(relative.to_path_buf(), relative_to_backup(backup_path));
                    }
                }
            }

            let info = PackageInfo {
                installed_at: existing.map(|i| i.installed_at).unwrap_or(now),
                link_count: links.len(),
                links,
                link_sources,
                backups,
                source: PackageSource::Managed,
                target_dir: Some(self.config.target_root.as_path().to_path_buf()),
                package_dir: Some(package.root.as_path().to_path_buf()),
                extra: Default::default(),
            };
            manifest.add_package(package.name.clone(), info, now);
            manifest.set_hash(package.name.clone(), hash, now);
        }

        self.save_manifest(&manifest)
    }
}

/// Manifest `backups` values are stored as their full path (the backup
/// directory may sit outside the target root), so this is a pass-through
/// today; kept as a named seam in case a future revision stores backup
/// paths relative to the backup directory instead.
fn relative_to_backup(path: &Path) -> PathBuf {
    path.to_path_buf()
}
