// src/facade/mod.rs

//! The facade (§6): one `Client` exposing `manage`/`unmanage`/`remanage`/
//! `adopt`/`status`/`list`/`doctor`, plus `plan_*` variants that stop
//! short of executing. One file per operation family, mirroring the
//! upstream service split (`manageSvc`, `unmanageSvc`, `adoptSvc`,
//! `statusSvc`, `doctorSvc`).

mod adopt;
mod doctor;
mod manage;
mod remanage;
mod status;
mod unmanage;

pub use adopt::AdoptOptions;
pub use doctor::{DiagnosticReport, ScanConfig};
pub use status::{LinkState, PackageStatus, Status};
pub use unmanage::UnmanageOptions;

use crate::config::CoreConfig;
use crate::desired::build_desired_state;
use crate::error::{Error, Result};
use crate::executor::{execute, ExecuteResult, ExecutorOptions};
use crate::filesystem::{CancelToken, Filesystem};
use crate::graph::{build_plan, package_operations_from, Plan, PlanMetadata};
use crate::ignore::IgnoreSet;
use crate::manifest::{self, Manifest};
use crate::reconcile::{observe_current_state, reconcile};
use crate::scanner::{scan_package, Package};
use chrono::Utc;
use std::sync::Arc;

/// Entry point the CLI (or any other collaborator) drives. Owns nothing
/// beyond its configuration and filesystem port — all durable state
/// lives in the manifest file.
pub struct Client {
    pub(crate) fs: Arc<dyn Filesystem>,
    pub(crate) config: CoreConfig,
}

impl Client {
    pub fn new(fs: Arc<dyn Filesystem>, config: CoreConfig) -> Self {
        Self { fs, config }
    }

    pub(crate) fn ignore_set(&self) -> IgnoreSet {
        self.config.ignore_set(&[])
    }

    pub(crate) fn load_manifest(&self) -> Result<Manifest> {
        manifest::load(&self.config.manifest_dir, Utc::now())
    }

    pub(crate) fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        manifest::save(&self.config.manifest_dir, manifest)
    }

    pub(crate) fn scan_named_packages(&self, names: &[String], cancel: &CancelToken) -> Result<Vec<Package>> {
        let ignore = self.ignore_set();
        names
            .iter()
            .map(|name| {
                let root = self.config.package_root.join(name);
                let root = crate::path::PackagePath::new(root.as_path().to_string_lossy().into_owned())?;
                scan_package(&root, name, &ignore, self.fs.as_ref(), cancel)
            })
            .collect()
    }

    /// Build the plan for a set of already-scanned packages: desired
    /// state → observed current state → reconcile → dependency sort.
    pub(crate) fn plan_for_packages(&self, packages: &[Package], cancel: &CancelToken) -> Result<(Plan, Vec<crate::reconcile::Conflict>, Vec<crate::reconcile::Warning>)> {
        let desired = build_desired_state(packages, self.config.target_root.as_path(), self.config.package_name_mapping)?;
        let current = observe_current_state(self.fs.as_ref(), &desired, cancel)?;
        let timestamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();
        let resolved = reconcile(&desired, &current, &self.config.resolution_policies, self.config.backup_dir.as_deref(), &timestamp);
        let metadata = PlanMetadata { conflicts: resolved.conflicts.clone(), warnings: resolved.warnings.clone() };

        if resolved.operations.is_empty() {
            let mut plan = Plan::default();
            plan.metadata = metadata;
            return Ok((plan, resolved.conflicts, resolved.warnings));
        }

        let mut plan = build_plan(resolved.operations)?;
        plan.package_operations = package_operations_from(resolved.operation_packages);
        plan.metadata = metadata;
        Ok((plan, resolved.conflicts, resolved.warnings))
    }

    pub(crate) fn run_plan(&self, plan: &Plan, cancel: &CancelToken) -> Result<ExecuteResult> {
        if plan.operations.is_empty() {
            return Ok(ExecuteResult::default());
        }
        // best-effort: the manifest itself isn't written until after a
        // successful execution, so the journal's directory may not exist
        // yet on a package's first-ever manage.
        let _ = std::fs::create_dir_all(&self.config.manifest_dir);
        let options = ExecutorOptions {
            parallelism: self.config.parallelism,
            journal_dir: Some(self.config.manifest_dir.clone()),
        };
        execute(plan, self.fs.as_ref(), cancel, options)
    }

    pub(crate) fn require_no_conflicts(&self, conflicts: &[crate::reconcile::Conflict]) -> Result<()> {
        if conflicts.is_empty() {
            return Ok(());
        }
        Err(Error::Multiple(
            conflicts
                .iter()
                .map(|c| Error::Conflict { path: c.path.clone(), reason: c.reason.clone() })
                .collect(),
        ))
    }
}
