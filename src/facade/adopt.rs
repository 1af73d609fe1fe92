// src/facade/adopt.rs

//! Adopt (§4.13): ingest pre-existing target files into a package, then
//! replace them with symlinks. Grounded in the original `adoptSvc.Adopt`
//! / `PlanAdopt` pair. Named in the spec's glossary as "covered by
//! facade but not the focus of this spec" — implemented fully, but with
//! less edge-case hardening than the reconcile/execute core it reuses.

use super::Client;
use crate::desired::untranslate;
use crate::error::Result;
use crate::executor::ExecuteResult;
use crate::filesystem::{CancelToken, Filesystem};
use crate::graph::{build_plan, Plan};
use crate::manifest::{PackageInfo, PackageSource};
use crate::operation::Operation;
use crate::reconcile::{Conflict, ConflictKind};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Per-adopt overrides. `package_name_mapping` lets a caller adopt into a
/// package whose target layout disagrees with the client's default
/// mapping mode, without reconstructing a whole `CoreConfig`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdoptOptions {
    pub package_name_mapping: Option<bool>,
}

impl Client {
    pub fn adopt(&self, files: &[String], package: &str, cancel: &CancelToken) -> Result<ExecuteResult> {
        self.adopt_with_options(files, package, AdoptOptions::default(), cancel)
    }

    pub fn adopt_with_options(
        &self,
        files: &[String],
        package: &str,
        options: AdoptOptions,
        cancel: &CancelToken,
    ) -> Result<ExecuteResult> {
        let (plan, conflicts) = self.plan_adopt_with_options(files, package, options, cancel)?;
        self.require_no_conflicts(&conflicts)?;
        let result = self.run_plan(&plan, cancel)?;
        self.record_adopted(files, package, cancel)?;
        Ok(result)
    }

    pub fn plan_adopt(&self, files: &[String], package: &str, cancel: &CancelToken) -> Result<(Plan, Vec<Conflict>)> {
        self.plan_adopt_with_options(files, package, AdoptOptions::default(), cancel)
    }

    pub fn plan_adopt_with_options(
        &self,
        files: &[String],
        package: &str,
        options: AdoptOptions,
        _cancel: &CancelToken,
    ) -> Result<(Plan, Vec<Conflict>)> {
        let mapping = options.package_name_mapping.unwrap_or(self.config.package_name_mapping);
        let package_dir = self.config.package_root.join(package);
        let mut ops = Vec::new();
        let mut conflicts = Vec::new();

        for file in files {
            let target_abs = PathBuf::from(file);

            if !self.fs.exists(&target_abs) {
                conflicts.push(Conflict {
                    path: target_abs,
                    kind: ConflictKind::FileExists,
                    reason: "file to adopt does not exist".to_string(),
                });
                continue;
            }
            if self.fs.is_symlink(&target_abs) {
                conflicts.push(Conflict {
                    path: target_abs,
                    kind: ConflictKind::TypeMismatch,
                    reason: "file to adopt is already a symlink".to_string(),
                });
                continue;
            }

            let relative = match target_abs.strip_prefix(self.config.target_root.as_path()) {
                Ok(r) => r.to_path_buf(),
                Err(_) => {
                    conflicts.push(Conflict {
                        path: target_abs,
                        kind: ConflictKind::TypeMismatch,
                        reason: "file is not under the target root".to_string(),
                    });
                    continue;
                }
            };

            let package_relative = untranslate(&relative, mapping);
            let package_path = package_dir.as_path().join(&package_relative);

            ops.push(Operation::file_move(target_abs.clone(), package_path.clone()));
            ops.push(Operation::link_create(target_abs, package_path.to_string_lossy().into_owned()));
        }

        if ops.is_empty() {
            return Ok((Plan::default(), conflicts));
        }
        let mut plan = build_plan(ops)?;
        let ids: Vec<_> = plan.operations.iter().map(|op| op.id().clone()).collect();
        plan.package_operations = BTreeMap::from([(package.to_string(), ids)]);
        Ok((plan, conflicts))
    }

    fn record_adopted(&self, files: &[String], package: &str, cancel: &CancelToken) -> Result<()> {
        let mut manifest = self.load_manifest()?;
        let now = Utc::now();
        let package_dir = self.config.package_root.join(package);

        let new_links: Vec<(PathBuf, PathBuf)> = files
            .iter()
            .filter_map(|f| {
                Path::new(f)
                    .strip_prefix(self.config.target_root.as_path())
                    .ok()
                    .map(|relative| {
                        let package_relative = untranslate(relative, self.config.package_name_mapping);
                        (relative.to_path_buf(), package_dir.as_path().join(package_relative))
                    })
            })
            .collect();

        let root = crate::path::PackagePath::new(package_dir.as_path().to_string_lossy().into_owned())?;
        let ignore = self.ignore_set();
        let scanned = crate::scanner::scan_package(&root, package, &ignore, self.fs.as_ref(), cancel)?;
        let hash = crate::hash::hash_package(&scanned, self.fs.as_ref(), cancel)?;

        let existing = manifest.packages.get(package);
        let mut links = existing.map(|i| i.links.clone()).unwrap_or_default();
        let mut link_sources = existing.map(|i| i.link_sources.clone()).unwrap_or_default();
        for (link, source) in new_links {
            if !links.contains(&link) {
                links.push(link.clone());
            }
            link_sources.insert(link, source);
        }
        links.sort();

        let info = PackageInfo {
            installed_at: existing.map(|i| i.installed_at).unwrap_or(now),
            link_count: links.len(),
            links,
            link_sources,
            backups: existing.map(|i| i.backups.clone()).unwrap_or_default(),
            source: PackageSource::Adopted,
            target_dir: Some(self.config.target_root.as_path().to_path_buf()),
            package_dir: Some(package_dir.as_path().to_path_buf()),
            extra: Default::default(),
        };
        manifest.add_package(package.to_string(), info, now);
        manifest.set_hash(package.to_string(), hash, now);
        self.save_manifest(&manifest)
    }
}
