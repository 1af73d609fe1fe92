// src/facade/status.rs

//! Status & list (§4.14): read-only reporting over the manifest, grounded
//! in the original `statusSvc.Status` / `statusSvc.List` pair. Never
//! touches the filesystem beyond the probes needed to classify a link.

use super::Client;
use crate::error::Result;
use crate::filesystem::Filesystem;
use crate::manifest::PackageInfo;
use std::path::PathBuf;

/// Per-link classification against the live filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Symlink present and pointing at its recorded source.
    Linked,
    /// Path exists but isn't the symlink the manifest expects.
    Modified,
    /// Recorded link path has nothing at all on disk.
    Missing,
    /// Present on disk but absent from every tracked package's links.
    Unmanaged,
}

#[derive(Debug, Clone)]
pub struct PackageStatus {
    pub name: String,
    pub links: Vec<(PathBuf, LinkState)>,
    pub info: PackageInfo,
}

#[derive(Debug, Clone, Default)]
pub struct Status {
    pub packages: Vec<PackageStatus>,
}

impl Client {
    /// Status of every package named, or every tracked package if `names`
    /// is empty.
    pub fn status(&self, names: &[String]) -> Result<Status> {
        let manifest = self.load_manifest()?;
        let selected: Vec<String> = if names.is_empty() {
            manifest.packages.keys().cloned().collect()
        } else {
            names.to_vec()
        };

        let mut packages = Vec::new();
        for name in selected {
            let Some(info) = manifest.packages.get(&name) else {
                continue;
            };
            let links = self.status_links_for(info);
            packages.push(PackageStatus { name, links, info: info.clone() });
        }
        Ok(Status { packages })
    }

    fn status_links_for(&self, info: &PackageInfo) -> Vec<(PathBuf, LinkState)> {
        info.links
            .iter()
            .map(|relative| {
                let absolute = self.config.target_root.as_path().join(relative);
                let state = if !self.fs.exists(&absolute) {
                    LinkState::Missing
                } else if !self.fs.is_symlink(&absolute) {
                    LinkState::Modified
                } else {
                    LinkState::Linked
                };
                (relative.clone(), state)
            })
            .collect()
    }

    /// Every manifest package entry verbatim, with no filesystem probing —
    /// the cheap listing used by `dotweave list`.
    pub fn list(&self) -> Result<Vec<(String, PackageInfo)>> {
        let manifest = self.load_manifest()?;
        Ok(manifest.packages.into_iter().collect())
    }
}
