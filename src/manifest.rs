// src/manifest.rs

//! Manifest store (C10): persistent record of which packages own which
//! links, plus the content hash used by the remanage path.
//!
//! Reads tolerate a missing file (treated as empty); writes are atomic
//! via a sibling temp file renamed over the canonical name, mirroring
//! the journal's write-then-rename discipline.

use crate::error::{Error, Result};
use crate::hash::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const MANIFEST_FILE_NAME: &str = ".dot-manifest.json";
const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageSource {
    Managed,
    Adopted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    pub installed_at: DateTime<Utc>,
    pub link_count: usize,
    pub links: Vec<PathBuf>,
    /// Target-relative link path -> the absolute source path it was
    /// created to point at, so the diagnostic engine (C11) has ground
    /// truth to compare a link's current target against.
    #[serde(default)]
    pub link_sources: BTreeMap<PathBuf, PathBuf>,
    #[serde(default)]
    pub backups: BTreeMap<PathBuf, PathBuf>,
    pub source: PackageSource,
    #[serde(default)]
    pub target_dir: Option<PathBuf>,
    #[serde(default)]
    pub package_dir: Option<PathBuf>,

    /// Unknown fields from a newer manifest version round-trip through
    /// unread rather than being dropped.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub url: String,
    #[serde(default)]
    pub branch: Option<String>,
    pub cloned_at: DateTime<Utc>,
    #[serde(default)]
    pub commit_sha: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub packages: BTreeMap<String, PackageInfo>,
    #[serde(default)]
    pub hashes: BTreeMap<String, ContentHash>,
    #[serde(default)]
    pub repository: Option<RepositoryInfo>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Manifest {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            updated_at: now,
            packages: BTreeMap::new(),
            hashes: BTreeMap::new(),
            repository: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn add_package(&mut self, name: impl Into<String>, info: PackageInfo, now: DateTime<Utc>) {
        self.packages.insert(name.into(), info);
        self.updated_at = now;
    }

    pub fn remove_package(&mut self, name: &str, now: DateTime<Utc>) {
        self.packages.remove(name);
        self.hashes.remove(name);
        self.updated_at = now;
    }

    pub fn set_hash(&mut self, name: impl Into<String>, hash: ContentHash, now: DateTime<Utc>) {
        self.hashes.insert(name.into(), hash);
        self.updated_at = now;
    }

    pub fn get_repository(&self) -> Option<&RepositoryInfo> {
        self.repository.as_ref()
    }

    pub fn set_repository(&mut self, repo: RepositoryInfo, now: DateTime<Utc>) {
        self.repository = Some(repo);
        self.updated_at = now;
    }

    pub fn clear_repository(&mut self, now: DateTime<Utc>) {
        self.repository = None;
        self.updated_at = now;
    }

    /// Populate `target_dir`/`package_dir` on packages from an older
    /// manifest version that predates those fields, leaving entries that
    /// already carry them untouched.
    pub fn migrate_missing_directories(&mut self, target_dir: &Path, package_root: &Path) {
        for (name, info) in self.packages.iter_mut() {
            if info.target_dir.is_none() {
                info.target_dir = Some(target_dir.to_path_buf());
            }
            if info.package_dir.is_none() {
                info.package_dir = Some(package_root.join(name));
            }
        }
    }
}

fn manifest_path(manifest_dir: &Path) -> PathBuf {
    manifest_dir.join(MANIFEST_FILE_NAME)
}

/// Load the manifest from `manifest_dir`. A missing file is an empty
/// manifest, not an error.
pub fn load(manifest_dir: &Path, now: DateTime<Utc>) -> Result<Manifest> {
    let path = manifest_path(manifest_dir);
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let manifest: Manifest = serde_json::from_str(&contents)?;
            Ok(manifest)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Manifest::empty(now)),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Atomically persist `manifest` under `manifest_dir`: serialize, write
/// to a sibling temp file, then rename over the canonical name.
pub fn save(manifest_dir: &Path, manifest: &Manifest) -> Result<()> {
    std::fs::create_dir_all(manifest_dir)?;
    let path = manifest_path(manifest_dir);
    let body = serde_json::to_string_pretty(manifest)?;

    let mut temp = NamedTempFile::new_in(manifest_dir)
        .map_err(|e| Error::Manifest(format!("failed to create temp file for manifest: {e}")))?;
    use std::io::Write;
    temp.write_all(body.as_bytes())
        .map_err(|e| Error::Manifest(format!("failed to write manifest temp file: {e}")))?;
    temp.flush().map_err(|e| Error::Manifest(format!("failed to flush manifest temp file: {e}")))?;

    temp.persist(&path).map_err(|e| {
        let _ = std::fs::remove_file(e.file.path());
        Error::Manifest(format!("failed to rename manifest into place: {}", e.error))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn sample_package(ts: DateTime<Utc>) -> PackageInfo {
        PackageInfo {
            installed_at: ts,
            link_count: 1,
            links: vec![PathBuf::from(".vimrc")],
            link_sources: BTreeMap::from([(PathBuf::from(".vimrc"), PathBuf::from("/pkg/vim/dot-vimrc"))]),
            backups: BTreeMap::new(),
            source: PackageSource::Managed,
            target_dir: Some(PathBuf::from("/home/u")),
            package_dir: Some(PathBuf::from("/pkg/vim")),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let manifest = load(dir.path(), now()).unwrap();
        assert!(manifest.packages.is_empty());
        assert_eq!(manifest.version, MANIFEST_VERSION);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut manifest = Manifest::empty(now());
        manifest.add_package("vim", sample_package(now()), now());
        manifest.set_hash("vim", ContentHash::from_str("abc123").unwrap(), now());

        save(dir.path(), &manifest).unwrap();
        let reloaded = load(dir.path(), now()).unwrap();

        assert_eq!(reloaded.packages.len(), 1);
        assert_eq!(reloaded.hashes.get("vim").unwrap().as_str(), "abc123");
    }

    #[test]
    fn remove_package_drops_its_hash() {
        let mut manifest = Manifest::empty(now());
        manifest.add_package("vim", sample_package(now()), now());
        manifest.set_hash("vim", ContentHash::from_str("abc123").unwrap(), now());

        manifest.remove_package("vim", now());
        assert!(manifest.packages.is_empty());
        assert!(manifest.hashes.is_empty());
    }

    #[test]
    fn unknown_fields_round_trip_via_flatten() {
        let mut manifest = Manifest::empty(now());
        manifest
            .extra
            .insert("future_field".to_string(), serde_json::json!("kept"));

        let serialized = serde_json::to_string(&manifest).unwrap();
        let reparsed: Manifest = serde_json::from_str(&serialized).unwrap();
        assert_eq!(reparsed.extra.get("future_field").unwrap(), "kept");
    }

    #[test]
    fn migration_fills_missing_directories_without_overwriting() {
        let mut manifest = Manifest::empty(now());
        let mut info = sample_package(now());
        info.target_dir = None;
        info.package_dir = Some(PathBuf::from("/custom/vim"));
        manifest.add_package("vim", info, now());

        manifest.migrate_missing_directories(Path::new("/home/u"), Path::new("/pkg"));
        let info = manifest.packages.get("vim").unwrap();
        assert_eq!(info.target_dir, Some(PathBuf::from("/home/u")));
        assert_eq!(info.package_dir, Some(PathBuf::from("/custom/vim")));
    }
}
