// src/facade/doctor.rs

//! Doctor (§4.14 diagnostics, C11): wraps the standalone diagnostic
//! engine behind the facade, grounded in the original `doctorSvc.Doctor`
//! / `DoctorWithScan` pair.

use super::Client;
use crate::diagnostic::{find_orphans, validate, ValidationResult};
use crate::error::Result;
use crate::filesystem::CancelToken;

/// Controls whether `doctor` additionally walks the target tree looking
/// for symlinks into tracked package directories that the manifest
/// doesn't know about. Off by default: it's an O(target tree size) walk,
/// not the cheap manifest-only pass `status` does.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanConfig {
    pub deep: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DiagnosticReport {
    pub result: ValidationResult,
}

impl DiagnosticReport {
    pub fn is_clean(&self) -> bool {
        self.result.is_clean()
    }
}

impl Client {
    pub fn doctor(&self) -> Result<DiagnosticReport> {
        self.doctor_with_scan(ScanConfig::default())
    }

    pub fn doctor_with_scan(&self, scan: ScanConfig) -> Result<DiagnosticReport> {
        let manifest = self.load_manifest()?;
        let cancel = CancelToken::new();
        let mut result = validate(&manifest, self.config.target_root.as_path(), self.fs.as_ref(), &cancel);

        if scan.deep {
            result.issues.extend(find_orphans(&manifest, self.config.target_root.as_path(), self.fs.as_ref(), &cancel));
        }

        Ok(DiagnosticReport { result })
    }
}

#[cfg(test)]
mod tests {
    use super::ScanConfig;
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
    fn healthy_manage_reports_clean() {
        let fs = Arc::new(MemFilesystem::new());
        fs.seed_dir("/pkg/vim");
        fs.seed_file("/pkg/vim/dot-vimrc", "x", 0o644);

        let client = client_over(fs);
        let cancel = CancelToken::new();
        client.manage(&["vim".to_string()], &cancel).unwrap();

        let report = client.doctor().unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn link_removed_out_of_band_is_flagged() {
        let fs = Arc::new(MemFilesystem::new());
        fs.seed_dir("/pkg/vim");
        fs.seed_file("/pkg/vim/dot-vimrc", "x", 0o644);

        let client = client_over(fs.clone());
        let cancel = CancelToken::new();
        client.manage(&["vim".to_string()], &cancel).unwrap();
        fs.remove(&std::path::PathBuf::from("/home/u/.vimrc"), &cancel).unwrap();

        let report = client.doctor().unwrap();
        assert!(!report.is_clean());
    }

    #[test]
    fn deep_scan_is_opt_in() {
        let fs = Arc::new(MemFilesystem::new());
        let client = client_over(fs);
        let report = client.doctor_with_scan(ScanConfig { deep: true }).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn deep_scan_finds_untracked_symlink_into_package_dir() {
        let fs = Arc::new(MemFilesystem::new());
        fs.seed_dir("/pkg/vim");
        fs.seed_file("/pkg/vim/dot-vimrc", "x", 0o644);

        let client = client_over(fs.clone());
        let cancel = CancelToken::new();
        client.manage(&["vim".to_string()], &cancel).unwrap();
        // Hand-created, outside the manifest, but still resolves into a tracked package dir.
        fs.symlink("/pkg/vim/dot-vimrc", &std::path::PathBuf::from("/home/u/.gvimrc"), &cancel)
            .unwrap();

        let shallow = client.doctor().unwrap();
        assert!(shallow.is_clean());

        let deep = client.doctor_with_scan(ScanConfig { deep: true }).unwrap();
        assert!(!deep.is_clean());
    }
}
