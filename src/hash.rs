// src/hash.rs

//! Content hashing (§3): a deterministic digest of a package's regular
//! file contents, used by the remanage path to detect that a package's
//! sources changed since the last `manage`.

use crate::filesystem::{CancelToken, Filesystem};
use crate::error::Result;
use crate::scanner::{walk_leaves, FileNode, Package};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Hex-encoded SHA-256 digest of a package's contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ContentHash {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(ContentHash(s.to_string()))
    }
}

impl serde::Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(ContentHash(String::deserialize(deserializer)?))
    }
}

/// Hash a package's regular-file contents.
///
/// Iterates leaves in sorted-path order (the scanner already sorts), and
/// folds `(relative_path, NUL, contents, NUL)` for every regular file
/// into one SHA-256 digest. Symlinks are ignored — their targets are
/// recorded in the manifest, not hashed. The NUL delimiter is mandatory:
/// without it, `("ab", "c")` and `("a", "bc")` would hash identically.
pub fn hash_package(package: &Package, fs: &dyn Filesystem, cancel: &CancelToken) -> Result<ContentHash> {
    let mut hasher = Sha256::new();
    for (relative, node) in walk_leaves(&package.tree) {
        if let FileNode::File { .. } = node {
            hash_one_file(&mut hasher, &relative, package.root.as_path(), fs, cancel)?;
        }
    }
    Ok(ContentHash(hex::encode(hasher.finalize())))
}

fn hash_one_file(
    hasher: &mut Sha256,
    relative: &Path,
    pkg_root: &Path,
    fs: &dyn Filesystem,
    cancel: &CancelToken,
) -> Result<()> {
    let absolute = pkg_root.join(relative);
    let contents = fs.read_file(&absolute, cancel)?;

    hasher.update(relative.to_string_lossy().as_bytes());
    hasher.update([0u8]);
    hasher.update(&contents);
    hasher.update([0u8]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::RealFilesystem;
    use crate::ignore::IgnoreSet;
    use crate::path::PackagePath;
    use crate::scanner::scan_package;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn identical_contents_hash_identically() {
        let dir_a = TempDir::new().unwrap();
        write(dir_a.path(), "dot-vimrc", "set nocompatible\n");
        let dir_b = TempDir::new().unwrap();
        write(dir_b.path(), "dot-vimrc", "set nocompatible\n");

        let ignore = IgnoreSet::default_set();
        let root_a = PackagePath::new(dir_a.path().to_string_lossy().into_owned()).unwrap();
        let root_b = PackagePath::new(dir_b.path().to_string_lossy().into_owned()).unwrap();
        let fs = RealFilesystem::new();
        let cancel = CancelToken::new();
        let pkg_a = scan_package(&root_a, "vim", &ignore, &fs, &cancel).unwrap();
        let pkg_b = scan_package(&root_b, "vim", &ignore, &fs, &cancel).unwrap();

        assert_eq!(
            hash_package(&pkg_a, &fs, &cancel).unwrap(),
            hash_package(&pkg_b, &fs, &cancel).unwrap()
        );
    }

    #[test]
    fn changed_contents_change_the_hash() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "dot-vimrc", "set nocompatible\n");
        let ignore = IgnoreSet::default_set();
        let root = PackagePath::new(dir.path().to_string_lossy().into_owned()).unwrap();
        let fs = RealFilesystem::new();
        let cancel = CancelToken::new();

        let pkg_before = scan_package(&root, "vim", &ignore, &fs, &cancel).unwrap();
        let before = hash_package(&pkg_before, &fs, &cancel).unwrap();

        write(dir.path(), "dot-vimrc", "set number\n");
        let pkg_after = scan_package(&root, "vim", &ignore, &fs, &cancel).unwrap();
        let after = hash_package(&pkg_after, &fs, &cancel).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn delimiter_prevents_prefix_ambiguity() {
        let dir_a = TempDir::new().unwrap();
        write(dir_a.path(), "dot-ab", "c");
        let dir_b = TempDir::new().unwrap();
        write(dir_b.path(), "dot-a", "bc");

        let ignore = IgnoreSet::default_set();
        let root_a = PackagePath::new(dir_a.path().to_string_lossy().into_owned()).unwrap();
        let root_b = PackagePath::new(dir_b.path().to_string_lossy().into_owned()).unwrap();
        let fs = RealFilesystem::new();
        let cancel = CancelToken::new();

        let pkg_a = scan_package(&root_a, "x", &ignore, &fs, &cancel).unwrap();
        let pkg_b = scan_package(&root_b, "x", &ignore, &fs, &cancel).unwrap();

        assert_ne!(
            hash_package(&pkg_a, &fs, &cancel).unwrap(),
            hash_package(&pkg_b, &fs, &cancel).unwrap()
        );
    }
}
