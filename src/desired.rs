// src/desired.rs

//! Desired-state builder (C5): collapses a set of scanned packages into
//! the target-relative symlink/directory layout that should exist.

use crate::error::{Error, Result};
use crate::path::{safe_join, FilePath, TargetPath};
use crate::scanner::{walk_leaves, FileNode, Package};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// What a single target path should resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpec {
    pub source: FilePath,
    pub package_name: String,
}

/// A directory that must exist for the links beneath it to be creatable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirSpec {
    pub package_name: String,
}

/// The full intended layout under the target root (§3).
#[derive(Debug, Clone, Default)]
pub struct DesiredState {
    pub links: BTreeMap<TargetPath, LinkSpec>,
    pub dirs: BTreeMap<FilePath, DirSpec>,
}

/// Translate a package-relative leaf path into its target-relative form.
///
/// A `dot-` prefixed first component becomes `.`-prefixed; when
/// `package_name_mapping` is enabled, embedded `-` separators after the
/// prefix collapse into path separators (`dot-config-nvim-init.vim` →
/// `.config/nvim/init.vim`). Components without the prefix pass through.
pub fn translate(relative: &Path, package_name_mapping: bool) -> PathBuf {
    let mut out = PathBuf::new();
    for component in relative.components() {
        let name = component.as_os_str().to_string_lossy();
        out.push(translate_component(&name, package_name_mapping));
    }
    out
}

fn translate_component(name: &str, package_name_mapping: bool) -> PathBuf {
    let Some(rest) = name.strip_prefix("dot-") else {
        return PathBuf::from(name);
    };
    if package_name_mapping && rest.contains('-') {
        let mut parts = rest.split('-');
        let head = parts.next().unwrap_or("");
        let mut path = PathBuf::from(format!(".{head}"));
        for part in parts {
            path.push(part);
        }
        return path;
    }
    PathBuf::from(format!(".{rest}"))
}

/// Inverse of [`translate`], used by the adopt flow to map a target-side
/// path back into its package-internal name.
pub fn untranslate(relative: &Path, package_name_mapping: bool) -> PathBuf {
    let mut components: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if components.is_empty() {
        return PathBuf::new();
    }

    if package_name_mapping && components.len() > 1 {
        if let Some(first) = components.first() {
            if let Some(stripped) = first.strip_prefix('.') {
                let mut joined = format!("dot-{stripped}");
                for part in &components[1..] {
                    joined.push('-');
                    joined.push_str(part);
                }
                return PathBuf::from(joined);
            }
        }
    }

    if let Some(first) = components.first_mut() {
        if let Some(stripped) = first.strip_prefix('.') {
            *first = format!("dot-{stripped}");
        }
    }
    components.iter().collect()
}

/// Build the desired state from a list of scanned packages.
///
/// Packages are processed in the order given; when two packages would
/// produce the same target link with differing sources this is an
/// inter-package conflict (`Error::Conflict`). When sources are
/// identical, the later package silently wins — deterministic because
/// package order is caller-controlled, not incidental.
pub fn build_desired_state(
    packages: &[Package],
    target_root: &Path,
    package_name_mapping: bool,
) -> Result<DesiredState> {
    let mut state = DesiredState::default();

    for package in packages {
        for (relative, node) in walk_leaves(&package.tree) {
            if matches!(node, FileNode::Dir { .. }) {
                continue;
            }

            let mut translated = translate(&relative, package_name_mapping);
            if package_name_mapping {
                translated = Path::new(&package.name).join(&translated);
            }

            let target_abs = safe_join(target_root, &translated)?;
            let target_path = TargetPath::from_validated(target_abs);

            let source_abs = safe_join(package.root.as_path(), &relative)?;
            let source = FilePath::from_validated(source_abs);

            if let Some(existing) = state.links.get(&target_path) {
                if existing.source != source {
                    return Err(Error::Conflict {
                        path: target_path.as_path().to_path_buf(),
                        reason: format!(
                            "packages '{}' and '{}' both map to this target with different sources",
                            existing.package_name, package.name
                        ),
                    });
                }
            }

            insert_ancestor_dirs(&mut state, target_path.as_path(), target_root, &package.name)?;

            state.links.insert(
                target_path,
                LinkSpec {
                    source,
                    package_name: package.name.clone(),
                },
            );
        }
    }

    Ok(state)
}

fn insert_ancestor_dirs(
    state: &mut DesiredState,
    target_path: &Path,
    target_root: &Path,
    package_name: &str,
) -> Result<()> {
    let mut ancestor = target_path.parent();
    while let Some(dir) = ancestor {
        if dir == target_root || !dir.starts_with(target_root) {
            break;
        }
        let dir_path = FilePath::from_validated(dir.to_path_buf());
        state.dirs.entry(dir_path).or_insert_with(|| DirSpec {
            package_name: package_name.to_string(),
        });
        ancestor = dir.parent();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_dot_prefix() {
        assert_eq!(translate(Path::new("dot-vimrc"), false), PathBuf::from(".vimrc"));
    }

    #[test]
    fn passes_through_unprefixed_names() {
        assert_eq!(translate(Path::new("README.md"), false), PathBuf::from("README.md"));
    }

    #[test]
    fn collapses_embedded_dashes_when_mapping_enabled() {
        assert_eq!(
            translate(Path::new("dot-config-nvim-init.vim"), true),
            PathBuf::from(".config/nvim/init.vim")
        );
    }

    #[test]
    fn leaves_embedded_dashes_when_mapping_disabled() {
        assert_eq!(
            translate(Path::new("dot-config-nvim-init.vim"), false),
            PathBuf::from(".config-nvim-init.vim")
        );
    }

    #[test]
    fn untranslate_is_inverse_of_translate_simple() {
        let original = Path::new("dot-vimrc");
        let translated = translate(original, false);
        assert_eq!(untranslate(&translated, false), PathBuf::from("dot-vimrc"));
    }

    #[test]
    fn untranslate_rejoins_nested_components() {
        let translated = Path::new(".config/nvim/init.vim");
        assert_eq!(
            untranslate(translated, true),
            PathBuf::from("dot-config-nvim-init.vim")
        );
    }
}
