// src/ignore.rs

//! Ignore predicate (C3): a pure, side-effect-free pattern set over
//! forward-slash-normalised relative paths, built on the `ignore` crate's
//! gitignore matcher so glob/`**`/anchoring/negation semantics come from a
//! battle-tested implementation rather than a hand-rolled one.

use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Patterns that are always excluded unless a package's own ignore file
/// explicitly un-ignores them with a `!` override.
const DEFAULT_PATTERNS: &[&str] = &[
    ".git/",
    ".svn/",
    ".hg/",
    ".DS_Store",
    "Thumbs.db",
    "*.swp",
    "*.swo",
    "*~",
    ".ssh/id_*",
    ".ssh/*_rsa",
    ".ssh/*_dsa",
    ".ssh/*_ecdsa",
    ".ssh/*_ed25519",
    ".gnupg/",
    ".password-store/",
];

/// A pattern set matching package-relative paths (C3).
///
/// Evaluation follows gitignore semantics: patterns are tried in
/// insertion order and the *last* matching pattern decides; a pattern
/// prefixed `!` negates (overrides) an earlier match. No match means
/// "do not ignore".
pub struct IgnoreSet {
    matcher: Gitignore,
}

impl IgnoreSet {
    /// Build the default ignore set with no additional user patterns.
    pub fn default_set() -> Self {
        Self::with_patterns(&[])
    }

    /// Build an ignore set from the built-in defaults plus `extra`
    /// patterns, evaluated after the defaults (so `extra` entries can
    /// negate a default with `!`).
    pub fn with_patterns(extra: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new("/");
        for pattern in DEFAULT_PATTERNS {
            // Our own default list is known-good; a malformed constant
            // pattern would be a programming error, not user input.
            builder.add_line(None, pattern).expect("built-in ignore pattern is valid");
        }
        for pattern in extra {
            let _ = builder.add_line(None, pattern);
        }
        let matcher = builder.build().expect("ignore patterns compile");
        Self { matcher }
    }

    /// True if `relative_path` (forward-slash separated, relative to a
    /// package root) should be excluded from the scan.
    pub fn is_ignored(&self, relative_path: &str, is_dir: bool) -> bool {
        self.matcher
            .matched(relative_path, is_dir)
            .is_ignore()
    }
}

impl Default for IgnoreSet {
    fn default() -> Self {
        Self::default_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_git_metadata() {
        let ignore = IgnoreSet::default_set();
        assert!(ignore.is_ignored(".git", true));
        assert!(ignore.is_ignored(".git/config", false));
    }

    #[test]
    fn ignores_ssh_private_keys() {
        let ignore = IgnoreSet::default_set();
        assert!(ignore.is_ignored(".ssh/id_rsa", false));
        assert!(!ignore.is_ignored(".ssh/id_rsa.pub", false));
    }

    #[test]
    fn negation_overrides_default() {
        let ignore = IgnoreSet::with_patterns(&["!.DS_Store".to_string()]);
        assert!(!ignore.is_ignored(".DS_Store", false));
    }

    #[test]
    fn last_match_wins() {
        let ignore = IgnoreSet::with_patterns(&[
            "*.log".to_string(),
            "!important.log".to_string(),
        ]);
        assert!(ignore.is_ignored("debug.log", false));
        assert!(!ignore.is_ignored("important.log", false));
    }

    #[test]
    fn unmatched_path_is_not_ignored() {
        let ignore = IgnoreSet::default_set();
        assert!(!ignore.is_ignored("dot-vimrc", false));
    }

    #[test]
    fn double_star_matches_any_depth() {
        let ignore = IgnoreSet::with_patterns(&["**/node_modules".to_string()]);
        assert!(ignore.is_ignored("a/b/node_modules", true));
        assert!(ignore.is_ignored("node_modules", true));
    }
}
