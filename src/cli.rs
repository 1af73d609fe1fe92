// src/cli.rs
//! CLI definitions for the dotweave dotfile manager.
//!
//! This module contains all command-line interface definitions using clap.
//! The actual dispatch lives in `main.rs`; this module only shapes the
//! surface.

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// How to resolve a pre-existing regular file at a symlink's target path
/// (§4.5 `FileExists` conflict). Mirrors `reconcile::Policy` but as a
/// `ValueEnum` so clap can parse it straight off the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FileExistsPolicy {
    Fail,
    Backup,
    Overwrite,
    Skip,
}

#[derive(Parser)]
#[command(name = "dotweave")]
#[command(author = "Dotweave Contributors")]
#[command(version)]
#[command(about = "A symlink-based dotfile manager with transactional planning and rollback", long_about = None)]
pub struct Cli {
    /// Directory containing packages (default: $DOTWEAVE_PACKAGE_ROOT or ./dotfiles)
    #[arg(long, global = true)]
    pub package_root: Option<PathBuf>,

    /// Directory symlinks are created in (default: $DOTWEAVE_TARGET_ROOT or $HOME)
    #[arg(long, global = true)]
    pub target_root: Option<PathBuf>,

    /// Directory the manifest is stored in (default: target root)
    #[arg(long, global = true)]
    pub manifest_dir: Option<PathBuf>,

    /// Directory conflicting files are backed up into instead of overwritten
    #[arg(long, global = true)]
    pub backup_dir: Option<PathBuf>,

    /// How to resolve a pre-existing regular file at a symlink's target path
    #[arg(long, global = true, value_enum, default_value = "fail")]
    pub on_file_exists: FileExistsPolicy,

    /// Collapse embedded dashes in package names into directory separators
    #[arg(long, global = true)]
    pub package_name_mapping: bool,

    /// Maximum operations executed concurrently within a batch
    #[arg(long, global = true)]
    pub parallelism: Option<usize>,

    /// Compute and print the plan without applying it
    #[arg(long, global = true)]
    pub plan_only: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Materialize a package's symlinks for the first time
    Manage {
        /// Package names to manage
        packages: Vec<String>,
    },

    /// Remove a package's symlinks and drop it from the manifest
    Unmanage {
        /// Package names to unmanage
        packages: Vec<String>,

        /// Unmanage every tracked package
        #[arg(long, conflicts_with = "packages")]
        all: bool,

        /// Don't restore an adopted package's original file from backup
        #[arg(long)]
        no_restore: bool,
    },

    /// Re-reconcile already-managed packages, skipping unchanged content
    Remanage {
        /// Package names to remanage
        packages: Vec<String>,
    },

    /// Move existing files into a package and replace them with symlinks
    Adopt {
        /// Absolute paths of files to adopt
        files: Vec<String>,

        /// Package to adopt the files into
        #[arg(long)]
        package: String,
    },

    /// Report the link state of tracked packages
    Status {
        /// Package names to report on (default: every tracked package)
        packages: Vec<String>,
    },

    /// List every tracked package verbatim from the manifest
    List,

    /// Validate manifest-vs-filesystem consistency
    Doctor {
        /// Also scan the target tree for untracked symlinks into package directories
        #[arg(long)]
        deep: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
