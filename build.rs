// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("dotweave")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Dotweave Contributors")
        .about("A symlink-based dotfile manager with transactional planning and rollback")
        .subcommand_required(true)
        .arg(Arg::new("package_root").long("package-root").global(true).help("Directory containing packages"))
        .arg(Arg::new("target_root").long("target-root").global(true).help("Directory symlinks are created in"))
        .arg(Arg::new("manifest_dir").long("manifest-dir").global(true).help("Directory the manifest is stored in"))
        .arg(Arg::new("backup_dir").long("backup-dir").global(true).help("Directory conflicting files are backed up into"))
        .arg(
            Arg::new("package_name_mapping")
                .long("package-name-mapping")
                .global(true)
                .action(clap::ArgAction::SetTrue)
                .help("Collapse embedded dashes in package names into directory separators"),
        )
        .arg(Arg::new("parallelism").long("parallelism").global(true).help("Maximum operations executed concurrently within a batch"))
        .arg(
            Arg::new("plan_only")
                .long("plan-only")
                .global(true)
                .action(clap::ArgAction::SetTrue)
                .help("Compute and print the plan without applying it"),
        )
        .subcommand(
            Command::new("manage")
                .about("Materialize a package's symlinks for the first time")
                .arg(Arg::new("packages").num_args(1..).help("Package names to manage")),
        )
        .subcommand(
            Command::new("unmanage")
                .about("Remove a package's symlinks and drop it from the manifest")
                .arg(Arg::new("packages").num_args(0..).help("Package names to unmanage"))
                .arg(Arg::new("all").long("all").action(clap::ArgAction::SetTrue).help("Unmanage every tracked package"))
                .arg(
                    Arg::new("no_restore")
                        .long("no-restore")
                        .action(clap::ArgAction::SetTrue)
                        .help("Don't restore an adopted package's original file from backup"),
                ),
        )
        .subcommand(
            Command::new("remanage")
                .about("Re-reconcile already-managed packages, skipping unchanged content")
                .arg(Arg::new("packages").num_args(1..).help("Package names to remanage")),
        )
        .subcommand(
            Command::new("adopt")
                .about("Move existing files into a package and replace them with symlinks")
                .arg(Arg::new("files").num_args(1..).help("Absolute paths of files to adopt"))
                .arg(Arg::new("package").long("package").required(true).help("Package to adopt the files into")),
        )
        .subcommand(
            Command::new("status")
                .about("Report the link state of tracked packages")
                .arg(Arg::new("packages").num_args(0..).help("Package names to report on")),
        )
        .subcommand(Command::new("list").about("List every tracked package verbatim from the manifest"))
        .subcommand(
            Command::new("doctor")
                .about("Validate manifest-vs-filesystem consistency")
                .arg(
                    Arg::new("deep")
                        .long("deep")
                        .action(clap::ArgAction::SetTrue)
                        .help("Also scan the target tree for untracked symlinks into package directories"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell", "elvish"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("dotweave.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
        return;
    }

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
