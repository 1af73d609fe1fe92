// src/main.rs

mod cli;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands, FileExistsPolicy};
use dotweave::{
    AdoptOptions, CancelToken, Client, ConflictKind, CoreConfig, DiagnosticReport, ExecuteResult,
    PackagePath, PackageStatus, Plan, Policy, RealFilesystem, ResolutionPolicies, ScanConfig,
    Status, TargetPath, UnmanageOptions, Warning,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, info_span};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(*shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    let invocation_id = Uuid::new_v4();
    let span = info_span!("dotweave", invocation = %invocation_id);
    let _guard = span.enter();

    let config = build_config(&cli)?;
    let client = Client::new(Arc::new(RealFilesystem::new()), config);
    let cancel = CancelToken::new();
    let renderer = TextRenderer;

    match cli.command {
        Commands::Manage { packages } => {
            if packages.is_empty() {
                return Err(anyhow!("manage requires at least one package name"));
            }
            if cli.plan_only {
                let (plan, conflicts, warnings) = client.plan_manage(&packages, &cancel)?;
                renderer.render_plan(&plan, &conflicts_to_strings(&conflicts), &warnings);
            } else {
                let result = client.manage(&packages, &cancel)?;
                renderer.render_result(&result);
            }
        }
        Commands::Unmanage { packages, all, no_restore } => {
            let options = UnmanageOptions { restore_adopted: !no_restore };
            if all {
                let count = client.unmanage_all(options, &cancel)?;
                info!(count, "unmanaged every tracked package");
            } else {
                if packages.is_empty() {
                    return Err(anyhow!("unmanage requires at least one package name, or --all"));
                }
                if cli.plan_only {
                    let (plan, missing) = client.plan_unmanage(&packages, &cancel)?;
                    for name in &missing {
                        info!(package = %name, "not tracked in manifest, nothing to unmanage");
                    }
                    renderer.render_plan(&plan, &[], &[]);
                } else {
                    let result = client.unmanage_with_options(&packages, options, &cancel)?;
                    renderer.render_result(&result);
                }
            }
        }
        Commands::Remanage { packages } => {
            if packages.is_empty() {
                return Err(anyhow!("remanage requires at least one package name"));
            }
            if cli.plan_only {
                let (plan, conflicts, warnings) = client.plan_remanage(&packages, &cancel)?;
                renderer.render_plan(&plan, &conflicts_to_strings(&conflicts), &warnings);
            } else {
                let result = client.remanage(&packages, &cancel)?;
                renderer.render_result(&result);
            }
        }
        Commands::Adopt { files, package } => {
            if files.is_empty() {
                return Err(anyhow!("adopt requires at least one file path"));
            }
            let options = AdoptOptions::default();
            if cli.plan_only {
                let (plan, conflicts) = client.plan_adopt_with_options(&files, &package, options, &cancel)?;
                renderer.render_plan(&plan, &conflicts_to_strings(&conflicts), &[]);
            } else {
                let result = client.adopt_with_options(&files, &package, options, &cancel)?;
                renderer.render_result(&result);
            }
        }
        Commands::Status { packages } => {
            let status = client.status(&packages)?;
            renderer.render_status(&status);
        }
        Commands::List => {
            let packages = client.list()?;
            renderer.render_list(&packages);
        }
        Commands::Doctor { deep } => {
            let report = client.doctor_with_scan(ScanConfig { deep })?;
            renderer.render_diagnostics(&report);
            if !report.is_clean() {
                std::process::exit(1);
            }
        }
        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("dotweave={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn build_config(cli: &Cli) -> Result<CoreConfig> {
    let package_root = cli
        .package_root
        .clone()
        .or_else(|| std::env::var_os("DOTWEAVE_PACKAGE_ROOT").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./dotfiles"));

    let target_root = cli
        .target_root
        .clone()
        .or_else(|| std::env::var_os("DOTWEAVE_TARGET_ROOT").map(PathBuf::from))
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow!("could not determine a target root; pass --target-root"))?;

    let package_root = PackagePath::new(package_root.to_string_lossy().into_owned())
        .with_context(|| format!("invalid package root {}", package_root.display()))?;
    let target_root = TargetPath::new(target_root.to_string_lossy().into_owned())
        .with_context(|| format!("invalid target root {}", target_root.display()))?;

    let mut config = CoreConfig::new(package_root, target_root).with_package_name_mapping(cli.package_name_mapping);

    if let Some(dir) = &cli.manifest_dir {
        config = config.with_manifest_dir(dir.clone());
    }
    if let Some(dir) = &cli.backup_dir {
        config = config.with_backup_dir(dir.clone());
    }
    if let Some(parallelism) = cli.parallelism {
        config = config.with_parallelism(parallelism);
    }

    let policy = match cli.on_file_exists {
        FileExistsPolicy::Fail => Policy::Fail,
        FileExistsPolicy::Backup => Policy::Backup,
        FileExistsPolicy::Overwrite => Policy::Overwrite,
        FileExistsPolicy::Skip => Policy::Skip,
    };
    config = config.with_resolution_policies(
        ResolutionPolicies::fail_all().with_override(ConflictKind::FileExists, policy),
    );

    Ok(config)
}

fn conflicts_to_strings(conflicts: &[dotweave::Conflict]) -> Vec<String> {
    conflicts.iter().map(|c| format!("{}: {} ({:?})", c.path.display(), c.reason, c.kind)).collect()
}

/// Seam for alternate output formats (§6). JSON/YAML renderers are a
/// non-goal of this binary; the trait exists so one could be added
/// without touching the facade or core.
trait Renderer {
    fn render_plan(&self, plan: &Plan, conflicts: &[String], warnings: &[Warning]);
    fn render_result(&self, result: &ExecuteResult);
    fn render_status(&self, status: &Status);
    fn render_list(&self, packages: &[(String, dotweave::PackageInfo)]);
    fn render_diagnostics(&self, report: &DiagnosticReport);
}

struct TextRenderer;

impl Renderer for TextRenderer {
    fn render_plan(&self, plan: &Plan, conflicts: &[String], warnings: &[Warning]) {
        if plan.operations.is_empty() {
            println!("nothing to do");
        } else {
            for (i, batch) in plan.batches.iter().enumerate() {
                println!("batch {i}:");
                for id in batch {
                    if let Some(op) = plan.operations.iter().find(|op| op.id() == id) {
                        println!("  {}", op.describe());
                    }
                }
            }
        }
        for conflict in conflicts {
            println!("conflict: {conflict}");
        }
        for warning in warnings {
            println!("warning: {} ({})", warning.message, warning.path.display());
        }
    }

    fn render_result(&self, result: &ExecuteResult) {
        println!("executed {} operation(s)", result.executed.len());
        if !result.rolled_back.is_empty() {
            println!("rolled back {} operation(s)", result.rolled_back.len());
        }
    }

    fn render_status(&self, status: &Status) {
        for PackageStatus { name, links, .. } in &status.packages {
            println!("{name}:");
            for (path, state) in links {
                println!("  {} {:?}", path.display(), state);
            }
        }
    }

    fn render_list(&self, packages: &[(String, dotweave::PackageInfo)]) {
        for (name, info) in packages {
            println!("{name}\t{} link(s)\t{:?}", info.link_count, info.source);
        }
    }

    fn render_diagnostics(&self, report: &DiagnosticReport) {
        if report.is_clean() {
            println!("no issues found");
            return;
        }
        for issue in &report.result.issues {
            println!("{}\t{}\t{:?}\t{}", issue.package, issue.path.display(), issue.kind, issue.detail);
        }
    }
}
