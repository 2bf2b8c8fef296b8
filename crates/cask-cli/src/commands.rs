use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context};
use cask_sdk::{
    Cask, CaskConfig, Credentials, PrincipalResolver, ReferenceView, StaticTokens, StorageStats,
    SweepReport, UploadRequest, UploadResult,
};
use cask_types::OwnerId;
use colored::Colorize;
use serde::Serialize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let open = |config| Cask::open(config).context("opening store");
    match &cli.command {
        Command::Config => cmd_config(&config, cli.format),
        Command::Sweep => cmd_sweep(&open(config)?, cli.format),
        Command::Upload(args) => {
            let cask = open(config)?;
            cmd_upload(&cask, &resolve_owner(&cli, &cask)?, args, cli.format)
        }
        Command::List => {
            let cask = open(config)?;
            cmd_list(&cask, &resolve_owner(&cli, &cask)?, cli.format)
        }
        Command::Delete(args) => {
            let cask = open(config)?;
            cmd_delete(&cask, &resolve_owner(&cli, &cask)?, args, cli.format)
        }
        Command::Stats => {
            let cask = open(config)?;
            cmd_stats(&cask, &resolve_owner(&cli, &cask)?, cli.format)
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<CaskConfig> {
    let mut config = match &cli.config {
        Some(path) => CaskConfig::load(path)?,
        None => CaskConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    Ok(config)
}

fn resolve_owner(cli: &Cli, cask: &Cask) -> anyhow::Result<OwnerId> {
    if let Some(owner) = &cli.owner {
        return Ok(owner.clone());
    }
    let credentials = match &cli.token {
        Some(token) => Credentials::Bearer(token.clone()),
        None => Credentials::Anonymous,
    };
    let resolver = StaticTokens::from_table(&cask.config().principals)?;
    Ok(resolver.resolve(&credentials)?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn cmd_upload(
    cask: &Cask,
    owner: &OwnerId,
    args: &UploadArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut results: Vec<UploadResult> = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        let result = upload_one(cask, owner, path, args)
            .with_context(|| format!("uploading {}", path.display()))?;
        if format == OutputFormat::Text {
            let status = if result.was_duplicate {
                "deduplicated".yellow()
            } else {
                "stored".green()
            };
            println!(
                "{} {} {} ({}, {})",
                "✓".green().bold(),
                result.reference.display_name.bold(),
                status,
                human_bytes(result.blob.size_bytes),
                result.blob.media_type.to_string().cyan()
            );
            println!("  Reference: {}", result.reference.id.to_string().yellow());
            if result.saved_bytes > 0 {
                println!("  Saved: {}", human_bytes(result.saved_bytes).green());
            }
        }
        results.push(result);
    }
    if format == OutputFormat::Json {
        print_json(&results)?;
    }
    Ok(())
}

fn upload_one(
    cask: &Cask,
    owner: &OwnerId,
    path: &Path,
    args: &UploadArgs,
) -> anyhow::Result<UploadResult> {
    let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
        bail!("path has no usable file name");
    };
    let mut request = UploadRequest::new(owner.clone(), filename).private(!args.public);
    if let Some(media_type) = &args.media_type {
        request = request.declared(media_type.clone());
    }
    let mut file = File::open(path)?;
    Ok(cask.upload(request, &mut file)?)
}

fn cmd_list(cask: &Cask, owner: &OwnerId, format: OutputFormat) -> anyhow::Result<()> {
    let views: Vec<ReferenceView> = cask.list_references(owner)?;
    if format == OutputFormat::Json {
        return print_json(&views);
    }
    if views.is_empty() {
        println!("No references.");
        return Ok(());
    }
    for view in &views {
        let visibility = if view.reference.is_private {
            "private".dimmed()
        } else {
            "public".blue()
        };
        println!(
            "{}  {}  {}  {}  {}",
            view.reference.id.short_id().yellow(),
            view.reference.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            human_bytes(view.blob.size_bytes),
            visibility,
            view.reference.display_name.bold()
        );
        println!(
            "  {} {}  shared by {}",
            view.blob.digest.short_hex().cyan(),
            view.blob.media_type,
            view.blob.reference_count
        );
    }
    Ok(())
}

fn cmd_delete(
    cask: &Cask,
    owner: &OwnerId,
    args: &DeleteArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let outcome = cask.delete_reference(owner, &args.id)?;
    if format == OutputFormat::Json {
        return print_json(&outcome);
    }
    println!(
        "{} Deleted {} ({})",
        "✓".green().bold(),
        outcome.reference.display_name.bold(),
        outcome.reference.id.short_id().yellow()
    );
    if outcome.reclaimed {
        println!("  Content reclaimed: no references remain");
    } else if let Some(remaining) = outcome.remaining_references {
        println!("  Content kept: {remaining} reference(s) remain");
    }
    Ok(())
}

fn cmd_stats(cask: &Cask, owner: &OwnerId, format: OutputFormat) -> anyhow::Result<()> {
    let stats: StorageStats = cask.get_stats(owner)?;
    if format == OutputFormat::Json {
        return print_json(&stats);
    }
    println!("Storage for {}", owner.to_string().bold());
    println!(
        "  References: {} ({} distinct, {} duplicate)",
        stats.total_references.to_string().bold(),
        stats.distinct_count,
        stats.duplicate_count
    );
    println!("  Referenced: {}", human_bytes(stats.total_size));
    println!("  Stored:     {}", human_bytes(stats.actual_size));
    println!(
        "  Saved:      {} ({:.1}%)",
        human_bytes(stats.saved_bytes).green(),
        stats.savings_percentage
    );
    for (media_type, size) in &stats.size_by_media_type {
        println!("    {:<32} {}", media_type.cyan(), human_bytes(*size));
    }
    Ok(())
}

fn cmd_sweep(cask: &Cask, format: OutputFormat) -> anyhow::Result<()> {
    let report: SweepReport = cask.sweep()?;
    if format == OutputFormat::Json {
        return print_json(&report);
    }
    if report.is_clean() {
        println!("{} {} blobs checked, nothing to repair.", "✓".green().bold(), report.blobs_checked);
        return Ok(());
    }
    println!("{} Sweep complete ({} blobs checked)", "✓".green().bold(), report.blobs_checked);
    println!("  Counts repaired:      {}", report.counts_repaired);
    println!("  Blobs reclaimed:      {}", report.blobs_reclaimed);
    println!("  Orphan files removed: {}", report.orphan_files_removed);
    println!("  Stale temp removed:   {}", report.stale_temp_removed);
    for id in &report.dangling_references {
        println!("  {} reference {} has no content", "!".red().bold(), id.to_string().yellow());
    }
    for digest in &report.missing_files {
        println!("  {} blob {} is missing its bytes", "!".red().bold(), digest.short_hex().cyan());
    }
    Ok(())
}

fn cmd_config(config: &CaskConfig, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(config),
        OutputFormat::Text => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
