use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use nodupe_types::{ActionKind, AuditEventKind, Plan, Strategy};

use crate::services::Services;

pub fn scan(
    services: &mut Services,
    paths: Vec<PathBuf>,
    min_size: Option<u64>,
    max_size: Option<u64>,
    extensions: Option<Vec<String>>,
    exclude: Vec<String>,
    verbose: bool,
) -> Result<()> {
    if paths.is_empty() {
        bail!("scan requires at least one root path");
    }

    let pool = nodupe_config::WorkerPoolConfig::default();
    // Signal wiring (e.g. turning SIGINT into a `cancel.cancel()` call) is
    // TUI/CLI plumbing, out of scope here; `CancellationToken` is what a
    // caller that does own that wiring would trigger.
    let cancel = nodupe_scan::CancellationToken::new();

    let options = nodupe_scan::ScanOptions {
        roots: paths,
        filter: nodupe_scan::FilterOptions {
            min_size,
            max_size,
            extensions,
        },
        exclude,
        ..Default::default()
    };

    let now = chrono::Utc::now().timestamp();
    // `nodupe_scan::run` takes ownership of the catalog for the run's
    // duration (it is the pipeline's single persister) and hands it back.
    let catalog = std::mem::replace(
        &mut services.catalog,
        nodupe_catalog::Catalog::open(&services.base_dir.catalog_path())?,
    );

    services.audit.record(
        AuditEventKind::ScanStarted,
        serde_json::json!({"roots": options.roots.iter().map(|p| p.display().to_string()).collect::<Vec<_>>()}),
    )?;

    let (catalog, summary) = nodupe_scan::run(catalog, options, pool, cancel, now).context("running scan")?;
    services.catalog = catalog;

    services.audit.record(
        if summary.cancelled {
            AuditEventKind::ScanCancelled
        } else {
            AuditEventKind::ScanCompleted
        },
        serde_json::json!({
            "files_seen": summary.files_seen,
            "files_hashed": summary.files_hashed,
            "bytes_hashed": summary.bytes_hashed,
            "duplicate_groups_linked": summary.duplicate_groups_linked,
        }),
    )?;

    println!(
        "scanned {} files, hashed {} ({} bytes), linked {} duplicate groups",
        summary.files_seen, summary.files_hashed, summary.bytes_hashed, summary.duplicate_groups_linked
    );
    if verbose {
        for err in &summary.errors {
            println!("  warning: {err}");
        }
    }
    if summary.cancelled {
        println!("scan cancelled; catalog reflects partial progress");
    }

    Ok(())
}

pub fn plan(
    services: &mut Services,
    strategy: String,
    output: PathBuf,
    move_to: Option<PathBuf>,
    hardlink: bool,
) -> Result<()> {
    let strategy = Strategy::from_str(&strategy).map_err(anyhow::Error::msg)?;

    let non_keeper_action = match (&move_to, hardlink) {
        (Some(dir), false) => nodupe_plan::NonKeeperAction::Move { target_dir: dir.clone() },
        (None, true) => nodupe_plan::NonKeeperAction::Hardlink,
        (None, false) => nodupe_plan::NonKeeperAction::Delete,
        (Some(_), true) => bail!("--move-to and --hardlink are mutually exclusive"),
    };

    let now_iso = chrono::Utc::now().to_rfc3339();
    let summary = nodupe_plan::plan(
        &mut services.catalog,
        strategy,
        non_keeper_action,
        &output,
        None,
        now_iso,
    )
    .context("generating plan")?;

    services.audit.record(
        AuditEventKind::PlanCreated,
        serde_json::json!({
            "strategy": strategy.as_str(),
            "output": summary.output_path,
            "total_groups": summary.total_groups,
            "duplicates_found": summary.duplicates_found,
        }),
    )?;

    println!(
        "plan written to {:?}: {} groups, {} duplicates, {} reassigned",
        summary.output_path, summary.total_groups, summary.duplicates_found, summary.reassigned
    );
    Ok(())
}

pub fn apply(services: &mut Services, plan_path: PathBuf, dry_run: bool, yes: bool) -> Result<()> {
    let contents = std::fs::read_to_string(&plan_path)
        .with_context(|| format!("reading plan file {plan_path:?}"))?;
    let plan: Plan = serde_json::from_str(&contents).context("parsing plan file")?;

    nodupe_exec::verify_plan_fresh(&services.catalog, &plan)?;

    let confirmation = nodupe_exec::build_confirmation_summary(&services.catalog, &plan)?;
    println!(
        "plan affects {} files ({} bytes){}",
        confirmation.file_count,
        confirmation.total_size,
        if confirmation.large_operation { " -- LARGE OPERATION" } else { "" }
    );

    if dry_run {
        for action in &plan.actions {
            if action.kind != ActionKind::Keep {
                println!("  would {:?} {}", action.kind, action.path);
            }
        }
        return Ok(());
    }

    if !yes && !confirm("proceed with apply?")? {
        services.audit.record(
            AuditEventKind::UserConfirmation,
            serde_json::json!({"confirmed": false, "file_count": confirmation.file_count,
                "total_size": confirmation.total_size, "large_operation": confirmation.large_operation}),
        )?;
        println!("aborted");
        return Ok(());
    }
    services.audit.record(
        AuditEventKind::UserConfirmation,
        serde_json::json!({"confirmed": true, "file_count": confirmation.file_count,
            "total_size": confirmation.total_size, "large_operation": confirmation.large_operation}),
    )?;

    let correlation_id = format!("apply-{}", chrono::Utc::now().timestamp_micros());
    let trash_dir = services.base_dir.trash_dir();

    let summary = nodupe_exec::execute_plan(
        &mut services.catalog,
        &plan,
        &mut services.stack,
        &mut services.audit,
        &services.backups,
        &trash_dir,
        correlation_id,
    );

    match summary {
        Ok(summary) => {
            println!("applied {} actions, skipped {}", summary.executed, summary.skipped);
            if let Some(reason) = summary.halted_on {
                println!("apply halted: {reason}");
                println!("run `rollback` to undo what succeeded");
            }
            Ok(())
        }
        Err(e) => Err(e).context("apply failed part-way through; run `rollback` to undo completed actions"),
    }
}

pub fn rollback(
    services: &mut Services,
    last: Option<usize>,
    all: bool,
    to: Option<u64>,
    dry_run: bool,
) -> Result<()> {
    if dry_run {
        for record in services.stack.records() {
            println!("  would undo [{}] {:?}", record.id, record.kind);
        }
        return Ok(());
    }

    let count = if all {
        nodupe_exec::rollback_all(&mut services.stack, &mut services.audit)?
    } else if let Some(marker) = to {
        nodupe_exec::rollback_to(&mut services.stack, &mut services.audit, marker)?
    } else {
        nodupe_exec::rollback_last(&mut services.stack, &mut services.audit, last.unwrap_or(1))?
    };

    println!("undid {count} operations");
    Ok(())
}

pub fn verify(services: &mut Services, sample: Option<usize>) -> Result<()> {
    let mut files = services.catalog.all_active_files()?;
    if let Some(n) = sample {
        files.truncate(n);
    }

    let mut mismatches = Vec::new();
    for record in &files {
        let Some(expected) = &record.full_hash else { continue };
        let path = Path::new(&record.path);
        if !path.exists() {
            mismatches.push(format!("{}: missing on disk", record.path));
            continue;
        }
        match nodupe_hash::full_hash(path, nodupe_hash::DEFAULT_CHUNK_SIZE) {
            Ok(actual) if &actual == expected => {}
            Ok(actual) => mismatches.push(format!("{}: catalog {expected} != disk {actual}", record.path)),
            Err(e) => mismatches.push(format!("{}: {e}", record.path)),
        }
    }

    if mismatches.is_empty() {
        println!("verified {} files, no mismatches", files.len());
        Ok(())
    } else {
        for m in &mismatches {
            println!("  mismatch: {m}");
        }
        bail!("{} of {} files did not match their catalog hash", mismatches.len(), files.len());
    }
}

pub fn archive(paths: Vec<PathBuf>, output: PathBuf) -> Result<()> {
    if paths.is_empty() {
        bail!("archive requires at least one file");
    }
    let manifest = nodupe_exec::write_archive(&output, None, &paths).context("writing archive")?;
    println!("archived {} files to {output:?}", manifest.entries.len());
    Ok(())
}

pub fn mount(services: &mut Services, export: PathBuf) -> Result<()> {
    let files = services.catalog.all_active_files()?;
    let json = serde_json::to_string_pretty(&files)?;
    std::fs::write(&export, json).with_context(|| format!("writing catalog view to {export:?}"))?;
    println!("exported {} records to {export:?}", files.len());
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}
