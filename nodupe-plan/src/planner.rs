use std::fs;
use std::path::{Path, PathBuf};

use nodupe_catalog::Catalog;
use nodupe_types::{Action, ActionKind, Plan, PlanMetadata, PlanStats, Strategy};

use crate::error::PlanError;
use crate::strategy::{InteractiveChooser, Interactive, KeeperStrategy, Newest, Oldest, ShortestPath};

/// What happens to a group's non-keeper members. The default is `Delete`;
/// `Move`/`Hardlink` are resolved at plan time, not execute time.
#[derive(Debug, Clone)]
pub enum NonKeeperAction {
    Delete,
    Move { target_dir: PathBuf },
    Hardlink,
}

#[derive(Debug, Clone, Default)]
pub struct PlanSummary {
    pub total_groups: u64,
    pub duplicates_found: u64,
    pub reassigned: u64,
    pub output_path: PathBuf,
}

/// Streams duplicate-hash groups out of the catalog one at a time,
/// re-derives the keeper per `strategy`, reassigns catalog links that
/// disagree with it, and appends KEEP/non-KEEP actions to the plan buffer.
pub fn plan(
    catalog: &mut Catalog,
    strategy: Strategy,
    non_keeper_action: NonKeeperAction,
    output_path: &Path,
    chooser: Option<&dyn InteractiveChooser>,
    now_iso: String,
) -> Result<PlanSummary, PlanError> {
    let catalog_version = catalog.catalog_version()?;
    let hashes = catalog.duplicate_hashes()?;

    let mut actions = Vec::new();
    let mut total_groups = 0u64;
    let mut duplicates_found = 0u64;
    let mut reassigned = 0u64;

    for hash in hashes {
        let mut group = catalog.find_duplicates_by_hash(&hash)?;
        if group.len() < 2 {
            continue;
        }

        match strategy {
            Strategy::Newest => Newest.order(&mut group),
            Strategy::Oldest => Oldest.order(&mut group),
            Strategy::ShortestPath => ShortestPath.order(&mut group),
            Strategy::Interactive => {
                let chooser = chooser.ok_or_else(|| {
                    PlanError::MissingTarget("interactive strategy needs a chooser".into())
                })?;
                Interactive { chooser }.order(&mut group);
            }
        }

        let keeper = group[0].clone();
        if keeper.is_duplicate {
            catalog.mark_as_original(keeper.id)?;
            reassigned += 1;
        }

        let non_keeper_ids: Vec<_> = group[1..].iter().map(|r| r.id).collect();
        // Any member not already pointing at this keeper counts as a
        // reassignment (e.g. the scan's initial path-sorted link pass chose
        // someone else, or a previous plan used a different strategy).
        for member in &group[1..] {
            if member.duplicate_of != Some(keeper.id) {
                reassigned += 1;
            }
        }
        catalog.batch_mark_as_duplicate(&non_keeper_ids, keeper.id)?;

        actions.push(Action {
            kind: ActionKind::Keep,
            path: keeper.path.clone(),
            target: None,
            keeper_path: None,
            reason: format!("selected by strategy '{}'", strategy.as_str()),
        });

        for member in &group[1..] {
            let (kind, target) = match &non_keeper_action {
                NonKeeperAction::Delete => (ActionKind::Delete, None),
                NonKeeperAction::Move { target_dir } => {
                    let name = Path::new(&member.path)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| member.path.clone());
                    (ActionKind::Move, Some(target_dir.join(name).display().to_string()))
                }
                NonKeeperAction::Hardlink => (ActionKind::Hardlink, Some(keeper.path.clone())),
            };

            actions.push(Action {
                kind,
                path: member.path.clone(),
                target,
                keeper_path: Some(keeper.path.clone()),
                reason: format!(
                    "duplicate of {} (full_hash {})",
                    keeper.path, hash
                ),
            });
            duplicates_found += 1;
        }

        total_groups += 1;
    }

    let plan = Plan {
        metadata: PlanMetadata {
            strategy: strategy.as_str().to_string(),
            catalog_version,
            generated_at: now_iso,
            stats: PlanStats {
                total_groups,
                duplicates_found,
                reassigned,
            },
        },
        actions,
    };

    write_plan_atomically(output_path, &plan)?;

    log::info!(
        "plan written to {output_path:?}: {total_groups} groups, {duplicates_found} duplicates, \
         {reassigned} reassigned"
    );

    Ok(PlanSummary {
        total_groups,
        duplicates_found,
        reassigned,
        output_path: output_path.to_path_buf(),
    })
}

/// Writes `plan` to `path` via temp file + rename.
fn write_plan_atomically(path: &Path, plan: &Plan) -> Result<(), PlanError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("plan")
    ));

    let json = serde_json::to_string_pretty(plan)?;
    fs::write(&tmp_path, json).map_err(|e| PlanError::Io {
        path: tmp_path.display().to_string(),
        source: e,
    })?;
    fs::rename(&tmp_path, path).map_err(|e| PlanError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}
