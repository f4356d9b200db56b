//! End-to-end scan -> plan -> apply -> rollback scenarios, exercised
//! against a real filesystem and a real SQLite catalog under a temp
//! directory. No mocking of any of the four stages.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};

use nodupe_catalog::Catalog;
use nodupe_exec::{
    build_confirmation_summary, execute_plan, rollback_all, rollback_last, verify_plan_fresh,
    AuditLog, BackupManager, OperationStack,
};
use nodupe_plan::{plan, NonKeeperAction};
use nodupe_scan::{CancellationToken, ScanOptions};
use nodupe_types::{FileStatus, Plan, Strategy};
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        Harness {
            dir: TempDir::new().unwrap(),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write_file(&self, name: &str, content: &[u8], mtime: i64) -> std::path::PathBuf {
        let path = self.root().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(mtime as u64))
            .unwrap();
        path
    }

    fn catalog(&self) -> Catalog {
        Catalog::open(&self.root().join("catalog.db")).unwrap()
    }

    fn audit(&self) -> AuditLog {
        AuditLog::open(&self.root().join("audit.log"), &self.root().join("audit.jsonl")).unwrap()
    }

    fn stack(&self) -> OperationStack {
        OperationStack::load(&self.root().join("stack.json"), 100).unwrap()
    }

    fn backups(&self) -> BackupManager {
        BackupManager::new(self.root().join("backups"))
    }

    fn trash_dir(&self) -> std::path::PathBuf {
        self.root().join("trash")
    }

    fn scan(&self, catalog: Catalog) -> (Catalog, nodupe_scan::ScanSummary) {
        let options = ScanOptions {
            roots: vec![self.root().to_path_buf()],
            ..ScanOptions::default()
        };
        let pool = nodupe_config::WorkerPoolConfig {
            workers: 2,
            max_workers: 4,
            queue_size: 64,
        };
        nodupe_scan::run(catalog, options, pool, CancellationToken::new(), 1_700_000_000).unwrap()
    }

    fn plan_dir(&self) -> std::path::PathBuf {
        self.root().join("plan.json")
    }
}

fn read_plan(path: &Path) -> Plan {
    let text = fs::read_to_string(path).unwrap();
    serde_json::from_str(&text).unwrap()
}

/// S1: three files with identical content and distinct mtimes; the newest
/// survives, the other two are trashed and recorded on the operation stack.
#[test]
fn s1_basic_dedup_keeps_newest() {
    let h = Harness::new();
    h.write_file("a.txt", b"duplicate content", 100);
    h.write_file("b.txt", b"duplicate content", 200);
    h.write_file("c.txt", b"duplicate content", 150);

    let catalog = h.catalog();
    let (mut catalog, summary) = h.scan(catalog);
    assert_eq!(summary.files_seen, 3);
    assert!(!summary.cancelled);

    plan(
        &mut catalog,
        Strategy::Newest,
        NonKeeperAction::Delete,
        &h.plan_dir(),
        None,
        "2026-01-01T00:00:00Z".to_string(),
    )
    .unwrap();

    let written_plan = read_plan(&h.plan_dir());
    assert_eq!(written_plan.metadata.stats.total_groups, 1);
    assert_eq!(written_plan.metadata.stats.duplicates_found, 2);

    let mut stack = h.stack();
    let mut audit = h.audit();
    let backups = h.backups();
    let exec_summary = execute_plan(
        &mut catalog,
        &written_plan,
        &mut stack,
        &mut audit,
        &backups,
        &h.trash_dir(),
        "s1".into(),
    )
    .unwrap();

    assert_eq!(exec_summary.executed, 2);
    assert!(exec_summary.halted_on.is_none());
    assert!(h.root().join("b.txt").exists());
    assert!(!h.root().join("a.txt").exists());
    assert!(!h.root().join("c.txt").exists());
    assert_eq!(stack.len(), 2);

    let keeper = catalog
        .get_file_by_path(&h.root().join("b.txt").display().to_string())
        .unwrap()
        .unwrap();
    assert!(!keeper.is_duplicate);
    assert_eq!(keeper.status, FileStatus::Active);

    let removed = catalog
        .get_file_by_path(&h.root().join("a.txt").display().to_string())
        .unwrap()
        .unwrap();
    assert_eq!(removed.status, FileStatus::Removed);
    assert_eq!(removed.duplicate_of, Some(keeper.id));
}

/// S2: rolling back every operation from S1's end state restores all three
/// files with their original content, and empties the stack.
#[test]
fn s2_rollback_all_restores_every_file() {
    let h = Harness::new();
    h.write_file("a.txt", b"duplicate content", 100);
    h.write_file("b.txt", b"duplicate content", 200);
    h.write_file("c.txt", b"duplicate content", 150);

    let catalog = h.catalog();
    let (mut catalog, _) = h.scan(catalog);
    plan(
        &mut catalog,
        Strategy::Newest,
        NonKeeperAction::Delete,
        &h.plan_dir(),
        None,
        "2026-01-01T00:00:00Z".to_string(),
    )
    .unwrap();
    let written_plan = read_plan(&h.plan_dir());

    let mut stack = h.stack();
    let mut audit = h.audit();
    let backups = h.backups();
    execute_plan(
        &mut catalog,
        &written_plan,
        &mut stack,
        &mut audit,
        &backups,
        &h.trash_dir(),
        "s2".into(),
    )
    .unwrap();
    assert!(!h.root().join("a.txt").exists());

    let count = rollback_all(&mut stack, &mut audit).unwrap();
    assert_eq!(count, 2);
    assert!(stack.is_empty());

    for name in ["a.txt", "b.txt", "c.txt"] {
        let path = h.root().join(name);
        assert!(path.exists(), "{name} should be restored");
        assert_eq!(fs::read(&path).unwrap(), b"duplicate content");
    }
}

/// S3: after an apply, re-scanning the surviving file set converges to
/// zero duplicates.
#[test]
fn s3_rescan_after_apply_finds_no_more_duplicates() {
    let h = Harness::new();
    h.write_file("a.txt", b"duplicate content", 100);
    h.write_file("b.txt", b"duplicate content", 200);
    h.write_file("c.txt", b"duplicate content", 150);

    let catalog = h.catalog();
    let (mut catalog, _) = h.scan(catalog);
    plan(
        &mut catalog,
        Strategy::Newest,
        NonKeeperAction::Delete,
        &h.plan_dir(),
        None,
        "2026-01-01T00:00:00Z".to_string(),
    )
    .unwrap();
    let written_plan = read_plan(&h.plan_dir());

    let mut stack = h.stack();
    let mut audit = h.audit();
    let backups = h.backups();
    execute_plan(
        &mut catalog,
        &written_plan,
        &mut stack,
        &mut audit,
        &backups,
        &h.trash_dir(),
        "s3".into(),
    )
    .unwrap();

    let (catalog, rescan_summary) = h.scan(catalog);
    assert_eq!(rescan_summary.duplicate_groups_linked, 0);
    assert_eq!(catalog.duplicate_hashes().unwrap().len(), 0);
    assert_eq!(catalog.all_active_files().unwrap().len(), 1);
}

/// S5: a plan generated against one catalog state is refused once the
/// catalog changes underneath it, and the refusal has no side effects.
#[test]
fn s5_stale_plan_is_refused_and_filesystem_is_unchanged() {
    let h = Harness::new();
    h.write_file("a.txt", b"duplicate content", 100);
    h.write_file("b.txt", b"duplicate content", 200);

    let catalog = h.catalog();
    let (mut catalog, _) = h.scan(catalog);
    plan(
        &mut catalog,
        Strategy::Newest,
        NonKeeperAction::Delete,
        &h.plan_dir(),
        None,
        "2026-01-01T00:00:00Z".to_string(),
    )
    .unwrap();
    let stale_plan = read_plan(&h.plan_dir());

    // Touch b.txt so the catalog's modified_time (and thus catalog_version)
    // changes, then re-scan to pick it up.
    let b_path = h.root().join("b.txt");
    fs::File::options()
        .write(true)
        .open(&b_path)
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(9_999_999))
        .unwrap();
    let (mut catalog, _) = h.scan(catalog);

    let err = verify_plan_fresh(&catalog, &stale_plan).unwrap_err();
    assert!(err.to_string().to_lowercase().contains("stale"));

    let mut stack = h.stack();
    let mut audit = h.audit();
    let backups = h.backups();
    let result = execute_plan(
        &mut catalog,
        &stale_plan,
        &mut stack,
        &mut audit,
        &backups,
        &h.trash_dir(),
        "s5".into(),
    );
    assert!(result.is_err());
    assert!(h.root().join("a.txt").exists());
    assert!(h.root().join("b.txt").exists());
    assert!(stack.is_empty());
}

/// S6: the second of three deletes fails (its target vanished out-of-band
/// between plan and apply, a privilege-independent way to force a real IO
/// error); the first stays committed on the stack, the halt is reported,
/// and `rollback --last 1` undoes exactly the one that succeeded.
#[test]
fn s6_partial_failure_halts_and_last_rollback_undoes_the_committed_one() {
    let h = Harness::new();
    h.write_file("a.txt", b"duplicate content", 100);
    h.write_file("b.txt", b"duplicate content", 200);
    h.write_file("c.txt", b"duplicate content", 150);

    let catalog = h.catalog();
    let (mut catalog, _) = h.scan(catalog);
    plan(
        &mut catalog,
        Strategy::Oldest,
        NonKeeperAction::Delete,
        &h.plan_dir(),
        None,
        "2026-01-01T00:00:00Z".to_string(),
    )
    .unwrap();
    let written_plan = read_plan(&h.plan_dir());

    // Oldest keeps a.txt (mtime 100); b.txt and c.txt are deleted in plan
    // order. Remove c.txt out-of-band so its delete operation fails with a
    // genuine "not found" IO error regardless of which user runs the test.
    fs::remove_file(h.root().join("c.txt")).unwrap();

    let mut stack = h.stack();
    let mut audit = h.audit();
    let backups = h.backups();
    let confirmation = build_confirmation_summary(&catalog, &written_plan).unwrap();
    assert!(confirmation.file_count <= 2, "c.txt vanished before size accounting too");

    let summary = execute_plan(
        &mut catalog,
        &written_plan,
        &mut stack,
        &mut audit,
        &backups,
        &h.trash_dir(),
        "s6".into(),
    )
    .unwrap();

    assert_eq!(summary.executed, 1);
    assert!(summary.halted_on.is_some());
    assert!(!h.root().join("b.txt").exists());
    assert_eq!(stack.len(), 1);

    let count = rollback_last(&mut stack, &mut audit, 1).unwrap();
    assert_eq!(count, 1);
    assert!(h.root().join("b.txt").exists());
    assert!(stack.is_empty());
}
