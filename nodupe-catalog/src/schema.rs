use rusqlite::Connection;

use crate::error::CatalogError;

/// Hash primitive recorded in `schema_version` so a later algorithm change
/// is detectable. Fixed per database: a catalog never mixes hash
/// algorithms across rows.
pub const HASH_ALGORITHM: &str = "sha256";
pub const HASH_DIGEST_LEN: i64 = 32;

/// Fixed, ordered list of migrations. Each is applied once, gated on
/// `PRAGMA user_version`. Table and index identifiers here are compile-time
/// constants, never interpolated from user input.
const MIGRATIONS: &[&str] = &[
    // v1: base schema
    r#"
    CREATE TABLE files (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        path            TEXT NOT NULL UNIQUE,
        size            INTEGER NOT NULL,
        modified_time   INTEGER NOT NULL,
        head_hash       TEXT,
        full_hash       TEXT,
        is_duplicate    INTEGER NOT NULL DEFAULT 0,
        duplicate_of    INTEGER REFERENCES files(id),
        status          TEXT NOT NULL DEFAULT 'active',
        scanned_at      INTEGER NOT NULL,
        updated_at      INTEGER NOT NULL,
        hash_failed     INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX idx_files_full_hash ON files(full_hash);
    CREATE INDEX idx_files_size ON files(size);
    CREATE INDEX idx_files_is_duplicate ON files(is_duplicate);
    CREATE INDEX idx_files_duplicate_of ON files(duplicate_of);

    CREATE TABLE scan_sessions (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        roots           TEXT NOT NULL,
        started_at      INTEGER NOT NULL,
        finished_at     INTEGER,
        files_seen      INTEGER NOT NULL DEFAULT 0,
        files_hashed    INTEGER NOT NULL DEFAULT 0,
        bytes_hashed    INTEGER NOT NULL DEFAULT 0,
        status          TEXT NOT NULL DEFAULT 'running'
    );

    CREATE TABLE operations (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        kind            TEXT NOT NULL,
        timestamp       INTEGER NOT NULL,
        forward         TEXT NOT NULL,
        inverse         TEXT NOT NULL,
        correlation_id  TEXT NOT NULL,
        status          TEXT NOT NULL DEFAULT 'pending'
    );

    CREATE TABLE audit_events (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp       TEXT NOT NULL,
        event_kind      TEXT NOT NULL,
        payload         TEXT NOT NULL
    );

    CREATE TABLE schema_version (
        id              INTEGER PRIMARY KEY CHECK (id = 0),
        hash_algorithm  TEXT NOT NULL,
        hash_digest_len INTEGER NOT NULL
    );
    "#,
];

pub fn open_and_migrate(conn: &Connection) -> Result<(), CatalogError> {
    conn.pragma_update(None, "foreign_keys", true)?;

    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    let target = MIGRATIONS.len() as i64;

    if current > target {
        return Err(CatalogError::Schema(format!(
            "catalog schema version {current} is newer than supported version {target}"
        )));
    }

    for (idx, migration) in MIGRATIONS.iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        conn.execute_batch(migration)?;
        conn.pragma_update(None, "user_version", version)?;
    }

    if current < target {
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (id, hash_algorithm, hash_digest_len) VALUES (0, ?1, ?2)",
            rusqlite::params![HASH_ALGORITHM, HASH_DIGEST_LEN],
        )?;
    }

    let (algo, len): (String, i64) = conn.query_row(
        "SELECT hash_algorithm, hash_digest_len FROM schema_version WHERE id = 0",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    if algo != HASH_ALGORITHM || len != HASH_DIGEST_LEN {
        return Err(CatalogError::Schema(format!(
            "catalog was created with hash algorithm '{algo}' ({len}-byte digest); \
             this binary uses '{HASH_ALGORITHM}' ({HASH_DIGEST_LEN}-byte digest)"
        )));
    }

    Ok(())
}
