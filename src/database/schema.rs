/*!
 * Database schema definitions and migrations.
 *
 * This module contains the SQL schema for the translation memory, the
 * stage-1 draft cache, the audit trail, CSV checkpoints and the glossary,
 * and handles schema migrations for version upgrades.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Foreign keys are a per-connection setting in SQLite
    conn.execute_batch("PRAGMA foreign_keys=ON;")
        .context("Failed to enable foreign keys")?;

    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))
         ON CONFLICT(id) DO UPDATE SET version = excluded.version, updated_at = excluded.updated_at",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    // WAL lets readers proceed while a CSV job is writing cells;
    // in-memory databases silently stay in "memory" mode
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .context("Failed to set journal mode")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    // Audit trail
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS translation_requests (
            id TEXT PRIMARY KEY,
            source_text TEXT NOT NULL,
            source_lang TEXT NOT NULL,
            target_lang TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS translation_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            request_id TEXT NOT NULL REFERENCES translation_requests(id) ON DELETE CASCADE,
            service_name TEXT NOT NULL,
            translated_text TEXT NOT NULL,
            confidence REAL NOT NULL,
            latency_ms INTEGER NOT NULL,
            error TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS final_translations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            request_id TEXT NOT NULL REFERENCES translation_requests(id) ON DELETE CASCADE,
            final_text TEXT NOT NULL,
            selected_service TEXT NOT NULL,
            is_composite INTEGER NOT NULL DEFAULT 0,
            reasoning TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_results_request ON translation_results(request_id);
        CREATE INDEX IF NOT EXISTS idx_final_request ON final_translations(request_id);
        "#,
    )?;

    // Translation memory
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS translation_memory (
            id TEXT PRIMARY KEY,
            source_hash TEXT NOT NULL,
            source_text TEXT NOT NULL,
            source_lang TEXT NOT NULL,
            target_lang TEXT NOT NULL,
            final_text TEXT NOT NULL,
            draft_text TEXT,
            service_used TEXT NOT NULL,
            usage_count INTEGER NOT NULL DEFAULT 1,
            invalidated INTEGER NOT NULL DEFAULT 0,
            last_used TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(source_hash, source_lang, target_lang)
        );

        CREATE INDEX IF NOT EXISTS idx_memory_lookup ON translation_memory(source_hash, source_lang, target_lang);
        CREATE INDEX IF NOT EXISTS idx_memory_pair ON translation_memory(source_lang, target_lang, invalidated);
        "#,
    )?;

    // Stage-1 (pre-refinement) drafts
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS stage1_cache (
            id TEXT PRIMARY KEY,
            source_hash TEXT NOT NULL,
            source_text TEXT NOT NULL,
            source_lang TEXT NOT NULL,
            target_lang TEXT NOT NULL,
            service_used TEXT NOT NULL,
            draft_text TEXT NOT NULL,
            last_used TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(source_hash, source_lang, target_lang, service_used)
        );

        CREATE INDEX IF NOT EXISTS idx_stage1_lookup ON stage1_cache(source_hash, source_lang, target_lang, service_used);
        "#,
    )?;

    // CSV checkpoints
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS csv_checkpoints (
            id TEXT PRIMARY KEY,
            input_path TEXT NOT NULL,
            output_path TEXT NOT NULL,
            source_lang TEXT NOT NULL,
            target_lang TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'running',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS csv_checkpoint_cells (
            checkpoint_id TEXT NOT NULL REFERENCES csv_checkpoints(id) ON DELETE CASCADE,
            row_index INTEGER NOT NULL,
            col_index INTEGER NOT NULL,
            translated_text TEXT NOT NULL,
            PRIMARY KEY (checkpoint_id, row_index, col_index)
        );

        CREATE INDEX IF NOT EXISTS idx_checkpoints_status ON csv_checkpoints(status);
        "#,
    )?;

    // Glossary
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS glossary (
            id TEXT PRIMARY KEY,
            source_lang TEXT NOT NULL,
            target_lang TEXT NOT NULL,
            source_term TEXT NOT NULL,
            target_term TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(source_lang, target_lang, source_term)
        );

        CREATE INDEX IF NOT EXISTS idx_glossary_pair ON glossary(source_lang, target_lang);
        "#,
    )?;

    info!("Database schema created successfully");
    Ok(())
}

/// Migrate the schema from one version to another
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    let current = from_version;

    if current < SCHEMA_VERSION {
        // No released version predates v1 yet
        return Err(anyhow::anyhow!(
            "Unknown schema version: {}. Cannot migrate.",
            current
        ));
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    info!("Schema migration completed to v{}", SCHEMA_VERSION);
    Ok(())
}
