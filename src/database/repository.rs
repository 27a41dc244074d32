/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API over the translation memory,
 * stage-1 draft cache, audit trail, CSV checkpoints and glossary,
 * abstracting away the SQL details and providing type-safe access.
 *
 * Every operation is a single statement or a short transaction, so one
 * repository can be shared by concurrent callers without extra locking.
 */

use anyhow::Result;
use log::debug;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

use super::connection::DatabaseConnection;
use super::models::{
    cell_key, CheckpointStatus, CsvCheckpoint, GlossaryEntry, MemoryEntry, MemoryStats,
};
use super::similarity::{length_similarity, normalize_text, string_similarity};
use crate::errors::AppError;
use crate::providers::ProviderResult;

/// Longest normalized query (in code points) that fuzzy lookup will scan for
pub const MAX_FUZZY_CHARS: usize = 1000;

/// Prefix of CSV checkpoint identifiers
pub const CHECKPOINT_ID_PREFIX: &str = "cp_";

fn new_id(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4().simple())
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Check that a user-supplied checkpoint identifier is well formed
pub fn validate_checkpoint_id(id: &str) -> Result<(), AppError> {
    let valid = id
        .strip_prefix(CHECKPOINT_ID_PREFIX)
        .map(|rest| {
            !rest.is_empty()
                && rest.len() <= 64
                && rest.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or(false);

    if valid {
        Ok(())
    } else {
        Err(AppError::Config(format!("Invalid checkpoint id: {:?}", id)))
    }
}

fn memory_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<MemoryEntry> {
    Ok(MemoryEntry {
        id: row.get(0)?,
        source_text: row.get(1)?,
        source_lang: row.get(2)?,
        target_lang: row.get(3)?,
        final_text: row.get(4)?,
        draft_text: row.get(5)?,
        service_used: row.get(6)?,
        usage_count: row.get(7)?,
        invalidated: row.get(8)?,
        last_used: row.get(9)?,
        created_at: row.get(10)?,
    })
}

const MEMORY_COLUMNS: &str = "id, source_text, source_lang, target_lang, final_text, draft_text, \
     service_used, usage_count, invalidated, last_used, created_at";

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Hash text for use as a cache key
    pub fn hash_text(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    // =========================================================================
    // Translation Memory Operations
    // =========================================================================

    /// Exact lookup of a final translation
    ///
    /// A hit bumps the usage counter and refreshes `last_used`.
    /// Invalidated entries are treated as absent.
    pub async fn get_cached(
        &self,
        source_text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Option<String>> {
        let source_hash = Self::hash_text(&normalize_text(source_text));
        let source_lang = source_lang.to_string();
        let target_lang = target_lang.to_string();

        self.db
            .transaction_async(move |tx| {
                let result: Option<(String, String)> = tx
                    .query_row(
                        r#"
                        SELECT id, final_text
                        FROM translation_memory
                        WHERE source_hash = ?1
                          AND source_lang = ?2
                          AND target_lang = ?3
                          AND invalidated = 0
                        "#,
                        params![source_hash, source_lang, target_lang],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;

                match result {
                    Some((id, final_text)) => {
                        tx.execute(
                            "UPDATE translation_memory SET usage_count = usage_count + 1, last_used = ?1 WHERE id = ?2",
                            params![now(), id],
                        )?;
                        debug!("Translation memory hit for {} -> {}", source_lang, target_lang);
                        Ok(Some(final_text))
                    }
                    None => {
                        debug!("Translation memory miss for {} -> {}", source_lang, target_lang);
                        Ok(None)
                    }
                }
            })
            .await
    }

    /// Store a final translation, replacing any entry with the same key
    ///
    /// The usage counter restarts at 1 and the invalidation flag is cleared.
    pub async fn save_to_memory(
        &self,
        source_text: &str,
        source_lang: &str,
        target_lang: &str,
        final_text: &str,
        draft_text: Option<&str>,
        service_used: &str,
    ) -> Result<()> {
        let normalized = normalize_text(source_text);
        let source_hash = Self::hash_text(&normalized);
        let id = new_id("mem_");
        let source_lang = source_lang.to_string();
        let target_lang = target_lang.to_string();
        let final_text = final_text.to_string();
        let draft_text = draft_text.map(str::to_string);
        let service_used = service_used.to_string();
        let timestamp = now();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO translation_memory (
                        id, source_hash, source_text, source_lang, target_lang,
                        final_text, draft_text, service_used, usage_count, invalidated,
                        last_used, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, 0, ?9, ?9)
                    ON CONFLICT(source_hash, source_lang, target_lang) DO UPDATE SET
                        source_text = excluded.source_text,
                        final_text = excluded.final_text,
                        draft_text = excluded.draft_text,
                        service_used = excluded.service_used,
                        usage_count = 1,
                        invalidated = 0,
                        last_used = excluded.last_used,
                        created_at = excluded.created_at
                    "#,
                    params![
                        id,
                        source_hash,
                        normalized,
                        source_lang,
                        target_lang,
                        final_text,
                        draft_text,
                        service_used,
                        timestamp,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Approximate lookup by normalized edit-distance similarity
    ///
    /// Returns `None` when `threshold <= 0`, when the normalized query is
    /// longer than [`MAX_FUZZY_CHARS`], or when no active entry for the
    /// language pair reaches the threshold. Ties keep the earliest entry.
    pub async fn fuzzy_get_cached(
        &self,
        source_text: &str,
        source_lang: &str,
        target_lang: &str,
        threshold: f64,
    ) -> Result<Option<String>> {
        if threshold <= 0.0 {
            return Ok(None);
        }

        let query = normalize_text(source_text);
        let query_len = query.chars().count();
        if query_len > MAX_FUZZY_CHARS {
            debug!("Fuzzy lookup skipped: query is {} chars", query_len);
            return Ok(None);
        }

        let source_lang = source_lang.to_string();
        let target_lang = target_lang.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT source_text, final_text
                    FROM translation_memory
                    WHERE source_lang = ?1 AND target_lang = ?2 AND invalidated = 0
                    ORDER BY rowid
                    "#,
                )?;
                let mut rows = stmt.query(params![source_lang, target_lang])?;

                let mut best: Option<(f64, String)> = None;
                while let Some(row) = rows.next()? {
                    let candidate: String = row.get(0)?;

                    if length_similarity(query_len, candidate.chars().count()) < threshold {
                        continue;
                    }

                    let score = string_similarity(&query, &candidate);
                    let better = match &best {
                        Some((best_score, _)) => score > *best_score,
                        None => true,
                    };
                    if score >= threshold && better {
                        best = Some((score, row.get(1)?));
                    }
                }

                if let Some((score, _)) = &best {
                    debug!("Fuzzy memory hit with similarity {:.3}", score);
                }
                Ok(best.map(|(_, text)| text))
            })
            .await
    }

    /// Soft-delete a memory entry; returns whether a row was flagged
    pub async fn invalidate_memory(&self, id: &str) -> Result<bool> {
        let id = id.to_string();

        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    "UPDATE translation_memory SET invalidated = 1 WHERE id = ?1",
                    [id],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    /// Permanently remove a memory entry; returns whether a row was removed
    pub async fn delete_memory(&self, id: &str) -> Result<bool> {
        let id = id.to_string();

        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute("DELETE FROM translation_memory WHERE id = ?1", [id])?;
                Ok(deleted > 0)
            })
            .await
    }

    /// Remove every memory entry and report how many were removed
    pub async fn clear_memory(&self) -> Result<i64> {
        self.db
            .execute_async(|conn| {
                let deleted = conn.execute("DELETE FROM translation_memory", [])?;
                Ok(deleted as i64)
            })
            .await
    }

    /// List memory entries, most recently used first
    pub async fn list_memory(&self, limit: Option<usize>) -> Result<Vec<MemoryEntry>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM translation_memory ORDER BY last_used DESC, rowid DESC LIMIT ?1",
                    MEMORY_COLUMNS
                ))?;

                let entries = stmt
                    .query_map([limit], memory_entry_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(entries)
            })
            .await
    }

    /// Fetch one memory entry by id, invalidated or not
    pub async fn get_memory_entry(&self, id: &str) -> Result<Option<MemoryEntry>> {
        let id = id.to_string();

        self.db
            .execute_async(move |conn| {
                let entry = conn
                    .query_row(
                        &format!("SELECT {} FROM translation_memory WHERE id = ?1", MEMORY_COLUMNS),
                        [id],
                        memory_entry_from_row,
                    )
                    .optional()?;
                Ok(entry)
            })
            .await
    }

    /// Aggregate counters over the translation memory
    pub async fn memory_stats(&self) -> Result<MemoryStats> {
        self.db
            .execute_async(|conn| {
                let stats = conn.query_row(
                    r#"
                    SELECT COUNT(*),
                           COALESCE(SUM(CASE WHEN invalidated = 0 THEN 1 ELSE 0 END), 0),
                           COALESCE(SUM(CASE WHEN invalidated = 1 THEN 1 ELSE 0 END), 0),
                           COALESCE(SUM(usage_count), 0)
                    FROM translation_memory
                    "#,
                    [],
                    |row| {
                        Ok(MemoryStats {
                            total: row.get(0)?,
                            active: row.get(1)?,
                            invalidated: row.get(2)?,
                            total_usage: row.get(3)?,
                        })
                    },
                )?;
                Ok(stats)
            })
            .await
    }

    // =========================================================================
    // Stage-1 Draft Operations
    // =========================================================================

    /// Store the pre-refinement draft produced by one service
    pub async fn save_to_stage1_cache(
        &self,
        source_text: &str,
        source_lang: &str,
        target_lang: &str,
        draft_text: &str,
        service_used: &str,
    ) -> Result<()> {
        let normalized = normalize_text(source_text);
        let source_hash = Self::hash_text(&normalized);
        let id = new_id("s1_");
        let source_lang = source_lang.to_string();
        let target_lang = target_lang.to_string();
        let draft_text = draft_text.to_string();
        let service_used = service_used.to_string();
        let timestamp = now();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO stage1_cache (
                        id, source_hash, source_text, source_lang, target_lang,
                        service_used, draft_text, last_used, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                    ON CONFLICT(source_hash, source_lang, target_lang, service_used) DO UPDATE SET
                        draft_text = excluded.draft_text,
                        last_used = excluded.last_used,
                        created_at = excluded.created_at
                    "#,
                    params![
                        id,
                        source_hash,
                        normalized,
                        source_lang,
                        target_lang,
                        service_used,
                        draft_text,
                        timestamp,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Fetch the draft a service produced earlier; refreshes `last_used` on a hit
    pub async fn get_stage1_draft(
        &self,
        source_text: &str,
        source_lang: &str,
        target_lang: &str,
        service_used: &str,
    ) -> Result<Option<String>> {
        let source_hash = Self::hash_text(&normalize_text(source_text));
        let source_lang = source_lang.to_string();
        let target_lang = target_lang.to_string();
        let service_used = service_used.to_string();

        self.db
            .transaction_async(move |tx| {
                let result: Option<(String, String)> = tx
                    .query_row(
                        r#"
                        SELECT id, draft_text
                        FROM stage1_cache
                        WHERE source_hash = ?1
                          AND source_lang = ?2
                          AND target_lang = ?3
                          AND service_used = ?4
                        "#,
                        params![source_hash, source_lang, target_lang, service_used],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;

                if let Some((id, _)) = &result {
                    tx.execute(
                        "UPDATE stage1_cache SET last_used = ?1 WHERE id = ?2",
                        params![now(), id],
                    )?;
                    debug!("Stage-1 draft hit for service {}", service_used);
                }
                Ok(result.map(|(_, draft)| draft))
            })
            .await
    }

    // =========================================================================
    // Audit Trail Operations
    // =========================================================================

    /// Record an incoming translation request and return its id
    pub async fn save_request(
        &self,
        source_text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String> {
        let id = new_id("req_");
        let returned = id.clone();
        let source_text = source_text.to_string();
        let source_lang = source_lang.to_string();
        let target_lang = target_lang.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO translation_requests (id, source_text, source_lang, target_lang, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![id, source_text, source_lang, target_lang, now()],
                )?;
                Ok(())
            })
            .await?;

        Ok(returned)
    }

    /// Record one provider's result for a request
    pub async fn save_result(&self, request_id: &str, result: &ProviderResult) -> Result<()> {
        let request_id = request_id.to_string();
        let result = result.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO translation_results (
                        request_id, service_name, translated_text, confidence, latency_ms, error, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    params![
                        request_id,
                        result.service_name,
                        result.translated_text,
                        result.confidence,
                        result.latency.as_millis() as i64,
                        result.error,
                        now(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Record the final text chosen for a request
    pub async fn save_final_translation(
        &self,
        request_id: &str,
        selected_service: &str,
        final_text: &str,
        is_composite: bool,
        reasoning: Option<&str>,
    ) -> Result<()> {
        let request_id = request_id.to_string();
        let selected_service = selected_service.to_string();
        let final_text = final_text.to_string();
        let reasoning = reasoning.map(str::to_string);

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO final_translations (
                        request_id, final_text, selected_service, is_composite, reasoning, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    params![request_id, final_text, selected_service, is_composite, reasoning, now()],
                )?;
                Ok(())
            })
            .await
    }

    // =========================================================================
    // CSV Checkpoint Operations
    // =========================================================================

    /// Start a batch job and return its checkpoint id
    pub async fn create_csv_checkpoint(
        &self,
        input_path: &str,
        output_path: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String> {
        let id = new_id(CHECKPOINT_ID_PREFIX);
        let returned = id.clone();
        let input_path = input_path.to_string();
        let output_path = output_path.to_string();
        let source_lang = source_lang.to_string();
        let target_lang = target_lang.to_string();
        let timestamp = now();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO csv_checkpoints (
                        id, input_path, output_path, source_lang, target_lang, status, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                    "#,
                    params![
                        id,
                        input_path,
                        output_path,
                        source_lang,
                        target_lang,
                        CheckpointStatus::Running.to_string(),
                        timestamp,
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(returned)
    }

    /// Get a checkpoint by id
    pub async fn get_csv_checkpoint(&self, checkpoint_id: &str) -> Result<Option<CsvCheckpoint>> {
        let checkpoint_id = checkpoint_id.to_string();

        self.db
            .execute_async(move |conn| {
                let checkpoint = conn
                    .query_row(
                        r#"
                        SELECT id, input_path, output_path, source_lang, target_lang,
                               status, created_at, updated_at
                        FROM csv_checkpoints WHERE id = ?1
                        "#,
                        [checkpoint_id],
                        |row| {
                            Ok(CsvCheckpoint {
                                id: row.get(0)?,
                                input_path: row.get(1)?,
                                output_path: row.get(2)?,
                                source_lang: row.get(3)?,
                                target_lang: row.get(4)?,
                                status: row.get::<_, String>(5)?.parse().map_err(
                                    |e: anyhow::Error| {
                                        rusqlite::Error::FromSqlConversionFailure(
                                            5,
                                            Type::Text,
                                            e.into(),
                                        )
                                    },
                                )?,
                                created_at: row.get(6)?,
                                updated_at: row.get(7)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(checkpoint)
            })
            .await
    }

    /// Record one translated cell; re-saving a cell overwrites it
    pub async fn save_csv_cell(
        &self,
        checkpoint_id: &str,
        row: usize,
        col: usize,
        translated_text: &str,
    ) -> Result<()> {
        let checkpoint_id = checkpoint_id.to_string();
        let translated_text = translated_text.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO csv_checkpoint_cells (checkpoint_id, row_index, col_index, translated_text)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(checkpoint_id, row_index, col_index)
                    DO UPDATE SET translated_text = excluded.translated_text
                    "#,
                    params![checkpoint_id, row as i64, col as i64, translated_text],
                )?;
                Ok(())
            })
            .await
    }

    /// All recorded cells of a checkpoint, keyed `"row:col"`
    pub async fn get_csv_cells(&self, checkpoint_id: &str) -> Result<HashMap<String, String>> {
        let checkpoint_id = checkpoint_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT row_index, col_index, translated_text
                    FROM csv_checkpoint_cells
                    WHERE checkpoint_id = ?1
                    "#,
                )?;

                let mut cells = HashMap::new();
                let rows = stmt.query_map([checkpoint_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?;
                for row in rows {
                    let (r, c, text) = row?;
                    cells.insert(cell_key(r as usize, c as usize), text);
                }

                Ok(cells)
            })
            .await
    }

    /// Mark a checkpoint as completed; returns whether it existed
    pub async fn complete_csv_checkpoint(&self, checkpoint_id: &str) -> Result<bool> {
        let checkpoint_id = checkpoint_id.to_string();

        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    "UPDATE csv_checkpoints SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![CheckpointStatus::Completed.to_string(), now(), checkpoint_id],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    // =========================================================================
    // Glossary Operations
    // =========================================================================

    /// Insert a term, replacing the target term of an existing key
    pub async fn add_glossary_term(
        &self,
        source_lang: &str,
        target_lang: &str,
        source_term: &str,
        target_term: &str,
    ) -> Result<()> {
        let id = new_id("gl_");
        let source_lang = source_lang.to_string();
        let target_lang = target_lang.to_string();
        let source_term = source_term.to_string();
        let target_term = target_term.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO glossary (id, source_lang, target_lang, source_term, target_term, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(source_lang, target_lang, source_term)
                    DO UPDATE SET target_term = excluded.target_term
                    "#,
                    params![id, source_lang, target_lang, source_term, target_term, now()],
                )?;
                Ok(())
            })
            .await
    }

    /// Term map (source term to target term) for one language pair
    pub async fn get_glossary_terms(
        &self,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<HashMap<String, String>> {
        let source_lang = source_lang.to_string();
        let target_lang = target_lang.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT source_term, target_term FROM glossary WHERE source_lang = ?1 AND target_lang = ?2",
                )?;

                let terms = stmt
                    .query_map(params![source_lang, target_lang], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<rusqlite::Result<HashMap<_, _>>>()?;

                Ok(terms)
            })
            .await
    }

    /// List glossary entries, optionally filtered by either language
    pub async fn list_glossary_terms(
        &self,
        source_lang: Option<&str>,
        target_lang: Option<&str>,
    ) -> Result<Vec<GlossaryEntry>> {
        let source_lang = source_lang.map(str::to_string);
        let target_lang = target_lang.map(str::to_string);

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, source_lang, target_lang, source_term, target_term, created_at
                    FROM glossary
                    WHERE (?1 IS NULL OR source_lang = ?1)
                      AND (?2 IS NULL OR target_lang = ?2)
                    ORDER BY source_lang, target_lang, source_term
                    "#,
                )?;

                let entries = stmt
                    .query_map(params![source_lang, target_lang], |row| {
                        Ok(GlossaryEntry {
                            id: row.get(0)?,
                            source_lang: row.get(1)?,
                            target_lang: row.get(2)?,
                            source_term: row.get(3)?,
                            target_term: row.get(4)?,
                            created_at: row.get(5)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(entries)
            })
            .await
    }

    /// Remove a glossary entry by id; returns whether a row was removed
    pub async fn delete_glossary_term(&self, id: &str) -> Result<bool> {
        let id = id.to_string();

        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute("DELETE FROM glossary WHERE id = ?1", [id])?;
                Ok(deleted > 0)
            })
            .await
    }
}
