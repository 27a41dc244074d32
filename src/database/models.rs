/*!
 * Database entity models and DTOs.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// CSV checkpoint status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    /// Batch job is in progress (or was interrupted)
    Running,
    /// Batch job wrote its output
    Completed,
}

impl fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointStatus::Running => write!(f, "running"),
            CheckpointStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for CheckpointStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(CheckpointStatus::Running),
            "completed" => Ok(CheckpointStatus::Completed),
            _ => Err(anyhow::anyhow!("Invalid checkpoint status: {}", s)),
        }
    }
}

/// Translation memory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique identifier (`mem_` prefix)
    pub id: String,
    /// Normalized source text
    pub source_text: String,
    /// Source language code
    pub source_lang: String,
    /// Target language code
    pub target_lang: String,
    /// Final (possibly refined) translation
    pub final_text: String,
    /// Pre-refinement draft, if one was kept
    pub draft_text: Option<String>,
    /// Service or arbiter choice that produced the final text
    pub service_used: String,
    /// Number of times this entry was written or hit
    pub usage_count: i64,
    /// Soft-deletion flag; invalidated entries are skipped by lookups
    pub invalidated: bool,
    /// Last hit timestamp (RFC 3339)
    pub last_used: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

/// Aggregate numbers over the translation memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Number of rows
    pub total: i64,
    /// Rows still served by lookups
    pub active: i64,
    /// Rows flagged as invalidated
    pub invalidated: i64,
    /// Sum of usage counters
    pub total_usage: i64,
}

impl fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {}, Active: {}, Invalidated: {}, Total usage: {}",
            self.total, self.active, self.invalidated, self.total_usage
        )
    }
}

/// CSV batch checkpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvCheckpoint {
    /// Unique identifier (`cp_` prefix)
    pub id: String,
    /// Input CSV path
    pub input_path: String,
    /// Output CSV path
    pub output_path: String,
    /// Source language code
    pub source_lang: String,
    /// Target language code
    pub target_lang: String,
    /// Current status
    pub status: CheckpointStatus,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

/// Glossary term for one language pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    /// Unique identifier (`gl_` prefix)
    pub id: String,
    /// Source language code
    pub source_lang: String,
    /// Target language code
    pub target_lang: String,
    /// Term as it appears in source text
    pub source_term: String,
    /// Required rendering in the target language
    pub target_term: String,
    /// Creation timestamp
    pub created_at: String,
}

/// Key of a CSV checkpoint cell as stored in the cell map
pub fn cell_key(row: usize, col: usize) -> String {
    format!("{}:{}", row, col)
}
