/*!
 * Database module for the memoization and checkpoint store.
 *
 * This module provides SQLite-based persistence for:
 * - Translation memory with exact and fuzzy lookup
 * - Stage-1 (pre-refinement) draft cache
 * - Request/result audit trail
 * - CSV batch checkpoints for resuming interrupted jobs
 * - Per-language-pair glossary
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;
pub mod similarity;

// Re-export main types
pub use connection::DatabaseConnection;
pub use repository::{validate_checkpoint_id, Repository};
