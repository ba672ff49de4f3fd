//! Domain model for ordered track records.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep one record shape shared by repository and ordering layers.
//!
//! # Invariants
//! - Every record is identified by a stable `TrackId`.
//! - Deletion is represented by soft-delete tombstones, not hard delete.

pub mod track;
