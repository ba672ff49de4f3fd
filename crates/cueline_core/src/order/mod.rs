//! Dense per-group ordering maintenance.
//!
//! # Responsibility
//! - Keep `sort_order` values dense, gap-free, and zero-based within each
//!   ordering group as records are created, reordered, moved, tombstoned,
//!   and restored.
//! - Express every adjustment as point updates and filtered bulk updates,
//!   never as a load-and-rewrite of a whole group.
//!
//! # Invariants
//! - Active rows of one group occupy exactly `{0, ..., n-1}` after every
//!   completed lifecycle event.
//! - Tombstoned rows carry `sort_order = NULL`.
//! - Callers wrap each lifecycle event in one transaction; the engine issues
//!   its store calls sequentially inside it.

pub mod engine;

pub use engine::{
    FieldDelta, OrderResult, OrderSnapshot, OrderingEngine, OrderingError, SortProfile,
    SORT_ORDER_FIELD,
};
