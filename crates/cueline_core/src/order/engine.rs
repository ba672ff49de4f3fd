//! Ordering engine: explicit lifecycle entry points over a sortable table.
//!
//! # Responsibility
//! - Assign append positions on create and restore.
//! - Recompute the minimal set of `sort_order` adjustments on reorder,
//!   group reassignment, and tombstoning.
//! - Validate requested reorder targets before any mutation.
//!
//! # Invariants
//! - The moving row's slot is vacated (set to NULL) before any range shift,
//!   so the shift predicate can never double-affect the mover.
//! - Range shifts are single filtered bulk updates bounded to the vacated
//!   range; they touch O(range) rows, never O(group) rows.
//! - A rejected reorder aborts before the first store mutation.
//!
//! The caller provides prior/requested field snapshots explicitly and calls
//! each entry point at a defined position inside its own transaction. There
//! is no dirty tracking and no hook dispatch in here.

use crate::db::DbError;
use log::debug;
use rusqlite::{params, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Attribute named by field-level reorder validation errors.
pub const SORT_ORDER_FIELD: &str = "sort_order";

/// Result type used by ordering engine operations.
pub type OrderResult<T> = Result<T, OrderingError>;

/// Errors from ordering engine operations.
#[derive(Debug)]
pub enum OrderingError {
    /// Requested reorder target failed validation; names the offending
    /// attribute so callers can surface a field-level error.
    InvalidSortIndex {
        field: &'static str,
        requested: i64,
    },
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
}

impl Display for OrderingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSortIndex { field, requested } => {
                write!(f, "{field} is invalid: requested index {requested}")
            }
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OrderingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSortIndex { .. } => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for OrderingError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for OrderingError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Static description of the sortable table the engine operates on.
///
/// Configurable pieces: target table, point-update key column, and the group
/// key column (defaults to a parent reference). The table always carries
/// `sort_order` and `updated_at`; when `soft_delete` is set it also carries
/// `is_deleted`, and the delete/restore entry points become active.
#[derive(Debug, Clone, Copy)]
pub struct SortProfile {
    /// Target table name.
    pub table: &'static str,
    /// Column used for targeted updates by record id.
    pub id_column: &'static str,
    /// Group key column; records are ordered independently per value.
    pub group_column: &'static str,
    /// Whether the record type supports tombstoning.
    pub soft_delete: bool,
}

impl SortProfile {
    /// Creates a profile with default column names and no soft-delete
    /// capability.
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            id_column: "uuid",
            group_column: "parent_uuid",
            soft_delete: false,
        }
    }
}

/// Prior/next pair for one field, passed explicitly by the caller.
///
/// Replaces ORM-style dirty tracking: "was this field changed" is simply
/// `prior != next`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDelta<T> {
    /// Persisted value before the update.
    pub prior: T,
    /// Requested value after the update.
    pub next: T,
}

impl<T: Copy> FieldDelta<T> {
    /// Builds a delta for a field the update does not touch.
    pub fn unchanged(value: T) -> Self {
        Self {
            prior: value,
            next: value,
        }
    }
}

impl<T: PartialEq> FieldDelta<T> {
    /// Returns whether the update changes this field.
    pub fn changed(&self) -> bool {
        self.prior != self.next
    }
}

/// Explicit field snapshot for one update event.
///
/// `requested_sort` is `Some` only when the update names a target index;
/// a request equal to the persisted index is still a request (and fails
/// validation as a no-op) rather than an untouched field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSnapshot {
    /// Record being updated.
    pub id: Uuid,
    /// Group key before/after the update.
    pub group: FieldDelta<Option<Uuid>>,
    /// Persisted sort index before the update.
    pub prior_sort: Option<i64>,
    /// Explicitly requested target index, when the update names one.
    pub requested_sort: Option<i64>,
}

impl OrderSnapshot {
    /// Returns whether the update moves the record to another group.
    pub fn group_changed(&self) -> bool {
        self.group.changed()
    }

    /// Returns `(prior, requested)` when this update is a genuine explicit
    /// reorder: a target index was named, the persisted index is present,
    /// and the group key is not changing in the same event. Group
    /// reassignment takes precedence; a requested index that rides along
    /// with a group move is ignored and the record appends to the new group
    /// instead. An absent persisted index means there is nothing to
    /// reconcile and the request is dropped.
    pub fn reorder_request(&self) -> Option<(i64, i64)> {
        if self.group_changed() {
            return None;
        }
        match (self.prior_sort, self.requested_sort) {
            (Some(prior), Some(requested)) => Some((prior, requested)),
            _ => None,
        }
    }
}

/// Ordering engine bound to one sortable table profile.
#[derive(Debug)]
pub struct OrderingEngine {
    profile: SortProfile,
}

impl OrderingEngine {
    /// Creates an engine for the given table profile.
    pub fn new(profile: SortProfile) -> Self {
        Self { profile }
    }

    /// Returns the profile the engine was built with.
    pub fn profile(&self) -> &SortProfile {
        &self.profile
    }

    /// Runs before a new record is persisted: computes the position it must
    /// be inserted with. New records always land at the end of their group.
    ///
    /// Empty group yields `0`; otherwise `max + 1`. One aggregate read, no
    /// other rows touched.
    pub fn before_create(&self, conn: &Connection, group: Option<Uuid>) -> OrderResult<i64> {
        self.append_position(conn, group)
    }

    /// Computes the append position for a record entering `group`.
    ///
    /// Empty group yields `0`; otherwise `max + 1`. Rows with a NULL sort
    /// index (tombstoned or mid-event vacated) are ignored by the aggregate.
    fn append_position(&self, conn: &Connection, group: Option<Uuid>) -> OrderResult<i64> {
        let sql = format!(
            "SELECT COALESCE(MAX(sort_order), -1) + 1
             FROM {table}
             WHERE {group_pred}{active};",
            table = self.profile.table,
            group_pred = self.group_predicate("?1"),
            active = self.active_predicate(),
        );
        let next = conn.query_row(&sql, [group_text(group)], |row| row.get(0))?;
        Ok(next)
    }

    /// Runs the pre-persist half of an update event.
    ///
    /// Explicit reorder: validates the target, vacates the mover's slot, and
    /// applies the bulk range shift; the caller then persists the requested
    /// index itself. Group reassignment: vacates the slot and closes the gap
    /// in the departure group; when the prior sort index is absent there is
    /// nothing to reconcile and the shift logic is skipped.
    pub fn before_update(&self, conn: &Connection, snapshot: &OrderSnapshot) -> OrderResult<()> {
        if let Some((prior, requested)) = snapshot.reorder_request() {
            self.validate_sort_index(conn, snapshot.group.next, Some(prior), requested)?;
            self.clear_slot(conn, snapshot.id)?;
            self.shift_range(conn, snapshot.group.next, prior, requested)?;
        }

        if snapshot.group_changed() {
            match snapshot.prior_sort {
                Some(prior_sort) => {
                    self.clear_slot(conn, snapshot.id)?;
                    self.close_gap(conn, snapshot.group.prior, prior_sort)?;
                }
                None => {
                    debug!(
                        "event=order_departure module=order status=skipped table={} id={} reason=no_prior_sort",
                        self.profile.table, snapshot.id
                    );
                }
            }
        }

        Ok(())
    }

    /// Runs the post-persist half of an update event.
    ///
    /// After a group reassignment the mover carries a NULL sort index, so the
    /// arrival group's aggregate excludes it; the record appends at the end.
    pub fn after_update(&self, conn: &Connection, snapshot: &OrderSnapshot) -> OrderResult<()> {
        if !snapshot.group_changed() {
            return Ok(());
        }
        let position = self.append_position(conn, snapshot.group.next)?;
        self.assign_slot(conn, snapshot.id, position)
    }

    /// Runs before a record is tombstoned (or physically removed by the
    /// store when the profile has no soft-delete capability).
    ///
    /// Vacates the slot for soft-deletable records and closes the gap above
    /// the captured position. Absent prior sort means nothing to reconcile.
    pub fn before_delete(
        &self,
        conn: &Connection,
        id: Uuid,
        group: Option<Uuid>,
        prior_sort: Option<i64>,
    ) -> OrderResult<()> {
        let Some(prior_sort) = prior_sort else {
            debug!(
                "event=order_delete module=order status=skipped table={} id={} reason=no_prior_sort",
                self.profile.table, id
            );
            return Ok(());
        };

        if self.profile.soft_delete {
            self.clear_slot(conn, id)?;
        }
        self.close_gap(conn, group, prior_sort)
    }

    /// Runs after a tombstoned record was restored.
    ///
    /// Re-appends at the end of the record's current group, never at the
    /// original position. No-op for profiles without soft-delete capability.
    pub fn after_restore(
        &self,
        conn: &Connection,
        id: Uuid,
        group: Option<Uuid>,
    ) -> OrderResult<()> {
        if !self.profile.soft_delete {
            return Ok(());
        }
        let position = self.append_position(conn, group)?;
        self.assign_slot(conn, id, position)
    }

    /// Returns whether `requested` is an acceptable reorder target.
    ///
    /// Rejects negative indices, no-op reorders (`requested` equals the
    /// prior persisted index, absent prior coercing to 0), and targets past
    /// the end of the group (`requested > max`, except that a group whose
    /// max is 0 accepts any remaining candidate).
    pub fn can_update_sort(
        &self,
        conn: &Connection,
        group: Option<Uuid>,
        prior_sort: Option<i64>,
        requested: i64,
    ) -> OrderResult<bool> {
        if requested < 0 {
            return Ok(false);
        }
        if requested == prior_sort.unwrap_or(0) {
            return Ok(false);
        }

        let max = self.max_sort_order(conn, group)?;
        Ok(max == 0 || requested <= max)
    }

    /// Validates a requested reorder target, surfacing a field-level error
    /// naming [`SORT_ORDER_FIELD`] on rejection. No store mutation happens
    /// on the failure path.
    pub fn validate_sort_index(
        &self,
        conn: &Connection,
        group: Option<Uuid>,
        prior_sort: Option<i64>,
        requested: i64,
    ) -> OrderResult<()> {
        if !self.can_update_sort(conn, group, prior_sort, requested)? {
            return Err(OrderingError::InvalidSortIndex {
                field: SORT_ORDER_FIELD,
                requested,
            });
        }
        Ok(())
    }

    fn max_sort_order(&self, conn: &Connection, group: Option<Uuid>) -> OrderResult<i64> {
        let sql = format!(
            "SELECT COALESCE(MAX(sort_order), 0)
             FROM {table}
             WHERE {group_pred}{active};",
            table = self.profile.table,
            group_pred = self.group_predicate("?1"),
            active = self.active_predicate(),
        );
        let max = conn.query_row(&sql, [group_text(group)], |row| row.get(0))?;
        Ok(max)
    }

    /// Transiently clears the record's own slot so range predicates can
    /// never match the mover itself.
    fn clear_slot(&self, conn: &Connection, id: Uuid) -> OrderResult<()> {
        let sql = format!(
            "UPDATE {table}
             SET sort_order = NULL,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE {id_column} = ?1;",
            table = self.profile.table,
            id_column = self.profile.id_column,
        );
        conn.execute(&sql, [id.to_string()])?;
        Ok(())
    }

    fn assign_slot(&self, conn: &Connection, id: Uuid, position: i64) -> OrderResult<()> {
        let sql = format!(
            "UPDATE {table}
             SET sort_order = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE {id_column} = ?1;",
            table = self.profile.table,
            id_column = self.profile.id_column,
        );
        conn.execute(&sql, params![id.to_string(), position])?;
        debug!(
            "event=order_append module=order status=ok table={} id={} sort_order={}",
            self.profile.table, id, position
        );
        Ok(())
    }

    /// Applies the single bulk shift that vacates the target slot.
    ///
    /// Moving down decrements `prior < sort_order <= requested`; moving up
    /// increments `requested <= sort_order < prior`. Bounded to non-NULL,
    /// active rows of the group, so the shifted values stay inside the
    /// vacated range and the statement is collision-free.
    fn shift_range(
        &self,
        conn: &Connection,
        group: Option<Uuid>,
        prior: i64,
        requested: i64,
    ) -> OrderResult<()> {
        let (operator, requested_bound, prior_bound, direction) = if requested > prior {
            ("-", "<=", ">", "down")
        } else {
            ("+", ">=", "<", "up")
        };

        let sql = format!(
            "UPDATE {table}
             SET sort_order = sort_order {operator} 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE {group_pred}
               AND sort_order IS NOT NULL
               AND sort_order {requested_bound} ?2
               AND sort_order {prior_bound} ?3{active};",
            table = self.profile.table,
            group_pred = self.group_predicate("?1"),
            active = self.active_predicate(),
        );
        let shifted = conn.execute(&sql, params![group_text(group), requested, prior])?;
        debug!(
            "event=order_shift module=order status=ok table={} direction={} from={} to={} rows={}",
            self.profile.table, direction, prior, requested, shifted
        );
        Ok(())
    }

    /// Closes the single-slot gap left above a departed or tombstoned row.
    fn close_gap(
        &self,
        conn: &Connection,
        group: Option<Uuid>,
        prior_sort: i64,
    ) -> OrderResult<()> {
        let sql = format!(
            "UPDATE {table}
             SET sort_order = sort_order - 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE {group_pred}
               AND sort_order IS NOT NULL
               AND sort_order > ?2{active};",
            table = self.profile.table,
            group_pred = self.group_predicate("?1"),
            active = self.active_predicate(),
        );
        let shifted = conn.execute(&sql, params![group_text(group), prior_sort])?;
        debug!(
            "event=order_close_gap module=order status=ok table={} above={} rows={}",
            self.profile.table, prior_sort, shifted
        );
        Ok(())
    }

    /// Group equality predicate that also matches the NULL group when the
    /// bound parameter is NULL.
    fn group_predicate(&self, param: &str) -> String {
        format!(
            "(({param} IS NULL AND {column} IS NULL) OR {column} = {param})",
            column = self.profile.group_column,
        )
    }

    /// Explicit tombstone filter appended to every ordering predicate for
    /// soft-deletable record types.
    fn active_predicate(&self) -> &'static str {
        if self.profile.soft_delete {
            " AND is_deleted = 0"
        } else {
            ""
        }
    }
}

fn group_text(group: Option<Uuid>) -> Option<String> {
    group.map(|value| value.to_string())
}
