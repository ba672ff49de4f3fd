//! Track repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD and lifecycle APIs over `tracks` storage.
//! - Keep SQL details and ordering behavior inside the repository boundary.
//! - Run each create/update/delete/restore as one Immediate transaction with
//!   the ordering engine's entry points wired at the defined positions.
//!
//! # Invariants
//! - `sort_order` is never taken from the caller: creation appends via the
//!   engine, updates persist a requested index only after the engine has
//!   validated it and vacated the target slot.
//! - Only active (`is_deleted=0`) rows are returned by default.
//! - Listing is deterministic: `sort_order ASC, uuid ASC`.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::track::{PlaylistId, Track, TrackId, TrackValidationError};
use crate::order::{FieldDelta, OrderSnapshot, OrderingEngine, OrderingError, SortProfile};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TRACK_SELECT_SQL: &str = "SELECT
    uuid,
    playlist_uuid,
    title,
    sort_order,
    is_deleted,
    created_at,
    updated_at
FROM tracks";

/// Result type used by track repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from track repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Model-level validation rejected the write.
    Validation(TrackValidationError),
    /// Ordering engine rejected a reorder or failed a store call.
    Ordering(OrderingError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target track does not exist (or is tombstoned where an active row is
    /// required).
    NotFound(TrackId),
    /// Restore was requested for a track that is not tombstoned.
    NotDeleted(TrackId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Ordering(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "track not found: {id}"),
            Self::NotDeleted(id) => write!(f, "track is not deleted: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "track repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "track repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "track repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted track data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Ordering(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TrackValidationError> for RepoError {
    fn from(value: TrackValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<OrderingError> for RepoError {
    fn from(value: OrderingError) -> Self {
        Self::Ordering(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Explicit-diff update request: only named fields are persisted.
///
/// `playlist` is doubly optional: the outer `Option` means "this update
/// touches the playlist", the inner one is the new group value (with `None`
/// meaning the unfiled queue). `sort_order` names a requested target index;
/// naming the current index is a no-op request and fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackUpdate {
    pub id: TrackId,
    pub title: Option<String>,
    pub playlist: Option<Option<PlaylistId>>,
    pub sort_order: Option<i64>,
}

impl TrackUpdate {
    /// Creates an empty update for one track.
    pub fn new(id: TrackId) -> Self {
        Self {
            id,
            title: None,
            playlist: None,
            sort_order: None,
        }
    }
}

/// Repository interface for track lifecycle operations.
pub trait TrackRepository {
    /// Persists one new track at the end of its playlist.
    fn create_track(&self, track: &Track) -> RepoResult<Track>;
    /// Loads one track by id.
    fn get_track(&self, id: TrackId, include_deleted: bool) -> RepoResult<Option<Track>>;
    /// Lists tracks of one playlist in stable order.
    fn list_tracks(
        &self,
        playlist: Option<PlaylistId>,
        include_deleted: bool,
    ) -> RepoResult<Vec<Track>>;
    /// Applies an explicit-diff update (rename, reorder, playlist move).
    fn update_track(&self, update: &TrackUpdate) -> RepoResult<Track>;
    /// Tombstones one active track and compacts its playlist.
    fn soft_delete_track(&self, id: TrackId) -> RepoResult<()>;
    /// Restores one tombstoned track at the end of its playlist.
    fn restore_track(&self, id: TrackId) -> RepoResult<Track>;
}

/// SQLite-backed track repository.
#[derive(Debug)]
pub struct SqliteTrackRepository<'conn> {
    conn: &'conn Connection,
    engine: OrderingEngine,
}

fn track_sort_profile() -> SortProfile {
    SortProfile {
        group_column: "playlist_uuid",
        soft_delete: true,
        ..SortProfile::new("tracks")
    }
}

impl<'conn> SqliteTrackRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_track_connection_ready(conn)?;
        Ok(Self {
            conn,
            engine: OrderingEngine::new(track_sort_profile()),
        })
    }
}

impl TrackRepository for SqliteTrackRepository<'_> {
    fn create_track(&self, track: &Track) -> RepoResult<Track> {
        track.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let sort_order = self.engine.before_create(&tx, track.playlist_uuid)?;
        tx.execute(
            "INSERT INTO tracks (
                uuid,
                playlist_uuid,
                title,
                sort_order,
                is_deleted
            ) VALUES (?1, ?2, ?3, ?4, 0);",
            params![
                track.uuid.to_string(),
                track.playlist_uuid.map(|value| value.to_string()),
                track.title.as_str(),
                sort_order,
            ],
        )?;
        tx.commit()?;

        load_required_track(self.conn, track.uuid)
    }

    fn get_track(&self, id: TrackId, include_deleted: bool) -> RepoResult<Option<Track>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TRACK_SELECT_SQL}
             WHERE uuid = ?1
               AND (?2 = 1 OR is_deleted = 0);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_track_row(row)?));
        }
        Ok(None)
    }

    fn list_tracks(
        &self,
        playlist: Option<PlaylistId>,
        include_deleted: bool,
    ) -> RepoResult<Vec<Track>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TRACK_SELECT_SQL}
             WHERE ((?1 IS NULL AND playlist_uuid IS NULL) OR playlist_uuid = ?1)
               AND (?2 = 1 OR is_deleted = 0)
             ORDER BY sort_order ASC, uuid ASC;"
        ))?;

        let mut rows = stmt.query(params![
            playlist.map(|value| value.to_string()),
            bool_to_int(include_deleted),
        ])?;

        let mut tracks = Vec::new();
        while let Some(row) = rows.next()? {
            tracks.push(parse_track_row(row)?);
        }
        Ok(tracks)
    }

    fn update_track(&self, update: &TrackUpdate) -> RepoResult<Track> {
        let prior = self
            .get_track(update.id, true)?
            .ok_or(RepoError::NotFound(update.id))?;

        if let Some(title) = &update.title {
            if title.trim().is_empty() {
                return Err(TrackValidationError::BlankTitle.into());
            }
        }

        let snapshot = OrderSnapshot {
            id: update.id,
            group: FieldDelta {
                prior: prior.playlist_uuid,
                next: update.playlist.unwrap_or(prior.playlist_uuid),
            },
            prior_sort: prior.sort_order,
            requested_sort: update.sort_order,
        };

        // Tombstoned rows hold no slot, so there is no ordering to maintain
        // for them; a playlist change on one simply retargets where a later
        // restore will append.
        let maintain_order = prior.is_active();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if maintain_order {
            self.engine.before_update(&tx, &snapshot)?;
        }

        // Persist exactly the fields this update names. The requested sort
        // index is written only when the engine ran the reorder branch for
        // it; a request dropped by the fail-open path must not land raw.
        if let Some(title) = &update.title {
            tx.execute(
                "UPDATE tracks
                 SET title = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                params![update.id.to_string(), title.trim()],
            )?;
        }
        if snapshot.group.changed() {
            tx.execute(
                "UPDATE tracks
                 SET playlist_uuid = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                params![
                    update.id.to_string(),
                    snapshot.group.next.map(|value| value.to_string()),
                ],
            )?;
        }
        if maintain_order {
            if let Some((_, requested)) = snapshot.reorder_request() {
                tx.execute(
                    "UPDATE tracks
                     SET sort_order = ?2,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE uuid = ?1;",
                    params![update.id.to_string(), requested],
                )?;
            }
        }

        if maintain_order {
            self.engine.after_update(&tx, &snapshot)?;
        }
        tx.commit()?;

        load_required_track(self.conn, update.id)
    }

    fn soft_delete_track(&self, id: TrackId) -> RepoResult<()> {
        let prior = self
            .get_track(id, false)?
            .ok_or(RepoError::NotFound(id))?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        self.engine
            .before_delete(&tx, id, prior.playlist_uuid, prior.sort_order)?;
        tx.execute(
            "UPDATE tracks
             SET is_deleted = 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND is_deleted = 0;",
            [id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn restore_track(&self, id: TrackId) -> RepoResult<Track> {
        let prior = self
            .get_track(id, true)?
            .ok_or(RepoError::NotFound(id))?;
        if !prior.is_deleted {
            // Re-appending a row that still occupies a slot would leave a
            // gap at its old position.
            return Err(RepoError::NotDeleted(id));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "UPDATE tracks
             SET is_deleted = 0,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        self.engine.after_restore(&tx, id, prior.playlist_uuid)?;
        tx.commit()?;

        load_required_track(self.conn, id)
    }
}

fn load_required_track(conn: &Connection, id: TrackId) -> RepoResult<Track> {
    let mut stmt = conn.prepare(&format!(
        "{TRACK_SELECT_SQL}
         WHERE uuid = ?1;"
    ))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_track_row(row);
    }
    Err(RepoError::NotFound(id))
}

fn parse_track_row(row: &Row<'_>) -> RepoResult<Track> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = parse_uuid(&uuid_text, "tracks.uuid")?;

    let playlist_uuid = row
        .get::<_, Option<String>>("playlist_uuid")?
        .map(|value| parse_uuid(&value, "tracks.playlist_uuid"))
        .transpose()?;

    let is_deleted = match row.get::<_, i64>("is_deleted")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_deleted value `{other}` in tracks.is_deleted"
            )));
        }
    };

    let track = Track {
        uuid,
        playlist_uuid,
        title: row.get("title")?,
        sort_order: row.get("sort_order")?,
        is_deleted,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    track.validate()?;
    Ok(track)
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_track_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "tracks")? {
        return Err(RepoError::MissingRequiredTable("tracks"));
    }

    for column in [
        "uuid",
        "playlist_uuid",
        "title",
        "sort_order",
        "is_deleted",
        "created_at",
        "updated_at",
    ] {
        if !table_has_column(conn, "tracks", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "tracks",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
