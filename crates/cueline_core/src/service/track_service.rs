//! Track use-case service.
//!
//! # Responsibility
//! - Provide stable create/rename/reorder/move/remove/restore entry points.
//! - Normalize user input above the repository layer.
//! - Map repository errors to use-case errors.
//!
//! # Invariants
//! - Titles are trimmed and must not be blank.
//! - Ordering behavior stays inside the repository/engine boundary; the
//!   service only names the requested change.

use crate::model::track::{PlaylistId, Track, TrackId};
use crate::order::OrderingError;
use crate::repo::track_repo::{RepoError, TrackRepository, TrackUpdate};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from track service operations.
#[derive(Debug)]
pub enum TrackServiceError {
    /// Title is blank after trim.
    InvalidTitle,
    /// Target track does not exist.
    TrackNotFound(TrackId),
    /// Restore was requested for a track that is not tombstoned.
    TrackNotDeleted(TrackId),
    /// Requested reorder target was rejected; carries the offending
    /// attribute name and the rejected index.
    InvalidSortIndex {
        field: &'static str,
        requested: i64,
    },
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for TrackServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "track title must not be blank"),
            Self::TrackNotFound(id) => write!(f, "track not found: {id}"),
            Self::TrackNotDeleted(id) => write!(f, "track is not deleted: {id}"),
            Self::InvalidSortIndex { field, requested } => {
                write!(f, "{field} is invalid: requested index {requested}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TrackServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TrackServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::TrackNotFound(id),
            RepoError::NotDeleted(id) => Self::TrackNotDeleted(id),
            RepoError::Ordering(OrderingError::InvalidSortIndex { field, requested }) => {
                Self::InvalidSortIndex { field, requested }
            }
            other => Self::Repo(other),
        }
    }
}

/// Track service facade.
pub struct TrackService<R: TrackRepository> {
    repo: R,
}

impl<R: TrackRepository> TrackService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one track at the end of the given playlist.
    pub fn create_track(
        &self,
        playlist: Option<PlaylistId>,
        title: impl Into<String>,
    ) -> Result<Track, TrackServiceError> {
        let normalized = normalize_title(title.into())?;
        let track = Track::new(playlist, normalized);
        self.repo.create_track(&track).map_err(Into::into)
    }

    /// Renames one track.
    pub fn rename_track(
        &self,
        id: TrackId,
        title: impl Into<String>,
    ) -> Result<Track, TrackServiceError> {
        let normalized = normalize_title(title.into())?;
        let mut update = TrackUpdate::new(id);
        update.title = Some(normalized);
        self.repo.update_track(&update).map_err(Into::into)
    }

    /// Moves one track to the requested position within its playlist.
    ///
    /// Requesting the current position or a position past the end of the
    /// playlist fails validation and leaves every index unchanged.
    pub fn reorder_track(
        &self,
        id: TrackId,
        target_index: i64,
    ) -> Result<Track, TrackServiceError> {
        let mut update = TrackUpdate::new(id);
        update.sort_order = Some(target_index);
        self.repo.update_track(&update).map_err(Into::into)
    }

    /// Moves one track to the end of another playlist, compacting the
    /// playlist it leaves.
    pub fn move_track(
        &self,
        id: TrackId,
        playlist: Option<PlaylistId>,
    ) -> Result<Track, TrackServiceError> {
        let mut update = TrackUpdate::new(id);
        update.playlist = Some(playlist);
        self.repo.update_track(&update).map_err(Into::into)
    }

    /// Tombstones one track; its playlist is compacted.
    pub fn remove_track(&self, id: TrackId) -> Result<(), TrackServiceError> {
        self.repo.soft_delete_track(id).map_err(Into::into)
    }

    /// Restores one tombstoned track at the end of its playlist.
    pub fn restore_track(&self, id: TrackId) -> Result<Track, TrackServiceError> {
        self.repo.restore_track(id).map_err(Into::into)
    }

    /// Loads one active track.
    pub fn get_track(&self, id: TrackId) -> Result<Option<Track>, TrackServiceError> {
        self.repo.get_track(id, false).map_err(Into::into)
    }

    /// Lists active tracks of one playlist in play order.
    pub fn list_tracks(
        &self,
        playlist: Option<PlaylistId>,
    ) -> Result<Vec<Track>, TrackServiceError> {
        self.repo.list_tracks(playlist, false).map_err(Into::into)
    }
}

fn normalize_title(value: String) -> Result<String, TrackServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TrackServiceError::InvalidTitle);
    }
    Ok(trimmed.to_string())
}
