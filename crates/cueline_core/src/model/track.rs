//! Track domain model.
//!
//! # Responsibility
//! - Define the canonical ordered record stored in the `tracks` table.
//! - Provide lifecycle helpers for soft-delete semantics.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another track.
//! - `is_deleted` is the source of truth for tombstone state.
//! - `sort_order` is `None` for tombstoned rows; active rows in one playlist
//!   occupy a dense zero-based sequence maintained by the ordering engine.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a track record.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type TrackId = Uuid;

/// Identifier of the playlist a track belongs to.
///
/// `Option<PlaylistId>` throughout: `None` is the unfiled queue, which is an
/// ordinary ordering group of its own.
pub type PlaylistId = Uuid;

/// Validation errors raised before a track reaches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackValidationError {
    /// Title is blank after trim.
    BlankTitle,
    /// Persisted order index must never be negative.
    NegativeSortOrder(i64),
}

impl Display for TrackValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "track title must not be blank"),
            Self::NegativeSortOrder(value) => {
                write!(f, "track sort_order must not be negative, got {value}")
            }
        }
    }
}

impl Error for TrackValidationError {}

/// Canonical ordered record.
///
/// `sort_order` is assigned and maintained exclusively by the ordering
/// engine; callers never choose it at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Stable global ID used for point reads and targeted order updates.
    pub uuid: TrackId,
    /// Ordering group key. `None` means the unfiled queue.
    pub playlist_uuid: Option<PlaylistId>,
    /// User-facing label.
    pub title: String,
    /// Dense zero-based position within the playlist; `None` while
    /// tombstoned or while the engine has transiently vacated the slot.
    pub sort_order: Option<i64>,
    /// Soft delete tombstone to preserve restore history.
    pub is_deleted: bool,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Track {
    /// Creates a new track with a generated stable ID.
    ///
    /// # Invariants
    /// - `sort_order` starts as `None`; the engine assigns it on insert.
    /// - `is_deleted` starts as `false`.
    pub fn new(playlist_uuid: Option<PlaylistId>, title: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), playlist_uuid, title)
    }

    /// Creates a new track with a caller-provided stable ID.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(
        uuid: TrackId,
        playlist_uuid: Option<PlaylistId>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            uuid,
            playlist_uuid,
            title: title.into(),
            sort_order: None,
            is_deleted: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Checks model-level invariants before persistence.
    ///
    /// # Errors
    /// - `BlankTitle` when the title is empty after trim.
    /// - `NegativeSortOrder` when a negative index is present.
    pub fn validate(&self) -> Result<(), TrackValidationError> {
        if self.title.trim().is_empty() {
            return Err(TrackValidationError::BlankTitle);
        }
        if let Some(sort_order) = self.sort_order {
            if sort_order < 0 {
                return Err(TrackValidationError::NegativeSortOrder(sort_order));
            }
        }
        Ok(())
    }

    /// Marks this track as softly deleted (tombstoned).
    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
        self.sort_order = None;
    }

    /// Clears the soft delete flag; the engine re-appends the row.
    pub fn restore(&mut self) {
        self.is_deleted = false;
    }

    /// Returns whether this track should be considered visible/active.
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}
