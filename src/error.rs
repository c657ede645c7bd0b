use thiserror::Error;

use crate::db;
use crate::schedule::Conflict;

/// Failures of scheduling, booking and calendar operations.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Pre-write check found the teacher committed elsewhere.
    #[error("{} scheduling conflict(s)", .0.len())]
    Conflict(Vec<Conflict>),

    /// The store rejected a write on a uniqueness constraint.
    #[error("slot already taken in {table}")]
    SlotTaken { table: &'static str },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    ConfirmationRequired(&'static str),

    #[error("{0} is still referenced")]
    InUse(&'static str),

    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

impl ScheduleError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "conflict",
            Self::SlotTaken { .. } => "slot_taken",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidInput(_) => "bad_params",
            Self::ConfirmationRequired(_) => "confirmation_required",
            Self::InUse(_) => "in_use",
            Self::Store(_) => "db_query_failed",
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Classifies a failed INSERT/UPDATE against `table`.
    pub fn from_write(table: &'static str, e: rusqlite::Error) -> Self {
        if db::is_unique_violation(&e) {
            Self::SlotTaken { table }
        } else if db::is_foreign_key_violation(&e) {
            Self::InvalidInput(format!("{table}: referenced row does not exist"))
        } else {
            Self::Store(e)
        }
    }

    /// Classifies a failed DELETE of a `what` row.
    pub fn from_delete(what: &'static str, e: rusqlite::Error) -> Self {
        if db::is_foreign_key_violation(&e) {
            Self::InUse(what)
        } else {
            Self::Store(e)
        }
    }
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
