use ulid::Ulid;

use crate::model::ReservationStatus;

/// Error taxonomy of the booking core. Every variant is surfaced to the
/// caller; none is fatal to the process.
#[derive(Debug)]
pub enum EngineError {
    /// Missing room, building, user, or reservation.
    NotFound(Ulid),
    /// Duplicate id, or email already registered (carries the holder's id).
    AlreadyExists(Ulid),
    /// Malformed input: inverted time range, unparseable date/time, or a
    /// requested slot outside the weekly availability window.
    InvalidArgument(&'static str),
    /// The requested slot overlaps an existing pending/accepted reservation
    /// (carries the blocking reservation's id).
    Conflict(Ulid),
    /// Disallowed status transition.
    InvalidState {
        from: ReservationStatus,
        to: ReservationStatus,
    },
    /// Actor is not authorized for the requested operation.
    PermissionDenied(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            EngineError::Conflict(id) => write!(f, "conflicts with reservation: {id}"),
            EngineError::InvalidState { from, to } => {
                write!(f, "invalid transition: {from:?} -> {to:?}")
            }
            EngineError::PermissionDenied(msg) => write!(f, "permission denied: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
