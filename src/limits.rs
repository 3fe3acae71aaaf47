//! Guard rails. Exceeding any of these yields `EngineError::LimitExceeded`.

pub const MAX_BUILDINGS: usize = 1_000;
pub const MAX_ROOMS: usize = 10_000;
pub const MAX_USERS: usize = 100_000;
pub const MAX_RESERVATIONS_PER_ROOM: usize = 100_000;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_EMAIL_LEN: usize = 320;
pub const MAX_CATEGORY_LEN: usize = 128;
pub const MAX_NOTES_LEN: usize = 1_024;
