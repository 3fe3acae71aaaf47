//! Reservation core for a coworking / room-rental platform.
//!
//! The engine owns buildings, rooms, weekly opening-hour templates, users and
//! the reservation ledger, persisted through an event-sourced write-ahead
//! log. It enforces the booking invariants: no two pending/accepted
//! reservations on the same room and date may overlap, requested slots must
//! fall inside the weekday's open window, and the status lifecycle only
//! moves `pending → accepted | declined | cancelled` and
//! `accepted → cancelled`.
//!
//! Transport, credential verification and notification delivery are the
//! embedding service's business; mutating calls take a trusted
//! [`model::Actor`] from whatever authentication layer sits above.

pub mod config;
pub mod engine;
pub mod limits;
pub mod maintenance;
pub mod model;
pub mod notify;
pub mod observability;
pub mod wal;

pub use config::EngineConfig;
pub use engine::{Engine, EngineError};
