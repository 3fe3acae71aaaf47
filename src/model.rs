use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only wall-clock type.
pub type Ms = i64;

/// Day of week for the weekly availability template.
///
/// Kept as a crate-local closed enum (rather than `chrono::Weekday`) so WAL
/// records and public signatures stay under this crate's control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn from_date(date: NaiveDate) -> Self {
        match date.weekday() {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

/// Half-open time-of-day interval `[start, end)` within a single date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        debug_assert!(start < end, "TimeRange start must be before end");
        Self { start, end }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Booking lifecycle. Declined and cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Pending,
    Accepted,
    Declined,
    Cancelled,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Declined | ReservationStatus::Cancelled)
    }

    /// A reservation in this status occupies its slot.
    pub fn blocks(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Accepted)
    }

    /// The full transition table. Everything not listed here is rejected.
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted) | (Pending, Declined) | (Pending, Cancelled) | (Accepted, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Amenity {
    Wifi,
    Projector,
    Whiteboard,
    AirConditioning,
    Tv,
    Kitchen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Owner,
    Tenant,
}

/// Authenticated caller, supplied by the (external) authentication context.
/// The engine trusts it and does not verify credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Ulid,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Building {
    pub id: Ulid,
    pub owner_id: Ulid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub tax_id: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: Ms,
}

/// Descriptive room fields, settable at creation and via update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDescriptor {
    pub name: String,
    pub capacity: u32,
    pub category: String,
    pub price_cents_per_hour: i64,
    pub amenities: BTreeSet<Amenity>,
    /// When set, reservations skip owner approval and are created accepted.
    pub auto_accept: bool,
}

/// One open window of the weekly template. A room holds at most one per
/// weekday; setting a weekday's window supersedes the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyWindow {
    pub id: Ulid,
    pub weekday: Weekday,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl WeeklyWindow {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.open, self.close)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub room_id: Ulid,
    pub tenant_id: Ulid,
    pub date: NaiveDate,
    pub range: TimeRange,
    pub status: ReservationStatus,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

/// Full in-memory state of one room: descriptor, weekly template, and the
/// reservation ledger sorted by `(date, range.start)`.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: Ulid,
    pub building_id: Ulid,
    pub descriptor: RoomDescriptor,
    pub active: bool,
    /// At most one entry per weekday.
    pub windows: Vec<WeeklyWindow>,
    /// Sorted by `(date, range.start)`.
    pub reservations: Vec<Reservation>,
}

impl RoomState {
    pub fn new(id: Ulid, building_id: Ulid, descriptor: RoomDescriptor) -> Self {
        Self {
            id,
            building_id,
            descriptor,
            active: true,
            windows: Vec::new(),
            reservations: Vec::new(),
        }
    }

    pub fn window_for(&self, weekday: Weekday) -> Option<&WeeklyWindow> {
        self.windows.iter().find(|w| w.weekday == weekday)
    }

    /// Upsert the window for its weekday. Returns the replaced window, if any.
    pub fn set_window(&mut self, window: WeeklyWindow) -> Option<WeeklyWindow> {
        let replaced = self.clear_window(window.weekday);
        self.windows.push(window);
        replaced
    }

    pub fn clear_window(&mut self, weekday: Weekday) -> Option<WeeklyWindow> {
        if let Some(pos) = self.windows.iter().position(|w| w.weekday == weekday) {
            Some(self.windows.remove(pos))
        } else {
            None
        }
    }

    /// Insert a reservation maintaining `(date, start)` sort order.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let key = (reservation.date, reservation.range.start);
        let pos = self
            .reservations
            .binary_search_by_key(&key, |r| (r.date, r.range.start))
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    pub fn reservation(&self, id: &Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == *id)
    }

    pub fn reservation_mut(&mut self, id: &Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == *id)
    }

    /// All reservations on `date`, in ascending start order.
    /// Binary search skips every other date in the sorted ledger.
    pub fn reservations_on(&self, date: NaiveDate) -> &[Reservation] {
        let lo = self.reservations.partition_point(|r| r.date < date);
        let hi = self.reservations.partition_point(|r| r.date <= date);
        &self.reservations[lo..hi]
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    BuildingCreated {
        id: Ulid,
        owner_id: Ulid,
        name: String,
    },
    UserRegistered {
        id: Ulid,
        name: String,
        email: String,
        role: Role,
        tax_id: Option<String>,
        phone: Option<String>,
        created_at: Ms,
    },
    UserDeactivated {
        id: Ulid,
    },
    RoomCreated {
        id: Ulid,
        building_id: Ulid,
        descriptor: RoomDescriptor,
    },
    RoomUpdated {
        id: Ulid,
        descriptor: RoomDescriptor,
    },
    RoomRetired {
        id: Ulid,
    },
    WindowSet {
        id: Ulid,
        room_id: Ulid,
        weekday: Weekday,
        open: NaiveTime,
        close: NaiveTime,
    },
    WindowCleared {
        room_id: Ulid,
        weekday: Weekday,
    },
    ReservationCreated {
        id: Ulid,
        room_id: Ulid,
        tenant_id: Ulid,
        date: NaiveDate,
        range: TimeRange,
        status: ReservationStatus,
        total_cents: i64,
        notes: Option<String>,
        created_at: Ms,
    },
    ReservationTransitioned {
        id: Ulid,
        room_id: Ulid,
        status: ReservationStatus,
        at: Ms,
    },
}

// ── Query result types ───────────────────────────────────────────

/// Room descriptor plus identity, without the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: Ulid,
    pub building_id: Ulid,
    pub descriptor: RoomDescriptor,
    pub active: bool,
}
