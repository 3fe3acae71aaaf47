use chrono::{NaiveDate, NaiveTime};

use crate::model::{Ms, RoomState, TimeRange, Weekday};

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

pub(crate) fn validate_range(range: &TimeRange) -> Result<(), EngineError> {
    if range.start >= range.end {
        return Err(EngineError::InvalidArgument("start must be before end"));
    }
    Ok(())
}

/// The requested slot must fall entirely inside the room's open window for
/// that weekday.
pub(crate) fn check_within_window(
    room: &RoomState,
    date: NaiveDate,
    range: &TimeRange,
) -> Result<(), EngineError> {
    match room.window_for(Weekday::from_date(date)) {
        Some(w) if w.range().contains(range) => Ok(()),
        _ => Err(EngineError::InvalidArgument(
            "slot is outside the room's opening hours",
        )),
    }
}

/// Reject if any pending/accepted reservation on the same room and date
/// overlaps the requested `[start, end)`.
///
/// The caller holds the room's write lock across this check and the
/// subsequent insert, which serializes concurrent booking attempts per room.
pub(crate) fn check_no_conflict(
    room: &RoomState,
    date: NaiveDate,
    range: &TimeRange,
) -> Result<(), EngineError> {
    for existing in room.reservations_on(date) {
        if existing.status.blocks() && existing.range.overlaps(range) {
            return Err(EngineError::Conflict(existing.id));
        }
    }
    Ok(())
}

/// Parse an ISO `YYYY-MM-DD` date at the API boundary.
pub fn parse_date(s: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| EngineError::InvalidArgument("malformed date, expected YYYY-MM-DD"))
}

/// Parse a `HH:MM` time of day at the API boundary.
pub fn parse_time(s: &str) -> Result<NaiveTime, EngineError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| EngineError::InvalidArgument("malformed time, expected HH:MM"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso() {
        assert_eq!(
            parse_date("2025-06-02").unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
        );
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(matches!(
            parse_date("02/06/2025"),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_date("2025-13-40"),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn parse_time_accepts_hh_mm() {
        assert_eq!(
            parse_time("08:30").unwrap(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap()
        );
    }

    #[test]
    fn parse_time_rejects_garbage() {
        assert!(matches!(
            parse_time("25:00"),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_time("9h30"),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn inverted_range_is_invalid() {
        let r = TimeRange {
            start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        };
        assert!(matches!(
            validate_range(&r),
            Err(EngineError::InvalidArgument(_))
        ));
    }
}
