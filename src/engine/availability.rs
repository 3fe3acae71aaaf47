use chrono::NaiveDate;

use crate::model::{RoomState, TimeRange, Weekday};

// ── Availability Resolver ─────────────────────────────────────────

/// Effective open slots of a room on one date: the weekday's window minus
/// every pending/accepted reservation on that date, by interval subtraction
/// (a reservation in the middle of the window splits it).
///
/// Returns ordered, pairwise disjoint sub-intervals; empty means no window
/// for that weekday or fully booked. Pure read, no side effects.
pub fn resolve_day(room: &RoomState, date: NaiveDate) -> Vec<TimeRange> {
    let Some(window) = room.window_for(Weekday::from_date(date)) else {
        return Vec::new();
    };

    // Ledger slice is already sorted by start time.
    let booked: Vec<TimeRange> = room
        .reservations_on(date)
        .iter()
        .filter(|r| r.status.blocks())
        .map(|r| r.range)
        .collect();

    let base = [window.range()];
    if booked.is_empty() {
        return base.to_vec();
    }
    subtract_ranges(&base, &merge_overlapping(&booked))
}

/// Merge sorted overlapping/adjacent ranges into disjoint ranges.
pub fn merge_overlapping(sorted: &[TimeRange]) -> Vec<TimeRange> {
    let mut merged: Vec<TimeRange> = Vec::new();
    for &range in sorted {
        if let Some(last) = merged.last_mut()
            && range.start <= last.end
        {
            last.end = last.end.max(range.end);
            continue;
        }
        merged.push(range);
    }
    merged
}

/// Subtract `to_remove` (sorted, disjoint) from `base` (sorted, disjoint).
pub fn subtract_ranges(base: &[TimeRange], to_remove: &[TimeRange]) -> Vec<TimeRange> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(TimeRange::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(TimeRange::new(current_start, current_end));
        }
    }

    result
}
