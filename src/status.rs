//! Status derivation: the single shared implementation of the shift and
//! attendance display-status rules that the admin, supervisor, and guard
//! portals all render.
//!
//! Everything here is a pure function of its inputs. `now` is an explicit
//! parameter, never an ambient clock read, so the rules are deterministic
//! and testable. A derived status is a view over the underlying fields and
//! wall-clock time; it is never persisted or written back to the server.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::models::{Attendance, AttendanceStatus, Shift};

/// Display status for a shift row. Supervisor overrides (late/excused/
/// absent) surface verbatim; the rest are derived from the shift window and
/// check-in/out timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftStatus {
    /// Entirely in the future, nobody expected yet.
    Scheduled,
    /// Window open (or record present) but nothing conclusive happened.
    Pending,
    /// Checked in, not yet checked out.
    Active,
    /// Checked in and out with no supervisor override.
    Complete,
    Late,
    Excused,
    /// Window closed without a check-in, or marked absent by a supervisor.
    Absent,
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShiftStatus::Scheduled => "scheduled",
            ShiftStatus::Pending => "pending",
            ShiftStatus::Active => "active",
            ShiftStatus::Complete => "complete",
            ShiftStatus::Late => "late",
            ShiftStatus::Excused => "excused",
            ShiftStatus::Absent => "absent",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ShiftStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(ShiftStatus::Scheduled),
            "pending" => Ok(ShiftStatus::Pending),
            "active" => Ok(ShiftStatus::Active),
            "complete" => Ok(ShiftStatus::Complete),
            "late" => Ok(ShiftStatus::Late),
            "excused" => Ok(ShiftStatus::Excused),
            "absent" => Ok(ShiftStatus::Absent),
            other => Err(format!("unknown shift status: {other}")),
        }
    }
}

impl From<AttendanceStatus> for ShiftStatus {
    fn from(status: AttendanceStatus) -> Self {
        match status {
            AttendanceStatus::Pending => ShiftStatus::Pending,
            AttendanceStatus::Late => ShiftStatus::Late,
            AttendanceStatus::Excused => ShiftStatus::Excused,
            AttendanceStatus::Absent => ShiftStatus::Absent,
        }
    }
}

/// Derive the display status for one shift.
///
/// `attendance` is the store's attendance collection in store order; the
/// first record referencing the shift wins. Duplicate records for one shift
/// should not occur, but when they do the extras are ignored rather than
/// rejected. Decision order, first match wins:
///
/// 1. correlated record exists:
///    a. checked in, not out            -> active
///    b. checked in and out             -> complete, unless a supervisor
///       override replaced the explicit pending status
///    c. never checked in, window over  -> absent
///    d. otherwise                      -> the explicit status
/// 2. no record:
///    a. window over                    -> absent (missed entirely)
///    b. window open                    -> pending (awaiting check-in)
///    c. window in the future           -> scheduled
///
/// Recompute on every render or tick; the result depends on `now` and must
/// not be cached beyond a single pass.
pub fn shift_status(shift: &Shift, attendance: &[Attendance], now: DateTime<Utc>) -> ShiftStatus {
    let record = attendance.iter().find(|a| a.shift == shift.id);

    if let Some(record) = record {
        return match (record.check_in_time, record.check_out_time) {
            (Some(_), None) => ShiftStatus::Active,
            (Some(_), Some(_)) => {
                if record.status == AttendanceStatus::Pending {
                    ShiftStatus::Complete
                } else {
                    record.status.into()
                }
            }
            (None, _) if shift.end < now => ShiftStatus::Absent,
            (None, _) => record.status.into(),
        };
    }

    if shift.end < now {
        ShiftStatus::Absent
    } else if shift.start <= now {
        ShiftStatus::Pending
    } else {
        ShiftStatus::Scheduled
    }
}

/// Display status for an attendance log row: a checked-out record whose
/// explicit status is still pending reads as complete; anything else shows
/// the explicit status. The one-rule specialization of rule 1.b above.
pub fn attendance_display_status(record: &Attendance) -> ShiftStatus {
    if record.check_out_time.is_some() && record.status == AttendanceStatus::Pending {
        ShiftStatus::Complete
    } else {
        record.status.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn shift(id: u64, start: &str, end: &str) -> Shift {
        Shift {
            id,
            site: Some(1),
            site_name: Some("Gate A".to_string()),
            assigned_user: Some(10),
            assigned_user_name: Some("A. Guard".to_string()),
            start: start.parse().expect("start"),
            end: end.parse().expect("end"),
        }
    }

    fn record(shift_id: u64, check_in: Option<&str>, check_out: Option<&str>) -> Attendance {
        Attendance {
            id: 100 + shift_id,
            shift: shift_id,
            user: Some(10),
            user_name: None,
            site_name: None,
            shift_start: None,
            shift_end: None,
            check_in_time: check_in.map(|t| t.parse().expect("check_in")),
            check_out_time: check_out.map(|t| t.parse().expect("check_out")),
            status: AttendanceStatus::Pending,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn day_shift() -> Shift {
        shift(1, "2024-01-01T08:00:00Z", "2024-01-01T16:00:00Z")
    }

    // Scenario A: window open, no attendance -> awaiting check-in
    #[test]
    fn open_window_without_attendance_is_pending() {
        assert_eq!(shift_status(&day_shift(), &[], noon()), ShiftStatus::Pending);
    }

    // Scenario B: checked in, not out -> on duty
    #[test]
    fn checked_in_without_checkout_is_active() {
        let att = vec![record(1, Some("2024-01-01T08:05:00Z"), None)];
        assert_eq!(shift_status(&day_shift(), &att, noon()), ShiftStatus::Active);
    }

    // Scenario C: both timestamps, explicit status still pending -> complete
    #[test]
    fn checked_out_pending_reads_complete() {
        let att = vec![record(
            1,
            Some("2024-01-01T08:05:00Z"),
            Some("2024-01-01T16:02:00Z"),
        )];
        assert_eq!(
            shift_status(&day_shift(), &att, noon()),
            ShiftStatus::Complete
        );
    }

    // Scenario D: window over, never any attendance -> missed
    #[test]
    fn ended_shift_without_attendance_is_absent() {
        let next_midnight = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(
            shift_status(&day_shift(), &[], next_midnight),
            ShiftStatus::Absent
        );
    }

    #[test]
    fn future_shift_is_scheduled() {
        let s = shift(2, "2024-01-02T08:00:00Z", "2024-01-02T16:00:00Z");
        assert_eq!(shift_status(&s, &[], noon()), ShiftStatus::Scheduled);
    }

    #[test]
    fn supervisor_override_beats_timestamp_derivation() {
        let mut rec = record(
            1,
            Some("2024-01-01T08:45:00Z"),
            Some("2024-01-01T16:00:00Z"),
        );
        rec.status = AttendanceStatus::Late;
        assert_eq!(
            shift_status(&day_shift(), &[rec], noon()),
            ShiftStatus::Late
        );
    }

    #[test]
    fn record_without_checkin_after_window_is_absent() {
        let rec = record(1, None, None);
        let next_day = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(
            shift_status(&day_shift(), &[rec], next_day),
            ShiftStatus::Absent
        );
    }

    #[test]
    fn record_without_checkin_inside_window_shows_explicit_status() {
        let mut rec = record(1, None, None);
        rec.status = AttendanceStatus::Excused;
        assert_eq!(
            shift_status(&day_shift(), &[rec], noon()),
            ShiftStatus::Excused
        );
    }

    #[test]
    fn duplicate_records_use_first_by_store_order() {
        let active = record(1, Some("2024-01-01T08:05:00Z"), None);
        let mut overridden = record(1, None, None);
        overridden.status = AttendanceStatus::Absent;
        // First match wins; the duplicate never panics the deriver.
        assert_eq!(
            shift_status(&day_shift(), &[active.clone(), overridden.clone()], noon()),
            ShiftStatus::Active
        );
        assert_eq!(
            shift_status(&day_shift(), &[overridden, active], noon()),
            ShiftStatus::Absent
        );
    }

    #[test]
    fn inverted_window_stays_deterministic() {
        // start > end is not enforced server-side; nothing sensible can be
        // derived, but the deriver must not panic and must pick one branch.
        let s = shift(3, "2024-01-01T16:00:00Z", "2024-01-01T08:00:00Z");
        assert_eq!(shift_status(&s, &[], noon()), ShiftStatus::Absent);
    }

    #[test]
    fn display_status_completes_checked_out_pending() {
        let rec = record(
            1,
            Some("2024-01-01T08:05:00Z"),
            Some("2024-01-01T16:02:00Z"),
        );
        assert_eq!(attendance_display_status(&rec), ShiftStatus::Complete);
    }

    #[test]
    fn display_status_keeps_explicit_status() {
        let mut rec = record(1, Some("2024-01-01T08:05:00Z"), None);
        assert_eq!(attendance_display_status(&rec), ShiftStatus::Pending);
        rec.status = AttendanceStatus::Excused;
        rec.check_out_time = Some("2024-01-01T16:02:00Z".parse().unwrap());
        assert_eq!(attendance_display_status(&rec), ShiftStatus::Excused);
    }
}
