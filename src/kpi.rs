//! KPI aggregation: pure reduction over a store snapshot.
//!
//! Recomputed whenever shifts, attendance, or incidents change. Generic over
//! the chrono time zone so "today" means the caller's wall-clock calendar
//! date (pass `Local::now()` from a portal, `Utc` timestamps in tests).

use chrono::{DateTime, TimeZone};

use crate::models::{IncidentStatus, ViewMode};
use crate::store::Snapshot;

/// Summary counters shown at the top of every portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Kpis {
    pub on_duty: usize,
    pub today_incidents: usize,
    pub missed_shifts: usize,
    /// Incidents awaiting review. Surfaced on the supervisor portal only,
    /// but computed unconditionally; it is the caller's call what to show.
    pub pending_reviews: usize,
}

/// Compute the KPI counters for one snapshot at one instant.
///
/// The two on-duty definitions are deliberately different and keyed by view:
/// the admin portal counts open attendance records (checked in, not out),
/// the supervisor and guard portals count shifts whose window contains
/// `now`. Unifying them silently would change what each portal reports.
pub fn compute<Tz: TimeZone>(snapshot: &Snapshot, now: DateTime<Tz>, view: ViewMode) -> Kpis {
    let on_duty = match view {
        ViewMode::Admin => snapshot
            .attendance
            .iter()
            .filter(|a| a.check_in_time.is_some() && a.check_out_time.is_none())
            .count(),
        ViewMode::Supervisor | ViewMode::Guard => snapshot
            .shifts
            .iter()
            .filter(|s| s.start <= now && s.end >= now)
            .count(),
    };

    let today = now.date_naive();
    let today_incidents = snapshot
        .incidents
        .iter()
        .filter(|i| i.created_at.with_timezone(&now.timezone()).date_naive() == today)
        .count();

    let missed_shifts = snapshot
        .shifts
        .iter()
        .filter(|s| s.end < now && !snapshot.attendance.iter().any(|a| a.shift == s.id))
        .count();

    let pending_reviews = snapshot
        .incidents
        .iter()
        .filter(|i| i.status == IncidentStatus::Pending)
        .count();

    Kpis {
        on_duty,
        today_incidents,
        missed_shifts,
        pending_reviews,
    }
}
