//! Filter/search engine: pure predicate composition over snapshot
//! collections, plus pagination.
//!
//! Filters AND together; an unset field matches everything. Text search is a
//! case-insensitive substring match. Nothing here mutates the store; results
//! are fresh vectors in the collection's original order.

use crate::models::{Attendance, Incident, IncidentStatus, Severity};
use crate::status::{attendance_display_status, ShiftStatus};

pub const PAGE_SIZE: usize = 10;

/// Incident list filters: severity and status equality, site-name equality,
/// free-text search over description and site name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentFilter {
    pub severity: Option<Severity>,
    pub status: Option<IncidentStatus>,
    pub site_name: Option<String>,
    pub query: Option<String>,
}

impl IncidentFilter {
    pub fn matches(&self, incident: &Incident) -> bool {
        if let Some(severity) = self.severity {
            if incident.severity != severity {
                return false;
            }
        }
        if let Some(status) = self.status {
            if incident.status != status {
                return false;
            }
        }
        if let Some(site_name) = &self.site_name {
            if incident.site_name.as_deref() != Some(site_name.as_str()) {
                return false;
            }
        }
        if let Some(query) = &self.query {
            let q = query.to_lowercase();
            let in_description = incident.description.to_lowercase().contains(&q);
            let in_site = incident
                .site_name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&q));
            if !in_description && !in_site {
                return false;
            }
        }
        true
    }
}

pub fn filter_incidents(incidents: &[Incident], filter: &IncidentFilter) -> Vec<Incident> {
    incidents
        .iter()
        .filter(|i| filter.matches(i))
        .cloned()
        .collect()
}

/// Attendance log filters. Status matches the *display* status, so a
/// checked-out pending record is found under "complete" like the portals
/// show it; the query searches the guard's name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceFilter {
    pub status: Option<ShiftStatus>,
    pub site_name: Option<String>,
    pub query: Option<String>,
}

impl AttendanceFilter {
    pub fn matches(&self, record: &Attendance) -> bool {
        if let Some(status) = self.status {
            if attendance_display_status(record) != status {
                return false;
            }
        }
        if let Some(site_name) = &self.site_name {
            if record.site_name.as_deref() != Some(site_name.as_str()) {
                return false;
            }
        }
        if let Some(query) = &self.query {
            let q = query.to_lowercase();
            let matched = record
                .user_name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&q));
            if !matched {
                return false;
            }
        }
        true
    }
}

pub fn filter_attendance(records: &[Attendance], filter: &AttendanceFilter) -> Vec<Attendance> {
    records
        .iter()
        .filter(|a| filter.matches(a))
        .cloned()
        .collect()
}

/// One resolved page over a filtered sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Clamped page index, 1-based.
    pub page: usize,
    /// Always at least 1, even for an empty result.
    pub total_pages: usize,
    pub start: usize,
    pub end: usize,
}

/// Resolve a requested page against the current filtered length. The index
/// clamps to `[1, ceil(len/per_page)]`, so when the filtered count shrinks
/// below the current page's start the caller lands on the last real page
/// instead of an empty one.
pub fn paginate(len: usize, requested_page: usize, per_page: usize) -> Page {
    let per_page = per_page.max(1);
    let total_pages = len.div_ceil(per_page).max(1);
    let page = requested_page.clamp(1, total_pages);
    let start = (page - 1) * per_page;
    let end = (start + per_page).min(len);
    Page {
        page,
        total_pages,
        start,
        end,
    }
}

pub fn page_slice<'a, T>(items: &'a [T], page: &Page) -> &'a [T] {
    &items[page.start..page.end]
}
