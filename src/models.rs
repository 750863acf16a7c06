//! Wire types for the guard-services REST API.
//!
//! Every struct mirrors the JSON representation the backend serializers emit.
//! Timestamps are ISO-8601; nullable ones mean "not yet occurred" and must
//! stay `Option` (never epoch zero). Upserts replace whole records, so these
//! types carry every field the server returns.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Supervisor,
    Guard,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Supervisor => write!(f, "supervisor"),
            Role::Guard => write!(f, "guard"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "supervisor" => Ok(Role::Supervisor),
            "guard" => Ok(Role::Guard),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Nested supervisor reference as returned inside a `Site`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SiteSupervisor {
    pub id: u64,
    pub full_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Site {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub supervisors: Vec<SiteSupervisor>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// A scheduled work assignment of one guard to one site over a time window.
/// Site/user references are nullable: the backend keeps shifts alive when
/// either side is deleted. `start < end` is NOT enforced server-side; the
/// status deriver must stay deterministic on malformed windows.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Shift {
    pub id: u64,
    pub site: Option<u64>,
    #[serde(default)]
    pub site_name: Option<String>,
    pub assigned_user: Option<u64>,
    #[serde(default)]
    pub assigned_user_name: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    #[default]
    Pending,
    Late,
    Excused,
    Absent,
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttendanceStatus::Pending => write!(f, "pending"),
            AttendanceStatus::Late => write!(f, "late"),
            AttendanceStatus::Excused => write!(f, "excused"),
            AttendanceStatus::Absent => write!(f, "absent"),
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AttendanceStatus::Pending),
            "late" => Ok(AttendanceStatus::Late),
            "excused" => Ok(AttendanceStatus::Excused),
            "absent" => Ok(AttendanceStatus::Absent),
            other => Err(format!("unknown attendance status: {other}")),
        }
    }
}

/// Check-in/check-out record for one shift. At most one non-deleted record
/// per shift is expected but not enforced; consumers pick the first match by
/// store order. Denormalized `*_name`/`shift_*` fields come straight from
/// the serializer for display.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Attendance {
    pub id: u64,
    pub shift: u64,
    #[serde(default)]
    pub user: Option<u64>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub shift_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shift_end: Option<DateTime<Utc>>,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: AttendanceStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    #[default]
    Pending,
    Reviewed,
    Resolved,
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncidentStatus::Pending => write!(f, "pending"),
            IncidentStatus::Reviewed => write!(f, "reviewed"),
            IncidentStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(IncidentStatus::Pending),
            "reviewed" => Ok(IncidentStatus::Reviewed),
            "resolved" => Ok(IncidentStatus::Resolved),
            other => Err(format!("unknown incident status: {other}")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Incident {
    pub id: u64,
    #[serde(default)]
    pub shift: Option<u64>,
    #[serde(default)]
    pub site: Option<u64>,
    #[serde(default)]
    pub site_name: Option<String>,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub status: IncidentStatus,
    pub created_at: DateTime<Utc>,
}

/// The `whoami` payload. Authoritative for role-based behavior; any
/// client-held role claim is only a hint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: u64,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

/// Which portal the session is serving. KPI definitions and poll cadence
/// differ per view, so the mode is an explicit parameter instead of three
/// copies of the same logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Admin,
    Supervisor,
    Guard,
}

impl ViewMode {
    /// Poll cadence per portal. Policy values, not structural ones.
    pub fn poll_interval(self) -> Duration {
        match self {
            ViewMode::Admin => Duration::from_secs(15),
            ViewMode::Supervisor => Duration::from_secs(30),
            ViewMode::Guard => Duration::from_secs(20),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Admin => write!(f, "admin"),
            ViewMode::Supervisor => write!(f, "supervisor"),
            ViewMode::Guard => write!(f, "guard"),
        }
    }
}

impl From<Role> for ViewMode {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => ViewMode::Admin,
            Role::Supervisor => ViewMode::Supervisor,
            Role::Guard => ViewMode::Guard,
        }
    }
}
