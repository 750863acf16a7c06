//! User-action layer: one authenticated view session over the store.
//!
//! Every operation follows the same shape the portals used: validate, call
//! the backend, reconcile the server-confirmed record into the store, emit
//! one notice. Failures are reported through the notice channel and never
//! propagate past this boundary; a failed mutation leaves the store exactly
//! as it was. The server response is the canonical record, so reconciliation
//! is always a whole-record upsert (or a remove for deletions), never a
//! client-side field merge.

use tracing::{info, warn};

use crate::api::{
    ApiError, Backend, NewIncident, NewShift, NewSite, NewUser, ShiftPatch, SitePatch, UserPatch,
};
use crate::models::{
    Attendance, AttendanceStatus, Identity, Incident, IncidentStatus, Shift, Site, User, ViewMode,
};
use crate::notify::Notifier;
use crate::status::{shift_status, ShiftStatus};
use crate::store::{ResourceStore, SharedStore, Snapshot};
use chrono::{DateTime, Utc};

/// Whether the session survives an operation. Deleting the signed-in user's
/// own account ends the session; the caller must force logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Ended,
}

/// One role-scoped console session: backend gateway, shared store, the
/// authenticated identity, and the notice channel.
pub struct Console<B: Backend> {
    backend: B,
    store: SharedStore,
    identity: Identity,
    view: ViewMode,
    notices: Notifier,
}

impl<B: Backend> Console<B> {
    /// Resolve the identity via `whoami`. The server's answer, not any
    /// client-held claim, decides which view this session serves.
    pub async fn connect(
        backend: B,
        store: SharedStore,
        notices: Notifier,
    ) -> Result<Self, ApiError> {
        let identity = backend.whoami().await?;
        let view = ViewMode::from(identity.role);
        info!(email = %identity.email, role = %identity.role, "session established");
        Ok(Console {
            backend,
            store,
            identity,
            view,
            notices,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Read-only copy of the current store contents for the pure layers.
    pub async fn snapshot(&self) -> Snapshot {
        self.store.lock().await.snapshot()
    }

    /// Derived status for every shift in store order, against an explicit
    /// `now`. Recomputed per call; the result must not be cached.
    pub async fn shift_statuses(&self, now: DateTime<Utc>) -> Vec<(Shift, ShiftStatus)> {
        let snapshot = self.snapshot().await;
        snapshot
            .shifts
            .iter()
            .map(|s| (s.clone(), shift_status(s, &snapshot.attendance, now)))
            .collect()
    }

    /// Apply one reconciliation under a single lock, with a fresh ticket so
    /// the mutation outranks any poll already in flight.
    async fn reconcile(&self, apply: impl FnOnce(&mut ResourceStore, u64)) {
        let mut store = self.store.lock().await;
        let ticket = store.ticket();
        apply(&mut store, ticket);
    }

    // --- Attendance ---

    pub async fn check_in(&self, shift_id: u64) -> Option<Attendance> {
        match self.backend.check_in(shift_id).await {
            Ok(record) => {
                self.reconcile(|st, t| {
                    st.attendance.upsert(record.clone(), t);
                })
                .await;
                let at = record
                    .check_in_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown time".to_string());
                self.notices.success(format!("Checked in at {at}"));
                Some(record)
            }
            Err(err) => {
                warn!(shift_id, %err, "check-in failed");
                self.notices.error("Check-in failed");
                None
            }
        }
    }

    pub async fn check_out(&self, shift_id: u64) -> Option<Attendance> {
        match self.backend.check_out(shift_id).await {
            Ok(record) => {
                self.reconcile(|st, t| {
                    st.attendance.upsert(record.clone(), t);
                })
                .await;
                let at = record
                    .check_out_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown time".to_string());
                self.notices.success(format!("Checked out at {at}"));
                Some(record)
            }
            Err(err) => {
                warn!(shift_id, %err, "check-out failed");
                self.notices.error("Check-out failed");
                None
            }
        }
    }

    /// Supervisor override of an attendance record's explicit status.
    pub async fn mark_attendance(
        &self,
        id: u64,
        status: AttendanceStatus,
    ) -> Option<Attendance> {
        match self.backend.patch_attendance_status(id, status).await {
            Ok(record) => {
                self.reconcile(|st, t| {
                    st.attendance.upsert(record.clone(), t);
                })
                .await;
                self.notices.success(format!("Attendance marked as {status}"));
                Some(record)
            }
            Err(err) => {
                warn!(id, %err, "attendance update failed");
                self.notices.error("Failed to update attendance");
                None
            }
        }
    }

    // --- Incidents ---

    /// Validation happens before any request: a blank description never
    /// leaves the client.
    pub async fn submit_incident(&self, body: NewIncident) -> Option<Incident> {
        if body.description.trim().is_empty() {
            self.notices.error("Description required");
            return None;
        }
        match self.backend.create_incident(&body).await {
            Ok(incident) => {
                self.reconcile(|st, t| {
                    st.incidents.upsert(incident.clone(), t);
                })
                .await;
                self.notices.info("Incident submitted (status: pending)");
                Some(incident)
            }
            Err(err) => {
                warn!(%err, "incident submission failed");
                self.notices.error("Failed to submit incident");
                None
            }
        }
    }

    pub async fn review_incident(&self, id: u64, status: IncidentStatus) -> Option<Incident> {
        match self.backend.update_incident_status(id, status).await {
            Ok(incident) => {
                self.reconcile(|st, t| {
                    st.incidents.upsert(incident.clone(), t);
                })
                .await;
                self.notices.success(format!("Incident marked as {status}"));
                Some(incident)
            }
            Err(err) => {
                warn!(id, %err, "incident status update failed");
                self.notices.error("Failed to update incident status");
                None
            }
        }
    }

    // --- Sites ---

    pub async fn create_site(&self, name: impl Into<String>) -> Option<Site> {
        let body = NewSite { name: name.into() };
        match self.backend.create_site(&body).await {
            Ok(site) => {
                self.reconcile(|st, t| {
                    st.sites.upsert(site.clone(), t);
                })
                .await;
                self.notices.success("Site created successfully");
                Some(site)
            }
            Err(err) => {
                warn!(%err, "site creation failed");
                self.notices.error("Failed to create site");
                None
            }
        }
    }

    pub async fn rename_site(&self, id: u64, name: impl Into<String>) -> Option<Site> {
        let body = SitePatch {
            name: Some(name.into()),
            ..Default::default()
        };
        match self.backend.update_site(id, &body).await {
            Ok(site) => {
                self.reconcile(|st, t| {
                    st.sites.upsert(site.clone(), t);
                })
                .await;
                self.notices.success("Site updated");
                Some(site)
            }
            Err(err) => {
                warn!(id, %err, "site update failed");
                self.notices.error("Failed to update site");
                None
            }
        }
    }

    pub async fn assign_supervisors(&self, site_id: u64, supervisor_ids: Vec<u64>) -> Option<Site> {
        let body = SitePatch {
            supervisor_ids: Some(supervisor_ids),
            ..Default::default()
        };
        match self.backend.update_site(site_id, &body).await {
            Ok(site) => {
                self.reconcile(|st, t| {
                    st.sites.upsert(site.clone(), t);
                })
                .await;
                self.notices.success("Supervisors assigned to site");
                Some(site)
            }
            Err(err) => {
                warn!(site_id, %err, "supervisor assignment failed");
                self.notices.error("Failed to assign supervisors");
                None
            }
        }
    }

    pub async fn delete_site(&self, id: u64) -> bool {
        match self.backend.delete_site(id).await {
            Ok(()) => {
                self.reconcile(|st, t| {
                    st.sites.remove(id, t);
                })
                .await;
                self.notices.success("Deleted successfully");
                true
            }
            Err(err) => {
                warn!(id, %err, "site deletion failed");
                self.notices.error("Failed to delete");
                false
            }
        }
    }

    // --- Shifts ---

    pub async fn create_shift(&self, body: NewShift) -> Option<Shift> {
        match self.backend.create_shift(&body).await {
            Ok(shift) => {
                self.reconcile(|st, t| {
                    st.shifts.upsert(shift.clone(), t);
                })
                .await;
                self.notices.success("Shift assigned");
                Some(shift)
            }
            Err(err) => {
                warn!(%err, "shift creation failed");
                self.notices.error("Failed to assign shift");
                None
            }
        }
    }

    pub async fn update_shift(&self, id: u64, body: ShiftPatch) -> Option<Shift> {
        match self.backend.update_shift(id, &body).await {
            Ok(shift) => {
                self.reconcile(|st, t| {
                    st.shifts.upsert(shift.clone(), t);
                })
                .await;
                self.notices.success("Shift updated");
                Some(shift)
            }
            Err(err) => {
                warn!(id, %err, "shift update failed");
                self.notices.error("Failed to update shift");
                None
            }
        }
    }

    pub async fn delete_shift(&self, id: u64) -> bool {
        match self.backend.delete_shift(id).await {
            Ok(()) => {
                self.reconcile(|st, t| {
                    st.shifts.remove(id, t);
                })
                .await;
                self.notices.success("Deleted successfully");
                true
            }
            Err(err) => {
                warn!(id, %err, "shift deletion failed");
                self.notices.error("Failed to delete");
                false
            }
        }
    }

    // --- Users ---

    pub async fn create_user(&self, body: NewUser) -> Option<User> {
        match self.backend.create_user(&body).await {
            Ok(user) => {
                self.reconcile(|st, t| {
                    st.users.upsert(user.clone(), t);
                })
                .await;
                self.notices.success("User created");
                Some(user)
            }
            Err(err) => {
                warn!(%err, "user creation failed");
                self.notices.error("Failed to create user");
                None
            }
        }
    }

    pub async fn update_user(&self, id: u64, body: UserPatch) -> Option<User> {
        match self.backend.update_user(id, &body).await {
            Ok(user) => {
                self.reconcile(|st, t| {
                    st.users.upsert(user.clone(), t);
                })
                .await;
                self.notices.success("User updated");
                Some(user)
            }
            Err(err) => {
                warn!(id, %err, "user update failed");
                self.notices.error("Failed to update user");
                None
            }
        }
    }

    /// Delete a user. When the deleted account is the session's own (by
    /// email, matching the identity the server vouched for), the session is
    /// over and the caller must force logout.
    pub async fn delete_user(&self, id: u64) -> SessionState {
        let email = self
            .store
            .lock()
            .await
            .users
            .get(id)
            .map(|u| u.email.clone());
        match self.backend.delete_user(id).await {
            Ok(()) => {
                self.reconcile(|st, t| {
                    st.users.remove(id, t);
                })
                .await;
                self.notices.success("Deleted successfully");
                if email.as_deref() == Some(self.identity.email.as_str()) {
                    info!("session user deleted itself; forcing logout");
                    self.notices.info("Your account was deleted; signing out");
                    SessionState::Ended
                } else {
                    SessionState::Active
                }
            }
            Err(err) => {
                warn!(id, %err, "user deletion failed");
                self.notices.error("Failed to delete");
                SessionState::Active
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Level;
    use crate::store::ResourceStore;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    /// Mutation-focused stub: confirms create/update calls with canned
    /// server records and can be switched into a failing mode.
    struct MutBackend {
        identity: Identity,
        fail: AtomicBool,
        created: AtomicU64,
    }

    impl MutBackend {
        fn new(identity: Identity) -> Self {
            MutBackend {
                identity,
                fail: AtomicBool::new(false),
                created: AtomicU64::new(100),
            }
        }

        fn gate<T>(&self, value: T) -> Result<T, ApiError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(ApiError::Status(StatusCode::BAD_REQUEST))
            } else {
                Ok(value)
            }
        }

        fn next_id(&self) -> u64 {
            self.created.fetch_add(1, Ordering::SeqCst) + 1
        }
    }

    fn identity() -> Identity {
        Identity {
            id: 1,
            full_name: "Sam Admin".to_string(),
            email: "sam@example.com".to_string(),
            role: Role::Admin,
        }
    }

    fn attendance(shift_id: u64, checked_out: bool) -> Attendance {
        Attendance {
            id: 500 + shift_id,
            shift: shift_id,
            user: Some(1),
            user_name: None,
            site_name: None,
            shift_start: None,
            shift_end: None,
            check_in_time: Some("2024-01-01T08:05:00Z".parse().unwrap()),
            check_out_time: checked_out.then(|| "2024-01-01T16:02:00Z".parse().unwrap()),
            status: AttendanceStatus::Pending,
        }
    }

    use crate::models::Role;

    #[async_trait]
    impl Backend for MutBackend {
        async fn whoami(&self) -> Result<Identity, ApiError> {
            Ok(self.identity.clone())
        }
        async fn list_sites(&self) -> Result<Vec<Site>, ApiError> {
            Ok(vec![])
        }
        async fn create_site(&self, body: &NewSite) -> Result<Site, ApiError> {
            self.gate(Site {
                id: self.next_id(),
                name: body.name.clone(),
                location: String::new(),
                supervisors: vec![],
            })
        }
        async fn update_site(&self, id: u64, body: &SitePatch) -> Result<Site, ApiError> {
            self.gate(Site {
                id,
                name: body.name.clone().unwrap_or_else(|| "unchanged".to_string()),
                location: String::new(),
                supervisors: body
                    .supervisor_ids
                    .clone()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|sid| crate::models::SiteSupervisor {
                        id: sid,
                        full_name: format!("Supervisor {sid}"),
                    })
                    .collect(),
            })
        }
        async fn delete_site(&self, _: u64) -> Result<(), ApiError> {
            self.gate(())
        }
        async fn list_shifts(&self) -> Result<Vec<Shift>, ApiError> {
            Ok(vec![])
        }
        async fn create_shift(&self, body: &NewShift) -> Result<Shift, ApiError> {
            self.gate(Shift {
                id: self.next_id(),
                site: Some(body.site),
                site_name: None,
                assigned_user: Some(body.assigned_user),
                assigned_user_name: None,
                start: body.start,
                end: body.end,
            })
        }
        async fn update_shift(&self, id: u64, body: &ShiftPatch) -> Result<Shift, ApiError> {
            self.gate(Shift {
                id,
                site: body.site,
                site_name: None,
                assigned_user: body.assigned_user,
                assigned_user_name: None,
                start: body.start.unwrap_or_else(|| "2024-01-01T08:00:00Z".parse().unwrap()),
                end: body.end.unwrap_or_else(|| "2024-01-01T16:00:00Z".parse().unwrap()),
            })
        }
        async fn delete_shift(&self, _: u64) -> Result<(), ApiError> {
            self.gate(())
        }
        async fn list_users(&self) -> Result<Vec<User>, ApiError> {
            Ok(vec![])
        }
        async fn create_user(&self, body: &NewUser) -> Result<User, ApiError> {
            self.gate(User {
                id: self.next_id(),
                full_name: body.full_name.clone(),
                email: body.email.clone(),
                role: body.role,
                is_active: true,
            })
        }
        async fn update_user(&self, id: u64, body: &UserPatch) -> Result<User, ApiError> {
            self.gate(User {
                id,
                full_name: body.full_name.clone().unwrap_or_default(),
                email: body.email.clone().unwrap_or_default(),
                role: body.role.unwrap_or(Role::Guard),
                is_active: body.is_active.unwrap_or(true),
            })
        }
        async fn delete_user(&self, _: u64) -> Result<(), ApiError> {
            self.gate(())
        }
        async fn list_incidents(&self) -> Result<Vec<Incident>, ApiError> {
            Ok(vec![])
        }
        async fn create_incident(&self, body: &NewIncident) -> Result<Incident, ApiError> {
            self.gate(Incident {
                id: self.next_id(),
                shift: body.shift,
                site: body.site,
                site_name: None,
                severity: body.severity,
                description: body.description.clone(),
                status: IncidentStatus::Pending,
                created_at: "2024-01-01T09:00:00Z".parse().unwrap(),
            })
        }
        async fn update_incident_status(
            &self,
            id: u64,
            status: IncidentStatus,
        ) -> Result<Incident, ApiError> {
            self.gate(Incident {
                id,
                shift: None,
                site: Some(1),
                site_name: None,
                severity: crate::models::Severity::Low,
                description: "existing".to_string(),
                status,
                created_at: "2024-01-01T09:00:00Z".parse().unwrap(),
            })
        }
        async fn list_attendance(&self) -> Result<Vec<Attendance>, ApiError> {
            Ok(vec![])
        }
        async fn patch_attendance_status(
            &self,
            id: u64,
            status: AttendanceStatus,
        ) -> Result<Attendance, ApiError> {
            let mut rec = attendance(id, false);
            rec.id = id;
            rec.status = status;
            self.gate(rec)
        }
        async fn check_in(&self, shift_id: u64) -> Result<Attendance, ApiError> {
            self.gate(attendance(shift_id, false))
        }
        async fn check_out(&self, shift_id: u64) -> Result<Attendance, ApiError> {
            self.gate(attendance(shift_id, true))
        }
    }

    async fn console() -> (Console<MutBackend>, tokio::sync::mpsc::UnboundedReceiver<crate::notify::Notice>) {
        let store = ResourceStore::shared();
        let (notices, rx) = Notifier::channel();
        let console = Console::connect(MutBackend::new(identity()), store, notices)
            .await
            .expect("connect");
        (console, rx)
    }

    #[tokio::test]
    async fn connect_resolves_view_from_whoami() {
        let (console, _rx) = console().await;
        assert_eq!(console.view(), ViewMode::Admin);
        assert_eq!(console.identity().email, "sam@example.com");
    }

    #[tokio::test]
    async fn check_in_reconciles_server_record_and_notifies() {
        let (console, mut rx) = console().await;
        let record = console.check_in(7).await.expect("check-in succeeds");
        assert_eq!(record.shift, 7);

        let snap = console.snapshot().await;
        assert_eq!(snap.attendance.len(), 1);
        assert_eq!(snap.attendance[0].shift, 7);
        assert_eq!(rx.try_recv().expect("notice").level, Level::Success);

        // Checking in again replaces the same record, no duplicate
        console.check_in(7).await.expect("second check-in");
        assert_eq!(console.snapshot().await.attendance.len(), 1);
    }

    #[tokio::test]
    async fn failed_mutation_leaves_store_untouched() {
        let (console, mut rx) = console().await;
        console.backend.fail.store(true, Ordering::SeqCst);

        assert!(console.check_in(7).await.is_none());
        assert!(console.snapshot().await.attendance.is_empty());
        assert_eq!(rx.try_recv().expect("notice").level, Level::Error);
        assert!(rx.try_recv().is_err(), "exactly one notice");
    }

    #[tokio::test]
    async fn blank_incident_description_is_rejected_before_any_request() {
        let (console, mut rx) = console().await;
        let out = console
            .submit_incident(NewIncident {
                shift: Some(1),
                site: None,
                severity: crate::models::Severity::Low,
                description: "   ".to_string(),
            })
            .await;
        assert!(out.is_none());
        assert!(console.snapshot().await.incidents.is_empty());
        let notice = rx.try_recv().expect("validation notice");
        assert_eq!(notice.level, Level::Error);
        assert_eq!(notice.message, "Description required");
    }

    #[tokio::test]
    async fn deleting_another_user_keeps_the_session() {
        let (console, _rx) = console().await;
        // Seed a colleague in the store
        let colleague = User {
            id: 42,
            full_name: "Riley Guard".to_string(),
            email: "riley@example.com".to_string(),
            role: Role::Guard,
            is_active: true,
        };
        {
            let mut st = console.store.lock().await;
            let t = st.ticket();
            st.users.upsert(colleague, t);
        }
        assert_eq!(console.delete_user(42).await, SessionState::Active);
        assert!(console.snapshot().await.users.is_empty());
    }

    #[tokio::test]
    async fn deleting_own_account_ends_the_session() {
        let (console, _rx) = console().await;
        let me = User {
            id: 1,
            full_name: "Sam Admin".to_string(),
            email: "sam@example.com".to_string(),
            role: Role::Admin,
            is_active: true,
        };
        {
            let mut st = console.store.lock().await;
            let t = st.ticket();
            st.users.upsert(me, t);
        }
        assert_eq!(console.delete_user(1).await, SessionState::Ended);
    }

    #[tokio::test]
    async fn assign_supervisors_replaces_the_site_record() {
        let (console, _rx) = console().await;
        let site = console
            .assign_supervisors(3, vec![10, 11])
            .await
            .expect("assignment succeeds");
        assert_eq!(site.supervisors.len(), 2);
        let snap = console.snapshot().await;
        assert_eq!(snap.sites.len(), 1);
        assert_eq!(snap.sites[0].supervisors[1].id, 11);
    }

    #[tokio::test]
    async fn review_incident_updates_in_place() {
        let (console, _rx) = console().await;
        let created = console
            .submit_incident(NewIncident {
                shift: None,
                site: Some(1),
                severity: crate::models::Severity::Medium,
                description: "Broken gate".to_string(),
            })
            .await
            .expect("created");

        console
            .review_incident(created.id, IncidentStatus::Resolved)
            .await
            .expect("reviewed");
        let snap = console.snapshot().await;
        assert_eq!(snap.incidents.len(), 1, "update replaced, not appended");
        assert_eq!(snap.incidents[0].status, IncidentStatus::Resolved);
    }
}
