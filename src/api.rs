//! REST gateway: the typed client for the guard-services backend and the
//! `Backend` trait the engine is written against.
//!
//! The trait is the seam between the reconciliation engine and transport:
//! `ApiClient` implements it over reqwest with bearer-token auth, and the
//! async tests drive the same engine through an in-memory stub. The error
//! taxonomy is flat (transport failure, non-2xx response with the status
//! kept but never branched on, and pre-request validation) since the core
//! treats every failed request the same way.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::{
    Attendance, AttendanceStatus, Identity, Incident, IncidentStatus, Role, Severity, Shift, Site,
    User,
};

/// Per-request deadline; expiry counts as a failed poll/mutation.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request failed with status {0}")]
    Status(StatusCode),
    #[error("{0}")]
    Validation(String),
}

// --- Request bodies (mirror what the backend serializers accept) ---

#[derive(Debug, Clone, Serialize)]
pub struct NewSite {
    pub name: String,
}

/// Patch body for a site; `supervisor_ids` drives supervisor assignment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SitePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_ids: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewShift {
    pub site: u64,
    pub assigned_user: u64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ShiftPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_user: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewIncident {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<u64>,
    pub severity: Severity,
    pub description: String,
}

/// Everything the engine needs from the backend. One method per endpoint;
/// list endpoints return full collections (the poll is a wholesale refresh,
/// not a delta sync).
#[async_trait]
pub trait Backend: Send + Sync {
    async fn whoami(&self) -> Result<Identity, ApiError>;

    async fn list_sites(&self) -> Result<Vec<Site>, ApiError>;
    async fn create_site(&self, body: &NewSite) -> Result<Site, ApiError>;
    async fn update_site(&self, id: u64, body: &SitePatch) -> Result<Site, ApiError>;
    async fn delete_site(&self, id: u64) -> Result<(), ApiError>;

    async fn list_shifts(&self) -> Result<Vec<Shift>, ApiError>;
    async fn create_shift(&self, body: &NewShift) -> Result<Shift, ApiError>;
    async fn update_shift(&self, id: u64, body: &ShiftPatch) -> Result<Shift, ApiError>;
    async fn delete_shift(&self, id: u64) -> Result<(), ApiError>;

    async fn list_users(&self) -> Result<Vec<User>, ApiError>;
    async fn create_user(&self, body: &NewUser) -> Result<User, ApiError>;
    async fn update_user(&self, id: u64, body: &UserPatch) -> Result<User, ApiError>;
    async fn delete_user(&self, id: u64) -> Result<(), ApiError>;

    async fn list_incidents(&self) -> Result<Vec<Incident>, ApiError>;
    async fn create_incident(&self, body: &NewIncident) -> Result<Incident, ApiError>;
    async fn update_incident_status(
        &self,
        id: u64,
        status: IncidentStatus,
    ) -> Result<Incident, ApiError>;

    async fn list_attendance(&self) -> Result<Vec<Attendance>, ApiError>;
    async fn patch_attendance_status(
        &self,
        id: u64,
        status: AttendanceStatus,
    ) -> Result<Attendance, ApiError>;
    async fn check_in(&self, shift_id: u64) -> Result<Attendance, ApiError>;
    async fn check_out(&self, shift_id: u64) -> Result<Attendance, ApiError>;
}

/// Reqwest-backed `Backend`: JSON over HTTP, bearer token on every request.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base: String,
    token: String,
}

impl ApiClient {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(ApiClient {
            client,
            base: base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn send<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let mut req = self
            .client
            .request(method, self.url(path))
            .bearer_auth(&self.token);
        if let Some(body) = body {
            req = req.json(body);
        }
        let res = req.send().await?;
        if !res.status().is_success() {
            return Err(ApiError::Status(res.status()));
        }
        Ok(res.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(Method::GET, path, None::<&()>).await
    }

    /// DELETE returns an empty body on success; only the status matters.
    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let res = self
            .client
            .delete(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(ApiError::Status(res.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn whoami(&self) -> Result<Identity, ApiError> {
        self.get("/whoami/").await
    }

    async fn list_sites(&self) -> Result<Vec<Site>, ApiError> {
        self.get("/sites/").await
    }

    async fn create_site(&self, body: &NewSite) -> Result<Site, ApiError> {
        self.send(Method::POST, "/sites/", Some(body)).await
    }

    async fn update_site(&self, id: u64, body: &SitePatch) -> Result<Site, ApiError> {
        self.send(Method::PATCH, &format!("/sites/{id}/"), Some(body))
            .await
    }

    async fn delete_site(&self, id: u64) -> Result<(), ApiError> {
        self.delete(&format!("/sites/{id}/")).await
    }

    async fn list_shifts(&self) -> Result<Vec<Shift>, ApiError> {
        self.get("/shifts/").await
    }

    async fn create_shift(&self, body: &NewShift) -> Result<Shift, ApiError> {
        self.send(Method::POST, "/shifts/", Some(body)).await
    }

    async fn update_shift(&self, id: u64, body: &ShiftPatch) -> Result<Shift, ApiError> {
        self.send(Method::PATCH, &format!("/shifts/{id}/"), Some(body))
            .await
    }

    async fn delete_shift(&self, id: u64) -> Result<(), ApiError> {
        self.delete(&format!("/shifts/{id}/")).await
    }

    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.get("/users/").await
    }

    async fn create_user(&self, body: &NewUser) -> Result<User, ApiError> {
        self.send(Method::POST, "/users/", Some(body)).await
    }

    async fn update_user(&self, id: u64, body: &UserPatch) -> Result<User, ApiError> {
        self.send(Method::PATCH, &format!("/users/{id}/"), Some(body))
            .await
    }

    async fn delete_user(&self, id: u64) -> Result<(), ApiError> {
        self.delete(&format!("/users/{id}/")).await
    }

    async fn list_incidents(&self) -> Result<Vec<Incident>, ApiError> {
        self.get("/incidents/").await
    }

    async fn create_incident(&self, body: &NewIncident) -> Result<Incident, ApiError> {
        self.send(Method::POST, "/incidents/", Some(body)).await
    }

    async fn update_incident_status(
        &self,
        id: u64,
        status: IncidentStatus,
    ) -> Result<Incident, ApiError> {
        self.send(
            Method::POST,
            &format!("/incidents/{id}/update_status/"),
            Some(&json!({ "status": status })),
        )
        .await
    }

    async fn list_attendance(&self) -> Result<Vec<Attendance>, ApiError> {
        self.get("/attendance/").await
    }

    async fn patch_attendance_status(
        &self,
        id: u64,
        status: AttendanceStatus,
    ) -> Result<Attendance, ApiError> {
        self.send(
            Method::PATCH,
            &format!("/attendance/{id}/"),
            Some(&json!({ "status": status })),
        )
        .await
    }

    async fn check_in(&self, shift_id: u64) -> Result<Attendance, ApiError> {
        self.send(
            Method::POST,
            "/attendance/check_in/",
            Some(&json!({ "shift": shift_id })),
        )
        .await
    }

    async fn check_out(&self, shift_id: u64) -> Result<Attendance, ApiError> {
        self.send(
            Method::POST,
            "/attendance/check_out/",
            Some(&json!({ "shift": shift_id })),
        )
        .await
    }
}
