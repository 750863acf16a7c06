//! Client-side engine for the guard-services operations console.
//!
//! The backend stays the single source of truth; this crate keeps a local
//! mirror of its collections fresh (periodic wholesale polls plus targeted
//! reconciliation after each user action) and derives everything the three
//! role views show from that mirror: shift statuses, KPI counters, filtered
//! and paginated lists.
//!
//! Layering, outermost first:
//! - [`sync`] runs the per-view polling cadence against a [`api::Backend`].
//! - [`actions`] is the user-operation surface; it validates, calls the
//!   backend, and reconciles confirmed records into the store.
//! - [`store`] holds the ordered, id-indexed collections and the sequence
//!   tickets that keep stale poll responses from clobbering fresh writes.
//! - [`status`], [`kpi`], and [`filter`] are pure functions over snapshots;
//!   time is always an explicit argument.

pub mod actions;
pub mod api;
pub mod filter;
pub mod kpi;
pub mod models;
pub mod notify;
pub mod status;
pub mod store;
pub mod sync;
