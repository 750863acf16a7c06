//! In-memory resource store: one ordered, id-indexed collection per entity
//! type, owned by a single authenticated view session.
//!
//! The store is the only mutable state in the engine. It is mutated through
//! exactly two paths: wholesale replacement after a poll (`commit_poll`) and
//! single-record reconciliation after a user mutation (`upsert`/`remove`).
//! Every mutation carries a monotonically increasing ticket; an update whose
//! ticket predates a collection's current sequence is discarded, which is
//! what defends the poll-vs-mutation race the naive last-write-wins scheme
//! leaves open.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::{Attendance, Incident, Shift, Site, User};

/// Entities the store can hold. Ids are server-assigned and unique within
/// one collection.
pub trait Identified {
    fn id(&self) -> u64;
}

impl Identified for Site {
    fn id(&self) -> u64 {
        self.id
    }
}

impl Identified for User {
    fn id(&self) -> u64 {
        self.id
    }
}

impl Identified for Shift {
    fn id(&self) -> u64 {
        self.id
    }
}

impl Identified for Attendance {
    fn id(&self) -> u64 {
        self.id
    }
}

impl Identified for Incident {
    fn id(&self) -> u64 {
        self.id
    }
}

/// Ordered collection with an id index. Order is server/list order and is
/// preserved across upserts so the display layer never reshuffles rows; the
/// index keeps upsert O(1) instead of the scan-then-concat dance.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    records: Vec<T>,
    index: HashMap<u64, usize>,
    seq: u64,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Collection {
            records: Vec::new(),
            index: HashMap::new(),
            seq: 0,
        }
    }
}

impl<T: Identified> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sequence of the last applied mutation.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn get(&self, id: u64) -> Option<&T> {
        self.index.get(&id).map(|&i| &self.records[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.records.iter()
    }

    /// Ordered view of the collection.
    pub fn as_slice(&self) -> &[T] {
        &self.records
    }

    /// Wholesale replacement with server truth (post-poll). Returns false
    /// and leaves the collection untouched when the ticket is stale.
    pub fn replace_all(&mut self, records: Vec<T>, ticket: u64) -> bool {
        if ticket <= self.seq {
            return false;
        }
        self.index = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id(), i))
            .collect();
        self.records = records;
        self.seq = ticket;
        true
    }

    /// Merge one server-confirmed record: overwrite in place when the id
    /// exists (other records keep their relative position), append when it
    /// does not. Whole-record replacement only; partial-field merge would
    /// let client and server representations drift. Idempotent.
    pub fn upsert(&mut self, record: T, ticket: u64) -> bool {
        if ticket <= self.seq {
            return false;
        }
        match self.index.get(&record.id()) {
            Some(&i) => self.records[i] = record,
            None => {
                self.index.insert(record.id(), self.records.len());
                self.records.push(record);
            }
        }
        self.seq = ticket;
        true
    }

    /// Drop the record with the given id, preserving the order of the rest.
    pub fn remove(&mut self, id: u64, ticket: u64) -> bool {
        if ticket <= self.seq {
            return false;
        }
        let Some(pos) = self.index.remove(&id) else {
            // Deleting something the store never saw is a no-op, but the
            // sequence still advances so a stale poll cannot resurrect it.
            self.seq = ticket;
            return true;
        };
        self.records.remove(pos);
        for (i, r) in self.records.iter().enumerate().skip(pos) {
            self.index.insert(r.id(), i);
        }
        self.seq = ticket;
        true
    }
}

/// A full, order-preserving copy of all five collections. Polls produce one
/// of these; the pure derivation layers (status, KPI, filter) consume one
/// without ever touching the live store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub sites: Vec<Site>,
    pub users: Vec<User>,
    pub shifts: Vec<Shift>,
    pub attendance: Vec<Attendance>,
    pub incidents: Vec<Incident>,
}

/// Single source of truth for one view session. Discarded on logout; never
/// shared across sessions.
#[derive(Debug, Default)]
pub struct ResourceStore {
    next_ticket: u64,
    pub sites: Collection<Site>,
    pub users: Collection<User>,
    pub shifts: Collection<Shift>,
    pub attendance: Collection<Attendance>,
    pub incidents: Collection<Incident>,
}

pub type SharedStore = Arc<Mutex<ResourceStore>>;

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Issue the next mutation ticket. A poll takes its ticket when the
    /// fetch starts; a mutation takes one when the response arrives, so a
    /// mutation always outranks any poll that was already in flight.
    pub fn ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Apply a poll result to all five collections at once. All-or-nothing:
    /// if any collection has seen a newer mutation than the poll's ticket,
    /// the whole poll is stale and nothing is applied, leaving the previous
    /// snapshot intact.
    pub fn commit_poll(&mut self, ticket: u64, snapshot: Snapshot) -> bool {
        let newest = self
            .sites
            .seq()
            .max(self.users.seq())
            .max(self.shifts.seq())
            .max(self.attendance.seq())
            .max(self.incidents.seq());
        if ticket <= newest {
            return false;
        }
        self.sites.replace_all(snapshot.sites, ticket);
        self.users.replace_all(snapshot.users, ticket);
        self.shifts.replace_all(snapshot.shifts, ticket);
        self.attendance.replace_all(snapshot.attendance, ticket);
        self.incidents.replace_all(snapshot.incidents, ticket);
        true
    }

    /// Order-preserving copy for the read-only derivation layers.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sites: self.sites.as_slice().to_vec(),
            users: self.users.as_slice().to_vec(),
            shifts: self.shifts.as_slice().to_vec(),
            attendance: self.attendance.as_slice().to_vec(),
            incidents: self.incidents.as_slice().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use chrono::{TimeZone, Utc};

    fn site(id: u64, name: &str) -> Site {
        Site {
            id,
            name: name.to_string(),
            location: String::new(),
            supervisors: vec![],
        }
    }

    fn incident(id: u64, description: &str) -> Incident {
        Incident {
            id,
            shift: None,
            site: Some(1),
            site_name: Some("Gate A".to_string()),
            severity: Severity::Low,
            description: description.to_string(),
            status: Default::default(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn upsert_overwrites_in_place_and_appends_new() {
        let mut sites = Collection::new();
        assert!(sites.replace_all(vec![site(1, "Gate A"), site(2, "Gate B")], 1));

        // Existing id: overwrite, order untouched
        assert!(sites.upsert(site(1, "Gate A renamed"), 2));
        let names: Vec<&str> = sites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Gate A renamed", "Gate B"]);

        // New id: append
        assert!(sites.upsert(site(3, "Warehouse"), 3));
        assert_eq!(sites.len(), 3);
        assert_eq!(sites.as_slice()[2].name, "Warehouse");
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut sites = Collection::new();
        sites.replace_all(vec![site(1, "Gate A")], 1);
        sites.upsert(site(2, "Gate B"), 2);
        let once = sites.as_slice().to_vec();
        sites.upsert(site(2, "Gate B"), 3);
        assert_eq!(sites.as_slice(), once.as_slice());
    }

    #[test]
    fn remove_filters_id_and_keeps_order() {
        let mut incidents = Collection::new();
        incidents.replace_all(
            vec![incident(1, "a"), incident(2, "b"), incident(3, "c")],
            1,
        );
        assert!(incidents.remove(2, 2));
        let ids: Vec<u64> = incidents.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(incidents.get(3).map(|i| i.description.as_str()), Some("c"));
        assert!(incidents.get(2).is_none());
    }

    #[test]
    fn stale_poll_is_discarded_wholesale() {
        let mut store = ResourceStore::new();
        let early_poll = store.ticket();
        let late_mutation = store.ticket();

        // The mutation's response lands first
        assert!(store.sites.upsert(site(1, "Gate A renamed"), late_mutation));

        // The poll started earlier but resolves later; its data predates the
        // rename and must not clobber it, in any collection.
        let stale = Snapshot {
            sites: vec![site(1, "Gate A")],
            incidents: vec![incident(9, "stale")],
            ..Default::default()
        };
        assert!(!store.commit_poll(early_poll, stale));
        assert_eq!(store.sites.get(1).map(|s| s.name.as_str()), Some("Gate A renamed"));
        assert!(store.incidents.is_empty());
    }

    #[test]
    fn fresh_poll_replaces_everything() {
        let mut store = ResourceStore::new();
        let t = store.ticket();
        store.sites.upsert(site(1, "Gate A"), t);

        let poll = store.ticket();
        let snap = Snapshot {
            sites: vec![site(2, "Gate B")],
            ..Default::default()
        };
        assert!(store.commit_poll(poll, snap));
        // Deletions on the server are reflected: old record is gone
        assert!(store.sites.get(1).is_none());
        assert_eq!(store.sites.len(), 1);
    }

    #[test]
    fn snapshot_preserves_list_order() {
        let mut store = ResourceStore::new();
        let t = store.ticket();
        let records = vec![incident(5, "x"), incident(2, "y"), incident(9, "z")];
        store.incidents.replace_all(records.clone(), t);
        assert_eq!(store.snapshot().incidents, records);
    }
}
