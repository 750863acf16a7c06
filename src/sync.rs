//! Sync scheduler: periodic full-refresh polls per view session.
//!
//! One poll fetches all five collections concurrently and commits them as a
//! unit; a partial failure fails the whole poll and the previous snapshot
//! stays untouched. The spawned loop awaits each poll before the next tick,
//! so timer polls never overlap. Teardown (`stop`) does not abort an
//! in-flight request; the alive flag makes its late resolution a no-op
//! instead of a write into a dead view.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::api::{ApiError, Backend};
use crate::models::ViewMode;
use crate::notify::Notifier;
use crate::store::{SharedStore, Snapshot};

/// Fetch all five collections concurrently. Any failure fails the poll as a
/// whole so the store is never left with a partial replace.
pub async fn fetch_snapshot(backend: &dyn Backend) -> Result<Snapshot, ApiError> {
    let (sites, users, shifts, attendance, incidents) = futures::try_join!(
        backend.list_sites(),
        backend.list_users(),
        backend.list_shifts(),
        backend.list_attendance(),
        backend.list_incidents(),
    )?;
    Ok(Snapshot {
        sites,
        users,
        shifts,
        attendance,
        incidents,
    })
}

/// Run one poll cycle: ticket first, fetch, then an all-or-nothing commit.
/// Returns whether a fresh snapshot was applied. Emits exactly one notice
/// per failed poll.
pub async fn poll_once(
    store: &SharedStore,
    backend: &dyn Backend,
    alive: &AtomicBool,
    notices: &Notifier,
) -> bool {
    // Ticket taken at fetch start: if a mutation lands while this poll is in
    // flight, the store outranks the poll and the commit below is refused.
    let ticket = store.lock().await.ticket();
    match fetch_snapshot(backend).await {
        Ok(snapshot) => {
            if !alive.load(Ordering::SeqCst) {
                debug!("poll resolved after teardown; dropping result");
                return false;
            }
            let committed = store.lock().await.commit_poll(ticket, snapshot);
            if committed {
                debug!(ticket, "poll committed");
            } else {
                warn!(ticket, "stale poll discarded");
            }
            committed
        }
        Err(err) => {
            warn!(%err, "poll failed; keeping previous snapshot");
            notices.error("Failed to load data");
            false
        }
    }
}

/// Owns the polling loop for one view session. Construct with `start`,
/// tear down with `stop` before the view goes away.
pub struct SyncScheduler {
    store: SharedStore,
    backend: Arc<dyn Backend>,
    alive: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    notices: Notifier,
    handle: JoinHandle<()>,
}

impl SyncScheduler {
    /// Spawn the loop: an immediate poll, then one per `view.poll_interval()`.
    pub fn start(
        store: SharedStore,
        backend: Arc<dyn Backend>,
        view: ViewMode,
        notices: Notifier,
    ) -> Self {
        let alive = Arc::new(AtomicBool::new(true));
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn({
            let store = store.clone();
            let backend = backend.clone();
            let alive = alive.clone();
            let notices = notices.clone();
            async move {
                let mut ticker = interval(view.poll_interval());
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = shutdown_rx.changed() => break,
                    }
                    if !alive.load(Ordering::SeqCst) {
                        break;
                    }
                    poll_once(&store, backend.as_ref(), &alive, &notices).await;
                }
                debug!("polling loop stopped");
            }
        });

        SyncScheduler {
            store,
            backend,
            alive,
            shutdown,
            notices,
            handle,
        }
    }

    /// Manual refresh outside the timer cadence; same commit path, so the
    /// usual staleness rules apply if it races a timer poll.
    pub async fn refresh_now(&self) -> bool {
        poll_once(&self.store, self.backend.as_ref(), &self.alive, &self.notices).await
    }

    /// Stop polling and wait for the loop to wind down. Any still-pending
    /// request keeps running but its result is dropped.
    pub async fn stop(self) {
        self.alive.store(false, Ordering::SeqCst);
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
