//! guard-console: terminal front end for the guard-services backend.
//!
//! Read commands pull a fresh snapshot and run the pure derivation layers
//! over it; mutations go through the action layer so the local mirror is
//! reconciled exactly like the portals do it. `watch` runs the role-scoped
//! polling loop until interrupted.
//!
//! Configuration comes from flags or the environment (`GUARD_API_URL`,
//! `GUARD_API_TOKEN`), with a `.env` file honored for local development.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use tracing_subscriber::EnvFilter;

use guard_console::actions::{Console, SessionState};
use guard_console::api::{
    ApiClient, Backend, NewIncident, NewShift, NewUser, ShiftPatch, UserPatch,
};
use guard_console::filter::{
    filter_attendance, filter_incidents, page_slice, paginate, AttendanceFilter, IncidentFilter,
    PAGE_SIZE,
};
use guard_console::kpi;
use guard_console::models::{AttendanceStatus, IncidentStatus, Role, Severity};
use guard_console::notify::{Level, Notice, Notifier};
use guard_console::status::{attendance_display_status, ShiftStatus};
use guard_console::store::ResourceStore;
use guard_console::sync::{fetch_snapshot, SyncScheduler};

#[derive(Parser)]
#[command(name = "guard-console")]
#[command(about = "Operations console for the guard-services backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL, e.g. http://localhost:8000/api
    #[arg(short, long, env = "GUARD_API_URL")]
    url: String,

    /// Bearer token for the signed-in account
    #[arg(short, long, env = "GUARD_API_TOKEN")]
    token: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the identity and role the server resolves for the token
    Whoami,
    /// Poll on the role's cadence and print KPIs until interrupted
    Watch,
    /// List shifts with their derived statuses
    Shifts,
    /// Current KPI counters for the session's role
    Kpis,
    /// Filtered, paginated incident list
    Incidents {
        #[arg(long)]
        severity: Option<Severity>,
        #[arg(long)]
        status: Option<IncidentStatus>,
        #[arg(long)]
        site: Option<String>,
        #[arg(short, long)]
        query: Option<String>,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Filtered, paginated attendance log
    Attendance {
        #[arg(long)]
        status: Option<ShiftStatus>,
        #[arg(long)]
        site: Option<String>,
        #[arg(short, long)]
        query: Option<String>,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Check in to a shift
    CheckIn {
        #[arg(short, long)]
        shift: u64,
    },
    /// Check out of a shift
    CheckOut {
        #[arg(short, long)]
        shift: u64,
    },
    /// Report an incident (pending review until a supervisor acts on it)
    ReportIncident {
        #[arg(long)]
        shift: Option<u64>,
        #[arg(long)]
        site: Option<u64>,
        #[arg(short, long)]
        severity: Severity,
        #[arg(short, long)]
        description: String,
    },
    /// Set an incident's review status
    ReviewIncident {
        #[arg(short, long)]
        id: u64,
        #[arg(short, long)]
        status: IncidentStatus,
    },
    /// Supervisor override of an attendance record's status
    MarkAttendance {
        #[arg(short, long)]
        id: u64,
        #[arg(short, long)]
        status: AttendanceStatus,
    },
    CreateSite {
        #[arg(short, long)]
        name: String,
    },
    RenameSite {
        #[arg(short, long)]
        id: u64,
        #[arg(short, long)]
        name: String,
    },
    /// Replace a site's supervisor assignment
    AssignSupervisors {
        #[arg(short, long)]
        site: u64,
        #[arg(short = 'u', long = "supervisor")]
        supervisors: Vec<u64>,
    },
    DeleteSite {
        #[arg(short, long)]
        id: u64,
    },
    CreateShift {
        #[arg(long)]
        site: u64,
        #[arg(long)]
        guard: u64,
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        end: DateTime<Utc>,
    },
    /// Patch a shift; unset flags leave fields unchanged
    UpdateShift {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        site: Option<u64>,
        #[arg(long)]
        guard: Option<u64>,
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },
    DeleteShift {
        #[arg(short, long)]
        id: u64,
    },
    CreateUser {
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        role: Role,
        #[arg(long)]
        password: String,
    },
    /// Patch a user; unset flags leave fields unchanged
    UpdateUser {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        role: Option<Role>,
        #[arg(long)]
        active: Option<bool>,
    },
    DeleteUser {
        #[arg(short, long)]
        id: u64,
    },
}

fn drain_notices(rx: &mut UnboundedReceiver<Notice>) {
    while let Ok(notice) = rx.try_recv() {
        print_notice(&notice);
    }
}

fn print_notice(notice: &Notice) {
    let tag = match notice.level {
        Level::Info => "info",
        Level::Success => "ok",
        Level::Error => "error",
    };
    println!("[{tag}] {}", notice.message);
}

fn print_kpis(kpis: &kpi::Kpis) {
    println!(
        "on duty: {}  incidents today: {}  missed shifts: {}  pending reviews: {}",
        kpis.on_duty, kpis.today_incidents, kpis.missed_shifts, kpis.pending_reviews
    );
}

async fn connected_console(
    client: ApiClient,
) -> Result<(Console<ApiClient>, UnboundedReceiver<Notice>), Box<dyn std::error::Error>> {
    let (notices, rx) = Notifier::channel();
    let console = Console::connect(client, ResourceStore::shared(), notices).await?;
    Ok((console, rx))
}

/// Connect and load a first snapshot so read commands and mutations see the
/// current server state.
async fn primed_console(
    client: ApiClient,
) -> Result<(Console<ApiClient>, UnboundedReceiver<Notice>), Box<dyn std::error::Error>> {
    let snapshot = fetch_snapshot(&client).await?;
    let (console, rx) = connected_console(client).await?;
    {
        let mut store = console.store().lock().await;
        let ticket = store.ticket();
        store.commit_poll(ticket, snapshot);
    }
    Ok((console, rx))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let client = ApiClient::new(cli.url, cli.token)?;

    match cli.command {
        Commands::Whoami => {
            let identity = client.whoami().await?;
            println!(
                "{} <{}> ({})",
                identity.full_name, identity.email, identity.role
            );
        }
        Commands::Watch => {
            let (notices, mut rx) = Notifier::channel();
            let console =
                Console::connect(client.clone(), ResourceStore::shared(), notices.clone()).await?;
            let view = console.view();
            info!(%view, "watching");
            let scheduler =
                SyncScheduler::start(console.store().clone(), Arc::new(client), view, notices);
            let mut ticker = tokio::time::interval(view.poll_interval());
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        drain_notices(&mut rx);
                        let snapshot = console.snapshot().await;
                        print_kpis(&kpi::compute(&snapshot, Utc::now(), view));
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            scheduler.stop().await;
        }
        Commands::Shifts => {
            let (console, _rx) = primed_console(client).await?;
            for (shift, status) in console.shift_statuses(Utc::now()).await {
                let site = shift.site_name.as_deref().unwrap_or("-");
                let guard = shift.assigned_user_name.as_deref().unwrap_or("unassigned");
                println!(
                    "#{:<5} {:<10} {} .. {}  {} @ {}",
                    shift.id, status, shift.start, shift.end, guard, site
                );
            }
        }
        Commands::Kpis => {
            let (console, _rx) = primed_console(client).await?;
            let snapshot = console.snapshot().await;
            print_kpis(&kpi::compute(&snapshot, Utc::now(), console.view()));
        }
        Commands::Incidents {
            severity,
            status,
            site,
            query,
            page,
        } => {
            let snapshot = fetch_snapshot(&client).await?;
            let filter = IncidentFilter {
                severity,
                status,
                site_name: site,
                query,
            };
            let matched = filter_incidents(&snapshot.incidents, &filter);
            let page = paginate(matched.len(), page, PAGE_SIZE);
            for incident in page_slice(&matched, &page) {
                let site = incident.site_name.as_deref().unwrap_or("-");
                println!(
                    "#{:<5} {:<8} {:<9} {}  {}",
                    incident.id, incident.severity, incident.status, site, incident.description
                );
            }
            println!("page {}/{} ({} matched)", page.page, page.total_pages, matched.len());
        }
        Commands::Attendance {
            status,
            site,
            query,
            page,
        } => {
            let snapshot = fetch_snapshot(&client).await?;
            let filter = AttendanceFilter {
                status,
                site_name: site,
                query,
            };
            let matched = filter_attendance(&snapshot.attendance, &filter);
            let page = paginate(matched.len(), page, PAGE_SIZE);
            for record in page_slice(&matched, &page) {
                let guard = record.user_name.as_deref().unwrap_or("-");
                let site = record.site_name.as_deref().unwrap_or("-");
                println!(
                    "#{:<5} {:<9} {} @ {}",
                    record.id,
                    attendance_display_status(record),
                    guard,
                    site
                );
            }
            println!("page {}/{} ({} matched)", page.page, page.total_pages, matched.len());
        }
        Commands::CheckIn { shift } => {
            let (console, mut rx) = connected_console(client).await?;
            let _ = console.check_in(shift).await;
            drain_notices(&mut rx);
        }
        Commands::CheckOut { shift } => {
            let (console, mut rx) = connected_console(client).await?;
            let _ = console.check_out(shift).await;
            drain_notices(&mut rx);
        }
        Commands::ReportIncident {
            shift,
            site,
            severity,
            description,
        } => {
            let (console, mut rx) = connected_console(client).await?;
            let _ = console
                .submit_incident(NewIncident {
                    shift,
                    site,
                    severity,
                    description,
                })
                .await;
            drain_notices(&mut rx);
        }
        Commands::ReviewIncident { id, status } => {
            let (console, mut rx) = connected_console(client).await?;
            let _ = console.review_incident(id, status).await;
            drain_notices(&mut rx);
        }
        Commands::MarkAttendance { id, status } => {
            let (console, mut rx) = connected_console(client).await?;
            let _ = console.mark_attendance(id, status).await;
            drain_notices(&mut rx);
        }
        Commands::CreateSite { name } => {
            let (console, mut rx) = connected_console(client).await?;
            let _ = console.create_site(name).await;
            drain_notices(&mut rx);
        }
        Commands::RenameSite { id, name } => {
            let (console, mut rx) = connected_console(client).await?;
            let _ = console.rename_site(id, name).await;
            drain_notices(&mut rx);
        }
        Commands::AssignSupervisors { site, supervisors } => {
            let (console, mut rx) = connected_console(client).await?;
            let _ = console.assign_supervisors(site, supervisors).await;
            drain_notices(&mut rx);
        }
        Commands::DeleteSite { id } => {
            let (console, mut rx) = connected_console(client).await?;
            console.delete_site(id).await;
            drain_notices(&mut rx);
        }
        Commands::CreateShift {
            site,
            guard,
            start,
            end,
        } => {
            let (console, mut rx) = connected_console(client).await?;
            let _ = console
                .create_shift(NewShift {
                    site,
                    assigned_user: guard,
                    start,
                    end,
                })
                .await;
            drain_notices(&mut rx);
        }
        Commands::UpdateShift {
            id,
            site,
            guard,
            start,
            end,
        } => {
            let (console, mut rx) = connected_console(client).await?;
            let _ = console
                .update_shift(
                    id,
                    ShiftPatch {
                        site,
                        assigned_user: guard,
                        start,
                        end,
                    },
                )
                .await;
            drain_notices(&mut rx);
        }
        Commands::DeleteShift { id } => {
            let (console, mut rx) = connected_console(client).await?;
            console.delete_shift(id).await;
            drain_notices(&mut rx);
        }
        Commands::CreateUser {
            full_name,
            email,
            role,
            password,
        } => {
            let (console, mut rx) = connected_console(client).await?;
            let _ = console
                .create_user(NewUser {
                    full_name,
                    email,
                    role,
                    password,
                })
                .await;
            drain_notices(&mut rx);
        }
        Commands::UpdateUser {
            id,
            full_name,
            email,
            role,
            active,
        } => {
            let (console, mut rx) = connected_console(client).await?;
            let _ = console
                .update_user(
                    id,
                    UserPatch {
                        full_name,
                        email,
                        role,
                        is_active: active,
                    },
                )
                .await;
            drain_notices(&mut rx);
        }
        Commands::DeleteUser { id } => {
            // Prime the store so self-deletion can be recognized by email.
            let (console, mut rx) = primed_console(client).await?;
            let state = console.delete_user(id).await;
            drain_notices(&mut rx);
            if state == SessionState::Ended {
                println!("session ended: the deleted account was this one");
            }
        }
    }

    Ok(())
}
