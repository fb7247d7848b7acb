mod app;
mod config;
mod display;
mod documents;
mod error;
mod roster;
mod schedule;
mod sheet;
mod store;
mod web;

use std::collections::BTreeSet;
use std::fs::File;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use app::{AppState, RefreshMode, RefreshOutcome, Role};
use config::{Config, MEMORY_DATA_DIR};
use display::{print_day_grid, print_load_monitor, write_schedule_to_file};
use error::AppError;
use schedule::{load_layout, Day};
use store::{FileStore, LocalStore, MemoryStore, PersistenceGateway, SheetEndpoint};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn open_state(config: &Config) -> Result<AppState, AppError> {
    let layout = load_layout(config.layout_path.as_deref())?;
    let local: Box<dyn LocalStore> = if config.data_dir.as_os_str() == MEMORY_DATA_DIR {
        info!("Keeping documents in memory only");
        Box::new(MemoryStore::new())
    } else {
        Box::new(FileStore::open(&config.data_dir)?)
    };
    let remote = Arc::new(SheetEndpoint::new(config.sheet_url.as_deref(), config.remote_timeout)?);
    let gateway = PersistenceGateway::new(local, remote, config.sync_debounce);
    Ok(AppState::load(layout, gateway, &config.admin_password))
}

/// Pulls the remote copy at startup. Never overwrites local data with an
/// empty remote document.
async fn background_refresh(state: &mut AppState) {
    let remote = state.remote();
    if !remote.is_configured() {
        info!("No remote endpoint configured, working locally");
        return;
    }
    let snapshot = remote.fetch_all().await;
    match state.apply_remote(snapshot, RefreshMode::Background, false) {
        Ok(RefreshOutcome::Applied { documents }) => info!(?documents, "Startup refresh applied"),
        Ok(outcome) => info!(?outcome, "Startup refresh left local data unchanged"),
        Err(e) => e.log_and_record("startup refresh"),
    }
}

fn usage() {
    println!("Usage:");
    println!("  school-timetable web [port]");
    println!("  school-timetable import <schedule.csv>");
    println!("  school-timetable roster <teachers.csv>");
    println!("  school-timetable export template|master <out.csv>");
    println!("  school-timetable report [day]");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    config::load_dotenv();
    init_tracing();

    let config = Config::from_env()?;
    let mut state = open_state(&config)?;
    background_refresh(&mut state).await;

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("report");

    match command {
        "web" => {
            let port = args.get(2).and_then(|p| p.parse::<u16>().ok()).unwrap_or(config.port);
            println!("Access the site at http://localhost:{}", port);
            web::start_server(port, state).await?;
        }
        "import" => {
            let Some(path) = args.get(2) else {
                usage();
                return Ok(());
            };
            let summary = state.import_sheet(&Role::Admin, File::open(path)?)?;
            let queue = state.save_schedule(&Role::Admin)?;
            queue.flush().await;
            println!(
                "Imported {} rows ({} skipped): {} cells set, {} cleared",
                summary.rows_read, summary.rows_skipped, summary.assigned, summary.cleared
            );
        }
        "roster" => {
            let Some(path) = args.get(2) else {
                usage();
                return Ok(());
            };
            let count = state.import_roster(&Role::Admin, File::open(path)?)?;
            state.sync_queue().flush().await;
            println!("Loaded {} teachers", count);
        }
        "export" => {
            let (Some(kind), Some(path)) = (args.get(2), args.get(3)) else {
                usage();
                return Ok(());
            };
            let out = File::create(path)?;
            let rows = match kind.as_str() {
                "template" => state.export_template(out)?,
                "master" => state.export_master(out)?,
                _ => {
                    usage();
                    return Ok(());
                }
            };
            println!("Wrote {} rows to {}", rows, path);
        }
        "report" => {
            let days: Vec<Day> = match args.get(2) {
                Some(day) => vec![day.parse()?],
                None => Day::ALL.to_vec(),
            };
            let mut grids = Vec::new();
            for day in days {
                let grid = state.day_grid(day, &BTreeSet::new())?;
                print_day_grid(&grid);
                grids.push(grid);
            }
            print_load_monitor(&state.monitor());

            write_schedule_to_file(&grids, "schedule_report.txt")?;
            println!("\nSchedule saved to schedule_report.txt");
        }
        other => {
            error!(command = other, "Unknown command");
            usage();
        }
    }

    Ok(())
}
