mod cli;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use cli::args::{Cli, Commands, NotifyCommands};
use cli::handlers;
use muwaqqit::config::AppConfig;
use muwaqqit::db::SqliteStore;
use muwaqqit::notifications::SqlitePlatform;
use muwaqqit::{ConfiguredLocation, Engine, EngineOptions, SalahEphemeris, ScheduleCache, SystemClock};

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = AppConfig::load().context("Loading config")?;

    // Setup only touches the config file
    if let Some(Commands::Setup { lat, lng, name, method, madhab, tz }) = cli.command {
        return handlers::handle_setup(&mut config, lat, lng, name, method, madhab, tz);
    }

    // Ensure data directory exists and open DB
    AppConfig::ensure_data_dir()?;
    let db_path = AppConfig::db_path()?;
    let store = Arc::new(
        SqliteStore::open(&db_path).with_context(|| format!("Opening database at {:?}", db_path))?,
    );
    let platform = Arc::new(SqlitePlatform::open(&db_path)?);
    let engine = Arc::new(build_engine(&config, store, Arc::clone(&platform))?);

    if config.salah.latitude.is_none() {
        eprintln!("No location configured. Run `muwaqqit setup --lat <LAT> --lng <LNG>`.");
        eprintln!();
    }

    match cli.command {
        Some(Commands::Times { refresh }) => handlers::handle_times(&engine, &config, refresh)?,
        None => handlers::handle_times(&engine, &config, false)?,
        Some(Commands::Status { date }) => handlers::handle_status(&engine, date.as_deref())?,
        Some(Commands::Mark { prayer, late, missed, clear, date }) => {
            handlers::handle_mark(&engine, &prayer, late, missed, clear, date.as_deref())?
        }
        Some(Commands::Undo) => handlers::handle_undo(&engine)?,
        Some(Commands::Stats { days }) => handlers::handle_stats(&engine, days)?,
        Some(Commands::Reset { today, all }) => handlers::handle_reset(&engine, today, all)?,
        Some(Commands::Remind) => handlers::handle_remind(&engine)?,
        Some(Commands::Notify { action }) => match action {
            NotifyCommands::Set { prayer, sound, pre } => {
                handlers::handle_notify_set(&engine, &prayer, sound.as_deref(), pre)?
            }
            NotifyCommands::Quiet { start, end, off } => {
                handlers::handle_notify_quiet(&engine, start.as_deref(), end.as_deref(), off)?
            }
            NotifyCommands::Show => handlers::handle_notify_show(&engine)?,
        },
        Some(Commands::Watch) => handlers::handle_watch(engine, platform)?,
        // handled before the database is opened
        Some(Commands::Setup { .. }) => {}
    }

    Ok(())
}

/// Wire the engine from config: salah for the ephemeris, configured
/// coordinates for the location, SQLite for storage and reminders.
fn build_engine(
    config: &AppConfig,
    store: Arc<SqliteStore>,
    platform: Arc<SqlitePlatform>,
) -> Result<Engine> {
    let offset = config.salah.offset()?;
    let cache = Arc::new(ScheduleCache::new(
        Arc::new(SalahEphemeris::new()),
        Arc::new(ConfiguredLocation::new(
            config.salah.latitude,
            config.salah.longitude,
        )),
        config.salah.convention(),
        offset,
    ));
    let options = EngineOptions {
        undo_depth: config.tracking.undo_depth,
        notification_defaults: config.notifications.default_settings()?,
        quiet_hours_default: config.notifications.quiet_hours()?,
    };
    let engine = Engine::new(Arc::new(SystemClock), cache, store, platform, options)?;
    Ok(engine)
}
