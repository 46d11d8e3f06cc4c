mod state;

use crate::state::app_settings::{CliArgs, CliCommand, Settings};
use crate::state::messages::TickOptions;
use crate::state::refresher::PeriodicRefresher;
use crate::state::store::SqliteStore;
use crate::state::sync::SyncEngine;
use fpl_api::client::FplApi;
use log::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(args) = handle_cli_args() else {
        return Ok(());
    };

    better_panic::install();

    let settings = Settings::load(&args)?;
    env_logger::Builder::new()
        .filter_level(settings.log_level)
        .parse_default_env()
        .init();

    info!(
        "fplsync {} tracking week {} in {}",
        env!("CARGO_PKG_VERSION"),
        settings.week,
        settings.database
    );

    let store = SqliteStore::open(&settings.database)?;
    store.migrate()?;

    let source = FplApi::new().with_base_url(settings.base_url.as_str());
    let engine = SyncEngine::new(store, source, settings.competitors.clone());
    let options = TickOptions { week: settings.week, force_rosters: settings.force_rosters };

    if args.once {
        let summary = engine.tick(&options).await?;
        info!("Tick done, {summary}");
        info!(
            "{} player records stored for week {}",
            engine.store().global_player_count(settings.week)?,
            settings.week
        );
        return Ok(());
    }

    let refresher = PeriodicRefresher::new(engine, options, settings.interval);
    tokio::select! {
        result = refresher.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Exiting..."),
    }

    Ok(())
}

fn handle_cli_args() -> Option<CliArgs> {
    match CliCommand::parse(std::env::args().skip(1)) {
        Ok(CliCommand::Run(args)) => Some(args),
        Ok(CliCommand::Help) => {
            println!("{}", usage_text());
            None
        }
        Ok(CliCommand::Version) => {
            println!("fplsync {}", env!("CARGO_PKG_VERSION"));
            None
        }
        Err(message) => {
            eprintln!("{message}\n\n{}", usage_text());
            std::process::exit(2);
        }
    }
}

fn usage_text() -> &'static str {
    "fplsync - keeps a fantasy league's rounds, scores and results in SQLite

Usage:
  fplsync [--week N] [--force-rosters] [--once]
  fplsync --help
  fplsync --version

Options:
  --week N          Week to track (overrides FPLSYNC_WEEK)
  --force-rosters   Refetch every team's roster on each tick
  --once            Run a single tick and exit

Environment:
  FPLSYNC_WEEK            Current week (required unless --week is given)
  FPLSYNC_DATABASE        SQLite path, sqlite://path or :memory: (default fplsync.db)
  FPLSYNC_FORCE_ROSTERS   Any non-empty value behaves like --force-rosters
  FPLSYNC_INTERVAL_SECS   Seconds to sleep between ticks (default 120)
  FPLSYNC_BASE_URL        Fantasy site base URL
  FPLSYNC_TEAMS           League override as id=name,id=name
  FPLSYNC_LOG             Log level (RUST_LOG also honoured)"
}
