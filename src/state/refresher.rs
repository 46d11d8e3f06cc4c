use crate::state::messages::{TickOptions, TickSummary};
use crate::state::sync::{SyncEngine, SyncError};
use fpl_api::client::FantasySource;
use log::{error, info};
use std::time::Duration;

/// Runs the sync sequence forever, sleeping a fixed period between ticks.
/// Ticks never overlap: the next one starts only after the sleep that
/// follows the previous one.
pub struct PeriodicRefresher<S> {
    engine: SyncEngine<S>,
    options: TickOptions,
    period: Duration,
}

impl<S: FantasySource> PeriodicRefresher<S> {
    pub fn new(engine: SyncEngine<S>, options: TickOptions, period: Duration) -> Self {
        Self { engine, options, period }
    }

    /// Run one tick. A failed fetch or extraction is logged and reported as
    /// `None` so the loop carries on; store failures are returned.
    pub async fn tick_once(&self) -> Result<Option<TickSummary>, SyncError> {
        match self.engine.tick(&self.options).await {
            Ok(summary) => {
                info!("Tick done, {summary}");
                Ok(Some(summary))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                error!("Tick for week {} failed, retrying next tick: {e}", self.options.week);
                Ok(None)
            }
        }
    }

    pub async fn run(self) -> Result<(), SyncError> {
        loop {
            self.tick_once().await?;
            info!("Now sleeping for {} seconds...", self.period.as_secs());
            tokio::time::sleep(self.period).await;
        }
    }
}
