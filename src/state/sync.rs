//! The sync sequence: round baseline, rosters, player universe, score
//! records and fixtures, each re-derived from the external source.

use crate::state::changes::is_significant_change;
use crate::state::messages::{ScoreOutcome, TickOptions, TickSummary};
use crate::state::store::{SqliteStore, StoreError};
use chrono::Utc;
use fpl_api::client::{ApiError, FantasySource};
use fpl_api::{Competitor, GlobalPlayer, Round};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::fmt;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug)]
pub enum SyncError {
    Fetch(ApiError),
    Store(StoreError),
    RoundNotFound(u32),
}

impl SyncError {
    /// Store failures end the process; everything else is retried next tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Store(_))
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Fetch(e) => write!(f, "{e}"),
            SyncError::Store(e) => write!(f, "{e}"),
            SyncError::RoundNotFound(week) => write!(f, "no round stored for week {week}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<ApiError> for SyncError {
    fn from(e: ApiError) -> Self {
        SyncError::Fetch(e)
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        SyncError::Store(e)
    }
}

pub struct SyncEngine<S> {
    store: SqliteStore,
    source: S,
    competitors: Vec<Competitor>,
}

impl<S: FantasySource> SyncEngine<S> {
    pub fn new(store: SqliteStore, source: S, competitors: Vec<Competitor>) -> Self {
        Self { store, source, competitors }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    #[cfg(test)]
    pub fn source(&self) -> &S {
        &self.source
    }

    fn load_round(&self, week: u32) -> SyncResult<Round> {
        self.store.find_round(week)?.ok_or(SyncError::RoundNotFound(week))
    }

    /// Create the week's round with the fixed competitors and fill in their
    /// rosters, unless the round already exists. Returns whether it was created.
    pub async fn ensure_round(&self, week: u32) -> SyncResult<bool> {
        if self.store.find_round(week)?.is_some() {
            debug!("No need to build teams for round {week}, already got team data");
            return Ok(false);
        }

        self.store.create_round(&Round::seeded(week, &self.competitors))?;
        self.sync_rosters(week).await?;
        info!("Built teams for round {week}");
        Ok(true)
    }

    /// Refetch every team's deduction and lineup, saving after each team.
    pub async fn sync_rosters(&self, week: u32) -> SyncResult<()> {
        let mut round = self.load_round(week)?;

        for i in 0..round.teams.len() {
            let (team_id, name) = (round.teams[i].team_id, round.teams[i].name.clone());
            info!("Fetching roster of {name} ({team_id}) for week {week}");

            let sheet = self.source.fetch_team_sheet(team_id, week).await?;
            let captains = sheet.players.iter().filter(|p| p.captain).count();
            if captains != 1 {
                warn!("{name} ({team_id}) has {captains} captains in week {week}");
            }

            round.teams[i].apply_sheet(sheet);
            self.store.save_round(&round)?;
        }
        Ok(())
    }

    /// Every player fielded by any team in the round, each once.
    pub fn relevant_players(&self, week: u32) -> SyncResult<BTreeSet<u32>> {
        let round = self.load_round(week)?;
        Ok(round
            .teams
            .iter()
            .flat_map(|t| t.players.iter().map(|p| p.player_id))
            .collect())
    }

    /// Create a score record for each player not yet tracked this week.
    /// A player whose fetch fails is left for the next tick. Returns the
    /// ids that were created.
    pub async fn ensure_global_players(
        &self,
        week: u32,
        player_ids: impl IntoIterator<Item = u32>,
    ) -> SyncResult<Vec<u32>> {
        let mut created = Vec::new();

        for id in player_ids {
            if self.store.find_global_player(id, week)?.is_some() {
                continue;
            }

            info!("Creating global player {id} for week {week}");
            match self.source.fetch_player(id).await {
                Ok(detail) => {
                    let player = GlobalPlayer::from_detail(detail, week, Utc::now());
                    self.store.create_global_player(&player)?;
                    created.push(id);
                }
                Err(e) => warn!("Couldn't create player {id} because {e}, skipping..."),
            }
        }
        Ok(created)
    }

    /// Refetch each player's score details and store any difference.
    /// `last_change` only moves when a points value changed.
    pub async fn update_scores(
        &self,
        week: u32,
        player_ids: impl IntoIterator<Item = u32>,
    ) -> SyncResult<Vec<(u32, ScoreOutcome)>> {
        info!("Updating scores of players...");
        let mut outcomes = Vec::new();

        for id in player_ids {
            let detail = match self.source.fetch_player(id).await {
                Ok(detail) => detail,
                Err(e) => {
                    warn!("Couldn't get player {id} because {e}, skipping...");
                    outcomes.push((id, ScoreOutcome::Skipped { reason: e.to_string() }));
                    continue;
                }
            };

            let Some(mut player) = self.store.find_global_player(id, week)? else {
                warn!("Player {id} has no record for week {week}, skipping...");
                outcomes.push((id, ScoreOutcome::Skipped { reason: "no stored record".into() }));
                continue;
            };

            if player.details == detail.details {
                outcomes.push((id, ScoreOutcome::Unchanged));
                continue;
            }

            let significant = is_significant_change(&player.details, &detail.details);
            let now = Utc::now();
            player.details = detail.details;
            player.total_score = detail.total_score;
            player.updated = now;
            if significant {
                player.last_change = now;
                info!("Player {id} was changed");
            }

            self.store.save_global_player(&player)?;
            info!("Updated player {id}, score is now {}", player.total_score);
            outcomes.push((
                id,
                ScoreOutcome::Updated { significant, total_score: player.total_score },
            ));
        }
        Ok(outcomes)
    }

    /// Replace the round's fixtures with a fresh extraction of every fixture
    /// listed for the week. Returns how many were stored.
    pub async fn sync_fixtures(&self, week: u32) -> SyncResult<usize> {
        info!("Updating results for week {week}...");

        let ids = self.source.fetch_fixture_ids(week).await?;
        let mut fixtures = Vec::with_capacity(ids.len());
        for id in ids {
            fixtures.push(self.source.fetch_fixture(id).await?);
        }

        let mut round = self.load_round(week)?;
        round.fixtures = fixtures;
        self.store.save_round(&round)?;

        info!("Updated results for week {week}");
        Ok(round.fixtures.len())
    }

    /// One full pass of the sync sequence.
    pub async fn tick(&self, options: &TickOptions) -> SyncResult<TickSummary> {
        let week = options.week;
        info!("Fetching data at {}", Utc::now().to_rfc3339());

        let round_created = self.ensure_round(week).await?;
        let mut rosters_synced = round_created;
        if !round_created {
            let incomplete = self.load_round(week)?.has_empty_roster();
            if options.force_rosters || incomplete {
                if incomplete {
                    info!("Round {week} has teams without a roster, refetching");
                }
                self.sync_rosters(week).await?;
                rosters_synced = true;
            }
        }

        let players = self.relevant_players(week)?;
        let created_players = self.ensure_global_players(week, players.iter().copied()).await?;
        let scores = self.update_scores(week, players.iter().copied()).await?;
        let fixtures = self.sync_fixtures(week).await?;

        Ok(TickSummary {
            week,
            round_created,
            rosters_synced,
            relevant_players: players.len(),
            created_players,
            scores,
            fixtures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{ScriptedSource, detail, fixture, sheet};
    use fpl_api::DetailEntry;
    use serde_json::json;

    fn competitors() -> Vec<Competitor> {
        vec![
            Competitor::new(16665, "Oskar"),
            Competitor::new(55465, "Anders"),
            Competitor::new(1113, "Magnus"),
            Competitor::new(413689, "Robert"),
            Competitor::new(985532, "Martin"),
        ]
    }

    fn engine(source: ScriptedSource) -> SyncEngine<ScriptedSource> {
        let store = SqliteStore::in_memory().unwrap();
        store.migrate().unwrap();
        SyncEngine::new(store, source, competitors())
    }

    /// Five teams; team k fields players 10k+1..=10k+15 except that every
    /// team shares player 1 in its first slot.
    fn league() -> ScriptedSource {
        let source = ScriptedSource::default();
        for (k, c) in competitors().iter().enumerate() {
            let base = 100 * (k as u32 + 1);
            let mut ids: Vec<u32> = (base + 1..=base + 15).collect();
            ids[0] = 1;
            source.set_sheet(c.team_id, sheet(0, &ids));
        }
        for id in [1].into_iter().chain((1..=5).flat_map(|k| 100 * k + 2..=100 * k + 15)) {
            source.set_player(detail(id, 2, vec![("Minutes played", 90, 2)]));
        }
        source
    }

    fn options(week: u32) -> TickOptions {
        TickOptions { week, force_rosters: false }
    }

    #[tokio::test]
    async fn ensure_round_is_idempotent() {
        let engine = engine(league());
        assert!(engine.ensure_round(1).await.unwrap());
        assert!(!engine.ensure_round(1).await.unwrap());
        assert_eq!(engine.store().round_count(1).unwrap(), 1);
        assert_eq!(engine.source().sheet_fetches(), 5);
    }

    #[tokio::test]
    async fn new_round_gets_full_rosters() {
        let source = league();
        source.set_sheet(1113, sheet(6, &(301..=315).collect::<Vec<_>>()));
        let engine = engine(source);
        engine.ensure_round(1).await.unwrap();

        let round = engine.store().find_round(1).unwrap().unwrap();
        assert_eq!(round.teams.len(), 5);
        assert!(round.teams.iter().all(|t| t.players.len() == 15));
        let magnus = round.teams.iter().find(|t| t.team_id == 1113).unwrap();
        assert_eq!(magnus.name, "Magnus");
        assert_eq!(magnus.deduction, 6);
        assert_eq!(round.teams[0].deduction, 0);
    }

    #[tokio::test]
    async fn roster_failure_keeps_earlier_teams() {
        let source = league();
        source.remove_sheet(1113);
        let engine = engine(source);

        let err = engine.ensure_round(1).await.unwrap_err();
        assert!(matches!(err, SyncError::Fetch(ref e) if e.is_extraction()), "got {err}");
        assert!(!err.is_fatal());

        let round = engine.store().find_round(1).unwrap().unwrap();
        assert_eq!(round.teams[0].players.len(), 15);
        assert_eq!(round.teams[1].players.len(), 15);
        assert!(round.teams[2].players.is_empty());
    }

    #[tokio::test]
    async fn relevant_players_are_deduplicated() {
        let engine = engine(league());
        engine.ensure_round(1).await.unwrap();

        let players = engine.relevant_players(1).unwrap();
        // 5 × 15 slots, player 1 shared by all five teams.
        assert_eq!(players.len(), 71);
        assert!(players.contains(&1));
    }

    #[tokio::test]
    async fn relevant_players_needs_a_round() {
        let engine = engine(league());
        assert!(matches!(engine.relevant_players(3), Err(SyncError::RoundNotFound(3))));
    }

    #[tokio::test]
    async fn ensure_global_players_creates_once() {
        let source = league();
        source.set_player(detail(7, 5, vec![("Minutes played", 90, 2), ("Goals scored", 1, 3)]));
        let engine = engine(source);

        let created = engine.ensure_global_players(2, [7, 1]).await.unwrap();
        assert_eq!(created, vec![7, 1]);
        let again = engine.ensure_global_players(2, [7, 1]).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(engine.source().player_fetches(), 2);
        assert_eq!(engine.store().global_player_count(2).unwrap(), 2);

        let stored = engine.store().find_global_player(7, 2).unwrap().unwrap();
        assert_eq!(stored.total_score, 5);
        assert_eq!(stored.details.len(), 2);
        assert_eq!(stored.updated, stored.last_change);
        assert_eq!(stored.team, "Club 7");
    }

    #[tokio::test]
    async fn ensure_global_players_skips_failed_fetch() {
        let source = league();
        source.fail_player(1);
        let engine = engine(source);

        let created = engine.ensure_global_players(2, [1, 102]).await.unwrap();
        assert_eq!(created, vec![102]);
        assert!(engine.store().find_global_player(1, 2).unwrap().is_none());
    }

    #[tokio::test]
    async fn identical_details_write_nothing() {
        let engine = engine(league());
        engine.ensure_global_players(1, [102]).await.unwrap();
        let before = engine.store().find_global_player(102, 1).unwrap().unwrap();

        let outcomes = engine.update_scores(1, [102]).await.unwrap();
        assert_eq!(outcomes, vec![(102, ScoreOutcome::Unchanged)]);
        let after = engine.store().find_global_player(102, 1).unwrap().unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn value_change_moves_last_change() {
        let source = league();
        let engine = engine(source);
        engine.ensure_global_players(1, [102]).await.unwrap();
        let before = engine.store().find_global_player(102, 1).unwrap().unwrap();

        engine
            .source()
            .set_player(detail(102, 6, vec![("Minutes played", 90, 2), ("Goals scored", 1, 4)]));
        let outcomes = engine.update_scores(1, [102]).await.unwrap();
        assert_eq!(
            outcomes,
            vec![(102, ScoreOutcome::Updated { significant: true, total_score: 6 })]
        );

        let after = engine.store().find_global_player(102, 1).unwrap().unwrap();
        assert_eq!(after.total_score, 6);
        assert_eq!(after.details.len(), 2);
        assert_eq!(after.updated, after.last_change);
        assert!(after.last_change >= before.last_change);
    }

    #[tokio::test]
    async fn cosmetic_change_keeps_last_change() {
        let engine = engine(league());
        engine.ensure_global_players(1, [102]).await.unwrap();
        let before = engine.store().find_global_player(102, 1).unwrap().unwrap();

        let mut reworded = detail(102, 2, vec![]);
        reworded.details = vec![DetailEntry(vec![json!("Minutes Played"), json!("90'"), json!(2)])];
        engine.source().set_player(reworded.clone());

        let outcomes = engine.update_scores(1, [102]).await.unwrap();
        assert_eq!(
            outcomes,
            vec![(102, ScoreOutcome::Updated { significant: false, total_score: 2 })]
        );

        let after = engine.store().find_global_player(102, 1).unwrap().unwrap();
        assert_eq!(after.details, reworded.details);
        assert_eq!(after.last_change, before.last_change);
        assert!(after.updated >= before.updated);
    }

    #[tokio::test]
    async fn failed_fetch_is_skipped_not_fatal() {
        let engine = engine(league());
        engine.ensure_global_players(1, [102, 103, 104]).await.unwrap();
        engine.source().fail_player(103);
        engine.source().set_player(detail(104, 3, vec![("Minutes played", 90, 2), ("Bonus", 1, 1)]));

        let outcomes = engine.update_scores(1, [102, 103, 104]).await.unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0], (102, ScoreOutcome::Unchanged));
        assert!(matches!(outcomes[1], (103, ScoreOutcome::Skipped { .. })));
        assert!(matches!(outcomes[2], (104, ScoreOutcome::Updated { significant: true, .. })));
    }

    #[tokio::test]
    async fn untracked_player_is_skipped() {
        let engine = engine(league());
        let outcomes = engine.update_scores(1, [102]).await.unwrap();
        assert_eq!(
            outcomes,
            vec![(102, ScoreOutcome::Skipped { reason: "no stored record".into() })]
        );
    }

    #[tokio::test]
    async fn fixtures_are_replaced_wholesale() {
        let source = league();
        source.set_fixtures(vec![fixture(31, "A v B"), fixture(32, "C v D")]);
        let engine = engine(source);
        engine.ensure_round(1).await.unwrap();

        assert_eq!(engine.sync_fixtures(1).await.unwrap(), 2);
        engine.source().set_fixtures(vec![fixture(33, "E v F")]);
        assert_eq!(engine.sync_fixtures(1).await.unwrap(), 1);

        let round = engine.store().find_round(1).unwrap().unwrap();
        assert_eq!(round.fixtures.iter().map(|f| f.id).collect::<Vec<_>>(), vec![33]);
        assert!(round.teams.iter().all(|t| t.players.len() == 15));
    }

    #[tokio::test]
    async fn fixture_failure_leaves_previous_fixtures() {
        let source = league();
        source.set_fixtures(vec![fixture(31, "A v B")]);
        let engine = engine(source);
        engine.ensure_round(1).await.unwrap();
        engine.sync_fixtures(1).await.unwrap();

        engine.source().break_fixture(31);
        assert!(engine.sync_fixtures(1).await.is_err());
        let round = engine.store().find_round(1).unwrap().unwrap();
        assert_eq!(round.fixtures.len(), 1);
    }

    #[tokio::test]
    async fn missing_fixture_index_keeps_stored_fixtures() {
        let source = league();
        source.set_fixtures(vec![fixture(31, "A v B"), fixture(32, "C v D")]);
        let engine = engine(source);
        engine.ensure_round(1).await.unwrap();
        engine.sync_fixtures(1).await.unwrap();

        engine.source().take_index_down();
        let err = engine.sync_fixtures(1).await.unwrap_err();
        assert!(matches!(err, SyncError::Fetch(ref e) if e.is_extraction()), "got {err}");
        assert!(!err.is_fatal());

        let round = engine.store().find_round(1).unwrap().unwrap();
        assert_eq!(round.fixtures.iter().map(|f| f.id).collect::<Vec<_>>(), vec![31, 32]);
    }

    #[tokio::test]
    async fn tick_runs_whole_sequence() {
        let source = league();
        source.set_fixtures(vec![fixture(31, "A v B")]);
        source.fail_player(115);
        let engine = engine(source);

        let summary = engine.tick(&options(1)).await.unwrap();
        assert!(summary.round_created);
        assert!(summary.rosters_synced);
        assert_eq!(summary.relevant_players, 71);
        assert_eq!(summary.created_players.len(), 70);
        assert_eq!(summary.skipped().map(|(id, _)| id).collect::<Vec<_>>(), vec![115]);
        assert_eq!(summary.fixtures, 1);

        let second = engine.tick(&options(1)).await.unwrap();
        assert!(!second.round_created);
        assert!(!second.rosters_synced);
        assert!(second.created_players.is_empty());
        assert_eq!(engine.store().global_player_count(1).unwrap(), 70);
        assert_eq!(engine.source().sheet_fetches(), 5);
    }

    #[tokio::test]
    async fn tick_refetches_rosters_when_forced() {
        let engine = engine(league());
        engine.tick(&options(1)).await.unwrap();

        let forced = TickOptions { week: 1, force_rosters: true };
        let summary = engine.tick(&forced).await.unwrap();
        assert!(summary.rosters_synced);
        assert_eq!(engine.source().sheet_fetches(), 10);
    }

    #[tokio::test]
    async fn tick_recovers_roster_lost_on_creation() {
        let source = league();
        source.remove_sheet(985532);
        let engine = engine(source);
        assert!(engine.tick(&options(1)).await.is_err());

        engine.source().set_sheet(985532, sheet(0, &(501..=515).collect::<Vec<_>>()));
        let summary = engine.tick(&options(1)).await.unwrap();
        assert!(!summary.round_created);
        assert!(summary.rosters_synced);
        let round = engine.store().find_round(1).unwrap().unwrap();
        assert!(!round.has_empty_roster());
    }
}
