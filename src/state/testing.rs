//! In-process stand-in for the fantasy site, scripted per test.

use fpl_api::client::{ApiError, ApiResult, FantasySource};
use fpl_api::extract::ExtractError;
use fpl_api::{DetailEntry, Fixture, Player, PlayerDetail, TeamSheet};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct ScriptedSource {
    sheets: RefCell<HashMap<u32, TeamSheet>>,
    players: RefCell<HashMap<u32, PlayerDetail>>,
    failing_players: RefCell<HashSet<u32>>,
    fixtures: RefCell<Vec<Fixture>>,
    broken_fixtures: RefCell<HashSet<u32>>,
    index_down: Cell<bool>,
    sheet_fetches: Cell<usize>,
    player_fetches: Cell<usize>,
}

impl ScriptedSource {
    pub fn set_sheet(&self, team_id: u32, sheet: TeamSheet) {
        self.sheets.borrow_mut().insert(team_id, sheet);
    }

    pub fn remove_sheet(&self, team_id: u32) {
        self.sheets.borrow_mut().remove(&team_id);
    }

    pub fn set_player(&self, detail: PlayerDetail) {
        self.failing_players.borrow_mut().remove(&detail.id);
        self.players.borrow_mut().insert(detail.id, detail);
    }

    pub fn fail_player(&self, player_id: u32) {
        self.failing_players.borrow_mut().insert(player_id);
    }

    pub fn set_fixtures(&self, fixtures: Vec<Fixture>) {
        *self.fixtures.borrow_mut() = fixtures;
    }

    pub fn break_fixture(&self, fixture_id: u32) {
        self.broken_fixtures.borrow_mut().insert(fixture_id);
    }

    /// Serve a fixture index page that has lost its fixture table.
    pub fn take_index_down(&self) {
        self.index_down.set(true);
    }

    pub fn sheet_fetches(&self) -> usize {
        self.sheet_fetches.get()
    }

    pub fn player_fetches(&self) -> usize {
        self.player_fetches.get()
    }
}

impl FantasySource for ScriptedSource {
    async fn fetch_team_sheet(&self, team_id: u32, week: u32) -> ApiResult<TeamSheet> {
        self.sheet_fetches.set(self.sheet_fetches.get() + 1);
        self.sheets.borrow().get(&team_id).cloned().ok_or_else(|| {
            ApiError::Extraction(
                ExtractError::MissingElement("#ismGraphical1".into()),
                format!("scripted://entry/{team_id}/event-history/{week}/"),
            )
        })
    }

    async fn fetch_player(&self, player_id: u32) -> ApiResult<PlayerDetail> {
        self.player_fetches.set(self.player_fetches.get() + 1);
        if self.failing_players.borrow().contains(&player_id) {
            return Err(ApiError::NotFound(format!("scripted failure for player {player_id}")));
        }
        self.players
            .borrow()
            .get(&player_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("player {player_id} not scripted")))
    }

    async fn fetch_fixture_ids(&self, week: u32) -> ApiResult<Vec<u32>> {
        if self.index_down.get() {
            return Err(ApiError::Extraction(
                ExtractError::MissingElement("#ismFixtureTable".into()),
                format!("scripted://fixtures/{week}/"),
            ));
        }
        Ok(self.fixtures.borrow().iter().map(|f| f.id).collect())
    }

    async fn fetch_fixture(&self, fixture_id: u32) -> ApiResult<Fixture> {
        let url = format!("scripted://fixture/{fixture_id}/");
        if self.broken_fixtures.borrow().contains(&fixture_id) {
            return Err(ApiError::Extraction(
                ExtractError::MissingElement("#ismFixtureDetailTitle".into()),
                url,
            ));
        }
        self.fixtures
            .borrow()
            .iter()
            .find(|f| f.id == fixture_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(url))
    }
}

/// A fifteen-slot sheet; the first player captains, the second deputises.
pub fn sheet(deduction: i32, ids: &[u32]) -> TeamSheet {
    TeamSheet {
        deduction,
        players: ids
            .iter()
            .enumerate()
            .map(|(i, &player_id)| Player { player_id, captain: i == 0, vice_captain: i == 1 })
            .collect(),
    }
}

pub fn detail(id: u32, total_score: i32, events: Vec<(&str, i64, i64)>) -> PlayerDetail {
    PlayerDetail {
        id,
        name: format!("Player {id}"),
        team: format!("Club {id}"),
        shirt: format!("shirt_{id}.png"),
        position: "Midfielder".into(),
        total_score,
        details: events
            .into_iter()
            .map(|(category, stat, points)| DetailEntry(vec![json!(category), json!(stat), json!(points)]))
            .collect(),
    }
}

pub fn fixture(id: u32, title: &str) -> Fixture {
    Fixture {
        id,
        details: title.into(),
        bps: vec!["Somebody (3)".into()],
        ..Default::default()
    }
}
