pub mod client;
pub mod extract;
pub mod fpl;
pub mod schema;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Domain types, independent of the site's markup and JSON
// ---------------------------------------------------------------------------

/// One competition week: the fantasy teams taking part and the real-world
/// fixtures played that week.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub week: u32,
    pub teams: Vec<Team>,
    pub fixtures: Vec<Fixture>,
}

impl Round {
    /// A fresh round with the given competitors and no rosters or fixtures yet.
    pub fn seeded(week: u32, competitors: &[Competitor]) -> Self {
        Self {
            week,
            teams: competitors.iter().map(Team::from).collect(),
            fixtures: Vec::new(),
        }
    }

    /// True when at least one team has never had its lineup filled in.
    pub fn has_empty_roster(&self) -> bool {
        self.teams.iter().any(|t| t.players.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub team_id: u32,
    pub name: String,
    pub deduction: i32, // points penalty, e.g. 4 for "(-4pts)"
    pub players: Vec<Player>,
}

impl Team {
    /// Overwrite deduction and lineup with a freshly extracted sheet.
    pub fn apply_sheet(&mut self, sheet: TeamSheet) {
        self.deduction = sheet.deduction;
        self.players = sheet.players;
    }

    pub fn captain(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.captain)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub player_id: u32,
    pub captain: bool,
    pub vice_captain: bool,
}

/// A fixed member of the league, seeded into every new round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Competitor {
    pub team_id: u32,
    pub name: String,
}

impl Competitor {
    pub fn new(team_id: u32, name: impl Into<String>) -> Self {
        Self { team_id, name: name.into() }
    }
}

impl From<&Competitor> for Team {
    fn from(c: &Competitor) -> Self {
        Team {
            team_id: c.team_id,
            name: c.name.clone(),
            deduction: 0,
            players: Vec::new(),
        }
    }
}

/// Per-player, per-week score record, independent of any fantasy team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalPlayer {
    pub player_id: u32,
    pub name: String,
    pub team: String, // real-world club
    pub shirt: String,
    pub position: String,
    pub week: u32,
    /// Last fetch that produced any difference in `details`.
    pub updated: DateTime<Utc>,
    /// Last fetch whose difference changed a scoring value.
    pub last_change: DateTime<Utc>,
    pub total_score: i32,
    pub details: Vec<DetailEntry>,
}

impl GlobalPlayer {
    pub fn from_detail(detail: PlayerDetail, week: u32, now: DateTime<Utc>) -> Self {
        Self {
            player_id: detail.id,
            name: detail.name,
            team: detail.team,
            shirt: detail.shirt,
            position: detail.position,
            week,
            updated: now,
            last_change: now,
            total_score: detail.total_score,
            details: detail.details,
        }
    }
}

/// One scoring event as the source reports it, e.g.
/// `["Minutes played", 90, 2]`. Kept verbatim so comparisons are exact;
/// only the third element carries the points contribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetailEntry(pub Vec<Value>);

impl DetailEntry {
    pub fn category(&self) -> Option<&Value> {
        self.0.first()
    }

    pub fn value(&self) -> Option<&Value> {
        self.0.get(2)
    }
}

/// A real-world match and its categorized events, one `"name (value)"` or
/// `"name"` string per entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: u32,
    pub details: String, // match title, e.g. "Arsenal 2 - 1 Chelsea"
    pub goals: Vec<String>,
    pub assists: Vec<String>,
    pub bps: Vec<String>,
    pub yellow_cards: Vec<String>,
    pub red_cards: Vec<String>,
    pub saves: Vec<String>,
    pub penalties_saved: Vec<String>,
    pub penalties_missed: Vec<String>,
    pub own_goals: Vec<String>,
}

// ---------------------------------------------------------------------------
// Extraction outputs
// ---------------------------------------------------------------------------

/// What a team's event-history page yields: its penalty and fifteen slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamSheet {
    pub deduction: i32,
    pub players: Vec<Player>,
}

/// Normalized player payload from the JSON elements endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerDetail {
    pub id: u32,
    pub name: String,
    pub team: String,
    pub shirt: String,
    pub position: String,
    pub total_score: i32,
    pub details: Vec<DetailEntry>,
}
