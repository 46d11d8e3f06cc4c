//! SQLite persistence for rounds and per-week player score records.
//!
//! Only this module talks to the database. Embedded lists (teams, fixtures,
//! score details) are stored as JSON text, so each row reads back as a whole
//! document.

use fpl_api::{GlobalPlayer, Round};
use log::warn;
use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension, params};
use std::fmt;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Json(serde_json::Error),
    /// Insert would break a uniqueness constraint.
    Duplicate(String),
    /// Save targeted a record that was never created.
    Missing(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "database error: {e}"),
            StoreError::Json(e) => write!(f, "stored document is not valid JSON: {e}"),
            StoreError::Duplicate(what) => write!(f, "{what} already exists"),
            StoreError::Missing(what) => write!(f, "{what} does not exist"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Json(e)
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a store from a descriptor: a file path, `sqlite://path`, or
    /// `:memory:`.
    pub fn open(descriptor: &str) -> StoreResult<Self> {
        let path = descriptor.strip_prefix("sqlite://").unwrap_or(descriptor);
        if path == ":memory:" {
            return Self::in_memory();
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        enable_wal(&conn, path);
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests and `--once` dry runs).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open(":memory:")?;
        Ok(Self { conn })
    }

    /// Create tables and uniqueness constraints. Safe to run every start.
    pub fn migrate(&self) -> StoreResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_init.sql"))?;
        Ok(())
    }

    // ── Rounds ─────────────────────────────────────────────────

    pub fn find_round(&self, week: u32) -> StoreResult<Option<Round>> {
        let row = self
            .conn
            .query_row(
                "SELECT teams, fixtures FROM rounds WHERE week = ?1",
                params![week],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((teams, fixtures)) = row else { return Ok(None) };
        Ok(Some(Round {
            week,
            teams: serde_json::from_str(&teams)?,
            fixtures: serde_json::from_str(&fixtures)?,
        }))
    }

    pub fn create_round(&self, round: &Round) -> StoreResult<()> {
        let teams = serde_json::to_string(&round.teams)?;
        let fixtures = serde_json::to_string(&round.fixtures)?;
        self.conn
            .execute(
                "INSERT INTO rounds (week, teams, fixtures) VALUES (?1, ?2, ?3)",
                params![round.week, teams, fixtures],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::Duplicate(format!("round for week {}", round.week))
                } else {
                    e.into()
                }
            })?;
        Ok(())
    }

    /// Overwrite every stored field of an existing round.
    pub fn save_round(&self, round: &Round) -> StoreResult<()> {
        let teams = serde_json::to_string(&round.teams)?;
        let fixtures = serde_json::to_string(&round.fixtures)?;
        let changed = self.conn.execute(
            "UPDATE rounds SET teams = ?2, fixtures = ?3 WHERE week = ?1",
            params![round.week, teams, fixtures],
        )?;
        if changed == 0 {
            return Err(StoreError::Missing(format!("round for week {}", round.week)));
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn round_count(&self, week: u32) -> StoreResult<i64> {
        let count =
            self.conn
                .query_row("SELECT COUNT(*) FROM rounds WHERE week = ?1", params![week], |row| {
                    row.get(0)
                })?;
        Ok(count)
    }

    // ── Global players ─────────────────────────────────────────

    pub fn find_global_player(&self, player_id: u32, week: u32) -> StoreResult<Option<GlobalPlayer>> {
        let row = self
            .conn
            .query_row(
                "SELECT name, team, shirt, position, updated, last_change, total_score, details
                 FROM global_players WHERE player_id = ?1 AND week = ?2",
                params![player_id, week],
                |row| {
                    Ok((
                        GlobalPlayer {
                            player_id,
                            name: row.get(0)?,
                            team: row.get(1)?,
                            shirt: row.get(2)?,
                            position: row.get(3)?,
                            week,
                            updated: row.get(4)?,
                            last_change: row.get(5)?,
                            total_score: row.get(6)?,
                            details: Vec::new(),
                        },
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((mut player, details)) = row else { return Ok(None) };
        player.details = serde_json::from_str(&details)?;
        Ok(Some(player))
    }

    pub fn create_global_player(&self, player: &GlobalPlayer) -> StoreResult<()> {
        let details = serde_json::to_string(&player.details)?;
        self.conn
            .execute(
                "INSERT INTO global_players
                 (player_id, week, name, team, shirt, position, updated, last_change, total_score, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    player.player_id,
                    player.week,
                    player.name,
                    player.team,
                    player.shirt,
                    player.position,
                    player.updated,
                    player.last_change,
                    player.total_score,
                    details,
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::Duplicate(format!(
                        "player {} for week {}",
                        player.player_id, player.week
                    ))
                } else {
                    e.into()
                }
            })?;
        Ok(())
    }

    /// Overwrite every mutable field of an existing player record.
    pub fn save_global_player(&self, player: &GlobalPlayer) -> StoreResult<()> {
        let details = serde_json::to_string(&player.details)?;
        let changed = self.conn.execute(
            "UPDATE global_players
             SET name = ?3, team = ?4, shirt = ?5, position = ?6,
                 updated = ?7, last_change = ?8, total_score = ?9, details = ?10
             WHERE player_id = ?1 AND week = ?2",
            params![
                player.player_id,
                player.week,
                player.name,
                player.team,
                player.shirt,
                player.position,
                player.updated,
                player.last_change,
                player.total_score,
                details,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::Missing(format!(
                "player {} for week {}",
                player.player_id, player.week
            )));
        }
        Ok(())
    }

    pub fn global_player_count(&self, week: u32) -> StoreResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM global_players WHERE week = ?1",
            params![week],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// WAL lets a reporting process read while a tick is writing. The store
/// still works without it, so a refusal is only logged.
fn enable_wal(conn: &Connection, path: &str) {
    match conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get::<_, String>(0)) {
        Ok(mode) if mode.eq_ignore_ascii_case("wal") => {}
        Ok(mode) => warn!("{path} stays in {mode} journal mode; readers may block during ticks"),
        Err(e) => warn!("Could not switch {path} to WAL journal mode: {e}"),
    }
}
