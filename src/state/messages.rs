use std::fmt;

/// Per-run inputs threaded into every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOptions {
    pub week: u32,
    /// Refetch every roster even when the round already has them.
    pub force_rosters: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreOutcome {
    /// Fetched details matched the stored ones; nothing written.
    Unchanged,
    Updated { significant: bool, total_score: i32 },
    /// Player left for the next tick.
    Skipped { reason: String },
}

/// What one pass of the sync sequence did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub week: u32,
    pub round_created: bool,
    pub rosters_synced: bool,
    pub relevant_players: usize,
    pub created_players: Vec<u32>,
    pub scores: Vec<(u32, ScoreOutcome)>,
    pub fixtures: usize,
}

impl TickSummary {
    pub fn skipped(&self) -> impl Iterator<Item = (u32, &str)> {
        self.scores.iter().filter_map(|(id, outcome)| match outcome {
            ScoreOutcome::Skipped { reason } => Some((*id, reason.as_str())),
            _ => None,
        })
    }

    pub fn changed(&self) -> impl Iterator<Item = u32> + '_ {
        self.scores.iter().filter_map(|(id, outcome)| match outcome {
            ScoreOutcome::Updated { significant: true, .. } => Some(*id),
            _ => None,
        })
    }

    pub fn updated_count(&self) -> usize {
        self.scores
            .iter()
            .filter(|(_, o)| matches!(o, ScoreOutcome::Updated { .. }))
            .count()
    }
}

impl fmt::Display for TickSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "week {}: {} players ({} new), {} updated ({} changed), {} skipped, {} fixtures",
            self.week,
            self.relevant_players,
            self.created_players.len(),
            self.updated_count(),
            self.changed().count(),
            self.skipped().count(),
            self.fixtures,
        )?;
        if self.round_created {
            write!(f, ", round created")?;
        } else if self.rosters_synced {
            write!(f, ", rosters refreshed")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_outcomes() {
        let summary = TickSummary {
            week: 3,
            relevant_players: 4,
            created_players: vec![8],
            scores: vec![
                (1, ScoreOutcome::Unchanged),
                (2, ScoreOutcome::Updated { significant: true, total_score: 6 }),
                (3, ScoreOutcome::Updated { significant: false, total_score: 1 }),
                (8, ScoreOutcome::Skipped { reason: "timed out".into() }),
            ],
            fixtures: 10,
            ..Default::default()
        };

        assert_eq!(summary.updated_count(), 2);
        assert_eq!(summary.changed().collect::<Vec<_>>(), vec![2]);
        assert_eq!(summary.skipped().collect::<Vec<_>>(), vec![(8, "timed out")]);
        assert_eq!(
            summary.to_string(),
            "week 3: 4 players (1 new), 2 updated (1 changed), 1 skipped, 10 fixtures"
        );
    }
}
