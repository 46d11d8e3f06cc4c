/// Named column layout for the fixture detail table.
///
/// The site renders one row per player with a fixed column order. Rather than
/// sprinkling cell indices through the extractor, every semantic column is
/// looked up here, and a layout is checked once when the schema is built.
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FixtureColumn {
    Name,
    Goals,
    Assists,
    OwnGoals,
    PenaltiesSaved,
    PenaltiesMissed,
    YellowCards,
    RedCards,
    Saves,
    Bonus,
}

impl FixtureColumn {
    pub const ALL: [FixtureColumn; 10] = [
        FixtureColumn::Name,
        FixtureColumn::Goals,
        FixtureColumn::Assists,
        FixtureColumn::OwnGoals,
        FixtureColumn::PenaltiesSaved,
        FixtureColumn::PenaltiesMissed,
        FixtureColumn::YellowCards,
        FixtureColumn::RedCards,
        FixtureColumn::Saves,
        FixtureColumn::Bonus,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FixtureColumn::Name => "name",
            FixtureColumn::Goals => "goals",
            FixtureColumn::Assists => "assists",
            FixtureColumn::OwnGoals => "own goals",
            FixtureColumn::PenaltiesSaved => "penalties saved",
            FixtureColumn::PenaltiesMissed => "penalties missed",
            FixtureColumn::YellowCards => "yellow cards",
            FixtureColumn::RedCards => "red cards",
            FixtureColumn::Saves => "saves",
            FixtureColumn::Bonus => "bonus",
        }
    }
}

/// Cell positions as the fixture detail page currently lays them out.
pub const SITE_LAYOUT: [(FixtureColumn, usize); 10] = [
    (FixtureColumn::Name, 0),
    (FixtureColumn::Goals, 2),
    (FixtureColumn::Assists, 3),
    (FixtureColumn::OwnGoals, 6),
    (FixtureColumn::PenaltiesSaved, 7),
    (FixtureColumn::PenaltiesMissed, 8),
    (FixtureColumn::YellowCards, 9),
    (FixtureColumn::RedCards, 10),
    (FixtureColumn::Saves, 11),
    (FixtureColumn::Bonus, 14),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    Missing(FixtureColumn),
    Shared { column: FixtureColumn, other: FixtureColumn, index: usize },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::Missing(c) => write!(f, "fixture schema has no '{}' column", c.label()),
            SchemaError::Shared { column, other, index } => write!(
                f,
                "fixture schema maps both '{}' and '{}' to cell {index}",
                column.label(),
                other.label()
            ),
        }
    }
}

impl std::error::Error for SchemaError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureSchema {
    columns: HashMap<FixtureColumn, usize>,
    min_cells: usize,
}

impl FixtureSchema {
    /// Build a schema, requiring every column exactly once and no two
    /// columns on the same cell. A later entry for the same column wins.
    pub fn new(
        layout: impl IntoIterator<Item = (FixtureColumn, usize)>,
    ) -> Result<Self, SchemaError> {
        let columns: HashMap<FixtureColumn, usize> = layout.into_iter().collect();

        for column in FixtureColumn::ALL {
            if !columns.contains_key(&column) {
                return Err(SchemaError::Missing(column));
            }
        }

        let mut by_index: HashMap<usize, FixtureColumn> = HashMap::new();
        for column in FixtureColumn::ALL {
            let index = columns[&column];
            if let Some(other) = by_index.insert(index, column) {
                return Err(SchemaError::Shared { column, other, index });
            }
        }

        Ok(Self::from_columns(columns))
    }

    fn from_columns(columns: HashMap<FixtureColumn, usize>) -> Self {
        let min_cells = columns.values().max().map_or(0, |m| m + 1);
        Self { columns, min_cells }
    }

    pub fn index(&self, column: FixtureColumn) -> usize {
        self.columns[&column]
    }

    /// Rows with fewer cells than this cannot be read with the schema.
    pub fn min_cells(&self) -> usize {
        self.min_cells
    }
}

impl Default for FixtureSchema {
    fn default() -> Self {
        Self::from_columns(SITE_LAYOUT.into_iter().collect())
    }
}
