//! Record extractors: parsed HTML in, domain records out.
//!
//! Everything here is pure. Fetching lives in `client.rs`; these functions
//! only see page bodies, which keeps them testable against saved markup.

use crate::fpl::SlotPayload;
use crate::schema::{FixtureColumn, FixtureSchema};
use crate::{Fixture, Player, TeamSheet};
use log::{debug, warn};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// Slots on a team's pitch view: eleven starters and four substitutes.
pub const ROSTER_SLOTS: usize = 15;

static DEDUCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(-(\d+)pts\)").expect("deduction pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    Selector { css: String, reason: String },
    MissingElement(String),
    MissingAttribute { element: String, attribute: &'static str },
    MalformedSlot { slot: usize, reason: String },
    ShortRow { row: usize, cells: usize, needed: usize },
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::Selector { css, reason } => write!(f, "bad selector {css}: {reason}"),
            ExtractError::MissingElement(what) => write!(f, "element not found: {what}"),
            ExtractError::MissingAttribute { element, attribute } => {
                write!(f, "{element} has no '{attribute}' attribute")
            }
            ExtractError::MalformedSlot { slot, reason } => {
                write!(f, "roster slot {slot} is malformed: {reason}")
            }
            ExtractError::ShortRow { row, cells, needed } => {
                write!(f, "fixture row {row} has {cells} cells, need at least {needed}")
            }
        }
    }
}

impl std::error::Error for ExtractError {}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector {
        css: css.to_owned(),
        reason: format!("{e:?}"),
    })
}

/// Text content with every whitespace run collapsed to one space.
fn collapsed_text(element: ElementRef<'_>) -> String {
    let raw: String = element.text().collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Team pages
// ---------------------------------------------------------------------------

/// Read a points penalty written as `(-Npts)`. Whitespace inside the
/// annotation is ignored; no annotation means no deduction.
pub fn parse_deduction(text: &str) -> i32 {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let Some(caps) = DEDUCTION.captures(&compact) else {
        return 0;
    };
    match caps[1].parse() {
        Ok(points) => points,
        Err(e) => {
            warn!("deduction {:?} is out of range ({e}), recording no deduction", &caps[1]);
            0
        }
    }
}

/// Extract the deduction and the fifteen roster slots from a team's
/// event-history page. A missing or unreadable slot fails the whole sheet.
pub fn extract_team_sheet(html: &str) -> Result<TeamSheet, ExtractError> {
    let document = Html::parse_document(html);

    let summary = selector("dl.ismDefList.ismSBDefList dd")?;
    let deduction = match document.select(&summary).last() {
        Some(dd) => parse_deduction(&dd.html()),
        None => {
            debug!("no summary block on team page, assuming no deduction");
            0
        }
    };

    let mut players = Vec::with_capacity(ROSTER_SLOTS);
    for slot in 1..=ROSTER_SLOTS {
        let css = format!("#ismGraphical{slot}");
        let slot_selector = selector(&css)?;
        let element = document
            .select(&slot_selector)
            .next()
            .ok_or_else(|| ExtractError::MissingElement(css.clone()))?;
        let class = element
            .value()
            .attr("class")
            .ok_or(ExtractError::MissingAttribute { element: css, attribute: "class" })?;
        players.push(parse_slot(slot, class)?);
    }

    Ok(TeamSheet { deduction, players })
}

/// The slot's class attribute reads like `ismElement {"id": 12, ...}`;
/// the JSON object runs from the first `{` to the last `}`.
fn parse_slot(slot: usize, class: &str) -> Result<Player, ExtractError> {
    let (Some(start), Some(end)) = (class.find('{'), class.rfind('}')) else {
        return Err(ExtractError::MalformedSlot {
            slot,
            reason: "no embedded JSON object".into(),
        });
    };
    if end < start {
        return Err(ExtractError::MalformedSlot { slot, reason: "unbalanced braces".into() });
    }

    serde_json::from_str::<SlotPayload>(&class[start..=end])
        .map(Player::from)
        .map_err(|e| ExtractError::MalformedSlot { slot, reason: e.to_string() })
}

// ---------------------------------------------------------------------------
// Fixture pages
// ---------------------------------------------------------------------------

/// Fixture ids linked from a week's fixture index, in page order, each once.
/// A page without the fixture table is an error, not an empty week.
pub fn extract_fixture_ids(html: &str) -> Result<Vec<u32>, ExtractError> {
    let document = Html::parse_document(html);
    let table = document
        .select(&selector("#ismFixtureTable")?)
        .next()
        .ok_or_else(|| ExtractError::MissingElement("#ismFixtureTable".into()))?;
    let links = selector("a[data-id]")?;

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for link in table.select(&links) {
        let Some(raw) = link.value().attr("data-id") else { continue };
        match raw.trim().parse::<u32>() {
            Ok(id) if seen.insert(id) => ids.push(id),
            Ok(_) => {}
            Err(_) => warn!("skipping fixture link with non-numeric id {raw:?}"),
        }
    }
    Ok(ids)
}

/// One player row of a fixture detail table, cell text already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureRow {
    cells: Vec<String>,
}

impl FixtureRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    fn cell(&self, schema: &FixtureSchema, column: FixtureColumn) -> &str {
        self.cells.get(schema.index(column)).map(String::as_str).unwrap_or("")
    }

    fn counts(&self, schema: &FixtureSchema, column: FixtureColumn) -> bool {
        let value = self.cell(schema, column);
        !value.is_empty() && value != "0"
    }

    fn bonus(&self, schema: &FixtureSchema) -> i32 {
        self.cell(schema, FixtureColumn::Bonus).parse().unwrap_or(0)
    }
}

/// Extract one fixture's title and categorized events from its detail page.
pub fn extract_fixture(
    id: u32,
    html: &str,
    schema: &FixtureSchema,
) -> Result<Fixture, ExtractError> {
    let document = Html::parse_document(html);

    let title_selector = selector("#ismFixtureDetailTitle")?;
    let title = document
        .select(&title_selector)
        .next()
        .map(collapsed_text)
        .ok_or_else(|| ExtractError::MissingElement("#ismFixtureDetailTitle".into()))?;

    let row_selector = selector(".ismFixtureDetailTable tr")?;
    let rows = document
        .select(&row_selector)
        .filter(|row| !is_heading_row(*row))
        .enumerate()
        .map(|(i, row)| {
            let cells: Vec<String> =
                row.children().filter_map(ElementRef::wrap).map(collapsed_text).collect();
            if cells.len() < schema.min_cells() {
                return Err(ExtractError::ShortRow {
                    row: i,
                    cells: cells.len(),
                    needed: schema.min_cells(),
                });
            }
            Ok(FixtureRow::new(cells))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(build_fixture(id, title, &rows, schema))
}

fn is_heading_row(row: ElementRef<'_>) -> bool {
    row.children()
        .filter_map(ElementRef::wrap)
        .next()
        .is_some_and(|first| first.value().name() == "th")
}

/// Derive the categorized event lists from the player rows.
pub fn build_fixture(
    id: u32,
    details: String,
    rows: &[FixtureRow],
    schema: &FixtureSchema,
) -> Fixture {
    let with_value = |column: FixtureColumn| -> Vec<String> {
        rows.iter()
            .filter(|r| r.counts(schema, column))
            .map(|r| format!("{} ({})", r.cell(schema, FixtureColumn::Name), r.cell(schema, column)))
            .collect()
    };
    let name_only = |column: FixtureColumn| -> Vec<String> {
        rows.iter()
            .filter(|r| r.counts(schema, column))
            .map(|r| r.cell(schema, FixtureColumn::Name).to_owned())
            .collect()
    };

    // sort_by_key is stable: equal bonus keeps page order.
    let mut ranked: Vec<&FixtureRow> = rows.iter().collect();
    ranked.sort_by_key(|r| Reverse(r.bonus(schema)));
    let bps = ranked
        .into_iter()
        .map(|r| {
            format!(
                "{} ({})",
                r.cell(schema, FixtureColumn::Name),
                r.cell(schema, FixtureColumn::Bonus)
            )
        })
        .collect();

    Fixture {
        id,
        details,
        goals: with_value(FixtureColumn::Goals),
        assists: with_value(FixtureColumn::Assists),
        bps,
        yellow_cards: name_only(FixtureColumn::YellowCards),
        red_cards: name_only(FixtureColumn::RedCards),
        saves: with_value(FixtureColumn::Saves),
        penalties_saved: with_value(FixtureColumn::PenaltiesSaved),
        penalties_missed: with_value(FixtureColumn::PenaltiesMissed),
        own_goals: with_value(FixtureColumn::OwnGoals),
    }
}
