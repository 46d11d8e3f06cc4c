use anyhow::{Context, bail};
use fpl_api::Competitor;
use fpl_api::client::DEFAULT_BASE_URL;
use log::LevelFilter;
use std::time::Duration;

const DEFAULT_DATABASE: &str = "fplsync.db";
const DEFAULT_INTERVAL_SECS: u64 = 120;

/// The league as it was set up: team id on the fantasy site and owner.
const LEAGUE: [(u32, &str); 5] = [
    (16665, "Oskar"),
    (55465, "Anders"),
    (1113, "Magnus"),
    (413689, "Robert"),
    (985532, "Martin"),
];

pub fn default_competitors() -> Vec<Competitor> {
    LEAGUE.iter().map(|&(id, name)| Competitor::new(id, name)).collect()
}

/// Flags given on the command line; they win over the environment.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub once: bool,
    pub week: Option<u32>,
    pub force_rosters: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Run(CliArgs),
    Help,
    Version,
}

impl CliCommand {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(CliCommand::Help),
                "-V" | "--version" => return Ok(CliCommand::Version),
                "--once" => parsed.once = true,
                "--force-rosters" => parsed.force_rosters = true,
                "--week" => {
                    let value = args.next().ok_or("--week needs a value")?;
                    parsed.week = Some(parse_week(&value)?);
                }
                _ => return Err(format!("Unknown argument: {arg}")),
            }
        }
        Ok(CliCommand::Run(parsed))
    }
}

fn parse_week(value: &str) -> Result<u32, String> {
    match value.trim().parse::<u32>() {
        Ok(week) if week > 0 => Ok(week),
        _ => Err(format!("week must be a positive number, got {value:?}")),
    }
}

/// Everything the process reads at startup. Loaded once and passed down.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: String,
    pub week: u32,
    pub force_rosters: bool,
    pub interval: Duration,
    pub base_url: String,
    pub competitors: Vec<Competitor>,
    pub log_level: LevelFilter,
}

impl Settings {
    pub fn load(args: &CliArgs) -> anyhow::Result<Self> {
        Self::from_lookup(args, |key| std::env::var(key).ok())
    }

    fn from_lookup(args: &CliArgs, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let week = match (args.week, var("FPLSYNC_WEEK")) {
            (Some(week), _) => week,
            (None, Some(raw)) => parse_week(&raw).map_err(anyhow::Error::msg)?,
            (None, None) => bail!("no week given: set FPLSYNC_WEEK or pass --week N"),
        };

        let interval = match var("FPLSYNC_INTERVAL_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("FPLSYNC_INTERVAL_SECS is not a number: {raw:?}"))?,
            None => DEFAULT_INTERVAL_SECS,
        };

        let competitors = match var("FPLSYNC_TEAMS") {
            Some(raw) => parse_competitors(&raw)?,
            None => default_competitors(),
        };

        let log_level = match var("FPLSYNC_LOG") {
            Some(raw) => raw
                .trim()
                .parse::<LevelFilter>()
                .ok()
                .with_context(|| format!("FPLSYNC_LOG is not a log level: {raw:?}"))?,
            None => LevelFilter::Info,
        };

        Ok(Self {
            database: var("FPLSYNC_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_owned()),
            week,
            force_rosters: args.force_rosters || var("FPLSYNC_FORCE_ROSTERS").is_some(),
            interval: Duration::from_secs(interval),
            base_url: var("FPLSYNC_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            competitors,
            log_level,
        })
    }
}

/// Parse `id=name,id=name`.
fn parse_competitors(raw: &str) -> anyhow::Result<Vec<Competitor>> {
    let competitors = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (id, name) = entry
                .split_once('=')
                .with_context(|| format!("team entry {entry:?} is not id=name"))?;
            let id = id
                .trim()
                .parse::<u32>()
                .with_context(|| format!("team id {id:?} is not a number"))?;
            Ok(Competitor::new(id, name.trim()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    if competitors.is_empty() {
        bail!("FPLSYNC_TEAMS lists no teams");
    }
    Ok(competitors)
}
