use crate::extract::{self, ExtractError};
use crate::fpl::ElementResponse;
use crate::schema::FixtureSchema;
use crate::{Fixture, PlayerDetail, TeamSheet};
use log::debug;
use reqwest::Client;
use std::fmt;
use std::time::Duration;

pub type ApiResult<T> = Result<T, ApiError>;

pub const DEFAULT_BASE_URL: &str = "http://fantasy.premierleague.com";

/// The two external sources the sync engine reads: HTML pages for teams and
/// fixtures, JSON for player scores. Implemented over HTTP by [`FplApi`].
#[allow(async_fn_in_trait)]
pub trait FantasySource {
    async fn fetch_team_sheet(&self, team_id: u32, week: u32) -> ApiResult<TeamSheet>;
    async fn fetch_player(&self, player_id: u32) -> ApiResult<PlayerDetail>;
    async fn fetch_fixture_ids(&self, week: u32) -> ApiResult<Vec<u32>>;
    async fn fetch_fixture(&self, fixture_id: u32) -> ApiResult<Fixture>;
}

/// Fantasy site client. Requests are issued one at a time by the caller;
/// nothing here retries.
#[derive(Debug, Clone)]
pub struct FplApi {
    client: Client,
    base_url: String,
    timeout: Duration,
    schema: FixtureSchema,
}

impl Default for FplApi {
    fn default() -> Self {
        Self {
            client: Client::builder()
                .user_agent("fplsync/0.1 (league tracker)")
                .build()
                .unwrap_or_default(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(20),
            schema: FixtureSchema::default(),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Network(reqwest::Error, String),
    Api(reqwest::Error, String),
    Parsing(reqwest::Error, String),
    Extraction(ExtractError, String),
    NotFound(String),
}

impl ApiError {
    /// Page was fetched but did not have the expected structure.
    pub fn is_extraction(&self) -> bool {
        matches!(self, ApiError::Extraction(..))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(e, url) => write!(f, "Network error for {url}: {e}"),
            ApiError::Api(e, url) => write!(f, "API error for {url}: {e}"),
            ApiError::Parsing(e, url) => write!(f, "Parse error for {url}: {e}"),
            ApiError::Extraction(e, url) => write!(f, "Extraction error for {url}: {e}"),
            ApiError::NotFound(msg) => write!(f, "Not found: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl FplApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_schema(mut self, schema: FixtureSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn team_url(&self, team_id: u32, week: u32) -> String {
        format!("{}/entry/{team_id}/event-history/{week}/", self.base_url)
    }

    pub fn player_url(&self, player_id: u32) -> String {
        format!("{}/web/api/elements/{player_id}/", self.base_url)
    }

    pub fn fixtures_url(&self, week: u32) -> String {
        format!("{}/fixtures/{week}/", self.base_url)
    }

    pub fn fixture_url(&self, fixture_id: u32) -> String {
        format!("{}/fixture/{fixture_id}/", self.base_url)
    }

    async fn send(&self, url: &str) -> ApiResult<reqwest::Response> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ApiError::Network(e, url.to_owned()))?;

        response
            .error_for_status()
            .map_err(|e| ApiError::Api(e, url.to_owned()))
    }

    async fn get_html(&self, url: &str) -> ApiResult<String> {
        self.send(url)
            .await?
            .text()
            .await
            .map_err(|e| ApiError::Parsing(e, url.to_owned()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        self.send(url)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parsing(e, url.to_owned()))
    }
}

impl FantasySource for FplApi {
    async fn fetch_team_sheet(&self, team_id: u32, week: u32) -> ApiResult<TeamSheet> {
        let url = self.team_url(team_id, week);
        let html = self.get_html(&url).await?;
        extract::extract_team_sheet(&html).map_err(|e| ApiError::Extraction(e, url))
    }

    async fn fetch_player(&self, player_id: u32) -> ApiResult<PlayerDetail> {
        let url = self.player_url(player_id);
        let raw: ElementResponse = self.get_json(&url).await?;
        if raw.id != player_id {
            return Err(ApiError::NotFound(format!(
                "asked {url} for player {player_id}, got player {}",
                raw.id
            )));
        }
        Ok(raw.into())
    }

    async fn fetch_fixture_ids(&self, week: u32) -> ApiResult<Vec<u32>> {
        let url = self.fixtures_url(week);
        let html = self.get_html(&url).await?;
        extract::extract_fixture_ids(&html).map_err(|e| ApiError::Extraction(e, url))
    }

    async fn fetch_fixture(&self, fixture_id: u32) -> ApiResult<Fixture> {
        let url = self.fixture_url(fixture_id);
        let html = self.get_html(&url).await?;
        extract::extract_fixture(fixture_id, &html, &self.schema)
            .map_err(|e| ApiError::Extraction(e, url))
    }
}
