//! Typed request builders for a few stats endpoints.
//!
//! Each builder only maps its fields onto the upstream's query parameter
//! names, filling in the defaults the website itself sends.

use crate::data::DataClient;
use crate::model::Envelope;
use anyhow::Result;
use std::fmt;

pub const NBA_LEAGUE_ID: &str = "00";

/// A season in the upstream's `YYYY-YY` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Season(pub u16);

impl Season {
    /// The season in progress on `date`. Seasons roll over in October.
    pub fn containing(date: chrono::NaiveDate) -> Self {
        use chrono::Datelike;
        let year = date.year() as u16;
        if date.month() >= 10 {
            Season(year)
        } else {
            Season(year - 1)
        }
    }

    pub fn current() -> Self {
        Self::containing(chrono::Local::now().date_naive())
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.0, (u32::from(self.0) + 1) % 100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonType {
    Regular,
    Playoffs,
    PreSeason,
}

impl SeasonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonType::Regular => "Regular Season",
            SeasonType::Playoffs => "Playoffs",
            SeasonType::PreSeason => "Pre Season",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerMode {
    Totals,
    PerGame,
    Per36,
}

impl PerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerMode::Totals => "Totals",
            PerMode::PerGame => "PerGame",
            PerMode::Per36 => "Per36",
        }
    }
}

pub trait Endpoint {
    const RESOURCE: &'static str;

    fn params(&self) -> Vec<(&'static str, String)>;

    #[allow(async_fn_in_trait)]
    async fn call(&self, client: &DataClient) -> Result<Envelope> {
        client.fetch(Self::RESOURCE, &self.params()).await
    }
}

/// `leaguedashlineups`: five-man (or smaller) lineup stats.
#[derive(Debug, Clone)]
pub struct LeagueDashLineups {
    pub season: Season,
    pub season_type: SeasonType,
    pub group_quantity: u8,
    pub per_mode: PerMode,
    pub team_id: Option<u32>,
}

impl LeagueDashLineups {
    pub fn new(season: Season) -> Self {
        Self {
            season,
            season_type: SeasonType::Regular,
            group_quantity: 5,
            per_mode: PerMode::Totals,
            team_id: None,
        }
    }
}

impl Endpoint for LeagueDashLineups {
    const RESOURCE: &'static str = "leaguedashlineups";

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("GroupQuantity", self.group_quantity.to_string()),
            ("LastNGames", "0".to_string()),
            ("LeagueID", NBA_LEAGUE_ID.to_string()),
            ("MeasureType", "Base".to_string()),
            ("Month", "0".to_string()),
            ("OpponentTeamID", "0".to_string()),
            ("PaceAdjust", "N".to_string()),
            ("PerMode", self.per_mode.as_str().to_string()),
            ("Period", "0".to_string()),
            ("PlusMinus", "N".to_string()),
            ("Rank", "N".to_string()),
            ("Season", self.season.to_string()),
            ("SeasonType", self.season_type.as_str().to_string()),
            ("TeamID", self.team_id.unwrap_or(0).to_string()),
        ]
    }
}

/// `commonallplayers`: every player, or only those on a roster this season.
#[derive(Debug, Clone)]
pub struct CommonAllPlayers {
    pub season: Season,
    pub current_season_only: bool,
}

impl Endpoint for CommonAllPlayers {
    const RESOURCE: &'static str = "commonallplayers";

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("IsOnlyCurrentSeason", u8::from(self.current_season_only).to_string()),
            ("LeagueID", NBA_LEAGUE_ID.to_string()),
            ("Season", self.season.to_string()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct PlayerCareerStats {
    pub player_id: u32,
    pub per_mode: PerMode,
}

impl Endpoint for PlayerCareerStats {
    const RESOURCE: &'static str = "playercareerstats";

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("LeagueID", NBA_LEAGUE_ID.to_string()),
            ("PerMode", self.per_mode.as_str().to_string()),
            ("PlayerID", self.player_id.to_string()),
        ]
    }
}

/// `scoreboardv2` for one date (`YYYY-MM-DD`).
#[derive(Debug, Clone)]
pub struct ScoreboardV2 {
    pub game_date: chrono::NaiveDate,
    pub day_offset: i32,
}

impl Endpoint for ScoreboardV2 {
    const RESOURCE: &'static str = "scoreboardv2";

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("DayOffset", self.day_offset.to_string()),
            ("GameDate", self.game_date.format("%Y-%m-%d").to_string()),
            ("LeagueID", NBA_LEAGUE_ID.to_string()),
        ]
    }
}

/// `videodetails`. Often answers with no result sets at all.
#[derive(Debug, Clone)]
pub struct VideoDetails {
    pub player_id: u32,
    pub team_id: u32,
    pub season: Season,
    pub season_type: SeasonType,
}

impl Endpoint for VideoDetails {
    const RESOURCE: &'static str = "videodetails";

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ContextMeasure", "FGA".to_string()),
            ("LastNGames", "0".to_string()),
            ("LeagueID", NBA_LEAGUE_ID.to_string()),
            ("Month", "0".to_string()),
            ("OpponentTeamID", "0".to_string()),
            ("Period", "0".to_string()),
            ("PlayerID", self.player_id.to_string()),
            ("Season", self.season.to_string()),
            ("SeasonType", self.season_type.as_str().to_string()),
            ("TeamID", self.team_id.to_string()),
        ]
    }
}

/// Any resource with caller-supplied parameters.
#[derive(Debug, Clone, Default)]
pub struct RawEndpoint {
    pub resource: String,
    pub params: Vec<(String, String)>,
}

impl RawEndpoint {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub async fn call(&self, client: &DataClient) -> Result<Envelope> {
        client.fetch(&self.resource, &self.params).await
    }
}

/// Parse a `KEY=VALUE` pair as given on the command line.
pub fn parse_param(s: &str) -> std::result::Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", s))?;
    if k.is_empty() {
        return Err(format!("empty parameter name in {:?}", s));
    }
    Ok((k.to_string(), v.to_string()))
}
