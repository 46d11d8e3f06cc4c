/// Wire types for the fantasy site's JSON payloads.
/// Player endpoint: {base}/web/api/elements/{id}/
use crate::{DetailEntry, Player, PlayerDetail};
use serde::Deserialize;

#[derive(Deserialize, Default, Debug)]
pub struct ElementResponse {
    pub id: u32,
    #[serde(default)]
    pub web_name: String,
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub shirt_image_url: String,
    #[serde(default)]
    pub type_name: String,
    /// Points for the current event only, not the season total.
    #[serde(default)]
    pub event_points: i32,
    /// `[category, description, points]` tuples; empty before kick-off.
    #[serde(default)]
    pub event_explain: Vec<DetailEntry>,
}

impl From<ElementResponse> for PlayerDetail {
    fn from(raw: ElementResponse) -> Self {
        PlayerDetail {
            id: raw.id,
            name: raw.web_name,
            team: raw.team_name,
            shirt: raw.shirt_image_url,
            position: raw.type_name,
            total_score: raw.event_points,
            details: raw.event_explain,
        }
    }
}

/// JSON object the team page smuggles into each pitch slot's `class`
/// attribute. The slot carries many more keys; only these are read.
#[derive(Deserialize, Default, Debug)]
pub struct SlotPayload {
    pub id: u32,
    #[serde(default)]
    pub is_captain: bool,
    #[serde(default)]
    pub is_vice_captain: bool,
}

impl From<SlotPayload> for Player {
    fn from(raw: SlotPayload) -> Self {
        Player {
            player_id: raw.id,
            captain: raw.is_captain,
            vice_captain: raw.is_vice_captain,
        }
    }
}
