//! Squad model: response teams ingested from spreadsheet data.

use serde::{Deserialize, Serialize};

/// Equipment a squad carries into the field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SquadEquipment {
    #[serde(rename = "hasPPE")]
    pub has_ppe: bool,
    pub ppe_description: String,
    pub has_tools: bool,
    pub tools_description: String,
    pub has_machinery: bool,
    pub machinery_description: String,
    pub has_water: bool,
}

/// Free-text competencies declared by the squad.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SquadSkills {
    pub operational: String,
    pub health_safety: String,
    pub logistics: String,
    pub communications: String,
    pub management: String,
}

/// Current deployment of the squad.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SquadMission {
    pub departure_day: String,
    pub departure_time: String,
    pub return_time: String,
    pub has_returned: bool,
    pub coordination_notes: String,
    pub last_update: String,
}

/// A response team record.
///
/// `lat`/`lng` are always serialized, as `null` when unknown, so that a
/// consumer merging records clears a stale position instead of keeping it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Squad {
    pub id: String,
    pub leader_name: String,
    pub leader_dni: String,
    pub leader_phone: String,
    pub lodging_location: String,
    pub name: String,
    pub members_count: u32,
    pub intervention_zone: String,
    pub location_link: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub equipment: SquadEquipment,
    pub skills: SquadSkills,
    pub mission: SquadMission,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionReport {
    /// Rows written in the run
    pub count: usize,
    /// Header cells that matched no known column
    pub unmapped_columns: Vec<String>,
    /// Known columns that were not present in the header
    pub missing_columns: Vec<String>,
}

/// Request body for syncing from a published sheet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncSquadsRequest {
    /// Overrides the stored sheet URL for this run
    #[serde(default)]
    pub url: Option<String>,
}
