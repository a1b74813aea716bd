use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classifier::RollCallVote;
use crate::error::Result;
use crate::polls::PollLibrary;
use crate::scorer::{Party, ScoreRow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateInfo {
    pub name: String,
    pub postal_code: String,
    pub electoral_votes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictTurnout {
    /// Postal code plus district, e.g. `"PA7"` or `"AKAL"`.
    pub code: String,
    pub turnout: u64,
}

/// A sitting senator or representative, used as the default incumbent of their seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Officeholder {
    /// State name or postal code.
    pub state: String,
    #[serde(default)]
    pub district: Option<String>,
    pub name: String,
    pub party: Party,
}

impl Officeholder {
    pub fn serves(&self, state: &StateInfo) -> bool {
        self.state == state.name || self.state == state.postal_code
    }

    /// District label with at-large seats written as `"AL"`.
    pub fn district_label(&self) -> &str {
        match self.district.as_deref().map(str::trim) {
            None | Some("") | Some("0") => "AL",
            Some(d) => d,
        }
    }
}

/// Every table the model is built from, loaded once before any computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElectionSnapshot {
    #[serde(default)]
    pub score_rows: Vec<ScoreRow>,
    pub states: Vec<StateInfo>,
    /// Statewide ballots, keyed by postal code.
    #[serde(default)]
    pub state_turnouts: BTreeMap<String, u64>,
    #[serde(default)]
    pub district_turnouts: Vec<DistrictTurnout>,
    #[serde(default)]
    pub senators: Vec<Officeholder>,
    #[serde(default)]
    pub representatives: Vec<Officeholder>,
    /// Poll libraries keyed by source name (`"ec"`, `"house"`, `"senate"`, ...).
    #[serde(default)]
    pub polls: BTreeMap<String, PollLibrary>,
    #[serde(default)]
    pub roll_call: Vec<RollCallVote>,
}

impl ElectionSnapshot {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// District ballots summed per code; precinct-level rows collapse into one entry.
    pub fn district_turnout_totals(&self) -> BTreeMap<String, u64> {
        let mut totals = BTreeMap::new();
        for row in &self.district_turnouts {
            *totals.entry(row.code.trim().to_string()).or_insert(0) += row.turnout;
        }
        totals
    }

    pub fn poll_library(&self, source: &str) -> Option<&PollLibrary> {
        self.polls.get(source)
    }

    pub fn senators_of<'a>(&'a self, state: &'a StateInfo) -> impl Iterator<Item = &'a Officeholder> {
        self.senators.iter().filter(move |s| s.serves(state))
    }

    pub fn representatives_of<'a>(
        &'a self,
        state: &'a StateInfo,
    ) -> impl Iterator<Item = &'a Officeholder> {
        self.representatives.iter().filter(move |r| r.serves(state))
    }
}
