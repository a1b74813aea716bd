use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::country::Chamber;
use crate::error::Result;
use crate::race::Candidate;
use crate::scorer::{Party, ScorerConfig};

/// Forecaster race rating, from safe Democratic to safe Republican.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceRating {
    SafeDem,
    LikelyDem,
    LeansDem,
    TossUp,
    LeansGop,
    LikelyGop,
    SafeGop,
}

impl RaceRating {
    /// The party expected to lose a race with this rating.
    pub fn underdog(self) -> Party {
        match self {
            RaceRating::LeansGop | RaceRating::LikelyGop | RaceRating::SafeGop => Party::Democrat,
            _ => Party::Republican,
        }
    }
}

/// Ratings for one chamber in one cycle, plus the poll source its codes are looked up in.
///
/// Reference (past-cycle) sheets only feed the pooled averages; ratings from current sheets
/// decide which uncontested races get an inferred projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSheet {
    pub chamber: Chamber,
    pub poll_source: String,
    pub current: bool,
    pub ratings: BTreeMap<RaceRating, BTreeSet<String>>,
}

impl RatingSheet {
    pub fn rating_of(&self, code: &str) -> Option<RaceRating> {
        self.ratings
            .iter()
            .find(|(_, codes)| codes.contains(code))
            .map(|(rating, _)| *rating)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChamberSources {
    pub electoral_college: String,
    pub house: String,
    pub senate: String,
}

impl ChamberSources {
    pub fn for_chamber(&self, chamber: Chamber) -> &str {
        match chamber {
            Chamber::ElectoralCollege => &self.electoral_college,
            Chamber::House => &self.house,
            Chamber::Senate => &self.senate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nominees {
    pub republican: Candidate,
    pub democrat: Candidate,
}

/// Everything that ties a run to one election cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionConfig {
    pub house_seats: u32,
    pub senate_seats: u32,
    pub electoral_votes: u32,
    /// States that award electoral votes by congressional district.
    pub split_vote_states: Vec<String>,
    /// Jurisdictions with electoral votes but no voting members of Congress.
    pub congress_excluded: Vec<String>,
    pub nominees: Nominees,
    pub poll_sources: ChamberSources,
    pub rating_sheets: Vec<RatingSheet>,
    #[serde(default)]
    pub scorer: ScorerConfig,
}

impl ElectionConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn seats(&self, chamber: Chamber) -> u32 {
        match chamber {
            Chamber::House => self.house_seats,
            Chamber::Senate => self.senate_seats,
            Chamber::ElectoralCollege => self.electoral_votes,
        }
    }

    pub fn is_split_vote_state(&self, postal_code: &str) -> bool {
        self.split_vote_states.iter().any(|s| s == postal_code)
    }

    pub fn is_congress_excluded(&self, postal_code: &str) -> bool {
        self.congress_excluded.iter().any(|s| s == postal_code)
    }

    /// Rating of `code` in the current-cycle sheet for `chamber`.
    pub fn current_rating(&self, chamber: Chamber, code: &str) -> Option<RaceRating> {
        self.rating_sheets
            .iter()
            .filter(|s| s.current && s.chamber == chamber)
            .find_map(|s| s.rating_of(code))
    }

    /// Presidential nominee who holds a state by default: the Democrat where the state is
    /// rated safe Democratic, the Republican everywhere else.
    pub fn default_nominee(&self, postal_code: &str) -> &Candidate {
        match self.current_rating(Chamber::ElectoralCollege, postal_code) {
            Some(RaceRating::SafeDem) => &self.nominees.democrat,
            _ => &self.nominees.republican,
        }
    }
}

impl Default for ElectionConfig {
    fn default() -> Self {
        CYCLE_2020.clone()
    }
}

fn sheet(
    chamber: Chamber,
    poll_source: &str,
    current: bool,
    ratings: &[(RaceRating, &[&str])],
) -> RatingSheet {
    RatingSheet {
        chamber,
        poll_source: poll_source.to_string(),
        current,
        ratings: ratings
            .iter()
            .map(|(rating, codes)| (*rating, codes.iter().map(|c| c.to_string()).collect()))
            .collect(),
    }
}

static CYCLE_2020: Lazy<ElectionConfig> = Lazy::new(|| {
    use RaceRating::*;

    ElectionConfig {
        house_seats: 435,
        senate_seats: 100,
        electoral_votes: 538,
        split_vote_states: vec!["ME".to_string(), "NE".to_string()],
        congress_excluded: vec!["DC".to_string()],
        nominees: Nominees {
            republican: Candidate::new("Trump", Party::Republican),
            democrat: Candidate::new("Biden", Party::Democrat),
        },
        poll_sources: ChamberSources {
            electoral_college: "ec".to_string(),
            house: "house".to_string(),
            senate: "senate".to_string(),
        },
        rating_sheets: vec![
            sheet(
                Chamber::ElectoralCollege,
                "ec",
                true,
                &[
                    (SafeDem, &["MA", "DE", "NY", "CA", "DC", "HI", "MD", "VT"]),
                    (LikelyDem, &["MECD1", "IL", "NJ", "WA", "RI", "CT"]),
                    (LeansDem, &["MI", "NM", "NH", "OR", "CO", "ME", "VA"]),
                    (
                        TossUp,
                        &[
                            "TX", "NECD2", "MECD2", "OH", "NC", "PA", "NV", "GA", "MN", "AZ",
                            "FL", "IA",
                        ],
                    ),
                    (LeansGop, &["IN", "MO", "MT", "SC"]),
                    (LikelyGop, &["UT", "AK", "LA", "KS", "MS", "AR"]),
                    (
                        SafeGop,
                        &["SD", "TN", "AL", "KY", "ID", "NE", "ND", "OK", "WV", "WY"],
                    ),
                ],
            ),
            sheet(
                Chamber::House,
                "house",
                true,
                &[
                    (
                        LikelyDem,
                        &[
                            "PA7", "FL27", "AZ2", "NY19", "CA45", "KS3", "CA7", "IL6", "WA8",
                            "IL17", "NJ5", "FL13", "NY3", "NV4", "NJ11", "NY18", "FL7",
                        ],
                    ),
                    (
                        LeansDem,
                        &[
                            "NH1", "NH2", "NJ3", "MI8", "NJ7", "NV3", "WI3", "IL14", "CA48",
                            "TX32", "AZ1", "MN2", "CA10", "MI11", "TX7",
                        ],
                    ),
                    (
                        TossUp,
                        &[
                            "CO3", "NJ2", "VA7", "GA6", "NE2", "CA25", "IN5", "TX21", "ME2",
                            "GA7", "IA2", "PA1", "NY2", "PA10", "OK5", "MO2", "SC1", "TX24",
                            "PA8", "TX23", "VA2", "TX10", "FL26", "IA1", "NY22", "IL13", "CA39",
                            "NM2", "IA3", "UT4", "TX22", "MI3", "MN7", "NY11", "PA17", "FL15",
                        ],
                    ),
                    (
                        LeansGop,
                        &[
                            "NY24", "IA4", "MI6", "AR2", "MN1", "OH12", "VA5", "KY6", "KS2",
                            "MTAL", "FL16", "WA3", "NY1", "AZ6",
                        ],
                    ),
                    (
                        LikelyGop,
                        &[
                            "AKAL", "MN8", "OH1", "CA50", "TX31", "CA8", "NY27", "CA1", "NC9",
                            "CA4", "NC8", "CA22",
                        ],
                    ),
                ],
            ),
            sheet(
                Chamber::House,
                "house_2018",
                false,
                &[
                    (
                        LikelyDem,
                        &[
                            "AZ9", "CA24", "FL13", "IA2", "NH2", "NJ2", "NJ5", "NM1", "NY3",
                            "NY18", "PA5", "PA6", "PA8", "PA17", "WI3",
                        ],
                    ),
                    (
                        LeansDem,
                        &[
                            "AZ2", "CA7", "CA49", "CO6", "FL7", "IA1", "KS3", "MN2", "MN3",
                            "NH1", "NJ7", "NJ11", "OR5", "PA7", "VA10",
                        ],
                    ),
                    (
                        TossUp,
                        &[
                            "AKAL", "AZ1", "CA10", "CA25", "CA39", "CA45", "CA48", "FL15",
                            "FL26", "FL27", "GA6", "IA3", "IL6", "IL14", "KS2", "KY6", "ME2",
                            "MI8", "MI11", "MN1", "MN7", "MTAL", "NC9", "NJ3", "NM2", "NV3",
                            "NV4", "NY19", "NY22", "PA1", "PA10", "PA16", "TX7", "TX32", "UT4",
                            "VA5",
                        ],
                    ),
                    (
                        LeansGop,
                        &[
                            "CA50", "FL16", "FL18", "GA7", "IA4", "IL12", "IL13", "MI6", "MI7",
                            "MN8", "NC2", "NC13", "NE2", "NY1", "NY11", "NY27", "OH1", "OH12",
                            "SC1", "TX23", "VA2", "WA3", "WA5", "WI1", "WV3",
                        ],
                    ),
                    (
                        LikelyGop,
                        &[
                            "AR2", "AZ6", "AZ8", "CA4", "CA21", "CA22", "CO3", "FL6", "FL25",
                            "IN2", "MO2", "NC8", "NY2", "NY24", "OH10", "OH14", "OK5", "PA14",
                            "TX21", "TX22",
                        ],
                    ),
                ],
            ),
            sheet(
                Chamber::Senate,
                "senate",
                true,
                &[
                    (LikelyDem, &["NJ", "VA"]),
                    (LeansDem, &["NH", "CO", "NM"]),
                    (TossUp, &["MN", "MI", "ME", "NC", "GA", "MT", "SC", "IA"]),
                    (LeansGop, &["TX", "MS", "KS", "AK", "GA2"]),
                    (LikelyGop, &["AL", "KY", "TN"]),
                ],
            ),
            sheet(
                Chamber::Senate,
                "senate_2018",
                false,
                &[
                    (LikelyDem, &["PA"]),
                    (LeansDem, &["MI", "MN2", "NJ", "WI", "OH"]),
                    (TossUp, &["AZ", "FL", "IN", "MO", "MT", "NV", "WV", "TN"]),
                    (LeansGop, &["ND", "TX"]),
                    (LikelyGop, &["MS2"]),
                ],
            ),
        ],
        scorer: ScorerConfig::default(),
    }
});
