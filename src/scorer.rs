use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

pub const REPUBLICAN_PARTY_CODE: i32 = 200;
pub const DEMOCRATIC_PARTY_CODE: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Party {
    Republican,
    Democrat,
    Independent,
}

impl Party {
    pub fn from_party_code(code: i32) -> Self {
        match code {
            REPUBLICAN_PARTY_CODE => Party::Republican,
            DEMOCRATIC_PARTY_CODE => Party::Democrat,
            _ => Party::Independent,
        }
    }

    /// Anything other than `R` or `D` is treated as independent.
    pub fn from_label(label: char) -> Self {
        match label.to_ascii_uppercase() {
            'R' => Party::Republican,
            'D' => Party::Democrat,
            _ => Party::Independent,
        }
    }

    pub fn label(self) -> char {
        match self {
            Party::Republican => 'R',
            Party::Democrat => 'D',
            Party::Independent => 'I',
        }
    }

    /// The opposing major party; independents are opposed by Republicans.
    pub fn opponent(self) -> Self {
        match self {
            Party::Republican => Party::Democrat,
            _ => Party::Republican,
        }
    }
}

impl From<String> for Party {
    fn from(raw: String) -> Self {
        raw.trim()
            .chars()
            .next()
            .map(Party::from_label)
            .unwrap_or(Party::Independent)
    }
}

impl From<Party> for String {
    fn from(party: Party) -> Self {
        party.label().to_string()
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Two-dimensional roll-call ideology score (DW-NOMINATE dimensions 1 and 2).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IdeologyScore(pub [f64; 2]);

impl IdeologyScore {
    pub const ZERO: IdeologyScore = IdeologyScore([0.0, 0.0]);

    pub fn new(dim1: f64, dim2: f64) -> Self {
        Self([dim1, dim2])
    }

    pub fn dim1(&self) -> f64 {
        self.0[0]
    }

    pub fn dim2(&self) -> f64 {
        self.0[1]
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl Add for IdeologyScore {
    type Output = IdeologyScore;

    fn add(self, rhs: Self) -> Self {
        Self([self.0[0] + rhs.0[0], self.0[1] + rhs.0[1]])
    }
}

impl Sub for IdeologyScore {
    type Output = IdeologyScore;

    fn sub(self, rhs: Self) -> Self {
        Self([self.0[0] - rhs.0[0], self.0[1] - rhs.0[1]])
    }
}

impl Mul<f64> for IdeologyScore {
    type Output = IdeologyScore;

    fn mul(self, rhs: f64) -> Self {
        Self([self.0[0] * rhs, self.0[1] * rhs])
    }
}

/// Incremental (Welford) mean of the scores observed under one key.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    count: u64,
    mean: IdeologyScore,
}

impl RunningMean {
    pub fn observe(&mut self, score: IdeologyScore) {
        self.count += 1;
        let delta = score - self.mean;
        self.mean = self.mean + delta * (1.0 / self.count as f64);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> IdeologyScore {
        self.mean
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct StateMeans {
    overall: RunningMean,
    republican: RunningMean,
    democrat: RunningMean,
}

impl StateMeans {
    fn for_party(&self, party: Party) -> IdeologyScore {
        match party {
            Party::Republican => self.republican.mean(),
            Party::Democrat => self.democrat.mean(),
            Party::Independent => self.overall.mean(),
        }
    }
}

/// One historical member-congress record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRow {
    pub congress: u32,
    pub bioname: String,
    pub state_abbrev: String,
    pub party_code: i32,
    #[serde(default)]
    pub nominate_dim1: Option<f64>,
    #[serde(default)]
    pub nominate_dim2: Option<f64>,
    pub icpsr: u64,
}

impl ScoreRow {
    fn score(&self) -> Option<IdeologyScore> {
        let (Some(d1), Some(d2)) = (self.nominate_dim1, self.nominate_dim2) else {
            return None;
        };
        let score = IdeologyScore::new(d1, d2);
        score.is_finite().then_some(score)
    }

    fn surname(&self) -> String {
        self.bioname
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    }
}

/// Replaces any lookup key starting with `prefix` by `key`.
///
/// Used to pin non-legislator names (e.g. a presidential nominee) to the member whose record
/// serves as their ideological proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameAlias {
    pub prefix: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    pub congress_floor: u32,
    pub current_congress_floor: u32,
    #[serde(default)]
    pub name_aliases: Vec<NameAlias>,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            congress_floor: 107,
            current_congress_floor: 102,
            name_aliases: vec![
                // Rick Scott tops the "Trump score" among sitting senators.
                NameAlias {
                    prefix: "trump".to_string(),
                    key: "scott_FL_R".to_string(),
                },
                NameAlias {
                    prefix: "biden".to_string(),
                    key: "biden_DE_D".to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScoreTable {
    members: HashMap<String, IdeologyScore>,
    voters: HashMap<u64, IdeologyScore>,
    state_means: HashMap<String, StateMeans>,
    aliases: Vec<NameAlias>,
}

impl ScoreTable {
    pub fn build(rows: &[ScoreRow], config: &ScorerConfig) -> Self {
        let mut table = ScoreTable {
            aliases: config.name_aliases.clone(),
            ..Default::default()
        };
        let mut skipped = 0usize;

        for row in rows.iter().filter(|r| r.congress >= config.congress_floor) {
            let Some(score) = row.score() else {
                skipped += 1;
                continue;
            };
            let state = row.state_abbrev.trim().to_string();
            let party = Party::from_party_code(row.party_code);

            if row.congress >= config.current_congress_floor {
                table
                    .members
                    .insert(member_key(&row.surname(), &state, party), score);
                table.voters.insert(row.icpsr, score);
            }

            let means = table.state_means.entry(state).or_default();
            match party {
                Party::Republican => means.republican.observe(score),
                Party::Democrat => means.democrat.observe(score),
                Party::Independent => {}
            }
            means.overall.observe(score);
        }

        tracing::info!(
            members = table.members.len(),
            states = table.state_means.len(),
            skipped,
            "built ideology score table"
        );
        table
    }

    /// Ordered lookup keys for `name` in the state of `code`, most specific first.
    ///
    /// "John Smith Jr" yields keys for "john smith jr", "smith jr" and "jr".
    pub fn candidate_keys(&self, name: &str, party: Party, code: &str) -> Vec<String> {
        let state = state_of(code);
        let tokens: Vec<&str> = name.split_whitespace().collect();
        (0..tokens.len())
            .map(|start| {
                let surname = tokens[start..].join(" ").to_lowercase();
                let key = member_key(&surname, state, party);
                self.aliases
                    .iter()
                    .find(|alias| key.starts_with(alias.prefix.as_str()))
                    .map(|alias| alias.key.clone())
                    .unwrap_or(key)
            })
            .collect()
    }

    /// Always returns a score: exact member match first, else the state/party mean.
    pub fn get_score(&self, name: &str, party: Party, code: &str) -> IdeologyScore {
        self.candidate_keys(name, party, code)
            .iter()
            .find_map(|key| self.members.get(key).copied())
            .unwrap_or_else(|| self.fallback_score(party, code))
    }

    pub fn fallback_score(&self, party: Party, code: &str) -> IdeologyScore {
        self.state_means
            .get(state_of(code))
            .map(|means| means.for_party(party))
            .unwrap_or(IdeologyScore::ZERO)
    }

    pub fn get_voter_score(&self, voter_id: u64) -> Result<IdeologyScore> {
        self.voters
            .get(&voter_id)
            .copied()
            .ok_or(ModelError::VoterNotFound(voter_id))
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

pub fn state_of(code: &str) -> &str {
    code.get(..2).unwrap_or(code)
}

fn member_key(surname: &str, state: &str, party: Party) -> String {
    format!("{surname}_{state}_{}", party.label())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(congress: u32, bioname: &str, state: &str, party_code: i32, d1: f64, d2: f64) -> ScoreRow {
        ScoreRow {
            congress,
            bioname: bioname.to_string(),
            state_abbrev: state.to_string(),
            party_code,
            nominate_dim1: Some(d1),
            nominate_dim2: Some(d2),
            icpsr: (bioname.len() as u64) * 1000 + congress as u64,
        }
    }

    fn plain_config() -> ScorerConfig {
        ScorerConfig {
            name_aliases: Vec::new(),
            ..Default::default()
        }
    }

    #[test]
    fn exact_match_beats_fallback() {
        let rows = vec![
            row(116, "SMITH, John", "TX", 200, 0.6, 0.1),
            row(116, "JONES, Amy", "TX", 200, 0.2, -0.1),
        ];
        let table = ScoreTable::build(&rows, &plain_config());
        assert_eq!(
            table.get_score("John Smith", Party::Republican, "TX7"),
            IdeologyScore::new(0.6, 0.1)
        );
        let fallback = table.get_score("Nobody Known", Party::Republican, "TX7");
        assert!((fallback.dim1() - 0.4).abs() < 1e-12);
        assert!(fallback.dim2().abs() < 1e-12);
    }

    #[test]
    fn candidate_keys_run_from_full_name_to_last_token() {
        let table = ScoreTable::build(&[], &plain_config());
        assert_eq!(
            table.candidate_keys("John Smith Jr", Party::Democrat, "GA2"),
            vec!["john smith jr_GA_D", "smith jr_GA_D", "jr_GA_D"]
        );
    }

    #[test]
    fn suffixed_surname_resolves_through_shorter_key() {
        let rows = vec![row(116, "SMITH JR, Robert", "GA", 100, -0.3, 0.2)];
        let table = ScoreTable::build(&rows, &plain_config());
        assert_eq!(
            table.get_score("Bob Smith Jr", Party::Democrat, "GA"),
            IdeologyScore::new(-0.3, 0.2)
        );
    }

    #[test]
    fn aliases_pin_nominee_names() {
        let rows = vec![row(116, "SCOTT, Rick", "FL", 200, 0.9, 0.3)];
        let table = ScoreTable::build(&rows, &ScorerConfig::default());
        let keys = table.candidate_keys("Trump", Party::Republican, "FL");
        assert_eq!(keys, vec!["scott_FL_R"]);
        assert_eq!(
            table.get_score("Trump", Party::Republican, "FL"),
            IdeologyScore::new(0.9, 0.3)
        );
    }

    #[test]
    fn nan_and_old_rows_are_skipped() {
        let mut bad = row(116, "DOE, Jane", "OH", 100, f64::NAN, 0.1);
        bad.icpsr = 7;
        let old = row(90, "OLD, Timer", "OH", 100, -0.9, 0.0);
        let good = row(116, "ROE, Ann", "OH", 100, -0.4, 0.0);
        let table = ScoreTable::build(&[bad, old, good.clone()], &plain_config());
        assert!(matches!(
            table.get_voter_score(7),
            Err(ModelError::VoterNotFound(7))
        ));
        assert_eq!(table.fallback_score(Party::Democrat, "OH"), IdeologyScore::new(-0.4, 0.0));
        assert!(table.get_voter_score(good.icpsr).is_ok());
    }

    #[test]
    fn exact_lookup_only_for_current_congress() {
        let config = ScorerConfig {
            congress_floor: 100,
            current_congress_floor: 116,
            name_aliases: Vec::new(),
        };
        let rows = vec![
            row(110, "PAST, Member", "WA", 100, -0.8, 0.0),
            row(116, "NOW, Member", "WA", 100, -0.2, 0.0),
        ];
        let table = ScoreTable::build(&rows, &config);
        assert_eq!(table.member_count(), 1);
        // Past members still shape the state mean.
        assert!((table.fallback_score(Party::Democrat, "WA").dim1() + 0.5).abs() < 1e-12);
        assert!((table.get_score("Member Past", Party::Democrat, "WA").dim1() + 0.5).abs() < 1e-12);
    }

    #[test]
    fn unseen_state_falls_back_to_zero() {
        let table = ScoreTable::build(&[], &plain_config());
        assert_eq!(table.get_score("Anyone", Party::Independent, "ZZ1"), IdeologyScore::ZERO);
    }

    #[test]
    fn party_labels_parse_loosely() {
        assert_eq!(Party::from("R".to_string()), Party::Republican);
        assert_eq!(Party::from("d".to_string()), Party::Democrat);
        assert_eq!(Party::from("L".to_string()), Party::Independent);
        assert_eq!(Party::from(String::new()), Party::Independent);
        assert_eq!(Party::from_party_code(328), Party::Independent);
    }

    proptest! {
        #[test]
        fn running_mean_equals_arithmetic_mean(
            values in prop::collection::vec((-1.0f64..1.0, -1.0f64..1.0), 1..60)
        ) {
            let rows: Vec<ScoreRow> = values
                .iter()
                .enumerate()
                .map(|(i, (d1, d2))| ScoreRow {
                    congress: 116,
                    bioname: format!("MEMBER{i}, X"),
                    state_abbrev: "NV".to_string(),
                    party_code: 200,
                    nominate_dim1: Some(*d1),
                    nominate_dim2: Some(*d2),
                    icpsr: i as u64,
                })
                .collect();
            let table = ScoreTable::build(&rows, &plain_config());
            let n = values.len() as f64;
            let m1 = values.iter().map(|v| v.0).sum::<f64>() / n;
            let m2 = values.iter().map(|v| v.1).sum::<f64>() / n;
            let mean = table.fallback_score(Party::Republican, "NV");
            prop_assert!((mean.dim1() - m1).abs() < 1e-9);
            prop_assert!((mean.dim2() - m2).abs() < 1e-9);
            let overall = table.fallback_score(Party::Independent, "NV");
            prop_assert!((overall.dim1() - m1).abs() < 1e-9);
        }
    }
}
