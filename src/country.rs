use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{ElectionConfig, RaceRating};
use crate::error::{ModelError, Result};
use crate::polls::{PollLibrary, PollSource};
use crate::race::{Candidate, Race};
use crate::scorer::{IdeologyScore, Party, ScoreTable};
use crate::simulate::{OutcomeSimulator, simulate_score};
use crate::snapshot::{ElectionSnapshot, Officeholder};
use crate::tipping_point::{VoteCountDistribution, tipping_point_probability};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chamber {
    ElectoralCollege,
    House,
    Senate,
}

impl Chamber {
    /// Order chambers are visited within each state.
    pub const ALL: [Chamber; 3] = [Chamber::ElectoralCollege, Chamber::House, Chamber::Senate];

    pub fn label(self) -> &'static str {
        match self {
            Chamber::ElectoralCollege => "Electoral College",
            Chamber::House => "House",
            Chamber::Senate => "Senate",
        }
    }
}

impl fmt::Display for Chamber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Every race held in one state, each chamber in seat order.
#[derive(Debug, Clone)]
pub struct StateRaces {
    pub name: String,
    pub postal_code: String,
    pub electoral_college: Vec<Race>,
    pub house: Vec<Race>,
    pub senate: Vec<Race>,
}

impl StateRaces {
    pub fn races(&self, chamber: Chamber) -> &[Race] {
        match chamber {
            Chamber::ElectoralCollege => &self.electoral_college,
            Chamber::House => &self.house,
            Chamber::Senate => &self.senate,
        }
    }

    fn races_mut(&mut self, chamber: Chamber) -> &mut Vec<Race> {
        match chamber {
            Chamber::ElectoralCollege => &mut self.electoral_college,
            Chamber::House => &mut self.house,
            Chamber::Senate => &mut self.senate,
        }
    }
}

/// One row of a simulated government.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeatOutcome {
    pub chamber: Chamber,
    pub state: String,
    pub code: String,
    pub party: Party,
    pub value: u32,
    pub margin: f64,
    /// Ideology score of the winner.
    pub score: IdeologyScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChamberTally {
    pub chamber: Chamber,
    pub republican: u32,
    pub democrat: u32,
}

impl ChamberTally {
    pub fn majority(&self) -> Option<Party> {
        match self.republican.cmp(&self.democrat) {
            std::cmp::Ordering::Greater => Some(Party::Republican),
            std::cmp::Ordering::Less => Some(Party::Democrat),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Seat-value totals per chamber, in [`Chamber::ALL`] order.
pub fn tally(outcomes: &[SeatOutcome]) -> Vec<ChamberTally> {
    Chamber::ALL
        .iter()
        .map(|&chamber| {
            let mut t = ChamberTally {
                chamber,
                republican: 0,
                democrat: 0,
            };
            for o in outcomes.iter().filter(|o| o.chamber == chamber) {
                match o.party {
                    Party::Republican => t.republican += o.value,
                    Party::Democrat => t.democrat += o.value,
                    Party::Independent => {}
                }
            }
            t
        })
        .collect()
}

/// Winning scores of `chamber`, each repeated by its seat value.
pub fn chamber_scores(outcomes: &[SeatOutcome], chamber: Chamber) -> Vec<IdeologyScore> {
    outcomes
        .iter()
        .filter(|o| o.chamber == chamber)
        .flat_map(|o| std::iter::repeat_n(o.score, o.value as usize))
        .collect()
}

/// All races of one election cycle, grouped by state in snapshot order.
#[derive(Debug, Clone)]
pub struct Country {
    states: Vec<StateRaces>,
    seats: BTreeMap<Chamber, u32>,
}

impl Country {
    /// Builds every race, fills unpolled rated races from their rating pools, and checks
    /// that each chamber adds up to its configured seat count.
    pub fn build(
        snapshot: &ElectionSnapshot,
        scorer: &ScoreTable,
        config: &ElectionConfig,
    ) -> Result<Self> {
        let empty = PollLibrary::default();
        let library = |chamber: Chamber| {
            snapshot
                .poll_library(config.poll_sources.for_chamber(chamber))
                .unwrap_or(&empty)
        };
        let district_turnouts = snapshot.district_turnout_totals();

        let mut states = Vec::with_capacity(snapshot.states.len());
        for info in &snapshot.states {
            let pc = info.postal_code.as_str();
            let state_turnout = *snapshot
                .state_turnouts
                .get(pc)
                .ok_or_else(|| ModelError::MissingTurnout(pc.to_string()))?;
            let district_turnout = |code: &str| {
                district_turnouts
                    .get(code)
                    .copied()
                    .ok_or_else(|| ModelError::MissingTurnout(code.to_string()))
            };

            let mut state = StateRaces {
                name: info.name.clone(),
                postal_code: pc.to_string(),
                electoral_college: Vec::new(),
                house: Vec::new(),
                senate: Vec::new(),
            };

            // Split-vote states award one vote per district, then two statewide.
            let ec_polls = library(Chamber::ElectoralCollege);
            let cd_count = if config.is_split_vote_state(pc) {
                info.electoral_votes.saturating_sub(2)
            } else {
                0
            };
            for i in 1..=cd_count {
                let code = format!("{pc}CD{i}");
                let turnout = district_turnout(&format!("{pc}{i}"))?;
                let nominee = config.default_nominee(&code).clone();
                state
                    .electoral_college
                    .push(Race::with_value(code, turnout, nominee, scorer, ec_polls, 1));
            }
            state.electoral_college.push(Race::with_value(
                pc,
                state_turnout,
                config.default_nominee(pc).clone(),
                scorer,
                ec_polls,
                info.electoral_votes - cd_count,
            ));

            if config.is_congress_excluded(pc) {
                states.push(state);
                continue;
            }

            let senate_polls = library(Chamber::Senate);
            let senators: Vec<&Officeholder> = snapshot.senators_of(info).collect();
            for (seat, suffix) in ["", "2"].iter().enumerate() {
                let code = format!("{pc}{suffix}");
                let holder = senators
                    .get(seat)
                    .ok_or_else(|| ModelError::MissingOfficeholder(code.clone()))?;
                let incumbent = Candidate::new(holder.name.clone(), holder.party);
                state
                    .senate
                    .push(Race::new(code, state_turnout, incumbent, scorer, senate_polls));
            }

            let house_polls = library(Chamber::House);
            let mut representatives: Vec<&Officeholder> = snapshot.representatives_of(info).collect();
            representatives.sort_by_key(|r| district_order(r.district_label()));
            for rep in representatives {
                let code = format!("{pc}{}", rep.district_label());
                let turnout = district_turnout(&code)?;
                let incumbent = Candidate::new(rep.name.clone(), rep.party);
                state
                    .house
                    .push(Race::new(code, turnout, incumbent, scorer, house_polls));
            }

            states.push(state);
        }

        let mut country = Country {
            states,
            seats: Chamber::ALL
                .iter()
                .map(|&c| (c, config.seats(c)))
                .collect(),
        };
        country.infer_polling(snapshot, scorer, config);
        country.check_seat_counts()?;

        tracing::info!(
            states = country.states.len(),
            contested_house = country.contested(Chamber::House),
            contested_senate = country.contested(Chamber::Senate),
            contested_ec = country.contested(Chamber::ElectoralCollege),
            "built country"
        );
        Ok(country)
    }

    /// Gives rated races without usable polls the pooled projection of their rating bucket.
    fn infer_polling(&mut self, snapshot: &ElectionSnapshot, scorer: &ScoreTable, config: &ElectionConfig) {
        let pools = rating_pools(snapshot, scorer, config);

        for state in &mut self.states {
            for chamber in Chamber::ALL {
                for race in state.races_mut(chamber).iter_mut().filter(|r| !r.contested()) {
                    let Some(rating) = config.current_rating(chamber, &race.code) else {
                        continue;
                    };
                    let Some(pool) = pools.get(&rating) else {
                        continue;
                    };
                    apply_pool(race, rating, pool, scorer);
                }
            }
        }
    }

    fn check_seat_counts(&self) -> Result<()> {
        for chamber in Chamber::ALL {
            let found = self.races(chamber).map(|(_, r)| r.value).sum::<u32>();
            let expected = self.seat_count(chamber);
            if found != expected {
                return Err(ModelError::SeatCount {
                    chamber,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    fn contested(&self, chamber: Chamber) -> usize {
        self.races(chamber).filter(|(_, r)| r.contested()).count()
    }

    pub fn states(&self) -> &[StateRaces] {
        &self.states
    }

    pub fn seat_count(&self, chamber: Chamber) -> u32 {
        self.seats.get(&chamber).copied().unwrap_or(0)
    }

    /// Races of `chamber` with their state, in state order then seat order.
    pub fn races(&self, chamber: Chamber) -> impl Iterator<Item = (&StateRaces, &Race)> {
        self.states
            .iter()
            .flat_map(move |s| s.races(chamber).iter().map(move |r| (s, r)))
    }

    pub fn race(&self, chamber: Chamber, code: &str) -> Option<&Race> {
        self.races(chamber).map(|(_, r)| r).find(|r| r.code == code)
    }

    pub fn tipping_points(&self, chamber: Chamber) -> Result<Vec<(String, f64)>> {
        self.races(chamber)
            .map(|(_, race)| Ok((race.code.clone(), tipping_point_probability(race)?)))
            .collect()
    }

    /// Tipping-point probabilities summed over each state's races (both Senate seats, every
    /// district), keyed by state name in state order.
    pub fn tipping_points_by_state(&self, chamber: Chamber) -> Result<Vec<(String, f64)>> {
        self.states
            .iter()
            .map(|state| {
                let total = state
                    .races(chamber)
                    .iter()
                    .map(tipping_point_probability)
                    .sum::<Result<f64>>()?;
                Ok((state.name.clone(), total))
            })
            .collect()
    }

    /// One simulated score per seat; a race worth several votes contributes its winner that
    /// many times, so the vector is exactly the chamber's seat count long.
    pub fn simulate_scores(
        &self,
        chamber: Chamber,
        bias: f64,
        rng: &mut impl Rng,
    ) -> Result<Vec<IdeologyScore>> {
        let mut scores = Vec::with_capacity(self.seat_count(chamber) as usize);
        for (_, race) in self.races(chamber) {
            let score = simulate_score(race, bias, rng)?;
            scores.extend(std::iter::repeat_n(score, race.value as usize));
        }
        Ok(scores)
    }

    pub fn simulate_house(&self, bias: f64, rng: &mut impl Rng) -> Result<Vec<IdeologyScore>> {
        self.simulate_scores(Chamber::House, bias, rng)
    }

    pub fn simulate_senate(&self, bias: f64, rng: &mut impl Rng) -> Result<Vec<IdeologyScore>> {
        self.simulate_scores(Chamber::Senate, bias, rng)
    }

    /// Simulated winner of every race, state by state (Electoral College, House, Senate).
    pub fn simulate_government(
        &self,
        bias: f64,
        simulator: &OutcomeSimulator<'_>,
        rng: &mut impl Rng,
    ) -> Result<Vec<SeatOutcome>> {
        let mut out = Vec::new();
        for state in &self.states {
            for chamber in Chamber::ALL {
                for race in state.races(chamber) {
                    let draw = simulator.simulate_seat(race, bias, rng)?;
                    out.push(SeatOutcome {
                        chamber,
                        state: state.name.clone(),
                        code: race.code.clone(),
                        party: draw.party,
                        value: race.value,
                        margin: draw.margin,
                        score: draw.score,
                    });
                }
            }
        }
        Ok(out)
    }
}

/// `AL` (at-large) first, then numbered districts ascending, then anything else by label.
fn district_order(label: &str) -> (u32, String) {
    match label {
        "AL" => (0, String::new()),
        _ => (
            label.parse::<u32>().unwrap_or(u32::MAX),
            label.to_string(),
        ),
    }
}

/// Polled races sharing one rating bucket.
#[derive(Debug, Clone, Default)]
struct RatingPool {
    weighted_gop_share: f64,
    total_sample: u64,
    races: u64,
}

impl RatingPool {
    fn add(&mut self, gop_share: f64, sample_size: u64) {
        self.weighted_gop_share += gop_share * sample_size as f64;
        self.total_sample += sample_size;
        self.races += 1;
    }

    fn gop_share(&self) -> f64 {
        self.weighted_gop_share / self.total_sample as f64
    }

    fn mean_sample(&self) -> u64 {
        (self.total_sample as f64 / self.races as f64).round() as u64
    }
}

/// Pools, per rating, every rated code with usable polls across all chambers and cycles,
/// each projected with a placeholder Republican incumbent.
fn rating_pools(
    snapshot: &ElectionSnapshot,
    scorer: &ScoreTable,
    config: &ElectionConfig,
) -> BTreeMap<RaceRating, RatingPool> {
    let mut pools: BTreeMap<RaceRating, RatingPool> = BTreeMap::new();
    for sheet in &config.rating_sheets {
        let Some(library) = snapshot.poll_library(&sheet.poll_source) else {
            tracing::debug!(source = %sheet.poll_source, "no poll library for rating sheet");
            continue;
        };
        for (&rating, codes) in &sheet.ratings {
            for code in codes {
                if library.find_poll(code).is_none() {
                    continue;
                }
                let projection = Race::new(
                    code.as_str(),
                    0,
                    Candidate::placeholder(Party::Republican),
                    scorer,
                    library,
                );
                if projection.contested() {
                    pools.entry(rating).or_default().add(
                        projection.incumbent_projected_vote_share(),
                        projection.sample_size(),
                    );
                }
            }
        }
    }
    pools
}

fn apply_pool(race: &mut Race, rating: RaceRating, pool: &RatingPool, scorer: &ScoreTable) {
    if pool.total_sample == 0 {
        return;
    }
    let challenger = match race.incumbent.party {
        Party::Republican => Party::Democrat,
        Party::Democrat => Party::Republican,
        Party::Independent => rating.underdog(),
    };
    let gop_share = pool.gop_share();
    let share = if challenger == Party::Republican {
        1.0 - gop_share
    } else {
        gop_share
    };
    let sample_size = pool.mean_sample();
    if VoteCountDistribution::new(sample_size, share).is_none() {
        tracing::debug!(code = %race.code, ?rating, share, "rating pool too lopsided to infer from");
        return;
    }

    race.challenger_party = challenger;
    race.challenger_score = scorer.fallback_score(challenger, &race.code);
    race.project(share, sample_size);
    tracing::debug!(code = %race.code, ?rating, share, sample_size, "inferred polling from rating");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::ScorerConfig;

    fn race(code: &str, share: f64, sample: u64, value: u32) -> Race {
        let scorer = ScoreTable::build(&[], &ScorerConfig::default());
        Race::with_value(
            code,
            10_000,
            Candidate::new("Smith", Party::Republican),
            &scorer,
            &crate::polls::NoPolls,
            value,
        )
        .projected(share, sample)
    }

    #[test]
    fn districts_sort_at_large_then_numeric() {
        let mut labels = vec!["10", "2", "AL", "1"];
        labels.sort_by_key(|l| district_order(l));
        assert_eq!(labels, vec!["AL", "1", "2", "10"]);
    }

    #[test]
    fn tally_sums_seat_values_per_chamber() {
        let outcomes = vec![
            SeatOutcome {
                chamber: Chamber::ElectoralCollege,
                state: "Maine".into(),
                code: "ME".into(),
                party: Party::Democrat,
                value: 2,
                margin: 0.1,
                score: IdeologyScore::default(),
            },
            SeatOutcome {
                chamber: Chamber::ElectoralCollege,
                state: "Maine".into(),
                code: "MECD2".into(),
                party: Party::Republican,
                value: 1,
                margin: 0.02,
                score: IdeologyScore::default(),
            },
            SeatOutcome {
                chamber: Chamber::Senate,
                state: "Maine".into(),
                code: "ME".into(),
                party: Party::Republican,
                value: 1,
                margin: 0.01,
                score: IdeologyScore::default(),
            },
        ];
        let tallies = tally(&outcomes);
        assert_eq!(tallies.len(), 3);
        assert_eq!(tallies[0].chamber, Chamber::ElectoralCollege);
        assert_eq!((tallies[0].republican, tallies[0].democrat), (1, 2));
        assert_eq!(tallies[0].majority(), Some(Party::Democrat));
        assert_eq!((tallies[1].republican, tallies[1].democrat), (0, 0));
        assert_eq!(tallies[1].majority(), None);
        assert_eq!(tallies[2].republican, 1);
    }

    #[test]
    fn pool_averages_are_sample_weighted() {
        let mut pool = RatingPool::default();
        pool.add(0.6, 300);
        pool.add(0.4, 100);
        assert!((pool.gop_share() - 0.55).abs() < 1e-12);
        assert_eq!(pool.mean_sample(), 200);
    }

    #[test]
    fn applying_a_pool_flips_share_for_a_democratic_incumbent() {
        let scorer = ScoreTable::build(&[], &ScorerConfig::default());
        let mut pool = RatingPool::default();
        pool.add(0.52, 800);

        let mut held_by_dem = Race::new(
            "NH",
            10_000,
            Candidate::new("Shaheen", Party::Democrat),
            &scorer,
            &crate::polls::NoPolls,
        );
        apply_pool(&mut held_by_dem, RaceRating::LeansDem, &pool, &scorer);
        assert!(held_by_dem.contested());
        assert_eq!(held_by_dem.challenger_party, Party::Republican);
        assert!((held_by_dem.incumbent_projected_vote_share() - 0.48).abs() < 1e-12);
        assert_eq!(held_by_dem.sample_size(), 800);

        let mut independent = Race::new(
            "ME2",
            10_000,
            Candidate::new("King", Party::Independent),
            &scorer,
            &crate::polls::NoPolls,
        );
        apply_pool(&mut independent, RaceRating::LeansGop, &pool, &scorer);
        assert_eq!(independent.challenger_party, Party::Democrat);
        assert!((independent.incumbent_projected_vote_share() - 0.52).abs() < 1e-12);
    }

    #[test]
    fn simulated_scores_repeat_multi_vote_races() {
        let state = StateRaces {
            name: "Nebraska".into(),
            postal_code: "NE".into(),
            electoral_college: vec![race("NE", 1.0, 0, 2), race("NECD2", 0.51, 400, 1)],
            house: vec![],
            senate: vec![],
        };
        let country = Country {
            states: vec![state],
            seats: Chamber::ALL.iter().map(|&c| (c, 0)).collect(),
        };
        let mut rng = <rand_chacha::ChaCha8Rng as rand::SeedableRng>::seed_from_u64(2);
        let scores = country
            .simulate_scores(Chamber::ElectoralCollege, 0.0, &mut rng)
            .unwrap();
        assert_eq!(scores.len(), 3);
        assert_eq!(scores[0], scores[1]);
    }

    #[test]
    fn uncontested_chamber_has_zero_tipping_points() {
        let state = StateRaces {
            name: "Vermont".into(),
            postal_code: "VT".into(),
            electoral_college: vec![race("VT", 1.0, 0, 3)],
            house: vec![race("VTAL", 1.0, 0, 1)],
            senate: vec![race("VT", 1.0, 0, 1), race("VT2", 1.0, 0, 1)],
        };
        let country = Country {
            states: vec![state],
            seats: Chamber::ALL.iter().map(|&c| (c, 0)).collect(),
        };
        assert_eq!(
            country.tipping_points_by_state(Chamber::Senate).unwrap(),
            vec![("Vermont".to_string(), 0.0)]
        );
        assert!(
            country
                .tipping_points(Chamber::House)
                .unwrap()
                .iter()
                .all(|(_, p)| *p == 0.0)
        );
    }
}
