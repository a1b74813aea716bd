use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;

use crate::classifier::ChamberVoteClassifier;
use crate::country::{Chamber, ChamberTally, Country, chamber_scores, tally};
use crate::error::Result;
use crate::race::Race;
use crate::scorer::{IdeologyScore, Party};
use crate::stats::inverse_normal_cdf;
use crate::tipping_point::VoteCountDistribution;

/// Which side of a race came out ahead in one draw, and by how much.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulatedRace {
    pub incumbent_won: bool,
    /// `|p - 0.5|` after bias; exactly 1 for uncontested races.
    pub margin: f64,
}

/// Draws one result for `race` under a uniform swing of `bias` against Republicans.
pub fn simulate_race(race: &Race, bias: f64, rng: &mut impl Rng) -> Result<SimulatedRace> {
    if !race.contested() {
        return Ok(SimulatedRace {
            incumbent_won: true,
            margin: 1.0,
        });
    }
    let dist = VoteCountDistribution::for_race(race)?;
    let mut p = dist.share_at(dist.sample(rng));
    if race.incumbent_party() == Party::Republican {
        p -= bias;
    } else {
        p += bias;
    }
    Ok(SimulatedRace {
        incumbent_won: p >= 0.5,
        margin: (p - 0.5).abs(),
    })
}

/// Winning ideology score of one simulated draw.
pub fn simulate_score(race: &Race, bias: f64, rng: &mut impl Rng) -> Result<IdeologyScore> {
    let result = simulate_race(race, bias, rng)?;
    Ok(if result.incumbent_won {
        race.incumbent_score
    } else {
        race.challenger_score
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeatDraw {
    pub margin: f64,
    pub party: Party,
    pub score: IdeologyScore,
}

/// Resolves simulated winners to a party, using a fitted roll-call classifier to seat
/// independents with whichever caucus their score would vote alongside.
#[derive(Debug, Clone, Copy)]
pub struct OutcomeSimulator<'a> {
    classifier: &'a ChamberVoteClassifier,
}

impl<'a> OutcomeSimulator<'a> {
    pub fn new(classifier: &'a ChamberVoteClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &'a ChamberVoteClassifier {
        self.classifier
    }

    /// A predicted yea on the reference bill maps to R, anything else to D.
    pub fn resolve_party(&self, party: Party, score: &IdeologyScore) -> Party {
        match party {
            Party::Independent => {
                if self.classifier.predict_sum(std::slice::from_ref(score)) > 0 {
                    Party::Republican
                } else {
                    Party::Democrat
                }
            }
            major => major,
        }
    }

    /// Winner of one draw: margin, resolved party, and the winner's score.
    pub fn simulate_seat(&self, race: &Race, bias: f64, rng: &mut impl Rng) -> Result<SeatDraw> {
        let result = simulate_race(race, bias, rng)?;
        let (party, score) = if result.incumbent_won {
            (race.incumbent.party, race.incumbent_score)
        } else {
            (race.challenger_party, race.challenger_score)
        };
        Ok(SeatDraw {
            margin: result.margin,
            party: self.resolve_party(party, &score),
            score,
        })
    }

    /// `(margin, winning party)` for one draw.
    pub fn simulate_party(&self, race: &Race, bias: f64, rng: &mut impl Rng) -> Result<(f64, Party)> {
        let draw = self.simulate_seat(race, bias, rng)?;
        Ok((draw.margin, draw.party))
    }

    pub fn simulate_score(&self, race: &Race, bias: f64, rng: &mut impl Rng) -> Result<IdeologyScore> {
        simulate_score(race, bias, rng)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationRun {
    pub run: usize,
    pub bias: f64,
    pub tallies: Vec<ChamberTally>,
    /// Net predicted yea votes on the reference bill from the simulated House.
    pub house_bill_margin: i64,
}

impl SimulationRun {
    pub fn tally(&self, chamber: Chamber) -> Option<&ChamberTally> {
        self.tallies.iter().find(|t| t.chamber == chamber)
    }
}

/// Runs `runs` independent elections, each with its own bias drawn from `Normal(0, bias_sd)`.
///
/// Run `i` uses a generator seeded with `seed + i`, so output does not depend on scheduling.
pub fn simulate_many(
    country: &Country,
    simulator: &OutcomeSimulator<'_>,
    runs: usize,
    bias_sd: f64,
    seed: u64,
) -> Result<Vec<SimulationRun>> {
    let out = (0..runs)
        .into_par_iter()
        .map(|run| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(run as u64));
            let bias = draw_bias(bias_sd, &mut rng);
            simulate_run(country, simulator, run, bias, &mut rng)
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::info!(runs = out.len(), bias_sd, seed, "finished simulation batch");
    Ok(out)
}

/// One simulated government under a fixed `bias`. The House bill margin is scored on the
/// same House that the tallies count.
pub fn simulate_run(
    country: &Country,
    simulator: &OutcomeSimulator<'_>,
    run: usize,
    bias: f64,
    rng: &mut impl Rng,
) -> Result<SimulationRun> {
    let outcomes = country.simulate_government(bias, simulator, rng)?;
    let house = chamber_scores(&outcomes, Chamber::House);
    Ok(SimulationRun {
        run,
        bias,
        tallies: tally(&outcomes),
        house_bill_margin: simulator.classifier().predict_sum(&house),
    })
}

pub fn draw_bias(bias_sd: f64, rng: &mut impl Rng) -> f64 {
    if bias_sd <= 0.0 {
        return 0.0;
    }
    // Open interval keeps the inverse CDF finite.
    let u = rng.gen_range(f64::EPSILON..1.0);
    inverse_normal_cdf(u) * bias_sd
}
