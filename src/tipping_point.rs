use rand::Rng;

use crate::error::{ModelError, Result};
use crate::race::Race;
use crate::stats::{binomial_pmf, inverse_normal_cdf, normal_cdf, normal_pdf, simpson};

const OUTER_INTERVALS: usize = 2_000;
const PEAK_INTERVALS: usize = 600;
const PEAK_HALF_WIDTH_SDS: f64 = 12.0;

/// Poll-implied vote count for the incumbent, as a standard normal truncated to `[a, b]`.
///
/// The underlying count has mean `n·p` and variance `n·p·(1-p)`, where `n` is the pooled poll
/// sample and `p` the projected share, bounded to `[0, n]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoteCountDistribution {
    sample_size: f64,
    mean: f64,
    stddev: f64,
    a: f64,
    b: f64,
}

impl VoteCountDistribution {
    pub fn for_race(race: &Race) -> Result<Self> {
        if !race.contested() {
            return Err(ModelError::Uncontested(race.code.clone()));
        }
        Self::new(race.sample_size(), race.incumbent_projected_vote_share()).ok_or_else(|| {
            ModelError::DegenerateDistribution {
                code: race.code.clone(),
                sample_size: race.sample_size(),
                share: race.incumbent_projected_vote_share(),
            }
        })
    }

    /// `None` when the count has no spread (empty sample, or share at 0 or 1).
    pub fn new(sample_size: u64, share: f64) -> Option<Self> {
        let n = sample_size as f64;
        let mean = n * share;
        let variance = n * share * (1.0 - share);
        if sample_size == 0 || !(variance > 0.0) || !variance.is_finite() {
            return None;
        }
        let stddev = variance.sqrt();
        Some(Self {
            sample_size: n,
            mean,
            stddev,
            a: (0.0 - mean) / stddev,
            b: (n - mean) / stddev,
        })
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.a, self.b)
    }

    pub fn denormalize(&self, norm_count: f64) -> f64 {
        norm_count * self.stddev + self.mean
    }

    pub fn normalize(&self, count: f64) -> f64 {
        (count - self.mean) / self.stddev
    }

    /// Share of the sample implied by a standardized count.
    pub fn share_at(&self, norm_count: f64) -> f64 {
        self.denormalize(norm_count) / self.sample_size
    }

    pub fn pdf(&self, x: f64) -> f64 {
        if x < self.a || x > self.b {
            return 0.0;
        }
        normal_pdf(x) / self.mass()
    }

    fn mass(&self) -> f64 {
        (normal_cdf(self.b) - normal_cdf(self.a)).max(f64::MIN_POSITIVE)
    }

    /// Inverse-CDF draw of a standardized count.
    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        let lo = normal_cdf(self.a);
        let hi = normal_cdf(self.b);
        let u = lo + (hi - lo) * rng.gen_range(0.0..1.0);
        inverse_normal_cdf(u).clamp(self.a, self.b)
    }

    /// E[f(X)] over the truncated distribution.
    ///
    /// `focus` is a standardized point where `f` is sharply peaked, with its approximate width;
    /// that neighborhood is integrated on a dense sub-grid.
    pub fn expect<F>(&self, f: F, focus: Option<(f64, f64)>) -> f64
    where
        F: Fn(f64) -> f64,
    {
        let integrand = |x: f64| f(x) * normal_pdf(x);
        let total = match focus {
            Some((center, width)) if width > 0.0 => {
                let lo = (center - PEAK_HALF_WIDTH_SDS * width).clamp(self.a, self.b);
                let hi = (center + PEAK_HALF_WIDTH_SDS * width).clamp(self.a, self.b);
                simpson(&integrand, self.a, lo, OUTER_INTERVALS)
                    + simpson(&integrand, lo, hi, PEAK_INTERVALS)
                    + simpson(&integrand, hi, self.b, OUTER_INTERVALS)
            }
            _ => simpson(&integrand, self.a, self.b, OUTER_INTERVALS * 2),
        };
        total / self.mass()
    }
}

/// Probability that a single ballot decides `race`.
///
/// Zero for uncontested races. Otherwise the expected binomial probability of an exact
/// half-plus-one split of `turnout` ballots, averaging the voter share over the poll-implied
/// count distribution.
pub fn tipping_point_probability(race: &Race) -> Result<f64> {
    if !race.contested() {
        return Ok(0.0);
    }
    let dist = VoteCountDistribution::for_race(race)?;
    let turnout = race.turnout;
    let decisive_k = turnout.div_ceil(2);

    let kernel = |norm_count: f64| {
        let share = dist.share_at(norm_count).clamp(0.0, 1.0);
        binomial_pmf(decisive_k, turnout, share)
    };

    let focus = (turnout > 0).then(|| {
        let center_share = decisive_k as f64 / turnout as f64;
        let center = dist.normalize(center_share * dist.sample_size);
        let share_width = 0.5 / (turnout as f64).sqrt();
        (center, share_width * dist.sample_size / dist.stddev)
    });

    Ok(dist.expect(kernel, focus))
}
