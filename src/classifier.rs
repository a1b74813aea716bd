use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::scorer::{IdeologyScore, ScoreTable};

/// Inverse regularization strength; large enough that the fit is effectively unpenalized.
pub const DEFAULT_INVERSE_REGULARIZATION: f64 = 1e5;
const MAX_ITERS: usize = 100;
const STEP_EPS: f64 = 1e-10;
const MAX_HALVINGS: usize = 30;

/// One member's recorded position on the reference roll call (Voteview cast code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollCallVote {
    pub icpsr: u64,
    #[serde(alias = "V1")]
    pub vote: i32,
}

impl RollCallVote {
    /// Yea is +1, anything else -1.
    pub fn label(&self) -> i8 {
        if self.vote == 1 { 1 } else { -1 }
    }
}

/// Logistic model of how an ideology score votes on one reference bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChamberVoteClassifier {
    intercept: f64,
    coeffs: [f64; 2],
    train_samples: usize,
    train_log_loss: f64,
    iterations: usize,
}

impl ChamberVoteClassifier {
    /// Fits against every voter on the roll call; a voter missing from `scorer` fails the fit.
    pub fn fit(roll_call: &[RollCallVote], scorer: &ScoreTable) -> Result<Self> {
        let samples = roll_call
            .iter()
            .map(|v| Ok((scorer.get_voter_score(v.icpsr)?, v.label())))
            .collect::<Result<Vec<_>>>()?;
        Self::fit_samples(&samples, DEFAULT_INVERSE_REGULARIZATION)
    }

    /// Newton-Raphson on the L2-penalized log loss (intercept unpenalized).
    pub fn fit_samples(samples: &[(IdeologyScore, i8)], inverse_regularization: f64) -> Result<Self> {
        let has_yea = samples.iter().any(|(_, y)| *y > 0);
        let has_nay = samples.iter().any(|(_, y)| *y <= 0);
        if !has_yea || !has_nay {
            return Err(ModelError::SingleClassRollCall);
        }
        let l2 = 1.0 / inverse_regularization.max(f64::MIN_POSITIVE);

        let mut theta = [0.0_f64; 3];
        let mut loss = objective(&theta, samples, l2);
        let mut iterations = 0;

        for iter in 0..MAX_ITERS {
            iterations = iter + 1;
            let mut grad = [0.0_f64; 3];
            let mut hess = [[0.0_f64; 3]; 3];
            for (score, y) in samples {
                let x = features(score);
                let target = if *y > 0 { 1.0 } else { 0.0 };
                let p = sigmoid(dot(&theta, &x));
                let w = (p * (1.0 - p)).max(1e-12);
                for i in 0..3 {
                    grad[i] += (p - target) * x[i];
                    for j in 0..3 {
                        hess[i][j] += w * x[i] * x[j];
                    }
                }
            }
            for i in 1..3 {
                grad[i] += l2 * theta[i];
                hess[i][i] += l2;
            }

            let Some(step) = solve3(hess, grad) else {
                tracing::warn!(iter, "singular hessian; stopping classifier fit early");
                break;
            };

            let mut scale = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_HALVINGS {
                let candidate = [
                    theta[0] - scale * step[0],
                    theta[1] - scale * step[1],
                    theta[2] - scale * step[2],
                ];
                let candidate_loss = objective(&candidate, samples, l2);
                if candidate_loss <= loss {
                    accepted = Some((candidate, candidate_loss));
                    break;
                }
                scale *= 0.5;
            }
            let Some((next, next_loss)) = accepted else {
                break;
            };

            let moved = (0..3)
                .map(|i| (next[i] - theta[i]).abs())
                .fold(0.0_f64, f64::max);
            theta = next;
            loss = next_loss;
            if moved < STEP_EPS {
                break;
            }
        }

        let model = Self {
            intercept: theta[0],
            coeffs: [theta[1], theta[2]],
            train_samples: samples.len(),
            train_log_loss: log_loss(&theta, samples),
            iterations,
        };
        tracing::info!(
            samples = model.train_samples,
            iterations = model.iterations,
            log_loss = model.train_log_loss,
            "fitted chamber vote classifier"
        );
        Ok(model)
    }

    pub fn decision_value(&self, score: &IdeologyScore) -> f64 {
        self.intercept + self.coeffs[0] * score.dim1() + self.coeffs[1] * score.dim2()
    }

    /// Predicted yea probability for one score.
    pub fn probability_yea(&self, score: &IdeologyScore) -> f64 {
        sigmoid(self.decision_value(score))
    }

    /// +1 for a predicted yea, -1 otherwise (ties go to nay).
    pub fn predict(&self, score: &IdeologyScore) -> i8 {
        if self.decision_value(score) > 0.0 { 1 } else { -1 }
    }

    /// Sum of predicted labels: the net yea margin of a chamber, or the sign for a single score.
    pub fn predict_sum(&self, scores: &[IdeologyScore]) -> i64 {
        scores.iter().map(|s| self.predict(s) as i64).sum()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coeffs(&self) -> [f64; 2] {
        self.coeffs
    }

    pub fn train_log_loss(&self) -> f64 {
        self.train_log_loss
    }
}

fn features(score: &IdeologyScore) -> [f64; 3] {
    [1.0, score.dim1(), score.dim2()]
}

fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// log(1 + e^z) without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

fn log_loss(theta: &[f64; 3], samples: &[(IdeologyScore, i8)]) -> f64 {
    if samples.is_empty() {
        return f64::INFINITY;
    }
    let sum: f64 = samples
        .iter()
        .map(|(score, y)| {
            let z = dot(theta, &features(score));
            if *y > 0 { softplus(-z) } else { softplus(z) }
        })
        .sum();
    sum / samples.len() as f64
}

fn objective(theta: &[f64; 3], samples: &[(IdeologyScore, i8)], l2: f64) -> f64 {
    log_loss(theta, samples) * samples.len() as f64
        + 0.5 * l2 * (theta[1] * theta[1] + theta[2] * theta[2])
}

/// Solves `m · x = v` by Gaussian elimination with partial pivoting.
fn solve3(mut m: [[f64; 3]; 3], mut v: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < 1e-300 {
            return None;
        }
        m.swap(col, pivot);
        v.swap(col, pivot);
        for row in col + 1..3 {
            let factor = m[row][col] / m[col][col];
            for k in col..3 {
                m[row][k] -= factor * m[col][k];
            }
            v[row] -= factor * v[col];
        }
    }
    let mut x = [0.0_f64; 3];
    for row in (0..3).rev() {
        let tail: f64 = (row + 1..3).map(|k| m[row][k] * x[k]).sum();
        x[row] = (v[row] - tail) / m[row][row];
    }
    Some(x)
}
