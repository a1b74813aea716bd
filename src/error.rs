use thiserror::Error;

use crate::country::Chamber;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("voter {0} has no ideology score in the current congress")]
    VoterNotFound(u64),

    #[error("race {0} is uncontested; it has no vote-count distribution")]
    Uncontested(String),

    #[error("race {code}: degenerate vote-count distribution (sample size {sample_size}, share {share})")]
    DegenerateDistribution {
        code: String,
        sample_size: u64,
        share: f64,
    },

    #[error("reference roll call needs both yea and nay votes to fit a classifier")]
    SingleClassRollCall,

    #[error("no turnout recorded for {0}")]
    MissingTurnout(String),

    #[error("no officeholder recorded for {0}")]
    MissingOfficeholder(String),

    #[error("unknown state {0}")]
    UnknownState(String),

    #[error("{chamber} has {found} seats, expected {expected}")]
    SeatCount {
        chamber: Chamber,
        expected: u32,
        found: u32,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;
