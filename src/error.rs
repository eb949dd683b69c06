use thiserror::Error;

use crate::model::Rank;

#[derive(Error, Debug)]
pub enum CronboardError {
    #[error("scheduler unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("scheduler rejected mutation with status {status}: {body}")]
    MutationRejected { status: u16, body: String },

    #[error("invalid job spec: {0}")]
    InvalidJobSpec(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, CronboardError>;

/// Recoverable per-record and per-rank conditions. These never abort an
/// aggregation; they are collected and surfaced next to the best-effort
/// result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A job object matched neither the dependency nor the scheduled shape.
    MalformedJobRecord { job: String },
    /// A percentile-stats request failed; that rank's data is absent.
    StatsUnavailable { rank: Rank },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::MalformedJobRecord { job } => write!(f, "MalformedJobRecord:{}", job),
            Warning::StatsUnavailable { rank } => write!(f, "StatsUnavailable:{}", rank),
        }
    }
}
