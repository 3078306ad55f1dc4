use thiserror::Error;

/// Rejected configuration. Reported on stderr; the process exits 1.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("net size must be between 2 and 32, got {0}")]
    NetSize(u32),
    #[error("no known bounds for net size {0}")]
    UnknownBounds(u32),
    #[error("beam size must be at least 1")]
    BeamSize,
    #[error("scoring iterations must be at least 1")]
    ScoringIterations,
    #[error("elites must be between 1 and the number of scoring iterations")]
    Elites,
    #[error("depth weight must be between 0.0 and 1.0, got {0}")]
    DepthWeight(f64),
    #[error("max iterations must be at least 1")]
    MaxIterations,
}

/// Runtime failure of the search core.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("beam search reached {limit} comparators without completing a network")]
    LengthBudgetExhausted { limit: usize },
}
