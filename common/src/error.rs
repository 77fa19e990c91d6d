use thiserror::Error;

/// Rejected board configuration. Raised before a session is created; the
/// generator itself never fails.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Board dimensions must be at least 1x1")]
    ZeroDimension,
    #[error("Board dimensions may not exceed 100x100")]
    TooLarge,
    #[error("Custom difficulty requires an explicit mine count")]
    MissingMineCount,
    #[error("A board needs at least one mine")]
    NoMines,
    #[error("Too many mines, this board fits at most {max}")]
    TooManyMines { max: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeaderboardError {
    #[error("Custom boards are not ranked")]
    Unranked,
    #[error("Invalid score submission: {0}")]
    InvalidScore(&'static str),
    #[error("Leaderboard unavailable: {0}")]
    Unavailable(String),
}
