//! Checker error types

use thiserror::Error;

use crate::checkpoint::CheckpointError;
use puzzle_core::PuzzleParseError;

/// Errors that stop a whole run. Per-puzzle problems never surface here: they
/// are recorded in that puzzle's result instead.
#[derive(Error, Debug)]
pub enum CheckerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Puzzle input error: {0}")]
    Puzzles(#[from] PuzzleParseError),

    #[error("Checkpoint writer task failed: {0}")]
    Writer(#[from] tokio::task::JoinError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
