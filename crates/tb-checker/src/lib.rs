//! Tablebase verification of endgame puzzles.
//!
//! Each puzzle's expected line is replayed ply by ply against a tablebase
//! oracle. Per-puzzle findings are appended to a resumable checkpoint file.

pub use puzzle_core;

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod oracle;
pub mod pipeline;
pub mod rate_limit;
pub mod report;
pub mod retry;
pub mod tablebase;
pub mod verifier;
