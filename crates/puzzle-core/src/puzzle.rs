//! Puzzle records as produced by the endgame filter step.
//!
//! Input rows follow the lichess puzzle database layout:
//! `PuzzleId,FEN,Moves,Rating,RatingDeviation,Popularity,NbPlays,Themes,GameUrl[,...]`

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::position::{Move, Position, PositionError};

/// Positions with more pieces than this are outside tablebase coverage.
pub const MAX_PIECES: usize = 7;

const COL_ID: usize = 0;
const COL_FEN: usize = 1;
const COL_MOVES: usize = 2;
const COL_THEMES: usize = 7;

#[derive(Debug, Error)]
pub enum PuzzleParseError {
    #[error("line {line}: expected at least {expected} columns, found {found}")]
    MissingColumns { line: usize, expected: usize, found: usize },

    #[error("line {line}: empty puzzle id")]
    EmptyId { line: usize },

    #[error("puzzle {id}: {source}")]
    Position {
        id: String,
        #[source]
        source: PositionError,
    },

    #[error("puzzle {id}: invalid move '{mv}'")]
    Move { id: String, mv: String },

    #[error("puzzle {id}: empty move list")]
    NoMoves { id: String },

    #[error("puzzle {id}: never fewer than {count} pieces, at most {max} supported", max = MAX_PIECES)]
    TooManyPieces { id: String, count: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the solver is expected to achieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    Win,
    Draw,
}

/// One puzzle: a start position, the expected line and its themes.
#[derive(Debug, Clone)]
pub struct PuzzleRecord {
    pub puzzle_id: String,
    pub start: Position,
    pub moves: Vec<Move>,
    /// Pieces on the board at the start position
    pub piece_count: usize,
    pub tags: BTreeSet<String>,
}

impl PuzzleRecord {
    pub fn new(
        puzzle_id: impl Into<String>,
        start: Position,
        moves: Vec<Move>,
        tags: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, PuzzleParseError> {
        let puzzle_id = puzzle_id.into();
        if moves.is_empty() {
            return Err(PuzzleParseError::NoMoves { id: puzzle_id });
        }
        let piece_count = start.piece_count();
        let fewest = fewest_pieces(&start, &moves);
        if fewest > MAX_PIECES {
            return Err(PuzzleParseError::TooManyPieces {
                id: puzzle_id,
                count: fewest,
            });
        }
        Ok(Self {
            puzzle_id,
            start,
            moves,
            piece_count,
            tags: tags.into_iter().map(Into::into).collect(),
        })
    }

    /// Mate puzzles test a distance the tablebase category cannot express.
    /// Any theme mentioning mate counts (`mate`, `mateIn2`, `backRankMate`...).
    pub fn is_mate(&self) -> bool {
        self.tags.iter().any(|t| t.contains("mate") || t.contains("Mate"))
    }

    pub fn goal(&self) -> Goal {
        if self.tags.contains("equality") {
            Goal::Draw
        } else {
            Goal::Win
        }
    }
}

/// Smallest piece count along the line, stopping early once it is in
/// tablebase range or at the first illegal move.
fn fewest_pieces(start: &Position, moves: &[Move]) -> usize {
    let mut fewest = start.piece_count();
    // Each ply removes at most one piece
    if fewest <= MAX_PIECES || fewest.saturating_sub(moves.len()) > MAX_PIECES {
        return fewest;
    }
    let mut position = start.clone();
    for mv in moves {
        let Ok(next) = position.apply(mv) else {
            break;
        };
        fewest = fewest.min(next.piece_count());
        if fewest <= MAX_PIECES {
            break;
        }
        position = next;
    }
    fewest
}

/// Parse one CSV row. `line` is 1-based and only used in error messages.
pub fn parse_puzzle_line(row: &str, line: usize) -> Result<PuzzleRecord, PuzzleParseError> {
    let cols: Vec<&str> = row.trim_end_matches(['\r', '\n']).split(',').collect();
    if cols.len() <= COL_THEMES {
        return Err(PuzzleParseError::MissingColumns {
            line,
            expected: COL_THEMES + 1,
            found: cols.len(),
        });
    }

    let id = cols[COL_ID].trim();
    if id.is_empty() {
        return Err(PuzzleParseError::EmptyId { line });
    }

    let start = Position::from_fen(cols[COL_FEN]).map_err(|source| PuzzleParseError::Position {
        id: id.to_string(),
        source,
    })?;

    let moves = cols[COL_MOVES]
        .split_whitespace()
        .map(|s| {
            s.parse::<Move>().map_err(|_| PuzzleParseError::Move {
                id: id.to_string(),
                mv: s.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    PuzzleRecord::new(id, start, moves, cols[COL_THEMES].split_whitespace())
}

fn is_header(row: &str) -> bool {
    row.starts_with("PuzzleId,")
}

/// Load every well-formed puzzle from a CSV file. Bad rows are logged and skipped.
pub fn load_puzzles<P: AsRef<Path>>(path: P) -> Result<Vec<PuzzleRecord>, PuzzleParseError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut puzzles = Vec::new();
    let mut rejected = 0usize;

    for (i, row) in reader.lines().enumerate() {
        let row = row?;
        if row.trim().is_empty() || (i == 0 && is_header(&row)) {
            continue;
        }
        match parse_puzzle_line(&row, i + 1) {
            Ok(p) => puzzles.push(p),
            Err(e) => {
                warn!(error = %e, "Skipping puzzle row");
                rejected += 1;
            }
        }
    }

    info!(
        path = %path.as_ref().display(),
        loaded = puzzles.len(),
        rejected,
        "Loaded puzzles"
    );
    Ok(puzzles)
}
