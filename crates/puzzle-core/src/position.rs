//! Immutable chess positions and UCI moves.
//!
//! A `Position` never changes after construction: applying a move yields a new
//! value, so any prefix of a puzzle line can be replayed from the start.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Position as _};
use thiserror::Error;

/// Side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    White,
    Black,
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PositionError {
    #[error("invalid FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },

    #[error("illegal position '{fen}': {reason}")]
    IllegalPosition { fen: String, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid UCI move '{0}'")]
pub struct ParseMoveError(pub String);

/// A recorded move that cannot be played in the position it was replayed in.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("move {mv} is not legal in {fen}")]
pub struct IllegalMoveError {
    pub mv: Move,
    pub fen: String,
}

/// A single ply in UCI notation: origin, destination and optional promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move(UciMove);

impl Move {
    pub fn as_uci(&self) -> &UciMove {
        &self.0
    }
}

impl FromStr for Move {
    type Err = ParseMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uci: UciMove = s.parse().map_err(|_| ParseMoveError(s.to_string()))?;
        match uci {
            UciMove::Normal { .. } => Ok(Move(uci)),
            // Drops and null moves never appear in standard chess puzzles
            _ => Err(ParseMoveError(s.to_string())),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for Move {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Move {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An exact, immutable standard chess position.
#[derive(Debug, Clone)]
pub struct Position {
    inner: Chess,
}

impl Position {
    /// Parse a position from FEN, with standard castling rules.
    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        let parsed: Fen = fen.trim().parse().map_err(|e| PositionError::InvalidFen {
            fen: fen.to_string(),
            reason: format!("{e}"),
        })?;
        let inner: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| PositionError::IllegalPosition {
                fen: fen.to_string(),
                reason: format!("{e}"),
            })?;
        Ok(Self { inner })
    }

    /// The position reached by playing `mv`. `self` is left untouched.
    pub fn apply(&self, mv: &Move) -> Result<Position, IllegalMoveError> {
        let legal = mv.0.to_move(&self.inner).map_err(|_| IllegalMoveError {
            mv: mv.clone(),
            fen: self.to_query_string(),
        })?;
        let mut next = self.inner.clone();
        next.play_unchecked(legal);
        Ok(Position { inner: next })
    }

    /// Canonical FEN used as the oracle query key. The en passant square is
    /// only written when an en passant capture is actually legal.
    pub fn to_query_string(&self) -> String {
        Fen::from_position(&self.inner, EnPassantMode::Legal).to_string()
    }

    /// Number of pieces on the board, kings included.
    pub fn piece_count(&self) -> usize {
        self.inner.board().occupied().count()
    }

    pub fn side_to_move(&self) -> Side {
        self.inner.turn().into()
    }

    pub fn is_legal(&self, mv: &Move) -> bool {
        mv.0.to_move(&self.inner).is_ok()
    }

    pub fn has_legal_moves(&self) -> bool {
        !self.inner.legal_moves().is_empty()
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.to_query_string() == other.to_query_string()
    }
}

impl Eq for Position {}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}
