//! Chess primitives for endgame puzzle verification: an immutable position
//! model keyed by FEN, UCI moves, and puzzle records loaded from the lichess
//! puzzle CSV.

pub mod position;
pub mod puzzle;

pub use position::{IllegalMoveError, Move, ParseMoveError, Position, PositionError, Side};
pub use puzzle::{load_puzzles, parse_puzzle_line, Goal, PuzzleParseError, PuzzleRecord, MAX_PIECES};
