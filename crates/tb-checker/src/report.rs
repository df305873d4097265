//! Per-puzzle findings and their compact checkpoint encoding.
//!
//! A checkpoint line is `<puzzle_id>[ <token>]*`. Every token has the shape
//! `<kind>:<ply>:<expected>[:<detail>]` and never contains whitespace:
//!
//! | kind | detail |
//! |---|---|
//! | `wrong_move` | comma-separated best moves |
//! | `malformed_line` | none |
//! | `oracle_failure` | `unavailable`, `rejected` or `timeout` |
//! | `wrong_outcome` | category of the position |
//! | `multiple_solutions` | comma-separated alternative moves |

use std::fmt;
use std::str::FromStr;

use puzzle_core::Move;

use crate::oracle::{Category, FailureKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The recorded move is not among the oracle's best moves.
    WrongMove,
    /// The recorded move is illegal in the replayed position.
    MalformedLine,
    /// The oracle could not answer; replay stopped.
    OracleFailure,
    /// The position does not have the outcome the puzzle claims.
    WrongOutcome,
    /// Other moves reach the same best outcome as the recorded one.
    MultipleSolutions,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::WrongMove => "wrong_move",
            ErrorKind::MalformedLine => "malformed_line",
            ErrorKind::OracleFailure => "oracle_failure",
            ErrorKind::WrongOutcome => "wrong_outcome",
            ErrorKind::MultipleSolutions => "multiple_solutions",
        }
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wrong_move" => Ok(ErrorKind::WrongMove),
            "malformed_line" => Ok(ErrorKind::MalformedLine),
            "oracle_failure" => Ok(ErrorKind::OracleFailure),
            "wrong_outcome" => Ok(ErrorKind::WrongOutcome),
            "multiple_solutions" => Ok(ErrorKind::MultipleSolutions),
            other => Err(format!("unknown error kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDetail {
    None,
    Moves(Vec<Move>),
    Failure(FailureKind),
    Category(Category),
}

/// One discrepancy found while replaying a puzzle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleError {
    pub kind: ErrorKind,
    pub ply: usize,
    pub expected: Move,
    pub detail: ErrorDetail,
}

impl PuzzleError {
    pub fn wrong_move(ply: usize, expected: Move, best: Vec<Move>) -> Self {
        Self {
            kind: ErrorKind::WrongMove,
            ply,
            expected,
            detail: ErrorDetail::Moves(best),
        }
    }

    pub fn malformed_line(ply: usize, expected: Move) -> Self {
        Self {
            kind: ErrorKind::MalformedLine,
            ply,
            expected,
            detail: ErrorDetail::None,
        }
    }

    pub fn oracle_failure(ply: usize, expected: Move, failure: FailureKind) -> Self {
        Self {
            kind: ErrorKind::OracleFailure,
            ply,
            expected,
            detail: ErrorDetail::Failure(failure),
        }
    }

    pub fn wrong_outcome(ply: usize, expected: Move, category: Category) -> Self {
        Self {
            kind: ErrorKind::WrongOutcome,
            ply,
            expected,
            detail: ErrorDetail::Category(category),
        }
    }

    pub fn multiple_solutions(ply: usize, expected: Move, alternatives: Vec<Move>) -> Self {
        Self {
            kind: ErrorKind::MultipleSolutions,
            ply,
            expected,
            detail: ErrorDetail::Moves(alternatives),
        }
    }

    /// The oracle's best-move set, for the kinds that carry one.
    pub fn oracle_moves(&self) -> &[Move] {
        match &self.detail {
            ErrorDetail::Moves(moves) => moves,
            _ => &[],
        }
    }
}

fn join_moves(moves: &[Move]) -> String {
    moves.iter().map(Move::to_string).collect::<Vec<_>>().join(",")
}

fn parse_moves(s: &str) -> Result<Vec<Move>, String> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split(',')
        .map(|m| m.parse::<Move>().map_err(|e| e.to_string()))
        .collect()
}

impl fmt::Display for PuzzleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind.as_str(), self.ply, self.expected)?;
        match &self.detail {
            ErrorDetail::None => Ok(()),
            ErrorDetail::Moves(moves) => write!(f, ":{}", join_moves(moves)),
            ErrorDetail::Failure(failure) => write!(f, ":{failure}"),
            ErrorDetail::Category(category) => write!(f, ":{category}"),
        }
    }
}

impl FromStr for PuzzleError {
    type Err = String;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let mut parts = token.splitn(4, ':');
        let kind: ErrorKind = parts.next().unwrap_or_default().parse()?;
        let ply: usize = parts
            .next()
            .ok_or_else(|| format!("token '{token}' has no ply"))?
            .parse()
            .map_err(|_| format!("token '{token}' has a bad ply"))?;
        let expected: Move = parts
            .next()
            .ok_or_else(|| format!("token '{token}' has no move"))?
            .parse()
            .map_err(|e| format!("token '{token}': {e}"))?;
        let detail = parts.next();

        let detail = match (kind, detail) {
            (ErrorKind::MalformedLine, None) => ErrorDetail::None,
            (ErrorKind::WrongMove | ErrorKind::MultipleSolutions, Some(d)) => {
                ErrorDetail::Moves(parse_moves(d)?)
            }
            (ErrorKind::OracleFailure, Some(d)) => ErrorDetail::Failure(d.parse()?),
            (ErrorKind::WrongOutcome, Some(d)) => ErrorDetail::Category(d.parse()?),
            _ => return Err(format!("token '{token}' has the wrong shape for its kind")),
        };

        Ok(Self {
            kind,
            ply,
            expected,
            detail,
        })
    }
}

/// Outcome of verifying one puzzle. No errors means the puzzle is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleCheckResult {
    pub puzzle_id: String,
    pub errors: Vec<PuzzleError>,
}

impl PuzzleCheckResult {
    pub fn new(puzzle_id: impl Into<String>, errors: Vec<PuzzleError>) -> Self {
        Self {
            puzzle_id: puzzle_id.into(),
            errors,
        }
    }

    pub fn is_correct(&self) -> bool {
        self.errors.is_empty()
    }

    /// Checkpoint line without the trailing newline.
    pub fn to_line(&self) -> String {
        let mut line = self.puzzle_id.clone();
        for e in &self.errors {
            line.push(' ');
            line.push_str(&e.to_string());
        }
        line
    }

    pub fn parse_line(line: &str) -> Result<Self, String> {
        let mut fields = line.split_whitespace();
        let puzzle_id = fields.next().ok_or_else(|| "empty line".to_string())?;
        let errors = fields.map(str::parse).collect::<Result<Vec<PuzzleError>, _>>()?;
        Ok(Self::new(puzzle_id, errors))
    }

    /// Space-separated tokens, for logging.
    pub fn tokens(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
