//! Tablebase oracle interface and verdict types.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use puzzle_core::{Move, Position};
use serde::Deserialize;
use thiserror::Error;

/// Game-theoretic outcome as reported by the tablebase.
///
/// A position's category is from the side to move's point of view. A move's
/// category describes the position *after* the move, so it is from the
/// opponent's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Win,
    #[serde(alias = "syzygy-win")]
    MaybeWin,
    CursedWin,
    Draw,
    BlessedLoss,
    #[serde(alias = "syzygy-loss")]
    MaybeLoss,
    Loss,
    #[serde(other)]
    Unknown,
}

impl Category {
    /// WDL-style score for the side to move: 2 win, 1 cursed win, 0 draw,
    /// -1 blessed loss, -2 loss. `None` when the tablebase does not know.
    pub fn score(self) -> Option<i8> {
        match self {
            Category::Win => Some(2),
            Category::MaybeWin | Category::CursedWin => Some(1),
            Category::Draw => Some(0),
            Category::BlessedLoss | Category::MaybeLoss => Some(-1),
            Category::Loss => Some(-2),
            Category::Unknown => None,
        }
    }

    pub fn is_win(self) -> bool {
        matches!(self, Category::Win | Category::MaybeWin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Win => "win",
            Category::MaybeWin => "maybe-win",
            Category::CursedWin => "cursed-win",
            Category::Draw => "draw",
            Category::BlessedLoss => "blessed-loss",
            Category::MaybeLoss => "maybe-loss",
            Category::Loss => "loss",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "win" => Ok(Category::Win),
            "maybe-win" | "syzygy-win" => Ok(Category::MaybeWin),
            "cursed-win" => Ok(Category::CursedWin),
            "draw" => Ok(Category::Draw),
            "blessed-loss" => Ok(Category::BlessedLoss),
            "maybe-loss" | "syzygy-loss" => Ok(Category::MaybeLoss),
            "loss" => Ok(Category::Loss),
            "unknown" => Ok(Category::Unknown),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

/// One legal move with the category of the position it leads to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OracleMove {
    pub uci: Move,
    pub category: Category,
}

impl OracleMove {
    /// Score of this move for the side playing it.
    fn mover_score(&self) -> i8 {
        self.category.score().map_or(i8::MIN, |s| -s)
    }
}

/// Tablebase answer for one position. Other response fields (dtz, dtm, san...)
/// are not used here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OracleVerdict {
    pub category: Category,
    #[serde(default)]
    pub moves: Vec<OracleMove>,
}

impl OracleVerdict {
    pub fn new(category: Category, moves: Vec<OracleMove>) -> Self {
        Self { category, moves }
    }

    /// Every move tied for the best outcome of the side to move. Moves with an
    /// unknown category only count when nothing better is known.
    pub fn best_moves(&self) -> Vec<Move> {
        let Some(best) = self.moves.iter().map(OracleMove::mover_score).max() else {
            return Vec::new();
        };
        self.moves
            .iter()
            .filter(|m| m.mover_score() == best)
            .map(|m| m.uci.clone())
            .collect()
    }

    pub fn is_best(&self, mv: &Move) -> bool {
        self.best_moves().contains(mv)
    }
}

/// Failure class persisted in `oracle_failure` tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Unavailable,
    Rejected,
    Timeout,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Unavailable => "unavailable",
            FailureKind::Rejected => "rejected",
            FailureKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unavailable" => Ok(FailureKind::Unavailable),
            "rejected" => Ok(FailureKind::Rejected),
            "timeout" => Ok(FailureKind::Timeout),
            other => Err(format!("unknown failure kind '{other}'")),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Network failure, 5xx or rate limiting. Retried.
    #[error("tablebase unavailable: {0}")]
    Unavailable(String),

    /// The service refused the query (4xx) or answered with garbage. Not retried.
    #[error("tablebase rejected query: {0}")]
    Rejected(String),

    #[error("tablebase request timed out")]
    Timeout,
}

impl OracleError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, OracleError::Rejected(_))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            OracleError::Unavailable(_) => FailureKind::Unavailable,
            OracleError::Rejected(_) => FailureKind::Rejected,
            OracleError::Timeout => FailureKind::Timeout,
        }
    }
}

/// Maps positions to tablebase verdicts. Implementations must be shareable
/// across verification tasks.
pub trait Oracle: Send + Sync + 'static {
    fn lookup(
        &self,
        position: &Position,
    ) -> impl Future<Output = Result<OracleVerdict, OracleError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn om(uci: &str, category: Category) -> OracleMove {
        OracleMove {
            uci: uci.parse().unwrap(),
            category,
        }
    }

    #[test]
    fn test_parse_lichess_response() {
        let body = r#"{
            "checkmate": false, "stalemate": false, "dtz": 1, "dtm": 17,
            "category": "win",
            "moves": [
                {"uci": "h7h8q", "san": "h8=Q+", "category": "loss", "dtz": -2, "zeroing": true},
                {"uci": "h7h8r", "san": "h8=R", "category": "blessed-loss", "dtz": -101},
                {"uci": "e1d1", "san": "Kd1", "category": "draw", "dtz": 0}
            ]
        }"#;
        let verdict: OracleVerdict = serde_json::from_str(body).unwrap();
        assert_eq!(verdict.category, Category::Win);
        assert_eq!(verdict.moves.len(), 3);
        assert_eq!(verdict.best_moves(), vec!["h7h8q".parse::<Move>().unwrap()]);
    }

    #[test]
    fn test_unknown_category_string() {
        let verdict: OracleVerdict =
            serde_json::from_str(r#"{"category": "something-new", "moves": []}"#).unwrap();
        assert_eq!(verdict.category, Category::Unknown);
        assert!(verdict.best_moves().is_empty());
    }

    #[test]
    fn test_syzygy_category_aliases() {
        let win: OracleVerdict = serde_json::from_str(r#"{"category": "syzygy-win"}"#).unwrap();
        assert_eq!(win.category, Category::MaybeWin);
        let loss: OracleVerdict = serde_json::from_str(r#"{"category": "syzygy-loss"}"#).unwrap();
        assert_eq!(loss.category, Category::MaybeLoss);
        assert!(loss.moves.is_empty());
    }

    #[test]
    fn test_best_moves_keeps_ties() {
        let verdict = OracleVerdict::new(
            Category::Loss,
            vec![
                om("c7c5", Category::Draw),
                om("e7e5", Category::Draw),
                om("d7d5", Category::Win),
            ],
        );
        let best = verdict.best_moves();
        assert_eq!(best.len(), 2);
        assert!(verdict.is_best(&"e7e5".parse().unwrap()));
        assert!(verdict.is_best(&"c7c5".parse().unwrap()));
        assert!(!verdict.is_best(&"d7d5".parse().unwrap()));
    }

    #[test]
    fn test_cursed_win_ranks_below_win() {
        let verdict = OracleVerdict::new(
            Category::Win,
            vec![om("a1a2", Category::BlessedLoss), om("a1b1", Category::Loss)],
        );
        assert_eq!(verdict.best_moves(), vec!["a1b1".parse::<Move>().unwrap()]);
    }

    #[test]
    fn test_unknown_moves_rank_last() {
        let verdict = OracleVerdict::new(
            Category::Draw,
            vec![om("a1a2", Category::Unknown), om("a1b1", Category::Win)],
        );
        assert_eq!(verdict.best_moves(), vec!["a1b1".parse::<Move>().unwrap()]);
    }

    #[test]
    fn test_error_classes() {
        assert!(OracleError::Timeout.is_transient());
        assert!(OracleError::Unavailable("503".into()).is_transient());
        assert!(!OracleError::Rejected("400".into()).is_transient());
        assert_eq!(OracleError::Timeout.kind(), FailureKind::Timeout);
    }

    #[test]
    fn test_category_string_roundtrip() {
        for c in [
            Category::Win,
            Category::MaybeWin,
            Category::CursedWin,
            Category::Draw,
            Category::BlessedLoss,
            Category::MaybeLoss,
            Category::Loss,
            Category::Unknown,
        ] {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
    }
}
