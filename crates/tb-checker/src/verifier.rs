//! Replay verification of a single puzzle against the tablebase oracle.
//!
//! A puzzle's line is replayed strictly in order, one ply at a time. Each
//! queried position is compared against the oracle's best-move set, and the
//! findings accumulate into one `PuzzleCheckResult`.

use puzzle_core::{Goal, Move, Position, PuzzleRecord, MAX_PIECES};
use tracing::{debug, warn};

use crate::oracle::{Oracle, OracleVerdict};
use crate::report::{PuzzleCheckResult, PuzzleError};

/// Stricter per-ply checks: solver plies only, goal outcome, unique best move. All off by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Only query the oracle on the solver's plies. Ply 0 is the opponent's
    /// setup move, so the solver plays the odd plies.
    pub solver_plies_only: bool,
    /// On solver plies, flag positions whose category does not match the
    /// puzzle's goal (win, or draw for equality puzzles).
    pub check_goal: bool,
    /// On solver plies, flag correct moves that are not the only best move.
    pub flag_alternatives: bool,
}

impl VerifyOptions {
    pub fn strict() -> Self {
        Self {
            solver_plies_only: true,
            check_goal: true,
            flag_alternatives: true,
        }
    }
}

fn is_solver_ply(ply: usize) -> bool {
    ply % 2 == 1
}

enum ReplayState {
    Pending,
    Replaying { ply: usize, position: Position },
    Done,
}

/// Replay state machine for one puzzle: `Pending -> Replaying(ply) -> Done`.
pub struct Replay<'a> {
    puzzle: &'a PuzzleRecord,
    options: &'a VerifyOptions,
    state: ReplayState,
    errors: Vec<PuzzleError>,
}

impl<'a> Replay<'a> {
    pub fn new(puzzle: &'a PuzzleRecord, options: &'a VerifyOptions) -> Self {
        Replay {
            puzzle,
            options,
            state: ReplayState::Pending,
            errors: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, ReplayState::Done)
    }

    /// Current ply, if replaying.
    pub fn ply(&self) -> Option<usize> {
        match self.state {
            ReplayState::Replaying { ply, .. } => Some(ply),
            _ => None,
        }
    }

    /// Advance by one ply, querying the oracle when this ply is checked.
    pub async fn step<O: Oracle>(&mut self, oracle: &O) {
        let state = std::mem::replace(&mut self.state, ReplayState::Done);
        self.state = match state {
            ReplayState::Pending => ReplayState::Replaying {
                ply: 0,
                position: self.puzzle.start.clone(),
            },
            ReplayState::Replaying { ply, position } => self.replay_ply(oracle, ply, position).await,
            ReplayState::Done => ReplayState::Done,
        };
    }

    async fn replay_ply<O: Oracle>(&mut self, oracle: &O, ply: usize, position: Position) -> ReplayState {
        let puzzle = self.puzzle;
        let Some(expected) = puzzle.moves.get(ply) else {
            return ReplayState::Done;
        };

        let next = match position.apply(expected) {
            Ok(next) => next,
            Err(e) => {
                warn!(puzzle_id = %puzzle.puzzle_id, ply, error = %e, "Malformed puzzle line");
                self.errors.push(PuzzleError::malformed_line(ply, expected.clone()));
                return ReplayState::Done;
            }
        };

        let in_range = position.piece_count() <= MAX_PIECES;
        if !in_range {
            debug!(puzzle_id = %puzzle.puzzle_id, ply, pieces = position.piece_count(), "Outside tablebase range, not queried");
        }
        if in_range && (!self.options.solver_plies_only || is_solver_ply(ply)) {
            match oracle.lookup(&position).await {
                Ok(verdict) => self.judge(ply, expected, &verdict),
                Err(e) => {
                    warn!(puzzle_id = %puzzle.puzzle_id, ply, error = %e, "Tablebase lookup failed");
                    self.errors
                        .push(PuzzleError::oracle_failure(ply, expected.clone(), e.kind()));
                    return ReplayState::Done;
                }
            }
        }

        if ply + 1 < puzzle.moves.len() {
            ReplayState::Replaying {
                ply: ply + 1,
                position: next,
            }
        } else {
            ReplayState::Done
        }
    }

    fn judge(&mut self, ply: usize, expected: &Move, verdict: &OracleVerdict) {
        let best = verdict.best_moves();
        let solver = is_solver_ply(ply);

        if self.options.check_goal && solver {
            let reached = match self.puzzle.goal() {
                Goal::Win => verdict.category.is_win(),
                Goal::Draw => verdict.category.score() == Some(0),
            };
            if !reached {
                debug!(puzzle_id = %self.puzzle.puzzle_id, ply, category = %verdict.category, "Goal not reachable");
                self.errors
                    .push(PuzzleError::wrong_outcome(ply, expected.clone(), verdict.category));
            }
        }

        if best.contains(expected) {
            if self.options.flag_alternatives && solver {
                let alternatives: Vec<Move> = best.into_iter().filter(|m| m != expected).collect();
                if !alternatives.is_empty() {
                    self.errors.push(PuzzleError::multiple_solutions(
                        ply,
                        expected.clone(),
                        alternatives,
                    ));
                }
            }
        } else {
            debug!(puzzle_id = %self.puzzle.puzzle_id, ply, expected = %expected, "Recorded move is not best");
            self.errors
                .push(PuzzleError::wrong_move(ply, expected.clone(), best));
        }
    }

    pub fn finish(self) -> PuzzleCheckResult {
        PuzzleCheckResult::new(self.puzzle.puzzle_id.clone(), self.errors)
    }
}

/// Verify one puzzle. Mate puzzles are out of scope and yield `None` without
/// touching the oracle.
pub async fn verify_puzzle<O: Oracle>(
    oracle: &O,
    puzzle: &PuzzleRecord,
    options: &VerifyOptions,
) -> Option<PuzzleCheckResult> {
    if puzzle.is_mate() {
        return None;
    }

    let mut replay = Replay::new(puzzle, options);
    while !replay.is_done() {
        replay.step(oracle).await;
    }
    Some(replay.finish())
}
