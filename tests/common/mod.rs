#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tb_checker::oracle::{Category, Oracle, OracleError, OracleMove, OracleVerdict};
use tb_checker::puzzle_core::{Move, Position, PuzzleRecord};

/// Four pieces, white to move: the position most tests start from.
pub const START_FEN: &str = "4k3/4p3/8/8/8/8/4P3/4K3 w - - 0 1";

/// Generate a unique suffix based on timestamp to avoid collisions.
pub fn unique_suffix() -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", std::process::id(), ts % 1_000_000_000)
}

/// Fresh path in the temp dir; the file does not exist yet.
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tb-{name}-{}.txt", unique_suffix()))
}

pub fn mv(s: &str) -> Move {
    s.parse().unwrap()
}

pub fn puzzle(id: &str, moves: &[&str], tags: &[&str]) -> PuzzleRecord {
    PuzzleRecord::new(
        id,
        Position::from_fen(START_FEN).unwrap(),
        moves.iter().map(|m| mv(m)).collect(),
        tags.iter().copied(),
    )
    .unwrap()
}

/// Positions before each ply of `p`.
pub fn positions(p: &PuzzleRecord) -> Vec<Position> {
    let mut out = vec![p.start.clone()];
    for m in &p.moves[..p.moves.len() - 1] {
        let next = out.last().unwrap().apply(m).unwrap();
        out.push(next);
    }
    out
}

/// Verdict where `best` moves hold the position's category and `others` are
/// strictly worse for the side to move.
pub fn verdict(category: Category, best: &[&str], others: &[&str]) -> OracleVerdict {
    let (after_best, after_other) = match category {
        Category::Win => (Category::Loss, Category::Draw),
        Category::Draw => (Category::Draw, Category::Win),
        _ => (Category::Win, Category::Unknown),
    };
    let mut moves: Vec<OracleMove> = best
        .iter()
        .map(|m| OracleMove { uci: mv(m), category: after_best })
        .collect();
    moves.extend(others.iter().map(|m| OracleMove { uci: mv(m), category: after_other }));
    OracleVerdict::new(category, moves)
}

/// Oracle stub scripted per position.
///
/// Each position has a queue of responses; the last one repeats once the
/// queue is down to a single entry. Unscripted positions get `fallback`.
pub struct ScriptedOracle {
    script: Mutex<HashMap<String, VecDeque<Result<OracleVerdict, OracleError>>>>,
    fallback: Result<OracleVerdict, OracleError>,
    delay: Duration,
    queries: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            fallback: Err(OracleError::Rejected("unscripted position".to_string())),
            delay: Duration::ZERO,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fallback(mut self, fallback: Result<OracleVerdict, OracleError>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Sleep this long inside every lookup.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn answer(self, position: &Position, response: Result<OracleVerdict, OracleError>) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(position.to_query_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl Oracle for ScriptedOracle {
    async fn lookup(&self, position: &Position) -> Result<OracleVerdict, OracleError> {
        let fen = position.to_query_string();
        self.queries.lock().unwrap().push(fen.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut script = self.script.lock().unwrap();
        match script.get_mut(&fen) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => self.fallback.clone(),
        }
    }
}
