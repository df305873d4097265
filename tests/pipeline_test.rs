/// End-to-end pipeline tests against a scripted oracle.
///
/// Covers the run-level guarantees: results land in the checkpoint file once
/// per puzzle, reruns are no-ops, mate puzzles never reach the store, and an
/// interrupted run resumes to the same final contents.
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{mv, positions, puzzle, temp_path, verdict, ScriptedOracle};
use tb_checker::checkpoint::CheckpointStore;
use tb_checker::oracle::{Category, OracleError};
use tb_checker::pipeline::{Pipeline, PipelineConfig};
use tb_checker::report::{ErrorKind, PuzzleError};
use tb_checker::verifier::{verify_puzzle, VerifyOptions};

fn config(workers: usize) -> PipelineConfig {
    PipelineConfig {
        workers,
        verify: VerifyOptions::default(),
    }
}

fn sorted_lines(path: &std::path::Path) -> Vec<String> {
    let mut lines: Vec<String> = std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    lines.sort();
    lines
}

#[tokio::test]
async fn test_tied_best_moves_are_correct() {
    let p1 = puzzle("P1", &["e2e4", "e7e5"], &["endgame"]);
    let pos = positions(&p1);
    let oracle = ScriptedOracle::new()
        .answer(&pos[0], Ok(verdict(Category::Win, &["e2e4"], &["e1d1"])))
        .answer(&pos[1], Ok(verdict(Category::Loss, &["c7c5", "e7e5"], &[])));

    let result = verify_puzzle(&oracle, &p1, &VerifyOptions::default())
        .await
        .unwrap();
    assert_eq!(result.puzzle_id, "P1");
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_single_best_move_flags_divergence() {
    let p1 = puzzle("P1", &["e2e4", "e7e5"], &["endgame"]);
    let pos = positions(&p1);
    let oracle = ScriptedOracle::new()
        .answer(&pos[0], Ok(verdict(Category::Win, &["e2e4"], &[])))
        .answer(&pos[1], Ok(verdict(Category::Loss, &["c7c5"], &["e7e5"])));

    let result = verify_puzzle(&oracle, &p1, &VerifyOptions::default())
        .await
        .unwrap();
    assert_eq!(
        result.errors,
        vec![PuzzleError::wrong_move(1, mv("e7e5"), vec![mv("c7c5")])]
    );
}

#[tokio::test]
async fn test_timeout_halts_replay() {
    let p1 = puzzle("P1", &["e2e4", "e7e5"], &["endgame"]);
    let pos = positions(&p1);
    let oracle = ScriptedOracle::new().answer(&pos[0], Err(OracleError::Timeout));

    let result = verify_puzzle(&oracle, &p1, &VerifyOptions::default())
        .await
        .unwrap();
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ErrorKind::OracleFailure);
    assert_eq!(result.errors[0].ply, 0);
    assert_eq!(result.to_line(), "P1 oracle_failure:0:e2e4:timeout");
    // No query for the position after e2e4
    assert_eq!(oracle.queries(), vec![pos[0].to_query_string()]);
}

#[tokio::test]
async fn test_same_responses_same_result() {
    let p1 = puzzle("P1", &["e2e4", "e7e5"], &["endgame"]);
    let pos = positions(&p1);

    let mut results = Vec::new();
    for _ in 0..3 {
        let oracle = ScriptedOracle::new()
            .answer(&pos[0], Ok(verdict(Category::Win, &["e2e3", "e2e4"], &[])))
            .answer(&pos[1], Ok(verdict(Category::Loss, &["e7e6"], &["e7e5"])));
        results.push(
            verify_puzzle(&oracle, &p1, &VerifyOptions::default())
                .await
                .unwrap(),
        );
    }
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(results[0].to_line(), "P1 wrong_move:1:e7e5:e7e6");
}

#[tokio::test]
async fn test_second_run_is_noop() {
    let path = temp_path("idempotent");
    let oracle = Arc::new(
        ScriptedOracle::new().with_fallback(Ok(verdict(Category::Draw, &["e2e4", "e7e5"], &[]))),
    );
    let puzzles = || {
        vec![
            puzzle("A", &["e2e4", "e7e5"], &["endgame"]),
            puzzle("B", &["e2e3"], &["equality"]),
            puzzle("C", &["e2e4", "e7e6"], &["endgame"]),
        ]
    };

    let store = Arc::new(CheckpointStore::open(&path).unwrap());
    let first = Pipeline::new(Arc::clone(&oracle), Arc::clone(&store), config(2))
        .run(puzzles())
        .await
        .unwrap();
    assert_eq!(first.checked, 3);
    assert_eq!(first.flagged, 2);
    let after_first = std::fs::read_to_string(&path).unwrap();
    let queries_after_first = oracle.queries().len();

    // Fresh store handle, as a new process would have
    let store = Arc::new(CheckpointStore::open(&path).unwrap());
    let second = Pipeline::new(Arc::clone(&oracle), store, config(2))
        .run(puzzles())
        .await
        .unwrap();
    assert_eq!(second.checked, 0);
    assert_eq!(second.skipped_done, 3);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), after_first);
    assert_eq!(oracle.queries().len(), queries_after_first);
    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_mate_puzzles_never_stored() {
    let path = temp_path("mate");
    let oracle = Arc::new(
        ScriptedOracle::new().with_fallback(Ok(verdict(Category::Win, &["e2e4", "e7e5"], &[]))),
    );
    let store = Arc::new(CheckpointStore::open(&path).unwrap());

    let summary = Pipeline::new(Arc::clone(&oracle), Arc::clone(&store), config(4))
        .run(vec![
            puzzle("M1", &["e2e4"], &["mate", "mateIn1"]),
            puzzle("M2", &["e2e4"], &["backRankMate"]),
            puzzle("E1", &["e2e4"], &["endgame"]),
        ])
        .await
        .unwrap();

    assert_eq!(summary.skipped_mate, 2);
    assert_eq!(summary.checked, 1);
    assert!(!store.contains("M1") && !store.contains("M2"));
    assert_eq!(sorted_lines(&path), vec!["E1".to_string()]);
    // Only E1's single ply was looked up
    assert_eq!(oracle.queries().len(), 1);
    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_failures_stay_local_to_their_puzzle() {
    let path = temp_path("local");
    let bad = puzzle("BAD", &["e2e4", "e7e5"], &[]);
    let pos = positions(&bad);
    let oracle = Arc::new(
        ScriptedOracle::new()
            .answer(&pos[1], Err(OracleError::Unavailable("HTTP 503".to_string())))
            .with_fallback(Ok(verdict(Category::Win, &["e2e4", "e2e3"], &[]))),
    );
    let store = Arc::new(CheckpointStore::open(&path).unwrap());

    let summary = Pipeline::new(oracle, Arc::clone(&store), config(2))
        .run(vec![
            bad,
            puzzle("GOOD", &["e2e3"], &[]),
            puzzle("ILLEGAL", &["e2e5"], &[]),
        ])
        .await
        .unwrap();

    assert_eq!(summary.checked, 3);
    assert_eq!(summary.flagged, 2);
    assert_eq!(
        sorted_lines(&path),
        vec![
            "BAD oracle_failure:1:e7e5:unavailable".to_string(),
            "GOOD".to_string(),
            "ILLEGAL malformed_line:0:e2e5".to_string(),
        ]
    );
    std::fs::remove_file(&path).ok();
}

#[tokio::test(start_paused = true)]
async fn test_resume_matches_uninterrupted_run() {
    let puzzles = || {
        (0..6)
            .map(|i| {
                let tags: &[&str] = if i % 3 == 0 { &["mateIn2"] } else { &["endgame"] };
                puzzle(&format!("P{i}"), &["e2e4", "e7e5"], tags)
            })
            .collect::<Vec<_>>()
    };
    let oracle = || {
        let p = puzzle("X", &["e2e4", "e7e5"], &[]);
        let pos = positions(&p);
        Arc::new(
            ScriptedOracle::new()
                .answer(&pos[0], Ok(verdict(Category::Win, &["e2e4"], &[])))
                .answer(&pos[1], Ok(verdict(Category::Loss, &["e7e6"], &["e7e5"])))
                .with_delay(Duration::from_secs(1)),
        )
    };

    let full_path = temp_path("resume-full");
    let store = Arc::new(CheckpointStore::open(&full_path).unwrap());
    Pipeline::new(oracle(), store, config(1))
        .run(puzzles())
        .await
        .unwrap();

    // Each puzzle takes 2s with one worker; stop after the first one is done
    let resumed_path = temp_path("resume-split");
    let store = Arc::new(CheckpointStore::open(&resumed_path).unwrap());
    let interrupted = Pipeline::new(oracle(), store, config(1))
        .run_until(puzzles(), tokio::time::sleep(Duration::from_millis(3500)))
        .await
        .unwrap();
    assert!(interrupted.cancelled);
    assert_eq!(interrupted.checked, 1);

    let store = Arc::new(CheckpointStore::open(&resumed_path).unwrap());
    let resumed = Pipeline::new(oracle(), store, config(2))
        .run(puzzles())
        .await
        .unwrap();
    assert_eq!(resumed.skipped_done, 1);
    assert_eq!(resumed.checked, 3);

    assert_eq!(sorted_lines(&full_path), sorted_lines(&resumed_path));
    assert_eq!(sorted_lines(&full_path).len(), 4);
    std::fs::remove_file(&full_path).ok();
    std::fs::remove_file(&resumed_path).ok();
}
