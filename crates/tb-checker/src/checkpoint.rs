//! Durable, append-only record of verified puzzles.
//!
//! One line per puzzle: `<puzzle_id>[ <error_token>]*`. A line is written with
//! a single `write_all` followed by `sync_data` before `append` returns, so a
//! crash either keeps the whole line or leaves a torn tail without a newline.
//! `open` drops such a tail.
//!
//! Lines whose tokens do not parse (for example the older `id Wrong Multiple`
//! format) keep their id as a legacy entry: the puzzle counts as checked, and
//! as flagged when it carries any token.

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{info, warn};

use crate::report::PuzzleCheckResult;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),
}

enum Entry {
    Checked(PuzzleCheckResult),
    /// Id from a line in an unrecognised format, with its raw tokens
    Legacy { tokens: String },
}

impl Entry {
    fn is_flagged(&self) -> bool {
        match self {
            Entry::Checked(result) => !result.is_correct(),
            Entry::Legacy { tokens } => !tokens.is_empty(),
        }
    }
}

struct Inner {
    file: File,
    entries: HashMap<String, Entry>,
}

pub struct CheckpointStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl CheckpointStore {
    /// Open or create the checkpoint file and load the results already in it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let complete = contents.rfind('\n').map_or(0, |i| i + 1);
        if complete < contents.len() {
            warn!(
                path = %path.display(),
                torn = %contents[complete..].trim_end(),
                "Dropping incomplete trailing checkpoint line"
            );
            file.set_len(complete as u64)?;
            file.sync_data()?;
        }

        let mut entries = HashMap::new();
        let mut legacy = 0usize;
        for (i, line) in contents[..complete].lines().enumerate() {
            let Some((id, entry)) = parse_entry(line, i + 1) else {
                continue;
            };
            if matches!(entry, Entry::Legacy { .. }) {
                legacy += 1;
            }
            if entries.contains_key(&id) {
                warn!(puzzle_id = %id, "Puzzle checked more than once, keeping first entry");
                continue;
            }
            entries.insert(id, entry);
        }

        info!(path = %path.display(), checked = entries.len(), legacy, "Checkpoint loaded");
        Ok(Self {
            path,
            inner: Mutex::new(Inner { file, entries }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, puzzle_id: &str) -> bool {
        self.lock().entries.contains_key(puzzle_id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The parsed result for `puzzle_id`. Legacy entries have none.
    pub fn get(&self, puzzle_id: &str) -> Option<PuzzleCheckResult> {
        match self.lock().entries.get(puzzle_id) {
            Some(Entry::Checked(result)) => Some(result.clone()),
            _ => None,
        }
    }

    /// Ids with at least one error, sorted.
    pub fn flagged_ids(&self) -> Vec<String> {
        let inner = self.lock();
        let mut ids: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_flagged())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Checked ids that are no longer part of `current`, sorted.
    pub fn stale_ids(&self, current: &HashSet<&str>) -> Vec<String> {
        let inner = self.lock();
        let mut ids: Vec<String> = inner
            .entries
            .keys()
            .filter(|id| !current.contains(id.as_str()))
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Durably record one result. Returns `false` without writing if the id
    /// is already present.
    pub fn append(&self, result: PuzzleCheckResult) -> Result<bool, CheckpointError> {
        let mut inner = self.lock();
        if inner.entries.contains_key(&result.puzzle_id) {
            return Ok(false);
        }

        let mut line = result.to_line();
        line.push('\n');
        inner.file.write_all(line.as_bytes())?;
        inner.file.sync_data()?;

        inner
            .entries
            .insert(result.puzzle_id.clone(), Entry::Checked(result));
        Ok(true)
    }
}

fn parse_entry(line: &str, line_no: usize) -> Option<(String, Entry)> {
    let mut fields = line.split_whitespace();
    let id = fields.next()?;
    match PuzzleCheckResult::parse_line(line) {
        Ok(result) => Some((result.puzzle_id.clone(), Entry::Checked(result))),
        Err(reason) => {
            warn!(line = line_no, puzzle_id = id, reason = %reason, "Unrecognised checkpoint tokens, keeping id only");
            let tokens = fields.collect::<Vec<_>>().join(" ");
            Some((id.to_string(), Entry::Legacy { tokens }))
        }
    }
}
