use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::solve::{effective_time_ms, Penalty, ScoreState};

/// Aggregate statistics computed server-side over the solve history.
/// Field names match the backend's dashboard payload; every aggregate is
/// absent until at least one countable solve exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStats {
    pub count: u64,
    pub best_ms: Option<u64>,
    pub worst_ms: Option<u64>,
    pub ao5_ms: Option<u64>,
    pub ao12_ms: Option<u64>,
    pub avg_ms: Option<u64>,
    pub avg_score: Option<f64>,
}

/// One completed solve as tracked locally for the session panel.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSolve {
    pub solve_id: i64,
    pub elapsed_ms: u64,
    pub penalty: Penalty,
    pub scramble: String,
    pub score: ScoreState,
    pub recorded_at: DateTime<Local>,
}

impl SessionSolve {
    pub fn effective_ms(&self) -> Option<u64> {
        effective_time_ms(self.elapsed_ms, self.penalty)
    }
}

/// Solves completed in this session, newest last.
#[derive(Debug, Default)]
pub struct SessionHistory {
    solves: Vec<SessionSolve>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, solve: SessionSolve) {
        self.solves.push(solve);
    }

    pub fn len(&self) -> usize {
        self.solves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solves.is_empty()
    }

    pub fn last(&self) -> Option<&SessionSolve> {
        self.solves.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut SessionSolve> {
        self.solves.last_mut()
    }

    pub fn find_mut(&mut self, solve_id: i64) -> Option<&mut SessionSolve> {
        self.solves.iter_mut().find(|s| s.solve_id == solve_id)
    }

    /// Most recent solves first, capped at `n`, for the session panel.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &SessionSolve> {
        self.solves.iter().rev().take(n)
    }
}

/// Append-only CSV journal of completed solves, one row per save.
#[derive(Debug, Clone)]
pub struct SolveJournal {
    path: PathBuf,
}

impl SolveJournal {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn append(&self, solve: &SessionSolve) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let needs_header = !self.path.exists();

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record([
                "date",
                "time_ms",
                "penalty",
                "effective_ms",
                "score",
                "scramble",
            ])?;
        }

        writer.write_record([
            solve.recorded_at.to_rfc3339(),
            solve.elapsed_ms.to_string(),
            solve.penalty.to_string(),
            solve
                .effective_ms()
                .map_or(String::new(), |ms| ms.to_string()),
            solve
                .score
                .score()
                .map_or(String::new(), |s| format!("{:.1}", s)),
            solve.scramble.clone(),
        ])?;
        writer.flush()?;

        Ok(())
    }
}
