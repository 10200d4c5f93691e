use std::sync::mpsc::{self, Sender};
use std::thread;

use log::warn;

use crate::api::{Backend, NewSolve, OptimalSolution, Scramble, SolveRecord};
use crate::runtime::AppEvent;
use crate::solve::{Penalty, PuzzleKind, SolveScore};
use crate::stats::LiveStats;

/// A backend call requested by the UI. Everything here runs off the UI
/// thread; outcomes come back as `AppEvent::Backend` on the event channel.
#[derive(Debug)]
pub enum Job {
    FetchScramble { event: PuzzleKind },
    SaveSolve { solve: NewSolve },
    RescoreSolve { solve_id: i64 },
    AmendPenalty { solve_id: i64, penalty: Penalty },
    FetchOptimal { state: String, event: PuzzleKind },
    FetchStats { event: PuzzleKind },
}

/// Outcome of a backend job. Failures carry a short message for the inline
/// message line; they never alter timer state.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    Scramble(Result<Scramble, String>),
    /// The save outcome, with the post-save score when the best-effort
    /// scoring step succeeded.
    SolveSaved(Result<(SolveRecord, LiveStats, Option<SolveScore>), String>),
    Scored {
        solve_id: i64,
        result: Result<SolveScore, String>,
    },
    PenaltyAmended {
        solve_id: i64,
        penalty: Penalty,
        result: Result<(), String>,
    },
    Optimal(Result<OptimalSolution, String>),
    Stats(Result<LiveStats, String>),
}

fn short_error(err: anyhow::Error) -> String {
    format!("{:#}", err)
}

/// Execute one job against the backend.
pub fn run_job(backend: &dyn Backend, job: Job) -> BackendEvent {
    match job {
        Job::FetchScramble { event } => {
            BackendEvent::Scramble(backend.get_scramble(event).map_err(short_error))
        }
        Job::SaveSolve { solve } => match backend.create_solve(&solve) {
            Ok(created) => {
                // Scoring after a save is best-effort: the solve is already
                // durably recorded, so a scoring failure is only logged.
                let score = match backend.score_solve(created.solve.id) {
                    Ok(score) => Some(score),
                    Err(err) => {
                        warn!("post-save scoring failed for solve {}: {:#}", created.solve.id, err);
                        None
                    }
                };
                BackendEvent::SolveSaved(Ok((created.solve, created.stats, score)))
            }
            Err(err) => BackendEvent::SolveSaved(Err(short_error(err))),
        },
        Job::RescoreSolve { solve_id } => BackendEvent::Scored {
            solve_id,
            result: backend.score_solve(solve_id).map_err(short_error),
        },
        Job::AmendPenalty { solve_id, penalty } => BackendEvent::PenaltyAmended {
            solve_id,
            penalty,
            result: backend.update_solve(solve_id, penalty).map_err(short_error),
        },
        Job::FetchOptimal { state, event } => BackendEvent::Optimal(
            backend
                .get_optimal_solution(&state, event)
                .map_err(short_error),
        ),
        Job::FetchStats { event } => {
            BackendEvent::Stats(backend.get_live_stats(event).map_err(short_error))
        }
    }
}

/// Spawn the backend worker thread. It drains jobs in order and pushes each
/// outcome onto the shared app event channel; it exits when either channel
/// closes.
pub fn spawn<B>(backend: B, events: Sender<AppEvent>) -> Sender<Job>
where
    B: Backend + 'static,
{
    let (tx, rx) = mpsc::channel::<Job>();

    thread::spawn(move || {
        while let Ok(job) = rx.recv() {
            let outcome = run_job(&backend, job);
            if events.send(AppEvent::Backend(outcome)).is_err() {
                break;
            }
        }
    });

    tx
}
