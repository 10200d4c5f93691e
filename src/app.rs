use std::sync::mpsc::Sender;
use std::time::Instant;

use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::warn;
use webbrowser::Browser;

use crate::api::{validate_state_encoding, NewSolve, OptimalSolution, Scramble};
use crate::config::{Config, ConfigStore};
use crate::solve::{Penalty, PuzzleKind, ScoreState};
use crate::stats::{LiveStats, SessionHistory, SessionSolve, SolveJournal};
use crate::timer::{PendingSolve, TimerEffect, TimerMachine, TimerPhase};
use crate::worker::{BackendEvent, Job};
use crate::runtime::AppEvent;

/// The page controller: owns the timer machine and all view state, maps
/// input events to machine transitions, and hands backend work to the
/// worker without ever blocking on it.
pub struct App {
    pub machine: TimerMachine,
    pub event: PuzzleKind,
    pub scramble: Option<Scramble>,
    pub scramble_loading: bool,
    pub stats: LiveStats,
    pub history: SessionHistory,
    pub optimal: Option<OptimalSolution>,
    pub last_result: Option<PendingSolve>,
    pub message: Option<String>,
    pub should_quit: bool,
    /// Instant of the most recently handled event; the view samples the
    /// clock loop at this point in time.
    pub now: Instant,
    config: Config,
    store: Box<dyn ConfigStore>,
    journal: Option<SolveJournal>,
    jobs: Sender<Job>,
    /// Whether the terminal reports key releases; without them a tap stands
    /// in for a full hold-and-release.
    hold_to_arm: bool,
    /// The attempt whose save is in flight, kept until the outcome arrives.
    pending_save: Option<(PendingSolve, String)>,
}

impl App {
    pub fn new(
        config: Config,
        store: Box<dyn ConfigStore>,
        jobs: Sender<Job>,
        journal: Option<SolveJournal>,
        hold_to_arm: bool,
    ) -> Self {
        let mut app = Self {
            machine: TimerMachine::new(config.inspection_enabled),
            event: config.event,
            scramble: None,
            scramble_loading: false,
            stats: LiveStats::default(),
            history: SessionHistory::new(),
            optimal: None,
            last_result: None,
            message: None,
            should_quit: false,
            now: Instant::now(),
            config,
            store,
            journal,
            jobs,
            hold_to_arm,
            pending_save: None,
        };

        app.request_scramble();
        app.dispatch(Job::FetchStats { event: app.event });
        app
    }

    pub fn inspection_enabled(&self) -> bool {
        self.config.inspection_enabled
    }

    pub fn handle_event(&mut self, event: AppEvent, now: Instant) {
        self.now = now;
        match event {
            AppEvent::Tick => self.machine.on_tick(now),
            AppEvent::Resize => {}
            AppEvent::Key(key) => self.handle_key(key, now),
            AppEvent::Backend(outcome) => self.handle_backend(outcome),
        }
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        match key.kind {
            KeyEventKind::Press => self.handle_key_press(key, now),
            KeyEventKind::Release => {
                if key.code == KeyCode::Char(' ') {
                    let effect = self.machine.on_release(now);
                    self.apply_effect(effect);
                }
            }
            KeyEventKind::Repeat => {}
        }
    }

    fn handle_key_press(&mut self, key: KeyEvent, now: Instant) {
        // Any key stops a running solve or starts it out of inspection;
        // only the trigger key matters in the other phases.
        match self.machine.phase() {
            TimerPhase::Running | TimerPhase::Inspection => {
                let effect = self.machine.on_press(now);
                self.apply_effect(effect);
                return;
            }
            TimerPhase::Arming | TimerPhase::Ready => {
                // Held; nothing else is actionable until release.
                return;
            }
            TimerPhase::Idle => {}
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit();
            return;
        }

        match key.code {
            KeyCode::Char(' ') => {
                let effect = if self.hold_to_arm {
                    self.machine.on_press(now)
                } else {
                    self.machine.on_tap(now)
                };
                self.apply_effect(effect);
            }
            KeyCode::Esc => self.quit(),
            KeyCode::Char('n') => {
                if !self.machine.save_in_flight() {
                    self.request_scramble();
                }
            }
            KeyCode::Char('i') => self.toggle_inspection(),
            KeyCode::Char('o') => self.request_optimal(),
            KeyCode::Char('s') => self.dispatch(Job::FetchStats { event: self.event }),
            KeyCode::Char('r') => self.request_rescore(),
            KeyCode::Char('0') => self.amend_last_penalty(Penalty::Ok),
            KeyCode::Char('2') => self.amend_last_penalty(Penalty::PlusTwo),
            KeyCode::Char('x') => self.amend_last_penalty(Penalty::Dnf),
            KeyCode::Char('d') => self.open_dashboard(),
            _ => {}
        }
    }

    fn apply_effect(&mut self, effect: TimerEffect) {
        if let TimerEffect::SolveFinished(pending) = effect {
            self.finish_solve(pending);
        }
    }

    fn finish_solve(&mut self, pending: PendingSolve) {
        let (scramble, state) = match &self.scramble {
            Some(s) => (s.scramble.clone(), s.state.clone()),
            None => (String::new(), String::new()),
        };

        self.last_result = Some(pending);
        self.optimal = None;
        self.message = None;

        // Block further attempts until the save settles; the machine is
        // already back in Idle so the UI shows the final time meanwhile.
        self.machine.begin_save();
        self.pending_save = Some((pending, scramble.clone()));
        self.dispatch(Job::SaveSolve {
            solve: NewSolve {
                scramble,
                time_ms: pending.elapsed_ms,
                penalty: pending.penalty,
                source: "timer".to_string(),
                event: self.event,
                state,
            },
        });
    }

    fn handle_backend(&mut self, outcome: BackendEvent) {
        match outcome {
            BackendEvent::Scramble(Ok(scramble)) => {
                self.scramble = Some(scramble);
                self.scramble_loading = false;
            }
            BackendEvent::Scramble(Err(msg)) => {
                self.scramble_loading = false;
                self.message = Some(msg);
            }
            BackendEvent::SolveSaved(result) => self.finish_save(result),
            BackendEvent::Scored { solve_id, result } => match result {
                Ok(score) => {
                    if let Some(solve) = self.history.find_mut(solve_id) {
                        solve.score = ScoreState::Scored(score);
                    }
                }
                Err(msg) => self.message = Some(msg),
            },
            BackendEvent::PenaltyAmended {
                solve_id,
                penalty,
                result,
            } => match result {
                Ok(()) => {
                    if let Some(solve) = self.history.find_mut(solve_id) {
                        solve.penalty = penalty;
                    }
                    // Aggregates shift with the effective time.
                    self.dispatch(Job::FetchStats { event: self.event });
                }
                Err(msg) => self.message = Some(msg),
            },
            BackendEvent::Optimal(Ok(solution)) => self.optimal = Some(solution),
            BackendEvent::Optimal(Err(msg)) => self.message = Some(msg),
            BackendEvent::Stats(Ok(stats)) => self.stats = stats,
            BackendEvent::Stats(Err(msg)) => self.message = Some(msg),
        }
    }

    fn finish_save(
        &mut self,
        result: Result<
            (
                crate::api::SolveRecord,
                LiveStats,
                Option<crate::solve::SolveScore>,
            ),
            String,
        >,
    ) {
        self.machine.save_settled();
        let pending = self.pending_save.take();

        match result {
            Ok((record, stats, score)) => {
                self.stats = stats;

                let (pending, scramble) = match pending {
                    Some(p) => p,
                    None => return,
                };
                let solve = SessionSolve {
                    solve_id: record.id,
                    elapsed_ms: pending.elapsed_ms,
                    penalty: pending.penalty,
                    scramble,
                    score: match score {
                        Some(s) => ScoreState::Scored(s),
                        None => ScoreState::Unscored,
                    },
                    recorded_at: Local::now(),
                };

                if let Some(journal) = &self.journal {
                    if let Err(err) = journal.append(&solve) {
                        warn!("failed to append solve journal: {}", err);
                    }
                }
                self.history.push(solve);

                // Prepare the next attempt.
                self.request_scramble();
            }
            Err(msg) => {
                // The attempt stays on screen; the user re-triggers manually.
                self.message = Some(msg);
            }
        }
    }

    fn request_scramble(&mut self) {
        self.scramble_loading = true;
        self.dispatch(Job::FetchScramble { event: self.event });
    }

    fn request_optimal(&mut self) {
        let state = match &self.scramble {
            Some(s) => s.state.clone(),
            None => {
                self.message = Some("no scramble loaded".to_string());
                return;
            }
        };

        // Reject a malformed encoding before any request goes out.
        if let Err(err) = validate_state_encoding(&state, self.event) {
            self.message = Some(format!("{:#}", err));
            return;
        }

        self.dispatch(Job::FetchOptimal {
            state,
            event: self.event,
        });
    }

    fn request_rescore(&mut self) {
        match self.history.last() {
            Some(solve) => {
                let solve_id = solve.solve_id;
                self.dispatch(Job::RescoreSolve { solve_id });
            }
            None => self.message = Some("no solve to score yet".to_string()),
        }
    }

    fn amend_last_penalty(&mut self, penalty: Penalty) {
        match self.history.last() {
            Some(solve) => {
                let solve_id = solve.solve_id;
                self.dispatch(Job::AmendPenalty { solve_id, penalty });
            }
            None => self.message = Some("no solve to amend yet".to_string()),
        }
    }

    fn toggle_inspection(&mut self) {
        self.config.inspection_enabled = !self.config.inspection_enabled;
        self.machine
            .set_inspection_enabled(self.config.inspection_enabled);

        if let Err(err) = self.store.save(&self.config) {
            self.message = Some(format!("failed to save config: {}", err));
        } else {
            self.message = Some(format!(
                "inspection {}",
                if self.config.inspection_enabled {
                    "on"
                } else {
                    "off"
                }
            ));
        }
    }

    fn open_dashboard(&mut self) {
        if Browser::is_available() {
            let url = format!("{}/dashboard", self.config.server_url);
            if webbrowser::open(&url).is_err() {
                self.message = Some("failed to open browser".to_string());
            }
        }
    }

    fn dispatch(&mut self, job: Job) {
        if self.jobs.send(job).is_err() {
            self.message = Some("backend worker unavailable".to_string());
        }
    }

    fn quit(&mut self) {
        // Teardown cancels the clock loop and any pending arm wait.
        self.machine.reset();
        self.should_quit = true;
    }
}
