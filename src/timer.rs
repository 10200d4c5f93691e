use std::time::Instant;

use crate::clock::{ClockLoop, ClockPhase, ClockReading};
use crate::solve::Penalty;

/// How long the trigger must be held before releasing it starts an attempt.
pub const ARM_HOLD_MS: u64 = 500;
/// Inspection budget before overrun penalties kick in.
pub const INSPECTION_BUDGET_MS: u64 = 15_000;

/// Phase of the timer interaction state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Idle,
    Arming,
    Ready,
    Inspection,
    Running,
}

/// A completed timing, handed to the save path exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSolve {
    pub elapsed_ms: u64,
    pub penalty: Penalty,
}

/// What the caller should do after feeding an input into the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEffect {
    None,
    /// A solve just stopped; dispatch the save without blocking input.
    SolveFinished(PendingSolve),
}

/// What the UI should show for the timer right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerReadout {
    Idle,
    Arming,
    Ready,
    Inspection { remaining_ms: u64, overrun_ms: u64 },
    Running { elapsed_ms: u64 },
}

/// The timer interaction state machine. Transitions happen only through
/// `on_press`, `on_release`, `on_tap` and `on_tick`; every event not in the
/// transition table is ignored, as is all input while a save from the
/// previous attempt is still in flight.
///
/// All entry points take the current instant explicitly; nothing in here
/// reads the wall clock, so tests can simulate arbitrary timelines.
#[derive(Debug)]
pub struct TimerMachine {
    phase: TimerPhase,
    clock: ClockLoop,
    inspection_enabled: bool,
    press_started: Option<Instant>,
    inspection_overrun_ms: u64,
    save_in_flight: bool,
}

impl TimerMachine {
    pub fn new(inspection_enabled: bool) -> Self {
        Self {
            phase: TimerPhase::Idle,
            clock: ClockLoop::new(),
            inspection_enabled,
            press_started: None,
            inspection_overrun_ms: 0,
            save_in_flight: false,
        }
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn inspection_enabled(&self) -> bool {
        self.inspection_enabled
    }

    /// Toggle the inspection preference. Takes effect the next time an
    /// attempt is armed; an inspection already underway is unaffected.
    pub fn set_inspection_enabled(&mut self, enabled: bool) {
        self.inspection_enabled = enabled;
    }

    pub fn save_in_flight(&self) -> bool {
        self.save_in_flight
    }

    /// Mark the previous attempt's save as dispatched; all transition input
    /// is ignored until `save_settled` is called.
    pub fn begin_save(&mut self) {
        self.save_in_flight = true;
    }

    pub fn save_settled(&mut self) {
        self.save_in_flight = false;
    }

    /// Trigger pressed down.
    pub fn on_press(&mut self, now: Instant) -> TimerEffect {
        if self.save_in_flight {
            return TimerEffect::None;
        }

        match self.phase {
            TimerPhase::Idle => {
                self.press_started = Some(now);
                self.phase = TimerPhase::Arming;
                TimerEffect::None
            }
            TimerPhase::Inspection => {
                self.start_solve_from_inspection(now);
                TimerEffect::None
            }
            TimerPhase::Running => self.stop_solve(now),
            // Still held; key repeat lands here.
            TimerPhase::Arming | TimerPhase::Ready => TimerEffect::None,
        }
    }

    /// Trigger released.
    pub fn on_release(&mut self, now: Instant) -> TimerEffect {
        if self.save_in_flight {
            return TimerEffect::None;
        }

        match self.phase {
            TimerPhase::Arming => {
                // The arm promotion is tick-driven; a release that arrives
                // after the threshold but before the next tick still counts
                // as a full hold.
                if self.held_ms(now) < ARM_HOLD_MS {
                    self.press_started = None;
                    self.phase = TimerPhase::Idle;
                    TimerEffect::None
                } else {
                    self.start_attempt(now)
                }
            }
            TimerPhase::Ready => self.start_attempt(now),
            _ => TimerEffect::None,
        }
    }

    /// Tap fallback for terminals that cannot report key releases: a single
    /// tap stands in for a full hold-and-release in `Idle`, and otherwise
    /// behaves like a press.
    pub fn on_tap(&mut self, now: Instant) -> TimerEffect {
        if self.save_in_flight {
            return TimerEffect::None;
        }

        match self.phase {
            TimerPhase::Idle => self.start_attempt(now),
            _ => self.on_press(now),
        }
    }

    /// Periodic tick; promotes `Arming` to `Ready` once the hold threshold
    /// has elapsed with the trigger still down.
    pub fn on_tick(&mut self, now: Instant) {
        if self.phase == TimerPhase::Arming && self.held_ms(now) >= ARM_HOLD_MS {
            self.phase = TimerPhase::Ready;
        }
    }

    /// Cancel everything and return to `Idle`; used on teardown. The
    /// save-in-flight flag survives so a late outcome is still matched up.
    pub fn reset(&mut self) {
        self.clock.stop();
        self.press_started = None;
        self.inspection_overrun_ms = 0;
        self.phase = TimerPhase::Idle;
    }

    /// Current display value for the UI frame being drawn.
    pub fn readout(&self, now: Instant) -> TimerReadout {
        match self.phase {
            TimerPhase::Idle => TimerReadout::Idle,
            TimerPhase::Arming => TimerReadout::Arming,
            TimerPhase::Ready => TimerReadout::Ready,
            TimerPhase::Inspection => match self.clock.sample(now) {
                Some(ClockReading::Inspection {
                    remaining_ms,
                    overrun_ms,
                }) => TimerReadout::Inspection {
                    remaining_ms,
                    overrun_ms,
                },
                _ => TimerReadout::Inspection {
                    remaining_ms: INSPECTION_BUDGET_MS,
                    overrun_ms: 0,
                },
            },
            TimerPhase::Running => match self.clock.sample(now) {
                Some(ClockReading::Solve { elapsed_ms }) => TimerReadout::Running { elapsed_ms },
                _ => TimerReadout::Running { elapsed_ms: 0 },
            },
        }
    }

    fn held_ms(&self, now: Instant) -> u64 {
        self.press_started
            .map(|p| now.saturating_duration_since(p).as_millis() as u64)
            .unwrap_or(0)
    }

    fn start_attempt(&mut self, now: Instant) -> TimerEffect {
        self.press_started = None;
        self.inspection_overrun_ms = 0;

        if self.inspection_enabled {
            self.clock.start(
                ClockPhase::Inspection {
                    budget_ms: INSPECTION_BUDGET_MS,
                },
                now,
            );
            self.phase = TimerPhase::Inspection;
        } else {
            self.clock.start(ClockPhase::Solve, now);
            self.phase = TimerPhase::Running;
        }
        TimerEffect::None
    }

    fn start_solve_from_inspection(&mut self, now: Instant) {
        // Capture the overrun at the moment timing starts; it decides the
        // auto-penalty when the solve stops.
        self.inspection_overrun_ms = match self.clock.sample(now) {
            Some(ClockReading::Inspection { overrun_ms, .. }) => overrun_ms,
            _ => 0,
        };
        self.clock.stop();
        self.clock.start(ClockPhase::Solve, now);
        self.phase = TimerPhase::Running;
    }

    fn stop_solve(&mut self, now: Instant) -> TimerEffect {
        // Cancel the loop before deriving the elapsed value so a stale tick
        // cannot observe a time later than the stop instant.
        let elapsed_ms = match self.clock.stop() {
            Some((_, started)) => now.saturating_duration_since(started).as_millis() as u64,
            None => 0,
        };

        // The overrun captured when timing started decides the penalty; it
        // is zero whenever the attempt skipped inspection.
        let penalty = Penalty::from_inspection_overrun(self.inspection_overrun_ms);

        self.press_started = None;
        self.phase = TimerPhase::Idle;

        TimerEffect::SolveFinished(PendingSolve {
            elapsed_ms,
            penalty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    fn finished(effect: TimerEffect) -> PendingSolve {
        match effect {
            TimerEffect::SolveFinished(p) => p,
            other => panic!("expected SolveFinished, got {:?}", other),
        }
    }

    #[test]
    fn test_short_hold_returns_to_idle() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(true);

        machine.on_press(t0);
        assert_eq!(machine.phase(), TimerPhase::Arming);

        // Ticks before the threshold never promote to Ready.
        for ms in [100, 250, 499] {
            machine.on_tick(at(t0, ms));
            assert_eq!(machine.phase(), TimerPhase::Arming);
        }

        machine.on_release(at(t0, 499));
        assert_eq!(machine.phase(), TimerPhase::Idle);
    }

    #[test]
    fn test_full_hold_reaches_ready_then_inspection() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(true);

        machine.on_press(t0);
        machine.on_tick(at(t0, 500));
        assert_eq!(machine.phase(), TimerPhase::Ready);

        machine.on_release(at(t0, 600));
        assert_eq!(machine.phase(), TimerPhase::Inspection);
        assert_eq!(
            machine.readout(at(t0, 600)),
            TimerReadout::Inspection {
                remaining_ms: 15_000,
                overrun_ms: 0
            }
        );
    }

    #[test]
    fn test_full_hold_with_inspection_disabled_runs_directly() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(false);

        machine.on_press(t0);
        machine.on_tick(at(t0, 600));
        assert_eq!(machine.phase(), TimerPhase::Ready);

        machine.on_release(at(t0, 600));
        assert_eq!(machine.phase(), TimerPhase::Running);
    }

    #[test]
    fn test_release_after_threshold_without_tick_still_starts() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(false);

        machine.on_press(t0);
        // No tick fired between the threshold and the release.
        machine.on_release(at(t0, 700));
        assert_eq!(machine.phase(), TimerPhase::Running);
    }

    #[test]
    fn test_repeat_press_while_armed_is_ignored() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(true);

        machine.on_press(t0);
        machine.on_press(at(t0, 100));
        assert_eq!(machine.phase(), TimerPhase::Arming);

        machine.on_tick(at(t0, 500));
        machine.on_press(at(t0, 550));
        assert_eq!(machine.phase(), TimerPhase::Ready);
    }

    #[test]
    fn test_running_display_counts_up_monotonically() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(false);

        machine.on_press(t0);
        machine.on_release(at(t0, 600));

        let mut last = 0;
        for ms in [600, 700, 1_000, 5_000, 12_944] {
            match machine.readout(at(t0, ms)) {
                TimerReadout::Running { elapsed_ms } => {
                    assert!(elapsed_ms >= last);
                    last = elapsed_ms;
                }
                other => panic!("expected Running readout, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_stop_floors_elapsed_at_stop_instant() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(false);

        machine.on_press(t0);
        machine.on_release(at(t0, 600));

        let pending = finished(machine.on_press(at(t0, 600 + 12_345)));
        assert_eq!(pending.elapsed_ms, 12_345);
        assert_eq!(pending.penalty, Penalty::Ok);
        assert_eq!(machine.phase(), TimerPhase::Idle);

        // The loop was cancelled at the stop; no later value can be read.
        assert_eq!(machine.readout(at(t0, 20_000)), TimerReadout::Idle);
    }

    #[test]
    fn test_inspection_overrun_plus_two_scenario() {
        // Hold 600ms, release, dally 16.2s in inspection (1.2s overrun),
        // solve for 8s: saved with +2.
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(true);

        machine.on_press(t0);
        machine.on_tick(at(t0, 600));
        machine.on_release(at(t0, 600));
        assert_eq!(machine.phase(), TimerPhase::Inspection);

        let solve_start = 600 + 16_200;
        assert_eq!(
            machine.readout(at(t0, solve_start)),
            TimerReadout::Inspection {
                remaining_ms: 0,
                overrun_ms: 1_200
            }
        );

        machine.on_press(at(t0, solve_start));
        assert_eq!(machine.phase(), TimerPhase::Running);

        let pending = finished(machine.on_press(at(t0, solve_start + 8_000)));
        assert_eq!(pending.elapsed_ms, 8_000);
        assert_eq!(pending.penalty, Penalty::PlusTwo);
    }

    #[test]
    fn test_inspection_clean_start_is_ok() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(true);

        machine.on_press(t0);
        machine.on_tick(at(t0, 600));
        machine.on_release(at(t0, 600));

        // Start solving with 3s of inspection used, no overrun.
        machine.on_press(at(t0, 3_600));
        let pending = finished(machine.on_press(at(t0, 3_600 + 9_500)));
        assert_eq!(pending.penalty, Penalty::Ok);
        assert_eq!(pending.elapsed_ms, 9_500);
    }

    #[test]
    fn test_inspection_extreme_overrun_is_dnf() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(true);

        machine.on_press(t0);
        machine.on_tick(at(t0, 600));
        machine.on_release(at(t0, 600));

        // 17.5s in inspection: 2.5s overrun, beyond the +2 window.
        machine.on_press(at(t0, 600 + 17_500));
        let pending = finished(machine.on_press(at(t0, 600 + 17_500 + 10_000)));
        assert_eq!(pending.penalty, Penalty::Dnf);
    }

    #[test]
    fn test_no_auto_transition_on_indefinite_overrun() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(true);

        machine.on_press(t0);
        machine.on_tick(at(t0, 600));
        machine.on_release(at(t0, 600));

        // Minutes of overrun: still in inspection, still counting up.
        machine.on_tick(at(t0, 600 + 180_000));
        assert_eq!(machine.phase(), TimerPhase::Inspection);
        assert_eq!(
            machine.readout(at(t0, 600 + 180_000)),
            TimerReadout::Inspection {
                remaining_ms: 0,
                overrun_ms: 165_000
            }
        );
    }

    #[test]
    fn test_inspection_disabled_never_penalizes() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(false);

        machine.on_press(t0);
        machine.on_release(at(t0, 600));

        // Even a very long solve stays OK without inspection.
        let pending = finished(machine.on_press(at(t0, 600 + 240_000)));
        assert_eq!(pending.penalty, Penalty::Ok);
    }

    #[test]
    fn test_input_ignored_while_save_in_flight() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(false);

        machine.on_press(t0);
        machine.on_release(at(t0, 600));
        finished(machine.on_press(at(t0, 5_600)));

        machine.begin_save();
        machine.on_press(at(t0, 6_000));
        assert_eq!(machine.phase(), TimerPhase::Idle);
        machine.on_release(at(t0, 6_100));
        assert_eq!(machine.phase(), TimerPhase::Idle);
        assert_eq!(machine.on_tap(at(t0, 6_200)), TimerEffect::None);
        assert_eq!(machine.phase(), TimerPhase::Idle);

        // Once the save settles, input works again.
        machine.save_settled();
        machine.on_press(at(t0, 7_000));
        assert_eq!(machine.phase(), TimerPhase::Arming);
    }

    #[test]
    fn test_tap_mode_starts_and_stops() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(true);

        machine.on_tap(t0);
        assert_eq!(machine.phase(), TimerPhase::Inspection);

        machine.on_tap(at(t0, 2_000));
        assert_eq!(machine.phase(), TimerPhase::Running);

        let pending = finished(machine.on_tap(at(t0, 2_000 + 7_250)));
        assert_eq!(pending.elapsed_ms, 7_250);
        assert_eq!(pending.penalty, Penalty::Ok);
    }

    #[test]
    fn test_toggle_applies_to_next_attempt_only() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(true);

        machine.on_press(t0);
        machine.on_tick(at(t0, 600));
        machine.on_release(at(t0, 600));
        assert_eq!(machine.phase(), TimerPhase::Inspection);

        // Next attempt skips inspection.
        machine.set_inspection_enabled(false);
        machine.on_press(at(t0, 2_000));
        finished(machine.on_press(at(t0, 10_000)));

        machine.on_press(at(t0, 11_000));
        machine.on_release(at(t0, 11_700));
        assert_eq!(machine.phase(), TimerPhase::Running);
    }

    #[test]
    fn test_reset_cancels_everything() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(true);

        machine.on_press(t0);
        machine.on_tick(at(t0, 600));
        machine.on_release(at(t0, 600));
        assert_eq!(machine.phase(), TimerPhase::Inspection);

        machine.reset();
        assert_eq!(machine.phase(), TimerPhase::Idle);
        assert_eq!(machine.readout(at(t0, 5_000)), TimerReadout::Idle);
    }

    #[test]
    fn test_release_in_idle_is_ignored() {
        let t0 = Instant::now();
        let mut machine = TimerMachine::new(true);

        machine.on_release(t0);
        assert_eq!(machine.phase(), TimerPhase::Idle);
    }
}
