use std::time::Instant;

/// Which phase the active loop is timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockPhase {
    /// Countdown from a fixed budget, then count the overrun back up.
    Inspection { budget_ms: u64 },
    /// Stopwatch counting up from zero.
    Solve,
}

/// A reading derived from the active loop at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockReading {
    Inspection { remaining_ms: u64, overrun_ms: u64 },
    Solve { elapsed_ms: u64 },
}

/// The single repeating clock driven by the UI tick. At most one loop is
/// active at a time: `start` always replaces (and thereby cancels) the
/// previous one, `stop` is an idempotent no-op when nothing runs. Each
/// `start` issues a new generation token so readings requested on behalf of
/// a cancelled loop come back empty instead of reflecting the new one.
#[derive(Debug, Default)]
pub struct ClockLoop {
    active: Option<(ClockPhase, Instant)>,
    generation: u64,
}

impl ClockLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin timing `phase` at `now`, cancelling any previous loop first.
    /// Returns the generation token identifying this loop.
    pub fn start(&mut self, phase: ClockPhase, now: Instant) -> u64 {
        self.generation += 1;
        self.active = Some((phase, now));
        self.generation
    }

    /// Cancel the active loop, returning its phase and start instant so the
    /// caller can derive a final elapsed value. No reading can be taken from
    /// the loop after this returns.
    pub fn stop(&mut self) -> Option<(ClockPhase, Instant)> {
        if self.active.is_some() {
            self.generation += 1;
        }
        self.active.take()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current reading of the active loop, if any.
    pub fn sample(&self, now: Instant) -> Option<ClockReading> {
        let (phase, started) = self.active?;
        let elapsed_ms = now.saturating_duration_since(started).as_millis() as u64;

        Some(match phase {
            ClockPhase::Inspection { budget_ms } => ClockReading::Inspection {
                remaining_ms: budget_ms.saturating_sub(elapsed_ms),
                overrun_ms: elapsed_ms.saturating_sub(budget_ms),
            },
            ClockPhase::Solve => ClockReading::Solve { elapsed_ms },
        })
    }

    /// Like `sample`, but only answers for the loop identified by `token`; a
    /// stale token (from a loop that has since been stopped or replaced)
    /// yields nothing.
    pub fn sample_for(&self, token: u64, now: Instant) -> Option<ClockReading> {
        if token != self.generation {
            return None;
        }
        self.sample(now)
    }
}
