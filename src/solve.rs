use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Overruns up to this long past the inspection budget cost +2 seconds;
/// anything longer voids the attempt.
pub const PLUS_TWO_WINDOW_MS: u64 = 2_000;

/// Outcome modifier attached to a timed attempt. Wire names match the
///// backend (`penalty` column): `OK`, `+2`, `DNF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Penalty {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "+2")]
    PlusTwo,
    #[serde(rename = "DNF")]
    Dnf,
}

impl Penalty {
    /// Auto-penalty law: no overrun is clean, up to two seconds of overrun
    /// costs +2, anything beyond that is a DNF.
    pub fn from_inspection_overrun(overrun_ms: u64) -> Self {
        if overrun_ms == 0 {
            Penalty::Ok
        } else if overrun_ms <= PLUS_TWO_WINDOW_MS {
            Penalty::PlusTwo
        } else {
            Penalty::Dnf
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Penalty::Ok => "OK",
            Penalty::PlusTwo => "+2",
            Penalty::Dnf => "DNF",
        }
    }
}

impl std::fmt::Display for Penalty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective time used for stats and display: DNF attempts carry no time,
/// +2 adds two seconds, clean attempts count as-is.
pub fn effective_time_ms(time_ms: u64, penalty: Penalty) -> Option<u64> {
    match penalty {
        Penalty::Dnf => None,
        Penalty::PlusTwo => Some(time_ms + 2_000),
        Penalty::Ok => Some(time_ms),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display, Serialize, Deserialize)]
pub enum PuzzleKind {
    #[value(name = "3x3")]
    #[strum(serialize = "3x3")]
    #[serde(rename = "3x3")]
    ThreeByThree,
    #[value(name = "2x2")]
    #[strum(serialize = "2x2")]
    #[serde(rename = "2x2")]
    TwoByTwo,
}

impl PuzzleKind {
    /// Length of a well-formed facelet state encoding for this puzzle
    /// (6 faces of n*n stickers).
    pub fn state_encoding_len(&self) -> usize {
        match self {
            PuzzleKind::ThreeByThree => 54,
            PuzzleKind::TwoByTwo => 24,
        }
    }
}

impl Default for PuzzleKind {
    fn default() -> Self {
        PuzzleKind::ThreeByThree
    }
}

/// Score payload returned by the backend's scoring model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveScore {
    pub score: f64,
    pub score_version: String,
    pub expected_time_ms: Option<u64>,
    pub dnf_risk: f64,
    pub plus2_risk: f64,
}

/// Scoring is an asynchronous, best-effort step that runs after the save;
/// a solve is either unscored or carries the full score payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreState {
    Unscored,
    Scored(SolveScore),
}

impl ScoreState {
    pub fn score(&self) -> Option<f64> {
        match self {
            ScoreState::Unscored => None,
            ScoreState::Scored(s) => Some(s.score),
        }
    }
}
