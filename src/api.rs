use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use crate::solve::{Penalty, PuzzleKind, SolveScore};
use crate::stats::LiveStats;

const USER_AGENT: &str = concat!("cubik/", env!("CARGO_PKG_VERSION"));

/// A fresh scramble plus the facelet encoding of the scrambled state.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scramble {
    pub scramble: String,
    pub state: String,
}

/// Body for recording a completed solve. Field names follow the backend's
/// solve model; `source` marks solves recorded by this timer.
#[derive(Debug, Clone, Serialize)]
pub struct NewSolve {
    pub scramble: String,
    pub time_ms: u64,
    pub penalty: Penalty,
    pub source: String,
    pub event: PuzzleKind,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SolveRecord {
    pub id: i64,
    pub time_ms: Option<u64>,
    pub penalty: Penalty,
}

/// Create responses carry the persisted solve and refreshed aggregates in
/// one round trip.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SolveCreated {
    pub solve: SolveRecord,
    pub stats: LiveStats,
}

#[derive(Debug, Clone, Serialize)]
struct PenaltyPatch {
    penalty: Penalty,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OptimalSolution {
    pub solution: String,
    pub num_moves: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthToken {
    pub token: String,
}

/// Reject a malformed state encoding before any request goes out.
pub fn validate_state_encoding(state: &str, event: PuzzleKind) -> Result<()> {
    let expected = event.state_encoding_len();
    let actual = state.chars().count();
    if actual != expected {
        bail!(
            "malformed {} state encoding: expected {} characters, got {}",
            event,
            expected,
            actual
        );
    }
    Ok(())
}

/// The backend operations the timer consumes. Implemented over HTTP by
/// `ApiClient`; tests substitute a fake.
pub trait Backend: Send {
    fn get_scramble(&self, event: PuzzleKind) -> Result<Scramble>;
    fn create_solve(&self, solve: &NewSolve) -> Result<SolveCreated>;
    fn update_solve(&self, solve_id: i64, penalty: Penalty) -> Result<()>;
    fn score_solve(&self, solve_id: i64) -> Result<SolveScore>;
    fn get_optimal_solution(&self, state: &str, event: PuzzleKind) -> Result<OptimalSolution>;
    fn get_live_stats(&self, event: PuzzleKind) -> Result<LiveStats>;
}

/// JSON-over-HTTP client for the cubing backend.
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to create HTTP client")?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::blocking::Response,
        what: &str,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            bail!("{} failed: HTTP {}", what, status);
        }
        response
            .json::<T>()
            .with_context(|| format!("failed to parse {} response", what))
    }

    /// Exchange credentials for a bearer token.
    pub fn login(&self, email: &str, password: &str) -> Result<AuthToken> {
        let url = format!("{}/api/auth/login", self.base_url);
        let body = serde_json::json!({ "email": email, "password": password });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .context("failed to reach login endpoint")?;
        Self::parse(response, "login")
    }

    /// Create an account; the backend logs the new user straight in.
    pub fn signup(&self, email: &str, name: &str, password: &str) -> Result<AuthToken> {
        let url = format!("{}/api/auth/signup", self.base_url);
        let body = serde_json::json!({ "email": email, "name": name, "password": password });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .context("failed to reach signup endpoint")?;
        Self::parse(response, "signup")
    }
}

impl Backend for ApiClient {
    fn get_scramble(&self, event: PuzzleKind) -> Result<Scramble> {
        let url = format!("{}/api/scramble?event={}", self.base_url, event);

        let response = self
            .authed(self.client.get(&url))
            .send()
            .context("failed to fetch scramble")?;
        Self::parse(response, "scramble")
    }

    fn create_solve(&self, solve: &NewSolve) -> Result<SolveCreated> {
        let url = format!("{}/api/solves", self.base_url);

        let response = self
            .authed(self.client.post(&url))
            .json(solve)
            .send()
            .context("failed to save solve")?;
        Self::parse(response, "solve save")
    }

    fn update_solve(&self, solve_id: i64, penalty: Penalty) -> Result<()> {
        let url = format!("{}/api/solves/{}", self.base_url, solve_id);

        let response = self
            .authed(self.client.patch(&url))
            .json(&PenaltyPatch { penalty })
            .send()
            .context("failed to update solve")?;

        let status = response.status();
        if !status.is_success() {
            bail!("solve update failed: HTTP {}", status);
        }
        Ok(())
    }

    fn score_solve(&self, solve_id: i64) -> Result<SolveScore> {
        let url = format!("{}/api/solves/{}/score", self.base_url, solve_id);

        let response = self
            .authed(self.client.post(&url))
            .send()
            .context("failed to score solve")?;
        Self::parse(response, "score")
    }

    fn get_optimal_solution(&self, state: &str, event: PuzzleKind) -> Result<OptimalSolution> {
        validate_state_encoding(state, event)?;

        let url = format!("{}/api/solves/optimal", self.base_url);
        let body = serde_json::json!({ "state": state, "event": event });

        let response = self
            .authed(self.client.post(&url))
            .json(&body)
            .send()
            .context("failed to fetch optimal solution")?;
        Self::parse(response, "optimal solution")
    }

    fn get_live_stats(&self, event: PuzzleKind) -> Result<LiveStats> {
        let url = format!("{}/api/dashboard/live?event={}", self.base_url, event);

        let response = self
            .authed(self.client.get(&url))
            .send()
            .context("failed to fetch stats")?;
        Self::parse(response, "stats")
    }
}
