//! Controller states and the transition function.
//!
//! ```text
//! ExpandQuery → RetrieveContext → CraftResponse → ScoreGroundedness
//!                                      ▲                │
//!                                      │     ┌──────────┼─────────────┐
//!                               RefineResponse  CheckPrecision  MaxIterationsReached
//!                                                 │
//!                                  ┌──────────────┼─────────────┐
//!                                Pass        RefineQuery   MaxIterationsReached
//!                                                 │
//!                                                 └──► ExpandQuery
//! ```

use serde::Serialize;

use crate::state::RequestState;

pub const DEFAULT_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

// ─────────────────────────────────────────────────────────────────────────────
// Steps
// ─────────────────────────────────────────────────────────────────────────────

/// One state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    ExpandQuery,
    RetrieveContext,
    CraftResponse,
    ScoreGroundedness,
    CheckPrecision,
    RefineResponse,
    RefineQuery,
    MaxIterationsReached,
    Pass,
}

impl Step {
    /// The state every run starts in.
    pub const INITIAL: Step = Step::ExpandQuery;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExpandQuery => "expand_query",
            Self::RetrieveContext => "retrieve_context",
            Self::CraftResponse => "craft_response",
            Self::ScoreGroundedness => "score_groundedness",
            Self::CheckPrecision => "check_precision",
            Self::RefineResponse => "refine_response",
            Self::RefineQuery => "refine_query",
            Self::MaxIterationsReached => "max_iterations_reached",
            Self::Pass => "pass",
        }
    }

    /// How the run ends if this step is terminal.
    pub fn terminal(&self) -> Option<Terminal> {
        match self {
            Self::Pass => Some(Terminal::Pass),
            Self::MaxIterationsReached => Some(Terminal::MaxIterationsReached),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal().is_some()
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    /// Both quality gates passed.
    Pass,
    /// A gate ran out of iterations; the answer is the fallback message.
    MaxIterationsReached,
}

impl Terminal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::MaxIterationsReached => "max_iterations_reached",
        }
    }
}

impl std::fmt::Display for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Routing
// ─────────────────────────────────────────────────────────────────────────────

/// Thresholds and iteration cap for the two quality gates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingPolicy {
    pub groundedness_threshold: f64,
    pub precision_threshold: f64,
    pub max_iterations: u32,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            groundedness_threshold: DEFAULT_THRESHOLD,
            precision_threshold: DEFAULT_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl RoutingPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_groundedness_threshold(mut self, threshold: f64) -> Self {
        self.groundedness_threshold = threshold;
        self
    }

    pub fn with_precision_threshold(mut self, threshold: f64) -> Self {
        self.precision_threshold = threshold;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Gate after groundedness scoring.
pub fn route_groundedness(score: f64, loop_count: u32, threshold: f64, max_iterations: u32) -> Step {
    if score >= threshold {
        Step::CheckPrecision
    } else if loop_count >= max_iterations {
        Step::MaxIterationsReached
    } else {
        Step::RefineResponse
    }
}

/// Gate after precision scoring. Uses the same `>=` cap as groundedness.
pub fn route_precision(score: f64, loop_count: u32, threshold: f64, max_iterations: u32) -> Step {
    if score >= threshold {
        Step::Pass
    } else if loop_count >= max_iterations {
        Step::MaxIterationsReached
    } else {
        Step::RefineQuery
    }
}

/// The step after `step`, or `None` once a terminal step has run.
///
/// The iteration cap comes from the state so that a run keeps the limit it
/// started with.
pub fn next_step(step: Step, state: &RequestState, policy: &RoutingPolicy) -> Option<Step> {
    let next = match step {
        Step::ExpandQuery => Step::RetrieveContext,
        Step::RetrieveContext => Step::CraftResponse,
        Step::CraftResponse => Step::ScoreGroundedness,
        Step::ScoreGroundedness => route_groundedness(
            state.groundedness_score,
            state.groundedness_loop_count,
            policy.groundedness_threshold,
            state.max_iterations,
        ),
        Step::CheckPrecision => route_precision(
            state.precision_score,
            state.precision_loop_count,
            policy.precision_threshold,
            state.max_iterations,
        ),
        Step::RefineResponse => Step::CraftResponse,
        Step::RefineQuery => Step::ExpandQuery,
        Step::MaxIterationsReached | Step::Pass => return None,
    };
    Some(next)
}
