//! NovaIR decision engine - the tick-driven loop that reads declared state,
//! evaluates constraints and objectives, and selects (and, unless running in
//! dry-run mode, executes) one action per tick.
//!
//! Architecture:
//! ```text
//! novair_dsl::System (parsed + validated AST)
//!     ↓
//! StateManager   - bounded history, jitter/trend, normalization
//!     ↓
//! scorer         - constraint evaluation, candidate enumeration,
//!                  effect prediction, scoring, selection
//!     ↓
//! Engine         - ties it together: readers -> tick -> handlers,
//!                  tick history, observers, run modes
//! ```

pub mod engine;
pub mod scorer;
pub mod state;

pub use engine::{explain, ActionHandler, Engine, StateReader, TickObserver, TickResult};
pub use scorer::{
    enumerate_candidates, evaluate_constraints, predict_effect, score_candidate,
    select_best_action, Candidate, ConstraintStatus, ScoreBreakdown, ScoredCandidate,
    SelectionResult,
};
pub use state::{StateManager, StateMetadata, StateSnapshot};
