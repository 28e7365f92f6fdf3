//! AHP weight derivation and weighted-sum ranking for the outstanding
//! student award, plus the Postgres store and report used by the CLI.

pub mod approval;
pub mod calculation;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pairwise;
pub mod ranking;
pub mod report;
pub mod telemetry;

pub use approval::{accept, force_apply, ApprovalMode, ApprovedWeights};
pub use calculation::{calculate, Calculation, CalculationInputs, CalculationOutcome};
pub use error::{AhpError, ErrorKind, Warning};
pub use pairwise::{compute_weights, ComparisonMatrix, WeightDerivation};
pub use ranking::{rank, score_coverage};
