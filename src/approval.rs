use std::fmt;

use tracing::{info, warn};

use crate::error::{AhpError, Warning};
use crate::models::Criterion;
use crate::pairwise::{WeightDerivation, CONSISTENCY_THRESHOLD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalMode {
    /// Consistency ratio was within the threshold.
    Accepted,
    /// Applied despite an excessive consistency ratio.
    Forced,
}

impl ApprovalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalMode::Accepted => "accepted",
            ApprovalMode::Forced => "forced",
        }
    }
}

impl fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovedWeights {
    pub weights: Vec<f64>,
    pub consistency_ratio: f64,
    pub mode: ApprovalMode,
    pub note: Option<String>,
}

impl ApprovedWeights {
    /// A forced approval of an inconsistent matrix carries a warning.
    pub fn warning(&self) -> Option<Warning> {
        match self.mode {
            ApprovalMode::Forced if self.consistency_ratio > CONSISTENCY_THRESHOLD => {
                Some(Warning::InconsistentJudgment {
                    consistency_ratio: self.consistency_ratio,
                })
            }
            _ => None,
        }
    }

    /// Assigns the weights to `criteria` by position.
    pub fn apply_to(&self, criteria: &mut [Criterion]) -> Result<(), AhpError> {
        if criteria.len() != self.weights.len() {
            return Err(AhpError::InsufficientData(format!(
                "{} weights cannot be applied to {} criteria",
                self.weights.len(),
                criteria.len()
            )));
        }
        for (criterion, weight) in criteria.iter_mut().zip(self.weights.iter()) {
            criterion.weight = Some(*weight);
        }
        Ok(())
    }
}

/// Drops applied weights after a judgment change so ranking refuses to run
/// until a new decision is made. Returns whether any weight was cleared.
pub fn revoke(criteria: &mut [Criterion]) -> bool {
    let mut cleared = false;
    for criterion in criteria.iter_mut() {
        cleared |= criterion.weight.take().is_some();
    }
    if cleared {
        info!(event = "weights_revoked", criteria = criteria.len());
    }
    cleared
}

/// Normal approval path: only a consistent derivation is accepted.
pub fn accept(derivation: &WeightDerivation) -> Result<ApprovedWeights, AhpError> {
    if !derivation.is_consistent {
        return Err(AhpError::InconsistentJudgment {
            consistency_ratio: derivation.consistency_ratio,
            threshold: CONSISTENCY_THRESHOLD,
        });
    }

    info!(
        event = "weights_accepted",
        consistency_ratio = derivation.consistency_ratio,
    );
    Ok(ApprovedWeights {
        weights: derivation.weights.clone(),
        consistency_ratio: derivation.consistency_ratio,
        mode: ApprovalMode::Accepted,
        note: None,
    })
}

/// Override path: applies the weights whatever the consistency ratio and
/// marks the approval as forced.
pub fn force_apply(derivation: &WeightDerivation, note: Option<String>) -> ApprovedWeights {
    warn!(
        event = "weights_forced",
        consistency_ratio = derivation.consistency_ratio,
        is_consistent = derivation.is_consistent,
        note = note.as_deref().unwrap_or(""),
    );
    ApprovedWeights {
        weights: derivation.weights.clone(),
        consistency_ratio: derivation.consistency_ratio,
        mode: ApprovalMode::Forced,
        note,
    }
}
