use std::fmt;

use thiserror::Error;

/// Failures reported by the weighting and ranking core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AhpError {
    #[error("invalid comparison matrix: {0}")]
    InvalidMatrix(String),

    #[error("insufficient data for ranking: {0}")]
    InsufficientData(String),

    #[error(
        "inconsistent judgments: consistency ratio {consistency_ratio:.4} exceeds {threshold:.2}; \
         revise the comparisons or force-apply the weights"
    )]
    InconsistentJudgment { consistency_ratio: f64, threshold: f64 },

    #[error("invalid score for student {student_id} on {criterion_id}: {value}")]
    InvalidScore {
        student_id: String,
        criterion_id: String,
        value: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidMatrix,
    InsufficientData,
    InconsistentJudgment,
    InvalidScore,
    PersistenceFailure,
}

impl AhpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AhpError::InvalidMatrix(_) => ErrorKind::InvalidMatrix,
            AhpError::InsufficientData(_) => ErrorKind::InsufficientData,
            AhpError::InconsistentJudgment { .. } => ErrorKind::InconsistentJudgment,
            AhpError::InvalidScore { .. } => ErrorKind::InvalidScore,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::InvalidMatrix => "invalid-matrix",
            ErrorKind::InsufficientData => "insufficient-data",
            ErrorKind::InconsistentJudgment => "inconsistent-judgment",
            ErrorKind::InvalidScore => "invalid-score",
            ErrorKind::PersistenceFailure => "persistence-failure",
        };
        f.write_str(label)
    }
}

/// Non-fatal conditions that travel alongside a usable result.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    InconsistentJudgment { consistency_ratio: f64 },
    PersistenceFailure(String),
}

impl Warning {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Warning::InconsistentJudgment { .. } => ErrorKind::InconsistentJudgment,
            Warning::PersistenceFailure(_) => ErrorKind::PersistenceFailure,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::InconsistentJudgment { consistency_ratio } => write!(
                f,
                "weights applied despite consistency ratio {consistency_ratio:.4}"
            ),
            Warning::PersistenceFailure(detail) => {
                write!(f, "results were calculated but not saved: {detail}")
            }
        }
    }
}
