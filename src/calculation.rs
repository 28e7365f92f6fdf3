use std::fmt;

use tracing::{info, warn};

use crate::error::{AhpError, Warning};
use crate::models::{Criterion, RankedResult, ScoreRecord, Student};
use crate::ranking;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Ranking,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Validating => "validating inputs",
            Stage::Ranking => "ranking students",
            Stage::Done => "done",
        };
        f.write_str(label)
    }
}

/// Receives stage notifications while a calculation runs.
pub trait ProgressObserver {
    fn on_stage(&mut self, stage: Stage);
}

pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_stage(&mut self, _stage: Stage) {}
}

/// Emits each stage as a `tracing` event.
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_stage(&mut self, stage: Stage) {
        info!(event = "calculation_stage", stage = %stage);
    }
}

impl<F: FnMut(Stage)> ProgressObserver for F {
    fn on_stage(&mut self, stage: Stage) {
        self(stage)
    }
}

pub struct CalculationInputs<'a> {
    pub criteria: &'a [Criterion],
    pub students: &'a [Student],
    pub scores: &'a [ScoreRecord],
}

/// A ranking that has been computed but not yet stored.
#[derive(Debug, Clone)]
pub struct Calculation {
    pub results: Vec<RankedResult>,
    pub coverage: f64,
}

#[derive(Debug, Clone)]
pub struct CalculationOutcome {
    pub results: Vec<RankedResult>,
    pub coverage: f64,
    pub saved_rows: Option<u64>,
    pub warnings: Vec<Warning>,
}

pub fn calculate(
    inputs: &CalculationInputs<'_>,
    min_coverage: f64,
    observer: &mut dyn ProgressObserver,
) -> Result<Calculation, AhpError> {
    observer.on_stage(Stage::Validating);
    let coverage = ranking::ensure_coverage(
        inputs.criteria,
        inputs.students,
        inputs.scores,
        min_coverage,
    )?;

    observer.on_stage(Stage::Ranking);
    let results = ranking::rank(inputs.criteria, inputs.students, inputs.scores)?;

    observer.on_stage(Stage::Done);
    info!(
        event = "calculation_complete",
        students = results.len(),
        coverage,
    );
    Ok(Calculation { results, coverage })
}

impl Calculation {
    /// Folds the outcome of storing the results into the run. A storage
    /// failure keeps the computed results and adds a warning.
    pub fn finish<E: fmt::Display>(self, persisted: Result<u64, E>) -> CalculationOutcome {
        let (saved_rows, warnings) = match persisted {
            Ok(rows) => (Some(rows), Vec::new()),
            Err(err) => {
                warn!(event = "results_not_saved", error = %err);
                (None, vec![Warning::PersistenceFailure(err.to_string())])
            }
        };
        CalculationOutcome {
            results: self.results,
            coverage: self.coverage,
            saved_rows,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn fixture() -> (Vec<Criterion>, Vec<Student>, Vec<ScoreRecord>) {
        let criteria = vec![
            Criterion {
                id: "academic".to_string(),
                name: "Academic".to_string(),
                weight: Some(0.75),
            },
            Criterion {
                id: "attendance".to_string(),
                name: "Attendance".to_string(),
                weight: Some(0.25),
            },
        ];
        let students: Vec<Student> = ["Dewi Lestari", "Bima Saputra"]
            .iter()
            .enumerate()
            .map(|(i, name)| Student {
                id: Uuid::new_v4(),
                full_name: name.to_string(),
                class_name: "XI".to_string(),
                registration_id: format!("2024{i:03}"),
            })
            .collect();
        let scores = vec![
            ScoreRecord {
                student_id: students[0].id,
                criterion_id: "academic".to_string(),
                value: 88.0,
            },
            ScoreRecord {
                student_id: students[1].id,
                criterion_id: "academic".to_string(),
                value: 92.0,
            },
            ScoreRecord {
                student_id: students[1].id,
                criterion_id: "attendance".to_string(),
                value: 95.0,
            },
        ];
        (criteria, students, scores)
    }

    #[test]
    fn reports_stages_in_order() {
        let (criteria, students, scores) = fixture();
        let inputs = CalculationInputs {
            criteria: &criteria,
            students: &students,
            scores: &scores,
        };
        let mut stages = Vec::new();
        let mut observer = |stage: Stage| stages.push(stage);
        let calculation = calculate(&inputs, 0.5, &mut observer).unwrap();

        assert_eq!(
            stages,
            vec![Stage::Validating, Stage::Ranking, Stage::Done]
        );
        assert_eq!(calculation.results[0].student_id, students[1].id);
        assert!((calculation.coverage - 0.75).abs() < 1e-12);
    }

    #[test]
    fn refuses_below_coverage_threshold() {
        let (criteria, students, scores) = fixture();
        let inputs = CalculationInputs {
            criteria: &criteria,
            students: &students,
            scores: &scores[..1],
        };
        let err = calculate(&inputs, 0.5, &mut NoProgress).unwrap_err();
        assert!(matches!(err, AhpError::InsufficientData(_)));
    }

    #[test]
    fn persistence_failure_keeps_results() {
        let (criteria, students, scores) = fixture();
        let inputs = CalculationInputs {
            criteria: &criteria,
            students: &students,
            scores: &scores,
        };
        let calculation = calculate(&inputs, 0.5, &mut LogProgress).unwrap();
        let expected = calculation.results.clone();

        let outcome = calculation.finish(Err::<u64, _>("connection reset"));
        assert_eq!(outcome.results, expected);
        assert_eq!(outcome.saved_rows, None);
        assert_eq!(
            outcome.warnings,
            vec![Warning::PersistenceFailure("connection reset".to_string())]
        );
    }

    #[test]
    fn successful_save_has_no_warnings() {
        let (criteria, students, scores) = fixture();
        let inputs = CalculationInputs {
            criteria: &criteria,
            students: &students,
            scores: &scores,
        };
        let outcome = calculate(&inputs, 0.5, &mut NoProgress)
            .unwrap()
            .finish(Ok::<u64, String>(2));
        assert_eq!(outcome.saved_rows, Some(2));
        assert!(outcome.warnings.is_empty());
    }
}
