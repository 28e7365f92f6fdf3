//! Weighted-sum ranking over per-run normalized scores.
//!
//! Each criterion's raw scores are divided by the highest raw score recorded
//! for that criterion in the current run, so normalization depends on the
//! population being ranked: a raw 100 may normalize to 1.0 in one run and
//! to less in another. A criterion with no recorded scores uses 100 as its
//! maximum, and every maximum is floored at 1. Missing scores count as 0.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use crate::error::AhpError;
use crate::models::{Criterion, RankedResult, ScoreRecord, Student};

/// Maximum assumed for a criterion that has no recorded scores.
pub const DEFAULT_MAX_SCORE: f64 = 100.0;

/// Lowest divisor used when normalizing a criterion.
pub const MIN_MAX_SCORE: f64 = 1.0;

/// Default share of student x criterion cells that must hold a score.
pub const DEFAULT_MIN_COVERAGE: f64 = 0.5;

pub fn rank(
    criteria: &[Criterion],
    students: &[Student],
    scores: &[ScoreRecord],
) -> Result<Vec<RankedResult>, AhpError> {
    let weights = resolved_weights(criteria)?;
    if students.is_empty() {
        return Err(AhpError::InsufficientData(
            "no students to rank".to_string(),
        ));
    }

    let table = score_table(criteria, students, scores)?;
    let max_scores = max_scores(criteria, &table);

    let mut results: Vec<RankedResult> = students
        .iter()
        .map(|student| {
            let final_score = criteria
                .iter()
                .zip(weights.iter())
                .zip(max_scores.iter())
                .map(|((criterion, weight), max)| {
                    let raw = table
                        .get(&(student.id, criterion.id.as_str()))
                        .copied()
                        .unwrap_or(0.0);
                    raw / max * weight
                })
                .sum();
            RankedResult {
                student_id: student.id,
                final_score,
                rank: 0,
            }
        })
        .collect();

    // `sort_by` is stable, so equal scores keep their input order. Scores are
    // validated finite, and `partial_cmp` keeps -0.0 and 0.0 equal.
    results.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(Ordering::Equal)
    });
    for (position, result) in results.iter_mut().enumerate() {
        result.rank = position + 1;
    }

    debug!(
        event = "ranking_computed",
        students = results.len(),
        criteria = criteria.len(),
    );
    Ok(results)
}

/// Per-criterion normalization divisors, in `criteria` order.
pub fn max_scores(
    criteria: &[Criterion],
    table: &HashMap<(Uuid, &str), f64>,
) -> Vec<f64> {
    criteria
        .iter()
        .map(|criterion| {
            let recorded = table
                .iter()
                .filter(|((_, criterion_id), _)| *criterion_id == criterion.id.as_str())
                .map(|(_, value)| *value)
                .fold(None, |max: Option<f64>, value| {
                    Some(max.map_or(value, |m| m.max(value)))
                });
            recorded.unwrap_or(DEFAULT_MAX_SCORE).max(MIN_MAX_SCORE)
        })
        .collect()
}

/// Share of the student x criterion cells that hold a score.
pub fn score_coverage(
    criteria: &[Criterion],
    students: &[Student],
    scores: &[ScoreRecord],
) -> f64 {
    let possible = criteria.len() * students.len();
    if possible == 0 {
        return 0.0;
    }
    let criterion_ids: HashSet<&str> = criteria.iter().map(|c| c.id.as_str()).collect();
    let student_ids: HashSet<Uuid> = students.iter().map(|s| s.id).collect();
    let populated: HashSet<(Uuid, &str)> = scores
        .iter()
        .filter(|s| student_ids.contains(&s.student_id))
        .filter(|s| criterion_ids.contains(s.criterion_id.as_str()))
        .map(|s| (s.student_id, s.criterion_id.as_str()))
        .collect();
    populated.len() as f64 / possible as f64
}

pub fn ensure_coverage(
    criteria: &[Criterion],
    students: &[Student],
    scores: &[ScoreRecord],
    min_coverage: f64,
) -> Result<f64, AhpError> {
    if students.is_empty() {
        return Err(AhpError::InsufficientData(
            "no students to rank".to_string(),
        ));
    }
    let coverage = score_coverage(criteria, students, scores);
    if coverage < min_coverage {
        return Err(AhpError::InsufficientData(format!(
            "only {:.0}% of student scores are recorded, at least {:.0}% are required",
            coverage * 100.0,
            min_coverage * 100.0
        )));
    }
    Ok(coverage)
}

fn resolved_weights(criteria: &[Criterion]) -> Result<Vec<f64>, AhpError> {
    if criteria.is_empty() {
        return Err(AhpError::InsufficientData(
            "no criteria defined".to_string(),
        ));
    }

    let mut weights = Vec::with_capacity(criteria.len());
    for criterion in criteria {
        match criterion.weight {
            None => {
                return Err(AhpError::InsufficientData(format!(
                    "criterion {} has no weight; derive and approve weights first",
                    criterion.id
                )))
            }
            Some(weight) if !weight.is_finite() || weight < 0.0 => {
                return Err(AhpError::InsufficientData(format!(
                    "criterion {} has an unusable weight {weight}",
                    criterion.id
                )))
            }
            Some(weight) => weights.push(weight),
        }
    }

    if weights.iter().all(|w| *w == 0.0) {
        return Err(AhpError::InsufficientData(
            "every criterion weight is zero".to_string(),
        ));
    }
    Ok(weights)
}

fn score_table<'a>(
    criteria: &[Criterion],
    students: &[Student],
    scores: &'a [ScoreRecord],
) -> Result<HashMap<(Uuid, &'a str), f64>, AhpError> {
    let criterion_ids: HashSet<&str> = criteria.iter().map(|c| c.id.as_str()).collect();
    let student_ids: HashSet<Uuid> = students.iter().map(|s| s.id).collect();

    let mut table = HashMap::new();
    for score in scores {
        if !student_ids.contains(&score.student_id)
            || !criterion_ids.contains(score.criterion_id.as_str())
        {
            continue;
        }
        if !score.value.is_finite() || score.value < 0.0 {
            return Err(AhpError::InvalidScore {
                student_id: score.student_id.to_string(),
                criterion_id: score.criterion_id.clone(),
                value: score.value,
            });
        }
        // Adding 0.0 folds -0.0 into 0.0.
        table.insert(
            (score.student_id, score.criterion_id.as_str()),
            score.value + 0.0,
        );
    }
    Ok(table)
}
