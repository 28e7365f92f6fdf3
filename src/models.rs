use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub id: String,
    pub name: String,
    /// `None` until a weight decision has been applied.
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
    pub class_name: String,
    pub registration_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub student_id: Uuid,
    pub criterion_id: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub student_id: Uuid,
    pub final_score: f64,
    pub rank: usize,
}

/// A stored ranking row joined with the student it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct StoredResult {
    pub rank: i32,
    pub student_id: Uuid,
    pub full_name: String,
    pub class_name: String,
    pub registration_id: String,
    pub final_score: f64,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WeightDecision {
    pub id: Uuid,
    pub decided_at: DateTime<Utc>,
    pub mode: String,
    pub consistency_ratio: f64,
    pub note: Option<String>,
}
