use std::fmt::Write;

use crate::models::{Criterion, StoredResult, WeightDecision};
use crate::pairwise::{WeightDerivation, CONSISTENCY_THRESHOLD};

pub fn build_report(
    criteria: &[Criterion],
    derivation: &WeightDerivation,
    decision: Option<&WeightDecision>,
    results: &[StoredResult],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Outstanding Student Award Report");
    match results.first() {
        Some(first) => {
            let _ = writeln!(
                output,
                "Ranking calculated at {}",
                first.calculated_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
        None => {
            let _ = writeln!(output, "No ranking has been calculated yet.");
        }
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Criteria Weights");
    let _ = writeln!(output, "| Criterion | Applied | Derived |");
    let _ = writeln!(output, "|---|---|---|");

    for (criterion, derived) in criteria.iter().zip(derivation.weights.iter()) {
        let applied = criterion
            .weight
            .map(|w| format!("{w:.4}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            output,
            "| {} | {} | {:.4} |",
            criterion.name, applied, derived
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Consistency");
    let _ = writeln!(
        output,
        "- lambda max {:.4}, CI {:.4}, RI {:.2}",
        derivation.lambda_max, derivation.consistency_index, derivation.random_index
    );
    let verdict = if derivation.is_consistent {
        "consistent"
    } else {
        "inconsistent"
    };
    let _ = writeln!(
        output,
        "- CR {:.4} ({verdict}, threshold {:.2})",
        derivation.consistency_ratio, CONSISTENCY_THRESHOLD
    );

    match decision {
        Some(decision) => {
            let _ = writeln!(
                output,
                "- last decision: {} on {} at CR {:.4}{}",
                decision.mode,
                decision.decided_at.format("%Y-%m-%d"),
                decision.consistency_ratio,
                decision
                    .note
                    .as_deref()
                    .map(|note| format!(" ({note})"))
                    .unwrap_or_default()
            );
            if decision.mode == "forced" {
                let _ = writeln!(
                    output,
                    "- weights were force-applied despite inconsistent judgments"
                );
            }
        }
        None => {
            let _ = writeln!(output, "- weights have not been approved yet");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Ranking");

    if results.is_empty() {
        let _ = writeln!(output, "No students ranked.");
    } else {
        for result in results {
            let _ = writeln!(
                output,
                "{}. {} ({}, {}) score {:.4}",
                result.rank,
                result.full_name,
                result.class_name,
                result.registration_id,
                result.final_score
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairwise::ComparisonMatrix;
    use chrono::Utc;
    use uuid::Uuid;

    fn criteria() -> Vec<Criterion> {
        vec![
            Criterion {
                id: "academic".to_string(),
                name: "Academic".to_string(),
                weight: Some(0.75),
            },
            Criterion {
                id: "behavior".to_string(),
                name: "Behavior".to_string(),
                weight: None,
            },
        ]
    }

    #[test]
    fn report_lists_weights_and_ranking() {
        let mut matrix = ComparisonMatrix::identity(2).unwrap();
        matrix.set_comparison(0, 1, 3.0).unwrap();
        let derivation = matrix.derivation().clone();
        let decision = WeightDecision {
            id: Uuid::new_v4(),
            decided_at: Utc::now(),
            mode: "forced".to_string(),
            consistency_ratio: 0.0,
            note: Some("committee".to_string()),
        };
        let results = vec![StoredResult {
            rank: 1,
            student_id: Uuid::new_v4(),
            full_name: "Kiara Patel".to_string(),
            class_name: "XI IPA 3".to_string(),
            registration_id: "2025-0031".to_string(),
            final_score: 0.9312,
            calculated_at: Utc::now(),
        }];

        let report = build_report(&criteria(), &derivation, Some(&decision), &results);
        assert!(report.contains("| Academic | 0.7500 | 0.7500 |"));
        assert!(report.contains("| Behavior | - | 0.2500 |"));
        assert!(report.contains("(consistent, threshold 0.10)"));
        assert!(report.contains("force-applied"));
        assert!(report.contains("(committee)"));
        assert!(report.contains("1. Kiara Patel (XI IPA 3, 2025-0031) score 0.9312"));
    }

    #[test]
    fn report_handles_empty_state() {
        let mut matrix = ComparisonMatrix::identity(2).unwrap();
        let derivation = matrix.derivation().clone();
        let report = build_report(&criteria(), &derivation, None, &[]);
        assert!(report.contains("No ranking has been calculated yet."));
        assert!(report.contains("weights have not been approved yet"));
        assert!(report.contains("No students ranked."));
    }
}
