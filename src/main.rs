use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

use award_ranking::approval::{self, ApprovalMode};
use award_ranking::calculation::{self, CalculationInputs, LogProgress};
use award_ranking::config::{self, Settings};
use award_ranking::models::Student;
use award_ranking::{db, report, telemetry};

#[derive(Parser)]
#[command(name = "award-ranking")]
#[command(about = "AHP ranking for the outstanding student award", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the five award criteria and sample students
    Seed,
    /// Record how much more important one criterion is than another
    Compare {
        #[arg(long)]
        row: String,
        #[arg(long)]
        col: String,
        #[arg(long)]
        value: f64,
    },
    /// Derive weights from the comparisons and optionally apply them
    #[command(group(
        ArgGroup::new("decision")
            .args(["accept", "force"])
            .multiple(false)
    ))]
    Weights {
        /// Apply the weights if the judgments are consistent
        #[arg(long)]
        accept: bool,
        /// Apply the weights even if the judgments are inconsistent
        #[arg(long)]
        force: bool,
        #[arg(long, requires = "force")]
        note: Option<String>,
    },
    /// Import students and scores from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Rank all students and replace the stored results
    Calculate {
        #[arg(long, value_parser = config::parse_coverage)]
        min_coverage: Option<f64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the stored ranking
    Results {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "award-report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();
    let cli = Cli::parse();
    let settings = Settings::load().context("failed to load settings")?;
    let database_url = settings
        .database_url
        .clone()
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Compare { row, col, value } => {
            let mut criteria = db::fetch_criteria(&pool).await?;
            let matrix = db::set_comparison(&pool, &mut criteria, &row, &col, value).await?;
            println!("Recorded {row} vs {col} = {value} (mirror {:.4}).", 1.0 / value);
            println!(
                "Applied weights cleared for {} criteria; run `weights --accept` or `weights --force` before calculating.",
                matrix.size()
            );
        }
        Commands::Weights {
            accept,
            force,
            note,
        } => {
            let criteria = db::fetch_criteria(&pool).await?;
            let mut matrix = db::fetch_matrix(&pool, &criteria).await?;
            let derivation = matrix.derivation().clone();

            println!("Derived weights:");
            for (criterion, weight) in criteria.iter().zip(derivation.weights.iter()) {
                println!("- {} ({}) {:.4}", criterion.name, criterion.id, weight);
            }
            println!(
                "Consistency ratio {:.4}: {}",
                derivation.consistency_ratio,
                if derivation.is_consistent {
                    "consistent"
                } else {
                    "inconsistent"
                }
            );

            let approved = if force {
                Some(approval::force_apply(&derivation, note))
            } else if accept {
                Some(approval::accept(&derivation)?)
            } else {
                None
            };

            if let Some(approved) = approved {
                let decision = db::save_weights(&pool, &criteria, &approved).await?;
                if let Some(warning) = approved.warning() {
                    println!("Warning ({}): {warning}.", warning.kind());
                }
                match approved.mode {
                    ApprovalMode::Accepted => println!("Weights applied (decision {decision})."),
                    ApprovalMode::Forced => {
                        println!("Weights force-applied (decision {decision}).")
                    }
                }
            }
        }
        Commands::Import { csv } => {
            let imported = db::import_csv(&pool, &csv).await?;
            println!("Imported {imported} scores from {}.", csv.display());
        }
        Commands::Calculate {
            min_coverage,
            limit,
        } => {
            let criteria = db::fetch_criteria(&pool).await?;
            let students = db::fetch_students(&pool).await?;
            let scores = db::fetch_scores(&pool).await?;
            let inputs = CalculationInputs {
                criteria: &criteria,
                students: &students,
                scores: &scores,
            };
            let min_coverage = min_coverage.unwrap_or(settings.min_score_coverage);

            let calculation = calculation::calculate(&inputs, min_coverage, &mut LogProgress)?;
            let persisted = db::replace_results(&pool, &calculation.results).await;
            let outcome = calculation.finish(persisted);

            for warning in &outcome.warnings {
                println!("Warning ({}): {warning}.", warning.kind());
            }
            if let Some(rows) = outcome.saved_rows {
                println!(
                    "Ranked {} students ({:.0}% score coverage), saved {rows} results.",
                    outcome.results.len(),
                    outcome.coverage * 100.0
                );
            }

            let limit = limit.unwrap_or(settings.result_limit);
            for result in outcome.results.iter().take(limit) {
                let student = students.iter().find(|s| s.id == result.student_id);
                println!(
                    "{}. {} score {:.4}",
                    result.rank,
                    student.map(describe).unwrap_or_else(|| result.student_id.to_string()),
                    result.final_score
                );
            }
        }
        Commands::Results { limit, json } => {
            let limit = limit.unwrap_or(settings.result_limit);
            let results = db::fetch_results(&pool, limit).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
                return Ok(());
            }
            if results.is_empty() {
                println!("No ranking has been calculated yet.");
                return Ok(());
            }
            for result in results {
                println!(
                    "{}. {} ({}, {}) score {:.4}",
                    result.rank,
                    result.full_name,
                    result.class_name,
                    result.registration_id,
                    result.final_score
                );
            }
        }
        Commands::Report { out } => {
            let criteria = db::fetch_criteria(&pool).await?;
            let mut matrix = db::fetch_matrix(&pool, &criteria).await?;
            let decision = db::latest_decision(&pool).await?;
            let results = db::fetch_results(&pool, usize::MAX).await?;
            let report = report::build_report(
                &criteria,
                matrix.derivation(),
                decision.as_ref(),
                &results,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn describe(student: &Student) -> String {
    format!(
        "{} ({}, {})",
        student.full_name, student.class_name, student.registration_id
    )
}
