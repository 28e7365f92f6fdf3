use std::collections::HashMap;

use anyhow::Context;
use chrono::Utc;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::approval::{self, ApprovedWeights};
use crate::models::{Criterion, RankedResult, ScoreRecord, StoredResult, Student, WeightDecision};
use crate::pairwise::ComparisonMatrix;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let criteria = vec![
        ("academic", "Academic"),
        ("behavior", "Behavior"),
        ("achievement", "Achievement"),
        ("leadership", "Leadership"),
        ("attendance", "Attendance"),
    ];

    let mut tx = pool.begin().await?;

    for (position, (id, name)) in criteria.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO award_ranking.criteria (id, name, position)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(*id)
        .bind(*name)
        .bind(position as i32)
        .execute(&mut *tx)
        .await?;
    }

    for (row, _) in criteria.iter() {
        for (col, _) in criteria.iter() {
            if row == col {
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO award_ranking.pairwise_comparisons (row_criterion, col_criterion, value)
                VALUES ($1, $2, 1.0)
                ON CONFLICT (row_criterion, col_criterion) DO NOTHING
                "#,
            )
            .bind(*row)
            .bind(*col)
            .execute(&mut *tx)
            .await?;
        }
    }

    let students = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Avery Lee",
            "XII IPA 1",
            "2024-0117",
            [91.0, 88.0, 75.0, 82.0, 97.0],
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Jules Moreno",
            "XII IPS 2",
            "2024-0142",
            [84.0, 95.0, 90.0, 93.0, 92.0],
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Kiara Patel",
            "XI IPA 3",
            "2025-0031",
            [96.0, 85.0, 88.0, 70.0, 99.0],
        ),
    ];

    for (id, name, class_name, registration_id, values) in students {
        let student_id: Uuid = sqlx::query(
            r#"
            INSERT INTO award_ranking.students (id, full_name, class_name, registration_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (registration_id) DO UPDATE
            SET full_name = EXCLUDED.full_name, class_name = EXCLUDED.class_name
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(class_name)
        .bind(registration_id)
        .fetch_one(&mut *tx)
        .await?
        .get("id");

        for ((criterion_id, _), value) in criteria.iter().zip(values) {
            upsert_score(&mut tx, student_id, criterion_id, value).await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

pub async fn fetch_criteria(pool: &PgPool) -> anyhow::Result<Vec<Criterion>> {
    let rows = sqlx::query(
        "SELECT id, name, weight FROM award_ranking.criteria ORDER BY position",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Criterion {
            id: row.get("id"),
            name: row.get("name"),
            weight: row.get("weight"),
        })
        .collect())
}

pub async fn fetch_students(pool: &PgPool) -> anyhow::Result<Vec<Student>> {
    let rows = sqlx::query(
        "SELECT id, full_name, class_name, registration_id \
         FROM award_ranking.students \
         ORDER BY created_at, registration_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Student {
            id: row.get("id"),
            full_name: row.get("full_name"),
            class_name: row.get("class_name"),
            registration_id: row.get("registration_id"),
        })
        .collect())
}

pub async fn fetch_scores(pool: &PgPool) -> anyhow::Result<Vec<ScoreRecord>> {
    let rows = sqlx::query("SELECT student_id, criterion_id, value FROM award_ranking.scores")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| ScoreRecord {
            student_id: row.get("student_id"),
            criterion_id: row.get("criterion_id"),
            value: row.get("value"),
        })
        .collect())
}

/// Loads the stored judgments into a matrix ordered like `criteria`.
/// Pairs without a stored judgment count as equally important.
pub async fn fetch_matrix(
    pool: &PgPool,
    criteria: &[Criterion],
) -> anyhow::Result<ComparisonMatrix> {
    let mut conn = pool.acquire().await?;
    load_matrix(&mut *conn, criteria, false).await
}

async fn load_matrix(
    conn: &mut PgConnection,
    criteria: &[Criterion],
    lock: bool,
) -> anyhow::Result<ComparisonMatrix> {
    let index: HashMap<&str, usize> = criteria
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), i))
        .collect();

    let query = matrix_query(lock);
    let records = sqlx::query(&query).fetch_all(&mut *conn).await?;

    let n = criteria.len();
    let mut cells = vec![vec![1.0; n]; n];
    for row in records {
        let row_id: String = row.get("row_criterion");
        let col_id: String = row.get("col_criterion");
        let value: f64 = row.get("value");
        if let (Some(&i), Some(&j)) = (index.get(row_id.as_str()), index.get(col_id.as_str())) {
            cells[i][j] = value;
        }
    }

    ComparisonMatrix::from_rows(cells).context("stored pairwise comparisons are invalid")
}

/// Row locks keep a concurrent `compare` from editing the matrix between the
/// read and the mirrored write.
fn matrix_query(lock: bool) -> String {
    let mut query = String::from(
        "SELECT row_criterion, col_criterion, value FROM award_ranking.pairwise_comparisons",
    );
    if lock {
        query.push_str(" FOR UPDATE");
    }
    query
}

/// Records one judgment and its reciprocal in a single transaction and
/// clears the applied weights, which were approved for the old matrix.
pub async fn set_comparison(
    pool: &PgPool,
    criteria: &mut [Criterion],
    row_id: &str,
    col_id: &str,
    value: f64,
) -> anyhow::Result<ComparisonMatrix> {
    let position = |id: &str| {
        criteria
            .iter()
            .position(|c| c.id == id)
            .with_context(|| format!("unknown criterion {id}"))
    };
    let row = position(row_id)?;
    let col = position(col_id)?;

    let mut tx = pool.begin().await?;
    let mut matrix = load_matrix(&mut *tx, criteria, true).await?;
    matrix.set_comparison(row, col, value)?;

    for (from, to, cell) in [(row, col, value), (col, row, 1.0 / value)] {
        sqlx::query(
            r#"
            INSERT INTO award_ranking.pairwise_comparisons (row_criterion, col_criterion, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (row_criterion, col_criterion) DO UPDATE
            SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(&criteria[from].id)
        .bind(&criteria[to].id)
        .bind(cell)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE award_ranking.criteria SET weight = NULL")
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    approval::revoke(criteria);
    Ok(matrix)
}

/// Stores approved weights on the criteria and records the decision.
pub async fn save_weights(
    pool: &PgPool,
    criteria: &[Criterion],
    approved: &ApprovedWeights,
) -> anyhow::Result<Uuid> {
    if criteria.len() != approved.weights.len() {
        anyhow::bail!(
            "{} weights cannot be stored for {} criteria",
            approved.weights.len(),
            criteria.len()
        );
    }

    let mut tx = pool.begin().await?;
    for (criterion, weight) in criteria.iter().zip(approved.weights.iter()) {
        sqlx::query("UPDATE award_ranking.criteria SET weight = $1 WHERE id = $2")
            .bind(weight)
            .bind(&criterion.id)
            .execute(&mut *tx)
            .await?;
    }

    let decision_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO award_ranking.weight_decisions
        (id, decided_at, mode, consistency_ratio, note)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(decision_id)
    .bind(Utc::now())
    .bind(approved.mode.as_str())
    .bind(approved.consistency_ratio)
    .bind(approved.note.as_deref())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(decision_id)
}

pub async fn latest_decision(pool: &PgPool) -> anyhow::Result<Option<WeightDecision>> {
    let row = sqlx::query(
        "SELECT id, decided_at, mode, consistency_ratio, note \
         FROM award_ranking.weight_decisions \
         ORDER BY decided_at DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| WeightDecision {
        id: row.get("id"),
        decided_at: row.get("decided_at"),
        mode: row.get("mode"),
        consistency_ratio: row.get("consistency_ratio"),
        note: row.get("note"),
    }))
}

/// Replaces the whole stored ranking with `results`.
pub async fn replace_results(pool: &PgPool, results: &[RankedResult]) -> anyhow::Result<u64> {
    let calculated_at = Utc::now();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM award_ranking.ranking_results")
        .execute(&mut *tx)
        .await?;

    let mut inserted = 0u64;
    for result in results {
        let rank = i32::try_from(result.rank).context("rank does not fit in a database integer")?;
        let outcome = sqlx::query(
            r#"
            INSERT INTO award_ranking.ranking_results
            (student_id, final_score, rank, calculated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(result.student_id)
        .bind(result.final_score)
        .bind(rank)
        .bind(calculated_at)
        .execute(&mut *tx)
        .await?;
        inserted += outcome.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn fetch_results(pool: &PgPool, limit: usize) -> anyhow::Result<Vec<StoredResult>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = sqlx::query(
        "SELECT r.rank, r.student_id, st.full_name, st.class_name, st.registration_id, \
         r.final_score, r.calculated_at \
         FROM award_ranking.ranking_results r \
         JOIN award_ranking.students st ON st.id = r.student_id \
         ORDER BY r.rank \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| StoredResult {
            rank: row.get("rank"),
            student_id: row.get("student_id"),
            full_name: row.get("full_name"),
            class_name: row.get("class_name"),
            registration_id: row.get("registration_id"),
            final_score: row.get("final_score"),
            calculated_at: row.get("calculated_at"),
        })
        .collect())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        registration_id: String,
        full_name: String,
        class_name: String,
        criterion_id: String,
        score: f64,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut tx = pool.begin().await?;
    let mut imported = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV record {}", line + 1))?;
        if !(0.0..=100.0).contains(&row.score) {
            anyhow::bail!(
                "score {} for {} on {} is outside 0-100",
                row.score,
                row.registration_id,
                row.criterion_id
            );
        }

        let student_id: Uuid = sqlx::query(
            r#"
            INSERT INTO award_ranking.students
            (id, full_name, class_name, registration_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (registration_id) DO UPDATE
            SET full_name = EXCLUDED.full_name, class_name = EXCLUDED.class_name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.full_name)
        .bind(&row.class_name)
        .bind(&row.registration_id)
        .fetch_one(&mut *tx)
        .await?
        .get("id");

        upsert_score(&mut tx, student_id, &row.criterion_id, row.score + 0.0)
            .await
            .with_context(|| format!("unknown criterion {}", row.criterion_id))?;
        imported += 1;
    }

    tx.commit().await?;
    Ok(imported)
}

async fn upsert_score(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    student_id: Uuid,
    criterion_id: &str,
    value: f64,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO award_ranking.scores (student_id, criterion_id, value)
        VALUES ($1, $2, $3)
        ON CONFLICT (student_id, criterion_id) DO UPDATE SET value = EXCLUDED.value
        "#,
    )
    .bind(student_id)
    .bind(criterion_id)
    .bind(value)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
