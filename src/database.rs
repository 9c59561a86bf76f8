// src/database.rs
use std::collections::HashSet;
use std::path::PathBuf;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::datamodel::EvalRun;
use crate::errors::{EvalError, Result};

/// Opens the SQLite pool named by `DATABASE_URL` (creating the file and its
/// parent directory as needed) and applies pending migrations.
pub async fn init_db() -> Result<SqlitePool> {
    let db_path = get_db_path()?;

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let absolute_path = if db_path.is_relative() {
        std::env::current_dir()?.join(&db_path)
    } else {
        db_path.clone()
    };

    let db_url = format!("sqlite://{}?mode=rwc", absolute_path.display());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    log::info!("database ready at {}", absolute_path.display());
    Ok(pool)
}

fn get_db_path() -> Result<PathBuf> {
    let db_url = std::env::var("DATABASE_URL")
        .map_err(|_| EvalError::Config("DATABASE_URL must be set".to_string()))?;

    let db_path_str = db_url.strip_prefix("sqlite:").ok_or_else(|| {
        EvalError::Config("DATABASE_URL must start with 'sqlite:'".to_string())
    })?;

    Ok(PathBuf::from(db_path_str))
}

/// Persists one completed evaluation result. The unique index on
/// `(eval_config_id, dataset_item_id, run_config_id)` rejects a second write
/// for the same pair.
pub async fn save_eval_run(pool: &SqlitePool, run: &EvalRun) -> Result<()> {
    let scores_json = serde_json::to_string(&run.scores)?;

    sqlx::query(
        r#"
        INSERT INTO eval_runs (id, eval_config_id, dataset_item_id, run_config_id, input, output, scores, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&run.id)
    .bind(&run.eval_config_id)
    .bind(&run.dataset_item_id)
    .bind(&run.run_config_id)
    .bind(&run.input)
    .bind(&run.output)
    .bind(&scores_json)
    .bind(&run.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// The resume set: every `(dataset_item_id, run_config_id)` pair that already
/// has a persisted result for this eval config. Read once at the start of a
/// pass; the job collector never re-enqueues these pairs.
pub async fn existing_run_keys(
    pool: &SqlitePool,
    eval_config_id: &str,
) -> Result<HashSet<(String, String)>> {
    let rows = sqlx::query(
        "SELECT dataset_item_id, run_config_id FROM eval_runs WHERE eval_config_id = ?",
    )
    .bind(eval_config_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get(0), row.get(1)))
        .collect())
}

/// All persisted results for an eval config, oldest first.
pub async fn eval_runs_for_config(
    pool: &SqlitePool,
    eval_config_id: &str,
) -> Result<Vec<EvalRun>> {
    let rows = sqlx::query(
        r#"
        SELECT id, eval_config_id, dataset_item_id, run_config_id, input, output, scores, created_at
        FROM eval_runs
        WHERE eval_config_id = ?
        ORDER BY created_at
        "#,
    )
    .bind(eval_config_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let scores_json: String = row.get(6);
            Ok(EvalRun {
                id: row.get(0),
                eval_config_id: row.get(1),
                dataset_item_id: row.get(2),
                run_config_id: row.get(3),
                input: row.get(4),
                output: row.get(5),
                scores: serde_json::from_str(&scores_json)?,
                created_at: row.get(7),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::EvalScores;

    async fn test_pool() -> SqlitePool {
        // A single connection keeps every query on the same in-memory
        // database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn record(item: &str, run_config: &str) -> EvalRun {
        let mut scores = EvalScores::new();
        scores.insert("overall_rating".to_string(), 4.0);
        EvalRun {
            id: uuid::Uuid::new_v4().to_string(),
            eval_config_id: "ec-1".to_string(),
            dataset_item_id: item.to_string(),
            run_config_id: run_config.to_string(),
            input: "in".to_string(),
            output: "out".to_string(),
            scores,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_saved_runs_round_trip_and_feed_the_resume_set() {
        let pool = test_pool().await;
        save_eval_run(&pool, &record("item-a", "rc-1")).await.unwrap();
        save_eval_run(&pool, &record("item-b", "rc-1")).await.unwrap();

        let keys = existing_run_keys(&pool, "ec-1").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&("item-a".to_string(), "rc-1".to_string())));

        let runs = eval_runs_for_config(&pool, "ec-1").await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].scores.get("overall_rating"), Some(&4.0));

        assert!(existing_run_keys(&pool, "other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_pair_is_rejected_by_the_unique_index() {
        let pool = test_pool().await;
        save_eval_run(&pool, &record("item-a", "rc-1")).await.unwrap();
        let duplicate = save_eval_run(&pool, &record("item-a", "rc-1")).await;
        assert!(duplicate.is_err());
    }
}
