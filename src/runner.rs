// src/runner.rs
//
// The evaluation orchestrator. An `EvalRunner` binds one eval config and a
// set of run configs to the generic worker pool: it computes the job set
// (filtered dataset items × run configs, minus pairs that already have a
// persisted result), executes each job against an evaluator, validates and
// persists the scores, and streams progress snapshots to the caller.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::Stream;
use reqwest::Client;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::database;
use crate::datamodel::{Eval, EvalConfig, EvalRun, Task, TaskRun, TaskRunConfig};
use crate::errors::{EvalError, Result};
use crate::evaluators::evaluator_from_type;
use crate::filters::dataset_filter_from_id;
use crate::jobs::{JobRunner, Progress};
use crate::schema::ScoreSchema;

/// One unit of work: evaluate one dataset item under one run configuration.
#[derive(Debug, Clone)]
pub struct EvalJob {
    pub item: TaskRun,
    pub run_config: TaskRunConfig,
}

pub struct EvalRunner {
    task: Task,
    eval: Eval,
    eval_config: EvalConfig,
    run_configs: Vec<TaskRunConfig>,
    score_schema: ScoreSchema,
    config: Arc<AppConfig>,
    client: Client,
    pool: SqlitePool,
}

impl EvalRunner {
    /// Validates that the pieces belong together before anything is
    /// scheduled: the eval must belong to the task, the eval config to the
    /// eval, and every run config to the same task. An empty run config list
    /// is rejected outright.
    pub fn new(
        task: Task,
        eval: Eval,
        eval_config: EvalConfig,
        run_configs: Vec<TaskRunConfig>,
        config: Arc<AppConfig>,
        client: Client,
        pool: SqlitePool,
    ) -> Result<Self> {
        if eval.task_id != task.id {
            return Err(EvalError::Config(format!(
                "eval '{}' does not belong to task '{}'",
                eval.id, task.id
            )));
        }
        if eval_config.eval_id != eval.id {
            return Err(EvalError::Config(format!(
                "eval config '{}' does not belong to eval '{}'",
                eval_config.id, eval.id
            )));
        }
        if run_configs.is_empty() {
            return Err(EvalError::Config(
                "at least one run config is required".to_string(),
            ));
        }
        for run_config in &run_configs {
            if run_config.task_id != task.id {
                return Err(EvalError::Config(format!(
                    "run config '{}' is not for task '{}'",
                    run_config.id, task.id
                )));
            }
        }
        let score_schema = ScoreSchema::for_task(&task)?;
        Ok(Self {
            task,
            eval,
            eval_config,
            run_configs,
            score_schema,
            config,
            client,
            pool,
        })
    }

    /// Collects the jobs for one pass.
    ///
    /// A dataset item takes part if it matches the eval-set filter OR the
    /// eval-configs filter; items matched by the comparison filter are swept
    /// into the same pass on purpose. The result is the cross product with
    /// the run configs, in dataset order then run config order, minus every
    /// pair in `existing`, the resume set read once before the pass starts.
    pub fn collect_jobs(
        &self,
        existing: &HashSet<(String, String)>,
    ) -> Result<Vec<EvalJob>> {
        let eval_filter = dataset_filter_from_id(&self.eval.eval_set_filter_id)?;
        let config_filter = dataset_filter_from_id(&self.eval.eval_configs_filter_id)?;

        let mut jobs = Vec::new();
        for item in &self.task.runs {
            if !(eval_filter(item) || config_filter(item)) {
                continue;
            }
            for run_config in &self.run_configs {
                let key = (item.id.clone(), run_config.id.clone());
                if existing.contains(&key) {
                    continue;
                }
                jobs.push(EvalJob {
                    item: item.clone(),
                    run_config: run_config.clone(),
                });
            }
        }
        Ok(jobs)
    }

    /// Runs the pass with `concurrency` workers and returns the progress
    /// stream. Configuration errors (bad concurrency, unknown filter id)
    /// surface here, before any job is scheduled.
    pub async fn run(
        self,
        concurrency: usize,
    ) -> Result<impl Stream<Item = Result<Progress>>> {
        let runner = JobRunner::new(concurrency)?;
        let existing = database::existing_run_keys(&self.pool, &self.eval_config.id).await?;
        let jobs = self.collect_jobs(&existing)?;
        log::info!(
            "starting eval pass for config '{}': {} jobs, {} workers",
            self.eval_config.id,
            jobs.len(),
            concurrency.min(jobs.len())
        );

        let ctx = Arc::new(self);
        Ok(runner.run(jobs, move |job| {
            let ctx = Arc::clone(&ctx);
            async move { Ok(ctx.run_job(job).await) }
        }))
    }

    /// Executes one job. Every failure (evaluator construction, the model or
    /// judge call, score validation, persistence) is logged with the job
    /// identity and reported as `false`; it never aborts sibling jobs. The
    /// pair stays unpersisted, so the next pass offers it again.
    async fn run_job(&self, job: EvalJob) -> bool {
        match self.execute_job(&job).await {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "eval job failed (item '{}', run config '{}'): {e}",
                    job.item.id,
                    job.run_config.id
                );
                false
            }
        }
    }

    async fn execute_job(&self, job: &EvalJob) -> Result<()> {
        let evaluator = evaluator_from_type(
            &self.task,
            &self.eval_config,
            &job.run_config,
            &self.score_schema,
            Arc::clone(&self.config),
            self.client.clone(),
        )?;

        let (output, scores) = evaluator.run(&job.item.input).await?;
        self.score_schema.validate(&scores)?;

        let record = EvalRun {
            id: Uuid::new_v4().to_string(),
            eval_config_id: self.eval_config.id.clone(),
            dataset_item_id: job.item.id.clone(),
            run_config_id: job.run_config.id.clone(),
            input: job.item.input.clone(),
            output,
            scores,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        database::save_eval_run(&self.pool, &record).await?;
        log::debug!(
            "persisted eval run {} for item '{}'",
            record.id,
            record.dataset_item_id
        );
        Ok(())
    }
}
