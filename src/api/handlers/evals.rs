// src/api/handlers/evals.rs
use std::collections::HashSet;
use std::sync::Arc;

use actix_web::{web, HttpResponse, Result};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;

use crate::api::AppState;
use crate::database;
use crate::datamodel::{Eval, EvalConfig, Task, TaskRunConfig};
use crate::errors::EvalError;
use crate::runner::EvalRunner;

#[derive(Deserialize)]
pub struct RunEvalQuery {
    /// Worker count for this pass; defaults to the configured value.
    pub concurrency: Option<usize>,
    /// Comma-separated run config ids; defaults to all of the task's.
    pub run_config_ids: Option<String>,
}

fn error_response(e: &EvalError) -> HttpResponse {
    let body = json!({ "error": e.to_string() });
    if e.is_configuration() {
        HttpResponse::BadRequest().json(body)
    } else {
        HttpResponse::InternalServerError().json(body)
    }
}

fn not_found(what: &str) -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "error": format!("{what} not found") }))
}

async fn lookup(
    state: &AppState,
    task_id: &str,
    eval_id: &str,
    config_id: &str,
) -> std::result::Result<(Task, Eval, EvalConfig), HttpResponse> {
    let tasks = state.tasks.read().await;
    let Some(task) = tasks.get(task_id) else {
        return Err(not_found("task"));
    };
    let Some(eval) = task.eval(eval_id) else {
        return Err(not_found("eval"));
    };
    let Some(eval_config) = eval.config(config_id) else {
        return Err(not_found("eval config"));
    };
    Ok((task.clone(), eval.clone(), eval_config.clone()))
}

/// POST /api/v1/tasks/{task_id}/evals/{eval_id}/configs/{config_id}/run
///
/// Starts an evaluation pass and streams progress as Server-Sent Events: one
/// `data: {"complete":..,"total":..,"errors":..}` event per snapshot, then a
/// final `data: complete` sentinel so long-lived clients know to stop
/// listening. A fatal runner error terminates the stream abruptly instead.
pub async fn run_eval_config(
    state: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
    query: web::Query<RunEvalQuery>,
) -> Result<HttpResponse> {
    let (task_id, eval_id, config_id) = path.into_inner();

    let Some(pool) = state.db_pool.as_ref() else {
        return Ok(HttpResponse::InternalServerError()
            .json(json!({ "error": "database not initialized" })));
    };

    let (task, eval, eval_config) = match lookup(&state, &task_id, &eval_id, &config_id).await
    {
        Ok(found) => found,
        Err(response) => return Ok(response),
    };

    let run_configs: Vec<TaskRunConfig> = match &query.run_config_ids {
        Some(ids) => {
            let wanted: HashSet<&str> = ids.split(',').map(str::trim).collect();
            task.run_configs
                .iter()
                .filter(|rc| wanted.contains(rc.id.as_str()))
                .cloned()
                .collect()
        }
        None => task.run_configs.clone(),
    };

    let concurrency = query.concurrency.unwrap_or(state.config.default_concurrency);

    let runner = match EvalRunner::new(
        task,
        eval,
        eval_config,
        run_configs,
        Arc::clone(&state.config),
        state.client.clone(),
        pool.as_ref().clone(),
    ) {
        Ok(runner) => runner,
        Err(e) => return Ok(error_response(&e)),
    };

    match runner.run(concurrency).await {
        Ok(progress_stream) => {
            let events = progress_stream
                .map(|item| match item {
                    Ok(progress) => match serde_json::to_string(&progress) {
                        Ok(payload) => {
                            Ok(web::Bytes::from(format!("data: {payload}\n\n")))
                        }
                        Err(e) => Err(actix_web::error::ErrorInternalServerError(e)),
                    },
                    Err(e) => Err(actix_web::error::ErrorInternalServerError(e)),
                })
                .chain(stream::once(async {
                    Ok::<_, actix_web::Error>(web::Bytes::from_static(b"data: complete\n\n"))
                }));

            Ok(HttpResponse::Ok()
                .insert_header(("Cache-Control", "no-cache"))
                .content_type("text/event-stream")
                .streaming(events))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

/// GET /api/v1/tasks/{task_id}/evals/{eval_id}/configs/{config_id}/runs
///
/// The persisted results for an eval config, oldest first.
pub async fn list_eval_runs(
    state: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse> {
    let (task_id, eval_id, config_id) = path.into_inner();

    let Some(pool) = state.db_pool.as_ref() else {
        return Ok(HttpResponse::InternalServerError()
            .json(json!({ "error": "database not initialized" })));
    };

    if let Err(response) = lookup(&state, &task_id, &eval_id, &config_id).await {
        return Ok(response);
    }

    match database::eval_runs_for_config(pool, &config_id).await {
        Ok(runs) => Ok(HttpResponse::Ok().json(json!({ "runs": runs }))),
        Err(e) => {
            log::error!("failed to list eval runs for '{config_id}': {e}");
            Ok(error_response(&e))
        }
    }
}
