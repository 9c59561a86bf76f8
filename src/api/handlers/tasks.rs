// src/api/handlers/tasks.rs
use actix_web::{web, HttpResponse, Result};
use serde::Serialize;
use serde_json::json;

use crate::api::AppState;
use crate::datamodel::Task;

#[derive(Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub name: String,
    pub dataset_items: usize,
    pub run_configs: usize,
    pub evals: usize,
}

#[derive(Serialize)]
pub struct TasksResponse {
    pub tasks: Vec<TaskSummary>,
}

/// POST /api/v1/tasks - Register a task definition. Replaces any existing
/// task with the same id.
pub async fn create_task(
    state: web::Data<AppState>,
    task: web::Json<Task>,
) -> Result<HttpResponse> {
    let task = task.into_inner();
    let task_id = task.id.clone();
    if task_id.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "error": "task id is required" })));
    }
    let mut tasks = state.tasks.write().await;
    tasks.insert(task_id.clone(), task);
    Ok(HttpResponse::Created().json(json!({ "id": task_id })))
}

/// GET /api/v1/tasks - Summaries of all registered tasks.
pub async fn list_tasks(state: web::Data<AppState>) -> Result<HttpResponse> {
    let tasks = state.tasks.read().await;
    let mut summaries: Vec<TaskSummary> = tasks
        .values()
        .map(|task| TaskSummary {
            id: task.id.clone(),
            name: task.name.clone(),
            dataset_items: task.runs.len(),
            run_configs: task.run_configs.len(),
            evals: task.evals.len(),
        })
        .collect();
    summaries.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(HttpResponse::Ok().json(TasksResponse { tasks: summaries }))
}

/// GET /api/v1/tasks/{task_id} - The full task definition.
pub async fn get_task(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let task_id = path.into_inner();
    let tasks = state.tasks.read().await;
    match tasks.get(&task_id) {
        Some(task) => Ok(HttpResponse::Ok().json(task)),
        None => Ok(HttpResponse::NotFound().json(json!({ "error": "task not found" }))),
    }
}
