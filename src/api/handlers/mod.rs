// src/api/handlers/mod.rs
pub mod evals;
pub mod health;
pub mod tasks;

pub use evals::{list_eval_runs, run_eval_config};
pub use health::health_check;
pub use tasks::{create_task, get_task, list_tasks};
