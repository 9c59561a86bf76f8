// src/api/routes.rs
use super::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health_check))
            .service(
                web::scope("/tasks")
                    .route("", web::post().to(handlers::create_task))
                    .route("", web::get().to(handlers::list_tasks))
                    .route("/{task_id}", web::get().to(handlers::get_task))
                    .route(
                        "/{task_id}/evals/{eval_id}/configs/{config_id}/run",
                        web::post().to(handlers::run_eval_config),
                    )
                    .route(
                        "/{task_id}/evals/{eval_id}/configs/{config_id}/runs",
                        web::get().to(handlers::list_eval_runs),
                    ),
            ),
    );
}
