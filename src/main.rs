// src/main.rs
use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};

use taskeval::api::{configure_routes, AppState};
use taskeval::{banner, config, database, datamodel};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    banner::print_banner();

    if let Err(e) = dotenvy::dotenv() {
        eprintln!("no .env file loaded: {e}");
    }

    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let app_config = config::AppConfig::from_env()
        .expect("failed to load configuration from environment");

    let db_pool = match database::init_db().await {
        Ok(pool) => Some(pool),
        Err(e) => {
            log::warn!("database unavailable, eval results will not be persisted: {e}");
            None
        }
    };

    let state = AppState::new(app_config, db_pool)
        .expect("failed to build application state");

    if let Ok(dir) = std::env::var("TASKS_DIR") {
        match datamodel::load_tasks_from_dir(&dir) {
            Ok(tasks) => {
                let mut registry = state.tasks.write().await;
                for task in tasks {
                    log::info!("loaded task '{}' ({})", task.name, task.id);
                    registry.insert(task.id.clone(), task);
                }
            }
            Err(e) => log::warn!("could not load tasks from {dir}: {e}"),
        }
    }

    log::info!("starting server on 0.0.0.0:8080");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
