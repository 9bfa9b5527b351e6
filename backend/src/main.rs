mod config;
mod job_controller;
mod pipeline;
mod services;
mod store;

use crate::job_controller::state::JobsState;
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::info;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = config::Config::from_env();
    std::fs::create_dir_all(config.staging_dir())?;
    let (host, port) = (config.host.clone(), config.port);

    // Fail early if the database cannot be opened or migrated.
    store::open(&config.db_path())
        .map_err(|e| std::io::Error::other(format!("could not open database: {e}")))?;

    // Initialize job controller state
    let (jobs_state, rx) = JobsState::channel(100);
    let updater_state = jobs_state.clone();
    tokio::spawn(async move {
        job_controller::state::start_job_updater(updater_state, rx).await;
    });

    info!("Server running at http://{}:{}", host, port);

    let config = web::Data::new(config);
    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(10 * 1024 * 1024)) // 10 MB
            .app_data(web::Data::new(jobs_state.clone()))
            .app_data(config.clone())
            .service(services::records::configure_routes())
            .service(services::health::configure_routes())
            .service(services::imports::configure_routes())
    })
    .bind((host, port))?
    .run()
    .await
}
