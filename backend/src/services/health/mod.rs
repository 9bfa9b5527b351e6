//! Liveness endpoint. The importer hits this before starting a session and
//! the dashboard polls it for its server status indicator.

use actix_web::web::{get, scope};
use actix_web::{HttpResponse, Responder, Scope};
use common::model::responses::HealthResponse;

const API_PATH: &str = "/api/health";

pub fn configure_routes() -> Scope {
    scope(API_PATH).route("", get().to(process))
}

async fn process() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
    })
}
