//! Record query and maintenance endpoints, everything under `/api/csv`.
//!
//! The provided routes are:
//! - `GET /api/csv/export`: filtered per-operator summary as a CSV attachment.
//! - `GET /api/csv/export-in-details`: filtered IN detail rows as a CSV
//!   attachment, joined to the records by `id_lin`.
//! - `GET /api/csv/data`: paginated, filtered records for the table view.
//! - `GET /api/csv/stats`: chart slices (`operators`, `status` or `2fa`).
//! - `GET /api/csv/filter-options`: distinct values the filter bar offers.
//! - `GET /api/csv/check`: whether any data has been imported yet.
//! - `DELETE /api/csv/purge`: drops every record; idempotent.
//!
//! Endpoints that read data reply `200 {"message": "no_data"}` when the store
//! is empty, so an empty dashboard is not an error state.

use actix_web::web::{delete, get, scope};
use actix_web::{HttpResponse, Scope};
use rusqlite::Connection;

use crate::config::Config;

pub(crate) mod export_csv;
pub(crate) mod export_in_details;
mod filter_options;
mod get_data;
mod get_stats;
mod maintenance;

const API_PATH: &str = "/api/csv";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/export", get().to(export_csv::process))
        .route("/export-in-details", get().to(export_in_details::process))
        .route("/data", get().to(get_data::process))
        .route("/stats", get().to(get_stats::process))
        .route("/filter-options", get().to(filter_options::process))
        .route("/check", get().to(maintenance::check))
        .route("/purge", delete().to(maintenance::purge))
}

/// Opens the store for a request, mapping failure to a 500 reply.
pub(crate) fn open_store(config: &Config) -> Result<Connection, HttpResponse> {
    crate::store::open(&config.db_path()).map_err(|e| {
        log::error!("failed to open store: {e}");
        HttpResponse::InternalServerError()
            .json(common::model::responses::ErrorBody::detail(e.to_string()))
    })
}

/// Shared no-data reply.
pub(crate) fn no_data() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "message": "no_data" }))
}
