//! Import-side endpoints, mounted at the `/api` root.
//!
//! The provided routes are:
//! - `POST /api/process_files`: multipart upload of one `.txt` data file, the
//!   `MAJNUM.csv` mapping file and an `appendMode` flag. The file is staged,
//!   parsed against the mapping and inserted; the reply carries the inserted
//!   and total row counts. Parsing runs as a tracked background job.
//! - `GET /api/status/{job_id}`: poll the status of a processing job.
//! - `POST /api/load_data`: snapshot the current records into a named table.
//! - `GET /api/export`, `GET /api/export-in-details`: legacy flat aliases of
//!   the `/api/csv` exports, kept for older clients.

use actix_web::web::{get, post, scope};
use actix_web::Scope;

use crate::services::records;

mod get_status;
mod load_data;
mod process_files;

const API_PATH: &str = "/api";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        // Route to process an uploaded data file with its mapping.
        .route("/process_files", post().to(process_files::process))
        // Route to poll a processing job.
        .route("/status/{job_id}", get().to(get_status::process))
        // Route to snapshot the records into a named table.
        .route("/load_data", post().to(load_data::process))
        // Legacy aliases of the /api/csv exports.
        .route("/export", get().to(records::export_csv::process))
        .route(
            "/export-in-details",
            get().to(records::export_in_details::process),
        )
}
