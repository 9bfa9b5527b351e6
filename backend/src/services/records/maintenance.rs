use actix_web::{web, HttpResponse, Responder};
use common::model::responses::{CheckResponse, ErrorBody, OutcomeResponse};
use log::info;

use crate::config::Config;
use crate::services::records::open_store;
use crate::store;

/// `GET /api/csv/check` — does the store hold anything yet?
pub(crate) async fn check(config: web::Data<Config>) -> impl Responder {
    let conn = match open_store(&config) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match store::has_data(&conn) {
        Ok(exists) => HttpResponse::Ok().json(CheckResponse { exists }),
        Err(e) => HttpResponse::InternalServerError().json(ErrorBody::detail(e.to_string())),
    }
}

/// `DELETE /api/csv/purge` — drops every record. Idempotent; purging an empty
/// store is a success with a different message, as the dashboard expects.
pub(crate) async fn purge(config: web::Data<Config>) -> impl Responder {
    let conn = match open_store(&config) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    match store::purge_records(&conn) {
        Ok(deleted) => {
            info!("purged {deleted} records");
            let message = if deleted > 0 {
                "Données purgées avec succès"
            } else {
                "Aucune donnée à purger"
            };
            HttpResponse::Ok().json(OutcomeResponse {
                success: true,
                message: message.to_string(),
            })
        }
        Err(e) => HttpResponse::InternalServerError().json(OutcomeResponse {
            success: false,
            message: format!("Erreur lors de la purge des données: {e}"),
        }),
    }
}
