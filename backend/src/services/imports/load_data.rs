use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use common::model::responses::{ErrorBody, OutcomeResponse};
use futures_util::StreamExt;
use log::info;

use crate::config::Config;
use crate::store;

/// `POST /api/load_data` — snapshots the current records into a named table,
/// replacing a previous snapshot of the same name. The only form field read
/// is `table_name`.
pub(crate) async fn process(mut payload: Multipart, config: web::Data<Config>) -> impl Responder {
    let mut table_name: Option<String> = None;

    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(field) => field,
            Err(e) => {
                return HttpResponse::InternalServerError()
                    .json(ErrorBody::error(format!("multipart error: {e}")))
            }
        };
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));

        if name.as_deref() == Some("table_name") {
            let mut bytes = Vec::new();
            while let Some(chunk) = field.next().await {
                match chunk {
                    Ok(chunk) => bytes.extend_from_slice(&chunk),
                    Err(e) => {
                        return HttpResponse::InternalServerError()
                            .json(ErrorBody::error(format!("upload error: {e}")))
                    }
                }
            }
            table_name = Some(String::from_utf8_lossy(&bytes).trim().to_string());
        }
    }

    let table_name = match table_name {
        Some(name) if !name.is_empty() => name,
        _ => {
            return HttpResponse::BadRequest()
                .json(ErrorBody::error("Le nom de la table est requis"))
        }
    };
    if !store::is_valid_table_name(&table_name) {
        return HttpResponse::BadRequest().json(ErrorBody {
            error: Some("Nom de table invalide".to_string()),
            details: Some(
                "Seuls les lettres, chiffres et tirets bas sont acceptés".to_string(),
            ),
            ..Default::default()
        });
    }

    let conn = match store::open(&config.db_path()) {
        Ok(conn) => conn,
        Err(e) => {
            return HttpResponse::InternalServerError()
                .json(ErrorBody::error(format!("Erreur lors du chargement: {e}")))
        }
    };

    match store::snapshot_to_table(&conn, &table_name) {
        Ok(rows) => {
            info!("snapshot of {rows} records into table {table_name}");
            HttpResponse::Ok().json(OutcomeResponse {
                success: true,
                message: format!(
                    "Données chargées avec succès dans la table {table_name} ({rows} lignes)"
                ),
            })
        }
        Err(e) => HttpResponse::InternalServerError().json(ErrorBody {
            error: Some("Erreur lors du chargement".to_string()),
            details: Some(e.to_string()),
            ..Default::default()
        }),
    }
}
