use actix_web::{web, HttpResponse, Responder};
use common::model::responses::ErrorBody;
use serde::Deserialize;

use crate::config::Config;
use crate::services::records::{no_data, open_store};
use crate::store;

#[derive(Deserialize)]
pub struct StatsQuery {
    /// `operators`, `status` or `2fa`; anything else yields an empty series.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

pub(crate) async fn process(
    query: web::Query<StatsQuery>,
    config: web::Data<Config>,
) -> impl Responder {
    let kind = query.kind.as_deref().unwrap_or("operators");

    let conn = match open_store(&config) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match store::has_data(&conn) {
        Ok(false) => return no_data(),
        Ok(true) => {}
        Err(e) => {
            return HttpResponse::InternalServerError().json(ErrorBody::detail(e.to_string()))
        }
    }

    match store::stats(&conn, kind) {
        Ok(points) => HttpResponse::Ok().json(points),
        Err(e) => HttpResponse::InternalServerError().json(ErrorBody::detail(e.to_string())),
    }
}
