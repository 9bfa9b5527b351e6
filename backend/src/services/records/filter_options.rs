use actix_web::{web, HttpResponse, Responder};
use common::model::responses::{ErrorBody, FilterOptions};

use crate::config::Config;
use crate::services::records::open_store;
use crate::store;

pub(crate) async fn process(config: web::Data<Config>) -> impl Responder {
    let conn = match open_store(&config) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    match store::has_data(&conn) {
        Ok(false) => {
            return HttpResponse::Ok().json(FilterOptions {
                message: Some("no_data".to_string()),
                ..Default::default()
            })
        }
        Ok(true) => {}
        Err(e) => {
            return HttpResponse::InternalServerError().json(ErrorBody::detail(e.to_string()))
        }
    }

    match store::filter_options(&conn) {
        Ok(options) => HttpResponse::Ok().json(options),
        Err(e) => HttpResponse::InternalServerError().json(ErrorBody::detail(e.to_string())),
    }
}
