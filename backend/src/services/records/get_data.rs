use actix_web::{web, HttpResponse, Responder};
use common::model::responses::{DataPage, ErrorBody};
use common::requests::RawFilterQuery;
use serde::Deserialize;

use crate::config::Config;
use crate::services::records::open_store;
use crate::store;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// Pagination plus the shared filter fields, all as loose text — the filter
/// bar sends whatever it has and normalization sorts it out.
#[derive(Deserialize)]
pub struct DataQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
    #[serde(flatten)]
    pub filters: RawFilterQuery,
}

pub(crate) async fn process(
    query: web::Query<DataQuery>,
    config: web::Data<Config>,
) -> impl Responder {
    let page = query
        .page
        .as_deref()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(1)
        .max(1);
    let page_size = query
        .page_size
        .as_deref()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let criteria = query.filters.normalize();

    let conn = match open_store(&config) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    match store::has_data(&conn) {
        Ok(false) => {
            return HttpResponse::Ok().json(DataPage {
                data: Vec::new(),
                total_pages: 0,
                total_count: 0,
                is_filtered: false,
                message: Some("no_data".to_string()),
            })
        }
        Ok(true) => {}
        Err(e) => {
            return HttpResponse::InternalServerError().json(ErrorBody::detail(e.to_string()))
        }
    }

    let total_count = match store::count_filtered(&conn, &criteria) {
        Ok(count) => count,
        Err(e) => {
            return HttpResponse::InternalServerError().json(ErrorBody::detail(e.to_string()))
        }
    };
    let records = match store::query_records(&conn, &criteria, Some((page, page_size))) {
        Ok(records) => records,
        Err(e) => {
            return HttpResponse::InternalServerError().json(ErrorBody::detail(e.to_string()))
        }
    };

    HttpResponse::Ok().json(DataPage {
        data: records,
        total_pages: total_count.div_ceil(page_size),
        total_count,
        is_filtered: !criteria.is_empty(),
        message: None,
    })
}
