use actix_web::{web, HttpResponse, Responder};
use common::model::responses::ErrorBody;

use crate::job_controller::state::JobsState;

pub(crate) async fn process(
    job_id: web::Path<String>,
    state: web::Data<JobsState>,
) -> impl Responder {
    let jobs = state.jobs.read().await;
    if let Some(status) = jobs.get(&job_id.into_inner()) {
        HttpResponse::Ok().json(status)
    } else {
        HttpResponse::NotFound().json(ErrorBody::detail("Job ID not found"))
    }
}
