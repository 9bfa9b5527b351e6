use actix_web::{web, HttpResponse, Responder};
use common::model::record::DetailedInRecord;
use common::model::responses::ErrorBody;
use common::requests::RawFilterQuery;

use crate::config::Config;
use crate::services::records::export_csv::attachment_response;
use crate::services::records::{no_data, open_store};
use crate::store;

/// Detail export: one row per IN of every line matching the filters.
pub(crate) async fn process(
    query: web::Query<RawFilterQuery>,
    config: web::Data<Config>,
) -> impl Responder {
    let criteria = query.normalize();
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

    let details = match store::detailed_records(&conn, &criteria) {
        Ok(details) => details,
        Err(e) => {
            return HttpResponse::InternalServerError().json(ErrorBody::detail(e.to_string()))
        }
    };

    match build_csv(&details) {
        Ok(body) => attachment_response(body, "export_in_details"),
        Err(e) => HttpResponse::InternalServerError().json(ErrorBody::detail(e)),
    }
}

fn build_csv(details: &[DetailedInRecord]) -> Result<String, String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "ID_LIN",
            "Numéro IN",
            "Date d'activation",
            "Statut détaillé",
            "Type de service",
            "Région",
        ])
        .map_err(|e| e.to_string())?;
    for row in details {
        writer
            .write_record([
                row.id_lin.as_str(),
                row.numero_in.as_str(),
                row.date_activation.as_str(),
                row.statut_detail.as_str(),
                row.type_service.as_str(),
                row.region.as_str(),
            ])
            .map_err(|e| e.to_string())?;
    }
    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_only_when_nothing_matches() {
        let csv = build_csv(&[]).unwrap();
        assert_eq!(
            csv.trim_end(),
            "ID_LIN,Numéro IN,Date d'activation,Statut détaillé,Type de service,Région"
        );
    }
}
