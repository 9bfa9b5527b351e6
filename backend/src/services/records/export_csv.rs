use actix_web::{web, HttpResponse, Responder};
use common::model::responses::ErrorBody;
use common::requests::RawFilterQuery;

use crate::config::Config;
use crate::services::records::{no_data, open_store};
use crate::store;

/// Per-operator summary export. Counts come from the filtered rows; the
/// percentage column stays relative to the whole stored parc so filtered
/// exports remain comparable with the dashboard.
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

    let summary = match store::operator_summary(&conn, &criteria) {
        Ok(summary) => summary,
        Err(e) => {
            return HttpResponse::InternalServerError().json(ErrorBody::detail(e.to_string()))
        }
    };

    match build_csv(&summary) {
        Ok(body) => attachment_response(body, "export_resume"),
        Err(e) => HttpResponse::InternalServerError().json(ErrorBody::detail(e)),
    }
}

fn build_csv(summary: &[(String, u32, f64)]) -> Result<String, String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["Opérateur", "Nombre d'IN", "Pourcentage IN (parc global)"])
        .map_err(|e| e.to_string())?;
    for (operateur, nombre_in, pourcentage) in summary {
        writer
            .write_record([
                operateur.as_str(),
                &nombre_in.to_string(),
                &pourcentage.to_string(),
            ])
            .map_err(|e| e.to_string())?;
    }
    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

/// CSV attachment with a timestamped filename.
pub(crate) fn attachment_response(body: String, stem: &str) -> HttpResponse {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename={stem}_{stamp}.csv"),
        ))
        .body(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_csv_is_quoted_and_ordered() {
        let summary = vec![
            ("Orange".to_string(), 1250, 35.8),
            ("SFR, fixe".to_string(), 980, 28.1),
        ];
        let csv = build_csv(&summary).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Opérateur,Nombre d'IN,Pourcentage IN (parc global)"
        );
        assert_eq!(lines.next().unwrap(), "Orange,1250,35.8");
        // The comma in the operator name forces quoting.
        assert_eq!(lines.next().unwrap(), "\"SFR, fixe\",980,28.1");
    }
}
