use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use common::jobs::JobStatus;
use common::model::record::{FaStatut, Statut};
use common::model::responses::{ErrorBody, ProcessFilesResponse};
use futures_util::StreamExt;
use log::info;
use md5::Context;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::job_controller::state::{JobUpdate, JobsState};
use crate::pipeline::mapping::OperatorTable;
use crate::pipeline::txt;
use crate::store::{self, NewRecord};

/// Processing failure split by who got it wrong.
enum ProcessError {
    /// Bad request: wrong extension, missing part, malformed form.
    Invalid(String),
    /// Anything that went wrong on our side of the boundary.
    Internal(String),
}

/// HTTP wrapper: maps the internal result onto the wire contract.
pub(crate) async fn process(
    payload: Multipart,
    jobs_state: web::Data<JobsState>,
    config: web::Data<Config>,
) -> impl Responder {
    match process_files(payload, jobs_state, config).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(ProcessError::Invalid(msg)) => HttpResponse::BadRequest().json(ErrorBody::detail(msg)),
        Err(ProcessError::Internal(msg)) => {
            HttpResponse::InternalServerError().json(ErrorBody::detail(msg))
        }
    }
}

/// An upload streamed to the staging directory, hashed along the way.
struct SavedUpload {
    file_name: String,
    path: PathBuf,
    md5: String,
}

impl SavedUpload {
    fn discard(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn save_field(
    field: &mut actix_multipart::Field,
    file_name: &str,
    staging: &Path,
) -> Result<SavedUpload, ProcessError> {
    let path = staging.join(format!("{}_{}", uuid::Uuid::new_v4(), file_name));
    let file = File::create(&path)
        .map_err(|e| ProcessError::Internal(format!("could not save upload: {e}")))?;
    let mut writer = BufWriter::new(file);
    let mut hasher = Context::new();

    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| ProcessError::Internal(format!("upload error: {e}")))?;
        hasher.consume(&chunk);
        writer
            .write_all(&chunk)
            .map_err(|e| ProcessError::Internal(format!("could not save upload: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| ProcessError::Internal(format!("could not save upload: {e}")))?;

    Ok(SavedUpload {
        file_name: file_name.to_string(),
        path,
        md5: format!("{:x}", hasher.finalize()),
    })
}

async fn process_files(
    mut payload: Multipart,
    jobs_state: web::Data<JobsState>,
    config: web::Data<Config>,
) -> Result<ProcessFilesResponse, ProcessError> {
    let staging = config.staging_dir();
    std::fs::create_dir_all(&staging)
        .map_err(|e| ProcessError::Internal(format!("could not create staging dir: {e}")))?;

    let mut data_file: Option<SavedUpload> = None;
    let mut mapping_file: Option<SavedUpload> = None;
    let mut append_mode = false;

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| ProcessError::Internal(format!("multipart error: {e}")))?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
            .unwrap_or_default();

        match name.as_deref() {
            Some("dataFiles") => {
                if !file_name.to_lowercase().ends_with(".txt") {
                    if let Some(mapping) = &mapping_file {
                        mapping.discard();
                    }
                    return Err(ProcessError::Invalid(format!(
                        "Invalid file format for {file_name}. Only .txt files allowed."
                    )));
                }
                data_file = Some(save_field(&mut field, &file_name, &staging).await?);
            }
            Some("mappingFile") => {
                if !file_name.to_lowercase().ends_with(".csv") {
                    if let Some(data) = &data_file {
                        data.discard();
                    }
                    return Err(ProcessError::Invalid(
                        "Invalid mapping file format. Only .csv files allowed.".to_string(),
                    ));
                }
                mapping_file = Some(save_field(&mut field, &file_name, &staging).await?);
            }
            Some("appendMode") => {
                let mut bytes = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk =
                        chunk.map_err(|e| ProcessError::Internal(format!("upload error: {e}")))?;
                    bytes.extend_from_slice(&chunk);
                }
                append_mode = String::from_utf8_lossy(&bytes).trim().eq_ignore_ascii_case("true");
            }
            _ => {}
        }
    }

    let data = data_file.ok_or_else(|| ProcessError::Invalid("No data file provided".into()))?;
    let mapping = match mapping_file {
        Some(mapping) => mapping,
        None => {
            data.discard();
            return Err(ProcessError::Invalid("No mapping file provided".into()));
        }
    };

    info!(
        "process_files: data={} mapping={} append={}",
        data.file_name, mapping.file_name, append_mode
    );

    let db_path = config.db_path();

    // A byte-identical part was already imported: acknowledge without
    // touching the store, so a re-submitted retry cannot double-insert.
    match already_imported(&db_path, &data.md5) {
        Ok(Some(total_rows)) => {
            data.discard();
            mapping.discard();
            return Ok(ProcessFilesResponse {
                success: true,
                message: format!("File {} was already processed; nothing to do", data.file_name),
                rows_processed: 0,
                total_rows,
                duplicates_found: None,
            });
        }
        Ok(None) => {}
        Err(e) => {
            data.discard();
            mapping.discard();
            return Err(ProcessError::Internal(e));
        }
    }

    let job_id = uuid::Uuid::new_v4().to_string();
    jobs_state
        .jobs
        .write()
        .await
        .insert(job_id.clone(), JobStatus::Pending);

    let tx = jobs_state.tx.clone();
    let job_for_blocking = job_id.clone();
    let data_path = data.path.clone();
    let data_name = data.file_name.clone();
    let data_md5 = data.md5.clone();
    let mapping_path = mapping.path.clone();

    let handle = tokio::task::spawn_blocking(move || {
        process_blocking(
            tx,
            job_for_blocking,
            &data_path,
            &data_name,
            &data_md5,
            &mapping_path,
            append_mode,
            &db_path,
        )
    });

    let outcome = match handle.await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            jobs_state
                .jobs
                .write()
                .await
                .insert(job_id, JobStatus::Failed(e.clone()));
            data.discard();
            mapping.discard();
            return Err(ProcessError::Internal(format!("Failed to process file: {e}")));
        }
        Err(join_err) => {
            jobs_state
                .jobs
                .write()
                .await
                .insert(job_id, JobStatus::Failed(format!("join error: {join_err}")));
            data.discard();
            mapping.discard();
            return Err(ProcessError::Internal(format!("join error: {join_err}")));
        }
    };

    data.discard();
    mapping.discard();

    let message = format!(
        "File processed and {} the data store",
        if append_mode { "appended to" } else { "loaded into" }
    );
    jobs_state
        .jobs
        .write()
        .await
        .insert(job_id, JobStatus::Completed(message.clone()));

    Ok(ProcessFilesResponse {
        success: true,
        message,
        rows_processed: outcome.inserted,
        total_rows: outcome.total,
        duplicates_found: (outcome.duplicates > 0).then_some(outcome.duplicates),
    })
}

fn already_imported(db_path: &Path, md5: &str) -> Result<Option<u32>, String> {
    let conn = store::open(db_path).map_err(|e| e.to_string())?;
    match store::find_import(&conn, md5).map_err(|e| e.to_string())? {
        Some(_) => {
            let total = store::record_count(&conn).map_err(|e| e.to_string())?;
            Ok(Some(total))
        }
        None => Ok(None),
    }
}

struct ImportOutcome {
    inserted: u32,
    duplicates: u32,
    total: u32,
}

/// Runs on the blocking pool: parse, join, insert, recompute. Progress goes
/// to the job map between parse batches.
#[allow(clippy::too_many_arguments)]
fn process_blocking(
    tx: mpsc::Sender<JobUpdate>,
    job_id: String,
    data_path: &Path,
    data_name: &str,
    data_md5: &str,
    mapping_path: &Path,
    append_mode: bool,
    db_path: &Path,
) -> Result<ImportOutcome, String> {
    let mapping_reader =
        File::open(mapping_path).map_err(|e| format!("could not open mapping file: {e}"))?;
    let operators = OperatorTable::load(BufReader::new(mapping_reader))?;
    info!("loaded {} operator prefixes", operators.len());

    let data_reader =
        File::open(data_path).map_err(|e| format!("could not open data file: {e}"))?;
    let rows = txt::parse(BufReader::new(data_reader), |count| {
        let _ = tx.blocking_send(JobUpdate::new(job_id.clone(), JobStatus::InProgress(count)));
    })?;

    let records: Vec<NewRecord> = rows
        .into_iter()
        .map(|row| {
            let type_service = if row.type_service.is_empty() {
                default_service_type(&row.telephone).to_string()
            } else {
                row.type_service
            };
            NewRecord {
                operateur: operators.operator_or_unknown(&row.telephone).to_string(),
                statut: Statut::from_raw(&row.statut).label().to_string(),
                fa_statut: FaStatut::from_raw(&row.fa_statut).label().to_string(),
                date: txt::validate_date(&row.date).unwrap_or_default(),
                nombre_in: row.nombre_in,
                numero_in: row.telephone,
                type_service,
                region: row.region,
            }
        })
        .collect();

    let mut conn = store::open(db_path).map_err(|e| e.to_string())?;
    if !append_mode {
        store::purge_records(&conn).map_err(|e| e.to_string())?;
    }
    let summary = store::insert_records(&mut conn, &records).map_err(|e| e.to_string())?;
    store::recompute_percentages(&conn).map_err(|e| e.to_string())?;

    let created_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    store::record_import(&conn, data_name, data_md5, summary.inserted, &created_at)
        .map_err(|e| e.to_string())?;

    let total = store::record_count(&conn).map_err(|e| e.to_string())?;
    info!(
        "import of {data_name}: {} inserted, {} duplicates, {total} total",
        summary.inserted, summary.duplicates
    );

    Ok(ImportOutcome {
        inserted: summary.inserted,
        duplicates: summary.duplicates,
        total,
    })
}

/// Service class fallback when the dump has no TYPE_SERVICE column: French
/// mobile ranges start with 6 or 7.
fn default_service_type(phone: &str) -> &'static str {
    match phone.chars().next() {
        Some('6') | Some('7') => "Mobile",
        _ => "Fixe",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_type_defaults_by_range() {
        assert_eq!(default_service_type("601020304"), "Mobile");
        assert_eq!(default_service_type("700000001"), "Mobile");
        assert_eq!(default_service_type("140000000"), "Fixe");
        assert_eq!(default_service_type(""), "Fixe");
    }
}
