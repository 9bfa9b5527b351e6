use async_trait::async_trait;
use clap::{Parser, Subcommand};
use common::model::notification::NotificationKind;
use env_logger::Env;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use importer::client::{BackendClient, SessionUploader};
use importer::notifications::{JsonFileStore, NewNotification, NotificationLog};
use importer::orchestrator::driver::{
    DecisionHandler, DriverConfig, FailureContext, ImportDriver, PartUpload, SkipOnFailure,
};
use importer::orchestrator::{Decision, SessionState};
use importer::session::SessionFlags;
use importer::splitter;

/// Files past this size get a split recommendation before import.
const SIZE_WARNING_BYTES: u64 = 1024 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "importer")]
#[command(about = "Operator security dashboard data importer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the processing backend
    #[arg(
        long,
        default_value = "http://localhost:8000",
        env = "DASHBOARD_BACKEND_URL"
    )]
    backend: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a TXT data file with its MAJNUM mapping CSV
    Import {
        data_file: PathBuf,
        mapping_file: PathBuf,
        /// Split the data file into this many parts (2-20)
        #[arg(long, conflicts_with = "split")]
        parts: Option<usize>,
        /// Split into a size-derived number of parts
        #[arg(long)]
        split: bool,
        /// Append to existing data instead of requiring an empty store
        #[arg(long)]
        append: bool,
        /// Never prompt: skip failed parts automatically
        #[arg(long)]
        yes: bool,
    },
    /// Show or manage the import history
    Notifications {
        #[command(subcommand)]
        action: Option<NotificationsAction>,
    },
    /// Snapshot the stored records into a named table
    LoadData { table_name: String },
    /// Delete every stored record
    Purge {
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Check that the backend is reachable
    Health,
}

#[derive(Subcommand)]
enum NotificationsAction {
    /// List the history, unread entries first marked with *
    List,
    /// Mark every entry as read
    MarkAllRead,
    /// Clear the whole history
    Purge,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::init_from_env(Env::default().default_filter_or(cli.log_level.clone()));

    match run(cli).await {
        Ok(code) => code,
        Err(message) => {
            eprintln!("Erreur: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, String> {
    match cli.command {
        Commands::Import {
            data_file,
            mapping_file,
            parts,
            split,
            append,
            yes,
        } => {
            run_import(
                &cli.backend,
                &data_file,
                &mapping_file,
                parts,
                split,
                append,
                yes,
            )
            .await
        }
        Commands::Notifications { action } => run_notifications(action),
        Commands::LoadData { table_name } => run_load_data(&cli.backend, &table_name).await,
        Commands::Purge { yes } => run_purge(&cli.backend, yes).await,
        Commands::Health => {
            let client = BackendClient::new(&cli.backend).map_err(|e| e.to_string())?;
            if client.health().await {
                println!("Backend disponible: {}", cli.backend);
                Ok(ExitCode::SUCCESS)
            } else {
                println!("Backend injoignable: {}", cli.backend);
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// Interactive failure prompt: retry / skip / finish with what succeeded.
struct PromptDecisions;

#[async_trait]
impl DecisionHandler for PromptDecisions {
    async fn decide(&mut self, context: &FailureContext<'_>) -> Decision {
        eprintln!();
        eprintln!(
            "La partie {}/{} ({}) n'a pas pu être traitée:",
            context.index + 1,
            context.total,
            context.part_name
        );
        eprintln!("  {}", context.message);

        loop {
            let mut options = Vec::new();
            if context.can_retry {
                options.push("[r]éessayer");
            }
            options.push("[i]gnorer cette partie");
            if context.can_complete {
                options.push("[t]erminer avec les parties réussies");
            }
            eprintln!("Choix: {}", options.join(" / "));

            let answer = read_line().await.to_lowercase();
            match answer.trim() {
                "r" if context.can_retry => return Decision::Retry,
                "i" | "s" => return Decision::Skip,
                "t" if context.can_complete => return Decision::CompleteNow,
                _ => eprintln!("Réponse non reconnue."),
            }
        }
    }
}

async fn read_line() -> String {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        line
    })
    .await
    .unwrap_or_default()
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[allow(clippy::too_many_arguments)]
async fn run_import(
    backend: &str,
    data_file: &Path,
    mapping_file: &Path,
    parts: Option<usize>,
    split: bool,
    append: bool,
    yes: bool,
) -> Result<ExitCode, String> {
    let flags = SessionFlags::default_location();
    if flags.take_just_loaded() {
        println!("Les données de la session précédente ont été chargées avec succès.");
    }

    // Validation errors are inline and non-fatal to the tool's contract:
    // nothing has been sent anywhere yet.
    let data_name = file_name_of(data_file);
    if !data_name.to_lowercase().ends_with(".txt") {
        return Err("veuillez sélectionner un fichier TXT pour les données".to_string());
    }
    let mapping_name = file_name_of(mapping_file);
    if !mapping_name.to_lowercase().ends_with(".csv") {
        return Err("veuillez sélectionner un fichier CSV pour la correspondance".to_string());
    }

    let data_size = std::fs::metadata(data_file)
        .map_err(|e| format!("fichier de données illisible: {e}"))?
        .len();

    let client = BackendClient::new(backend).map_err(|e| e.to_string())?;
    if !client.health().await {
        return Err(format!("le backend est injoignable ({backend})"));
    }

    let data_exists = client.check_data().await.map_err(|e| e.to_string())?;
    if data_exists && !append {
        return Err(
            "des données existent déjà; relancez avec --append ou purgez-les d'abord".to_string(),
        );
    }

    let splitting = split || parts.is_some();
    if data_size > SIZE_WARNING_BYTES && !splitting {
        warn!(
            "file is {:.2} GB; files over 1 GB are more reliable split into parts (--split)",
            data_size as f64 / SIZE_WARNING_BYTES as f64
        );
    }

    // Stage the parts: either real split output or the file as-is.
    let mut part_dir: Option<PathBuf> = None;
    let uploads: Vec<PartUpload> = if splitting {
        let out_dir =
            std::env::temp_dir().join(format!("operator-import-{}", uuid::Uuid::new_v4()));
        let split_parts =
            splitter::split_file(data_file, parts, &out_dir).map_err(|e| e.to_string())?;
        println!(
            "Fichier divisé en {} parties (en-tête préservé dans chaque partie).",
            split_parts.len()
        );
        part_dir = Some(out_dir);
        split_parts
            .into_iter()
            .map(|part| PartUpload {
                name: part.name,
                path: part.path,
            })
            .collect()
    } else {
        vec![PartUpload {
            name: data_name.clone(),
            path: data_file.to_path_buf(),
        }]
    };

    let log = NotificationLog::new(JsonFileStore::new(JsonFileStore::default_path()));
    let submitter = SessionUploader {
        client: &client,
        mapping_path: mapping_file,
        mapping_name: &mapping_name,
    };
    let decisions: Box<dyn DecisionHandler + Send> = if yes {
        Box::new(SkipOnFailure)
    } else {
        Box::new(PromptDecisions)
    };

    let mapping_for_hook = mapping_name.clone();
    let log_ref = &log;
    let mut driver = ImportDriver::new(submitter, decisions, DriverConfig::default()).on_success(
        Box::new(move |submission, response| {
            let kind = if submission.index == 0 && !append {
                NotificationKind::Upload
            } else {
                NotificationKind::Append
            };
            let entry = NewNotification {
                file_name: submission.part_name.clone(),
                mapping_file_name: mapping_for_hook.clone(),
                rows_processed: response.rows_processed,
                total_rows: response.total_rows,
                duplicates_found: response.duplicates_found,
                kind,
            };
            if let Err(e) = log_ref.add(entry) {
                warn!("could not record the notification: {e}");
            }
        }),
    );

    let session = driver.run(&uploads, append).await.map_err(|e| e.to_string())?;
    drop(driver);

    if let Some(dir) = part_dir {
        let _ = std::fs::remove_dir_all(dir);
    }

    // Results log, in submission order.
    println!();
    for result in session.results() {
        match &result.outcome {
            importer::orchestrator::PartOutcome::Success {
                rows_processed,
                total_rows,
            } => println!(
                "  ✓ {} (essai {}): {} lignes traitées, {} au total",
                result.part_name, result.attempt, rows_processed, total_rows
            ),
            importer::orchestrator::PartOutcome::Failure { message } => println!(
                "  ✗ {} (essai {}): {}",
                result.part_name, result.attempt, message
            ),
        }
    }

    let processed = session.processed_parts().len();
    let total = session.total_parts();
    match session.state() {
        SessionState::Completed => {
            println!("Traitement terminé: {processed}/{total} parties traitées.");
        }
        SessionState::ManuallyCompleted => {
            println!(
                "Traitement terminé avec les parties réussies: {processed}/{total} parties traitées."
            );
            if !session.skipped_parts().is_empty() {
                println!("Parties ignorées: {}", session.skipped_parts().join(", "));
            }
        }
        state => warn!("session ended in unexpected state {state:?}"),
    }

    if session.is_terminal() && processed > 0 {
        if let Err(e) = flags.set_just_loaded() {
            warn!("could not arm the session flag: {e}");
        }
        info!("import session finished with {processed}/{total} parts");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn run_notifications(action: Option<NotificationsAction>) -> Result<ExitCode, String> {
    let log = NotificationLog::new(JsonFileStore::new(JsonFileStore::default_path()));

    match action.unwrap_or(NotificationsAction::List) {
        NotificationsAction::List => {
            let notifications = log.notifications().map_err(|e| e.to_string())?;
            if notifications.is_empty() {
                println!("Aucune notification.");
                return Ok(ExitCode::SUCCESS);
            }
            for notification in &notifications {
                let marker = if notification.is_read { " " } else { "*" };
                let kind = match notification.kind {
                    NotificationKind::Upload => "chargement",
                    NotificationKind::Append => "ajout",
                    NotificationKind::Purge => "purge",
                };
                let duplicates = notification
                    .duplicates_found
                    .map(|d| format!(", {d} doublons"))
                    .unwrap_or_default();
                println!(
                    "{marker} [{}] {kind}: {} ({} / {} lignes{duplicates})",
                    format_timestamp(notification.timestamp),
                    notification.file_name,
                    notification.rows_processed,
                    notification.total_rows,
                );
            }
            let unread = log.unread_count().map_err(|e| e.to_string())?;
            println!("{unread} non lue(s).");
            Ok(ExitCode::SUCCESS)
        }
        NotificationsAction::MarkAllRead => {
            log.mark_all_read().map_err(|e| e.to_string())?;
            println!("Toutes les notifications ont été marquées comme lues.");
            Ok(ExitCode::SUCCESS)
        }
        NotificationsAction::Purge => {
            log.purge_all().map_err(|e| e.to_string())?;
            println!("L'historique des chargements a été effacé.");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn format_timestamp(millis: u64) -> String {
    chrono::DateTime::from_timestamp_millis(millis as i64)
        .map(|utc| {
            utc.with_timezone(&chrono::Local)
                .format("%d/%m/%Y %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| millis.to_string())
}

async fn run_load_data(backend: &str, table_name: &str) -> Result<ExitCode, String> {
    let client = BackendClient::new(backend).map_err(|e| e.to_string())?;
    let outcome = client.load_data(table_name).await.map_err(|e| e.to_string())?;
    println!("{}", outcome.message);
    if outcome.success {
        let _ = SessionFlags::default_location().set_just_loaded();
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn run_purge(backend: &str, yes: bool) -> Result<ExitCode, String> {
    if !yes {
        eprintln!(
            "Cette action supprimera définitivement toutes les données chargées. Continuer? [o/N]"
        );
        let answer = read_line().await;
        if !matches!(answer.trim().to_lowercase().as_str(), "o" | "oui" | "y") {
            println!("Purge annulée.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let client = BackendClient::new(backend).map_err(|e| e.to_string())?;
    let outcome = client.purge().await.map_err(|e| e.to_string())?;
    println!("{}", outcome.message);

    let log = NotificationLog::new(JsonFileStore::new(JsonFileStore::default_path()));
    let entry = NewNotification {
        file_name: "-".to_string(),
        mapping_file_name: "-".to_string(),
        rows_processed: 0,
        total_rows: 0,
        duplicates_found: None,
        kind: NotificationKind::Purge,
    };
    if let Err(e) = log.add(entry) {
        warn!("could not record the purge notification: {e}");
    }

    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
