use std::env;
use std::path::PathBuf;

/// Runtime configuration, read once from the environment at startup.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Config {
        let host = env::var("DASHBOARD_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("DASHBOARD_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);
        let data_dir = env::var("DASHBOARD_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        Config {
            host,
            port,
            data_dir,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("dashboard.sqlite")
    }

    /// Uploads are streamed here before processing and removed afterwards.
    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join("staging")
    }
}
