use std::path::PathBuf;

use crate::logging::LogSettings;

#[derive(Clone)]
pub struct DatabaseConfig {
    /// Full connection URL; takes precedence over the individual parts.
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub name: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl DatabaseConfig {
    /// The SQLite URL to open: `url` when set, else a database file named after `name`.
    pub fn connect_url(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| format!("sqlite://{}.db", self.name))
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub name: String,
    pub path: PathBuf,
    pub labels: Option<PathBuf>,
}

/// Credentials of the channel scraper, passed through untouched.
#[derive(Clone)]
pub struct ScraperConfig {
    pub api_id: Option<String>,
    pub api_hash: Option<String>,
    pub phone_number: Option<String>,
    pub download_dir: PathBuf,
}

impl std::fmt::Debug for ScraperConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScraperConfig")
            .field("api_id", &self.api_id)
            .field("api_hash", &self.api_hash.as_ref().map(|_| "***"))
            .field("phone_number", &self.phone_number.as_ref().map(|_| "***"))
            .field("download_dir", &self.download_dir)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub model: ModelConfig,
    pub output_dir: PathBuf,
    pub transient_dir: PathBuf,
    pub scraper: ScraperConfig,
    pub log: LogSettings,
    pub server_addr: String,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        let model_name = get("MODEL_NAME").unwrap_or_else(|| "yolov5s".to_string());
        let model_path = get("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("models").join(format!("{model_name}.rten")));

        Self {
            database: DatabaseConfig {
                url: get("DATABASE_URL"),
                host: get("DB_HOST"),
                port: get("DB_PORT"),
                name: get("DB_NAME").unwrap_or_else(|| "detections".to_string()),
                user: get("DB_USER"),
                password: get("DB_PASSWORD"),
            },
            model: ModelConfig {
                name: model_name,
                path: model_path,
                labels: get("MODEL_LABELS").map(PathBuf::from),
            },
            output_dir: get("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("YOLO_output")),
            transient_dir: get("TRANSIENT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("runs").join("detect")),
            scraper: ScraperConfig {
                api_id: get("API_ID"),
                api_hash: get("API_HASH"),
                phone_number: get("PHONE_NUMBER"),
                download_dir: get("DOWNLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("downloads")),
            },
            log: LogSettings {
                level: get("LOG_LEVEL")
                    .or_else(|| get("RUST_LOG"))
                    .unwrap_or_else(|| "info".to_string()),
                file: get("LOG_FILE").map(PathBuf::from),
            },
            server_addr: get("SERVER_ADDR").unwrap_or_else(|| "127.0.0.1:8000".to_string()),
        }
    }
}
