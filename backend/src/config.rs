use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Runtime settings for the server and the dataset tooling.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_dir: PathBuf,
    pub data_dir: PathBuf,
    pub xray_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub training_dir: PathBuf,
    pub frontend_dir: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub default_model: String,
    pub max_upload_bytes: usize,
    pub max_sessions: usize,
}

/// Optional overrides read from the YAML file named by `APP_CONFIG`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    xray_dir: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
    training_dir: Option<PathBuf>,
    frontend_dir: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    default_model: Option<String>,
    max_upload_bytes: Option<usize>,
    max_sessions: Option<usize>,
}

impl AppConfig {
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            data_dir: base_dir.join("data"),
            xray_dir: base_dir.join("radiografias"),
            temp_dir: base_dir.join("temp_uploads"),
            training_dir: base_dir.join("datos_entrenamiento"),
            frontend_dir: None,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            default_model: "EfficientNet".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_sessions: DEFAULT_MAX_SESSIONS,
            base_dir,
        }
    }

    /// Defaults, then the optional YAML file, then environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_dir = lookup("BASE_DIR")
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let mut config = Self::with_base_dir(base_dir);

        if let Some(path) = lookup("APP_CONFIG") {
            config.apply_file(Path::new(&path))?;
        }

        if let Some(dir) = lookup("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("XRAY_DIR") {
            config.xray_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("TEMP_DIR") {
            config.temp_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("TRAINING_DIR") {
            config.training_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("FRONTEND_DIR") {
            config.frontend_dir = Some(PathBuf::from(dir));
        }
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = parse_value("PORT", &port)?;
        }
        if let Some(model) = lookup("DEFAULT_MODEL") {
            config.default_model = model;
        }
        if let Some(max) = lookup("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse_value("MAX_UPLOAD_BYTES", &max)?;
        }
        if let Some(max) = lookup("MAX_SESSIONS") {
            config.max_sessions = parse_value("MAX_SESSIONS", &max)?;
        }

        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = serde_yaml::from_str(&raw)?;

        let base = self.base_dir.clone();
        let rebase = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };

        if let Some(dir) = file.data_dir {
            self.data_dir = rebase(dir);
        }
        if let Some(dir) = file.xray_dir {
            self.xray_dir = rebase(dir);
        }
        if let Some(dir) = file.temp_dir {
            self.temp_dir = rebase(dir);
        }
        if let Some(dir) = file.training_dir {
            self.training_dir = rebase(dir);
        }
        if let Some(dir) = file.frontend_dir {
            self.frontend_dir = Some(rebase(dir));
        }
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(model) = file.default_model {
            self.default_model = model;
        }
        if let Some(max) = file.max_upload_bytes {
            self.max_upload_bytes = max;
        }
        if let Some(max) = file.max_sessions {
            self.max_sessions = max;
        }
        Ok(())
    }

    pub fn images_dir(&self) -> PathBuf {
        self.xray_dir.join("images")
    }

    pub fn masks_dir(&self) -> PathBuf {
        self.xray_dir.join("masks")
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
