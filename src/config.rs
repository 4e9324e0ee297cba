use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub reference_directory: Option<PathBuf>,
    pub candidate_directory: Option<PathBuf>,
    pub media_directory: Option<PathBuf>,
    pub processed_directory: Option<PathBuf>,
    pub num_workers: usize,
    pub log_level: String,
    pub exiftool_path: String,
    pub ffmpeg_path: String,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(Path::new("config"))
    }

    /// Layers `default`, `{RUN_MODE}` and `local` files from `dir`, then
    /// `RECONCILER_*` environment variables, over built-in defaults.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let env = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let source = |name: &str| File::from(dir.join(name)).required(false);

        let s = Config::builder()
            .set_default("num_workers", 8_i64)?
            .set_default("log_level", "info")?
            .set_default("exiftool_path", "exiftool")?
            .set_default("ffmpeg_path", "ffmpeg")?
            .add_source(source("default"))
            .add_source(source(&env))
            .add_source(source("local"))
            .add_source(Environment::with_prefix("RECONCILER"))
            .build()?;

        s.try_deserialize()
    }
}
