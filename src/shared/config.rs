//! Application configuration. Paths, grading policy, storage backend.

use crate::domain::ExcusedPolicy;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable prefix: `ACADEMIC_RECORDS_DATA_DIR`, `ACADEMIC_RECORDS_STORAGE`, ...
pub const ENV_PREFIX: &str = "ACADEMIC_RECORDS";

/// Names an optional config file (TOML, JSON or YAML) layered over the environment.
pub const CONFIG_FILE_VAR: &str = "ACADEMIC_RECORDS_CONFIG";

pub const DEFAULT_DATA_DIR: &str = "./data";

/// Minimum final percentage for `COMPLETED`.
pub const DEFAULT_PASSING_THRESHOLD: Decimal = Decimal::from_parts(6000, 0, 0, false, 2);

/// Persistence adapter selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// libsql database `records.db` in the data directory.
    #[default]
    Sqlite,
    /// Single JSON document `records.json` in the data directory.
    Json,
}

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub data_dir: Option<String>,

    /// Finalize threshold in percent. Read from ACADEMIC_RECORDS_PASSING_THRESHOLD.
    #[serde(default)]
    pub passing_threshold: Option<Decimal>,

    /// `exclude` (default) or `count`. Read from ACADEMIC_RECORDS_EXCUSED_POLICY.
    #[serde(default)]
    pub excused_policy: Option<ExcusedPolicy>,

    /// Where CSV gradebooks and Markdown reports go. Defaults to `<data_dir>/reports`.
    #[serde(default)]
    pub reports_dir: Option<String>,

    /// `sqlite` (default) or `json`. Read from ACADEMIC_RECORDS_STORAGE.
    #[serde(default)]
    pub storage: Option<StorageBackend>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        Self::build(std::env::var(CONFIG_FILE_VAR).ok().as_deref())
    }

    /// Environment first, then the optional file on top.
    pub fn build(file: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix(ENV_PREFIX));
        if let Some(path) = file {
            c = c.add_source(config::File::with_name(path));
        }
        c.build()?.try_deserialize()
    }

    pub fn data_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR))
    }

    /// Returns the passing threshold. Defaults to 60.00 if unset.
    pub fn passing_threshold_or_default(&self) -> Decimal {
        self.passing_threshold.unwrap_or(DEFAULT_PASSING_THRESHOLD)
    }

    pub fn excused_policy_or_default(&self) -> ExcusedPolicy {
        self.excused_policy.unwrap_or_default()
    }

    /// Returns the reports directory. Defaults to `<data_dir>/reports`.
    pub fn reports_dir_or_default(&self) -> PathBuf {
        self.reports_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir_or_default().join("reports"))
    }

    pub fn storage_or_default(&self) -> StorageBackend {
        self.storage.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.data_dir_or_default(), PathBuf::from("./data"));
        assert_eq!(cfg.passing_threshold_or_default(), dec!(60.00));
        assert_eq!(cfg.excused_policy_or_default(), ExcusedPolicy::Exclude);
        assert_eq!(
            cfg.reports_dir_or_default(),
            PathBuf::from("./data").join("reports")
        );
        assert_eq!(cfg.storage_or_default(), StorageBackend::Sqlite);
    }

    #[test]
    fn reports_dir_follows_data_dir() {
        let cfg = AppConfig {
            data_dir: Some("/srv/records".into()),
            ..Default::default()
        };
        assert_eq!(
            cfg.reports_dir_or_default(),
            PathBuf::from("/srv/records/reports")
        );
    }

    #[test]
    fn file_source_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.toml");
        std::fs::write(
            &path,
            "data_dir = \"/var/lib/records\"\npassing_threshold = \"55.50\"\nexcused_policy = \"count\"\nstorage = \"json\"\n",
        )
        .unwrap();

        let cfg = AppConfig::build(path.to_str()).unwrap();
        assert_eq!(cfg.data_dir_or_default(), PathBuf::from("/var/lib/records"));
        assert_eq!(cfg.passing_threshold_or_default(), dec!(55.50));
        assert_eq!(cfg.excused_policy_or_default(), ExcusedPolicy::Count);
        assert_eq!(cfg.storage_or_default(), StorageBackend::Json);
    }
}
