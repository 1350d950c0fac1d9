use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const SETTINGS_DIRECTORY_NAME: &str = "chatty";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const DATABASE_FILE_NAME: &str = "messages.db";
pub const ENV_PREFIX: &str = "CHATTY_";
/// Selects the non-durable in-memory store.
pub const MEMORY_DATABASE: &str = ":memory:";
pub const DEFAULT_LOG_FILTER: &str = "info";
pub const DEFAULT_VIEWPORT_ROWS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default = "default_viewport_rows")]
    pub viewport_rows: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: default_database(),
            log_filter: default_log_filter(),
            viewport_rows: default_viewport_rows(),
        }
    }
}

/// Where messages are kept, derived from [`Settings::database`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    Sqlite(String),
}

impl Settings {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".chatty"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Defaults, overlaid by the JSON file at `path`, overlaid by `CHATTY_*` variables.
    ///
    /// A file that fails to parse is logged and ignored.
    pub fn load(path: &Path) -> Self {
        let loaded = Self::extract(path);
        loaded.log_file_error(path);
        loaded.settings
    }

    /// Like [`Settings::load`] but hands back the file error instead of logging it,
    /// for callers that read settings before logging is installed.
    ///
    /// A broken file is skipped as a whole; environment overrides still apply.
    pub fn extract(path: &Path) -> LoadedSettings {
        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Json::file(path))
            .merge(env_provider());

        match figment.extract::<Settings>() {
            Ok(settings) => LoadedSettings {
                settings: settings.normalized(),
                file_error: None,
            },
            Err(file_error) => {
                let settings = Figment::from(Serialized::defaults(Settings::default()))
                    .merge(env_provider())
                    .extract::<Settings>()
                    .map(Settings::normalized)
                    .unwrap_or_default();
                LoadedSettings {
                    settings,
                    file_error: Some(file_error),
                }
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        self.database = self.database.trim().to_string();
        if self.database.is_empty() {
            self.database = default_database();
        }

        self.log_filter = self.log_filter.trim().to_string();
        if self.log_filter.is_empty() {
            self.log_filter = default_log_filter();
        }

        self.viewport_rows = self.viewport_rows.max(1);
        self
    }

    pub fn store_location(&self) -> StoreLocation {
        if self.database == MEMORY_DATABASE {
            StoreLocation::Memory
        } else {
            StoreLocation::Sqlite(self.database.clone())
        }
    }

    /// Writes the settings as pretty JSON through a temporary file and rename.
    pub fn persist(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(self).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: path.to_path_buf(),
        })?;

        tracing::info!("saved settings to {:?}", path);
        Ok(())
    }
}

/// Result of [`Settings::extract`].
#[derive(Debug)]
pub struct LoadedSettings {
    pub settings: Settings,
    /// Why the settings file was skipped, if it was.
    pub file_error: Option<figment::Error>,
}

impl LoadedSettings {
    pub fn log_file_error(&self, path: &Path) {
        if let Some(error) = &self.file_error {
            tracing::warn!(
                "failed to parse settings from {:?}: {}. using defaults and environment",
                path,
                error
            );
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).only(&["database", "log_filter", "viewport_rows"])
}

fn default_database() -> String {
    dirs::data_dir()
        .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
        .unwrap_or_else(|| PathBuf::from(".chatty"))
        .join(DATABASE_FILE_NAME)
        .display()
        .to_string()
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

fn default_viewport_rows() -> usize {
    DEFAULT_VIEWPORT_ROWS
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let settings = Settings::load(Path::new("absent.json"));
            assert_eq!(settings, Settings::default());
            Ok(())
        });
    }

    #[test]
    fn file_values_are_merged_and_normalized() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "settings.json",
                r#"{ "database": "  :memory:  ", "viewport_rows": 0 }"#,
            )?;

            let settings = Settings::load(Path::new("settings.json"));
            assert_eq!(settings.store_location(), StoreLocation::Memory);
            assert_eq!(settings.viewport_rows, 1);
            assert_eq!(settings.log_filter, DEFAULT_LOG_FILTER);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("settings.json", r#"{ "log_filter": "warn" }"#)?;
            jail.set_env("CHATTY_LOG_FILTER", "chatty=debug");
            jail.set_env("CHATTY_DATABASE", "chat/messages.db");

            let settings = Settings::load(Path::new("settings.json"));
            assert_eq!(settings.log_filter, "chatty=debug");
            assert_eq!(
                settings.store_location(),
                StoreLocation::Sqlite("chat/messages.db".to_string())
            );
            Ok(())
        });
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("settings.json", r#"{ "viewport_rows": "many" }"#)?;

            let loaded = Settings::extract(Path::new("settings.json"));
            assert!(loaded.file_error.is_some());
            assert_eq!(loaded.settings, Settings::default());
            Ok(())
        });
    }

    #[test]
    fn malformed_file_still_honors_environment() {
        Jail::expect_with(|jail| {
            jail.create_file("settings.json", r#"{ "viewport_rows": "many" }"#)?;
            jail.set_env("CHATTY_DATABASE", MEMORY_DATABASE);
            jail.set_env("CHATTY_VIEWPORT_ROWS", "9");

            let loaded = Settings::extract(Path::new("settings.json"));
            assert!(loaded.file_error.is_some());
            assert_eq!(loaded.settings.store_location(), StoreLocation::Memory);
            assert_eq!(loaded.settings.viewport_rows, 9);
            assert_eq!(Settings::load(Path::new("settings.json")), loaded.settings);
            Ok(())
        });
    }

    #[test]
    fn valid_file_reports_no_error() {
        Jail::expect_with(|jail| {
            jail.create_file("settings.json", r#"{ "viewport_rows": 12 }"#)?;

            let loaded = Settings::extract(Path::new("settings.json"));
            assert!(loaded.file_error.is_none());
            assert_eq!(loaded.settings.viewport_rows, 12);
            Ok(())
        });
    }

    #[test]
    fn persist_round_trips_through_load() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join("nested").join(SETTINGS_FILE_NAME);
            let settings = Settings {
                database: "chat.db".to_string(),
                log_filter: "debug".to_string(),
                viewport_rows: 7,
            };

            settings.persist(&path).expect("persist settings");
            assert!(!path.with_extension("json.tmp").exists());
            assert_eq!(Settings::load(&path), settings);
            Ok(())
        });
    }
}
