use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validate::WorkdayRules;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub workday: WorkdayConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Validation thresholds. Holidays are kept as `YYYY-MM-DD` strings in the
/// file and parsed during validation.
#[derive(Clone, Debug)]
pub struct WorkdayConfig {
    pub standard_day_hours: u32,
    pub max_shift_hours: u32,
    pub break_threshold_hours: u32,
    pub min_break_minutes: u32,
    pub holidays: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://timecard.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            workday: WorkdayConfig {
                standard_day_hours: 8,
                max_shift_hours: 12,
                break_threshold_hours: 6,
                min_break_minutes: 30,
                holidays: Vec::new(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("timecard.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Thresholds as the validator consumes them. Call after `validate`;
    /// unparseable holiday dates are dropped here because validation has
    /// already rejected them.
    pub fn workday_rules(&self) -> WorkdayRules {
        WorkdayRules {
            standard_day_hours: self.workday.standard_day_hours,
            max_shift_hours: self.workday.max_shift_hours,
            break_threshold_hours: self.workday.break_threshold_hours,
            min_break_minutes: self.workday.min_break_minutes,
            holidays: self
                .workday
                .holidays
                .iter()
                .filter_map(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
                .collect(),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(workday) = patch.workday {
            if let Some(standard_day_hours) = workday.standard_day_hours {
                self.workday.standard_day_hours = standard_day_hours;
            }
            if let Some(max_shift_hours) = workday.max_shift_hours {
                self.workday.max_shift_hours = max_shift_hours;
            }
            if let Some(break_threshold_hours) = workday.break_threshold_hours {
                self.workday.break_threshold_hours = break_threshold_hours;
            }
            if let Some(min_break_minutes) = workday.min_break_minutes {
                self.workday.min_break_minutes = min_break_minutes;
            }
            if let Some(holidays) = workday.holidays {
                self.workday.holidays = holidays;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TIMECARD_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TIMECARD_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("TIMECARD_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TIMECARD_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("TIMECARD_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TIMECARD_WORKDAY_STANDARD_DAY_HOURS") {
            self.workday.standard_day_hours =
                parse_u32("TIMECARD_WORKDAY_STANDARD_DAY_HOURS", &value)?;
        }
        if let Some(value) = read_env("TIMECARD_WORKDAY_MAX_SHIFT_HOURS") {
            self.workday.max_shift_hours = parse_u32("TIMECARD_WORKDAY_MAX_SHIFT_HOURS", &value)?;
        }
        if let Some(value) = read_env("TIMECARD_WORKDAY_BREAK_THRESHOLD_HOURS") {
            self.workday.break_threshold_hours =
                parse_u32("TIMECARD_WORKDAY_BREAK_THRESHOLD_HOURS", &value)?;
        }
        if let Some(value) = read_env("TIMECARD_WORKDAY_MIN_BREAK_MINUTES") {
            self.workday.min_break_minutes =
                parse_u32("TIMECARD_WORKDAY_MIN_BREAK_MINUTES", &value)?;
        }
        if let Some(value) = read_env("TIMECARD_WORKDAY_HOLIDAYS") {
            self.workday.holidays =
                value.split(',').map(|date| date.trim().to_string()).collect();
        }

        let log_level =
            read_env("TIMECARD_LOGGING_LEVEL").or_else(|| read_env("TIMECARD_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TIMECARD_LOGGING_FORMAT").or_else(|| read_env("TIMECARD_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_workday(&self.workday)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("timecard.toml"), PathBuf::from("config/timecard.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_workday(workday: &WorkdayConfig) -> Result<(), ConfigError> {
    if workday.standard_day_hours == 0 || workday.standard_day_hours > 24 {
        return Err(ConfigError::Validation(
            "workday.standard_day_hours must be in range 1..=24".to_string(),
        ));
    }

    if workday.max_shift_hours < workday.standard_day_hours || workday.max_shift_hours > 24 {
        return Err(ConfigError::Validation(
            "workday.max_shift_hours must be in range standard_day_hours..=24".to_string(),
        ));
    }

    if workday.break_threshold_hours > workday.max_shift_hours {
        return Err(ConfigError::Validation(
            "workday.break_threshold_hours must not exceed max_shift_hours".to_string(),
        ));
    }

    for raw in &workday.holidays {
        if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_err() {
            return Err(ConfigError::Validation(format!(
                "workday.holidays entry `{raw}` is not a valid YYYY-MM-DD date"
            )));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    workday: Option<WorkdayPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkdayPatch {
    standard_day_hours: Option<u32>,
    max_shift_hours: Option<u32>,
    break_threshold_hours: Option<u32>,
    min_break_minutes: Option<u32>,
    holidays: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_cleanly() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;
        ensure(config.workday.max_shift_hours == 12, "default max shift should be 12h")?;
        ensure(config.workday.min_break_minutes == 30, "default minimum break should be 30min")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_TIMECARD_DB", "sqlite://interpolated.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("timecard.toml");
            fs::write(
                &path,
                r#"
[database]
url = "${TEST_TIMECARD_DB}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://interpolated.db",
                "database url should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_TIMECARD_DB"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TIMECARD_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("TIMECARD_WORKDAY_MAX_SHIFT_HOURS", "14");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("timecard.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[workday]
max_shift_hours = 10

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.workday.max_shift_hours == 14,
                "env max shift hours should win over file and defaults",
            )
        })();

        clear_vars(&["TIMECARD_DATABASE_URL", "TIMECARD_WORKDAY_MAX_SHIFT_HOURS"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TIMECARD_LOG_LEVEL", "warn");
        env::set_var("TIMECARD_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warn log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["TIMECARD_LOG_LEVEL", "TIMECARD_LOG_FORMAT"]);
        result
    }

    #[test]
    fn invalid_holiday_date_fails_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TIMECARD_WORKDAY_HOLIDAYS", "2026-12-25,not-a-date");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("not-a-date")
            );
            ensure(has_message, "validation failure should name the bad holiday entry")
        })();

        clear_vars(&["TIMECARD_WORKDAY_HOLIDAYS"]);
        result
    }

    #[test]
    fn workday_rules_parses_holiday_dates() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TIMECARD_WORKDAY_HOLIDAYS", "2026-12-25, 2026-01-01");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let rules = config.workday_rules();

            let christmas = NaiveDate::from_ymd_opt(2026, 12, 25)
                .ok_or_else(|| "invalid fixture date".to_string())?;
            ensure(rules.holidays.contains(&christmas), "holiday list should be parsed")?;
            ensure(rules.holidays.len() == 2, "both holiday entries should survive parsing")
        })();

        clear_vars(&["TIMECARD_WORKDAY_HOLIDAYS"]);
        result
    }

    #[test]
    fn max_shift_below_standard_day_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TIMECARD_WORKDAY_MAX_SHIFT_HOURS", "4");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("max_shift_hours")
            );
            ensure(has_message, "validation failure should mention max_shift_hours")
        })();

        clear_vars(&["TIMECARD_WORKDAY_MAX_SHIFT_HOURS"]);
        result
    }
}
