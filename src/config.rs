use crate::calendar::{
    validate_time_zone, BadRowPolicy, ConflictPolicy, GroupBy, GroupingOptions, ImportOptions, Platform,
};
use crate::feedback::DEFAULT_MARKER;
use crate::invites::DEFAULT_REMINDER_MINUTES;
use crate::services::auth::DEFAULT_AUTHORITY_URL;
use crate::services::graph::DEFAULT_GRAPH_URL;
use crate::services::{Credentials, RetryPolicy};
use crate::wait::WaitStrategy;
use directories::ProjectDirs;
use log::{debug, info};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CSV_PATH: &str = "meetings.csv";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable(s): {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("Failed to determine config directory")]
    NoConfigDir,
}

/// Non-secret settings read from `config.toml`. Every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub invite: InviteSettings,
    pub import: ImportSettings,
    pub feedback: FeedbackSettings,
    pub http: HttpSettings,
    pub wait: WaitSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InviteSettings {
    /// Zone for rows with an empty `TimeZone` column.
    pub time_zone: String,
    pub reminder_minutes: u32,
    pub group_by: GroupBy,
    /// Platform for rows with an empty `Platform` column; empty means none.
    pub default_platform: String,
}

impl Default for InviteSettings {
    fn default() -> Self {
        Self {
            time_zone: "UTC".to_string(),
            reminder_minutes: DEFAULT_REMINDER_MINUTES,
            group_by: GroupBy::default(),
            default_platform: "teams".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub on_bad_row: BadRowPolicy,
    pub on_conflict: ConflictPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackSettings {
    pub marker: String,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self { marker: DEFAULT_MARKER.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub list_retries: u32,
    pub retry_backoff_ms: u64,
    pub graph_url: String,
    pub authority_url: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            timeout_secs: 30,
            list_retries: retry.max_retries,
            retry_backoff_ms: retry.backoff.as_millis() as u64,
            graph_url: DEFAULT_GRAPH_URL.to_string(),
            authority_url: DEFAULT_AUTHORITY_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitMode {
    #[default]
    Fixed,
    Poll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSettings {
    pub mode: WaitMode,
    pub delay_secs: u64,
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self { mode: WaitMode::Fixed, delay_secs: 10, poll_interval_secs: 5, timeout_secs: 120 }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path()?, false),
        };

        if !explicit && !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read { path: path.clone(), source })?;
        let settings: Settings =
            toml::from_str(&content).map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
        settings.validate()?;

        info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_time_zone(&self.invite.time_zone)
            .map_err(|reason| ConfigError::Invalid { key: "invite.time_zone", reason })?;
        if let Some(Platform::Unsupported(name)) = Platform::parse(&self.invite.default_platform) {
            return Err(ConfigError::Invalid {
                key: "invite.default_platform",
                reason: format!("'{}' cannot host an online meeting; use teams, skype or an empty value", name),
            });
        }
        if self.feedback.marker.trim().is_empty() {
            return Err(ConfigError::Invalid { key: "feedback.marker", reason: "must not be empty".to_string() });
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid { key: "http.timeout_secs", reason: "must be positive".to_string() });
        }
        if self.wait.mode == WaitMode::Poll && self.wait.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "wait.poll_interval_secs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            default_time_zone: self.invite.time_zone.clone(),
            default_platform: Platform::parse(&self.invite.default_platform),
            on_bad_row: self.import.on_bad_row,
        }
    }

    pub fn grouping_options(&self) -> GroupingOptions {
        GroupingOptions {
            group_by: self.invite.group_by,
            on_conflict: self.import.on_conflict,
            on_bad_row: self.import.on_bad_row,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.http.list_retries,
            backoff: Duration::from_millis(self.http.retry_backoff_ms),
        }
    }

    pub fn wait_strategy(&self) -> WaitStrategy {
        match self.wait.mode {
            WaitMode::Fixed => WaitStrategy::Fixed(Duration::from_secs(self.wait.delay_secs)),
            WaitMode::Poll => WaitStrategy::Poll {
                interval: Duration::from_secs(self.wait.poll_interval_secs),
                timeout: Duration::from_secs(self.wait.timeout_secs),
            },
        }
    }
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let proj_dirs = ProjectDirs::from("com", "meetinvite", "meetinvite").ok_or(ConfigError::NoConfigDir)?;
    Ok(proj_dirs.config_dir().join("config.toml"))
}

/// Non-empty value of an environment variable.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Identity and mailbox for the calendar service.
#[derive(Debug)]
pub struct AccessConfig {
    pub credentials: Credentials,
    pub mailbox: String,
}

impl AccessConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Reads `CLIENT_ID`, `CLIENT_SECRET`, `TENANT_ID` and `EMAIL` through
    /// `lookup`, reporting every missing one at once.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut get = |name: &str| {
            let value = lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
            if value.is_none() {
                missing.push(name.to_string());
            }
            value.unwrap_or_default()
        };

        let client_id = get("CLIENT_ID");
        let client_secret = get("CLIENT_SECRET");
        let tenant_id = get("TENANT_ID");
        let mailbox = get("EMAIL");

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        Ok(Self {
            credentials: Credentials { tenant_id, client_id, client_secret: SecretString::from(client_secret) },
            mailbox,
        })
    }
}

/// Values that may come from a CLI flag.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub csv: Option<PathBuf>,
    pub marker: Option<String>,
}

/// Effective per-run inputs after applying CLI > environment > file > default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub csv_path: PathBuf,
    pub marker: String,
}

impl RunOptions {
    pub fn resolve(overrides: &Overrides, settings: &Settings, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let csv_path = overrides
            .csv
            .clone()
            .or_else(|| lookup("MEETINGS_CSV").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CSV_PATH));

        let marker = overrides
            .marker
            .clone()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| lookup("FEEDBACK_MARKER"))
            .unwrap_or_else(|| settings.feedback.marker.clone());

        Self { csv_path, marker }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.invite.time_zone, "UTC");
        assert_eq!(settings.invite.reminder_minutes, 30);
        assert_eq!(settings.invite.default_platform, "teams");
        assert_eq!(settings.import_options().default_platform, Some(Platform::Teams));
        assert_eq!(settings.feedback.marker, "review");
        assert_eq!(settings.http.timeout_secs, 30);
        assert_eq!(settings.wait_strategy(), WaitStrategy::Fixed(Duration::from_secs(10)));
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[invite]
time_zone = "Europe/Berlin"
group_by = "date"
default_platform = ""

[import]
on_bad_row = "skip"
on_conflict = "reject"

[wait]
mode = "poll"
poll_interval_secs = 2
"#,
        )?;

        let settings = Settings::load(Some(&path))?;
        assert_eq!(settings.invite.time_zone, "Europe/Berlin");
        assert_eq!(settings.invite.group_by, GroupBy::Date);
        assert_eq!(settings.invite.reminder_minutes, 30);
        assert_eq!(settings.import_options().default_platform, None);
        assert_eq!(settings.import.on_bad_row, BadRowPolicy::Skip);
        assert_eq!(settings.import.on_conflict, ConflictPolicy::Reject);
        assert_eq!(
            settings.wait_strategy(),
            WaitStrategy::Poll { interval: Duration::from_secs(2), timeout: Duration::from_secs(120) }
        );
        Ok(())
    }

    #[test]
    fn test_settings_save_load() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.feedback.marker = "retro".to_string();
        settings.http.list_retries = 5;
        settings.save(&path)?;

        assert_eq!(Settings::load(Some(&path))?, settings);
        Ok(())
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_invalid_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        fs::write(&path, "[invite]\ntime_zone = \"Mars/Olympus\"\n").unwrap();
        assert!(matches!(
            Settings::load(Some(&path)).unwrap_err(),
            ConfigError::Invalid { key: "invite.time_zone", .. }
        ));

        fs::write(&path, "[invite]\ndefault_platform = \"zoom\"\n").unwrap();
        assert!(matches!(
            Settings::load(Some(&path)).unwrap_err(),
            ConfigError::Invalid { key: "invite.default_platform", .. }
        ));

        fs::write(&path, "[http]\ntimeout_secs = \"soon\"\n").unwrap();
        assert!(matches!(Settings::load(Some(&path)).unwrap_err(), ConfigError::Parse { .. }));
    }

    #[test]
    fn test_access_config_reports_all_missing() {
        let err = AccessConfig::from_lookup(lookup_from(&[("CLIENT_ID", "id"), ("EMAIL", "  ")])).unwrap_err();
        match err {
            ConfigError::Missing(vars) => assert_eq!(vars, vec!["CLIENT_SECRET", "TENANT_ID", "EMAIL"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_access_config_complete() {
        let access = AccessConfig::from_lookup(lookup_from(&[
            ("CLIENT_ID", "id"),
            ("CLIENT_SECRET", "secret"),
            ("TENANT_ID", "tenant"),
            ("EMAIL", "organizer@x.com"),
        ]))
        .unwrap();
        assert_eq!(access.mailbox, "organizer@x.com");
        assert_eq!(access.credentials.tenant_id, "tenant");
        assert_eq!(access.credentials.client_secret.expose_secret(), "secret");
    }

    #[test]
    fn test_run_options_precedence() {
        let mut settings = Settings::default();
        settings.feedback.marker = "from-file".to_string();
        let env = lookup_from(&[("MEETINGS_CSV", "env.csv"), ("FEEDBACK_MARKER", "from-env")]);

        let cli = Overrides { csv: Some(PathBuf::from("cli.csv")), marker: Some("from-cli".to_string()) };
        assert_eq!(
            RunOptions::resolve(&cli, &settings, &env),
            RunOptions { csv_path: PathBuf::from("cli.csv"), marker: "from-cli".to_string() }
        );

        assert_eq!(
            RunOptions::resolve(&Overrides::default(), &settings, &env),
            RunOptions { csv_path: PathBuf::from("env.csv"), marker: "from-env".to_string() }
        );

        assert_eq!(
            RunOptions::resolve(&Overrides::default(), &settings, lookup_from(&[])),
            RunOptions { csv_path: PathBuf::from("meetings.csv"), marker: "from-file".to_string() }
        );
    }
}
