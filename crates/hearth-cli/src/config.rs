// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use hearth_app::search::{DEFAULT_BLUR_GRACE, DEFAULT_DEBOUNCE, DEFAULT_MAX_RESULTS, SearchConfig};
use hearth_app::validation::validate_email;
use hearth_app::wizard::DEFAULT_AUTOSAVE;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_API_TIMEOUT: &str = "5s";
const DEFAULT_LOG_LEVEL: &str = "info";
const MAX_SEARCH_RESULTS: usize = 50;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub search: Search,
    #[serde(default)]
    pub drafts: Drafts,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub log: Log,
    #[serde(default)]
    pub profile: Profile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            search: Search::default(),
            drafts: Drafts::default(),
            api: Api::default(),
            log: Log::default(),
            profile: Profile::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Search {
    pub debounce: Option<String>,
    pub blur_grace: Option<String>,
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Drafts {
    pub autosave: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Api {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Log {
    pub level: Option<String>,
}

/// Who is using this terminal. Without an email the family owner is assumed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    pub email: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("HEARTH_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set HEARTH_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(hearth_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version; add `version = 1` at the top",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            hearth_db::validate_db_path(db_path)?;
        }

        for (key, value) in [
            ("search.debounce", &self.search.debounce),
            ("search.blur_grace", &self.search.blur_grace),
            ("drafts.autosave", &self.drafts.autosave),
        ] {
            if let Some(raw) = value {
                parse_duration(raw).with_context(|| format!("{key} in {}", path.display()))?;
            }
        }

        if let Some(max_results) = self.search.max_results
            && !(1..=MAX_SEARCH_RESULTS).contains(&max_results)
        {
            bail!(
                "search.max_results in {} must be between 1 and {MAX_SEARCH_RESULTS}, got {max_results}",
                path.display()
            );
        }

        if let Some(autosave) = &self.drafts.autosave
            && parse_duration(autosave)? <= Duration::ZERO
        {
            bail!(
                "drafts.autosave in {} must be positive, got {autosave}",
                path.display()
            );
        }

        if let Some(timeout) = &self.api.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "api.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(base_url) = &self.api.base_url
            && base_url.trim().is_empty()
        {
            bail!(
                "api.base_url in {} is empty; remove it to use the local database",
                path.display()
            );
        }

        if let Some(level) = &self.log.level {
            EnvFilter::try_new(level).map_err(|error| {
                anyhow!(
                    "log.level {level:?} in {} is not a valid filter ({error}); use info, debug, or hearth_db=debug",
                    path.display()
                )
            })?;
        }

        if let Some(email) = &self.profile.email {
            validate_email(email).map_err(|_| {
                anyhow!(
                    "profile.email {email:?} in {} is not a valid address",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => hearth_db::default_db_path(),
        }
    }

    pub fn search_config(&self) -> Result<SearchConfig> {
        Ok(SearchConfig {
            debounce: optional_duration(self.search.debounce.as_deref(), DEFAULT_DEBOUNCE)?,
            blur_grace: optional_duration(self.search.blur_grace.as_deref(), DEFAULT_BLUR_GRACE)?,
            max_results: self.search.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        })
    }

    pub fn autosave(&self) -> Result<Duration> {
        optional_duration(self.drafts.autosave.as_deref(), DEFAULT_AUTOSAVE)
    }

    /// Remote API base URL; `None` means data lives in the local database.
    pub fn api_base_url(&self) -> Option<&str> {
        self.api
            .base_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or(DEFAULT_API_TIMEOUT))
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn profile_email(&self) -> Option<&str> {
        self.profile.email.as_deref()
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# hearth config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/hearth/hearth.db)\n# db_path = \"/absolute/path/to/hearth.db\"\n\n[search]\ndebounce = \"{}ms\"\nblur_grace = \"{}ms\"\nmax_results = {}\n\n[drafts]\nautosave = \"{}s\"\n\n[api]\n# Optional. When set, goals come from a hearth server instead of the local database.\n# base_url = \"https://hearth.example.com/api\"\ntimeout = \"{}\"\n\n[log]\n# Overridden by HEARTH_LOG.\nlevel = \"{}\"\n\n[profile]\n# Optional. Which family member you are; defaults to the owner.\n# email = \"you@example.com\"\n",
            path.display(),
            DEFAULT_DEBOUNCE.as_millis(),
            DEFAULT_BLUR_GRACE.as_millis(),
            DEFAULT_MAX_RESULTS,
            DEFAULT_AUTOSAVE.as_secs(),
            DEFAULT_API_TIMEOUT,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn optional_duration(raw: Option<&str>, default: Duration) -> Result<Duration> {
    raw.map_or(Ok(default), parse_duration)
}

pub fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 300ms or 1s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        let search = config.search_config()?;
        assert_eq!(search.debounce, Duration::from_millis(300));
        assert_eq!(search.blur_grace, Duration::from_millis(150));
        assert_eq!(config.autosave()?, Duration::from_secs(1));
        assert_eq!(config.api_base_url(), None);
        assert_eq!(config.log_level(), "info");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[search]\ndebounce = \"200ms\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        assert!(error.to_string().contains("version = 1"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[search]\ndebounce = \"200ms\"\nblur_grace = \"100ms\"\nmax_results = 5\n[drafts]\nautosave = \"2s\"\n[api]\nbase_url = \"http://localhost:8080/api//\"\ntimeout = \"3s\"\n[log]\nlevel = \"debug\"\n[profile]\nemail = \"sam@example.com\"\n",
        )?;

        let config = Config::load(&path)?;
        let search = config.search_config()?;
        assert_eq!(search.debounce, Duration::from_millis(200));
        assert_eq!(search.blur_grace, Duration::from_millis(100));
        assert_eq!(search.max_results, 5);
        assert_eq!(config.autosave()?, Duration::from_secs(2));
        assert_eq!(config.api_base_url(), Some("http://localhost:8080/api"));
        assert_eq!(config.api_timeout()?, Duration::from_secs(3));
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.profile_email(), Some("sam@example.com"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[search]\ndelay = \"1s\"\n")?;
        let error = Config::load(&path).expect_err("unknown key should fail");
        assert!(format!("{error:#}").contains("delay"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("HEARTH_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("HEARTH_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn db_path_prefers_storage_config_over_env_override() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[storage]\ndb_path = \"/explicit/from-config.db\"\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("HEARTH_DB_PATH", "/from/env.db");
        }
        let config = Config::load(&path)?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("HEARTH_DB_PATH");
        }
        assert_eq!(config.db_path()?, PathBuf::from("/explicit/from-config.db"));
        Ok(())
    }

    #[test]
    fn db_path_uses_env_override_when_storage_db_path_missing() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("HEARTH_DB_PATH", "/from/env-only.db");
        }
        let config = Config::load(&path)?;
        let resolved = config.db_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("HEARTH_DB_PATH");
        }
        assert_eq!(resolved, PathBuf::from("/from/env-only.db"));
        Ok(())
    }

    #[test]
    fn db_path_rejects_uri_style_storage_value() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[storage]\ndb_path = \"https://evil.example/hearth.db\"\n")?;
        let error = Config::load(&path).expect_err("URI db_path should fail validation");
        assert!(error.to_string().contains("looks like a URI"));
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        let error = parse_duration("oops").expect_err("invalid duration should fail");
        assert!(error.to_string().contains("invalid duration"));
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() -> Result<()> {
        for (content, expected) in [
            ("version = 1\n[api]\ntimeout = \"0s\"\n", "must be positive"),
            ("version = 1\n[drafts]\nautosave = \"0ms\"\n", "must be positive"),
            ("version = 1\n[search]\nmax_results = 0\n", "between 1 and"),
            ("version = 1\n[search]\ndebounce = \"soon\"\n", "search.debounce"),
            ("version = 1\n[api]\nbase_url = \"  \"\n", "is empty"),
            ("version = 1\n[profile]\nemail = \"nope\"\n", "not a valid address"),
        ] {
            let (_temp, path) = write_config(content)?;
            let error = Config::load(&path).expect_err("invalid config should fail");
            let message = format!("{error:#}");
            assert!(message.contains(expected), "{content}: {message}");
        }
        Ok(())
    }

    #[test]
    fn example_config_round_trips() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[search]"));
        assert!(example.contains("[drafts]"));
        std::fs::write(&path, &example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.search_config()?.max_results, 8);
        Ok(())
    }
}
