//! Configuration loading
//!
//! Settings come from a TOML file with environment overrides for secrets and
//! the log level. The file is optional; the database URL and bot token are
//! not.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use banlist_effects::RestGatewayConfig;
use banlist_sync::{EngineConfig, RuntimeConfig, SchedulerConfig};

/// Raw contents of `banlist.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// PostgreSQL connection string
    pub database_url: Option<String>,
    /// Bot token
    pub bot_token: Option<String>,
    /// Default tracing filter
    pub log_level: Option<String>,
    /// Database pool settings
    pub database: DatabaseSection,
    /// REST API settings
    pub api: ApiSection,
    /// Reconciliation and scheduling settings
    pub enforcement: EnforcementSection,
}

/// `[database]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSection {
    /// Pool size
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

/// `[api]`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSection {
    /// Override of the REST base URL
    pub base_url: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
    /// Retries after a rate-limit response
    pub max_rate_limit_retries: Option<u32>,
}

/// `[enforcement]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnforcementSection {
    /// Audit-log reason for every ban
    pub ban_reason: Option<String>,
    /// Pause after a successful ban, in milliseconds
    pub success_delay_ms: u64,
    /// Pause after a handled ban failure, in milliseconds
    pub failure_delay_ms: u64,
    /// Seconds between periodic fleet passes
    pub fleet_interval_secs: u64,
    /// Upper bound of the delay before each periodic pass, in seconds
    pub periodic_jitter_secs: u64,
    /// Upper bound of the delay before each guild in a pass, in seconds
    pub guild_jitter_secs: u64,
    /// Seconds between joined-guild polls; 0 disables polling
    pub join_poll_interval_secs: u64,
}

impl Default for EnforcementSection {
    fn default() -> Self {
        let engine = EngineConfig::default();
        let scheduler = SchedulerConfig::default();
        Self {
            ban_reason: None,
            success_delay_ms: millis(engine.success_delay),
            failure_delay_ms: millis(engine.failure_delay),
            fleet_interval_secs: scheduler.fleet_interval.as_secs(),
            periodic_jitter_secs: scheduler.periodic_jitter.as_secs(),
            guild_jitter_secs: scheduler.guild_jitter.as_secs(),
            join_poll_interval_secs: 5 * 60,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Fully resolved settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// PostgreSQL connection string
    pub database_url: String,
    /// Database pool size
    pub max_connections: u32,
    /// Tracing filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// REST gateway settings, including the token
    pub rest: RestGatewayConfig,
    /// Engine and scheduler settings
    pub runtime: RuntimeConfig,
}

impl FileConfig {
    /// Read `path`, or start from defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Parse TOML text.
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply process environment overrides and validate.
    pub fn resolve_from_env(self) -> Result<Settings> {
        self.resolve(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `env` and validate.
    ///
    /// `DATABASE_URL` and `LOG_LEVEL` replace their file values; the token is
    /// taken from `DISCORD_TOKEN`, then `DISCORD_BOT_TOKEN`, then the file.
    pub fn resolve(self, env: impl Fn(&str) -> Option<String>) -> Result<Settings> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let Some(database_url) = non_empty(env("DATABASE_URL")).or(non_empty(self.database_url))
        else {
            bail!("Missing database URL: set DATABASE_URL or `database_url` in the config file");
        };
        let Some(token) = non_empty(env("DISCORD_TOKEN"))
            .or_else(|| non_empty(env("DISCORD_BOT_TOKEN")))
            .or(non_empty(self.bot_token))
        else {
            bail!("Missing bot token: set DISCORD_TOKEN or `bot_token` in the config file");
        };
        let log_level = non_empty(env("LOG_LEVEL"))
            .or(non_empty(self.log_level))
            .unwrap_or_else(|| "info".to_string());

        let mut rest = RestGatewayConfig::new(token);
        if let Some(base_url) = self.api.base_url {
            rest.base_url = base_url;
        }
        if let Some(secs) = self.api.request_timeout_secs {
            rest.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = self.api.max_rate_limit_retries {
            rest.max_rate_limit_retries = retries;
        }

        let enforcement = self.enforcement;
        if enforcement.fleet_interval_secs == 0 {
            bail!("`fleet_interval_secs` must be greater than zero");
        }
        let mut engine = EngineConfig::default();
        if let Some(reason) = enforcement.ban_reason {
            engine.ban_reason = reason;
        }
        engine.success_delay = Duration::from_millis(enforcement.success_delay_ms);
        engine.failure_delay = Duration::from_millis(enforcement.failure_delay_ms);

        let scheduler = SchedulerConfig {
            fleet_interval: Duration::from_secs(enforcement.fleet_interval_secs),
            periodic_jitter: Duration::from_secs(enforcement.periodic_jitter_secs),
            guild_jitter: Duration::from_secs(enforcement.guild_jitter_secs),
            periodic_enabled: true,
        };
        let join_poll_interval = (enforcement.join_poll_interval_secs > 0)
            .then(|| Duration::from_secs(enforcement.join_poll_interval_secs));

        Ok(Settings {
            database_url,
            max_connections: self.database.max_connections,
            log_level,
            rest,
            runtime: RuntimeConfig {
                engine,
                scheduler,
                join_poll_interval,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn file_values_are_used_without_env() {
        let config = FileConfig::parse(
            r#"
            database_url = "postgres://localhost/banlist"
            bot_token = "file-token"
            log_level = "warn"

            [database]
            max_connections = 2

            [api]
            base_url = "http://localhost:8080"

            [enforcement]
            ban_reason = "Shared list"
            guild_jitter_secs = 1
            join_poll_interval_secs = 0
            "#,
        )
        .unwrap();

        let settings = config.resolve(env(&[])).unwrap();
        assert_eq!(settings.database_url, "postgres://localhost/banlist");
        assert_eq!(settings.rest.token, "file-token");
        assert_eq!(settings.rest.base_url, "http://localhost:8080");
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.max_connections, 2);
        assert_eq!(settings.runtime.engine.ban_reason, "Shared list");
        assert_eq!(settings.runtime.scheduler.guild_jitter, Duration::from_secs(1));
        assert_eq!(settings.runtime.join_poll_interval, None);
    }

    #[test]
    fn environment_overrides_file() {
        let config = FileConfig::parse(
            r#"
            database_url = "postgres://file"
            bot_token = "file-token"
            "#,
        )
        .unwrap();

        let settings = config
            .resolve(env(&[
                ("DATABASE_URL", "postgres://env"),
                ("DISCORD_BOT_TOKEN", "bot-token"),
                ("LOG_LEVEL", "debug"),
            ]))
            .unwrap();
        assert_eq!(settings.database_url, "postgres://env");
        assert_eq!(settings.rest.token, "bot-token");
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn discord_token_wins_over_bot_token() {
        let settings = FileConfig::default()
            .resolve(env(&[
                ("DATABASE_URL", "postgres://env"),
                ("DISCORD_TOKEN", "primary"),
                ("DISCORD_BOT_TOKEN", "secondary"),
            ]))
            .unwrap();
        assert_eq!(settings.rest.token, "primary");
    }

    #[test]
    fn defaults_follow_runtime_defaults() {
        let settings = FileConfig::default()
            .resolve(env(&[("DATABASE_URL", "postgres://env"), ("DISCORD_TOKEN", "t")]))
            .unwrap();
        assert_eq!(settings.runtime.engine, EngineConfig::default());
        assert_eq!(settings.runtime.scheduler, SchedulerConfig::default());
        assert_eq!(
            settings.runtime.join_poll_interval,
            Some(Duration::from_secs(300))
        );
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn missing_secrets_are_fatal() {
        let no_db = FileConfig::default()
            .resolve(env(&[("DISCORD_TOKEN", "t")]))
            .unwrap_err();
        assert!(no_db.to_string().contains("database URL"));

        let no_token = FileConfig::default()
            .resolve(env(&[("DATABASE_URL", "postgres://env"), ("DISCORD_TOKEN", " ")]))
            .unwrap_err();
        assert!(no_token.to_string().contains("bot token"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FileConfig::parse("databse_url = \"typo\"").is_err());
    }

    #[test]
    fn load_reads_file_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert_eq!(FileConfig::load(&missing).unwrap(), FileConfig::default());

        let path = dir.path().join("banlist.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "bot_token = \"from-disk\"").unwrap();
        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.bot_token.as_deref(), Some("from-disk"));
    }
}
