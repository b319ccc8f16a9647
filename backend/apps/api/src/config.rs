//! Server configuration
//!
//! A flat YAML document whose keys are the environment variable names.
//! The environment wins over the file, key by key.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail, ensure};
use clap::Parser;
use platform::password::{MAX_COST, MAX_PASSWORD_BYTES, MIN_COST, MIN_PASSWORD_LENGTH};
use platform::retry::RetryPolicy;
use secure::SecureConfig;
use secure::domain::value_object::{Login, Password};
use secure::infra::{BrokerOptions, PostgresOptions, RedisOptions};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

/// Shortest login token accepted at startup
pub const MIN_LOGIN_TOKEN_LENGTH: usize = 16;

const DEFAULT_METRICS_PORT: u16 = 9323;
const DEFAULT_METRICS_URL: &str = "/metrics";
const DEFAULT_BROKER_TOPIC: &str = "need-update-token";

#[derive(Debug, Parser)]
#[command(name = "secure-api", about = "Authentication, session and RBAC service")]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, env = "SECURE_CONFIG_PATH")]
    pub config: PathBuf,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Debug,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(Self::Local),
            "debug" => Ok(Self::Debug),
            "production" => Ok(Self::Production),
            other => bail!("ENV must be one of local, debug, production (got {other:?})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub address: SocketAddr,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub idle_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub port: u16,
    pub url: String,
}

/// Fully resolved configuration
#[derive(Debug)]
pub struct Config {
    pub instance: String,
    pub env: Environment,
    pub secure: SecureConfig,
    pub http: HttpConfig,
    pub database: PostgresOptions,
    /// `None` keeps the in-memory store inside the process
    pub redis: Option<RedisOptions>,
    /// `None` when the broker is turned off
    pub broker: Option<BrokerOptions>,
    pub metrics: MetricsConfig,
}

impl Config {
    /// Read the file at `path` and apply the process environment on top
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        let file = ConfigFile::parse(&contents, |key| std::env::var(key).ok())?;
        Self::from_file(file)
    }

    fn from_file(file: ConfigFile) -> Result<Self> {
        let env = required(file.env, "ENV")?;

        let defaults = SecureConfig::default();
        let secure = SecureConfig {
            root_login: required(file.root_login, "ROOT_LOGIN")?,
            root_password: required(file.root_pwd, "ROOT_PWD")?,
            salt: file.salt.map(String::into_bytes),
            login_token_length: required(file.login_token_length, "LoginTokenLength")?,
            password_creation_cost: required(file.password_creation_cost, "PasswordCreationCost")?,
            session_ttl: file.session_ttl.map_or(defaults.session_ttl, HumanDuration::get),
            permission_cache_ttl: file
                .permission_cache_ttl
                .map_or(defaults.permission_cache_ttl, HumanDuration::get),
            account_cache_ttl: file
                .account_cache_ttl
                .map_or(defaults.account_cache_ttl, HumanDuration::get),
            invalidation_payload: file
                .broker_invalidation_payload
                .unwrap_or(defaults.invalidation_payload),
        };

        let http = HttpConfig {
            address: required(file.address, "ADDRESS")?,
            read_timeout: required(file.read_timeout, "READ_TIMEOUT")?.get(),
            write_timeout: required(file.write_timeout, "WRITE_TIMEOUT")?.get(),
            idle_timeout: required(file.idle_timeout, "IDLE_TIMEOUT")?.get(),
            shutdown_timeout: required(file.shutdown_timeout, "SHUTDOWN_TIMEOUT")?.get(),
            request_timeout: required(file.request_timeout, "RequestTimeout")?.get(),
        };

        let database = PostgresOptions {
            login: required(file.database_login, "DATABASE_LOGIN")?,
            password: required(file.database_password, "DATABASE_PASSWORD")?,
            address: required(file.database_address, "DATABASE_ADDRESS")?,
            port: required(file.database_port, "DATABASE_PORT")?,
            name: required(file.database_name, "DATABASE_NAME")?,
            max_open_connections: required(
                file.database_max_open_connections,
                "DATABASE_MAX_OPEN_CONNECTIONS",
            )?,
            schema: file.database_schema,
            query_timeout: required(file.query_timeout, "QUERY_TIMEOUT")?.get(),
        };

        let redis = file.redis_address.map(|address| RedisOptions {
            address,
            user: file.redis_user,
            password: file.redis_password,
            db: file.redis_db.unwrap_or(0),
        });

        let use_broker = file.use_broker.or(file.use_kafka).unwrap_or(false);
        let broker = if use_broker {
            let retry_defaults = RetryPolicy::default();
            Some(BrokerOptions {
                address: required(file.broker_address, "BROKER_ADDRESS")?,
                topic: file
                    .broker_topic
                    .unwrap_or_else(|| DEFAULT_BROKER_TOPIC.to_string()),
                retry: RetryPolicy {
                    attempts: file.broker_retries.unwrap_or(retry_defaults.attempts),
                    attempt_timeout: file
                        .broker_write_timeout
                        .map_or(retry_defaults.attempt_timeout, HumanDuration::get),
                    between_attempts: file
                        .broker_time_between_attempts
                        .map_or(retry_defaults.between_attempts, HumanDuration::get),
                },
            })
        } else {
            None
        };

        let metrics = MetricsConfig {
            port: file.metrics_port.unwrap_or(DEFAULT_METRICS_PORT),
            url: file
                .metrics_url
                .unwrap_or_else(|| DEFAULT_METRICS_URL.to_string()),
        };

        let config = Self {
            instance: required(file.instance, "INSTANCE")?,
            env,
            secure,
            http,
            database,
            redis,
            broker,
            metrics,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.secure.login_token_length >= MIN_LOGIN_TOKEN_LENGTH,
            "LoginTokenLength must be at least {MIN_LOGIN_TOKEN_LENGTH}"
        );
        ensure!(
            (MIN_COST..=MAX_COST).contains(&self.secure.password_creation_cost),
            "PasswordCreationCost must be within {MIN_COST}..={MAX_COST}"
        );
        Login::new(self.secure.root_login.as_str()).context("ROOT_LOGIN")?;
        let pepper = self.secure.pepper().map_or(0, <[u8]>::len);
        ensure!(
            pepper <= MAX_PASSWORD_BYTES - MIN_PASSWORD_LENGTH,
            "SALT must be at most {} bytes",
            MAX_PASSWORD_BYTES - MIN_PASSWORD_LENGTH
        );
        Password::new(self.secure.root_password.as_str())
            .and_then(|root| root.fits_pepper(self.secure.pepper()))
            .context("ROOT_PWD")?;
        ensure!(
            self.database.max_open_connections >= 1,
            "DATABASE_MAX_OPEN_CONNECTIONS must be at least 1"
        );
        ensure!(
            self.metrics.url.starts_with('/'),
            "METRICS_URL must start with '/'"
        );
        if let Some(broker) = &self.broker {
            ensure!(broker.retry.attempts >= 1, "BROKER_RETRIES must be at least 1");
        }
        Ok(())
    }
}

fn required<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| anyhow!("{key} is required"))
}

/// The file as written; every key is optional here and checked when the
/// typed [`Config`] is built
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
struct ConfigFile {
    #[serde(deserialize_with = "scalar")]
    instance: Option<String>,
    #[serde(deserialize_with = "scalar")]
    env: Option<Environment>,
    #[serde(deserialize_with = "scalar")]
    use_broker: Option<bool>,
    #[serde(deserialize_with = "scalar")]
    use_kafka: Option<bool>,

    #[serde(deserialize_with = "scalar")]
    root_login: Option<String>,
    #[serde(deserialize_with = "scalar")]
    root_pwd: Option<String>,
    #[serde(deserialize_with = "scalar")]
    salt: Option<String>,
    #[serde(rename = "LoginTokenLength", deserialize_with = "scalar")]
    login_token_length: Option<usize>,
    #[serde(rename = "PasswordCreationCost", deserialize_with = "scalar")]
    password_creation_cost: Option<u32>,
    #[serde(deserialize_with = "scalar")]
    session_ttl: Option<HumanDuration>,
    #[serde(deserialize_with = "scalar")]
    permission_cache_ttl: Option<HumanDuration>,
    #[serde(deserialize_with = "scalar")]
    account_cache_ttl: Option<HumanDuration>,
    #[serde(deserialize_with = "scalar")]
    broker_invalidation_payload: Option<String>,

    #[serde(deserialize_with = "scalar")]
    address: Option<SocketAddr>,
    #[serde(deserialize_with = "scalar")]
    read_timeout: Option<HumanDuration>,
    #[serde(deserialize_with = "scalar")]
    write_timeout: Option<HumanDuration>,
    #[serde(deserialize_with = "scalar")]
    idle_timeout: Option<HumanDuration>,
    #[serde(deserialize_with = "scalar")]
    shutdown_timeout: Option<HumanDuration>,
    #[serde(rename = "RequestTimeout", deserialize_with = "scalar")]
    request_timeout: Option<HumanDuration>,

    #[serde(deserialize_with = "scalar")]
    database_login: Option<String>,
    #[serde(deserialize_with = "scalar")]
    database_password: Option<String>,
    #[serde(deserialize_with = "scalar")]
    database_address: Option<String>,
    #[serde(deserialize_with = "scalar")]
    database_port: Option<u16>,
    #[serde(deserialize_with = "scalar")]
    database_name: Option<String>,
    #[serde(deserialize_with = "scalar")]
    database_max_open_connections: Option<u32>,
    #[serde(rename = "DatabaseSchema", deserialize_with = "scalar")]
    database_schema: Option<String>,
    #[serde(deserialize_with = "scalar")]
    query_timeout: Option<HumanDuration>,

    #[serde(deserialize_with = "scalar")]
    redis_address: Option<String>,
    #[serde(deserialize_with = "scalar")]
    redis_user: Option<String>,
    #[serde(deserialize_with = "scalar")]
    redis_password: Option<String>,
    #[serde(deserialize_with = "scalar")]
    redis_db: Option<i64>,

    #[serde(deserialize_with = "scalar")]
    broker_address: Option<String>,
    #[serde(deserialize_with = "scalar")]
    broker_topic: Option<String>,
    #[serde(deserialize_with = "scalar")]
    broker_retries: Option<u32>,
    #[serde(deserialize_with = "scalar")]
    broker_write_timeout: Option<HumanDuration>,
    #[serde(deserialize_with = "scalar")]
    broker_time_between_attempts: Option<HumanDuration>,

    #[serde(deserialize_with = "scalar")]
    metrics_port: Option<u16>,
    #[serde(deserialize_with = "scalar")]
    metrics_url: Option<String>,
}

impl ConfigFile {
    /// Parse `contents`, replacing each key for which `lookup` has a value
    fn parse(contents: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut document: Mapping = serde_yaml::from_str::<Option<Mapping>>(contents)
            .context("parse config yaml")?
            .unwrap_or_default();
        for key in ENV_KEYS {
            if let Some(value) = lookup(key) {
                document.insert(Value::from(*key), Value::from(value));
            }
        }
        serde_yaml::from_value(Value::Mapping(document)).context("invalid config")
    }
}

/// Every key the environment may override
const ENV_KEYS: &[&str] = &[
    "INSTANCE",
    "ENV",
    "USE_BROKER",
    "USE_KAFKA",
    "ROOT_LOGIN",
    "ROOT_PWD",
    "SALT",
    "LoginTokenLength",
    "PasswordCreationCost",
    "SESSION_TTL",
    "PERMISSION_CACHE_TTL",
    "ACCOUNT_CACHE_TTL",
    "BROKER_INVALIDATION_PAYLOAD",
    "ADDRESS",
    "READ_TIMEOUT",
    "WRITE_TIMEOUT",
    "IDLE_TIMEOUT",
    "SHUTDOWN_TIMEOUT",
    "RequestTimeout",
    "DATABASE_LOGIN",
    "DATABASE_PASSWORD",
    "DATABASE_ADDRESS",
    "DATABASE_PORT",
    "DATABASE_NAME",
    "DATABASE_MAX_OPEN_CONNECTIONS",
    "DatabaseSchema",
    "QUERY_TIMEOUT",
    "REDIS_ADDRESS",
    "REDIS_USER",
    "REDIS_PASSWORD",
    "REDIS_DB",
    "BROKER_ADDRESS",
    "BROKER_TOPIC",
    "BROKER_RETRIES",
    "BROKER_WRITE_TIMEOUT",
    "BROKER_TIME_BETWEEN_ATTEMPTS",
    "METRICS_PORT",
    "METRICS_URL",
];

/// Read a scalar written natively in YAML or as a string (the environment
/// only has strings) and parse it; empty and null mean unset
fn scalar<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(None),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.is_empty() => return Ok(None),
        Value::String(s) => s,
        _ => return Err(de::Error::custom("expected a scalar")),
    };
    raw.parse()
        .map(Some)
        .map_err(|e| de::Error::custom(format!("invalid value {raw:?}: {e}")))
}

/// Duration written as `500ms`, `30s`, `5m`, `1h`, or bare seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HumanDuration(Duration);

impl HumanDuration {
    fn get(self) -> Duration {
        self.0
    }
}

impl FromStr for HumanDuration {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_duration(s).map(Self)
    }
}

pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    ensure!(!digits.is_empty(), "missing amount in {raw:?}");

    let amount: u64 = digits.parse().with_context(|| format!("bad amount in {raw:?}"))?;
    let seconds = |per_unit: u64| {
        amount
            .checked_mul(per_unit)
            .map(Duration::from_secs)
            .ok_or_else(|| anyhow!("duration {raw:?} is too large"))
    };
    match unit {
        "ms" => Ok(Duration::from_millis(amount)),
        "" | "s" => Ok(Duration::from_secs(amount)),
        "m" => seconds(60),
        "h" => seconds(3600),
        other => bail!("unknown duration unit {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
INSTANCE: secure-1
ENV: local
ROOT_LOGIN: root_admin
ROOT_PWD: Root_pass1
LoginTokenLength: 24
PasswordCreationCost: 10
ADDRESS: 0.0.0.0:8080
READ_TIMEOUT: 5s
WRITE_TIMEOUT: 10s
IDLE_TIMEOUT: 1m
SHUTDOWN_TIMEOUT: 10s
RequestTimeout: 2s
DATABASE_LOGIN: secure
DATABASE_PASSWORD: secret
DATABASE_ADDRESS: localhost
DATABASE_PORT: 5432
DATABASE_NAME: secure
DATABASE_MAX_OPEN_CONNECTIONS: 10
QUERY_TIMEOUT: 3s
REDIS_ADDRESS: localhost:6379
"#;

    fn load(overrides: &[(&str, &str)]) -> Result<Config> {
        let overrides: HashMap<String, String> = overrides
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let file = ConfigFile::parse(SAMPLE, |key| overrides.get(key).cloned())?;
        Config::from_file(file)
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("15").unwrap(), Duration::from_secs(15));
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("10d").is_err());
    }

    #[test]
    fn test_huge_duration_is_an_error() {
        let err = parse_duration(&format!("{}h", u64::MAX / 60)).unwrap_err();
        assert!(err.to_string().contains("too large"));
        assert_eq!(
            parse_duration(&format!("{}s", u64::MAX)).unwrap(),
            Duration::from_secs(u64::MAX)
        );
        assert!(load(&[("SESSION_TTL", "18446744073709551615m")]).is_err());
    }

    #[test]
    fn test_load_sample() {
        let config = load(&[]).unwrap();
        assert_eq!(config.instance, "secure-1");
        assert_eq!(config.env, Environment::Local);
        assert_eq!(config.secure.login_token_length, 24);
        assert_eq!(config.http.request_timeout, Duration::from_secs(2));
        assert_eq!(config.database.schema(), "public");
        assert_eq!(config.redis.as_ref().unwrap().db, 0);
        assert!(config.broker.is_none());
        assert_eq!(config.metrics.port, DEFAULT_METRICS_PORT);
        assert_eq!(config.metrics.url, "/metrics");
        assert_eq!(config.secure.session_ttl, Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_environment_overrides_file() {
        let config = load(&[
            ("ENV", "production"),
            ("LoginTokenLength", "32"),
            ("DatabaseSchema", "auth"),
            ("SESSION_TTL", "1h"),
        ])
        .unwrap();
        assert_eq!(config.env, Environment::Production);
        assert_eq!(config.secure.login_token_length, 32);
        assert_eq!(config.database.schema(), "auth");
        assert_eq!(config.secure.session_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_broker_section() {
        let config = load(&[
            ("USE_KAFKA", "true"),
            ("BROKER_ADDRESS", "redis://localhost:6379"),
            ("BROKER_RETRIES", "5"),
            ("BROKER_TIME_BETWEEN_ATTEMPTS", "200ms"),
        ])
        .unwrap();
        let broker = config.broker.unwrap();
        assert_eq!(broker.topic, DEFAULT_BROKER_TOPIC);
        assert_eq!(broker.retry.attempts, 5);
        assert_eq!(broker.retry.between_attempts, Duration::from_millis(200));

        let err = load(&[("USE_BROKER", "true")]).unwrap_err();
        assert!(err.to_string().contains("BROKER_ADDRESS"));
    }

    #[test]
    fn test_validation_failures() {
        assert!(load(&[("ENV", "staging")]).is_err());
        assert!(load(&[("LoginTokenLength", "8")]).is_err());
        assert!(load(&[("PasswordCreationCost", "32")]).is_err());
        assert!(load(&[("ROOT_PWD", "short")]).is_err());
        assert!(load(&[("DATABASE_MAX_OPEN_CONNECTIONS", "0")]).is_err());
        assert!(load(&[("DATABASE_PORT", "not-a-port")]).is_err());
    }

    #[test]
    fn test_missing_required_key() {
        let file = ConfigFile::parse("ENV: local\n", |_| None).unwrap();
        let err = Config::from_file(file).unwrap_err();
        assert!(err.to_string().contains("is required"));
    }

    #[test]
    fn test_nested_values_are_rejected() {
        assert!(ConfigFile::parse("ENV:\n  nested: true\n", |_| None).is_err());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(ConfigFile::parse("DATABASE_PROT: 5432\n", |_| None).is_err());
    }

    #[test]
    fn test_empty_value_means_unset() {
        let config = load(&[("SALT", ""), ("REDIS_ADDRESS", "")]).unwrap();
        assert!(config.secure.pepper().is_none());
        assert!(config.redis.is_none());
    }

    #[test]
    fn test_pepper_must_leave_room_for_passwords() {
        let salt = "s".repeat(MAX_PASSWORD_BYTES - MIN_PASSWORD_LENGTH + 1);
        let err = load(&[("SALT", salt.as_str())]).unwrap_err();
        assert!(err.to_string().contains("SALT"));

        // Root_pass1 is 10 bytes, so 63 pepper bytes push it past bcrypt's input
        let salt = "s".repeat(MAX_PASSWORD_BYTES - 9);
        let err = load(&[("SALT", salt.as_str())]).unwrap_err();
        assert!(err.to_string().contains("ROOT_PWD"));
    }
}
