use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use council_core::AppError;
use council_infrastructure::IssuerKeyFile;
use tracing_subscriber::EnvFilter;

const DEFAULT_ISSUER_KEY_FILES: &str =
    "gov-bot=bot-public.pem,single-endpoint=single-endpoint.pem";
const DEFAULT_OAUTH_IDENTITY_URL: &str = "https://discord.com/api/users/@me";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_host: String,
    pub api_port: u16,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub issuer_key_files: Vec<IssuerKeyFile>,
    pub oauth_identity_url: String,
    pub oauth_timeout: Duration,
    pub vote_sweep_interval: Duration,
    pub role_sweep_interval: Duration,
    pub replay_sweep_interval: Duration,
    pub successor_min_duration: chrono::Duration,
    pub cascade_max_depth: usize,
    pub event_channel_capacity: usize,
    pub cors_allowed_origin: Option<String>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_host = optional("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = match optional("API_PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|error| AppError::Validation(format!("invalid API_PORT: {error}")))?,
            None => 8080,
        };

        let issuer_key_files = IssuerKeyFile::parse_list(
            optional("ISSUER_KEY_FILES")
                .as_deref()
                .unwrap_or(DEFAULT_ISSUER_KEY_FILES),
        )?;

        let successor_min_seconds =
            positive_number(&optional, "SUCCESSOR_MIN_DURATION_SECONDS", 60)?;
        let successor_min_duration = i64::try_from(successor_min_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                AppError::Validation("SUCCESSOR_MIN_DURATION_SECONDS is too large".to_owned())
            })?;

        Ok(Self {
            api_host,
            api_port,
            database_url: optional("DATABASE_URL"),
            redis_url: optional("REDIS_URL"),
            issuer_key_files,
            oauth_identity_url: optional("OAUTH_IDENTITY_URL")
                .unwrap_or_else(|| DEFAULT_OAUTH_IDENTITY_URL.to_owned()),
            oauth_timeout: Duration::from_secs(positive_number(
                &optional,
                "OAUTH_TIMEOUT_SECONDS",
                5,
            )?),
            vote_sweep_interval: Duration::from_secs(positive_number(
                &optional,
                "VOTE_SWEEP_INTERVAL_SECONDS",
                60,
            )?),
            role_sweep_interval: Duration::from_secs(positive_number(
                &optional,
                "ROLE_SWEEP_INTERVAL_SECONDS",
                60,
            )?),
            replay_sweep_interval: Duration::from_secs(positive_number(
                &optional,
                "REPLAY_SWEEP_INTERVAL_SECONDS",
                60,
            )?),
            successor_min_duration,
            cascade_max_depth: positive_number(&optional, "CASCADE_MAX_DEPTH", 32)?,
            event_channel_capacity: positive_number(&optional, "EVENT_CHANNEL_CAPACITY", 256)?,
            cors_allowed_origin: optional("CORS_ALLOWED_ORIGIN"),
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Validation(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn positive_number<T>(
    optional: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let Some(value) = optional(name) else {
        return Ok(default);
    };

    let parsed = value
        .trim()
        .parse::<T>()
        .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))?;
    if parsed <= T::default() {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use council_core::AppError;

    use super::ApiConfig;

    fn load(pairs: &[(&str, &str)]) -> Result<ApiConfig, AppError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        ApiConfig::from_lookup(|name| values.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let Ok(config) = load(&[]) else {
            panic!("defaults should load");
        };

        assert_eq!(config.api_port, 8080);
        assert!(config.database_url.is_none());
        assert!(config.redis_url.is_none());
        assert_eq!(config.issuer_key_files.len(), 2);
        assert_eq!(config.oauth_timeout, Duration::from_secs(5));
        assert_eq!(config.vote_sweep_interval, Duration::from_secs(60));
        assert_eq!(config.successor_min_duration, chrono::Duration::seconds(60));
        assert_eq!(config.cascade_max_depth, 32);
        assert_eq!(config.event_channel_capacity, 256);
        assert!(config.socket_address().is_ok());
    }

    #[test]
    fn overrides_are_parsed() {
        let Ok(config) = load(&[
            ("API_PORT", "9000"),
            ("DATABASE_URL", "postgres://council@localhost/council"),
            ("ISSUER_KEY_FILES", "gov-bot=/keys/bot.pem"),
            ("ROLE_SWEEP_INTERVAL_SECONDS", "15"),
            ("CORS_ALLOWED_ORIGIN", "https://council.example"),
        ]) else {
            panic!("overrides should load");
        };

        assert_eq!(config.api_port, 9000);
        assert!(config.database_url.is_some());
        assert_eq!(config.issuer_key_files.len(), 1);
        assert_eq!(config.role_sweep_interval, Duration::from_secs(15));
        assert_eq!(
            config.cors_allowed_origin.as_deref(),
            Some("https://council.example")
        );
    }

    #[test]
    fn zero_or_garbage_numbers_are_rejected() {
        assert!(matches!(
            load(&[("VOTE_SWEEP_INTERVAL_SECONDS", "0")]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            load(&[("CASCADE_MAX_DEPTH", "deep")]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            load(&[("API_PORT", "70000")]),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let Ok(config) = load(&[("DATABASE_URL", "  "), ("EVENT_CHANNEL_CAPACITY", "")]) else {
            panic!("blank values should be ignored");
        };

        assert!(config.database_url.is_none());
        assert_eq!(config.event_channel_capacity, 256);
    }
}
