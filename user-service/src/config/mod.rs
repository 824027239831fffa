use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct UserConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    /// Ordered oldest to newest; the dispatcher walks this list backwards.
    pub accepted_versions: Vec<String>,
    pub links: LinkConfig,
    pub gmail: GmailConfig,
    pub security: SecurityConfig,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret_key: String,
    pub issuer: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_hours: i64,
    pub reset_token_expiry_minutes: i64,
    pub invitation_token_expiry_hours: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret_key", &"[redacted]")
            .field("issuer", &self.issuer)
            .field("access_token_expiry_minutes", &self.access_token_expiry_minutes)
            .field("refresh_token_expiry_hours", &self.refresh_token_expiry_hours)
            .field("reset_token_expiry_minutes", &self.reset_token_expiry_minutes)
            .field(
                "invitation_token_expiry_hours",
                &self.invitation_token_expiry_hours,
            )
            .finish()
    }
}

/// Front-end pages that receive tokens as a `token` query parameter.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub signup_url: String,
    pub reset_password_url: String,
}

#[derive(Clone)]
pub struct GmailConfig {
    pub user: String,
    pub app_password: String,
    pub sender_name: String,
}

impl fmt::Debug for GmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GmailConfig")
            .field("user", &self.user)
            .field("app_password", &"[redacted]")
            .field("sender_name", &self.sender_name)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

const MIN_SECRET_LEN: usize = 32;

impl UserConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_str = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;
        let get = |key: &str, default: Option<&str>| get_env(&lookup, key, default, is_prod);

        let config = UserConfig {
            common,
            environment: environment.clone(),
            service_name: get("SERVICE_NAME", Some("user-service"))?,
            service_version: get("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")))?,
            log_level: get("LOG_LEVEL", Some("info"))?,
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|s| !s.trim().is_empty()),
            database: DatabaseConfig {
                url: get("DATABASE_URL", None)?,
                max_connections: parse_value(
                    "DATABASE_MAX_CONNECTIONS",
                    get("DATABASE_MAX_CONNECTIONS", Some("10"))?,
                )?,
                min_connections: parse_value(
                    "DATABASE_MIN_CONNECTIONS",
                    get("DATABASE_MIN_CONNECTIONS", Some("1"))?,
                )?,
            },
            jwt: JwtConfig {
                secret_key: get("JWT_SECRET_KEY", None)?,
                issuer: get("JWT_ISSUER", Some("plugmin_user"))?,
                access_token_expiry_minutes: parse_value(
                    "ACCESS_TOKEN_EXPIRY_MINUTES",
                    get("ACCESS_TOKEN_EXPIRY_MINUTES", Some("15"))?,
                )?,
                refresh_token_expiry_hours: parse_value(
                    "REFRESH_TOKEN_EXPIRY_HOURS",
                    get("REFRESH_TOKEN_EXPIRY_HOURS", Some("24"))?,
                )?,
                reset_token_expiry_minutes: parse_value(
                    "RESET_TOKEN_EXPIRY_MINUTES",
                    get("RESET_TOKEN_EXPIRY_MINUTES", Some("15"))?,
                )?,
                invitation_token_expiry_hours: parse_value(
                    "INVITATION_TOKEN_EXPIRY_HOURS",
                    get("INVITATION_TOKEN_EXPIRY_HOURS", Some("24"))?,
                )?,
            },
            accepted_versions: split_list(&get("ACCEPTED_VERSIONS", None)?),
            links: LinkConfig {
                signup_url: get("SIGNUP_URL", Some("http://localhost:3000/signup"))?,
                reset_password_url: get(
                    "RESET_PASSWORD_URL",
                    Some("http://localhost:3000/reset-password"),
                )?,
            },
            gmail: GmailConfig {
                user: get("GMAIL_USER", None)?,
                app_password: get("GMAIL_APP_PASSWORD", None)?,
                sender_name: get("GMAIL_SENDER_NAME", Some("Plugmin"))?,
            },
            security: SecurityConfig {
                allowed_origins: split_list(&get(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                )?),
            },
            request_timeout_seconds: parse_value(
                "REQUEST_TIMEOUT_SECONDS",
                get("REQUEST_TIMEOUT_SECONDS", Some("30"))?,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(config_error("PORT must be greater than 0"));
        }

        if self.jwt.secret_key.len() < MIN_SECRET_LEN {
            return Err(config_error("JWT_SECRET_KEY must be at least 32 bytes"));
        }

        if self.jwt.access_token_expiry_minutes <= 0
            || self.jwt.refresh_token_expiry_hours <= 0
            || self.jwt.reset_token_expiry_minutes <= 0
            || self.jwt.invitation_token_expiry_hours <= 0
        {
            return Err(config_error("Token expiries must be positive"));
        }

        if self.jwt.access_token_expiry_minutes >= self.jwt.refresh_token_expiry_hours * 60 {
            return Err(config_error(
                "Access token expiry must be shorter than refresh token expiry",
            ));
        }

        if self.accepted_versions.is_empty() {
            return Err(config_error("ACCEPTED_VERSIONS must list at least one version"));
        }

        if self.request_timeout_seconds == 0 {
            return Err(config_error("REQUEST_TIMEOUT_SECONDS must be positive"));
        }

        if self.environment == Environment::Prod
            && self.security.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(config_error(
                "Wildcard CORS origin not allowed in production",
            ));
        }

        Ok(())
    }
}

fn config_error(msg: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(msg.to_string()))
}

fn get_env<F>(lookup: &F, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_value<T>(key: &str, raw: String) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, e))
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
