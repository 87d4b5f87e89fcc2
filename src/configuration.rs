use std::time::Duration;

use crate::error::ConfigError;

const MIN_SECRET_LENGTH: usize = 32;
const MIN_PASSWORD_COST: u32 = 4;
const MAX_PASSWORD_COST: u32 = 31;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub auth: AuthSettings,
    pub database: DatabaseSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    /// Server URL without a database, for creating one
    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Token and password settings, fixed at startup
#[derive(serde::Deserialize, Clone, Debug)]
pub struct AuthSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64, // seconds (900 = 15 minutes)
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry: i64, // seconds (604800 = 7 days)
    #[serde(default = "default_password_cost")]
    pub password_cost: u32,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

fn default_access_token_expiry() -> i64 {
    15 * 60
}

fn default_refresh_token_expiry() -> i64 {
    7 * 24 * 60 * 60
}

fn default_password_cost() -> u32 {
    14
}

fn default_issuer() -> String {
    "ember".to_string()
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

impl AuthSettings {
    /// Settings with default TTLs, cost and timeout for the given key pair.
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_token_expiry: default_access_token_expiry(),
            refresh_token_expiry: default_refresh_token_expiry(),
            password_cost: default_password_cost(),
            issuer: default_issuer(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Rejects settings the token core cannot safely run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, secret) in [
            ("auth.access_secret", &self.access_secret),
            ("auth.refresh_secret", &self.refresh_secret),
        ] {
            if secret.is_empty() {
                return Err(ConfigError::MissingRequired(name.to_string()));
            }
            if secret.len() < MIN_SECRET_LENGTH {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be at least {} bytes",
                    name, MIN_SECRET_LENGTH
                )));
            }
        }

        if self.access_secret == self.refresh_secret {
            return Err(ConfigError::InvalidValue(
                "access and refresh secrets must differ".to_string(),
            ));
        }

        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "token expiry must be positive".to_string(),
            ));
        }

        if !(MIN_PASSWORD_COST..=MAX_PASSWORD_COST).contains(&self.password_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "auth.password_cost must be within {}..={}",
                MIN_PASSWORD_COST, MAX_PASSWORD_COST
            )));
        }

        if self.store_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.store_timeout_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Loads settings from an optional `configuration` file, overridden by
/// `APP_`-prefixed environment variables (`APP_AUTH__ACCESS_SECRET`, ...).
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.auth.validate()?;
    Ok(settings)
}
