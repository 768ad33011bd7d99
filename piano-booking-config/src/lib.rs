use core::fmt::{Debug, Display};
use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "piano-booking.toml";
pub const ENV_PREFIX: &str = "PIANO_BOOKING_";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Base url of the booking backend, e.g. `https://booking.example.com`.
    pub base_url: String,
    /// One of `student`, `teacher`, `shop_owner` or `host_admin`.
    pub role: String,
    /// File holding the auth tokens and the last picked date.
    pub storage_path: PathBuf,
    pub request_timeout_secs: u64,
    /// Tag sent as `remark` with every booking request.
    pub booking_remark: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_owned(),
            role: "student".to_owned(),
            storage_path: PathBuf::from(".piano-booking-storage.json"),
            request_timeout_secs: 30,
            booking_remark: "student-booking".to_owned(),
        }
    }
}

#[derive(thiserror::Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Figment(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        Self::Figment(Box::new(value))
    }
}

impl Debug for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// Defaults, then `piano-booking.toml`, then `PIANO_BOOKING_*` environment variables.
#[must_use]
pub fn figment() -> Figment {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(CONFIG_FILE))
        .merge(Env::prefixed(ENV_PREFIX))
}

pub fn get_config() -> Result<Config, ConfigError> {
    Ok(figment().extract()?)
}
