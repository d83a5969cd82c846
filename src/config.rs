use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://www.strava.com";
pub const DEFAULT_ACTIVITY_TYPE: &str = "Windsurf";
pub const DEFAULT_EXPORT_PATH: &str = "docs/tracks.json";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
/// The provider serves at most this many activities per list page.
pub const MAX_PAGE_SIZE: u32 = 200;
const DEFAULT_PAGE_SIZE: u32 = MAX_PAGE_SIZE;

#[derive(Clone)]
pub struct StravaCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for StravaCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StravaCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub credentials: StravaCredentials,
    pub activity_type: String,
    pub export_path: PathBuf,
    pub api_base: String,
    pub bind_addr: SocketAddr,
    pub session_ttl: Duration,
    pub page_size: u32,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source. `from_env` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or(Error::MissingEnv(name))
        };
        let or_default = |name: &'static str, default: &str| {
            lookup(name).unwrap_or_else(|| default.to_string())
        };

        let credentials = StravaCredentials {
            client_id: required("STRAVA_API_CLIENT_ID")?,
            client_secret: required("STRAVA_API_SECRET")?,
        };

        Ok(Config {
            credentials,
            activity_type: or_default("STRAVA_ACTIVITY_TYPE", DEFAULT_ACTIVITY_TYPE),
            export_path: PathBuf::from(or_default("STRAVA_EXPORT_PATH", DEFAULT_EXPORT_PATH)),
            api_base: or_default("STRAVA_API_BASE", DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            bind_addr: parse("BIND_ADDR", or_default("BIND_ADDR", DEFAULT_BIND_ADDR))?,
            session_ttl: Duration::from_secs(parse(
                "SESSION_TTL_SECS",
                or_default("SESSION_TTL_SECS", &DEFAULT_SESSION_TTL_SECS.to_string()),
            )?),
            page_size: page_size(or_default(
                "STRAVA_PAGE_SIZE",
                &DEFAULT_PAGE_SIZE.to_string(),
            ))?,
        })
    }
}

fn page_size(value: String) -> Result<u32> {
    match parse::<u32>("STRAVA_PAGE_SIZE", value.clone())? {
        size @ 1..=MAX_PAGE_SIZE => Ok(size),
        _ => Err(Error::InvalidEnv {
            name: "STRAVA_PAGE_SIZE",
            value,
        }),
    }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidEnv { name, value })
}
