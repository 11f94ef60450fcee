//! Configuration management for Goal Reacher.
//!
//! Configuration is read from environment variables:
//! - `HOST` / `PORT`: bind address (default `127.0.0.1:5000`)
//! - `DEV_MODE`: skip bearer verification and inject a fixed dev identity
//! - `OPENAI_API_KEY`: required unless `DEV_MODE` is set
//! - `OPENAI_API_URL`, `LLM_MODEL`, `LLM_MAX_TOKENS`: completion endpoint and limits
//! - `SUPABASE_URL` / `SUPABASE_SERVICE_ROLE_KEY`: persistence (in-memory
//!   store when both are absent in dev mode)
//! - `OAUTH_*`: identity provider endpoints and client credentials
//! - `CALENDAR_HORIZON_DAYS`: default `/api/load-data` window (1..=3660)
//! - `MAX_EXPANDED_OCCURRENCES`: start times one `/api/load-data` call may
//!   generate before it is refused
//! - `DEFAULT_UTC_OFFSET`: offset for schedule times that carry none

use chrono::FixedOffset;
use std::net::SocketAddr;
use thiserror::Error;

use crate::llm::OPENAI_API_URL;
use crate::planner::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};

pub const DEFAULT_AUTHORIZE_URL: &str = "https://id.nycu.edu.tw/o/authorize/";
pub const DEFAULT_TOKEN_URL: &str = "https://id.nycu.edu.tw/o/token/";
pub const DEFAULT_PROFILE_URL: &str = "https://id.nycu.edu.tw/api/profile";

pub const MAX_CALENDAR_HORIZON_DAYS: i64 = 3660;
pub const DEFAULT_MAX_EXPANDED_OCCURRENCES: usize = 50_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub dev_mode: bool,
    pub openai_api_key: Option<String>,
    pub openai_api_url: String,
    pub llm_model: String,
    pub llm_max_tokens: u64,
    /// `None` selects the in-memory store.
    pub supabase: Option<SupabaseConfig>,
    pub oauth: OAuthConfig,
    pub calendar_horizon_days: i64,
    pub max_expanded_occurrences: usize,
    pub default_utc_offset: FixedOffset,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let dev_mode = get("DEV_MODE")
            .map(|v| parse_bool("DEV_MODE", &v))
            .transpose()?
            .unwrap_or(false);

        let openai_api_key = get("OPENAI_API_KEY");
        if openai_api_key.is_none() && !dev_mode {
            return Err(ConfigError::Missing("OPENAI_API_KEY"));
        }

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_role_key)) => Some(SupabaseConfig {
                url,
                service_role_key,
            }),
            (None, None) if dev_mode => None,
            (None, _) => return Err(ConfigError::Missing("SUPABASE_URL")),
            (Some(_), None) => return Err(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY")),
        };

        let oauth = OAuthConfig {
            authorize_url: or("OAUTH_AUTHORIZE_URL", DEFAULT_AUTHORIZE_URL),
            token_url: or("OAUTH_TOKEN_URL", DEFAULT_TOKEN_URL),
            profile_url: or("OAUTH_PROFILE_URL", DEFAULT_PROFILE_URL),
            client_id: or("OAUTH_CLIENT_ID", ""),
            client_secret: or("OAUTH_CLIENT_SECRET", ""),
            redirect_uri: or("OAUTH_REDIRECT_URI", "http://127.0.0.1:5000/api/auth/callback"),
        };

        let calendar_horizon_days: i64 =
            parse_number("CALENDAR_HORIZON_DAYS", &or("CALENDAR_HORIZON_DAYS", "365"))?;
        if !(1..=MAX_CALENDAR_HORIZON_DAYS).contains(&calendar_horizon_days) {
            return Err(ConfigError::Invalid {
                name: "CALENDAR_HORIZON_DAYS",
                value: calendar_horizon_days.to_string(),
            });
        }

        let max_expanded_occurrences: usize = parse_number(
            "MAX_EXPANDED_OCCURRENCES",
            &or("MAX_EXPANDED_OCCURRENCES", &DEFAULT_MAX_EXPANDED_OCCURRENCES.to_string()),
        )?;
        if max_expanded_occurrences == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_EXPANDED_OCCURRENCES",
                value: "0".to_string(),
            });
        }

        let offset = or("DEFAULT_UTC_OFFSET", "+00:00");
        let default_utc_offset = offset.parse::<FixedOffset>().map_err(|_| ConfigError::Invalid {
            name: "DEFAULT_UTC_OFFSET",
            value: offset.clone(),
        })?;

        Ok(Self {
            host: or("HOST", "127.0.0.1"),
            port: parse_number("PORT", &or("PORT", "5000"))?,
            dev_mode,
            openai_api_key,
            openai_api_url: or("OPENAI_API_URL", OPENAI_API_URL),
            llm_model: or("LLM_MODEL", DEFAULT_MODEL),
            llm_max_tokens: parse_number("LLM_MAX_TOKENS", &or("LLM_MAX_TOKENS", &DEFAULT_MAX_TOKENS.to_string()))?,
            supabase,
            oauth,
            calendar_horizon_days,
            max_expanded_occurrences,
            default_utc_offset,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name: "HOST",
                value: self.host.clone(),
            })
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}
