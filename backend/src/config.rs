use std::fmt;
use std::net::SocketAddr;

use shared::{PointRewardLevels, WheelConfig};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_PLAYBASIS_BASE_URL: &str = "https://api.pbapp.net";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub playbasis_base_url: String,
    pub wheel: WheelConfig,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value } => write!(f, "Invalid value for {}: '{}'", key, value),
            ConfigError::Invalid(msg) => write!(f, "Invalid wheel configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

fn parse<T: std::str::FromStr>(key: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value: raw })
}

fn parse_flag(key: &'static str, raw: String) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key, value: raw }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. Unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => parse("BIND_ADDR", raw)?,
            None => parse("BIND_ADDR", DEFAULT_BIND_ADDR.to_string())?,
        };
        let playbasis_base_url = get("PLAYBASIS_BASE_URL")
            .unwrap_or_else(|| DEFAULT_PLAYBASIS_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let mut wheel = WheelConfig {
            api_key: get("PB_API_KEY"),
            api_secret: get("PB_API_SECRET"),
            player_id: get("PB_PLAYER_ID"),
            ..WheelConfig::default()
        };
        if let Some(action) = get("PB_TARGET_ACTION") {
            wheel.target_action = action;
        }
        if let Some(tag) = get("PB_TARGET_TAG") {
            wheel.target_tag = tag;
        }
        if let Some(name) = get("PB_CUSTOM_PARAM_NAME") {
            wheel.custom_param_name = name;
        }
        if let Some(values) = get("PB_CUSTOM_PARAM_VALUES") {
            wheel.custom_param_values = split_list(&values);
        }
        if let Some(raw) = get("PB_TOTAL_SPIN_CHANCE") {
            wheel.total_spin_chance = parse("PB_TOTAL_SPIN_CHANCE", raw)?;
        }
        if let Some(raw) = get("PB_POINT_REWARD_LEVELS") {
            wheel.point_reward_levels = serde_json::from_str::<PointRewardLevels>(&raw)
                .map_err(|_| ConfigError::InvalidValue { key: "PB_POINT_REWARD_LEVELS", value: raw })?;
        }
        if let Some(raw) = get("PB_BASE_REVOLUTION_DEGREES") {
            wheel.base_revolution_degrees = parse("PB_BASE_REVOLUTION_DEGREES", raw)?;
        }
        if let Some(raw) = get("SHOW_DEBUG_LOG") {
            wheel.show_debug_log = parse_flag("SHOW_DEBUG_LOG", raw)?;
        }

        let wheel = wheel.validated().map_err(ConfigError::Invalid)?;

        Ok(Settings {
            bind_addr,
            playbasis_base_url,
            wheel,
        })
    }
}
