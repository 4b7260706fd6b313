// src/config.rs
use std::net::SocketAddr;

use crate::error::ConfigError;

pub const BIND_ADDR_VAR: &str = "CHAT_BIND_ADDR";
pub const FORCE_CPU_VAR: &str = "CHAT_FORCE_CPU";

const DEFAULT_PORT: u16 = 8000;

pub const DEFAULT_LOG_FILTER: &str = "chatbot_api=info,tower_http=info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub force_cpu: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            force_cpu: false,
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = non_blank(lookup(BIND_ADDR_VAR)) {
            config.bind_addr = raw.parse().map_err(|_| ConfigError::InvalidAddr {
                var: BIND_ADDR_VAR,
                value: raw.clone(),
            })?;
        }

        if let Some(raw) = non_blank(lookup(FORCE_CPU_VAR)) {
            config.force_cpu = parse_bool(&raw).ok_or(ConfigError::InvalidBool {
                var: FORCE_CPU_VAR,
                value: raw.clone(),
            })?;
        }

        Ok(config)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind_addr.port(), 8000);
        assert!(!config.force_cpu);
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (BIND_ADDR_VAR, "127.0.0.1:3000"),
            (FORCE_CPU_VAR, "Yes"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:3000".parse().unwrap());
        assert!(config.force_cpu);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config =
            AppConfig::from_lookup(lookup_from(&[(BIND_ADDR_VAR, "  "), (FORCE_CPU_VAR, "")]))
                .unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        let err = AppConfig::from_lookup(lookup_from(&[(BIND_ADDR_VAR, "localhost")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddr { .. }));

        let err = AppConfig::from_lookup(lookup_from(&[(FORCE_CPU_VAR, "maybe")])).unwrap_err();
        assert!(err.to_string().contains(FORCE_CPU_VAR));
    }
}
