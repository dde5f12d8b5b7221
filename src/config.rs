use std::{env, path::PathBuf};

use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    pub port: u16,
    pub uploads_dir: PathBuf,
    /// Served for every unmatched GET when set, e.g. the built widget.
    pub static_dir: Option<PathBuf>,
    /// Answer 400 instead of the legacy 200 when no `image` part arrives.
    pub require_image_field: bool,
    pub log_json: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            uploads_dir: PathBuf::from(DEFAULT_UPLOADS_DIR),
            static_dir: None,
            require_image_field: false,
            log_json: false,
        }
    }
}

impl ReceiverConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "PORT",
                    value: raw.clone(),
                })?,
            None => defaults.port,
        };

        Ok(Self {
            port,
            uploads_dir: non_empty("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.uploads_dir),
            static_dir: non_empty("STATIC_DIR").map(PathBuf::from),
            require_image_field: parse_bool(
                "REQUIRE_IMAGE_FIELD",
                non_empty("REQUIRE_IMAGE_FIELD"),
                defaults.require_image_field,
            )?,
            log_json: parse_bool("LOG_JSON", non_empty("LOG_JSON"), defaults.log_json)?,
        })
    }
}

fn parse_bool(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Ok(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                name,
                value: v.clone(),
            }),
        },
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
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let cfg = ReceiverConfig::from_lookup(lookup_from(&[])).expect("config");
        assert_eq!(cfg, ReceiverConfig::default());
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.uploads_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = ReceiverConfig::from_lookup(lookup_from(&[
            ("PORT", "8080"),
            ("UPLOADS_DIR", "/tmp/up"),
            ("STATIC_DIR", "build"),
            ("REQUIRE_IMAGE_FIELD", "yes"),
            ("LOG_JSON", "1"),
        ]))
        .expect("config");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.uploads_dir, PathBuf::from("/tmp/up"));
        assert_eq!(cfg.static_dir, Some(PathBuf::from("build")));
        assert!(cfg.require_image_field);
        assert!(cfg.log_json);
    }

    #[test]
    fn blank_port_falls_back_to_default() {
        let cfg = ReceiverConfig::from_lookup(lookup_from(&[("PORT", "  ")])).expect("config");
        assert_eq!(cfg.port, DEFAULT_PORT);
    }

    #[test]
    fn unparsable_values_are_rejected() {
        let err = ReceiverConfig::from_lookup(lookup_from(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "PORT", .. }));

        let err = ReceiverConfig::from_lookup(lookup_from(&[("LOG_JSON", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "LOG_JSON", .. }));
    }
}
