use thiserror::Error;
use url::Url;

use parley_core::store::DEFAULT_PAGE_SIZE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        source: url::ParseError,
    },

    #[error("{var} must use {expected}, got {scheme}")]
    UnsupportedScheme {
        var: &'static str,
        expected: &'static str,
        scheme: String,
    },

    #[error("{var} must be a positive number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: Url,
    pub gateway_url: Url,
    pub page_size: u32,
    pub nim: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &'static str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let api_url = parse_url("PARLEY_API_URL", &require("PARLEY_API_URL")?)?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme {
                var: "PARLEY_API_URL",
                expected: "http or https",
                scheme: api_url.scheme().to_string(),
            });
        }

        let gateway_url = match get("PARLEY_GATEWAY_URL") {
            Some(raw) => {
                let url = parse_url("PARLEY_GATEWAY_URL", &raw)?;
                if !matches!(url.scheme(), "ws" | "wss") {
                    return Err(ConfigError::UnsupportedScheme {
                        var: "PARLEY_GATEWAY_URL",
                        expected: "ws or wss",
                        scheme: url.scheme().to_string(),
                    });
                }
                url
            }
            None => gateway_from_api(&api_url),
        };

        let page_size = match get("PARLEY_PAGE_SIZE") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or(ConfigError::InvalidNumber {
                    var: "PARLEY_PAGE_SIZE",
                    value: raw,
                })?,
            None => DEFAULT_PAGE_SIZE,
        };

        Ok(Self {
            api_url,
            gateway_url,
            page_size,
            nim: require("PARLEY_NIM")?,
            password: require("PARLEY_PASSWORD")?,
        })
    }
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { var, source })
}

/// Same host as the API, `ws`/`wss` scheme, `/gateway` path.
fn gateway_from_api(api_url: &Url) -> Url {
    let mut url = api_url.clone();
    let scheme = if api_url.scheme() == "https" { "wss" } else { "ws" };
    // http(s) -> ws(s) is always an allowed scheme change
    let _ = url.set_scheme(scheme);
    url.set_path("/gateway");
    url.set_query(None);
    url.set_fragment(None);
    url
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const BASE: [(&str, &str); 3] = [
        ("PARLEY_API_URL", "https://chat.example.com/api/"),
        ("PARLEY_NIM", "2301"),
        ("PARLEY_PASSWORD", "hunter2"),
    ];

    #[test]
    fn defaults_derive_gateway_and_page_size() {
        let config = Config::from_lookup(lookup(&BASE)).unwrap();
        assert_eq!(config.gateway_url.as_str(), "wss://chat.example.com/gateway");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.nim, "2301");
    }

    #[test]
    fn plain_http_maps_to_ws() {
        let config = Config::from_lookup(lookup(&[
            ("PARLEY_API_URL", "http://127.0.0.1:5000"),
            ("PARLEY_NIM", "1"),
            ("PARLEY_PASSWORD", "x"),
        ]))
        .unwrap();
        assert_eq!(config.gateway_url.as_str(), "ws://127.0.0.1:5000/gateway");
    }

    #[test]
    fn explicit_values_win() {
        let mut pairs = BASE.to_vec();
        pairs.push(("PARLEY_GATEWAY_URL", "wss://rt.example.com/socket"));
        pairs.push(("PARLEY_PAGE_SIZE", "50"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.gateway_url.as_str(), "wss://rt.example.com/socket");
        assert_eq!(config.page_size, 50);
    }

    #[test]
    fn missing_and_invalid_values() {
        let err = Config::from_lookup(lookup(&BASE[1..])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("PARLEY_API_URL")));

        let mut pairs = BASE.to_vec();
        pairs.push(("PARLEY_PAGE_SIZE", "0"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));

        let mut pairs = BASE.to_vec();
        pairs.push(("PARLEY_GATEWAY_URL", "https://rt.example.com"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme { .. }));

        let err = Config::from_lookup(lookup(&BASE[..2])).unwrap_err();
        assert_eq!(err.to_string(), "PARLEY_PASSWORD is not set");
    }
}
