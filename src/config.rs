use std::path::PathBuf;
use std::str::FromStr;

use crate::engine::OnConflict;

/// Server settings, read once from `TIMETABLE_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub on_conflict: OnConflict,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5433,
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            password: "timetable".into(),
            max_connections: 256,
            compact_threshold: 1000,
            on_conflict: OnConflict::Block,
            tls_cert: None,
            tls_key: None,
            metrics_port: None,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("ignoring unparseable {key}={raw}");
                default
            }
        },
        None => default,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their default. An unknown
    /// conflict policy is an error, other unparseable numbers fall back.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let d = Config::default();
        let on_conflict = match lookup("TIMETABLE_ON_CONFLICT") {
            Some(raw) => raw.parse()?,
            None => d.on_conflict,
        };
        Ok(Self {
            port: parsed(&lookup, "TIMETABLE_PORT", d.port),
            bind: lookup("TIMETABLE_BIND").unwrap_or(d.bind),
            data_dir: lookup("TIMETABLE_DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            password: lookup("TIMETABLE_PASSWORD").unwrap_or(d.password),
            max_connections: parsed(&lookup, "TIMETABLE_MAX_CONNECTIONS", d.max_connections),
            compact_threshold: parsed(&lookup, "TIMETABLE_COMPACT_THRESHOLD", d.compact_threshold),
            on_conflict,
            tls_cert: lookup("TIMETABLE_TLS_CERT"),
            tls_key: lookup("TIMETABLE_TLS_KEY"),
            metrics_port: lookup("TIMETABLE_METRICS_PORT").and_then(|s| s.parse().ok()),
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let c = from_pairs(&[]).unwrap();
        assert_eq!(c.port, 5433);
        assert_eq!(c.listen_addr(), "0.0.0.0:5433");
        assert_eq!(c.on_conflict, OnConflict::Block);
        assert_eq!(c.compact_threshold, 1000);
        assert!(c.metrics_port.is_none());
    }

    #[test]
    fn reads_overrides() {
        let c = from_pairs(&[
            ("TIMETABLE_PORT", "6543"),
            ("TIMETABLE_ON_CONFLICT", "WARN"),
            ("TIMETABLE_DATA_DIR", "/var/lib/timetable"),
            ("TIMETABLE_METRICS_PORT", "9100"),
        ])
        .unwrap();
        assert_eq!(c.port, 6543);
        assert_eq!(c.on_conflict, OnConflict::Warn);
        assert_eq!(c.data_dir, PathBuf::from("/var/lib/timetable"));
        assert_eq!(c.metrics_port, Some(9100));
    }

    #[test]
    fn bad_number_falls_back() {
        let c = from_pairs(&[("TIMETABLE_MAX_CONNECTIONS", "lots")]).unwrap();
        assert_eq!(c.max_connections, 256);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(from_pairs(&[("TIMETABLE_ON_CONFLICT", "ignore")]).is_err());
    }
}
