use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const MIN_THRESHOLD_C: i32 = 0;
pub const MAX_THRESHOLD_C: i32 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FanConfig {
    pub default_threshold_c: i32,
    pub control_period_ms: u64,
    pub control_yield_ms: u64,
    pub telemetry_every: u32,
}

impl Default for FanConfig {
    fn default() -> Self {
        Self {
            default_threshold_c: 24,
            control_period_ms: 15_000,
            control_yield_ms: 10,
            telemetry_every: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    pub read_interval_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            read_interval_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
    pub backlog: u32,
    pub max_header_lines: usize,
    pub accept_poll_ms: u64,
    pub idle_poll_ms: u64,
    pub read_timeout_ms: u64,
    pub max_connections: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 80,
            backlog: 5,
            max_header_lines: 50,
            accept_poll_ms: 1,
            idle_poll_ms: 100,
            read_timeout_ms: 5_000,
            max_connections: 8,
        }
    }
}

impl HttpConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub fan: FanConfig,
    pub sensor: SensorConfig,
    pub http: HttpConfig,
    pub network: NetworkConfig,
}

impl RuntimeConfig {
    pub fn from_json(raw: &[u8]) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_slice(raw)?;
        config.sanitize();
        Ok(config)
    }

    /// Applies a single `KEY=value` style override, as read from the environment.
    pub fn apply_override(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "ATTICFAN_HTTP_PORT" => {
                self.http.port = value.trim().parse().map_err(|_| invalid())?;
            }
            "ATTICFAN_THRESHOLD" => {
                self.fan.default_threshold_c = value.trim().parse().map_err(|_| invalid())?;
            }
            "ATTICFAN_BIND_ADDR" => {
                if value.trim().is_empty() {
                    return Err(invalid());
                }
                self.http.bind_addr = value.trim().to_string();
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }

        self.sanitize();
        Ok(())
    }

    pub fn sanitize(&mut self) {
        self.fan.default_threshold_c = self
            .fan
            .default_threshold_c
            .clamp(MIN_THRESHOLD_C, MAX_THRESHOLD_C);
        self.fan.control_period_ms = self.fan.control_period_ms.max(1);
        self.fan.control_yield_ms = self.fan.control_yield_ms.max(1);
        self.fan.telemetry_every = self.fan.telemetry_every.max(1);

        self.sensor.read_interval_ms = self.sensor.read_interval_ms.max(1);

        self.http.backlog = self.http.backlog.max(1);
        self.http.max_header_lines = self.http.max_header_lines.max(1);
        self.http.accept_poll_ms = self.http.accept_poll_ms.max(1);
        self.http.idle_poll_ms = self.http.idle_poll_ms.max(1);
        self.http.read_timeout_ms = self.http.read_timeout_ms.max(1);
        self.http.max_connections = self.http.max_connections.max(1);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_match_device_constants() {
        let config = RuntimeConfig::default();

        assert_eq!(config.fan.default_threshold_c, 24);
        assert_eq!(config.fan.control_period_ms, 15_000);
        assert_eq!(config.fan.telemetry_every, 4);
        assert_eq!(config.sensor.read_interval_ms, 60_000);
        assert_eq!(config.http.port, 80);
        assert_eq!(config.http.backlog, 5);
        assert_eq!(config.http.max_header_lines, 50);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            RuntimeConfig::from_json(br#"{"http":{"port":8080},"fan":{"default_threshold_c":30}}"#)
                .unwrap();

        assert_eq!(config.http.port, 8080);
        assert_eq!(config.http.backlog, 5);
        assert_eq!(config.fan.default_threshold_c, 30);
        assert_eq!(config.sensor, SensorConfig::default());
    }

    #[test]
    fn invalid_json_is_reported() {
        assert!(matches!(
            RuntimeConfig::from_json(b"{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let mut config = RuntimeConfig::default();
        config.fan.default_threshold_c = 500;
        config.fan.telemetry_every = 0;
        config.http.max_header_lines = 0;
        config.http.max_connections = 0;
        config.sanitize();

        assert_eq!(config.fan.default_threshold_c, MAX_THRESHOLD_C);
        assert_eq!(config.fan.telemetry_every, 1);
        assert_eq!(config.http.max_header_lines, 1);
        assert_eq!(config.http.max_connections, 1);
    }

    #[test]
    fn env_overrides_are_validated() {
        let mut config = RuntimeConfig::default();

        config.apply_override("ATTICFAN_HTTP_PORT", "8080").unwrap();
        config.apply_override("ATTICFAN_THRESHOLD", " 21 ").unwrap();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.fan.default_threshold_c, 21);
        assert_eq!(config.http.socket_addr(), "0.0.0.0:8080");

        assert!(matches!(
            config.apply_override("ATTICFAN_HTTP_PORT", "http"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.apply_override("ATTICFAN_COLOR", "blue"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert_eq!(config.http.port, 8080);
    }
}
