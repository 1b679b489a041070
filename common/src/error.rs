use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// Transient bus or checksum failure reported by the physical sensor.
    #[error("sensor unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("empty request")]
    EmptyRequest,
    #[error("malformed request line: {0:?}")]
    MalformedRequest(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
    #[error("unknown config key {0}")]
    UnknownKey(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActuatorError {
    #[error("fan output write failed: {0}")]
    WriteFailed(String),
}
