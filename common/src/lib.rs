pub mod config;
pub mod error;
pub mod fan;
pub mod http;
pub mod page;
pub mod sensor;
pub mod types;

pub use config::{FanConfig, HttpConfig, NetworkConfig, RuntimeConfig, SensorConfig};
pub use error::{ActuatorError, ConfigError, RequestError, SensorError};
pub use fan::{FanAction, FanController, FanOutput};
pub use http::{Command, PendingRequest, RequestHead, Response, StatusCode};
pub use page::{Render, StatusPage};
pub use sensor::{HumiditySensor, SensorCache};
pub use types::{ActuatorState, FanMode, FanStatus, SensorSample};
