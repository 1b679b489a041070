use std::{
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::Context;
use atticfan_common::{
    ActuatorError, FanOutput, HumiditySensor, RuntimeConfig, SensorError, StatusPage,
};
use tracing::{info, warn};

use crate::{
    app::AppState,
    listener,
    scheduler::{self, Shutdown},
};

const ENV_OVERRIDES: [&str; 3] = [
    "ATTICFAN_HTTP_PORT",
    "ATTICFAN_THRESHOLD",
    "ATTICFAN_BIND_ADDR",
];

/// Temperature walk used in place of a DHT22 on a workstation. Swings across
/// the default threshold so both transitions show up in the log.
#[derive(Debug, Default)]
struct SimulatedSensor {
    tick: u32,
}

impl HumiditySensor for SimulatedSensor {
    fn measure(&mut self) -> Result<(f32, f32), SensorError> {
        self.tick = self.tick.wrapping_add(1);
        if self.tick % 7 == 0 {
            return Err(SensorError::Unavailable("simulated bus timeout".to_string()));
        }

        let phase = (self.tick % 12) as f32;
        let swing = if phase < 6.0 { phase } else { 12.0 - phase };
        let temperature = 21.5 + swing;
        let humidity = 55.0 - swing * 1.5;
        Ok((temperature, humidity))
    }
}

#[derive(Debug, Default)]
struct LoggedFan;

impl FanOutput for LoggedFan {
    fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        info!("fan line {}", if on { "high" } else { "low" });
        Ok(())
    }
}

pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config();
    scheduler::block_on(serve(config))?
}

async fn serve(config: RuntimeConfig) -> anyhow::Result<()> {
    loop {
        let state = AppState::new(
            config.clone(),
            Box::new(SimulatedSensor::default()),
            Box::new(LoggedFan),
            Rc::new(StatusPage),
        )?;
        let listener = listener::bind(&config.http)?;
        info!("attic fan controller on http://{}", config.http.socket_addr());

        match scheduler::run(state, listener, interrupt()).await {
            Shutdown::Restart => info!("reset requested; rebuilding controller state"),
            Shutdown::Interrupted => {
                info!("closing all connections");
                return Ok(());
            }
        }
    }
}

async fn interrupt() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("ctrl-c handler unavailable: {err}");
        std::future::pending::<()>().await;
    }
}

fn load_config() -> RuntimeConfig {
    let mut config = match std::env::var_os("ATTICFAN_CONFIG").map(PathBuf::from) {
        Some(path) => read_config_file(&path).unwrap_or_else(|err| {
            warn!("failed to load config from {}: {err:#}", path.display());
            RuntimeConfig::default()
        }),
        None => RuntimeConfig::default(),
    };

    for key in ENV_OVERRIDES {
        if let Ok(value) = std::env::var(key) {
            if let Err(err) = config.apply_override(key, &value) {
                warn!("ignoring {key}: {err}");
            }
        }
    }
    config
}

fn read_config_file(path: &Path) -> anyhow::Result<RuntimeConfig> {
    let raw = std::fs::read(path).context("failed to read config file")?;
    RuntimeConfig::from_json(&raw).context("failed to parse config file")
}
