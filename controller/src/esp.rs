use core::convert::TryInto;
use std::{rc::Rc, thread, time::Duration};

use anyhow::{anyhow, bail, Context};
use atticfan_common::{
    ActuatorError, FanOutput, HumiditySensor, NetworkConfig, RuntimeConfig, SensorError,
    StatusPage,
};
use dht_sensor::dht22;
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_hal::{
    delay::Ets,
    gpio::{AnyIOPin, AnyOutputPin, IOPin, InputOutput, Output, OutputPin, PinDriver, Pull},
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    log::EspLogger,
    nvs::EspDefaultNvsPartition,
    sntp::EspSntp,
    wifi::{BlockingWifi, EspWifi},
};
use log::{info, warn};

use crate::{
    app::AppState,
    listener,
    scheduler::{self, Shutdown},
};

const FAN_PIN: u8 = 4;
const DHT22_PIN: u8 = 13;
const HEARTBEAT_ON_MS: u64 = 125;
const HEARTBEAT_OFF_MS: u64 = 2_000;
const WIFI_CONNECT_ATTEMPTS: u32 = 5;
const WIFI_RETRY_DELAY_MS: u64 = 2_000;
const EVENTFD_MAX_FDS: usize = 5;

struct Dht22Sensor {
    pin: PinDriver<'static, AnyIOPin, InputOutput>,
    delay: Ets,
}

impl Dht22Sensor {
    fn new(pin: AnyIOPin) -> anyhow::Result<Self> {
        let mut pin = PinDriver::input_output_od(pin)?;
        pin.set_pull(Pull::Up)?;
        pin.set_high()?;
        Ok(Self { pin, delay: Ets })
    }
}

impl HumiditySensor for Dht22Sensor {
    fn measure(&mut self) -> Result<(f32, f32), SensorError> {
        self.pin.set_high().map_err(|err| {
            SensorError::Unavailable(format!("failed to release DHT22 line: {err:?}"))
        })?;

        dht22::blocking::read(&mut self.delay, &mut self.pin)
            .map(|reading| (reading.temperature, reading.relative_humidity))
            .map_err(|err| {
                SensorError::Unavailable(format!("DHT22 on GPIO{DHT22_PIN}: {err:?}"))
            })
    }
}

struct RelayFan {
    pin: PinDriver<'static, AnyOutputPin, Output>,
}

impl FanOutput for RelayFan {
    fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        result.map_err(|err| ActuatorError::WriteFailed(format!("GPIO{FAN_PIN}: {err}")))
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();
    esp_idf_svc::io::vfs::initialize_eventfd(EVENTFD_MAX_FDS)
        .context("failed to initialize eventfd for tokio")?;

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let mut config = RuntimeConfig::default();
    ensure_wifi_defaults(&mut config.network);

    let Peripherals { modem, pins, .. } = Peripherals::take()?;
    let sensor = Dht22Sensor::new(pins.gpio13.downgrade())
        .context("failed to initialize DHT22")?;
    let fan = RelayFan {
        pin: PinDriver::output(pins.gpio4.downgrade_output())?,
    };
    let led = PinDriver::output(pins.gpio2.downgrade_output())?;

    let wifi = connect_wifi(modem, sys_loop, nvs_partition, &config.network)
        .context("wifi startup failed")?;
    let _sntp = EspSntp::new_default().context("failed to start SNTP")?;
    info!("SNTP initialized");

    let state = AppState::new(config, Box::new(sensor), Box::new(fan), Rc::new(StatusPage))?;

    let shutdown = scheduler::block_on(async move {
        let listener = listener::bind(&state.config.http)?;
        tokio::task::spawn_local(heartbeat(led));
        Ok::<_, anyhow::Error>(scheduler::run(state, listener, std::future::pending()).await)
    })??;

    // Keep the station up until the reset.
    let _wifi = wifi;

    match shutdown {
        Shutdown::Restart => {
            info!("restarting device");
            thread::sleep(Duration::from_millis(100));
            unsafe { esp_idf_svc::sys::esp_restart() }
        }
        Shutdown::Interrupted => bail!("scheduler stopped without a reset request"),
    }
}

async fn heartbeat(mut led: PinDriver<'static, AnyOutputPin, Output>) {
    loop {
        if let Err(err) = led.set_high() {
            warn!("failed to drive heartbeat LED: {err}");
        }
        tokio::time::sleep(Duration::from_millis(HEARTBEAT_ON_MS)).await;
        if let Err(err) = led.set_low() {
            warn!("failed to drive heartbeat LED: {err}");
        }
        tokio::time::sleep(Duration::from_millis(HEARTBEAT_OFF_MS)).await;
    }
}

fn ensure_wifi_defaults(network: &mut NetworkConfig) {
    if network.wifi_ssid.is_empty() {
        if let Some(ssid) = option_env!("WIFI_SSID") {
            network.wifi_ssid = ssid.to_string();
        }
    }

    if network.wifi_pass.is_empty() {
        if let Some(pass) = option_env!("WIFI_PASS") {
            network.wifi_pass = pass.to_string();
        }
    }
}

fn connect_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
    network: &NetworkConfig,
) -> anyhow::Result<EspWifi<'static>> {
    if network.wifi_ssid.is_empty() {
        bail!("wifi ssid missing; build with WIFI_SSID set");
    }

    let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
    let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sys_loop)?;

    let auth_method = if network.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("wifi started, connecting to `{}`", network.wifi_ssid);

    let mut last_err = None;
    for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
        info!("wifi connect attempt {attempt}/{WIFI_CONNECT_ATTEMPTS}");
        match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
            Ok(()) => {
                let ip = wifi.wifi().sta_netif().get_ip_info()?;
                info!("wifi connected, address {}", ip.ip);
                last_err = None;
                break;
            }
            Err(err) => {
                warn!("wifi connect failed on attempt {attempt}: {err:#}");
                last_err = Some(err);
            }
        }

        if attempt < WIFI_CONNECT_ATTEMPTS {
            let _ = wifi.disconnect();
            thread::sleep(Duration::from_millis(WIFI_RETRY_DELAY_MS));
        }
    }

    drop(wifi);
    match last_err {
        None => Ok(esp_wifi),
        Some(err) => Err(anyhow!(err).context(format!(
            "all {WIFI_CONNECT_ATTEMPTS} wifi connect attempts failed"
        ))),
    }
}
