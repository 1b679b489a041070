use log::{debug, error, warn};

use crate::{error::SensorError, types::SensorSample};

/// A physical temperature/humidity probe. Returns `(celsius, relative humidity)`.
pub trait HumiditySensor {
    fn measure(&mut self) -> Result<(f32, f32), SensorError>;
}

impl<T: HumiditySensor + ?Sized> HumiditySensor for Box<T> {
    fn measure(&mut self) -> Result<(f32, f32), SensorError> {
        (**self).measure()
    }
}

/// Rate-limited front for the sensor. Every reader goes through here so the
/// physical device is never polled faster than `read_interval_ms`.
#[derive(Debug)]
pub struct SensorCache<S> {
    sensor: S,
    read_interval_ms: u64,
    next_read_ms: Option<u64>,
    sample: SensorSample,
}

impl<S: HumiditySensor> SensorCache<S> {
    pub fn new(mut sensor: S, read_interval_ms: u64) -> Self {
        // Some probes (DHT22) return garbage on their very first conversion.
        if let Err(err) = sensor.measure() {
            debug!("sensor warm-up read failed: {err}");
        }

        Self {
            sensor,
            read_interval_ms,
            next_read_ms: None,
            sample: SensorSample::default(),
        }
    }

    /// Cached accessor. Never fails: a failed acquisition serves the last sample.
    pub fn read(&mut self, now_ms: u64) -> SensorSample {
        match self.try_read(now_ms) {
            Ok(sample) => sample,
            Err(_) => {
                warn!(
                    "serving stale sample from {} ms (temp {:.2}, humidity {:.2})",
                    self.sample.sampled_at_ms, self.sample.temperature, self.sample.humidity
                );
                self.sample
            }
        }
    }

    /// Gated acquisition that surfaces hardware failures. Inside the interval
    /// this returns the stored sample without touching the sensor.
    pub fn try_read(&mut self, now_ms: u64) -> Result<SensorSample, SensorError> {
        if let Some(next_read_ms) = self.next_read_ms {
            if now_ms <= next_read_ms {
                return Ok(self.sample);
            }
        }

        debug!("sensor: read");
        match self.sensor.measure() {
            Ok((temperature, humidity)) => {
                let sampled_at_ms = now_ms.max(self.sample.sampled_at_ms);
                self.sample = SensorSample::new(temperature, humidity, sampled_at_ms);
                self.next_read_ms = Some(now_ms.saturating_add(self.read_interval_ms));
                Ok(self.sample)
            }
            Err(err) => {
                error!("sensor error: {err}");
                Err(err)
            }
        }
    }

    /// Uncached read: bypasses the interval gate and reports failures.
    pub fn refresh(&mut self, now_ms: u64) -> Result<SensorSample, SensorError> {
        self.reset();
        self.try_read(now_ms)
    }

    /// Opens the interval gate so the next `read` acquires immediately.
    pub fn reset(&mut self) {
        self.next_read_ms = None;
    }
}
