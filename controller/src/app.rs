use std::{cell::RefCell, rc::Rc};

use anyhow::Context;
use atticfan_common::{
    FanController, FanOutput, FanStatus, HumiditySensor, Render, RuntimeConfig, SensorCache,
};
use tokio::{sync::Notify, time::Instant};

pub type SharedSensor = Rc<RefCell<SensorCache<Box<dyn HumiditySensor>>>>;
pub type SharedFan = Rc<RefCell<FanController<Box<dyn FanOutput>>>>;

/// Everything the cooperative tasks share. All tasks run on one thread, so
/// plain `RefCell`s are enough as long as no borrow lives across an `.await`.
#[derive(Clone)]
pub struct AppState {
    pub config: Rc<RuntimeConfig>,
    pub sensor: SharedSensor,
    pub fan: SharedFan,
    renderer: Rc<dyn Render>,
    restart: Rc<Notify>,
    started: Instant,
}

impl AppState {
    pub fn new(
        config: RuntimeConfig,
        sensor: Box<dyn HumiditySensor>,
        fan: Box<dyn FanOutput>,
        renderer: Rc<dyn Render>,
    ) -> anyhow::Result<Self> {
        let sensor = SensorCache::new(sensor, config.sensor.read_interval_ms);
        let fan = FanController::new(fan, config.fan.default_threshold_c)
            .context("failed to switch fan line off at startup")?;

        Ok(Self {
            config: Rc::new(config),
            sensor: Rc::new(RefCell::new(sensor)),
            fan: Rc::new(RefCell::new(fan)),
            renderer,
            restart: Rc::new(Notify::new()),
            started: Instant::now(),
        })
    }

    pub fn now_ms(&self) -> u64 {
        self.started
            .elapsed()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }

    /// Snapshot of the five status values, reading through the sensor cache.
    pub fn status(&self) -> FanStatus {
        let sample = self.sensor.borrow_mut().read(self.now_ms());
        let fan = self.fan.borrow().state();
        FanStatus::new(&sample, &fan)
    }

    pub fn render_status(&self) -> String {
        self.renderer.render(&self.status())
    }

    pub fn request_restart(&self) {
        self.restart.notify_one();
    }

    pub async fn restart_requested(&self) {
        self.restart.notified().await;
    }
}

#[cfg(test)]
pub mod testing {
    use std::{cell::Cell, collections::VecDeque};

    use atticfan_common::{ActuatorError, SensorError, StatusPage};

    use super::*;

    #[derive(Clone, Default)]
    pub struct FakeSensor {
        pub readings: Rc<RefCell<VecDeque<Result<(f32, f32), SensorError>>>>,
        pub calls: Rc<Cell<u32>>,
    }

    impl FakeSensor {
        pub fn push(&self, temp: f32, humidity: f32) {
            self.readings.borrow_mut().push_back(Ok((temp, humidity)));
        }

        pub fn fail(&self) {
            self.readings
                .borrow_mut()
                .push_back(Err(SensorError::Unavailable("timeout".to_string())));
        }
    }

    impl HumiditySensor for FakeSensor {
        fn measure(&mut self) -> Result<(f32, f32), SensorError> {
            self.calls.set(self.calls.get() + 1);
            self.readings
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(SensorError::Unavailable("no data".to_string())))
        }
    }

    #[derive(Clone, Default)]
    pub struct FakeFan {
        pub level: Rc<Cell<bool>>,
        pub writes: Rc<Cell<u32>>,
    }

    impl FanOutput for FakeFan {
        fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
            self.level.set(on);
            self.writes.set(self.writes.get() + 1);
            Ok(())
        }
    }

    /// State wired to fakes; the sensor's warm-up read has already been consumed.
    pub fn state_with(config: RuntimeConfig) -> (AppState, FakeSensor, FakeFan) {
        let sensor = FakeSensor::default();
        let fan = FakeFan::default();
        let state = AppState::new(
            config,
            Box::new(sensor.clone()),
            Box::new(fan.clone()),
            Rc::new(StatusPage),
        )
        .unwrap();
        (state, sensor, fan)
    }

    pub fn state() -> (AppState, FakeSensor, FakeFan) {
        state_with(RuntimeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::testing;

    #[test]
    fn new_state_drives_line_off_with_default_threshold() {
        let (state, sensor, fan) = testing::state();

        assert_eq!(fan.writes.get(), 1);
        assert!(!fan.level.get());
        assert_eq!(sensor.calls.get(), 1);
        assert_eq!(state.fan.borrow().threshold(), 24);
    }

    #[test]
    fn status_reads_through_cache() {
        let (state, sensor, _fan) = testing::state();
        sensor.push(26.5, 41.0);

        let first = state.status();
        let second = state.status();

        assert_eq!(first, second);
        assert_eq!(sensor.calls.get(), 2);
        assert!((first.temperature - 26.5).abs() < f32::EPSILON);
        assert!(!first.fan_on);
    }
}
