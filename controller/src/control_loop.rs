use std::time::Duration;

use atticfan_common::{FanAction, FanStatus};
use log::{debug, info};

use crate::app::AppState;

/// Periodic fan decision task. Runs for the life of the scheduler.
pub async fn run(state: AppState) {
    let period = Duration::from_millis(state.config.fan.control_period_ms);
    let telemetry_every = state.config.fan.telemetry_every.max(1);
    debug!("control loop threshold: {}", state.fan.borrow().threshold());

    let mut cycle: u32 = 0;
    loop {
        run_cycle(&state, cycle == 0).await;
        cycle = (cycle + 1) % telemetry_every;
        tokio::time::sleep(period).await;
    }
}

/// One evaluation: optional telemetry, a short yield, then the decision.
pub async fn run_cycle(state: &AppState, emit_telemetry: bool) -> Option<FanAction> {
    if emit_telemetry {
        log_telemetry(&state.status());
    }

    tokio::time::sleep(Duration::from_millis(state.config.fan.control_yield_ms)).await;

    let sample = state.sensor.borrow_mut().read(state.now_ms());
    state.fan.borrow_mut().evaluate(&sample)
}

fn log_telemetry(status: &FanStatus) {
    info!(
        "Temp: {:.2}, Humidity: {:.2}, Threshold: {}",
        status.temperature, status.humidity, status.threshold
    );
    if let Ok(json) = serde_json::to_string(status) {
        debug!("status: {json}");
    }
}

#[cfg(test)]
mod tests {
    use atticfan_common::RuntimeConfig;
    use pretty_assertions::assert_eq;
    use tokio::task::LocalSet;

    use super::*;
    use crate::app::testing;

    #[tokio::test(start_paused = true)]
    async fn cycle_switches_fan_from_cached_sample() {
        let (state, sensor, fan) = testing::state();
        sensor.push(30.0, 40.0);

        assert_eq!(run_cycle(&state, false).await, Some(FanAction::On));
        assert!(fan.level.get());

        // still inside the read interval: same sample, no further transition
        assert_eq!(run_cycle(&state, true).await, None);
        assert_eq!(sensor.calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_read_reuses_last_sample() {
        let (state, sensor, fan) = testing::state();
        sensor.push(30.0, 40.0);
        run_cycle(&state, false).await;

        tokio::time::advance(Duration::from_secs(61)).await;
        sensor.fail();
        assert_eq!(run_cycle(&state, false).await, None);

        assert_eq!(sensor.calls.get(), 3);
        assert!(fan.level.get());
    }

    #[tokio::test(start_paused = true)]
    async fn forced_fan_ignores_cold_samples() {
        let (state, sensor, fan) = testing::state();
        sensor.push(5.0, 40.0);
        state.fan.borrow_mut().force_on().unwrap();

        assert_eq!(run_cycle(&state, false).await, None);
        assert!(fan.level.get());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_keeps_its_cadence_and_picks_up_threshold_changes() {
        let mut config = RuntimeConfig::default();
        config.sensor.read_interval_ms = 1;
        let (state, sensor, fan) = testing::state_with(config);
        for _ in 0..8 {
            sensor.push(22.0, 40.0);
        }

        let local = LocalSet::new();
        local
            .run_until(async {
                let task = tokio::task::spawn_local(run(state.clone()));

                tokio::time::sleep(Duration::from_millis(20)).await;
                assert!(!fan.level.get());

                state.fan.borrow_mut().set_threshold(21);
                tokio::time::sleep(Duration::from_millis(15_100)).await;
                assert!(fan.level.get());

                task.abort();
            })
            .await;
    }
}
