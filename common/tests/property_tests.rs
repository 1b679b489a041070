//! Invariants of the fan decision engine over arbitrary temperature traces.
//!
//! Host only; proptest is not built for the ESP32 target.

#![cfg(not(target_os = "espidf"))]

use std::{cell::Cell, rc::Rc};

use atticfan_common::{
    ActuatorError, Command, FanAction, FanController, FanOutput, SensorSample,
};
use proptest::prelude::*;

#[derive(Clone, Default)]
struct Line(Rc<Cell<bool>>);

impl FanOutput for Line {
    fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        self.0.set(on);
        Ok(())
    }
}

fn temps() -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(
        prop_oneof![(-20i32..60).prop_map(|t| t as f32), -20.0f32..60.0],
        1..64,
    )
}

proptest! {
    /// In AUTO the fan only switches on for samples strictly above the
    /// threshold and only switches off for samples strictly below it.
    #[test]
    fn auto_transitions_are_strict(threshold in 0i32..40, trace in temps()) {
        let line = Line::default();
        let mut controller = FanController::new(line.clone(), threshold).unwrap();

        for temp in trace {
            let before = controller.is_fan_on();
            let action = controller.evaluate(&SensorSample::new(temp, 50.0, 0));
            let sample_temp = SensorSample::new(temp, 50.0, 0).temperature;

            match action {
                Some(FanAction::On) => prop_assert!(!before && sample_temp > threshold as f32),
                Some(FanAction::Off) => prop_assert!(before && sample_temp < threshold as f32),
                None => prop_assert_eq!(controller.is_fan_on(), before),
            }
            prop_assert_eq!(line.0.get(), controller.is_fan_on());
        }
    }

    /// Once forced, the fan stays on for any sample until released.
    #[test]
    fn forced_holds_on(threshold in 0i32..40, trace in temps()) {
        let line = Line::default();
        let mut controller = FanController::new(line.clone(), threshold).unwrap();
        controller.force_on().unwrap();

        for temp in trace {
            prop_assert_eq!(controller.evaluate(&SensorSample::new(temp, 50.0, 0)), None);
            prop_assert!(controller.is_fan_on());
            prop_assert!(line.0.get());
        }
    }

    /// Any all-digit value after `temp=` that fits an i32 becomes the threshold.
    #[test]
    fn digit_thresholds_route(value in 0i32..=i32::MAX) {
        prop_assert_eq!(
            Command::route(&format!("/?temp={value}")),
            Command::SetThreshold(value)
        );
    }

    /// Values with any non-digit are never accepted as thresholds.
    #[test]
    fn non_digit_thresholds_are_not_found(value in "[0-9]{0,3}[a-z+.-][0-9a-z]{0,3}") {
        let target = format!("/?temp={value}");
        prop_assert_eq!(Command::route(&target), Command::NotFound(target.clone()));
    }
}
