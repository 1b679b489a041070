use log::{debug, error};

use crate::{
    error::ActuatorError,
    types::{ActuatorState, FanMode, SensorSample},
};

/// The single binary output line driving the fan relay.
pub trait FanOutput {
    fn set(&mut self, on: bool) -> Result<(), ActuatorError>;
}

impl<T: FanOutput + ?Sized> FanOutput for Box<T> {
    fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        (**self).set(on)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanAction {
    On,
    Off,
}

/// Owns the fan line together with [`ActuatorState`]. `fan_on` is only
/// updated after the line write succeeds.
#[derive(Debug)]
pub struct FanController<O> {
    output: O,
    state: ActuatorState,
}

impl<O: FanOutput> FanController<O> {
    pub fn new(mut output: O, threshold: i32) -> Result<Self, ActuatorError> {
        output.set(false)?;
        Ok(Self {
            output,
            state: ActuatorState::new(threshold),
        })
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    pub fn mode(&self) -> FanMode {
        self.state.mode()
    }

    pub fn is_fan_on(&self) -> bool {
        self.state.fan_on
    }

    pub fn threshold(&self) -> i32 {
        self.state.threshold
    }

    /// One decision step. Comparisons are strict: a sample equal to the
    /// threshold never changes the output.
    pub fn evaluate(&mut self, sample: &SensorSample) -> Option<FanAction> {
        let action = match self.state.mode() {
            FanMode::Forced => (!self.state.fan_on).then_some(FanAction::On),
            FanMode::Auto => {
                let threshold = self.state.threshold as f32;
                if sample.temperature > threshold && !self.state.fan_on {
                    Some(FanAction::On)
                } else if sample.temperature < threshold && self.state.fan_on {
                    Some(FanAction::Off)
                } else {
                    None
                }
            }
        }?;

        match self.apply(action) {
            Ok(()) => {
                debug!(
                    "fan {:?} at {:.2}C (threshold {})",
                    action, sample.temperature, self.state.threshold
                );
                Some(action)
            }
            Err(err) => {
                error!("fan {action:?} failed: {err}");
                None
            }
        }
    }

    /// Manual override: hold the fan on until released.
    pub fn force_on(&mut self) -> Result<(), ActuatorError> {
        self.state.forced = true;
        self.apply(FanAction::On)
    }

    /// Release the override and switch the fan off. The next evaluation
    /// decides the output again from scratch.
    pub fn force_off(&mut self) -> Result<(), ActuatorError> {
        self.state.forced = false;
        self.apply(FanAction::Off)
    }

    pub fn set_threshold(&mut self, threshold: i32) -> bool {
        if self.state.threshold != threshold {
            self.state.threshold = threshold;
            true
        } else {
            false
        }
    }

    fn apply(&mut self, action: FanAction) -> Result<(), ActuatorError> {
        let on = action == FanAction::On;
        self.output.set(on)?;
        self.state.fan_on = on;
        Ok(())
    }
}
