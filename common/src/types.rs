use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    Auto,
    Forced,
}

impl FanMode {
    /// Label shown on the status page.
    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "Automatic",
            Self::Forced => "Forced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub temperature: f32,
    pub humidity: f32,
    pub sampled_at_ms: u64,
}

impl SensorSample {
    pub fn new(temperature: f32, humidity: f32, sampled_at_ms: u64) -> Self {
        Self {
            temperature: round2(temperature),
            humidity: round2(humidity),
            sampled_at_ms,
        }
    }
}

impl Default for SensorSample {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            humidity: 0.0,
            sampled_at_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorState {
    pub fan_on: bool,
    pub forced: bool,
    pub threshold: i32,
}

impl ActuatorState {
    pub fn new(threshold: i32) -> Self {
        Self {
            fan_on: false,
            forced: false,
            threshold,
        }
    }

    pub fn mode(&self) -> FanMode {
        if self.forced {
            FanMode::Forced
        } else {
            FanMode::Auto
        }
    }
}

/// The five values the status page embeds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FanStatus {
    pub temperature: f32,
    pub humidity: f32,
    #[serde(rename = "fanOn")]
    pub fan_on: bool,
    pub forced: bool,
    pub threshold: i32,
}

impl FanStatus {
    pub fn new(sample: &SensorSample, state: &ActuatorState) -> Self {
        Self {
            temperature: sample.temperature,
            humidity: sample.humidity,
            fan_on: state.fan_on,
            forced: state.forced,
            threshold: state.threshold,
        }
    }

    pub fn fan_label(&self) -> &'static str {
        if self.fan_on {
            "On"
        } else {
            "Off"
        }
    }

    pub fn mode(&self) -> FanMode {
        if self.forced {
            FanMode::Forced
        } else {
            FanMode::Auto
        }
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
