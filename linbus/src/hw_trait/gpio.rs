//! GPIO hardware abstraction trait.

use super::Result;

/// GPIO pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinMode {
    #[default]
    Input,
    Output,
}

/// Output driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Drive {
    #[default]
    PushPull,
    OpenDrain,
    OpenSource,
}

/// Full configuration of one GPIO pin.
///
/// `state` is the logical output level; with `active_low` set it is
/// inverted on the wire. It is ignored for inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinConfig {
    pub mode: PinMode,
    pub active_low: bool,
    pub drive: Drive,
    pub state: bool,
}

impl PinConfig {
    pub fn input() -> Self {
        Self::default()
    }

    pub fn output(state: bool) -> Self {
        Self {
            mode: PinMode::Output,
            state,
            ..Self::default()
        }
    }

    pub fn active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }

    pub fn drive(mut self, drive: Drive) -> Self {
        self.drive = drive;
        self
    }

    pub fn is_output(&self) -> bool {
        self.mode == PinMode::Output
    }
}

/// GPIO pin abstraction
pub trait GpioPin {
    /// Apply a complete pin configuration.
    fn configure(&mut self, config: PinConfig) -> Result<()>;

    /// Make the pin an output (if it is not already) and drive it.
    fn set_output(&mut self, state: bool) -> Result<()>;

    /// Make the pin an input (if it is not already) and sample it.
    fn get_input(&mut self) -> Result<bool>;
}
