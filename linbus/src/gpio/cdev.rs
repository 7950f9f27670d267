//! GPIO lines through `/dev/gpiochipN` line handles.

use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::path::PathBuf;

use bitflags::bitflags;

use super::ffi;
use crate::error::{Error, Result};
use crate::hw_trait::{Drive, GpioPin, PinConfig, PinMode};
use crate::tracing::prelude::*;

/// Consumer name the kernel shows for lines we hold.
pub const CONSUMER_LABEL: &str = "linbus";

bitflags! {
    /// `GPIOHANDLE_REQUEST_*` flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HandleFlags: u32 {
        const INPUT = 1 << 0;
        const OUTPUT = 1 << 1;
        const ACTIVE_LOW = 1 << 2;
        const OPEN_DRAIN = 1 << 3;
        const OPEN_SOURCE = 1 << 4;
    }
}

impl From<&PinConfig> for HandleFlags {
    fn from(config: &PinConfig) -> Self {
        let mut flags = match config.mode {
            PinMode::Input => HandleFlags::INPUT,
            PinMode::Output => HandleFlags::OUTPUT,
        };
        flags.set(HandleFlags::ACTIVE_LOW, config.active_low);
        match config.drive {
            Drive::PushPull => {}
            Drive::OpenDrain => flags |= HandleFlags::OPEN_DRAIN,
            Drive::OpenSource => flags |= HandleFlags::OPEN_SOURCE,
        }
        flags
    }
}

fn handle_request(line: u32, config: &PinConfig) -> ffi::GpioHandleRequest {
    let mut request = ffi::GpioHandleRequest {
        flags: HandleFlags::from(config).bits(),
        lines: 1,
        ..Default::default()
    };
    request.lineoffsets[0] = line;
    request.default_values[0] = (config.is_output() && config.state).into();
    let label = CONSUMER_LABEL.as_bytes();
    request.consumer_label[..label.len()].copy_from_slice(label);
    request
}

/// One line of a GPIO chip, held through a kernel line handle.
pub struct GpioLine {
    chip: File,
    path: PathBuf,
    line: u32,
    handle: Option<OwnedFd>,
    config: PinConfig,
}

impl GpioLine {
    pub fn chip_path(chip: u32) -> PathBuf {
        PathBuf::from(format!("/dev/gpiochip{}", chip))
    }

    /// Open `line` of `/dev/gpiochip<chip>` and request it with `config`.
    pub fn open(chip: u32, line: u32, config: PinConfig) -> Result<Self> {
        let path = Self::chip_path(chip);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| Error::resource(&path, e))?;
        let mut gpio = Self {
            chip: file,
            path,
            line,
            handle: None,
            config,
        };
        gpio.configure(config)?;
        Ok(gpio)
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn config(&self) -> PinConfig {
        self.config
    }

    /// Last level driven, or last level sampled for an input.
    pub fn state(&self) -> bool {
        self.config.state
    }

    fn handle_fd(&self) -> Result<i32> {
        self.handle
            .as_ref()
            .map(|fd| fd.as_raw_fd())
            .ok_or_else(|| Error::invalid(format!("GPIO line {} is not requested", self.line)))
    }

    fn write_value(&mut self, state: bool) -> Result<()> {
        let mut data = ffi::GpioHandleData::default();
        data.values[0] = state.into();
        // SAFETY: `data` is a valid gpiohandle_data for the call.
        unsafe { ffi::gpiohandle_set_line_values(self.handle_fd()?, &mut data) }
            .map_err(Error::Bus)?;
        self.config.state = state;
        Ok(())
    }

    fn read_value(&mut self) -> Result<bool> {
        let mut data = ffi::GpioHandleData::default();
        // SAFETY: `data` is a valid gpiohandle_data for the call.
        unsafe { ffi::gpiohandle_get_line_values(self.handle_fd()?, &mut data) }
            .map_err(Error::Bus)?;
        self.config.state = data.values[0] != 0;
        Ok(self.config.state)
    }
}

impl GpioPin for GpioLine {
    /// Re-request the line with `config`, replacing the previous handle.
    fn configure(&mut self, config: PinConfig) -> Result<()> {
        // The kernel refuses a second handle while the first is held.
        self.handle = None;

        let mut request = handle_request(self.line, &config);
        // SAFETY: `request` is a valid gpiohandle_request; on success the
        // kernel stores a new file descriptor in `request.fd`.
        unsafe { ffi::gpio_get_linehandle(self.chip.as_raw_fd(), &mut request) }
            .map_err(|e| Error::resource(&self.path, e))?;
        // SAFETY: the descriptor was just created for us and nothing else
        // owns it.
        self.handle = Some(unsafe { OwnedFd::from_raw_fd(request.fd) });
        self.config = config;
        debug!(
            chip = %self.path.display(),
            line = self.line,
            flags = ?HandleFlags::from(&config),
            "Requested GPIO line"
        );

        if !config.is_output() {
            self.read_value()?;
        }
        Ok(())
    }

    fn set_output(&mut self, state: bool) -> Result<()> {
        if self.config.is_output() {
            self.write_value(state)
        } else {
            let config = PinConfig {
                mode: PinMode::Output,
                state,
                ..self.config
            };
            self.configure(config)
        }
    }

    fn get_input(&mut self) -> Result<bool> {
        if self.config.is_output() {
            let config = PinConfig {
                mode: PinMode::Input,
                ..self.config
            };
            self.configure(config)?;
            Ok(self.config.state)
        } else {
            self.read_value()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(PinConfig::input(), HandleFlags::INPUT; "input")]
    #[test_case(PinConfig::output(true), HandleFlags::OUTPUT; "output")]
    #[test_case(
        PinConfig::input().active_low(true),
        HandleFlags::INPUT | HandleFlags::ACTIVE_LOW;
        "inverted_input"
    )]
    #[test_case(
        PinConfig::output(false).drive(Drive::OpenDrain),
        HandleFlags::OUTPUT | HandleFlags::OPEN_DRAIN;
        "open_drain"
    )]
    #[test_case(
        PinConfig::output(false).drive(Drive::OpenSource),
        HandleFlags::OUTPUT | HandleFlags::OPEN_SOURCE;
        "open_source"
    )]
    fn flags_from_config(config: PinConfig, expected: HandleFlags) {
        assert_eq!(HandleFlags::from(&config), expected);
    }

    #[test]
    fn request_carries_line_label_and_initial_state() {
        let request = handle_request(17, &PinConfig::output(true));
        assert_eq!(request.lineoffsets[0], 17);
        assert_eq!(request.lines, 1);
        assert_eq!(request.default_values[0], 1);
        assert_eq!(&request.consumer_label[..6], b"linbus");
        assert_eq!(request.consumer_label[6], 0);

        // Inputs never carry a default value.
        let mut input = PinConfig::input();
        input.state = true;
        assert_eq!(handle_request(17, &input).default_values[0], 0);
    }

    #[test]
    fn missing_chip_is_a_resource_error() {
        assert!(matches!(
            GpioLine::open(u32::MAX, 0, PinConfig::input()),
            Err(Error::Resource { .. })
        ));
    }
}
