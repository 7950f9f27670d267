//! GPIO lines through the legacy `/sys/class/gpio` interface.
//!
//! A line is addressed by its offset within a chip. The chip is named by
//! its directory (`gpiochip504`), by its position among all chips in
//! natural order (`0`, `1`, ...) or by its label (`pinctrl-bcm2835`). The
//! chip's `base` file turns the offset into the global line number used by
//! `export` and `gpioN`.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::hw_trait::{Drive, GpioPin, PinConfig, PinMode};
use crate::retry::poll_until;
use crate::tracing::prelude::*;

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// How long a freshly exported line may take to appear.
const EXPORT_DEADLINE: Duration = Duration::from_millis(500);

/// Settings for [`SysfsGpio::open`]. `None` keeps what the line already has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysfsConfig {
    pub invert: Option<bool>,
    pub output: Option<bool>,
    pub state: Option<bool>,
    /// Leave the line exported when this handle is dropped.
    pub persistent: bool,
}

impl Default for SysfsConfig {
    fn default() -> Self {
        Self {
            invert: Some(false),
            output: Some(false),
            state: Some(false),
            persistent: true,
        }
    }
}

/// An exported sysfs GPIO line.
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
    chip: String,
    number: u32,
    dir: PathBuf,
    output: bool,
    invert: bool,
    state: bool,
    persistent: bool,
    released: bool,
}

impl SysfsGpio {
    /// Export line `line` of `chip` under `/sys/class/gpio` and configure it.
    pub fn open(line: u32, chip: &str, config: SysfsConfig) -> Result<Self> {
        Self::open_in(SYSFS_GPIO_ROOT, line, chip, config)
    }

    /// As [`open`](Self::open), with a different sysfs root.
    pub fn open_in(
        root: impl Into<PathBuf>,
        line: u32,
        chip: &str,
        config: SysfsConfig,
    ) -> Result<Self> {
        let root = root.into();
        let chip = find_chip(&root, chip)?;
        let base: u32 = read_value(&root.join(&chip).join("base"))?;
        let number = base
            .checked_add(line)
            .ok_or_else(|| Error::invalid(format!("GPIO line {} past end of {}", line, chip)))?;
        let dir = root.join(format!("gpio{}", number));

        if !dir.is_dir() {
            write_file(&root.join("export"), &format!("{}\n", number))?;
            // udev may still be fixing permissions after the directory shows up.
            let direction = dir.join("direction");
            poll_until(EXPORT_DEADLINE, "GPIO export", || Ok(direction.exists()))?;
            debug!(chip = %chip, number, "Exported GPIO");
        }

        let output = read_line(&dir.join("direction"))? == "out";
        let invert = read_value::<u8>(&dir.join("active_low"))? != 0;
        let state = read_value::<u8>(&dir.join("value"))? != 0;

        let mut gpio = Self {
            root,
            chip,
            number,
            dir,
            output,
            invert,
            state,
            persistent: config.persistent,
            released: false,
        };
        gpio.update(config.invert, config.output, config.state)?;
        Ok(gpio)
    }

    pub fn chip(&self) -> &str {
        &self.chip
    }

    /// Global line number (chip base plus offset).
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn is_output(&self) -> bool {
        self.output
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    pub fn state(&self) -> bool {
        self.state
    }

    pub fn set_persistent(&mut self, persistent: bool) {
        self.persistent = persistent;
    }

    /// Apply only the settings given; inputs are sampled afterwards.
    pub fn update(
        &mut self,
        invert: Option<bool>,
        output: Option<bool>,
        state: Option<bool>,
    ) -> Result<()> {
        if let Some(invert) = invert.filter(|&i| i != self.invert) {
            write_file(&self.dir.join("active_low"), bit(invert))?;
            self.invert = invert;
        }
        let mut switched = false;
        if let Some(output) = output.filter(|&o| o != self.output) {
            write_file(&self.dir.join("direction"), if output { "out\n" } else { "in\n" })?;
            self.output = output;
            switched = true;
        }
        if self.output {
            // A new output starts low regardless of the last sampled level.
            if switched {
                self.state = false;
            }
            if let Some(state) = state.filter(|&s| switched || s != self.state) {
                write_file(&self.dir.join("value"), bit(state))?;
                self.state = state;
            }
        } else {
            self.state = read_value::<u8>(&self.dir.join("value"))? != 0;
        }
        Ok(())
    }

    /// Unexport the line now, whatever its persistence.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.unexport()
    }

    fn unexport(&self) -> Result<()> {
        write_file(&self.root.join("unexport"), &format!("{}\n", self.number))?;
        debug!(number = self.number, "Unexported GPIO");
        Ok(())
    }
}

impl GpioPin for SysfsGpio {
    fn configure(&mut self, config: PinConfig) -> Result<()> {
        if config.drive != Drive::PushPull {
            return Err(Error::invalid("sysfs GPIO supports push-pull drive only"));
        }
        self.update(
            Some(config.active_low),
            Some(config.mode == PinMode::Output),
            Some(config.state),
        )
    }

    fn set_output(&mut self, state: bool) -> Result<()> {
        self.update(None, Some(true), Some(state))
    }

    fn get_input(&mut self) -> Result<bool> {
        self.update(None, Some(false), None)?;
        Ok(self.state)
    }
}

impl Drop for SysfsGpio {
    fn drop(&mut self) {
        if !self.persistent && !self.released {
            if let Err(e) = self.unexport() {
                warn!(number = self.number, error = %e, "Failed to unexport GPIO");
            }
        }
    }
}

/// Resolve a chip name, natural-order index or label to its directory name.
pub fn find_chip(root: &Path, chip: &str) -> Result<String> {
    let entries = fs::read_dir(root).map_err(|e| Error::resource(root, e))?;
    let mut chips: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().join("base").is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    if chips.is_empty() {
        return Err(Error::invalid(format!("No GPIO chips under {}", root.display())));
    }

    if chips.iter().any(|c| c == chip) {
        return Ok(chip.to_string());
    }

    if let Ok(index) = chip.parse::<usize>() {
        chips.sort_by(|a, b| natural_cmp(a, b));
        return chips
            .get(index)
            .cloned()
            .ok_or_else(|| Error::invalid(format!("No GPIO chip index {}", index)));
    }

    for name in &chips {
        if let Ok(label) = read_line(&root.join(name).join("label")) {
            if label == chip {
                return Ok(name.clone());
            }
        }
    }
    Err(Error::invalid(format!("No GPIO chip labelled '{}'", chip)))
}

/// Compare so that embedded numbers sort by value: `gpiochip2` before
/// `gpiochip10`.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b))
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum KeyPart<'a> {
    Number(u64),
    Text(&'a str),
}

fn natural_key(s: &str) -> Vec<KeyPart<'_>> {
    let mut parts = Vec::new();
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.starts_with(|c: char| c.is_ascii_digit());
        let end = rest
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        parts.push(match run.parse() {
            Ok(n) if digits => KeyPart::Number(n),
            _ => KeyPart::Text(run),
        });
        rest = tail;
    }
    parts
}

fn bit(value: bool) -> &'static str {
    if value {
        "1\n"
    } else {
        "0\n"
    }
}

fn read_line(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| Error::resource(path, e))
}

fn read_value<T: std::str::FromStr>(path: &Path) -> Result<T> {
    let text = read_line(path)?;
    text.parse()
        .map_err(|_| Error::invalid(format!("Unexpected {:?} in {}", text, path.display())))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| Error::resource(path, e))
}
