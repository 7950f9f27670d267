//! Run I2C, SPI and GPIO transactions from the command line.

mod output;
mod parse;

use std::io::IsTerminal;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use linbus::config::BusConfig;
use linbus::gpio::GpioLine;
use linbus::hw_trait::{GpioPin, PinConfig};
use linbus::spi::{SpiConfig, SpiDevice, SpiMode, SpiSpec};
use linbus::transfer::TransferSpec;
use output::{LineReport, Report};
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;

/// Linux bus transaction tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable debug logging
    #[arg(short = 'd', long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One atomic I2C transaction (w:<bytes>, w:"text", r:<len>, -)
    I2c(I2cArgs),
    /// One SPI message (w:<bytes> sends, r:<len> clocks zeros)
    Spi(SpiArgs),
    /// Read or drive a GPIO character-device line
    Gpio(GpioArgs),
}

#[derive(Args, Debug)]
struct I2cArgs {
    /// Bus index; defaults to LINBUS_I2C_BUS, or the tracing stub if unset
    #[arg(short, long)]
    bus: Option<u32>,

    /// 7-bit device address
    #[arg(short, long, value_parser = parse::byte)]
    addr: u8,

    #[arg(required = true)]
    transfers: Vec<String>,
}

#[derive(Args, Debug)]
struct SpiArgs {
    #[arg(short, long)]
    bus: u32,

    /// Chip select
    #[arg(short, long)]
    cs: u32,

    /// Clock mode 0-3
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=3))]
    mode: Option<u8>,

    /// Maximum clock in Hz
    #[arg(short, long)]
    speed: Option<u32>,

    #[arg(required = true)]
    transfers: Vec<String>,
}

#[derive(Args, Debug)]
struct GpioArgs {
    /// Chip index (/dev/gpiochipN)
    #[arg(short, long)]
    chip: u32,

    #[arg(short, long)]
    line: u32,

    /// Drive the line to 0 or 1 instead of reading it
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=1))]
    set: Option<u8>,

    #[arg(long)]
    active_low: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    linbus::tracing::init_with_default(if cli.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    });
    if cli.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    match cli.command {
        Command::I2c(args) => {
            let report = run_i2c(args)?;
            emit(cli.json, &report, output::format_report)
        }
        Command::Spi(args) => {
            let report = run_spi(args)?;
            emit(cli.json, &report, output::format_report)
        }
        Command::Gpio(args) => {
            let report = run_gpio(args)?;
            emit(cli.json, &report, output::format_line)
        }
    }
}

fn emit<T: serde::Serialize>(json: bool, value: &T, text: fn(&T) -> String) -> Result<()> {
    if json {
        println!("{}", output::json(value)?);
    } else {
        println!("{}", text(value));
    }
    Ok(())
}

fn run_i2c(args: I2cArgs) -> Result<Report> {
    let specs = args
        .transfers
        .iter()
        .map(|arg| parse::transfer(arg))
        .collect::<Result<Vec<TransferSpec>>>()?;

    let mut config = BusConfig::from_env()?;
    if args.bus.is_some() {
        config.i2c_bus = args.bus;
    }
    debug!(?config, "I2C configuration");

    let mut dev = config
        .open_i2c(args.addr)
        .with_context(|| format!("Failed to open I2C device 0x{:02x}", args.addr))?;
    let reads = dev.io(&specs).context("I2C transaction failed")?;

    let device = match config.i2c_bus {
        Some(bus) => format!("i2c-{} 0x{:02x}", bus, args.addr),
        None => format!("i2c-stub 0x{:02x}", args.addr),
    };
    Ok(Report {
        device,
        stub: dev.is_stub().then_some(true),
        reads,
    })
}

fn run_spi(args: SpiArgs) -> Result<Report> {
    let specs = args
        .transfers
        .iter()
        .map(|arg| parse::spi_transfer(arg))
        .collect::<Result<Vec<SpiSpec>>>()?;

    let config = SpiConfig {
        mode: args.mode.and_then(SpiMode::from_repr),
        speed_hz: args.speed,
        ..Default::default()
    };
    let mut dev = SpiDevice::open(args.bus, args.cs, config)
        .with_context(|| format!("Failed to open spidev{}.{}", args.bus, args.cs))?;
    debug!(mode = %dev.mode()?, speed_hz = dev.speed_hz()?, "SPI configuration");

    let reads = dev.io(&specs).context("SPI transfer failed")?;
    Ok(Report {
        device: format!("spidev{}.{}", args.bus, args.cs),
        stub: None,
        reads,
    })
}

fn run_gpio(args: GpioArgs) -> Result<LineReport> {
    let config = match args.set {
        Some(value) => PinConfig::output(value != 0),
        None => PinConfig::input(),
    }
    .active_low(args.active_low);

    let mut line = GpioLine::open(args.chip, args.line, config)
        .with_context(|| format!("Failed to request gpiochip{} line {}", args.chip, args.line))?;
    let state = if config.is_output() {
        line.state()
    } else {
        line.get_input()?
    };
    Ok(LineReport {
        chip: args.chip,
        line: args.line,
        output: config.is_output(),
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn i2c_arguments() {
        let cli = Cli::try_parse_from([
            "linbus-io", "--json", "i2c", "--addr", "0x50", "w:0x00", "r:4",
        ])
        .unwrap();
        assert!(cli.json);
        let Command::I2c(args) = cli.command else {
            panic!("expected i2c");
        };
        assert_eq!(args.addr, 0x50);
        assert_eq!(args.bus, None);
        assert_eq!(args.transfers, ["w:0x00", "r:4"]);
    }

    #[test]
    fn stub_i2c_transaction() {
        if std::env::var("LINBUS_I2C_BUS").is_ok() {
            return;
        }
        let args = I2cArgs {
            bus: None,
            addr: 0x48,
            transfers: vec!["w:0x01".into(), "-".into(), "r:2".into()],
        };
        let report = run_i2c(args).unwrap();
        assert_eq!(report.stub, Some(true));
        assert!(report.reads.is_empty());
    }

    #[test]
    fn spi_mode_range_enforced() {
        let parsed = Cli::try_parse_from([
            "linbus-io", "spi", "--bus", "0", "--cs", "0", "--mode", "4", "r:1",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn gpio_set_parses() {
        let cli =
            Cli::try_parse_from(["linbus-io", "gpio", "-c", "0", "-l", "17", "--set", "1"])
                .unwrap();
        let Command::Gpio(args) = cli.command else {
            panic!("expected gpio");
        };
        assert_eq!(args.set, Some(1));
    }
}
