//! Logging setup shared by the library and its tools.
//!
//! Binaries call [`init_journald_or_stdout`] once at startup. Library code
//! only uses the macros, via `use crate::tracing::prelude::*`.

use std::env;
use std::fmt::{self, Write as _};

use time::OffsetDateTime;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

use prelude::*;

/// Install the global subscriber.
///
/// Under systemd (`JOURNAL_STREAM` set) events go to the journal; otherwise
/// to stdout, filtered by `RUST_LOG` with INFO as the default level.
pub fn init_journald_or_stdout() {
    init_with_default(LevelFilter::INFO)
}

/// Like [`init_journald_or_stdout`], with a different default level for
/// stdout when `RUST_LOG` is unset.
pub fn init_with_default(level: LevelFilter) {
    if env::var("JOURNAL_STREAM").is_ok() {
        match tracing_journald::layer() {
            Ok(layer) => tracing_subscriber::registry().with(layer).init(),
            Err(_) => {
                use_stdout(level);
                error!("Journald unavailable, logging to stdout.");
            }
        }
    } else {
        use_stdout(level);
    }
}

fn use_stdout(level: LevelFilter) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(LocalTimer)
                .event_format(CompactFormatter),
        )
        .init();
}

/// One line per event: time, colored level, short target, message, then
/// any structured fields dimmed on a second line.
struct CompactFormatter;

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Vec<(&'static str, String)>,
}

impl tracing::field::Visit for FieldCollector {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        let text = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(text);
        } else {
            self.fields.push((field.name(), text));
        }
    }
}

/// Drop the crate prefix from our own targets; dependencies keep theirs.
fn short_target(target: &str) -> &str {
    target
        .strip_prefix("linbus::")
        .or_else(|| target.strip_prefix("linbus_io::"))
        .unwrap_or(target)
}

fn level_style(level: tracing::Level) -> (&'static str, &'static str) {
    match level {
        tracing::Level::ERROR => ("\x1b[31m", "ERROR"),
        tracing::Level::WARN => ("\x1b[33m", "WARN "),
        tracing::Level::INFO => ("\x1b[32m", "INFO "),
        tracing::Level::DEBUG => ("\x1b[34m", "DEBUG"),
        tracing::Level::TRACE => ("\x1b[35m", "TRACE"),
    }
}

impl<S, N> FormatEvent<S, N> for CompactFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);

        LocalTimer.format_time(&mut writer)?;
        let (color, label) = level_style(*event.metadata().level());
        write!(
            writer,
            " {}{}\x1b[0m {}: ",
            color,
            label,
            short_target(event.metadata().target())
        )?;
        if let Some(message) = &visitor.message {
            writer.write_str(message)?;
        }

        if !visitor.fields.is_empty() {
            // Align under the target column: "HH:MM:SS LEVEL ".
            write!(writer, "\n\x1b[90m               ")?;
            for (i, (key, value)) in visitor.fields.iter().enumerate() {
                if i > 0 {
                    writer.write_str(", ")?;
                }
                write!(writer, "{}={}", key, value)?;
            }
            writer.write_str("\x1b[0m")?;
        }

        writeln!(writer)
    }
}

/// Local wall-clock time to the second.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let text = now
            .format(time::macros::format_description!("[hour]:[minute]:[second]"))
            .map_err(|_| fmt::Error)?;
        w.write_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("linbus::i2c::stub", "i2c::stub"; "library")]
    #[test_case("linbus_io::output", "output"; "tool")]
    #[test_case("nix::sys", "nix::sys"; "dependency")]
    fn targets_shortened(target: &str, expected: &str) {
        assert_eq!(short_target(target), expected);
    }
}
