//! Rendering of transaction results.

use colored::Colorize;
use serde::Serialize;

/// Gray for raw bytes
const HEX_GRAY: (u8, u8, u8) = (128, 128, 128);

/// Bytes per line in hex dumps
const HEX_LINE: usize = 16;

/// Result of one command, as printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stub: Option<bool>,
    pub reads: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineReport {
    pub chip: u32,
    pub line: u32,
    pub output: bool,
    pub state: bool,
}

pub fn json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

pub fn format_report(report: &Report) -> String {
    let mut out = report.device.bold().to_string();
    if report.stub == Some(true) {
        out.push_str(&format!(" {}", "(stub)".yellow()));
    }
    if report.reads.is_empty() {
        out.push_str(": no reads");
    }
    for (index, data) in report.reads.iter().enumerate() {
        out.push_str(&format!("\n  {} {} bytes", format!("r[{}]", index).cyan(), data.len()));
        for line in hex_lines(data) {
            out.push_str(&format!(
                "\n    {}",
                line.truecolor(HEX_GRAY.0, HEX_GRAY.1, HEX_GRAY.2)
            ));
        }
    }
    out
}

pub fn format_line(report: &LineReport) -> String {
    let state = if report.state {
        "1".green()
    } else {
        "0".red()
    };
    format!(
        "{} line {} {}: {}",
        format!("gpiochip{}", report.chip).bold(),
        report.line,
        if report.output { "output" } else { "input" },
        state
    )
}

/// Hex dump wrapped at 16 bytes per line.
pub fn hex_lines(data: &[u8]) -> Vec<String> {
    data.chunks(HEX_LINE)
        .map(|chunk| {
            chunk
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}
