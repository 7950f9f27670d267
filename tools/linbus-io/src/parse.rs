//! Command-line transfer syntax.
//!
//! Each argument is one transfer:
//!
//! - `w:0x41,0x42,7` writes the listed bytes (hex, octal, binary or decimal)
//! - `w:"text"` writes the UTF-8 bytes of `text`
//! - `r:7` reads seven bytes
//! - `-` is a placeholder that produces no bus activity

use anyhow::{bail, Context, Result};
use linbus::spi::SpiSpec;
use linbus::transfer::{Payload, TransferSpec};

pub fn transfer(arg: &str) -> Result<TransferSpec> {
    let arg = arg.trim();
    if arg == "-" {
        return Ok(TransferSpec::Skip);
    }
    let Some((kind, body)) = arg.split_once(':') else {
        bail!("Expected w:<bytes>, r:<len> or -, got {:?}", arg);
    };
    match kind {
        "w" | "W" => Ok(TransferSpec::Write(payload(body)?)),
        "r" | "R" => {
            let len = number(body).with_context(|| format!("Bad read length in {:?}", arg))?;
            Ok(TransferSpec::Read(len.try_into()?))
        }
        _ => bail!("Unknown transfer kind {:?} in {:?}", kind, arg),
    }
}

/// SPI has no placeholder: a write sends its bytes, a read clocks zeros.
pub fn spi_transfer(arg: &str) -> Result<SpiSpec> {
    match transfer(arg)? {
        TransferSpec::Write(payload) => Ok(SpiSpec::send(payload)),
        TransferSpec::Read(len) => Ok(SpiSpec::clock(len)),
        TransferSpec::Skip => bail!("SPI transfers cannot be skipped"),
    }
}

fn payload(body: &str) -> Result<Payload> {
    let body = body.trim();
    if let Some(text) = body
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        return Ok(Payload::Text(text.to_string()));
    }
    if body.is_empty() {
        return Ok(Payload::Bytes(Vec::new()));
    }
    let values = body
        .split(',')
        .map(|item| number(item).with_context(|| format!("Bad byte {:?}", item.trim())))
        .collect::<Result<Vec<_>>>()?;
    Ok(Payload::Ints(values))
}

/// Parse an integer literal with an optional `0x`, `0o` or `0b` prefix.
pub fn number(text: &str) -> Result<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let lower = digits.to_ascii_lowercase();
    let value = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)?
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8)?
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)?
    } else {
        lower.parse()?
    };
    Ok(if negative { -value } else { value })
}

/// clap value parser for addresses and other byte-sized arguments.
pub fn byte(text: &str) -> Result<u8, String> {
    number(text)
        .map_err(|e| e.to_string())
        .and_then(|n| u8::try_from(n).map_err(|_| format!("{} does not fit in a byte", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("0x41", 0x41; "hex")]
    #[test_case("0X7f", 0x7f; "upper_hex")]
    #[test_case("0b101", 5; "binary")]
    #[test_case("0o17", 15; "octal")]
    #[test_case(" 42 ", 42; "decimal_padded")]
    #[test_case("-1", -1; "negative")]
    fn numbers(text: &str, expected: i64) {
        assert_eq!(number(text).unwrap(), expected);
    }

    #[test]
    fn write_list() {
        assert_eq!(
            transfer("w:0x41,0x42, 7").unwrap(),
            TransferSpec::Write(Payload::Ints(vec![0x41, 0x42, 7]))
        );
    }

    #[test]
    fn write_text() {
        assert_eq!(
            transfer("w:\"hi, there\"").unwrap(),
            TransferSpec::Write(Payload::Text("hi, there".into()))
        );
    }

    #[test]
    fn read_and_skip() {
        assert_eq!(transfer("r:7").unwrap(), TransferSpec::Read(7));
        assert_eq!(transfer("R:0x10").unwrap(), TransferSpec::Read(16));
        assert_eq!(transfer("-").unwrap(), TransferSpec::Skip);
    }

    #[test_case("x:1"; "unknown_kind")]
    #[test_case("r"; "missing_colon")]
    #[test_case("r:-1"; "negative_length")]
    #[test_case("w:0x41,zz"; "bad_byte")]
    fn rejects(arg: &str) {
        assert!(transfer(arg).is_err());
    }

    #[test]
    fn spi_mapping() {
        assert_eq!(spi_transfer("r:3").unwrap(), SpiSpec::clock(3));
        assert!(spi_transfer("-").is_err());
    }

    #[test_case("0x50", Ok(0x50); "address")]
    #[test_case("256", Err(()); "too_big")]
    fn byte_parser(text: &str, expected: Result<u8, ()>) {
        assert_eq!(byte(text).map_err(|_| ()), expected);
    }
}
