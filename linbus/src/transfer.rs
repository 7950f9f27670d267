//! Transfer specifications and the transactions built from them.
//!
//! A caller describes a bus transaction as an ordered list of
//! [`TransferSpec`]s. [`Transaction::build`] turns that list into one owned,
//! fixed-size buffer per write or read, which a bus backend then hands to the
//! kernel in a single call. The buffers are boxed slices: they never grow or
//! move while the transaction is borrowed, so the raw pointers a backend
//! places in kernel records stay valid for the whole call.
//!
//! ```text
//! [Write("AB"), Read(7), Skip, Write([0, 0, 0])]
//!        │         │       │         │
//!        ▼         ▼       ▼         ▼
//!    [41 42]   [00 x 7]  (none)   [00 00 00]     descriptors, in order
//!                  │
//!                  ▼
//!         [[b0 .. b6]]                           reads only, after submit
//! ```

use std::fmt;

use crate::error::{Error, Result};

/// Largest length a single descriptor may carry (16-bit kernel length field).
pub const MAX_TRANSFER_LEN: usize = u16::MAX as usize;

/// Write data in the shapes call sites naturally have.
///
/// Every shape is normalized to one canonical byte sequence by
/// [`Payload::to_bytes`]; integers outside 0-255 are rejected there rather
/// than truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// One integer, sent as a single byte.
    Int(i64),
    /// A sequence of integers, one byte each.
    Ints(Vec<i64>),
    /// Raw bytes, copied as-is.
    Bytes(Vec<u8>),
    /// Text, sent as its UTF-8 encoding.
    Text(String),
}

impl Payload {
    /// Coerce the payload into its byte sequence.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Payload::Int(value) => Ok(vec![byte(*value)?]),
            Payload::Ints(values) => values.iter().map(|v| byte(*v)).collect(),
            Payload::Bytes(bytes) => Ok(bytes.clone()),
            Payload::Text(text) => Ok(text.as_bytes().to_vec()),
        }
    }
}

fn byte(value: i64) -> Result<u8> {
    u8::try_from(value)
        .map_err(|_| Error::invalid(format!("Payload value {} does not fit in a byte", value)))
}

impl From<u8> for Payload {
    fn from(value: u8) -> Self {
        Payload::Int(value.into())
    }
}

impl From<i32> for Payload {
    fn from(value: i32) -> Self {
        Payload::Int(value.into())
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Int(value)
    }
}

impl From<Vec<i64>> for Payload {
    fn from(values: Vec<i64>) -> Self {
        Payload::Ints(values)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Payload {
    fn from(bytes: [u8; N]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Payload {
    fn from(bytes: &[u8; N]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

/// One step of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferSpec {
    /// Send the payload.
    Write(Payload),
    /// Receive this many bytes.
    Read(usize),
    /// Placeholder that produces no bus activity.
    Skip,
}

impl TransferSpec {
    pub fn write(payload: impl Into<Payload>) -> Self {
        TransferSpec::Write(payload.into())
    }

    pub fn read(len: usize) -> Self {
        TransferSpec::Read(len)
    }

    /// Expand the "write, read, write, read, ..." register idiom into tags.
    ///
    /// Even positions are writes and odd positions are reads; `None` skips
    /// that slot. A read slot must hold a single integer, the byte count.
    pub fn alternating(items: impl IntoIterator<Item = Option<Payload>>) -> Result<Vec<Self>> {
        items
            .into_iter()
            .enumerate()
            .map(|(n, item)| match item {
                None => Ok(TransferSpec::Skip),
                Some(payload) if n % 2 == 0 => Ok(TransferSpec::Write(payload)),
                Some(Payload::Int(len)) => usize::try_from(len)
                    .map(TransferSpec::Read)
                    .map_err(|_| Error::invalid(format!("Negative read length {}", len))),
                Some(other) => Err(Error::invalid(format!(
                    "Read slot {} must be a byte count, got {:?}",
                    n, other
                ))),
            })
            .collect()
    }

    fn is_skip(&self) -> bool {
        matches!(self, TransferSpec::Skip)
    }
}

/// Direction of one descriptor, from the bus master's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

/// One buffer-backed segment of a transaction.
#[derive(Debug)]
pub struct Descriptor {
    direction: Direction,
    buf: Box<[u8]>,
}

impl Descriptor {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Payload for writes, received data (after submission) for reads.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Storage the kernel reads from or writes into.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

/// An ordered list of descriptors submitted to the bus as one unit.
#[derive(Debug)]
pub struct Transaction {
    descriptors: Vec<Descriptor>,
}

impl Transaction {
    /// Build a transaction from `specs`, allowing at most `max` descriptors.
    ///
    /// The descriptor count is checked before any buffer is allocated.
    pub fn build(specs: &[TransferSpec], max: usize) -> Result<Self> {
        let count = specs.iter().filter(|s| !s.is_skip()).count();
        if count == 0 {
            return Err(Error::invalid("Transaction has no transfers"));
        }
        if count > max {
            return Err(Error::invalid(format!(
                "Transaction has {} transfers, limit is {}",
                count, max
            )));
        }

        let mut descriptors = Vec::with_capacity(count);
        for spec in specs {
            let (direction, buf) = match spec {
                TransferSpec::Skip => continue,
                TransferSpec::Write(payload) => (Direction::Write, payload.to_bytes()?),
                TransferSpec::Read(len) => (Direction::Read, vec![0u8; check_len(*len)?]),
            };
            check_len(buf.len())?;
            descriptors.push(Descriptor {
                direction,
                buf: buf.into_boxed_slice(),
            });
        }

        Ok(Self { descriptors })
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn descriptors_mut(&mut self) -> &mut [Descriptor] {
        &mut self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Consume the transaction, keeping only read buffers in their order.
    pub fn into_reads(self) -> Vec<Vec<u8>> {
        self.descriptors
            .into_iter()
            .filter(|d| d.direction == Direction::Read)
            .map(|d| d.buf.into_vec())
            .collect()
    }
}

fn check_len(len: usize) -> Result<usize> {
    if len == 0 || len > MAX_TRANSFER_LEN {
        return Err(Error::invalid(format!(
            "Transfer length {} outside 1..={}",
            len, MAX_TRANSFER_LEN
        )));
    }
    Ok(len)
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Write => write!(f, "write {} {:02x?}", self.len(), self.data()),
            Direction::Read => write!(f, "read {}", self.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Payload::Int(0x41), &[0x41]; "single_int")]
    #[test_case(Payload::Int(255), &[0xff]; "int_upper_bound")]
    #[test_case(Payload::Ints(vec![1, 2, 3]), &[1, 2, 3]; "int_sequence")]
    #[test_case(Payload::Bytes(vec![0, 0xff]), &[0, 0xff]; "raw_bytes")]
    #[test_case(Payload::Text("hé".into()), &[0x68, 0xc3, 0xa9]; "utf8_text")]
    fn coercion(payload: Payload, expected: &[u8]) {
        assert_eq!(payload.to_bytes().unwrap(), expected);
    }

    #[test_case(Payload::Int(256); "int_too_large")]
    #[test_case(Payload::Int(-1); "negative_int")]
    #[test_case(Payload::Ints(vec![1, 300]); "sequence_element")]
    fn coercion_rejects_out_of_range(payload: Payload) {
        assert!(matches!(payload.to_bytes(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn text_matches_manual_encoding() {
        let text = "register\u{2603}";
        let coerced = Payload::from(text).to_bytes().unwrap();
        assert_eq!(coerced, text.as_bytes());
    }

    #[test]
    fn build_preserves_order_and_skips() {
        let specs = [
            TransferSpec::write([0x41u8, 0x42]),
            TransferSpec::Skip,
            TransferSpec::read(7),
            TransferSpec::write(vec![0u8, 0, 0]),
        ];
        let txn = Transaction::build(&specs, 42).unwrap();

        let shape: Vec<_> = txn
            .descriptors()
            .iter()
            .map(|d| (d.direction(), d.len()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (Direction::Write, 2),
                (Direction::Read, 7),
                (Direction::Write, 3),
            ]
        );
        assert_eq!(txn.descriptors()[1].data(), &[0u8; 7]);
    }

    #[test]
    fn count_bound_is_checked() {
        let mut specs = vec![TransferSpec::read(1); 43];
        assert!(matches!(
            Transaction::build(&specs, 42),
            Err(Error::InvalidArgument(_))
        ));

        // Skips do not count towards the limit.
        specs[0] = TransferSpec::Skip;
        assert_eq!(Transaction::build(&specs, 42).unwrap().len(), 42);
    }

    #[test]
    fn count_bound_precedes_payload_validation() {
        // The 43rd entry is malformed, but the count check fires first.
        let mut specs = vec![TransferSpec::write(1); 42];
        specs.push(TransferSpec::write(Payload::Int(1000)));
        let err = Transaction::build(&specs, 42).unwrap_err();
        assert!(err.to_string().contains("limit is 42"));
    }

    #[test]
    fn empty_and_all_skip_are_rejected() {
        assert!(Transaction::build(&[], 42).is_err());
        assert!(Transaction::build(&[TransferSpec::Skip, TransferSpec::Skip], 42).is_err());
    }

    #[test_case(TransferSpec::read(0); "zero_read")]
    #[test_case(TransferSpec::read(MAX_TRANSFER_LEN + 1); "oversized_read")]
    #[test_case(TransferSpec::write(Vec::<u8>::new()); "empty_write")]
    fn length_bounds(spec: TransferSpec) {
        assert!(matches!(
            Transaction::build(&[spec], 42),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn write_buffers_are_not_aliased() {
        let specs = [TransferSpec::write([1u8, 2, 3]), TransferSpec::write([4u8, 5, 6])];
        let mut txn = Transaction::build(&specs, 42).unwrap();
        txn.descriptors_mut()[0].data_mut()[0] = 0xee;

        assert_eq!(txn.descriptors()[0].data(), &[0xee, 2, 3]);
        assert_eq!(txn.descriptors()[1].data(), &[4, 5, 6]);
        assert_ne!(
            txn.descriptors()[0].data().as_ptr(),
            txn.descriptors()[1].data().as_ptr()
        );
    }

    #[test]
    fn into_reads_drops_writes() {
        let specs = [
            TransferSpec::write(1),
            TransferSpec::read(2),
            TransferSpec::write(2),
            TransferSpec::read(1),
        ];
        let mut txn = Transaction::build(&specs, 42).unwrap();
        txn.descriptors_mut()[1].data_mut().copy_from_slice(&[0xaa, 0xbb]);
        txn.descriptors_mut()[3].data_mut()[0] = 0xcc;

        assert_eq!(txn.into_reads(), vec![vec![0xaa, 0xbb], vec![0xcc]]);
    }

    #[test]
    fn alternating_form() {
        let specs =
            TransferSpec::alternating([Some(Payload::from([0x41u8, 0x42])), Some(7.into()), None, None])
                .unwrap();
        assert_eq!(
            specs,
            vec![
                TransferSpec::Write(Payload::Bytes(vec![0x41, 0x42])),
                TransferSpec::Read(7),
                TransferSpec::Skip,
                TransferSpec::Skip,
            ]
        );

        // A register pointer write followed by a skipped write slot and a read.
        let specs = TransferSpec::alternating([None, Some(2.into())]).unwrap();
        assert_eq!(specs, vec![TransferSpec::Skip, TransferSpec::Read(2)]);
    }

    #[test]
    fn alternating_read_slot_must_be_a_count() {
        assert!(TransferSpec::alternating([Some(0.into()), Some("abc".into())]).is_err());
        assert!(TransferSpec::alternating([Some(0.into()), Some((-3i64).into())]).is_err());
    }

    mod properties {
        use super::*;
        use proptest::collection::vec;
        use proptest::prelude::*;

        fn any_spec() -> impl Strategy<Value = TransferSpec> {
            prop_oneof![
                vec(any::<u8>(), 1..8).prop_map(|bytes| TransferSpec::write(bytes)),
                (1usize..8).prop_map(TransferSpec::Read),
                Just(TransferSpec::Skip),
            ]
        }

        fn out_of_range() -> impl Strategy<Value = i64> {
            prop_oneof![i64::MIN..0i64, 256i64..=i64::MAX]
        }

        proptest! {
            #[test]
            fn single_byte_coerces_to_itself(value: u8) {
                prop_assert_eq!(Payload::from(value).to_bytes().unwrap(), vec![value]);
            }

            #[test]
            fn bytes_coerce_to_themselves(bytes in vec(any::<u8>(), 0..64)) {
                prop_assert_eq!(Payload::from(bytes.clone()).to_bytes().unwrap(), bytes);
            }

            #[test]
            fn text_coerces_to_utf8(text in ".*") {
                prop_assert_eq!(
                    Payload::from(text.clone()).to_bytes().unwrap(),
                    text.into_bytes()
                );
            }

            #[test]
            fn byte_range_ints_coerce(values in vec(0i64..=255, 0..32)) {
                let expected: Vec<u8> = values.iter().map(|&v| v as u8).collect();
                prop_assert_eq!(Payload::Ints(values).to_bytes().unwrap(), expected);
            }

            #[test]
            fn any_out_of_range_int_is_rejected(
                mut values in vec(0i64..=255, 0..16),
                bad in out_of_range(),
                at in any::<prop::sample::Index>()
            ) {
                values.insert(at.index(values.len() + 1), bad);
                prop_assert!(matches!(
                    Payload::Ints(values).to_bytes(),
                    Err(Error::InvalidArgument(_))
                ));
            }

            #[test]
            fn equal_length_writes_keep_their_own_bytes(
                (first, second) in (1usize..32)
                    .prop_flat_map(|n| (vec(any::<u8>(), n), vec(any::<u8>(), n)))
                    .prop_filter("payloads differ", |(a, b)| a != b)
            ) {
                let specs = [
                    TransferSpec::write(first.clone()),
                    TransferSpec::write(second.clone()),
                ];
                let txn = Transaction::build(&specs, 42).unwrap();
                prop_assert_eq!(txn.descriptors()[0].data(), first.as_slice());
                prop_assert_eq!(txn.descriptors()[1].data(), second.as_slice());
            }

            #[test]
            fn into_reads_keeps_reads_in_order(specs in vec(any_spec(), 1..42)) {
                prop_assume!(specs.iter().any(|s| !s.is_skip()));
                let mut txn = Transaction::build(&specs, 42).unwrap();

                // Stamp each read with its descriptor index.
                let mut expected = Vec::new();
                for (n, descriptor) in txn.descriptors_mut().iter_mut().enumerate() {
                    if descriptor.direction() == Direction::Read {
                        descriptor.data_mut().fill(n as u8);
                        expected.push(vec![n as u8; descriptor.len()]);
                    }
                }
                let reads: Vec<usize> = specs
                    .iter()
                    .filter_map(|s| match s {
                        TransferSpec::Read(len) => Some(*len),
                        _ => None,
                    })
                    .collect();

                let result = txn.into_reads();
                prop_assert_eq!(result.iter().map(Vec::len).collect::<Vec<_>>(), reads);
                prop_assert_eq!(result, expected);
            }
        }
    }
}
