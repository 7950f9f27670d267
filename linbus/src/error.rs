//! Error types shared by every bus and driver in the crate.

use std::path::PathBuf;

use nix::errno::Errno;

/// Errors surfaced by bus transactions, device handles and chip drivers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed request, always detected before any I/O.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The kernel or bus driver rejected a submitted transaction.
    #[error("Bus error: {0}")]
    Bus(#[source] Errno),

    /// A device file or handle could not be opened or configured.
    #[error("Failed to access {}: {source}", path.display())]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Environment configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A device did not reach the expected state before its deadline.
    #[error("Timed out waiting for {0}")]
    Timeout(String),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn resource(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        Self::Resource {
            path: path.into(),
            source: source.into(),
        }
    }

    /// True for bus failures a busy or briefly absent device may clear up.
    ///
    /// Linux I2C adapters report a missing ACK as `ENXIO` or `EREMOTEIO`
    /// (some as `EIO`), and arbitration or controller contention as `EAGAIN`
    /// or `EBUSY`.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Bus(
                Errno::ENXIO
                    | Errno::EREMOTEIO
                    | Errno::EIO
                    | Errno::EAGAIN
                    | Errno::EBUSY
                    | Errno::ETIMEDOUT
            )
        )
    }

    /// The OS error code behind a bus or resource failure, if any.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Error::Bus(errno) => Some(*errno),
            Error::Resource { source, .. } => source.raw_os_error().map(Errno::from_raw),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Errno::ENXIO, true; "nack")]
    #[test_case(Errno::EREMOTEIO, true; "remote_io")]
    #[test_case(Errno::EAGAIN, true; "arbitration")]
    #[test_case(Errno::EOPNOTSUPP, false; "unsupported")]
    #[test_case(Errno::EINVAL, false; "rejected_option")]
    fn transient_classification(errno: Errno, transient: bool) {
        assert_eq!(Error::Bus(errno).is_transient(), transient);
    }

    #[test]
    fn non_bus_errors_are_never_transient() {
        assert!(!Error::invalid("bad").is_transient());
        assert!(!Error::Timeout("conversion".into()).is_transient());
        let enoent = std::io::Error::from_raw_os_error(nix::libc::ENOENT);
        let err = Error::resource("/dev/i2c-9", enoent);
        assert!(!err.is_transient());
        assert_eq!(err.errno(), Some(Errno::ENOENT));
    }
}
