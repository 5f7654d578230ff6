//! Error types for synthcap.

use thiserror::Error;

/// Main error type of the capture construction engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid generation parameters. Generation does not start.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Input outside of the domain of the temporal model
    #[error("Domain error: {0}")]
    Domain(String),

    /// A field does not fit in its bit width
    #[error("Cannot encode {field}: {value} is outside {valid_range}")]
    Encoding {
        field: &'static str,
        value: u64,
        valid_range: &'static str,
    },

    /// Input too short to hold a header
    #[error("{layer}: input too short (need {needed} bytes, have {have})")]
    Truncated {
        layer: &'static str,
        needed: usize,
        have: usize,
    },

    /// Input that is not a header of the expected kind
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Ill-formed configuration file
    #[error("Cannot parse the configuration file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The staged capture could not be moved to its destination
    #[error("Cannot commit the capture file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn truncated(layer: &'static str, needed: usize, have: usize) -> Self {
        Error::Truncated {
            layer,
            needed,
            have,
        }
    }

    pub(crate) fn encoding(field: &'static str, value: u64, valid_range: &'static str) -> Self {
        Error::Encoding {
            field,
            value,
            valid_range,
        }
    }
}

/// Fail with an encoding error when `value` does not fit on `bits` bits
pub(crate) fn check_bits(
    field: &'static str,
    value: u64,
    bits: u32,
    valid_range: &'static str,
) -> Result<()> {
    if value >> bits != 0 {
        Err(Error::encoding(field, value, valid_range))
    } else {
        Ok(())
    }
}

/// Narrow a wide integer, typically read from a configuration file, to its wire type
pub(crate) fn narrow<T: TryFrom<u64>>(
    field: &'static str,
    value: u64,
    valid_range: &'static str,
) -> Result<T> {
    T::try_from(value).map_err(|_| Error::encoding(field, value, valid_range))
}
