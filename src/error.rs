use std::fmt::{self, Debug, Display};
use std::io;
use std::string::FromUtf8Error;

/// Provides `PropertyError` and maps other errors to
/// convert to a `PropertyError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum PropertyError {
    /// A raw type tag outside of the known set of property types.
    UnknownPropertyType(u32),
    /// A read asked for more bits than the stream has left.
    UnexpectedEndOfStream {
        requested: usize,
        remaining: usize,
    },
    /// A decoded quantity exceeds what the descriptor (or the decode options) permit.
    ValueOutOfRange {
        name: String,
        value: u64,
        max: u64,
    },
    /// An array descriptor with no element descriptor.
    MissingArrayElement(String),
    /// A bit count larger than the read operation supports.
    InvalidBitCount(u32),
    InvalidUtf8(FromUtf8Error),
    IoError(io::Error),
    JsonError(serde_json::Error),
    PropertyError(String),
}

impl From<io::Error> for PropertyError {
    fn from(error: io::Error) -> Self {
        PropertyError::IoError(error)
    }
}

impl From<serde_json::Error> for PropertyError {
    fn from(error: serde_json::Error) -> Self {
        PropertyError::JsonError(error)
    }
}

impl From<FromUtf8Error> for PropertyError {
    fn from(error: FromUtf8Error) -> Self {
        PropertyError::InvalidUtf8(error)
    }
}

impl From<String> for PropertyError {
    fn from(error: String) -> Self {
        PropertyError::PropertyError(error)
    }
}

impl From<&str> for PropertyError {
    fn from(error: &str) -> Self {
        PropertyError::PropertyError(error.to_string())
    }
}

impl std::error::Error for PropertyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PropertyError::InvalidUtf8(error) => Some(error),
            PropertyError::IoError(error) => Some(error),
            PropertyError::JsonError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PropertyError::UnknownPropertyType(tag) => {
                write!(f, "Error: unknown property type tag {tag}")
            }
            PropertyError::UnexpectedEndOfStream {
                requested,
                remaining,
            } => write!(
                f,
                "Error: requested {requested} bits but only {remaining} remain in the stream"
            ),
            PropertyError::ValueOutOfRange { name, value, max } => write!(
                f,
                "Error: value {value} for property `{name}` exceeds the maximum of {max}"
            ),
            PropertyError::MissingArrayElement(name) => {
                write!(f, "Error: array property `{name}` has no element descriptor")
            }
            PropertyError::InvalidBitCount(bits) => {
                write!(f, "Error: cannot read {bits} bits in a single operation")
            }
            _ => write!(f, "Error: {self:?}"),
        }
    }
}
