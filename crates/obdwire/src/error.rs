// crates/obdwire/src/error.rs

use core::fmt;

/// Errors surfaced across the engine boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObdError {
    /// The definitions document could not be parsed.
    XmlParsing {
        /// Byte offset into the document where parsing stopped.
        offset: u64,
        description: String,
    },
    /// The script evaluator could not be set up, or a decoder script in the
    /// catalog failed to compile.
    ScriptContextSetup(String),
    /// The catalog does not describe the requested parameter, or its
    /// description is malformed.
    BuildFailed(String),
    /// Received frames could not be validated and decoded.
    ParseFailed(String),
    /// A hex byte string was not exactly two hex digits.
    InvalidHex(String),
}

impl fmt::Display for ObdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::XmlParsing {
                offset,
                description,
            } => {
                write!(
                    f,
                    "could not parse definitions XML at offset {}: {}",
                    offset, description
                )
            }
            Self::ScriptContextSetup(s) => write!(f, "script context setup failed: {}", s),
            Self::BuildFailed(s) => write!(f, "could not build parameter frame: {}", s),
            Self::ParseFailed(s) => write!(f, "could not parse parameter frame: {}", s),
            Self::InvalidHex(s) => write!(f, "invalid hex byte string: {:?}", s),
        }
    }
}

impl std::error::Error for ObdError {}

impl From<hex::FromHexError> for ObdError {
    fn from(e: hex::FromHexError) -> Self {
        ObdError::InvalidHex(e.to_string())
    }
}
