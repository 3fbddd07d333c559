// src/error.rs

use thiserror::Error;

/// Core error types for rpmrepo
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid argument or structurally broken input
    #[error("Bad argument: {0}")]
    BadArg(String),

    /// Buffer allocation failure
    #[error("Out of memory: {0}")]
    Memory(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading from a (possibly compressed) stream failed
    #[error("Read error: {0}")]
    Read(String),

    /// Closing or finishing a (possibly compressed) stream failed
    #[error("Error while closing: {0}")]
    Close(String),

    /// Malformed XML document
    #[error("Parse error at line: {line} ({message})")]
    XmlParse { line: usize, message: String },

    /// A parser callback stopped the parse
    #[error("Parsing interrupted: {0}")]
    CallbackInterrupted(String),

    /// Malformed binary RPM header
    #[error("Invalid RPM header: {0}")]
    Header(String),

    /// XML serialization failed
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Unknown or unsupported compression
    #[error("Compression error: {0}")]
    Compression(String),

    /// Unknown checksum type
    #[error("Unknown/Unsupported checksum type \"{0}\"")]
    Checksum(String),
}

impl Error {
    /// Numeric code of the error, stable across releases
    pub fn code(&self) -> i32 {
        match self {
            Error::BadArg(_) => 2,
            Error::Memory(_) => 3,
            Error::Io(_) => 4,
            Error::Read(_) => 5,
            Error::Close(_) => 6,
            Error::XmlParse { .. } => 7,
            Error::CallbackInterrupted(_) => 8,
            Error::Header(_) => 9,
            Error::Xml(_) => 10,
            Error::Compression(_) => 11,
            Error::Checksum(_) => 12,
        }
    }

    /// Prefix the message of an error, keeping its variant (and code)
    pub(crate) fn prefixed(self, prefix: &str) -> Self {
        match self {
            Error::BadArg(msg) => Error::BadArg(format!("{prefix}{msg}")),
            Error::Memory(msg) => Error::Memory(format!("{prefix}{msg}")),
            Error::Io(e) => Error::Io(std::io::Error::new(e.kind(), format!("{prefix}{e}"))),
            Error::Read(msg) => Error::Read(format!("{prefix}{msg}")),
            Error::Close(msg) => Error::Close(format!("{prefix}{msg}")),
            Error::XmlParse { line, message } => Error::XmlParse {
                line,
                message: format!("{prefix}{message}"),
            },
            Error::CallbackInterrupted(msg) => {
                Error::CallbackInterrupted(format!("{prefix}{msg}"))
            }
            Error::Header(msg) => Error::Header(format!("{prefix}{msg}")),
            Error::Compression(msg) => Error::Compression(format!("{prefix}{msg}")),
            other => other,
        }
    }
}

/// Result type alias using rpmrepo's Error type
pub type Result<T> = std::result::Result<T, Error>;
