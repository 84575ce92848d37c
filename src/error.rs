use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into three groups:
///
/// ## Binary Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid metadata, signature or catalog structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of a buffer
/// - [`Error::NotSupported`] - Unsupported file format or metadata feature
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::RecursionLimit`] - Signature nesting exceeded the configured depth
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::GoblinErr`] - PE parsing errors from the goblin crate
/// - [`Error::Xml`] / [`Error::XmlAttribute`] - Unreadable index documents
///
/// ## Catalog Errors
/// - [`Error::Catalog`] - Internal consistency violations while writing a catalog, or
///   integrity problems reported by a builder running in strict mode
///
/// Enum-width ambiguity in custom attributes never surfaces as an error; decoding such an
/// attribute simply yields `None`.
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// Carries the source location where the problem was detected to ease debugging of
    /// unusual binaries.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred! - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// This file type or metadata feature is not supported.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Other errors that don't fit specific categories.
    #[error("{0}")]
    Error(String),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// Recursion limit reached while decoding a nested structure.
    ///
    /// Deeply nested signatures are either corrupt or adversarial; the associated value is
    /// the limit that was hit.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// An index document could not be read as XML.
    #[error("XML - {0}")]
    Xml(#[from] quick_xml::Error),

    /// An attribute of an index document element could not be read.
    #[error("XML attribute - {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    /// Catalog consistency failure.
    ///
    /// Raised by the writer when a row references an entity that was never assigned a
    /// handle, and by a strict-mode builder for any integrity problem in its input.
    #[error("Catalog - {0}")]
    Catalog(String),
}
