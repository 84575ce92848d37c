//! Metadata streams and heaps (ECMA-335 II.24.2.2 - II.24.2.6).
//!
//! Heaps are thin borrowed views; every lookup is bounds checked against the stream. A
//! stream that is absent from the image behaves like an empty heap where only the null
//! index resolves.

mod blob;
mod guid;
mod streamheader;
mod strings;
mod tablesheader;
mod userstrings;

pub use blob::Blob;
pub use guid::Guid;
pub use streamheader::StreamHeader;
pub use strings::Strings;
pub use tablesheader::{Row, TablesHeader};
pub use userstrings::UserStrings;
