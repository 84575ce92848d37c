//! Decoding of signature blobs (ECMA-335 II.23.2).
//!
//! Signatures are decoded into whatever type representation the caller chooses: the
//! [`SignatureDecoder`] walks the blob and asks a [`SignatureTypeProvider`] to build every
//! node of the resulting type expression. The model module plugs in a provider producing
//! [`crate::metadata::model::MetadataType`] trees; tests use lightweight string providers.
//!
//! Malformed signatures are a hard failure: the binary is either corrupt or uses an
//! encoding this reader does not support, so no partial result is produced.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut decoder = SignatureDecoder::new(&provider, blob, &context);
//! let signature = decoder.decode_method_signature()?;
//! for parameter in &signature.parameter_types { /* ... */ }
//! ```

mod decoder;
mod provider;
mod types;

pub use decoder::SignatureDecoder;
pub use provider::SignatureTypeProvider;
pub use types::*;
