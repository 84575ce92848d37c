//! Custom attribute value decoding (ECMA-335 II.23.3).
//!
//! A custom attribute blob starts with the prolog `0x0001`, followed by one value per
//! constructor parameter and a count of named field and property assignments. Fixed
//! arguments carry no type information of their own, so the constructor signature is decoded
//! first and drives the reading of the blob. Named arguments carry a serialization type code.
//!
//! # Enum arguments
//!
//! An enum value is stored with the width of the enum's underlying type, which is only known
//! from the enum's definition, possibly in another file. Rather than resolving it, the
//! decoder assumes a width per enum and lets [`EnumWidthGuesses`] pick another one when a
//! decode fails: a wrong width leaves trailing bytes or runs past the end of the blob, so the
//! failure is cheap to detect. Widths that led to a successful decode are committed to the
//! module and tried first for later attributes.
//!
//! [`decode_custom_attribute`] runs this retry loop; callers with their own sanity checks pass
//! a plausibility callback that can reject a structurally valid decode and force the next
//! combination of widths.
//!
//! # Examples
//!
//! ```rust,no_run
//! use apiscope::metadata::{customattributes::decode_custom_attribute, model::MetadataFile};
//! use std::path::Path;
//!
//! let file = MetadataFile::open(Path::new("MyLibrary.dll"))?;
//! let module = file.manifest_module();
//! for attribute in module.assembly_custom_attributes() {
//!     if let Some(value) = decode_custom_attribute(&attribute, None) {
//!         println!("{} fixed, {} named", value.fixed_args.len(), value.named_args.len());
//!     }
//! }
//! # Ok::<(), apiscope::Error>(())
//! ```

mod decoder;
mod guesses;
mod types;

pub use decoder::CustomAttributeDecoder;
pub use guesses::{EnumWidth, EnumWidthGuesses, MAX_ATTEMPTS};
pub use types::*;

use crate::metadata::model::CustomAttribute;

/// Callback rejecting decoded values that are structurally valid but make no sense to the
/// caller.
pub type Plausibility<'p> = &'p dyn Fn(&CustomAttributeValue) -> bool;

/// Decode the value of `attribute`, retrying with other enum widths until a decode succeeds
/// and passes `plausible`.
///
/// Returns `None` if the constructor can't be used, the blob can't be read, or every
/// combination of enum widths failed.
#[must_use]
pub fn decode_custom_attribute(
    attribute: &CustomAttribute<'_>,
    plausible: Option<Plausibility<'_>>,
) -> Option<CustomAttributeValue> {
    let mut guesses = EnumWidthGuesses::new();
    decode_custom_attribute_with(attribute, &mut guesses, plausible)
}

/// [`decode_custom_attribute`] with caller provided guess state, so the number of attempts
/// can be observed.
pub fn decode_custom_attribute_with(
    attribute: &CustomAttribute<'_>,
    guesses: &mut EnumWidthGuesses,
    plausible: Option<Plausibility<'_>>,
) -> Option<CustomAttributeValue> {
    let module = attribute.module();
    let constructor = attribute.constructor().ok()?;
    let blob = attribute.value_blob().ok()?;
    let decoder = CustomAttributeDecoder::new(module);

    loop {
        guesses.begin_attempt();

        let value = decoder
            .try_decode(constructor, blob, guesses)
            .filter(|value| plausible.map_or(true, |plausible| plausible(value)));
        if let Some(value) = value {
            guesses.commit(module.enum_widths());
            return Some(value);
        }

        if !guesses.has_touched() || guesses.attempts() >= MAX_ATTEMPTS || !guesses.advance() {
            tracing::trace!(
                "Giving up on custom attribute {} after {} attempts",
                attribute.token(),
                guesses.attempts()
            );
            return None;
        }
    }
}
