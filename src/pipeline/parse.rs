//! Response parsing: locate and strictly decode the JSON object embedded in
//! a model completion.
//!
//! ## Why bracket-scanning?
//!
//! Despite the prompt demanding JSON-only output, models habitually wrap the
//! object in prose ("Voici le résultat : …") or code fences. Slicing from
//! the first `{` to the last `}` tolerates any leading and trailing
//! commentary at the cost of mis-slicing if the surrounding prose itself
//! contains braces — acceptable given the constrained prompt, since the only
//! braces the model has reason to emit belong to the object itself.
//!
//! Decoding is strict: a located slice that does not parse is a typed
//! [`ParseError::MalformedJson`], never a panic and never a record with
//! half-decoded fields.

use crate::error::ParseError;
use crate::record::CardRecord;
use tracing::debug;

/// Parse a raw model response into a [`CardRecord`].
///
/// 1. Find the first `{` and the last `}`; either absent (or in the wrong
///    order) → [`ParseError::NoJsonFound`].
/// 2. Strictly decode the inclusive slice; decode failure →
///    [`ParseError::MalformedJson`].
/// 3. Map decoded keys onto the record by exact match; unknown keys are
///    ignored, missing keys stay `None`.
pub fn parse_record(raw: &str) -> Result<CardRecord, ParseError> {
    let start = raw.find('{').ok_or(ParseError::NoJsonFound)?;
    let end = raw.rfind('}').ok_or(ParseError::NoJsonFound)?;
    if end < start {
        return Err(ParseError::NoJsonFound);
    }

    let slice = &raw[start..=end];
    debug!(
        "Located JSON candidate: {} of {} chars",
        slice.len(),
        raw.len()
    );

    let value: serde_json::Value =
        serde_json::from_str(slice).map_err(|e| ParseError::MalformedJson {
            detail: e.to_string(),
        })?;

    let map = value.as_object().ok_or_else(|| ParseError::MalformedJson {
        detail: "top-level JSON value is not an object".into(),
    })?;

    Ok(CardRecord::from_object(map))
}
