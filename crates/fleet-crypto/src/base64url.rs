//! URL-safe base64 codec used for JWT segments and opaque tokens.
//!
//! No padding is emitted on encode; decode re-pads the input to a multiple
//! of 4 characters before decoding, since some callers (and the wire format
//! itself) never carry the trailing `=`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

pub fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    // URL_SAFE_NO_PAD already tolerates missing padding; re-padding is kept
    // explicit because some callers hand us segments copied from contexts
    // that do add padding.
    let trimmed = input.trim_end_matches('=');
    URL_SAFE_NO_PAD.decode(trimmed)
}
