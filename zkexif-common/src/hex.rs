//! Lowercase hex as used in proof payloads.

use crate::error::{Error, Result};

pub fn to_hex(bytes: &[u8]) -> String {
    ::hex::encode(bytes)
}

/// Accepts either case. Odd lengths and non-hex characters are malformed.
pub fn from_hex(text: &str) -> Result<Vec<u8>> {
    if text.len() % 2 != 0 {
        return Err(Error::malformed(format!(
            "hex string has odd length {}",
            text.len()
        )));
    }
    ::hex::decode(text).map_err(|err| Error::malformed(format!("invalid hex: {err}")))
}
