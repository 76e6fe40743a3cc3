//! Opaque pagination cursor: base64 of a decimal offset (spec §4.7,
//! "opaque string encoding an offset").

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use flit_core::error::{FlitError, Result};

pub fn encode(offset: i64) -> String {
    URL_SAFE_NO_PAD.encode(offset.to_string())
}

pub fn decode(cursor: &str) -> Result<i64> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| FlitError::ValidationFailed("invalid cursor".to_string()))?;
    let s = String::from_utf8(bytes)
        .map_err(|_| FlitError::ValidationFailed("invalid cursor".to_string()))?;
    s.parse::<i64>()
        .map_err(|_| FlitError::ValidationFailed("invalid cursor".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        assert_eq!(decode(&encode(42)).unwrap(), 42);
        assert_eq!(decode(&encode(0)).unwrap(), 0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode("not-a-cursor!!!").is_err());
    }
}
