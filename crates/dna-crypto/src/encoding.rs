//! Hex and base64 codecs shared by every record envelope.

use base64::Engine;

use crate::Result;

pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

pub fn from_hex(s: &str) -> Result<Vec<u8>> {
    Ok(hex::decode(s)?)
}

pub fn to_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn from_base64(s: &str) -> Result<Vec<u8>> {
    Ok(base64::engine::general_purpose::STANDARD.decode(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let bytes = vec![0u8, 1, 255, 42];
        assert_eq!(from_hex(&to_hex(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn base64_roundtrip() {
        let bytes = vec![5u8, 200, 3, 9, 255];
        assert_eq!(from_base64(&to_base64(&bytes)).unwrap(), bytes);
    }
}
