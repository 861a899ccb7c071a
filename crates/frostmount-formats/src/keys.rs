//! 128-bit identifiers and SHA-1 digests used across superbundle formats

use binrw::{BinRead, BinWrite};
use std::fmt;

/// 128-bit identifier used to key chunks
///
/// Stored on disk in the engine's native byte order. [`fmt::Display`] renders
/// the conventional dashed form with the first three groups little-endian.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Guid([u8; 16]);

impl Guid {
    /// All-zero identifier
    pub const NIL: Self = Self([0u8; 16]);

    /// Create an identifier from raw bytes
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Parse an identifier from 32 hex characters in on-disk byte order
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(hex, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Get raw bytes
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string in on-disk byte order
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{}",
            b[3],
            b[2],
            b[1],
            b[0],
            b[5],
            b[4],
            b[7],
            b[6],
            b[8],
            b[9],
            hex::encode(&b[10..])
        )
    }
}

impl From<[u8; 16]> for Guid {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

/// SHA-1 digest referencing content-addressed payloads
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Sha1([u8; 20]);

impl Sha1 {
    /// Create a digest from raw bytes
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse a digest from 40 hex characters
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Get raw bytes
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Sha1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 20]> for Sha1 {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_display_uses_mixed_endian_groups() {
        let guid = Guid::from_hex("00112233445566778899aabbccddeeff").expect("valid hex");
        assert_eq!(guid.to_string(), "33221100-5544-7766-8899-aabbccddeeff");
        assert_eq!(guid.to_hex(), "00112233445566778899aabbccddeeff");
    }

    #[test]
    fn test_sha1_hex_round_trip() {
        let hex = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
        let sha1 = Sha1::from_hex(hex).expect("valid hex");
        assert_eq!(sha1.to_string(), hex);
    }

    #[test]
    fn test_invalid_length_rejected() {
        assert!(Guid::from_hex("0011").is_err());
        assert!(Sha1::from_hex("zz").is_err());
    }
}
