//! Header wrapping for generated documents

use super::{
    BODY_OFFSET, HeaderError, HeaderKind, HeaderResult, KEY_OFFSET, KEY_SIZE, MAGIC_OBFUSCATED_V0,
    MAGIC_SIGNED, XOR_SEED,
};

/// Key used by [`wrap_document_body`] for obfuscated output
pub const DEFAULT_KEY: [u8; KEY_SIZE] = default_key();

const fn default_key() -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    let mut i = 0;
    while i < KEY_SIZE {
        key[i] = (i.wrapping_mul(37).wrapping_add(11) & 0xFF) as u8;
        i += 1;
    }
    key
}

/// Prefix a DbObject body with the header for `kind`
pub fn wrap_document_body(kind: HeaderKind, body: &[u8]) -> HeaderResult<Vec<u8>> {
    match kind {
        HeaderKind::Plain => Ok(body.to_vec()),
        HeaderKind::Signed => {
            let mut out = Vec::with_capacity(BODY_OFFSET as usize + body.len());
            out.extend_from_slice(&MAGIC_SIGNED.to_le_bytes());
            out.resize(BODY_OFFSET as usize, 0);
            out.extend_from_slice(body);
            Ok(out)
        }
        HeaderKind::Obfuscated => Ok(wrap_obfuscated(body, &DEFAULT_KEY)),
        HeaderKind::Unknown(magic) => Err(HeaderError::UnknownMagic(magic)),
    }
}

/// Obfuscate a body with an explicit key
pub fn wrap_obfuscated(body: &[u8], key: &[u8; KEY_SIZE]) -> Vec<u8> {
    let mut out = Vec::with_capacity(BODY_OFFSET as usize + body.len());
    out.extend_from_slice(&MAGIC_OBFUSCATED_V0.to_le_bytes());
    out.resize(KEY_OFFSET as usize, 0);
    out.extend_from_slice(key);
    out.resize(BODY_OFFSET as usize, 0);
    out.extend(
        body.iter()
            .enumerate()
            .map(|(i, b)| b ^ key[i % KEY_SIZE] ^ XOR_SEED),
    );
    out
}
