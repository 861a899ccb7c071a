//! DbObject serializer

use super::{DbValue, FLAG_ANONYMOUS, TYPE_END};

/// Serializes values into a byte buffer
///
/// Container sizes are computed from the serialized children so output
/// always satisfies the reader's size checks.
pub struct DbWriter<'w> {
    out: &'w mut Vec<u8>,
}

impl<'w> DbWriter<'w> {
    /// Writer appending to `out`
    pub const fn new(out: &'w mut Vec<u8>) -> Self {
        Self { out }
    }

    /// Write one entry, anonymous when `name` is `None`
    pub fn write_value(&mut self, name: Option<&str>, value: &DbValue) {
        let mut tag = value.type_code();
        if name.is_none() {
            tag |= FLAG_ANONYMOUS;
        }
        self.out.push(tag);
        if let Some(name) = name {
            self.out.extend_from_slice(name.as_bytes());
            self.out.push(0);
        }

        match value {
            DbValue::List(items) => {
                let mut body = Vec::new();
                let mut child = DbWriter::new(&mut body);
                for item in items {
                    child.write_value(None, item);
                }
                self.write_container(&body);
            }
            DbValue::Object(object) => {
                let mut body = Vec::new();
                let mut child = DbWriter::new(&mut body);
                for field in object.fields() {
                    child.write_value(Some(&field.name), &field.value);
                }
                self.write_container(&body);
            }
            DbValue::Bool(v) => self.out.push(u8::from(*v)),
            DbValue::String(s) => {
                self.write_leb128(s.len() as u64 + 1);
                self.out.extend_from_slice(s.as_bytes());
                self.out.push(0);
            }
            DbValue::Int(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            DbValue::Long(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            DbValue::Float(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            DbValue::Double(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            DbValue::Guid(v) => self.out.extend_from_slice(v.as_bytes()),
            DbValue::Sha1(v) => self.out.extend_from_slice(v.as_bytes()),
            DbValue::Blob(bytes) => {
                self.write_leb128(bytes.len() as u64);
                self.out.extend_from_slice(bytes);
            }
        }
    }

    fn write_container(&mut self, body: &[u8]) {
        self.write_leb128(body.len() as u64 + 1);
        self.out.extend_from_slice(body);
        self.out.push(TYPE_END);
    }

    fn write_leb128(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.out.push(byte);
                return;
            }
            self.out.push(byte | 0x80);
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dbobject::DbObject;

    #[test]
    fn test_string_length_counts_terminator() {
        let bytes = DbValue::from("hi").build();
        assert_eq!(bytes, vec![0x87, 0x03, b'h', b'i', 0x00]);
    }

    #[test]
    fn test_multi_byte_container_size() {
        let blob = DbValue::Blob(vec![0xAA; 200]);
        let doc = DbValue::Object(DbObject::new().with("data", blob));
        let bytes = doc.build();
        // name "data" + tag + NUL = 6, blob size 200 as 2-byte LEB128, end marker
        let content = 6 + 2 + 200 + 1;
        assert_eq!(bytes[0], 0x82);
        assert_eq!(bytes[1], (content & 0x7F) as u8 | 0x80);
        assert_eq!(bytes[2], (content >> 7) as u8);
        assert_eq!(DbValue::parse(&bytes).expect("parse"), doc);
    }
}
