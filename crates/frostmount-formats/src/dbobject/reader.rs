//! Bounded DbObject reader

use binrw::BinReaderExt;
use binrw::io::{Read, Seek, SeekFrom};

use super::error::{DbError, DbResult};
use super::{
    DbField, DbObject, DbValue, FLAG_ANONYMOUS, TYPE_BLOB, TYPE_BOOL, TYPE_DOUBLE, TYPE_END,
    TYPE_FLOAT, TYPE_GUID, TYPE_INT, TYPE_LIST, TYPE_LONG, TYPE_MASK, TYPE_OBJECT, TYPE_SHA1,
    TYPE_STRING,
};
use crate::keys::{Guid, Sha1};

/// Deepest container nesting accepted from untrusted input
pub const MAX_DEPTH: usize = 64;

/// Longest entry name accepted from untrusted input
const MAX_NAME_LEN: u64 = 4096;

/// Streaming DbObject reader that never reads past its limit
pub struct DbReader<'r, R> {
    reader: &'r mut R,
    end: u64,
}

impl<'r, R: Read + Seek> DbReader<'r, R> {
    /// Reader bounded by the end of the stream
    pub fn new(reader: &'r mut R) -> DbResult<Self> {
        let pos = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(pos))?;
        Ok(Self { reader, end })
    }

    /// Reader bounded to `size` bytes from the current position
    pub fn with_limit(reader: &'r mut R, size: u64) -> DbResult<Self> {
        let mut this = Self::new(reader)?;
        let pos = this.position()?;
        let available = this.end.saturating_sub(pos);
        if size > available {
            return Err(DbError::SizeOutOfBounds {
                offset: pos,
                size,
                available,
            });
        }
        this.end = pos + size;
        Ok(this)
    }

    /// Read one anonymous root value
    pub fn read_value(&mut self) -> DbResult<DbValue> {
        let offset = self.position()?;
        match self.read_entry(0)? {
            Some(field) => Ok(field.value),
            None => Err(DbError::UnexpectedEnd(offset)),
        }
    }

    /// Read consecutive root values until the limit or an end marker
    pub fn read_all(&mut self) -> DbResult<Vec<DbValue>> {
        let mut values = Vec::new();
        while self.position()? < self.end {
            match self.read_entry(0)? {
                Some(field) => values.push(field.value),
                None => break,
            }
        }
        Ok(values)
    }

    fn position(&mut self) -> DbResult<u64> {
        Ok(self.reader.stream_position()?)
    }

    fn ensure_available(&mut self, size: u64) -> DbResult<()> {
        let offset = self.position()?;
        let available = self.end.saturating_sub(offset);
        if size > available {
            return Err(DbError::SizeOutOfBounds {
                offset,
                size,
                available,
            });
        }
        Ok(())
    }

    fn read_u8(&mut self) -> DbResult<u8> {
        self.ensure_available(1)?;
        Ok(self.reader.read_le::<u8>()?)
    }

    fn read_bytes(&mut self, len: u64) -> DbResult<Vec<u8>> {
        self.ensure_available(len)?;
        let mut buf = vec![0u8; len as usize];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_leb128(&mut self) -> DbResult<u64> {
        let offset = self.position()?;
        let mut result = 0u64;
        for shift in (0..70).step_by(7) {
            let byte = self.read_u8()?;
            let low = u64::from(byte & 0x7F);
            if shift == 63 && low > 1 {
                return Err(DbError::InvalidLeb128(offset));
            }
            result |= low << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(DbError::InvalidLeb128(offset))
    }

    fn read_name(&mut self) -> DbResult<String> {
        let offset = self.position()?;
        let mut bytes = Vec::new();
        loop {
            if self.position()? >= self.end || bytes.len() as u64 >= MAX_NAME_LEN {
                return Err(DbError::UnterminatedName(offset));
            }
            match self.reader.read_le::<u8>()? {
                0 => break,
                b => bytes.push(b),
            }
        }
        String::from_utf8(bytes).map_err(|_| DbError::InvalidUtf8(offset))
    }

    fn read_entry(&mut self, depth: usize) -> DbResult<Option<DbField>> {
        let offset = self.position()?;
        let tag = self.read_u8()?;
        let code = tag & TYPE_MASK;
        if code == TYPE_END {
            return Ok(None);
        }

        let name = if tag & FLAG_ANONYMOUS == 0 {
            self.read_name()?
        } else {
            String::new()
        };

        let value = match code {
            TYPE_LIST => DbValue::List(
                self.read_container(depth)?
                    .into_iter()
                    .map(|f| f.value)
                    .collect(),
            ),
            TYPE_OBJECT => {
                let mut object = DbObject::new();
                for field in self.read_container(depth)? {
                    object.insert(&field.name, field.value);
                }
                DbValue::Object(object)
            }
            TYPE_BOOL => DbValue::Bool(self.read_u8()? != 0),
            TYPE_STRING => {
                let len = self.read_leb128()?;
                let string_offset = self.position()?;
                let mut bytes = self.read_bytes(len)?;
                if bytes.last() == Some(&0) {
                    bytes.pop();
                }
                DbValue::String(
                    String::from_utf8(bytes).map_err(|_| DbError::InvalidUtf8(string_offset))?,
                )
            }
            TYPE_INT => {
                self.ensure_available(4)?;
                DbValue::Int(self.reader.read_le::<i32>()?)
            }
            TYPE_LONG => {
                self.ensure_available(8)?;
                DbValue::Long(self.reader.read_le::<i64>()?)
            }
            TYPE_FLOAT => {
                self.ensure_available(4)?;
                DbValue::Float(self.reader.read_le::<f32>()?)
            }
            TYPE_DOUBLE => {
                self.ensure_available(8)?;
                DbValue::Double(self.reader.read_le::<f64>()?)
            }
            TYPE_GUID => {
                self.ensure_available(16)?;
                DbValue::Guid(self.reader.read_le::<Guid>()?)
            }
            TYPE_SHA1 => {
                self.ensure_available(20)?;
                DbValue::Sha1(self.reader.read_le::<Sha1>()?)
            }
            TYPE_BLOB => {
                let len = self.read_leb128()?;
                DbValue::Blob(self.read_bytes(len)?)
            }
            _ => return Err(DbError::UnknownType { tag, offset }),
        };

        Ok(Some(DbField { name, value }))
    }

    fn read_container(&mut self, depth: usize) -> DbResult<Vec<DbField>> {
        if depth >= MAX_DEPTH {
            return Err(DbError::DepthExceeded(MAX_DEPTH));
        }

        let size = self.read_leb128()?;
        self.ensure_available(size)?;
        let start = self.position()?;
        let outer_end = self.end;
        self.end = start + size;

        let mut children = Vec::new();
        let result = loop {
            match self.read_entry(depth + 1) {
                Ok(Some(field)) => children.push(field),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.end = outer_end;
        result?;

        let actual = self.position()? - start;
        if actual != size {
            return Err(DbError::SizeMismatch {
                offset: start,
                declared: size,
                actual,
            });
        }
        Ok(children)
    }
}
