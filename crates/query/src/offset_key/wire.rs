//! Byte-level primitives of the offset key format.
//!
//! Integers are little-endian; counts and lengths are unsigned LEB128.
//! Values are a tag byte followed by the payload of that variant.

use crate::error::OffsetKeyError;
use resumedb_core::Value;

const TAG_NULL: u8 = 0;
const TAG_BOOLEAN: u8 = 1;
const TAG_INT32: u8 = 2;
const TAG_INT64: u8 = 3;
const TAG_FLOAT64: u8 = 4;
const TAG_STRING: u8 = 5;
const TAG_DATETIME: u8 = 6;
const TAG_BYTES: u8 = 7;
const TAG_REFERENCE: u8 = 8;

/// Longest LEB128 encoding of a u64.
const MAX_VARINT_LEN: usize = 10;

#[derive(Debug, Default)]
pub(crate) struct KeyWriter {
    buf: Vec<u8>,
}

impl KeyWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    pub fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn varint(&mut self, mut v: u64) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    pub fn bytes(&mut self, b: &[u8]) {
        self.varint(b.len() as u64);
        self.buf.extend_from_slice(b);
    }

    pub fn value(&mut self, v: &Value) {
        match v {
            Value::Null => self.u8(TAG_NULL),
            Value::Boolean(b) => {
                self.u8(TAG_BOOLEAN);
                self.bool(*b);
            }
            Value::Int32(i) => {
                self.u8(TAG_INT32);
                self.buf.extend_from_slice(&i.to_le_bytes());
            }
            Value::Int64(i) => {
                self.u8(TAG_INT64);
                self.buf.extend_from_slice(&i.to_le_bytes());
            }
            Value::Float64(f) => {
                self.u8(TAG_FLOAT64);
                self.u64(f.to_bits());
            }
            Value::String(s) => {
                self.u8(TAG_STRING);
                self.bytes(s.as_bytes());
            }
            Value::DateTime(t) => {
                self.u8(TAG_DATETIME);
                self.buf.extend_from_slice(&t.to_le_bytes());
            }
            Value::Bytes(b) => {
                self.u8(TAG_BYTES);
                self.bytes(b);
            }
            Value::Reference(id) => {
                self.u8(TAG_REFERENCE);
                self.u64(*id);
            }
        }
    }

    /// A value wrapped as `[len][bytes]`.
    pub fn framed_value(&mut self, v: &Value) {
        let mut inner = KeyWriter::new();
        inner.value(v);
        self.bytes(&inner.buf);
    }

    pub fn values(&mut self, vs: &[Value]) {
        self.varint(vs.len() as u64);
        for v in vs {
            self.value(v);
        }
    }
}

pub(crate) struct KeyReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> KeyReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], OffsetKeyError> {
        if self.remaining() < n {
            return Err(OffsetKeyError::Truncated);
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], OffsetKeyError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, OffsetKeyError> {
        Ok(self.take(1)?[0])
    }

    pub fn bool(&mut self, field: &'static str) -> Result<bool, OffsetKeyError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(OffsetKeyError::MalformedField(field)),
        }
    }

    pub fn u64(&mut self) -> Result<u64, OffsetKeyError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn varint(&mut self) -> Result<u64, OffsetKeyError> {
        let mut out = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.u8()?;
            let bits = (byte & 0x7f) as u64;
            if i == MAX_VARINT_LEN - 1 && bits > 1 {
                return Err(OffsetKeyError::MalformedVarint);
            }
            out |= bits << (7 * i);
            if byte & 0x80 == 0 {
                // reject non-minimal encodings so equal keys are equal bytes
                if i > 0 && byte == 0 {
                    return Err(OffsetKeyError::MalformedVarint);
                }
                return Ok(out);
            }
        }
        Err(OffsetKeyError::MalformedVarint)
    }

    /// A count that must fit in what is left of the buffer, each element
    /// taking at least `min_size` bytes.
    pub fn count(&mut self, min_size: usize) -> Result<usize, OffsetKeyError> {
        let n = self.varint()?;
        let n = usize::try_from(n).map_err(|_| OffsetKeyError::Truncated)?;
        if n.saturating_mul(min_size.max(1)) > self.remaining() {
            return Err(OffsetKeyError::Truncated);
        }
        Ok(n)
    }

    pub fn bytes(&mut self) -> Result<&'a [u8], OffsetKeyError> {
        let len = self.count(1)?;
        self.take(len)
    }

    pub fn value(&mut self) -> Result<Value, OffsetKeyError> {
        Ok(match self.u8()? {
            TAG_NULL => Value::Null,
            TAG_BOOLEAN => Value::Boolean(self.bool("boolean")?),
            TAG_INT32 => Value::Int32(i32::from_le_bytes(self.array()?)),
            TAG_INT64 => Value::Int64(i64::from_le_bytes(self.array()?)),
            TAG_FLOAT64 => Value::Float64(f64::from_bits(self.u64()?)),
            TAG_STRING => {
                let raw = self.bytes()?;
                let s = std::str::from_utf8(raw).map_err(|_| OffsetKeyError::InvalidUtf8)?;
                Value::String(s.to_string())
            }
            TAG_DATETIME => Value::DateTime(i64::from_le_bytes(self.array()?)),
            TAG_BYTES => Value::Bytes(self.bytes()?.to_vec()),
            TAG_REFERENCE => Value::Reference(self.u64()?),
            other => return Err(OffsetKeyError::UnknownValueTag(other)),
        })
    }

    pub fn framed_value(&mut self) -> Result<Value, OffsetKeyError> {
        let mut inner = KeyReader::new(self.bytes()?);
        let value = inner.value()?;
        if inner.remaining() != 0 {
            return Err(OffsetKeyError::MalformedField("key"));
        }
        Ok(value)
    }

    pub fn values(&mut self) -> Result<Vec<Value>, OffsetKeyError> {
        let n = self.count(1)?;
        (0..n).map(|_| self.value()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_boundaries() {
        for v in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut w = KeyWriter::new();
            w.varint(v);
            let bytes = w.into_bytes();
            let mut r = KeyReader::new(&bytes);
            assert_eq!(r.varint().unwrap(), v);
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn test_varint_rejects_overlong_and_non_minimal() {
        let mut r = KeyReader::new(&[0xff; 11]);
        assert_eq!(r.varint(), Err(OffsetKeyError::MalformedVarint));
        let mut r = KeyReader::new(&[0x80, 0x00]);
        assert_eq!(r.varint(), Err(OffsetKeyError::MalformedVarint));
        let mut r = KeyReader::new(&[0x80]);
        assert_eq!(r.varint(), Err(OffsetKeyError::Truncated));
    }

    #[test]
    fn test_every_value_variant() {
        let values = vec![
            Value::Null,
            Value::Boolean(true),
            Value::Int32(-5),
            Value::Int64(1 << 40),
            Value::Float64(2.5),
            Value::String("héllo".into()),
            Value::DateTime(1_700_000_000_000),
            Value::Bytes(vec![0, 1, 2]),
            Value::Reference(77),
        ];
        let mut w = KeyWriter::new();
        w.values(&values);
        w.framed_value(&Value::Int64(9));
        let bytes = w.into_bytes();
        let mut r = KeyReader::new(&bytes);
        let decoded = r.values().unwrap();
        assert_eq!(decoded.len(), values.len());
        for (a, b) in decoded.iter().zip(&values) {
            // Int32 and Int64 compare equal, so also check the variant
            assert_eq!(a.data_type(), b.data_type());
            assert_eq!(a, b);
        }
        assert_eq!(r.framed_value().unwrap(), Value::Int64(9));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_corrupt_values() {
        assert_eq!(KeyReader::new(&[42]).value(), Err(OffsetKeyError::UnknownValueTag(42)));
        assert_eq!(KeyReader::new(&[TAG_INT64, 1, 2]).value(), Err(OffsetKeyError::Truncated));
        assert_eq!(
            KeyReader::new(&[TAG_STRING, 2, 0xff, 0xfe]).value(),
            Err(OffsetKeyError::InvalidUtf8)
        );
        assert_eq!(
            KeyReader::new(&[TAG_BOOLEAN, 7]).value(),
            Err(OffsetKeyError::MalformedField("boolean"))
        );
        // length prefix larger than the buffer
        assert_eq!(KeyReader::new(&[0x7f, 0]).values(), Err(OffsetKeyError::Truncated));
    }
}
