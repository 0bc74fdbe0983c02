//! Binary stream primitives shared by every message variant
//!
//! Fixed-width integers and floats are little-endian. Variable-size data is
//! prefixed with an `i32` length.

use std::io::{Read, Write};

use super::{WireError, WireResult, DEFAULT_MAX_PAYLOAD_LEN};

/// Reads fixed-width and length-prefixed values from a blocking byte stream
pub struct WireReader<'a> {
    inner: &'a mut dyn Read,
    max_len: usize,
    consumed: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(inner: &'a mut dyn Read) -> Self {
        Self::with_limit(inner, DEFAULT_MAX_PAYLOAD_LEN)
    }

    /// Reject length prefixes and element counts above `max_len`
    pub fn with_limit(inner: &'a mut dyn Read, max_len: usize) -> Self {
        Self {
            inner,
            max_len,
            consumed: 0,
        }
    }

    /// Bytes read so far by this reader
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    fn read_array<const N: usize>(&mut self) -> WireResult<[u8; N]> {
        let mut buf = [0u8; N];
        match self.inner.read_exact(&mut buf) {
            Ok(()) => {
                self.consumed += N;
                Ok(buf)
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(WireError::Incomplete {
                needed: self.consumed + N,
            }),
            Err(e) => Err(WireError::Read(e)),
        }
    }

    pub fn read_u8(&mut self) -> WireResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> WireResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::malformed(format!("invalid bool byte {other:#04x}"))),
        }
    }

    pub fn read_u16(&mut self) -> WireResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> WireResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> WireResult<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> WireResult<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Read an `i32` length or element count and validate it against the limit
    pub fn read_count(&mut self) -> WireResult<usize> {
        let raw = self.read_i32()?;
        let count = usize::try_from(raw)
            .map_err(|_| WireError::malformed(format!("negative length {raw}")))?;
        if count > self.max_len {
            return Err(WireError::malformed(format!(
                "length {count} exceeds limit {}",
                self.max_len
            )));
        }
        Ok(count)
    }

    /// Read exactly `n` bytes
    pub fn read_bytes(&mut self, n: usize) -> WireResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(n.min(64 * 1024));
        let read = (&mut *self.inner)
            .take(n as u64)
            .read_to_end(&mut buf)
            .map_err(WireError::Read)?;
        if read < n {
            return Err(WireError::Incomplete {
                needed: self.consumed + n,
            });
        }
        self.consumed += n;
        Ok(buf)
    }

    pub fn read_length_prefixed(&mut self) -> WireResult<Vec<u8>> {
        let len = self.read_count()?;
        self.read_bytes(len)
    }

    pub fn read_string(&mut self) -> WireResult<String> {
        let bytes = self.read_length_prefixed()?;
        String::from_utf8(bytes).map_err(|e| WireError::malformed(format!("invalid UTF-8: {e}")))
    }
}

/// Writes fixed-width and length-prefixed values to a blocking byte stream
pub struct WireWriter<'a> {
    inner: &'a mut dyn Write,
    max_len: usize,
}

impl<'a> WireWriter<'a> {
    pub fn new(inner: &'a mut dyn Write) -> Self {
        Self::with_limit(inner, DEFAULT_MAX_PAYLOAD_LEN)
    }

    /// Refuse to write lengths and counts the peer's reader would reject
    pub fn with_limit(inner: &'a mut dyn Write, max_len: usize) -> Self {
        Self { inner, max_len }
    }

    pub fn write_bytes(&mut self, buf: &[u8]) -> WireResult<()> {
        self.inner.write_all(buf).map_err(WireError::Write)
    }

    pub fn write_u8(&mut self, value: u8) -> WireResult<()> {
        self.write_bytes(&[value])
    }

    pub fn write_bool(&mut self, value: bool) -> WireResult<()> {
        self.write_u8(u8::from(value))
    }

    pub fn write_u16(&mut self, value: u16) -> WireResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> WireResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_i64(&mut self, value: i64) -> WireResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_f64(&mut self, value: f64) -> WireResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a length or element count as `i32`
    pub fn write_count(&mut self, count: usize) -> WireResult<()> {
        if count > self.max_len {
            return Err(WireError::malformed(format!(
                "length {count} exceeds limit {}",
                self.max_len
            )));
        }
        let raw = i32::try_from(count)
            .map_err(|_| WireError::malformed(format!("length {count} does not fit in i32")))?;
        self.write_i32(raw)
    }

    pub fn write_length_prefixed(&mut self, buf: &[u8]) -> WireResult<()> {
        self.write_count(buf.len())?;
        self.write_bytes(buf)
    }

    pub fn write_string(&mut self, value: &str) -> WireResult<()> {
        self.write_length_prefixed(value.as_bytes())
    }

    pub fn flush(&mut self) -> WireResult<()> {
        self.inner.flush().map_err(WireError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ErrorClass, ProtocolError};

    #[test]
    fn test_fixed_width_little_endian() {
        let mut out = Vec::new();
        {
            let mut w = WireWriter::new(&mut out);
            w.write_u16(0xD00D).unwrap();
            w.write_i32(-2).unwrap();
        }
        assert_eq!(out, vec![0x0D, 0xD0, 0xFE, 0xFF, 0xFF, 0xFF]);

        let mut input = out.as_slice();
        let mut r = WireReader::new(&mut input);
        assert_eq!(r.read_u16().unwrap(), 0xD00D);
        assert_eq!(r.read_i32().unwrap(), -2);
        assert!(input.is_empty());
    }

    #[test]
    fn test_string_is_length_prefixed() {
        let mut out = Vec::new();
        WireWriter::new(&mut out).write_string("héllo").unwrap();
        assert_eq!(&out[..4], &6i32.to_le_bytes());

        let mut input = out.as_slice();
        assert_eq!(WireReader::new(&mut input).read_string().unwrap(), "héllo");
    }

    #[test]
    fn test_write_above_limit_writes_nothing() {
        let mut out = Vec::new();
        let err = WireWriter::with_limit(&mut out, 3)
            .write_string("four")
            .unwrap_err();
        assert!(matches!(
            err,
            WireError::Protocol(ProtocolError::MalformedPayload(_))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_negative_length_is_malformed() {
        let bytes = (-1i32).to_le_bytes();
        let mut input = &bytes[..];
        let err = WireReader::new(&mut input).read_length_prefixed().unwrap_err();
        assert_eq!(err.class(), ErrorClass::Corrupt);
    }

    #[test]
    fn test_length_above_limit_is_malformed() {
        let bytes = 100i32.to_le_bytes();
        let mut input = &bytes[..];
        let err = WireReader::with_limit(&mut input, 10).read_count().unwrap_err();
        assert!(matches!(
            err,
            WireError::Protocol(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_short_read_is_end_of_stream() {
        let mut bytes = 8i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"abc");
        let mut input = bytes.as_slice();
        let err = WireReader::new(&mut input).read_length_prefixed().unwrap_err();
        assert!(err.is_end_of_stream());
        assert_eq!(err.needed(), Some(12));
    }

    #[test]
    fn test_short_fixed_width_reports_needed() {
        let bytes = [0x0D, 0xD0, 0x01];
        let mut input = &bytes[..];
        let mut r = WireReader::new(&mut input);
        assert_eq!(r.read_u16().unwrap(), 0xD00D);
        assert_eq!(r.consumed(), 2);
        assert_eq!(r.read_i32().unwrap_err().needed(), Some(6));
    }

    #[test]
    fn test_invalid_bool() {
        let bytes = [2u8];
        let mut input = &bytes[..];
        assert!(WireReader::new(&mut input).read_bool().is_err());
    }
}
