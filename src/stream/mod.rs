//! Byte-stream primitives
//!
//! LEB128 variable-length unsigned integers, zig-zag signed integers,
//! little-endian fixed-width numbers and length-prefixed strings and blobs,
//! over any `Read` or `Write`. Both ends count the bytes they have moved so
//! the codec can check container sizes without seeking.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{Error, FormatError, Result};
use crate::limits::Limits;

/// Longest LEB128 encoding of a `u64`
pub const MAX_VARUINT_LEN: usize = 10;

/// Saved stream position for resuming a read later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bookmark {
    /// Absolute position in the stream
    pub position: u64,
    /// Number of bytes belonging to the bookmarked region, if known
    pub length: Option<u64>,
}

fn eof_as_truncated(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        FormatError::Truncated("stream".to_string()).into()
    } else {
        Error::Io(e)
    }
}

/// Reader side of the byte stream
#[derive(Debug)]
pub struct ByteReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> ByteReader<R> {
    /// Wrap a reader
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes consumed so far (absolute after a seek)
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Unwrap the inner reader
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read one byte, or `None` at a clean end of stream
    pub fn read_u8_or_eof(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.position += 1;
                    return Ok(Some(buf[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf).map_err(eof_as_truncated)?;
        self.position += N as u64;
        Ok(buf)
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a little-endian `u16`
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `u32`
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `u64`
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `i64`
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `f32`
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `f64`
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Read a LEB128 unsigned integer
    pub fn read_varuint(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        for i in 0..MAX_VARUINT_LEN {
            let byte = self.read_u8()?;
            let bits = u64::from(byte & 0x7F);
            if i == MAX_VARUINT_LEN - 1 && byte > 1 {
                break;
            }
            value |= bits << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(FormatError::Malformed("variable-length integer overflows 64 bits".to_string()).into())
    }

    /// Read a zig-zag encoded signed integer
    pub fn read_varint(&mut self) -> Result<i64> {
        let raw = self.read_varuint()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    /// Read a LEB128 length and check it against `max`
    pub fn read_len(&mut self, max: usize, what: &str) -> Result<usize> {
        let len = self.read_varuint()?;
        usize::try_from(len)
            .ok()
            .filter(|len| *len <= max)
            .ok_or_else(|| Error::LimitExceeded(format!("{} of {} bytes exceeds {}", what, len, max)))
    }

    /// Read exactly `len` bytes
    pub fn read_exact_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let read = (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(Error::Io)?;
        self.position += read as u64;
        if read != len {
            return Err(FormatError::Truncated(format!("{} of {} bytes", read, len)).into());
        }
        Ok(buf)
    }

    /// Read a length-prefixed byte blob
    pub fn read_blob(&mut self, limits: &Limits) -> Result<Vec<u8>> {
        let len = self.read_len(limits.max_string_len, "blob")?;
        self.read_exact_vec(len)
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self, limits: &Limits) -> Result<String> {
        let len = self.read_len(limits.max_string_len, "string")?;
        let bytes = self.read_exact_vec(len)?;
        String::from_utf8(bytes)
            .map_err(|e| FormatError::Malformed(format!("invalid UTF-8 in string: {}", e)).into())
    }

    /// Skip `len` bytes
    pub fn skip(&mut self, len: u64) -> Result<()> {
        let skipped = io::copy(&mut (&mut self.inner).take(len), &mut io::sink())?;
        self.position += skipped;
        if skipped != len {
            return Err(FormatError::Truncated(format!("{} of {} bytes", skipped, len)).into());
        }
        Ok(())
    }
}

impl<R: Read + Seek> ByteReader<R> {
    /// Wrap a seekable reader, starting at its current position
    pub fn seekable(mut inner: R) -> Result<Self> {
        let position = inner.stream_position()?;
        Ok(Self { inner, position })
    }

    /// Bookmark the current position
    pub fn bookmark(&self, length: Option<u64>) -> Bookmark {
        Bookmark {
            position: self.position,
            length,
        }
    }

    /// Move to an absolute position
    pub fn seek_to(&mut self, position: u64) -> Result<()> {
        self.position = self.inner.seek(SeekFrom::Start(position))?;
        Ok(())
    }
}

/// Writer side of the byte stream
#[derive(Debug)]
pub struct ByteWriter<W> {
    inner: W,
    position: u64,
}

impl<W: Write> ByteWriter<W> {
    /// Wrap a writer
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes written so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Flush and unwrap the inner writer
    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Write one byte
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    /// Write a little-endian `u16`
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a little-endian `u32`
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a little-endian `u64`
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a little-endian `i64`
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a little-endian `f32`
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a little-endian `f64`
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a LEB128 unsigned integer
    pub fn write_varuint(&mut self, mut value: u64) -> Result<()> {
        let mut buf = [0u8; MAX_VARUINT_LEN];
        let mut len = 0;
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                buf[len] = byte;
                len += 1;
                break;
            }
            buf[len] = byte | 0x80;
            len += 1;
        }
        self.write_bytes(&buf[..len])
    }

    /// Write a zig-zag encoded signed integer
    pub fn write_varint(&mut self, value: i64) -> Result<()> {
        self.write_varuint(zigzag(value))
    }

    /// Write a length-prefixed byte blob
    pub fn write_blob(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_varuint(bytes.len() as u64)?;
        self.write_bytes(bytes)
    }

    /// Write a length-prefixed UTF-8 string
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_blob(value.as_bytes())
    }
}

fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Encoded length of a LEB128 unsigned integer
pub fn varuint_len(value: u64) -> u64 {
    let bits = 64 - u64::from(value.leading_zeros());
    (bits.max(1) + 6) / 7
}

/// Encoded length of a zig-zag signed integer
pub fn varint_len(value: i64) -> u64 {
    varuint_len(zigzag(value))
}

/// Encoded length of a length-prefixed blob
pub fn blob_len(len: usize) -> u64 {
    varuint_len(len as u64) + len as u64
}
