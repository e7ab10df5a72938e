//! Bounds-checked big-endian reader over a shared byte buffer.
//!
//! Every read either returns the requested value and advances the position by
//! the width of the field, or fails with [`Error::OutOfBounds`] and leaves the
//! position where it was. Cursors derived with [`ByteCursor::sub_stream`] share
//! the same [`Bytes`] buffer, so slices handed out by [`ByteCursor::read_bytes`]
//! are views into the underlying buffer rather than copies.

use bytes::Bytes;

use crate::boxes::FourCc;
use crate::{Error, Result};

/// A fixed-width record made of consecutive big-endian `u32` fields.
///
/// Used by [`ByteCursor::read_records`] to decode tables such as `stts` and
/// `stsc` into named rows.
pub trait U32Record: Sized {
    /// Number of `u32` fields in one row.
    const FIELDS: usize;

    /// Build a row from exactly [`Self::FIELDS`] values.
    fn from_fields(fields: &[u32]) -> Self;
}

/// Position-tracking reader over the window `[start, end)` of a buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor {
    data: Bytes,
    start: usize,
    position: usize,
    end: usize,
}

impl ByteCursor {
    /// Create a cursor spanning the whole buffer.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let end = data.len();
        Self {
            data,
            start: 0,
            position: 0,
            end,
        }
    }

    /// The underlying buffer shared by this cursor and all derived cursors.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Length of the cursor window.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Bytes left between the position and the end of the window.
    pub fn remaining(&self) -> usize {
        self.end - self.position
    }

    fn ensure(&self, need: usize) -> Result<()> {
        let have = self.remaining();
        if need > have {
            return Err(Error::OutOfBounds {
                offset: self.position,
                need,
                have,
            });
        }
        Ok(())
    }

    /// Run `f`, rewinding to the current position if it fails.
    fn atomic<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.position;
        let result = f(self);
        if result.is_err() {
            self.position = saved;
        }
        result
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.position..self.position + N]);
        self.position += N;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    pub fn read_u24(&mut self) -> Result<u32> {
        let [a, b, c] = self.take::<3>()?;
        Ok(u32::from_be_bytes([0, a, b, c]))
    }

    /// Reads a 24-bit field and sign-extends it to 32 bits.
    pub fn read_i24(&mut self) -> Result<i32> {
        Ok(((self.read_u24()? << 8) as i32) >> 8)
    }

    /// Reads a 32-bit word, moving the position only when `advance` is set.
    pub fn peek32(&mut self, advance: bool) -> Result<u32> {
        self.ensure(4)?;
        let p = self.position;
        let value = u32::from_be_bytes([
            self.data[p],
            self.data[p + 1],
            self.data[p + 2],
            self.data[p + 3],
        ]);
        if advance {
            self.position += 4;
        }
        Ok(value)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.peek32(true)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.peek32(true)? as i32)
    }

    /// Reads a four-character type code.
    pub fn read_fourcc(&mut self) -> Result<FourCc> {
        Ok(FourCc(self.take()?))
    }

    /// Reads a signed 16.16 fixed-point value.
    pub fn read_fp16(&mut self) -> Result<f64> {
        Ok(self.read_i32()? as f64 / 65536.0)
    }

    /// Reads a signed 8.8 fixed-point value.
    pub fn read_fp8(&mut self) -> Result<f64> {
        Ok(self.read_i16()? as f64 / 256.0)
    }

    /// Reads a packed ISO-639-2/T language code (three 5-bit letters).
    pub fn read_iso639(&mut self) -> Result<String> {
        let bits = self.read_u16()?;
        Ok((0..3)
            .map(|i| {
                let c = (bits >> ((2 - i) * 5)) & 0x1f;
                char::from(c as u8 + 0x60)
            })
            .collect())
    }

    /// Reads `length` bytes, one character per byte.
    pub fn read_utf8(&mut self, length: usize) -> Result<String> {
        self.ensure(length)?;
        let text = self.data[self.position..self.position + length]
            .iter()
            .map(|&b| char::from(b))
            .collect();
        self.position += length;
        Ok(text)
    }

    /// Reads a Pascal string stored in a fixed field of `max` bytes.
    ///
    /// The length byte and the characters are followed by zero padding up to
    /// `max`. Returns the string and whether the padding was all zero, the
    /// same verdict [`ByteCursor::reserved`] gives.
    pub fn read_pstring(&mut self, max: usize) -> Result<(String, bool)> {
        self.atomic(|c| {
            let len = c.read_u8()? as usize;
            if len >= max {
                return Err(Error::format(format!(
                    "pascal string length {len} exceeds field size {max}"
                )));
            }
            c.ensure(max - 1)?;
            let text = c.read_utf8(len)?;
            let padded = c.reserved(max - len - 1, 0)?;
            Ok((text, padded))
        })
    }

    /// Returns a view of the next `length` bytes without copying.
    pub fn read_bytes(&mut self, length: usize) -> Result<Bytes> {
        self.ensure(length)?;
        let out = self.data.slice(self.position..self.position + length);
        self.position += length;
        Ok(out)
    }

    fn ensure_table(&self, rows: u32, cols: usize) -> Result<()> {
        let need = (rows as u64)
            .checked_mul(cols as u64 * 4)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(usize::MAX);
        self.ensure(need)
    }

    /// Reads a flat table of `rows` big-endian `u32` values.
    pub fn read_u32_array(&mut self, rows: u32) -> Result<Vec<u32>> {
        self.ensure_table(rows, 1)?;
        (0..rows).map(|_| self.read_u32()).collect()
    }

    /// Reads `rows` fixed-size tuples of `N` big-endian `u32` values.
    pub fn read_u32_rows<const N: usize>(&mut self, rows: u32) -> Result<Vec<[u32; N]>> {
        self.ensure_table(rows, N)?;
        (0..rows)
            .map(|_| {
                let mut row = [0u32; N];
                for value in row.iter_mut() {
                    *value = self.read_u32()?;
                }
                Ok(row)
            })
            .collect()
    }

    /// Reads `rows` named records of `T::FIELDS` big-endian `u32` values.
    pub fn read_records<T: U32Record>(&mut self, rows: u32) -> Result<Vec<T>> {
        self.ensure_table(rows, T::FIELDS)?;
        let mut fields = vec![0u32; T::FIELDS];
        let mut out = Vec::with_capacity(rows as usize);
        for _ in 0..rows {
            for field in fields.iter_mut() {
                *field = self.read_u32()?;
            }
            out.push(T::from_fields(&fields));
        }
        Ok(out)
    }

    /// Reads a 3x3 transformation matrix.
    pub fn read_matrix(&mut self) -> Result<[u32; 9]> {
        let rows = self.read_u32_rows::<9>(1)?;
        Ok(rows[0])
    }

    pub fn skip(&mut self, length: usize) -> Result<()> {
        let target = self.position.checked_add(length).ok_or(Error::SeekOutOfBounds {
            index: usize::MAX,
            start: self.start,
            end: self.end,
        })?;
        self.seek(target)
    }

    /// Moves to an absolute buffer position inside `[start, end]`.
    pub fn seek(&mut self, index: usize) -> Result<()> {
        if index < self.start || index > self.end {
            return Err(Error::SeekOutOfBounds {
                index,
                start: self.start,
                end: self.end,
            });
        }
        self.position = index;
        Ok(())
    }

    /// Consumes `length` bytes that should all equal `value`.
    ///
    /// Returns `Ok(false)` and logs a warning on mismatch; only a short read
    /// is an error.
    pub fn reserved(&mut self, length: usize, value: u8) -> Result<bool> {
        self.ensure(length)?;
        let offset = self.position;
        let matched = self.data[offset..offset + length].iter().all(|&b| b == value);
        self.position += length;
        if !matched {
            tracing::warn!(offset, length, expected = value, "reserved bytes mismatch");
        }
        Ok(matched)
    }

    /// Derive a cursor over `[start, start + length)` of the same buffer.
    ///
    /// The window is bounded by the buffer only, not by this cursor's range.
    pub fn sub_stream(&self, start: usize, length: usize) -> Result<ByteCursor> {
        let end = start
            .checked_add(length)
            .filter(|&end| end <= self.data.len())
            .ok_or(Error::OutOfBounds {
                offset: start,
                need: length,
                have: self.data.len().saturating_sub(start),
            })?;
        Ok(ByteCursor {
            data: self.data.clone(),
            start,
            position: start,
            end,
        })
    }
}
