//! Big-endian cursors over in-memory buffers

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::core::{Error, Result};

/// Growable big-endian output buffer with a seekable position.
pub struct BinWriter {
    cur: Cursor<Vec<u8>>,
}

impl BinWriter {
    pub fn new() -> Self {
        Self {
            cur: Cursor::new(Vec::new()),
        }
    }

    /// Current write offset.
    pub fn pos(&self) -> usize {
        self.cur.position() as usize
    }

    pub fn len(&self) -> usize {
        self.cur.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cur.get_ref().is_empty()
    }

    /// Move the write position; seeking past the end zero-fills on the next write.
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        self.cur.seek(SeekFrom::Start(offset as u64))?;
        Ok(())
    }

    pub fn u8(&mut self, v: u8) -> Result<()> {
        Ok(self.cur.write_u8(v)?)
    }

    pub fn u16(&mut self, v: u16) -> Result<()> {
        Ok(self.cur.write_u16::<BigEndian>(v)?)
    }

    pub fn i16(&mut self, v: i16) -> Result<()> {
        Ok(self.cur.write_i16::<BigEndian>(v)?)
    }

    pub fn u32(&mut self, v: u32) -> Result<()> {
        Ok(self.cur.write_u32::<BigEndian>(v)?)
    }

    pub fn f32(&mut self, v: f32) -> Result<()> {
        Ok(self.cur.write_f32::<BigEndian>(v)?)
    }

    pub fn bytes(&mut self, v: &[u8]) -> Result<()> {
        Ok(self.cur.write_all(v)?)
    }

    /// Write a pair of command words.
    pub fn words(&mut self, w: [u32; 2]) -> Result<()> {
        self.u32(w[0])?;
        self.u32(w[1])
    }

    /// Zero-pad until the position is a multiple of `align`.
    pub fn align(&mut self, align: usize) -> Result<()> {
        while self.pos() % align != 0 {
            self.u8(0)?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.cur.into_inner()
    }
}

impl Default for BinWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounds-checked big-endian reader; running off the end is reported as corrupt data.
pub struct BinReader<'a> {
    cur: Cursor<&'a [u8]>,
}

impl<'a> BinReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cur: Cursor::new(bytes),
        }
    }

    pub fn pos(&self) -> usize {
        self.cur.position() as usize
    }

    pub fn len(&self) -> usize {
        self.cur.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cur.get_ref().is_empty()
    }

    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.len() {
            return Err(Error::corrupt(
                offset,
                format!("offset past end of {}-byte file", self.len()),
            ));
        }
        self.cur.set_position(offset as u64);
        Ok(())
    }

    /// Fail unless `count` entries of `stride` bytes fit between `offset`
    /// and the end of the file.
    pub fn ensure_table(&self, offset: usize, count: usize, stride: usize) -> Result<()> {
        let room = self.len().saturating_sub(offset);
        match count.checked_mul(stride) {
            Some(size) if size <= room => Ok(()),
            _ => Err(Error::corrupt(
                offset,
                format!("{} entries of {} bytes run past the end of the file", count, stride),
            )),
        }
    }

    fn read<T>(
        &mut self,
        width: usize,
        f: impl FnOnce(&mut Cursor<&'a [u8]>) -> std::io::Result<T>,
    ) -> Result<T> {
        let at = self.pos();
        f(&mut self.cur).map_err(|_| {
            Error::corrupt(at, format!("unexpected end of file reading {} bytes", width))
        })
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.read(1, |c| c.read_u8())
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.read(2, |c| c.read_u16::<BigEndian>())
    }

    pub fn i16(&mut self) -> Result<i16> {
        self.read(2, |c| c.read_i16::<BigEndian>())
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.read(4, |c| c.read_u32::<BigEndian>())
    }

    pub fn f32(&mut self) -> Result<f32> {
        self.read(4, |c| c.read_f32::<BigEndian>())
    }

    pub fn u32_at(&mut self, offset: usize) -> Result<u32> {
        self.seek(offset)?;
        self.u32()
    }

    pub fn bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.ensure_table(self.pos(), n, 1)?;
        let mut buf = vec![0u8; n];
        self.read(n, |c| c.read_exact(&mut buf))?;
        Ok(buf)
    }

    /// NUL-terminated string at the current position.
    pub fn c_string(&mut self) -> Result<String> {
        let start = self.pos();
        let mut raw = Vec::new();
        loop {
            match self.u8()? {
                0 => break,
                b => raw.push(b),
            }
        }
        String::from_utf8(raw).map_err(|_| Error::corrupt(start, "string is not valid UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_align_and_patch() {
        let mut w = BinWriter::new();
        w.u32(0).unwrap();
        w.u8(0xAB).unwrap();
        w.align(16).unwrap();
        assert_eq!(w.pos(), 16);
        w.seek(0).unwrap();
        w.u32(0x8021_0000).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..5], &[0x80, 0x21, 0x00, 0x00, 0xAB]);
    }

    #[test]
    fn test_reader_reports_eof_as_corrupt() {
        let data = [0u8, 1, 2];
        let mut r = BinReader::new(&data);
        assert_eq!(r.u16().unwrap(), 1);
        assert!(matches!(r.u32(), Err(Error::Corrupt { offset: 2, .. })));
        assert!(r.seek(4).is_err());
    }

    #[test]
    fn test_ensure_table() {
        let data = [0u8; 32];
        let r = BinReader::new(&data);
        assert!(r.ensure_table(8, 2, 12).is_ok());
        assert!(matches!(r.ensure_table(8, 3, 12), Err(Error::Corrupt { offset: 8, .. })));
        assert!(r.ensure_table(0, usize::MAX, 4).is_err());
        assert!(r.ensure_table(40, 0, 4).is_ok());
    }

    #[test]
    fn test_c_string() {
        let data = b"tex\0next";
        let mut r = BinReader::new(data);
        assert_eq!(r.c_string().unwrap(), "tex");
        assert_eq!(r.pos(), 4);
    }
}
