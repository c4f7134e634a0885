#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("buffer underrun: wanted {wanted} bytes, {remaining} remaining")]
    Underrun { wanted: usize, remaining: usize },
    #[error("unterminated string at offset {offset}")]
    UnterminatedString { offset: usize },
}

/// Growable wire buffer with a single read cursor.
///
/// Writes always append to the end of the buffer; reads consume from the
/// cursor position. The byte order is fixed at construction and applies to
/// every multi-byte read and write. A failed read never moves the cursor.
#[derive(Debug, Clone)]
pub struct ByteCursor {
    data: Vec<u8>,
    pos: usize,
    endian: Endian,
}

impl ByteCursor {
    pub fn new(endian: Endian, data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            endian,
        }
    }

    pub fn big_endian(data: Vec<u8>) -> Self {
        Self::new(Endian::Big, data)
    }

    pub fn little_endian(data: Vec<u8>) -> Self {
        Self::new(Endian::Little, data)
    }

    pub fn with_capacity(endian: Endian, capacity: usize) -> Self {
        Self::new(endian, Vec::with_capacity(capacity))
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The full written buffer, independent of the read cursor.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.pos = 0;
    }

    fn take(&mut self, len: usize) -> Result<&[u8], WireError> {
        let remaining = self.remaining();
        if remaining < len {
            return Err(WireError::Underrun {
                wanted: len,
                remaining,
            });
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.data[start..start + len])
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8], WireError> {
        self.take(len)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), WireError> {
        self.take(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        let endian = self.endian;
        let bytes = self.take(2)?;
        let raw = [bytes[0], bytes[1]];
        Ok(match endian {
            Endian::Big => u16::from_be_bytes(raw),
            Endian::Little => u16::from_le_bytes(raw),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        let endian = self.endian;
        let bytes = self.take(4)?;
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        Ok(match endian {
            Endian::Big => u32::from_be_bytes(raw),
            Endian::Little => u32::from_le_bytes(raw),
        })
    }

    /// Two 32-bit reads assembled `high << 32 | low`, high word first in
    /// both byte orders. The legacy protocol has no native 64-bit field, so
    /// in little-endian mode this is not the same as an 8-byte LE read.
    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        let remaining = self.remaining();
        if remaining < 8 {
            return Err(WireError::Underrun {
                wanted: 8,
                remaining,
            });
        }
        let high = u64::from(self.read_u32()?);
        let low = u64::from(self.read_u32()?);
        Ok((high << 32) | low)
    }

    /// Reads up to and including the next NUL; the NUL is not returned.
    pub fn read_cstring(&mut self) -> Result<String, WireError> {
        let start = self.pos;
        let Some(len) = self.data[start..].iter().position(|&b| b == 0) else {
            return Err(WireError::UnterminatedString { offset: start });
        };
        let value = String::from_utf8_lossy(&self.data[start..start + len]).into_owned();
        self.pos += len + 1;
        Ok(value)
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.data.push(if value { 0x01 } else { 0x00 });
    }

    pub fn write_u16(&mut self, value: u16) {
        match self.endian {
            Endian::Big => self.data.extend_from_slice(&value.to_be_bytes()),
            Endian::Little => self.data.extend_from_slice(&value.to_le_bytes()),
        }
    }

    pub fn write_u32(&mut self, value: u32) {
        match self.endian {
            Endian::Big => self.data.extend_from_slice(&value.to_be_bytes()),
            Endian::Little => self.data.extend_from_slice(&value.to_le_bytes()),
        }
    }

    /// Mirror of `read_u64`: high word first, each word in the cursor's order.
    pub fn write_u64(&mut self, value: u64) {
        self.write_u32((value >> 32) as u32);
        self.write_u32((value & 0xffff_ffff) as u32);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_cstring(&mut self, value: &str) {
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn writes_honor_byte_order() {
        let mut be = ByteCursor::with_capacity(Endian::Big, 16);
        be.write_u16(0x1234);
        be.write_u32(0xdead_beef);
        assert_eq!(be.data(), &[0x12, 0x34, 0xde, 0xad, 0xbe, 0xef]);

        let mut le = ByteCursor::with_capacity(Endian::Little, 16);
        le.write_u16(0x1234);
        le.write_u32(0xdead_beef);
        assert_eq!(le.data(), &[0x34, 0x12, 0xef, 0xbe, 0xad, 0xde]);
    }

    #[test]
    fn bool_is_one_byte() {
        let mut cursor = ByteCursor::little_endian(Vec::new());
        cursor.write_bool(true);
        cursor.write_bool(false);
        assert_eq!(cursor.data(), &[0x01, 0x00]);
    }

    #[test]
    fn cstring_is_nul_terminated() {
        let mut cursor = ByteCursor::little_endian(Vec::new());
        cursor.write_cstring("Unit");
        cursor.write_cstring("");
        assert_eq!(cursor.data(), b"Unit\0\0");
        assert_eq!(cursor.read_cstring().unwrap(), "Unit");
        assert_eq!(cursor.read_cstring().unwrap(), "");
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn unterminated_cstring_fails_without_consuming() {
        let mut cursor = ByteCursor::little_endian(b"abc".to_vec());
        assert_eq!(
            cursor.read_cstring(),
            Err(WireError::UnterminatedString { offset: 0 })
        );
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn u64_is_high_word_first_big_endian() {
        let mut cursor = ByteCursor::big_endian(Vec::new());
        cursor.write_u32(0x0102_0304);
        cursor.write_u32(0x0506_0708);
        assert_eq!(cursor.read_u64().unwrap(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn u64_is_high_word_first_little_endian() {
        let mut cursor = ByteCursor::little_endian(Vec::new());
        cursor.write_u32(0xaaaa_bbbb);
        cursor.write_u32(0xcccc_dddd);
        assert_eq!(cursor.read_u64().unwrap(), 0xaaaa_bbbb_cccc_dddd);

        let plain = u64::from_le_bytes([0xbb, 0xbb, 0xaa, 0xaa, 0xdd, 0xdd, 0xcc, 0xcc]);
        assert_ne!(plain, 0xaaaa_bbbb_cccc_dddd);
    }

    #[test]
    fn u64_write_matches_read() {
        let mut cursor = ByteCursor::little_endian(Vec::new());
        cursor.write_u64(0x1122_3344_5566_7788);
        assert_eq!(cursor.read_u64().unwrap(), 0x1122_3344_5566_7788);
    }

    #[test]
    fn underrun_does_not_move_cursor() {
        let mut cursor = ByteCursor::big_endian(vec![0x01, 0x02, 0x03]);
        assert_eq!(
            cursor.read_u32(),
            Err(WireError::Underrun {
                wanted: 4,
                remaining: 3
            })
        );
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.read_u16().unwrap(), 0x0102);
        assert!(cursor.read_u64().is_err());
        assert_eq!(cursor.read_u8().unwrap(), 0x03);
        assert!(matches!(cursor.read_u8(), Err(WireError::Underrun { .. })));
    }

    #[test]
    fn data_ignores_read_position() {
        let mut cursor = ByteCursor::big_endian(Vec::new());
        cursor.write_u16(7);
        cursor.read_u8().unwrap();
        cursor.write_u8(9);
        assert_eq!(cursor.data(), &[0x00, 0x07, 0x09]);
        assert_eq!(cursor.remaining(), 2);
    }

    #[derive(Debug, Clone)]
    enum Field {
        Byte(u8),
        Bool(bool),
        Short(u16),
        Int(u32),
    }

    fn field() -> impl Strategy<Value = Field> {
        prop_oneof![
            any::<u8>().prop_map(Field::Byte),
            any::<bool>().prop_map(Field::Bool),
            any::<u16>().prop_map(Field::Short),
            any::<u32>().prop_map(Field::Int),
        ]
    }

    proptest! {
        #[test]
        fn writes_read_back_in_order(
            fields in prop::collection::vec(field(), 0..64),
            little in any::<bool>(),
        ) {
            let endian = if little { Endian::Little } else { Endian::Big };
            let mut cursor = ByteCursor::with_capacity(endian, 256);
            for field in &fields {
                match field {
                    Field::Byte(v) => cursor.write_u8(*v),
                    Field::Bool(v) => cursor.write_bool(*v),
                    Field::Short(v) => cursor.write_u16(*v),
                    Field::Int(v) => cursor.write_u32(*v),
                }
            }
            for field in &fields {
                match field {
                    Field::Byte(v) => prop_assert_eq!(cursor.read_u8().unwrap(), *v),
                    Field::Bool(v) => prop_assert_eq!(cursor.read_bool().unwrap(), *v),
                    Field::Short(v) => prop_assert_eq!(cursor.read_u16().unwrap(), *v),
                    Field::Int(v) => prop_assert_eq!(cursor.read_u32().unwrap(), *v),
                }
            }
            prop_assert_eq!(cursor.remaining(), 0);
            let overrun = cursor.read_u8();
            prop_assert!(
                matches!(overrun, Err(WireError::Underrun { wanted: 1, remaining: 0 })),
                "expected underrun, got {:?}",
                overrun
            );
        }
    }
}
