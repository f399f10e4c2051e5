//! Byte order of a DICOM data set.
//!
//! Every data set is little-endian except under the retired Explicit VR Big
//! Endian transfer syntax. The walker reads element headers through
//! [`ByteOrder`], and the pixel sample views read 16-bit samples the same way.
//!
//! All readers index the first `N` bytes of the slice and panic if it is
//! shorter. Callers bounds-check before reading.

/// Byte order of the data set body, selected by the transfer syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

#[inline]
fn take<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

impl ByteOrder {
    #[inline]
    pub const fn is_big_endian(self) -> bool {
        matches!(self, ByteOrder::BigEndian)
    }

    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        let raw = take::<2>(bytes);
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(raw),
            ByteOrder::BigEndian => u16::from_be_bytes(raw),
        }
    }

    #[inline]
    pub fn read_i16(self, bytes: &[u8]) -> i16 {
        self.read_u16(bytes) as i16
    }

    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        let raw = take::<4>(bytes);
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(raw),
            ByteOrder::BigEndian => u32::from_be_bytes(raw),
        }
    }

    #[inline]
    pub fn read_i32(self, bytes: &[u8]) -> i32 {
        self.read_u32(bytes) as i32
    }

    #[inline]
    pub fn read_f32(self, bytes: &[u8]) -> f32 {
        f32::from_bits(self.read_u32(bytes))
    }

    #[inline]
    pub fn read_f64(self, bytes: &[u8]) -> f64 {
        let raw = take::<8>(bytes);
        match self {
            ByteOrder::LittleEndian => f64::from_le_bytes(raw),
            ByteOrder::BigEndian => f64::from_be_bytes(raw),
        }
    }
}
