//! Binary image encoder/decoder.
//!
//! The image is made of a fixed-size header followed by fixed-stride blocks,
//! so that decoding is a bounds check followed by bulk copies. All integers
//! and floats are little-endian.
//!
//! ```text
//! image    := header coords indices *1(vattrs) *1(markers) *1(eattrs)
//! header   := magic version flags dim width nverts nelems npe nvattrs neattrs reserved
//! magic    := "TeBi"
//! version  := u8      ; 1
//! flags    := u8      ; bit 0: markers, bit 1: vertex attributes,
//!                     ; bit 2: element attributes
//! dim      := u8      ; 2 or 3
//! width    := u8      ; byte size of an index: 1, 2 or 4
//! nverts   := u64
//! nelems   := u64
//! npe      := u32     ; nodes per element: 4 or 10
//! nvattrs  := u32     ; attributes per vertex, 0 unless flag bit 1
//! neattrs  := u32     ; attributes per element, 0 unless flag bit 2
//! reserved := u32     ; 0
//! coords   := nverts*dim f64
//! indices  := nelems*npe uint      ; `width` bytes each
//! vattrs   := nverts*nvattrs f64
//! markers  := nverts i64
//! eattrs   := nelems*neattrs f64
//! ```

use crate::mesh::Mesh;
use crate::mesh::SUPPORTED_ARITIES;
use crate::mesh::SUPPORTED_DIMENSIONS;
use std::fmt;

pub use decoder::Image;
pub use encoder::encode;
pub use encoder::to_bytes;
pub use encoder::write_file;

mod decoder;
mod encoder;

pub const MAGIC: [u8; 4] = *b"TeBi";
pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 40;

pub const FLAG_MARKERS: u8 = 1 << 0;
pub const FLAG_VERTEX_ATTRIBUTES: u8 = 1 << 1;
pub const FLAG_ELEMENT_ATTRIBUTES: u8 = 1 << 2;
const KNOWN_FLAGS: u8 = FLAG_MARKERS | FLAG_VERTEX_ATTRIBUTES | FLAG_ELEMENT_ATTRIBUTES;

/// Reasons a byte sequence is not a valid binary image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Corruption {
    /// Shorter than a header.
    Truncated(usize),
    BadMagic,
    UnsupportedVersion(u8),
    BadIndexWidth(u8),
    BadHeader(&'static str),
    LengthMismatch { expected: usize, found: usize },
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Corruption::Truncated(len) => {
                write!(f, "{} bytes is too short for a {} bytes header", len, HEADER_LEN)
            }
            Corruption::BadMagic => write!(f, "bad magic bytes"),
            Corruption::UnsupportedVersion(version) => {
                write!(f, "unsupported format version {}", version)
            }
            Corruption::BadIndexWidth(width) => write!(f, "bad index width {}", width),
            Corruption::BadHeader(reason) => write!(f, "bad header: {}", reason),
            Corruption::LengthMismatch { expected, found } => write!(
                f,
                "header describes {} bytes, found {}",
                expected, found,
            ),
        }
    }
}

impl std::error::Error for Corruption {}

/// Byte size of the vertex indices of an image.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum IndexWidth {
    U8 = 1,
    U16 = 2,
    U32 = 4,
}

impl IndexWidth {
    /// The smallest width that can hold `max_index`.
    pub fn for_max_index(max_index: usize) -> IndexWidth {
        if max_index <= usize::from(u8::MAX) {
            IndexWidth::U8
        } else if max_index <= usize::from(u16::MAX) {
            IndexWidth::U16
        } else {
            IndexWidth::U32
        }
    }

    pub fn bytes(self) -> usize {
        self as usize
    }

    fn from_byte(b: u8) -> Option<IndexWidth> {
        Some(match b {
            1 => IndexWidth::U8,
            2 => IndexWidth::U16,
            4 => IndexWidth::U32,
            _ => return None,
        })
    }
}

/// Counts and shapes stored at the start of an image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub dimension: usize,
    pub index_width: IndexWidth,
    pub vertex_count: usize,
    pub element_count: usize,
    pub nodes_per_element: usize,
    pub vertex_attribute_count: usize,
    pub has_markers: bool,
    pub element_attribute_count: usize,
}

/// Byte length of each block of an image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Layout {
    pub coordinates: usize,
    pub indices: usize,
    pub vertex_attributes: usize,
    pub markers: usize,
    pub element_attributes: usize,
}

impl Layout {
    /// Length of the whole image, header included.
    pub fn image_len(&self) -> Option<usize> {
        [
            self.coordinates,
            self.indices,
            self.vertex_attributes,
            self.markers,
            self.element_attributes,
        ]
        .into_iter()
        .try_fold(HEADER_LEN, usize::checked_add)
    }
}

fn u32_field(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0x00; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

fn u64_field(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0x00; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

fn to_usize<T>(value: T) -> Result<usize, Corruption>
where
    usize: TryFrom<T>,
{
    usize::try_from(value).map_err(|_| Corruption::BadHeader("count does not fit in memory"))
}

impl Header {
    pub fn for_mesh(mesh: &Mesh) -> Header {
        Header {
            dimension: mesh.dimension(),
            index_width: IndexWidth::for_max_index(mesh.max_index()),
            vertex_count: mesh.vertex_count(),
            element_count: mesh.element_count(),
            nodes_per_element: mesh.nodes_per_element(),
            vertex_attribute_count: mesh.vertex_attribute_count(),
            has_markers: mesh.markers().is_some(),
            element_attribute_count: mesh.element_attribute_count(),
        }
    }

    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.has_markers {
            flags |= FLAG_MARKERS;
        }
        if self.vertex_attribute_count > 0 {
            flags |= FLAG_VERTEX_ATTRIBUTES;
        }
        if self.element_attribute_count > 0 {
            flags |= FLAG_ELEMENT_ATTRIBUTES;
        }
        flags
    }

    pub(crate) fn layout(&self) -> Option<Layout> {
        let f64_block = |count: usize, per_record: usize| count.checked_mul(per_record)?.checked_mul(8);
        Some(Layout {
            coordinates: f64_block(self.vertex_count, self.dimension)?,
            indices: self
                .element_count
                .checked_mul(self.nodes_per_element)?
                .checked_mul(self.index_width.bytes())?,
            vertex_attributes: f64_block(self.vertex_count, self.vertex_attribute_count)?,
            markers: if self.has_markers {
                self.vertex_count.checked_mul(8)?
            } else {
                0
            },
            element_attributes: f64_block(self.element_count, self.element_attribute_count)?,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0x00; HEADER_LEN];
        bytes[0..4].copy_from_slice(&MAGIC);
        bytes[4] = VERSION;
        bytes[5] = self.flags();
        bytes[6] = self.dimension as u8;
        bytes[7] = self.index_width as u8;
        bytes[8..16].copy_from_slice(&u64::to_le_bytes(self.vertex_count as u64));
        bytes[16..24].copy_from_slice(&u64::to_le_bytes(self.element_count as u64));
        bytes[24..28].copy_from_slice(&u32::to_le_bytes(self.nodes_per_element as u32));
        bytes[28..32].copy_from_slice(&u32::to_le_bytes(self.vertex_attribute_count as u32));
        bytes[32..36].copy_from_slice(&u32::to_le_bytes(self.element_attribute_count as u32));
        // bytes[36..40] are reserved.
        bytes
    }

    /// Reads the header at the start of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Header, Corruption> {
        if bytes.len() < HEADER_LEN {
            return Err(Corruption::Truncated(bytes.len()));
        }
        if bytes[0..4] != MAGIC {
            return Err(Corruption::BadMagic);
        }
        if bytes[4] != VERSION {
            return Err(Corruption::UnsupportedVersion(bytes[4]));
        }

        let flags = bytes[5];
        if flags & !KNOWN_FLAGS != 0 {
            return Err(Corruption::BadHeader("unknown flags"));
        }
        let dimension = usize::from(bytes[6]);
        if !SUPPORTED_DIMENSIONS.contains(&dimension) {
            return Err(Corruption::BadHeader("dimension must be 2 or 3"));
        }
        let index_width =
            IndexWidth::from_byte(bytes[7]).ok_or(Corruption::BadIndexWidth(bytes[7]))?;

        let vertex_count = to_usize(u64_field(bytes, 8))?;
        let element_count = to_usize(u64_field(bytes, 16))?;
        let nodes_per_element = to_usize(u32_field(bytes, 24))?;
        if !SUPPORTED_ARITIES.contains(&nodes_per_element) {
            return Err(Corruption::BadHeader("nodes per element must be 4 or 10"));
        }
        let vertex_attribute_count = to_usize(u32_field(bytes, 28))?;
        let element_attribute_count = to_usize(u32_field(bytes, 32))?;
        if (flags & FLAG_VERTEX_ATTRIBUTES != 0) != (vertex_attribute_count > 0) {
            return Err(Corruption::BadHeader("vertex attribute flag and count disagree"));
        }
        if (flags & FLAG_ELEMENT_ATTRIBUTES != 0) != (element_attribute_count > 0) {
            return Err(Corruption::BadHeader("element attribute flag and count disagree"));
        }
        if u32_field(bytes, 36) != 0 {
            return Err(Corruption::BadHeader("reserved field is not zero"));
        }

        Ok(Header {
            dimension,
            index_width,
            vertex_count,
            element_count,
            nodes_per_element,
            vertex_attribute_count,
            has_markers: flags & FLAG_MARKERS != 0,
            element_attribute_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Header {
        Header {
            dimension: 3,
            index_width: IndexWidth::U16,
            vertex_count: 300,
            element_count: 7,
            nodes_per_element: 4,
            vertex_attribute_count: 2,
            has_markers: true,
            element_attribute_count: 0,
        }
    }

    #[test]
    fn test_index_width() {
        assert_eq!(IndexWidth::for_max_index(0), IndexWidth::U8);
        assert_eq!(IndexWidth::for_max_index(255), IndexWidth::U8);
        assert_eq!(IndexWidth::for_max_index(256), IndexWidth::U16);
        // 300 vertices
        assert_eq!(IndexWidth::for_max_index(299), IndexWidth::U16);
        assert_eq!(IndexWidth::for_max_index(65535), IndexWidth::U16);
        assert_eq!(IndexWidth::for_max_index(65536), IndexWidth::U32);
        assert_eq!(IndexWidth::for_max_index(u32::MAX as usize), IndexWidth::U32);
    }

    #[test]
    fn test_header_bytes() {
        let header = header();
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"TeBi");
        assert_eq!(bytes[4], VERSION);
        assert_eq!(bytes[5], FLAG_MARKERS | FLAG_VERTEX_ATTRIBUTES);
        assert_eq!(bytes[7], 2);
        assert_eq!(bytes[8..16], 300_u64.to_le_bytes());
        assert_eq!(Header::from_bytes(&bytes), Ok(header));

        let layout = header.layout().unwrap();
        assert_eq!(layout.coordinates, 300 * 3 * 8);
        assert_eq!(layout.indices, 7 * 4 * 2);
        assert_eq!(layout.vertex_attributes, 300 * 2 * 8);
        assert_eq!(layout.markers, 300 * 8);
        assert_eq!(layout.element_attributes, 0);
        assert_eq!(
            layout.image_len(),
            Some(HEADER_LEN + 7200 + 56 + 4800 + 2400)
        );
    }

    #[test]
    fn test_bad_headers() {
        let bytes = header().to_bytes();
        assert_eq!(
            Header::from_bytes(&bytes[..12]),
            Err(Corruption::Truncated(12))
        );

        let mut bad = bytes;
        bad[0] = b'X';
        assert_eq!(Header::from_bytes(&bad), Err(Corruption::BadMagic));

        let mut bad = bytes;
        bad[4] = 2;
        assert_eq!(
            Header::from_bytes(&bad),
            Err(Corruption::UnsupportedVersion(2))
        );

        let mut bad = bytes;
        bad[7] = 3;
        assert_eq!(Header::from_bytes(&bad), Err(Corruption::BadIndexWidth(3)));

        let mut bad = bytes;
        bad[5] = FLAG_MARKERS;
        assert!(matches!(
            Header::from_bytes(&bad),
            Err(Corruption::BadHeader(_))
        ));

        let mut bad = bytes;
        bad[24] = 5;
        assert!(matches!(
            Header::from_bytes(&bad),
            Err(Corruption::BadHeader(_))
        ));
    }
}
