use super::Corruption;
use super::Header;
use super::IndexWidth;
use super::HEADER_LEN;
use crate::node_ele::Ref;

/// A validated binary image, borrowed from its bytes.
///
/// Blocks are only decoded when asked for, each with one allocation sized from
/// the header.
#[derive(Copy, Clone, Debug)]
pub struct Image<'a> {
    header: Header,
    coordinates: &'a [u8],
    indices: &'a [u8],
    vertex_attributes: &'a [u8],
    markers: &'a [u8],
    element_attributes: &'a [u8],
}

fn le_bytes<const N: usize>(chunk: &[u8]) -> [u8; N] {
    let mut buf = [0x00; N];
    buf.copy_from_slice(chunk);
    buf
}

/// Replaces the content of `out` with the little-endian values of `block`.
fn fill<T, const N: usize>(block: &[u8], out: &mut Vec<T>, from_bytes: fn([u8; N]) -> T) {
    out.clear();
    out.reserve_exact(block.len() / N);
    out.extend(block.chunks_exact(N).map(|chunk| from_bytes(le_bytes(chunk))));
}

impl<'a> Image<'a> {
    /// Checks the header of `bytes` and that its length matches the header
    /// exactly.
    pub fn parse(bytes: &'a [u8]) -> Result<Image<'a>, Corruption> {
        let header = Header::from_bytes(bytes)?;
        let layout = header
            .layout()
            .ok_or(Corruption::BadHeader("block sizes overflow"))?;
        let expected = layout
            .image_len()
            .ok_or(Corruption::BadHeader("block sizes overflow"))?;
        if expected != bytes.len() {
            return Err(Corruption::LengthMismatch {
                expected,
                found: bytes.len(),
            });
        }

        let mut rest = &bytes[HEADER_LEN..];
        let mut block = |len: usize| -> &'a [u8] {
            let current: &'a [u8] = rest;
            let (block, tail) = current.split_at(len);
            rest = tail;
            block
        };
        Ok(Image {
            header,
            coordinates: block(layout.coordinates),
            indices: block(layout.indices),
            vertex_attributes: block(layout.vertex_attributes),
            markers: block(layout.markers),
            element_attributes: block(layout.element_attributes),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Fills `out` with `vertex_count * dimension` coordinates.
    pub fn read_coordinates(&self, out: &mut Vec<f64>) {
        fill(self.coordinates, out, f64::from_le_bytes);
    }

    /// Fills `out` with `element_count * nodes_per_element` vertex indices.
    pub fn read_indices(&self, out: &mut Vec<u32>) {
        match self.header.index_width {
            IndexWidth::U8 => {
                out.clear();
                out.reserve_exact(self.indices.len());
                out.extend(self.indices.iter().map(|&i| u32::from(i)));
            }
            IndexWidth::U16 => fill::<u32, 2>(self.indices, out, |b| u32::from(u16::from_le_bytes(b))),
            IndexWidth::U32 => fill(self.indices, out, u32::from_le_bytes),
        }
    }

    /// Fills `out` with `vertex_count * vertex_attribute_count` attributes.
    pub fn read_vertex_attributes(&self, out: &mut Vec<f64>) {
        fill(self.vertex_attributes, out, f64::from_le_bytes);
    }

    /// Fills `out` with one marker per vertex, or empties it when the image
    /// has no markers.
    pub fn read_markers(&self, out: &mut Vec<Ref>) {
        fill(self.markers, out, Ref::from_le_bytes);
    }

    /// Fills `out` with `element_count * element_attribute_count` attributes.
    pub fn read_element_attributes(&self, out: &mut Vec<f64>) {
        fill(self.element_attributes, out, f64::from_le_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::to_bytes;
    use crate::mesh::Mesh;

    fn mesh(vertex_count: usize) -> Mesh {
        let coordinates = (0..vertex_count * 3).map(|c| c as f64 * 0.25).collect();
        let indices = (0..vertex_count as u32).collect();
        Mesh::from_raw_parts(3, 4, coordinates, indices).unwrap()
    }

    #[test]
    fn test_decode() {
        for vertex_count in [4, 300, 70_000] {
            let mesh = mesh(vertex_count);
            let bytes = to_bytes(&mesh);
            let image = Image::parse(&bytes).unwrap();
            assert_eq!(image.header().vertex_count, vertex_count);

            let mut coordinates = Vec::new();
            let mut indices = Vec::new();
            image.read_coordinates(&mut coordinates);
            image.read_indices(&mut indices);
            assert_eq!(coordinates, mesh.coordinates());
            assert_eq!(indices, mesh.indices());
        }
    }

    #[test]
    fn test_decode_optional_blocks() {
        let mesh = mesh(4)
            .with_vertex_attributes(2, (0..8).map(f64::from).collect())
            .unwrap()
            .with_markers(vec![5, 6, 7, -8])
            .unwrap()
            .with_element_attributes(1, vec![9.0])
            .unwrap();
        let bytes = to_bytes(&mesh);
        let image = Image::parse(&bytes).unwrap();

        let mut attributes = Vec::new();
        image.read_vertex_attributes(&mut attributes);
        assert_eq!(attributes, mesh.vertex_attributes());
        let mut markers = vec![1, 2, 3];
        image.read_markers(&mut markers);
        assert_eq!(markers, [5, 6, 7, -8]);
        image.read_element_attributes(&mut attributes);
        assert_eq!(attributes, [9.0]);

        let bytes = to_bytes(&self::mesh(4));
        let image = Image::parse(&bytes).unwrap();
        image.read_markers(&mut markers);
        assert!(markers.is_empty());
    }

    #[test]
    fn test_length_mismatch() {
        let mut bytes = to_bytes(&mesh(4));
        let len = bytes.len();
        bytes.push(0);
        assert_eq!(
            Image::parse(&bytes).unwrap_err(),
            Corruption::LengthMismatch {
                expected: len,
                found: len + 1,
            }
        );
        assert_eq!(
            Image::parse(&bytes[..len - 1]).unwrap_err(),
            Corruption::LengthMismatch {
                expected: len,
                found: len - 1,
            }
        );
    }

    #[test]
    fn test_oversized_counts() {
        let mut bytes = to_bytes(&mesh(4));
        bytes[8..16].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(
            Image::parse(&bytes),
            Err(Corruption::BadHeader(_)) | Err(Corruption::LengthMismatch { .. })
        ));
    }
}
