//! A converter from TetGen text meshes to a compact binary image.
//!
//! A tetrahedral mesh described by a `.node` file (vertices) and an `.ele`
//! file (elements) is parsed, renumbered from 0 and written into a single
//! little-endian binary file that can be decoded with bulk copies.
//!
//! ```no_run
//! # fn main() -> tetbin::Result<()> {
//! use tetbin::Inclusion;
//!
//! tetbin::write_node_ele_as_binary("cube.node", "cube.ele", Inclusion::None, "cube.bin")?;
//!
//! let mut coordinates = Vec::new();
//! let mut indices = Vec::new();
//! tetbin::read_binary("cube.bin", &mut coordinates, &mut indices)?;
//! # Ok(())
//! # }
//! ```
//!
//! The [`node_ele`] and [`binary`] modules expose each step separately, along
//! with the optional marker and attribute blocks.

pub mod binary;
pub mod mesh;
pub mod node_ele;

mod error;


pub use error::Error;
pub use error::Inconsistency;
pub use error::Result;
pub use mesh::Inclusion;
pub use mesh::Mesh;

use std::fs;
use std::io;
use std::path::Path;

/// Opens and parses a text file, attaching `path` to any error.
///
/// Read failures once the file is open (including invalid UTF-8) are reported
/// as malformed input, with the line they happened at.
fn read_text<T, F>(path: &Path, parse: F) -> Result<T>
where
    F: FnOnce(io::BufReader<fs::File>) -> std::result::Result<T, node_ele::ParseError>,
{
    let file = fs::File::open(path).map_err(Error::io(path))?;
    parse(io::BufReader::new(file)).map_err(Error::malformed(path))
}

/// Converts the mesh described by the files at `node_path` and `ele_path` into
/// a binary image at `bin_path`.
///
/// `inclusion` selects which optional columns are carried into the image.
/// The image is written to a temporary file next to `bin_path` first, so that
/// `bin_path` never holds a partial image, even when the conversion fails.
pub fn write_node_ele_as_binary(
    node_path: impl AsRef<Path>,
    ele_path: impl AsRef<Path>,
    inclusion: Inclusion,
    bin_path: impl AsRef<Path>,
) -> Result<()> {
    let node_path = node_path.as_ref();
    let ele_path = ele_path.as_ref();
    let bin_path = bin_path.as_ref();
    let span = tracing::info_span!(
        "write_node_ele_as_binary",
        node = %node_path.display(),
        bin = %bin_path.display(),
    );
    let _enter = span.enter();

    let nodes = read_text(node_path, node_ele::parse_node)?;
    let elements = read_text(ele_path, node_ele::parse_ele)?;
    let mesh = Mesh::build(nodes, elements, inclusion)?;
    binary::write_file(&mesh, bin_path)
}

/// Decodes the coordinates and element indices of the binary image at
/// `bin_path`.
///
/// The whole image is validated before the output buffers are touched: on
/// error, `out_coordinates` and `out_indices` keep their previous content.
/// On success, their previous content is replaced.
///
/// The image is read into memory at once, checked, then each block is
/// converted into the output buffers with one allocation per buffer. Values
/// are decoded from little-endian bytes one by one rather than copied, which
/// keeps the decoder free of `unsafe` and independent of the host byte order.
pub fn read_binary(
    bin_path: impl AsRef<Path>,
    out_coordinates: &mut Vec<f64>,
    out_indices: &mut Vec<u32>,
) -> Result<()> {
    let bin_path = bin_path.as_ref();
    let bytes = fs::read(bin_path).map_err(Error::io(bin_path))?;
    let image = binary::Image::parse(&bytes)?;
    tracing::debug!(
        path = %bin_path.display(),
        vertex_count = image.header().vertex_count,
        element_count = image.header().element_count,
        "decoding binary image"
    );

    image.read_coordinates(out_coordinates);
    image.read_indices(out_indices);
    Ok(())
}
