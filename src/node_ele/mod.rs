//! This module reads and writes the `.node` and `.ele` text files used by
//! [TetGen](https://wias-berlin.de/software/tetgen/) to describe
//! tetrahedral meshes.
//!
//! Both files start with a header line giving the number of records and the
//! shape of each record, followed by one line per record. Everything after a
//! `#` is a comment.
//!
//! ```text
//! # .node
//! <vertex count> <dimension> <attribute count> <boundary marker: 0|1>
//! <index> <coordinate>*dimension <attribute>*attribute_count [marker]
//!
//! # .ele
//! <element count> <nodes per element> <attribute count>
//! <index> <vertex>*nodes_per_element <attribute>*attribute_count
//! ```

pub use parser::parse_ele;
pub use parser::parse_node;
pub use parser::Error as ParseError;
pub use parser::ErrorKind as ParseErrorKind;

mod parser;
mod serializer;

pub use serializer::DisplayEle;
pub use serializer::DisplayNode;

/// Boundary marker of a vertex.
pub type Ref = i64;

/// Column layout shared by every record of a file, as declared by its header.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Columns {
    /// Coordinates of a vertex, or vertex references of an element.
    pub primary: usize,
    pub attributes: usize,
    pub marker: bool,
}

impl Columns {
    /// Number of tokens on a record line, including the leading index.
    pub fn token_count(self) -> usize {
        1 + self.primary + self.attributes + usize::from(self.marker)
    }
}

/// Content of a node file, as read.
#[derive(Clone, Debug, Default)]
pub struct NodeFile {
    columns: Columns,
    first_index: i64,
    indices: Vec<i64>,
    coordinates: Vec<f64>,
    attributes: Vec<f64>,
    markers: Vec<Ref>,
}

/// A vertex record of a [`NodeFile`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex<'a> {
    /// Index as written in the file.
    pub index: i64,
    pub coordinates: &'a [f64],
    pub attributes: &'a [f64],
    pub marker: Option<Ref>,
}

impl NodeFile {
    pub fn columns(&self) -> Columns {
        self.columns
    }

    pub fn dimension(&self) -> usize {
        self.columns.primary
    }

    pub fn attribute_count(&self) -> usize {
        self.columns.attributes
    }

    pub fn has_markers(&self) -> bool {
        self.columns.marker
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The smallest vertex index found in the file, usually 0 or 1.
    pub fn first_index(&self) -> i64 {
        self.first_index
    }

    /// Vertex indices as written in the file.
    pub fn indices(&self) -> &[i64] {
        &self.indices
    }

    /// e.g. [x1, y1, z1, x2, y2, z2, ...]
    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    pub fn attributes(&self) -> &[f64] {
        &self.attributes
    }

    /// Empty when the file has no marker column.
    pub fn markers(&self) -> &[Ref] {
        &self.markers
    }

    pub fn vertex(&self, i: usize) -> Vertex<'_> {
        let dimension = self.columns.primary;
        let attribute_count = self.columns.attributes;
        Vertex {
            index: self.indices[i],
            coordinates: &self.coordinates[i * dimension..(i + 1) * dimension],
            attributes: &self.attributes[i * attribute_count..(i + 1) * attribute_count],
            marker: self.markers.get(i).copied(),
        }
    }

    pub fn vertices(&self) -> impl Iterator<Item = Vertex<'_>> {
        (0..self.len()).map(|i| self.vertex(i))
    }

    pub(crate) fn into_parts(self) -> (Vec<i64>, Vec<f64>, Vec<f64>, Vec<Ref>) {
        (self.indices, self.coordinates, self.attributes, self.markers)
    }
}

/// Content of an ele file, as read.
#[derive(Clone, Debug, Default)]
pub struct EleFile {
    columns: Columns,
    count: usize,
    vertex_refs: Vec<i64>,
    attributes: Vec<f64>,
}

impl EleFile {
    pub fn columns(&self) -> Columns {
        self.columns
    }

    pub fn nodes_per_element(&self) -> usize {
        self.columns.primary
    }

    pub fn attribute_count(&self) -> usize {
        self.columns.attributes
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Vertex indices of all elements, as written in the file.
    pub fn vertex_refs(&self) -> &[i64] {
        &self.vertex_refs
    }

    pub fn attributes(&self) -> &[f64] {
        &self.attributes
    }

    /// Iterates over `(vertex references, attributes)` pairs.
    pub fn elements(&self) -> impl Iterator<Item = (&[i64], &[f64])> {
        let nodes_per_element = self.columns.primary;
        let attribute_count = self.columns.attributes;
        (0..self.count).map(move |i| {
            (
                &self.vertex_refs[i * nodes_per_element..(i + 1) * nodes_per_element],
                &self.attributes[i * attribute_count..(i + 1) * attribute_count],
            )
        })
    }

    pub(crate) fn into_parts(self) -> (Vec<i64>, Vec<f64>) {
        (self.vertex_refs, self.attributes)
    }
}

impl std::str::FromStr for NodeFile {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<NodeFile, ParseError> {
        parse_node(s.as_bytes())
    }
}

impl std::str::FromStr for EleFile {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<EleFile, ParseError> {
        parse_ele(s.as_bytes())
    }
}
