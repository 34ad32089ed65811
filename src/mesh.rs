//! Validated, densely indexed tetrahedral meshes.

use crate::error::Error;
use crate::error::Inconsistency;
use crate::error::Result;
use crate::node_ele::EleFile;
use crate::node_ele::NodeFile;
use crate::node_ele::Ref;
use itertools::Itertools as _;
use std::collections::HashMap;
use std::str;

/// Node counts of supported tetrahedra: corners only, or corners and edge
/// middles.
pub const SUPPORTED_ARITIES: [usize; 2] = [4, 10];

pub const SUPPORTED_DIMENSIONS: [usize; 2] = [2, 3];

/// Which optional columns of the node and ele files are kept in the mesh.
///
/// Columns that are not kept are still parsed, then discarded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Inclusion {
    /// Coordinates and connectivity only.
    #[default]
    None,
    /// Boundary markers of vertices.
    Markers,
    /// Boundary markers, vertex attributes and element (region) attributes.
    All,
}

impl Inclusion {
    pub fn keeps_markers(self) -> bool {
        self >= Inclusion::Markers
    }

    pub fn keeps_attributes(self) -> bool {
        self == Inclusion::All
    }
}

impl str::FromStr for Inclusion {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Inclusion, ()> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "none" => Inclusion::None,
            "markers" => Inclusion::Markers,
            "all" => Inclusion::All,
            _ => return Err(()),
        })
    }
}

/// Tetrahedral mesh with vertices renumbered from 0 in file order.
///
/// Element connectivity is stored as a flat array of dense vertex indices,
/// `nodes_per_element` entries per element.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    dimension: usize,
    nodes_per_element: usize,
    coordinates: Vec<f64>,
    indices: Vec<u32>,
    vertex_attribute_count: usize,
    vertex_attributes: Vec<f64>,
    markers: Option<Vec<Ref>>,
    element_attribute_count: usize,
    element_attributes: Vec<f64>,
}

fn check_shape(dimension: usize, nodes_per_element: usize) -> Result<()> {
    if !SUPPORTED_DIMENSIONS.contains(&dimension) {
        return Err(Error::UnsupportedDimension(dimension));
    }
    if !SUPPORTED_ARITIES.contains(&nodes_per_element) {
        return Err(Error::UnsupportedArity(nodes_per_element));
    }
    Ok(())
}

fn check_len(what: &'static str, buffer_len: usize, expected: usize) -> Result<()> {
    if buffer_len != expected {
        return Err(Inconsistency::BufferLength {
            what,
            expected,
            found: buffer_len,
        }
        .into());
    }
    Ok(())
}

/// Maps vertex indices, as written in the node file, to dense indices.
enum DenseIndex {
    /// Indices follow each other from `first`, the common case.
    Offset { first: i64, len: usize },
    Map(HashMap<i64, u32>),
}

impl DenseIndex {
    fn new(indices: &[i64], first: i64) -> Result<DenseIndex> {
        let contiguous = indices.first() == Some(&first)
            && indices
                .iter()
                .tuple_windows()
                .all(|(prev, next)| prev.checked_add(1) == Some(*next));
        if contiguous {
            return Ok(DenseIndex::Offset {
                first,
                len: indices.len(),
            });
        }

        let mut map = HashMap::with_capacity(indices.len());
        for (dense, &index) in indices.iter().enumerate() {
            if map.insert(index, dense as u32).is_some() {
                return Err(Inconsistency::DuplicateVertex { vertex: index }.into());
            }
        }
        Ok(DenseIndex::Map(map))
    }

    fn get(&self, index: i64) -> Option<u32> {
        match self {
            DenseIndex::Offset { first, len } => {
                let offset = index.checked_sub(*first)?;
                if 0 <= offset && (offset as u64) < *len as u64 {
                    Some(offset as u32)
                } else {
                    None
                }
            }
            DenseIndex::Map(map) => map.get(&index).copied(),
        }
    }
}

impl Mesh {
    /// Assembles parsed node and ele files into a mesh.
    ///
    /// Element vertex references are resolved against the indices of the node
    /// file, so both 0-based and 1-based files are accepted as long as the two
    /// files agree.
    pub fn build(nodes: NodeFile, elements: EleFile, inclusion: Inclusion) -> Result<Mesh> {
        if nodes.is_empty() || elements.is_empty() {
            return Err(Error::EmptyMesh);
        }
        let dimension = nodes.dimension();
        let nodes_per_element = elements.nodes_per_element();
        check_shape(dimension, nodes_per_element)?;

        let has_markers = nodes.has_markers();
        let first_index = nodes.first_index();
        let mut vertex_attribute_count = nodes.attribute_count();
        let mut element_attribute_count = elements.attribute_count();
        let (node_indices, coordinates, mut vertex_attributes, markers) = nodes.into_parts();
        let (vertex_refs, mut element_attributes) = elements.into_parts();

        let dense = DenseIndex::new(&node_indices, first_index)?;
        let mut indices = Vec::with_capacity(vertex_refs.len());
        for (element, refs) in vertex_refs.chunks_exact(nodes_per_element).enumerate() {
            for &vertex in refs {
                let index = dense
                    .get(vertex)
                    .ok_or(Inconsistency::DanglingReference { element, vertex })?;
                indices.push(index);
            }
        }

        let markers = if has_markers && inclusion.keeps_markers() {
            Some(markers)
        } else {
            None
        };
        if !inclusion.keeps_attributes() {
            vertex_attribute_count = 0;
            vertex_attributes = Vec::new();
            element_attribute_count = 0;
            element_attributes = Vec::new();
        }

        let mesh = Mesh {
            dimension,
            nodes_per_element,
            coordinates,
            indices,
            vertex_attribute_count,
            vertex_attributes,
            markers,
            element_attribute_count,
            element_attributes,
        };
        tracing::debug!(
            vertex_count = mesh.vertex_count(),
            element_count = mesh.element_count(),
            dimension,
            nodes_per_element,
            first_index,
            ?inclusion,
            "built mesh"
        );
        Ok(mesh)
    }

    /// Builds a mesh from flat coordinates and dense vertex indices.
    pub fn from_raw_parts(
        dimension: usize,
        nodes_per_element: usize,
        coordinates: Vec<f64>,
        indices: Vec<u32>,
    ) -> Result<Mesh> {
        check_shape(dimension, nodes_per_element)?;
        if coordinates.is_empty() || indices.is_empty() {
            return Err(Error::EmptyMesh);
        }
        let vertex_count = coordinates.len() / dimension;
        check_len("coordinate", coordinates.len(), vertex_count * dimension)?;
        let element_count = indices.len() / nodes_per_element;
        check_len("index", indices.len(), element_count * nodes_per_element)?;

        if let Some(position) = indices.iter().position(|&i| i as usize >= vertex_count) {
            return Err(Inconsistency::DanglingReference {
                element: position / nodes_per_element,
                vertex: i64::from(indices[position]),
            }
            .into());
        }

        Ok(Mesh {
            dimension,
            nodes_per_element,
            coordinates,
            indices,
            vertex_attribute_count: 0,
            vertex_attributes: Vec::new(),
            markers: None,
            element_attribute_count: 0,
            element_attributes: Vec::new(),
        })
    }

    /// Attaches `attribute_count` attributes to each vertex.
    pub fn with_vertex_attributes(mut self, attribute_count: usize, attributes: Vec<f64>) -> Result<Mesh> {
        check_len(
            "vertex attribute",
            attributes.len(),
            attribute_count * self.vertex_count(),
        )?;
        self.vertex_attribute_count = attribute_count;
        self.vertex_attributes = attributes;
        Ok(self)
    }

    /// Attaches a boundary marker to each vertex.
    pub fn with_markers(mut self, markers: Vec<Ref>) -> Result<Mesh> {
        check_len("marker", markers.len(), self.vertex_count())?;
        self.markers = Some(markers);
        Ok(self)
    }

    /// Attaches `attribute_count` attributes to each element.
    pub fn with_element_attributes(mut self, attribute_count: usize, attributes: Vec<f64>) -> Result<Mesh> {
        check_len(
            "element attribute",
            attributes.len(),
            attribute_count * self.element_count(),
        )?;
        self.element_attribute_count = attribute_count;
        self.element_attributes = attributes;
        Ok(self)
    }

    /// Returns the dimension of the mesh (2D or 3D).
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn nodes_per_element(&self) -> usize {
        self.nodes_per_element
    }

    pub fn vertex_count(&self) -> usize {
        self.coordinates.len() / self.dimension
    }

    pub fn element_count(&self) -> usize {
        self.indices.len() / self.nodes_per_element
    }

    /// e.g. [x1, y1, z1, x2, y2, z2, ...]
    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    /// Dense vertex indices of every element, one after the other.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex(&self, idx: usize) -> &[f64] {
        &self.coordinates[idx * self.dimension..(idx + 1) * self.dimension]
    }

    pub fn vertices(&self) -> impl Iterator<Item = &[f64]> {
        self.coordinates.chunks_exact(self.dimension)
    }

    pub fn elements(&self) -> impl Iterator<Item = &[u32]> {
        self.indices.chunks_exact(self.nodes_per_element)
    }

    pub fn vertex_attribute_count(&self) -> usize {
        self.vertex_attribute_count
    }

    pub fn vertex_attributes(&self) -> &[f64] {
        &self.vertex_attributes
    }

    pub fn markers(&self) -> Option<&[Ref]> {
        self.markers.as_deref()
    }

    pub fn element_attribute_count(&self) -> usize {
        self.element_attribute_count
    }

    pub fn element_attributes(&self) -> &[f64] {
        &self.element_attributes
    }

    /// The largest dense vertex index, `vertex_count - 1`.
    pub fn max_index(&self) -> usize {
        self.vertex_count().saturating_sub(1)
    }
}
