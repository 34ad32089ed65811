use crate::mesh::Mesh;
use itertools::Itertools as _;
use std::fmt;

/// Serialize the vertices of a mesh into the node format.
#[derive(Debug)]
pub struct DisplayNode<'a> {
    mesh: &'a Mesh,
}

/// Serialize the elements of a mesh into the ele format.
#[derive(Debug)]
pub struct DisplayEle<'a> {
    mesh: &'a Mesh,
}

impl Mesh {
    /// Vertices are numbered from 0, in dense index order.
    pub fn display_node(&self) -> DisplayNode<'_> {
        DisplayNode { mesh: self }
    }

    /// Elements and vertex references are numbered from 0.
    pub fn display_ele(&self) -> DisplayEle<'_> {
        DisplayEle { mesh: self }
    }
}

impl fmt::Display for DisplayNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mesh = self.mesh;
        let attribute_count = mesh.vertex_attribute_count();
        let markers = mesh.markers();
        writeln!(
            f,
            "{} {} {} {}",
            mesh.vertex_count(),
            mesh.dimension(),
            attribute_count,
            usize::from(markers.is_some()),
        )?;
        for (i, coordinates) in mesh.vertices().enumerate() {
            write!(f, "{} {}", i, coordinates.iter().format(" "))?;
            let attributes = &mesh.vertex_attributes()[i * attribute_count..(i + 1) * attribute_count];
            for attribute in attributes {
                write!(f, " {}", attribute)?;
            }
            if let Some(markers) = markers {
                write!(f, " {}", markers[i])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for DisplayEle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mesh = self.mesh;
        let attribute_count = mesh.element_attribute_count();
        writeln!(
            f,
            "{} {} {}",
            mesh.element_count(),
            mesh.nodes_per_element(),
            attribute_count,
        )?;
        for (i, element) in mesh.elements().enumerate() {
            write!(f, "{} {}", i, element.iter().format(" "))?;
            let attributes =
                &mesh.element_attributes()[i * attribute_count..(i + 1) * attribute_count];
            for attribute in attributes {
                write!(f, " {}", attribute)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
