use crate::binary::Corruption;
use crate::node_ele::ParseError;
use std::error;
use std::fmt;
use std::io;
use std::path::Path;
use std::path::PathBuf;

/// Structural reference violation found while building a mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    /// An element references a vertex index absent from the node file.
    DanglingReference { element: usize, vertex: i64 },
    /// Two vertices share the same index in the node file.
    DuplicateVertex { vertex: i64 },
    /// A flat buffer does not match the size of the mesh.
    BufferLength {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inconsistency::DanglingReference { element, vertex } => {
                write!(f, "element {} references unknown vertex {}", element, vertex)
            }
            Inconsistency::DuplicateVertex { vertex } => {
                write!(f, "vertex {} is defined twice", vertex)
            }
            Inconsistency::BufferLength {
                what,
                expected,
                found,
            } => write!(
                f,
                "{} buffer has length {}, expected {}",
                what, found, expected,
            ),
        }
    }
}

#[derive(Debug)]
pub enum Error {
    /// A node or ele file does not follow its grammar.
    MalformedInput {
        path: Option<PathBuf>,
        source: ParseError,
    },
    InconsistentMesh(Inconsistency),
    /// The mesh has no vertex or no element.
    EmptyMesh,
    /// Elements have neither 4 nor 10 nodes.
    UnsupportedArity(usize),
    /// Vertices are neither 2D nor 3D.
    UnsupportedDimension(usize),
    /// A path could not be read or written.
    Io { path: PathBuf, source: io::Error },
    CorruptImage(Corruption),
}

impl Error {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
        move |source| Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(path: &Path) -> impl FnOnce(ParseError) -> Error + '_ {
        move |source| Error::MalformedInput {
            path: Some(path.to_path_buf()),
            source,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedInput {
                path: Some(path),
                source,
            } => write!(f, "{}: {}", path.display(), source),
            Error::MalformedInput { path: None, source } => write!(f, "{}", source),
            Error::InconsistentMesh(inconsistency) => {
                write!(f, "inconsistent mesh: {}", inconsistency)
            }
            Error::EmptyMesh => write!(f, "mesh has no vertex or no element"),
            Error::UnsupportedArity(arity) => write!(
                f,
                "unsupported element arity {}, expected 4 (linear) or 10 (quadratic)",
                arity,
            ),
            Error::UnsupportedDimension(dimension) => {
                write!(f, "unsupported dimension {}, expected 2 or 3", dimension)
            }
            Error::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            Error::CorruptImage(corruption) => write!(f, "corrupt binary image: {}", corruption),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::MalformedInput { source, .. } => Some(source),
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ParseError> for Error {
    fn from(source: ParseError) -> Error {
        Error::MalformedInput { path: None, source }
    }
}

impl From<Inconsistency> for Error {
    fn from(inconsistency: Inconsistency) -> Error {
        Error::InconsistentMesh(inconsistency)
    }
}

impl From<Corruption> for Error {
    fn from(corruption: Corruption) -> Error {
        Error::CorruptImage(corruption)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
