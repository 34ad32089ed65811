use super::Header;
use super::IndexWidth;
use super::HEADER_LEN;
use crate::error::Error;
use crate::error::Result;
use crate::mesh::Mesh;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

/// Encodes `mesh` into a binary image.
pub fn to_bytes(mesh: &Mesh) -> Vec<u8> {
    let header = Header::for_mesh(mesh);
    let len = header
        .layout()
        .and_then(|layout| layout.image_len())
        .unwrap_or(HEADER_LEN);
    let mut bytes = Vec::with_capacity(len);

    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend(mesh.coordinates().iter().flat_map(|c| c.to_le_bytes()));
    match header.index_width {
        IndexWidth::U8 => bytes.extend(mesh.indices().iter().map(|&i| i as u8)),
        IndexWidth::U16 => {
            bytes.extend(mesh.indices().iter().flat_map(|&i| (i as u16).to_le_bytes()))
        }
        IndexWidth::U32 => bytes.extend(mesh.indices().iter().flat_map(|i| i.to_le_bytes())),
    }
    bytes.extend(mesh.vertex_attributes().iter().flat_map(|a| a.to_le_bytes()));
    if let Some(markers) = mesh.markers() {
        bytes.extend(markers.iter().flat_map(|m| m.to_le_bytes()));
    }
    bytes.extend(mesh.element_attributes().iter().flat_map(|a| a.to_le_bytes()));

    bytes
}

/// Writes the binary image of `mesh` into `w`.
///
/// The image is built in memory first, then written at once.
pub fn encode<W: io::Write>(mesh: &Mesh, mut w: W) -> io::Result<()> {
    w.write_all(&to_bytes(mesh))?;
    w.flush()
}

/// Distinguishes concurrent writes of this process to the same path.
static WRITE_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Path next to `path` the image is written to before being moved in place,
/// e.g. `.cow.bin.1234-0.part` for `cow.bin`.
fn partial_path(path: &Path) -> io::Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path does not name a file")
    })?;
    let mut partial = OsString::from(".");
    partial.push(file_name);
    partial.push(format!(
        ".{}-{}.part",
        process::id(),
        WRITE_COUNT.fetch_add(1, Ordering::Relaxed),
    ));
    Ok(path.with_file_name(partial))
}

fn write_then_rename(mut file: fs::File, bytes: &[u8], partial: &Path, path: &Path) -> io::Result<()> {
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(partial, path)
}

/// Writes the binary image of `mesh` to the file at `path`.
///
/// The file only appears at `path` once it has been fully written; on failure
/// nothing is left behind.
pub fn write_file(mesh: &Mesh, path: &Path) -> Result<()> {
    let partial = partial_path(path).map_err(Error::io(path))?;
    let bytes = to_bytes(mesh);
    tracing::debug!(
        len = bytes.len(),
        index_width = ?Header::for_mesh(mesh).index_width,
        partial = %partial.display(),
        "writing binary image"
    );

    // Never truncate, nor remove below, a file this call did not create.
    let file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&partial)
        .map_err(Error::io(path))?;
    if let Err(err) = write_then_rename(file, &bytes, &partial, path) {
        match fs::remove_file(&partial) {
            Ok(()) => tracing::warn!(partial = %partial.display(), "discarded partial image"),
            Err(rm_err) if rm_err.kind() == io::ErrorKind::NotFound => {}
            Err(rm_err) => tracing::warn!(
                partial = %partial.display(),
                "failed to remove partial image: {}",
                rm_err
            ),
        }
        return Err(Error::io(path)(err));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::FLAG_MARKERS;

    fn tetrahedron() -> Mesh {
        Mesh::from_raw_parts(
            3,
            4,
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            vec![0, 1, 2, 3],
        )
        .unwrap()
    }

    #[test]
    fn test_to_bytes() {
        let bytes = to_bytes(&tetrahedron());
        assert_eq!(bytes.len(), HEADER_LEN + 12 * 8 + 4);
        assert_eq!(bytes[5], 0);
        assert_eq!(bytes[7], 1);
        assert_eq!(bytes[HEADER_LEN + 3 * 8..HEADER_LEN + 4 * 8], 1.0_f64.to_le_bytes());
        assert_eq!(bytes[HEADER_LEN + 12 * 8..], [0, 1, 2, 3]);
    }

    #[test]
    fn test_optional_blocks() {
        let mesh = tetrahedron()
            .with_markers(vec![-1, 0, 1, 2])
            .unwrap()
            .with_element_attributes(1, vec![3.5])
            .unwrap();
        let bytes = to_bytes(&mesh);
        assert_eq!(bytes.len(), HEADER_LEN + 12 * 8 + 4 + 4 * 8 + 8);
        assert_eq!(bytes[5] & FLAG_MARKERS, FLAG_MARKERS);
        let markers = HEADER_LEN + 12 * 8 + 4;
        assert_eq!(bytes[markers..markers + 8], (-1_i64).to_le_bytes());
        assert_eq!(bytes[bytes.len() - 8..], 3.5_f64.to_le_bytes());
    }

    #[test]
    fn test_encode_matches_to_bytes() {
        let mesh = tetrahedron();
        let mut out = Vec::new();
        encode(&mesh, &mut out).unwrap();
        assert_eq!(out, to_bytes(&mesh));
    }

    #[test]
    fn test_partial_path() {
        let partial = partial_path(Path::new("/tmp/cow.bin")).unwrap();
        assert_eq!(partial.parent(), Some(Path::new("/tmp")));
        let name = partial.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(&format!(".cow.bin.{}-", process::id())));
        assert!(name.ends_with(".part"));
        assert_ne!(partial, partial_path(Path::new("/tmp/cow.bin")).unwrap());
        assert!(partial_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_user_part_file_is_kept() {
        let dir = std::env::temp_dir().join(format!("tetbin-{}-user-part", process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cow.bin");
        let user_file = dir.join("cow.bin.part");
        fs::write(&user_file, "not ours").unwrap();

        write_file(&tetrahedron(), &path).unwrap();
        assert_eq!(fs::read(&user_file).unwrap(), b"not ours");

        // The destination is a directory, so the rename fails.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "").unwrap();
        assert!(write_file(&tetrahedron(), &path).is_err());
        assert_eq!(fs::read(&user_file).unwrap(), b"not ours");
        let mut names: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, ["cow.bin", "cow.bin.part"]);

        fs::remove_dir_all(&dir).unwrap();
    }
}
