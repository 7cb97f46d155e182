//! File replacement helpers.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::NoelError;

/// Replace `path` with `data` by writing a sibling temp file and renaming it
/// over the target.
///
/// The parent directory must already exist. An existing target keeps its
/// permissions. On any failure the target keeps its previous content and the
/// temp file is removed when dropped.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<(), NoelError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| NoelError::io(dir, e))?;
    tmp.write_all(data).map_err(|e| NoelError::io(tmp.path(), e))?;
    // Temp files are created owner-only; carry over the target's mode.
    match fs::metadata(path) {
        Ok(metadata) => tmp
            .as_file()
            .set_permissions(metadata.permissions())
            .map_err(|e| NoelError::io(tmp.path(), e))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(NoelError::io(path, e)),
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| NoelError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| NoelError::io(path, e.error))?;
    Ok(())
}
