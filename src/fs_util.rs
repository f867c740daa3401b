use std::fs;
use std::io::Write;

use camino::Utf8Path;

use crate::error::DashError;

pub fn read_file(path: &Utf8Path) -> Result<Vec<u8>, DashError> {
    fs::read(path.as_std_path()).map_err(|err| DashError::Filesystem(format!("read {path}: {err}")))
}

/// Writes through a temp file in the destination directory, then renames.
pub fn write_atomic(dest: &Utf8Path, contents: &[u8]) -> Result<(), DashError> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| DashError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("viromedash-out")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| DashError::Filesystem(err.to_string()))?;
    temp.write_all(contents)
        .map_err(|err| DashError::Filesystem(err.to_string()))?;
    temp.persist(dest.as_std_path())
        .map_err(|err| DashError::Filesystem(err.to_string()))?;
    Ok(())
}
