use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::AtlasError;

/// Extracts the first entry of `candidates` present in the archive into
/// `target_dir` and returns its path.
pub fn extract_first_entry(
    zip_path: &Path,
    candidates: &[&str],
    target_dir: &Path,
) -> Result<PathBuf, AtlasError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| AtlasError::Archive(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file).map_err(|err| AtlasError::Archive(err.to_string()))?;

    let name = candidates
        .iter()
        .copied()
        .find(|candidate| archive.file_names().any(|name| name == *candidate))
        .ok_or_else(|| {
            AtlasError::Archive(format!(
                "{} not found in {}",
                candidates.join("/"),
                zip_path.display()
            ))
        })?;

    let mut entry = archive
        .by_name(name)
        .map_err(|err| AtlasError::Archive(err.to_string()))?;
    let relative = entry
        .enclosed_name()
        .ok_or_else(|| AtlasError::Archive("zip entry path traversal detected".to_string()))?;
    let out_path = target_dir.join(relative);
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).map_err(|err| AtlasError::Filesystem(err.to_string()))?;
    }
    let mut outfile =
        fs::File::create(&out_path).map_err(|err| AtlasError::Filesystem(err.to_string()))?;
    io::copy(&mut entry, &mut outfile).map_err(|err| AtlasError::Archive(err.to_string()))?;
    Ok(out_path)
}

/// Writes `content` next to `path` and renames it into place.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), AtlasError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|err| AtlasError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("organism-atlas")
        .tempfile_in(parent)
        .map_err(|err| AtlasError::Filesystem(err.to_string()))?;
    io::Write::write_all(&mut temp, content)
        .map_err(|err| AtlasError::Filesystem(err.to_string()))?;
    temp.persist(path)
        .map_err(|err| AtlasError::Filesystem(err.to_string()))?;
    Ok(())
}
