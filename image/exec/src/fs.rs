/*++

Licensed under the Apache-2.0 license.

File Name:

    fs.rs

Abstract:

    Filesystem helpers for the working directory and its artifacts. Errors
    name the path and the step that failed.

--*/

use std::path::{Path, PathBuf};

use otfad_image_types::{OtfadError, OtfadResult};

/// Remove `path` if it exists and create it again, empty.
pub fn recreate_dir(path: &Path) -> OtfadResult<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(OtfadError::io("removing working dir", path, err)),
    }
    std::fs::create_dir_all(path).map_err(|err| OtfadError::io("creating working dir", path, err))
}

/// Same as [`std::fs::read`] but with more informative errors.
pub fn read(path: &Path) -> OtfadResult<Vec<u8>> {
    std::fs::read(path).map_err(|err| OtfadError::io("reading from file", path, err))
}

/// Size of the file at `path` in bytes.
pub fn file_len(path: &Path) -> OtfadResult<u64> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|err| OtfadError::io("reading metadata of", path, err))
}

/// Move `from` to `to`, copying when a rename is not possible
/// (e.g. across filesystems).
pub fn move_file(from: &Path, to: &Path) -> OtfadResult<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).map_err(|err| OtfadError::io("moving file", from, err))?;
    std::fs::remove_file(from).map_err(|err| OtfadError::io("removing file", from, err))
}

/// Scratch directory under the system temp dir, removed on drop.
#[derive(Debug)]
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new() -> std::io::Result<Self> {
        let path = std::env::temp_dir().join(format!("otfad-{}", random_suffix()?));
        std::fs::create_dir(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `contents` to `name` inside the directory, creating parents.
    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> std::io::Result<PathBuf> {
        let path = self.path.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

fn random_suffix() -> std::io::Result<String> {
    let mut bytes = [0u8; 12];
    getrandom::getrandom(&mut bytes)
        .map_err(|err| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("random temp dir name: {err}"),
            )
        })?;
    Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
}
