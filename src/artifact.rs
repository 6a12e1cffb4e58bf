//! File hand-off between pipeline stages.
//!
//! Every stage reads and writes typed artifacts through these helpers so
//! I/O failures carry the offending path, and so writes are all-or-nothing:
//! data goes to a sibling temp file first and is renamed into place.

use std::path::{Path, PathBuf};

use crate::error::DataError;

/// Read a whole file into memory.
pub fn read(path: &Path) -> Result<Vec<u8>, DataError> {
    std::fs::read(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> DataError {
    let path = path.display().to_string();
    move |source| DataError::Io { path, source }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    path.with_file_name(tmp_name)
}

/// Write `bytes` to `path` atomically, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DataError> {
    write_all_atomic(&[(path, bytes)])
}

/// Write several files so that either all of them land or none do.
///
/// Every file is staged to its temp sibling before the first rename. If a
/// rename fails, the remaining temp files and the files already renamed in
/// this call are removed.
pub fn write_all_atomic(files: &[(&Path, &[u8])]) -> Result<(), DataError> {
    let mut staged: Vec<PathBuf> = Vec::with_capacity(files.len());
    let discard = |paths: &[PathBuf]| {
        for p in paths {
            let _ = std::fs::remove_file(p);
        }
    };

    for (path, bytes) in files {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                discard(&staged);
                return Err(io_err(parent)(e));
            }
        }
        let tmp = temp_path(path);
        if let Err(e) = std::fs::write(&tmp, bytes) {
            discard(&staged);
            return Err(io_err(&tmp)(e));
        }
        staged.push(tmp);
    }

    for (i, ((path, _), tmp)) in files.iter().zip(&staged).enumerate() {
        if let Err(source) = std::fs::rename(tmp, path) {
            discard(&staged[i..]);
            let renamed: Vec<PathBuf> = files[..i].iter().map(|(p, _)| p.to_path_buf()).collect();
            discard(&renamed);
            return Err(DataError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    }
    Ok(())
}

/// Serialize `value` as pretty JSON bytes destined for `path`.
pub fn encode_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<Vec<u8>, DataError> {
    serde_json::to_vec_pretty(value).map_err(|e| DataError::Serialization {
        message: format!("JSON encode for {}: {e}", path.display()),
    })
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DataError> {
    write_atomic(path, &encode_json(path, value)?)
}

/// Read and deserialize a JSON artifact.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DataError> {
    let bytes = read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| DataError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
