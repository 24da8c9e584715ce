//! File system-related utilities.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use eyre::Result;

use crate::Error;

/// Canonicalize the given path if it exists. If it does not exist, returns
/// `Ok(None)`.
pub fn maybe_canonicalize<P>(path: P) -> Result<Option<PathBuf>>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if path.exists() {
        Ok(Some(path.canonicalize()?))
    } else {
        Ok(None)
    }
}

/// Read the entire contents of the file at the given path as UTF-8 text.
pub fn read_source<P: AsRef<Path>>(path: P) -> Result<String, Error> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|e| Error::Io(path.to_path_buf(), e))
}

/// Obtain the last modification time of the file at the given path, in whole
/// seconds since the Unix epoch.
pub fn modified<P: AsRef<Path>>(path: P) -> Result<u64, Error> {
    let path = path.as_ref();
    let mtime = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| Error::Io(path.to_path_buf(), e))?;
    Ok(unix_seconds(mtime))
}

/// The current time in whole seconds since the Unix epoch.
pub fn now() -> u64 {
    unix_seconds(SystemTime::now())
}

// Times before the epoch are clamped to zero.
fn unix_seconds(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
