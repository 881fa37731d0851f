//! YM-007: Filesystem state: target paths, phony markers, mtimes, touch.
//!
//! Phony targets keep their timestamps as marker files under `.yamk/` in
//! the cookbook directory. Marker names escape `.` as `.46` and `/` as
//! `.47` so nested or dotted target names stay flat and unambiguous.

use super::error::{Error, Result};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Directory holding phony timestamp markers.
pub const PHONY_DIR: &str = ".yamk";

/// Absolute, normalized path of a file target.
pub fn file_path(base_dir: &Path, target: &str) -> PathBuf {
    base_dir.join(target).components().collect()
}

/// Marker directory for a cookbook directory.
pub fn phony_dir(base_dir: &Path) -> PathBuf {
    base_dir.join(PHONY_DIR)
}

/// Escape a target name into a flat marker filename.
pub fn encode_target(target: &str) -> String {
    target.replace('.', ".46").replace('/', ".47")
}

/// Marker path of a phony target.
pub fn phony_path(base_dir: &Path, target: &str) -> PathBuf {
    phony_dir(base_dir).join(encode_target(target))
}

/// Modification time as seconds since the epoch.
pub fn mtime(path: &Path) -> Result<f64> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| Error::io(path, e))?;
    Ok(match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    })
}

/// Latest mtime of `path` and everything below it.
pub fn recursive_mtime(path: &Path) -> Result<f64> {
    let mut latest = mtime(path)?;
    for entry in walkdir::WalkDir::new(path).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_default();
            Error::io(path, e.into())
        })?;
        latest = latest.max(mtime(entry.path())?);
    }
    Ok(latest)
}

/// Create `path` if missing and set its mtime to now.
pub fn touch(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
    }
    filetime::set_file_mtime(path, FileTime::now()).map_err(|e| Error::io(path, e))
}

/// Touch the marker of a phony target, creating `.yamk/` on demand.
pub fn touch_phony(base_dir: &Path, target: &str) -> Result<()> {
    let dir = phony_dir(base_dir);
    std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
    touch(&phony_path(base_dir, target))
}
