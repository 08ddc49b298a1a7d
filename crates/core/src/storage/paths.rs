//! Trash-path translation.
//!
//! Pure path transforms with no filesystem access. A quarantined file keeps
//! its path suffix relative to the table location, so the transform is
//! invertible. Containment checks compare whole path segments via
//! [`Path::prefix_match`]; a data directory named `.trash-archive` is never
//! mistaken for the trash root itself.

use object_store::path::{Path, PathPart};

use crate::errors::{MaintenanceError, MaintenanceResult};

/// The trash root for a table: `<location>/<trash_dir>`.
pub fn trash_root(location: &Path, trash_dir: &str) -> Path {
    location
        .parts()
        .chain(std::iter::once(PathPart::from(trash_dir)))
        .collect()
}

/// Map a file path under the table location to its quarantine location,
/// `<location>/<trash_dir>/<relative_path>`.
///
/// Fails with [`MaintenanceError::InvalidPath`] when `file` does not lie
/// under `location` (or is the location itself).
pub fn to_trash_path(location: &Path, file: &Path, trash_dir: &str) -> MaintenanceResult<Path> {
    let remainder: Vec<PathPart<'_>> = file
        .prefix_match(location)
        .ok_or_else(|| invalid_path(file, location))?
        .collect();
    if remainder.is_empty() {
        return Err(invalid_path(file, location));
    }
    Ok(location
        .parts()
        .chain(std::iter::once(PathPart::from(trash_dir)))
        .chain(remainder)
        .collect())
}

/// Map a quarantined file back to its original location under the table.
///
/// Inverse of [`to_trash_path`]; fails with [`MaintenanceError::InvalidPath`]
/// when `staged` does not lie under the trash root.
pub fn from_trash_path(location: &Path, staged: &Path, trash_dir: &str) -> MaintenanceResult<Path> {
    let root = trash_root(location, trash_dir);
    let remainder: Vec<PathPart<'_>> = staged
        .prefix_match(&root)
        .ok_or_else(|| invalid_path(staged, &root))?
        .collect();
    if remainder.is_empty() {
        return Err(invalid_path(staged, &root));
    }
    Ok(location.parts().chain(remainder).collect())
}

/// Whether `file` lies under the given trash root.
pub fn is_staged(trash_root: &Path, file: &Path) -> bool {
    file.prefix_match(trash_root)
        .map(|mut remainder| remainder.next().is_some())
        .unwrap_or(false)
}

fn invalid_path(path: &Path, location: &Path) -> MaintenanceError {
    MaintenanceError::InvalidPath {
        path: path.to_string(),
        location: location.to_string(),
    }
}
