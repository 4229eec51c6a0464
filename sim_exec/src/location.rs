//! # Start locations
//!
//! Named start locations live in `locations.txt` in the autotest directory,
//! one `NAME=lat,lon,alt,heading` per line.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Name of the locations file within the autotest directory.
pub const LOCATIONS_FILE: &str = "locations.txt";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Cannot read the locations file {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Failed to find location ({0})")]
    NotFound(String),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Search `locations.txt` in the autotest directory for the named location,
/// returning its `lat,lon,alt,heading` string.
pub fn find_location_by_name(autotest_dir: &Path, name: &str) -> Result<String, LocationError> {
    let path = autotest_dir.join(LOCATIONS_FILE);

    let contents = fs::read_to_string(&path)
        .map_err(|e| LocationError::FileLoadError(path, e))?;

    find_in_str(&contents, name)
}

/// The simulation start location: the custom location verbatim if given,
/// otherwise the named one.
pub fn resolve_start_location(
    autotest_dir: &Path,
    named: &str,
    custom: Option<&str>
) -> Result<String, LocationError> {
    match custom {
        Some(loc) => {
            info!("Starting up at {}", loc);
            Ok(loc.to_string())
        }
        None => {
            let loc = find_location_by_name(autotest_dir, named)?;
            info!("Starting up at {} ({})", loc, named);
            Ok(loc)
        }
    }
}

/// Search the contents of a locations file for the named location.
///
/// Blank lines and lines starting with `#` are ignored, as are lines with no
/// `=`. Only the first `=` separates the name from the location.
pub fn find_in_str(contents: &str, name: &str) -> Result<String, LocationError> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut split = line.splitn(2, '=');
            match (split.next(), split.next()) {
                (Some(n), Some(loc)) => Some((n.trim(), loc.trim())),
                _ => None
            }
        })
        .find(|(n, _)| *n == name)
        .map(|(_, loc)| loc.to_string())
        .ok_or_else(|| LocationError::NotFound(name.to_string()))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
