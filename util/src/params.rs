//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot load the parameter file {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Cannot read the parameter file {0:?}: {1}")]
    DeserialiseError(PathBuf, toml::de::Error)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
pub fn load<P>(param_file_path: &Path) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    // Load the file into a string
    let params_str = match read_to_string(param_file_path) {
        Ok(s) => s,
        Err(e) => return Err(LoadError::FileLoadError(param_file_path.into(), e))
    };

    parse(param_file_path, &params_str)
}

/// Load a parameter file, falling back on the default parameters if the file
/// doesn't exist.
///
/// Any other error (permissions, invalid TOML) is still returned.
pub fn load_or_default<P>(param_file_path: &Path) -> Result<P, LoadError>
where
    P: DeserializeOwned + Default
{
    match read_to_string(param_file_path) {
        Ok(s) => parse(param_file_path, &s),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(
                "No parameter file at {:?}, using default parameters",
                param_file_path
            );
            Ok(P::default())
        },
        Err(e) => Err(LoadError::FileLoadError(param_file_path.into(), e))
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn parse<P>(path: &Path, params_str: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    // Parse the string into the parameter struct
    toml::from_str(params_str)
        .map_err(|e| LoadError::DeserialiseError(path.into(), e))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
