//! Host platform (linux for example) utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uname;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable pointing at the root of the autopilot source tree.
pub const SW_ROOT_ENV_VAR: &str = "ARDUPILOT_ROOT";

/// Path of the autotest directory relative to the source root.
pub const AUTOTEST_REL_PATH: &str = "Tools/autotest";

/// Environment variables consulted (in order) for the login name.
const USER_ENV_VARS: [&str; 4] = ["LOGNAME", "USER", "LNAME", "USERNAME"];

/// Presence of this binary indicates we're running under Cygwin.
pub const CYGSTART_PATH: &str = "/usr/bin/cygstart";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum HostError {
    #[error(
        "Could not find the source root: set {env} or run from inside the source tree \
        (looked upwards from {0:?})", env = SW_ROOT_ENV_VAR
    )]
    SwRootNotFound(PathBuf),

    #[error(
        "The source root given by {env} ({0:?}) has no {autotest} directory",
        env = SW_ROOT_ENV_VAR, autotest = AUTOTEST_REL_PATH
    )]
    InvalidSwRoot(PathBuf),

    #[error("Cannot get the current directory: {0}")]
    CurrentDirError(std::io::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<uname::Info> {
    uname::uname()
}

/// Find the root of the source tree.
///
/// The `ARDUPILOT_ROOT` environment variable is used if set, otherwise the
/// current directory and its ancestors are searched for one containing
/// `Tools/autotest`.
pub fn find_sw_root() -> Result<PathBuf, HostError> {
    let cwd = env::current_dir().map_err(HostError::CurrentDirError)?;
    find_sw_root_from(env::var_os(SW_ROOT_ENV_VAR), &cwd)
}

/// As [`find_sw_root`] but with the environment value and start directory
/// given explicitly.
pub fn find_sw_root_from(
    env_root: Option<OsString>,
    start_dir: &Path
) -> Result<PathBuf, HostError> {
    if let Some(root) = env_root.filter(|r| !r.is_empty()) {
        let root = PathBuf::from(root);
        return match root.join(AUTOTEST_REL_PATH).is_dir() {
            true => Ok(root),
            false => Err(HostError::InvalidSwRoot(root))
        };
    }

    start_dir
        .ancestors()
        .find(|dir| dir.join(AUTOTEST_REL_PATH).is_dir())
        .map(Path::to_path_buf)
        .ok_or_else(|| HostError::SwRootNotFound(start_dir.to_path_buf()))
}

/// Get the login name of the current user, if any can be determined.
pub fn current_user() -> Option<String> {
    USER_ENV_VARS
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|name| !name.is_empty())
}

/// Whether we're running under Cygwin.
pub fn under_cygwin() -> bool {
    Path::new(CYGSTART_PATH).exists()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
