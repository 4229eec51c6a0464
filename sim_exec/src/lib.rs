//! # SITL launcher library.
//!
//! Everything the `sim_vehicle` executable does, split out so it can be tested without starting
//! real builds or simulators.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Builder - runs waf or make, retrying once after a clean
pub mod builder;

/// Cleanup - temporary files and stray processes removed on exit
pub mod cleanup;

/// Command line interface - options, compatibility mode and validation
pub mod cli;

/// Frame table - build targets, model and defaults for each frame
pub mod frame;

/// Ground station - the MAVProxy command line
pub mod gcs;

/// Launcher - sequences a whole simulation session
pub mod launcher;

/// Start locations
pub mod location;

/// Launcher parameters
pub mod params;

/// Process - running external commands
pub mod process;

/// Vehicle - simulator, tracker and HIL commands
pub mod vehicle;
