//! # Vehicle
//!
//! Commands which start the simulated vehicle, the antenna tracker and the
//! HIL flight dynamics model, each in its own terminal window.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::builder::{self, BuildError};
use crate::cleanup::Cleanup;
use crate::cli::Opts;
use crate::frame::{self, FrameError, FrameOptions};
use crate::gcs::Ports;
use crate::location::{self, LocationError};
use crate::process::{ProcessError, Runner};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The tracker always runs as this instance so it doesn't collide with the
/// vehicle.
pub const TRACKER_INSTANCE: u16 = 1;

const TRACKER_VEHICLE: &str = "AntennaTracker";
const TRACKER_FRAME: &str = "tracker";

/// Flight dynamics runner used for HIL, relative to the autotest directory.
const RUNSIM_REL_PATH: &str = "jsb_sim/runsim.py";

const JSBSIM_VERSION_MARKER: &str = "ArduPilot";

const JSBSIM_HELP: &str = "
=========================================================
You need the latest ArduPilot version of JSBSim installed
and in your $PATH

Please get it from git://github.com/tridge/jsbsim.git
See
 http://dev.ardupilot.org/wiki/simulation-2/sitl-simulator-software-in-the-loop/setting-up-sitl-on-linux/
for more details
=========================================================";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command to be run in its own terminal window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowLaunch {
    /// Title of the window
    pub name: String,

    pub argv: Vec<String>,

    /// Directory to run in, the launcher's own if `None`
    pub cwd: Option<PathBuf>,
}

/// A started antenna tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerLaunch {
    /// MAVLink address the ground station reaches the tracker on
    pub address: String,

    pub window: WindowLaunch,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum VehicleError {
    #[error("Vehicle binary ({0:?}) does not exist")]
    BinaryNotFound(PathBuf),

    #[error("Cannot write the gdb commands file: {0}")]
    GdbCommandsError(std::io::Error),

    #[error("JSBSim is not the ArduPilot version{help}", help = JSBSIM_HELP)]
    WrongJsbSim,

    #[error(transparent)]
    FrameError(#[from] FrameError),

    #[error(transparent)]
    LocationError(#[from] LocationError),

    #[error(transparent)]
    BuildError(#[from] BuildError),

    #[error(transparent)]
    ProcessError(#[from] ProcessError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the command which runs the vehicle binary, wrapped in valgrind, gdb
/// or strace as requested.
///
/// `gdb_commands` is the file of commands gdb runs on startup, needed if
/// gdb is used.
pub fn vehicle_command(
    vehicle: &str,
    binary: &Path,
    autotest_dir: &Path,
    opts: &Opts,
    frame: &FrameOptions,
    home: &str,
    gdb_commands: Option<&Path>
) -> WindowLaunch {
    let binary = binary.to_string_lossy().into_owned();
    let mut name = vehicle.to_string();
    let mut argv: Vec<String> = Vec::new();

    if opts.valgrind {
        name.push_str(" (valgrind)");
        argv.push("valgrind".into());
    }

    if opts.uses_gdb() {
        name.push_str(" (gdb)");
        argv.push("gdb".into());
        if let Some(path) = gdb_commands {
            argv.push("-x".into());
            argv.push(path.to_string_lossy().into_owned());
        }
        argv.push("--args".into());
    }

    if opts.strace {
        name.push_str(" (strace)");
        argv.extend(vec![
            "strace".to_string(),
            "-o".to_string(),
            format!("{}.strace", binary),
            "-s".to_string(),
            "8000".to_string(),
            "-ttt".to_string(),
        ]);
    }

    argv.push(binary);
    argv.push("-S".into());
    argv.push(format!("-I{}", opts.instance));
    argv.push("--home".into());
    argv.push(home.into());
    if opts.wipe_eeprom {
        argv.push("-w".into());
    }
    argv.push("--model".into());
    argv.push(frame.model.clone());
    argv.push("--speedup".into());
    argv.push(opts.speedup.to_string());

    if let Some(ref extra) = opts.sitl_instance_args {
        argv.extend(extra.split_whitespace().map(String::from));
    }

    if opts.mavlink_gimbal {
        argv.push("--gimbal".into());
    }

    if let Some(ref params) = frame.default_params {
        let path = autotest_dir.join(params);
        info!("Using defaults from ({})", path.display());
        argv.push("--defaults".into());
        argv.push(path.to_string_lossy().into_owned());
    }

    WindowLaunch { name, argv, cwd: None }
}

/// The commands gdb runs on startup: set every breakpoint, then run unless
/// the vehicle should start stopped.
pub fn gdb_commands(breakpoints: &[String], auto_run: bool) -> String {
    let mut cmds: String = breakpoints
        .iter()
        .map(|b| format!("b {}\n", b))
        .collect();

    if auto_run {
        cmds.push_str("r\n");
    }

    cmds
}

/// Check the vehicle binary exists then start it in a new window.
///
/// Any gdb commands file is handed to `cleanup` so it lives until exit.
#[allow(clippy::too_many_arguments)]
pub fn start_vehicle(
    runner: &mut dyn Runner,
    cleanup: &mut Cleanup,
    vehicle: &str,
    binary: &Path,
    autotest_dir: &Path,
    opts: &Opts,
    frame: &FrameOptions,
    home: &str
) -> Result<WindowLaunch, VehicleError> {
    if !binary.exists() {
        return Err(VehicleError::BinaryNotFound(binary.to_path_buf()));
    }

    let gdb_file = match opts.uses_gdb() {
        true => Some(write_gdb_commands(&opts.breakpoint, opts.gdb)?),
        false => None,
    };

    let launch = vehicle_command(
        vehicle,
        binary,
        autotest_dir,
        opts,
        frame,
        home,
        gdb_file.as_ref().map(|f| f.path())
    );

    if let Some(f) = gdb_file {
        cleanup.keep_until_exit(f);
    }

    runner.run_in_terminal(&launch.name, &launch.argv, launch.cwd.as_deref())?;

    Ok(launch)
}

/// The command which starts the antenna tracker from its vehicle directory.
pub fn tracker_command(binary: &Path, tracker_dir: &Path, home: &str) -> WindowLaunch {
    WindowLaunch {
        name: TRACKER_VEHICLE.into(),
        argv: vec![
            "nice".into(),
            binary.to_string_lossy().into_owned(),
            format!("-I{}", TRACKER_INSTANCE),
            format!("--model={}", TRACKER_FRAME),
            format!("--home={}", home),
        ],
        cwd: Some(tracker_dir.to_path_buf()),
    }
}

/// Build, unless disabled, and start the antenna tracker.
pub fn start_tracker(
    runner: &mut dyn Runner,
    root: &Path,
    autotest_dir: &Path,
    opts: &Opts,
    ports: &Ports
) -> Result<TrackerLaunch, VehicleError> {
    info!("Preparing antenna tracker");

    let home = location::find_location_by_name(autotest_dir, &opts.tracker_location)?;
    let tracker_dir = root.join(TRACKER_VEHICLE);
    // -b overrides the vehicle's target, never the tracker's
    let frame = frame::options_for_frame(TRACKER_FRAME, TRACKER_VEHICLE, None)?;

    if !opts.no_rebuild {
        builder::build(runner, root, &tracker_dir, opts, &frame)?;
    }

    let binary = builder::vehicle_binary_path(root, &tracker_dir, TRACKER_VEHICLE, opts, &frame);
    if !binary.exists() {
        return Err(VehicleError::BinaryNotFound(binary));
    }

    let window = tracker_command(&binary, &tracker_dir, &home);
    runner.run_in_terminal(&window.name, &window.argv, window.cwd.as_deref())?;

    Ok(TrackerLaunch {
        address: ports.master(TRACKER_INSTANCE),
        window,
    })
}

/// The HIL flight dynamics model command.
pub fn jsbsim_command(autotest_dir: &Path, home: &str, speedup: u32) -> WindowLaunch {
    WindowLaunch {
        name: "JSBSim".into(),
        argv: vec![
            autotest_dir.join(RUNSIM_REL_PATH).to_string_lossy().into_owned(),
            "--home".into(),
            home.into(),
            format!("--speedup={}", speedup),
        ],
        cwd: None,
    }
}

/// Start the HIL flight dynamics model in a new window.
pub fn start_jsbsim(
    runner: &mut dyn Runner,
    autotest_dir: &Path,
    home: &str,
    speedup: u32
) -> Result<WindowLaunch, VehicleError> {
    let launch = jsbsim_command(autotest_dir, home, speedup);
    runner.run_in_terminal(&launch.name, &launch.argv, launch.cwd.as_deref())?;
    Ok(launch)
}

/// Make sure the JSBSim on the path is the ArduPilot fork.
///
/// A JSBSim which can't be run counts as the wrong version.
pub fn check_jsbsim_version(runner: &mut dyn Runner) -> Result<(), VehicleError> {
    let cmd = vec!["JSBSim".to_string(), "--version".to_string()];

    let version = runner
        .capture_stdout("Get JSBSim version", &cmd)
        .unwrap_or_default();

    match version.contains(JSBSIM_VERSION_MARKER) {
        true => Ok(()),
        false => Err(VehicleError::WrongJsbSim),
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn write_gdb_commands(breakpoints: &[String], auto_run: bool) -> Result<NamedTempFile, VehicleError> {
    let mut file = NamedTempFile::new().map_err(VehicleError::GdbCommandsError)?;

    file.write_all(gdb_commands(breakpoints, auto_run).as_bytes())
        .and_then(|_| file.flush())
        .map_err(VehicleError::GdbCommandsError)?;

    Ok(file)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
