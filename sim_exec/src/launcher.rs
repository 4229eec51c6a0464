//! # Launcher
//!
//! Sequences a simulation session: build, start the simulator (and tracker)
//! in their own windows, then run the ground station until it exits.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::thread;
use thiserror::Error;

use crate::builder::{self, BuildError};
use crate::cleanup::Cleanup;
use crate::cli::{BuildSystem, Opts};
use crate::frame::{self, FrameError, FrameOptions};
use crate::gcs::{self, GcsEnv, Ports};
use crate::location::{self, LocationError};
use crate::params::SimExecParams;
use crate::process::{ProcessError, Runner};
use crate::vehicle::{self, TrackerLaunch, VehicleError, WindowLaunch};
use util::time;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Where and how the launcher runs.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    /// Root of the source tree
    pub root: PathBuf,

    /// The autotest directory within the source tree
    pub autotest_dir: PathBuf,

    /// Directory the launcher was started from
    pub cwd: PathBuf,

    pub params: SimExecParams,

    pub env: GcsEnv,
}

/// Everything that was resolved and started, saved with the session.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchRecord {
    pub vehicle: String,
    pub frame: String,
    pub frame_options: FrameOptions,
    pub build_system: BuildSystem,
    pub home: String,
    pub tracker: Option<TrackerLaunch>,
    pub simulator: WindowLaunch,
    pub gcs: Vec<String>,
    pub gcs_exit_code: Option<i32>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Cannot work out the vehicle type from {0:?}, select it with -v")]
    NoVehicle(PathBuf),

    #[error("vehicle directory ({0:?}) does not exist")]
    VehicleDirNotFound(PathBuf),

    #[error("Interrupted before the ground station started")]
    Interrupted,

    #[error(transparent)]
    FrameError(#[from] FrameError),

    #[error(transparent)]
    LocationError(#[from] LocationError),

    #[error(transparent)]
    BuildError(#[from] BuildError),

    #[error(transparent)]
    VehicleError(#[from] VehicleError),

    #[error(transparent)]
    ProcessError(#[from] ProcessError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// The vehicle to simulate: the one given, otherwise the name of the
/// directory the launcher runs in.
pub fn resolve_vehicle(vehicle: Option<&str>, cwd: &Path) -> Result<String, LaunchError> {
    let vehicle = match vehicle {
        Some(v) => v.to_string(),
        None => cwd
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| LaunchError::NoVehicle(cwd.to_path_buf()))?,
    };

    if !frame::is_known_vehicle(&vehicle) {
        warn!(
            "** Is ({}) really your vehicle type?  Try  -v VEHICLETYPE  if not, or be in \
            the e.g. ArduCopter subdirectory",
            vehicle
        );
    }

    Ok(vehicle)
}

/// Run a full simulation session, returning once the ground station exits.
pub fn run(
    runner: &mut dyn Runner,
    cleanup: &mut Cleanup,
    ctx: &LaunchContext,
    opts: &Opts
) -> Result<LaunchRecord, LaunchError> {
    let vehicle = resolve_vehicle(opts.vehicle.as_deref(), &ctx.cwd)?;
    let frame_name = frame::resolve_frame(opts.frame.as_deref(), &vehicle)?;
    let frame = frame::options_for_frame(&frame_name, &vehicle, opts.build_target.as_deref())?;

    if frame.model == "jsbsim" {
        vehicle::check_jsbsim_version(runner)?;
    }

    let vehicle_dir = ctx.root.join(&vehicle);
    if !vehicle_dir.is_dir() {
        return Err(LaunchError::VehicleDirNotFound(vehicle_dir));
    }

    if !opts.hil && opts.instance == 0 {
        cleanup.kill_now();
    }

    let tracker = match opts.tracker {
        true => Some(vehicle::start_tracker(
            runner,
            &ctx.root,
            &ctx.autotest_dir,
            opts,
            &Ports::from_params(&ctx.params)
        )?),
        false => None,
    };

    let home = location::resolve_start_location(
        &ctx.autotest_dir,
        &opts.location,
        opts.custom_location.as_deref()
    )?;

    let simulator = match opts.hil {
        true => vehicle::start_jsbsim(runner, &ctx.autotest_dir, &home, opts.speedup)?,
        false => {
            if !opts.no_rebuild {
                builder::build(runner, &ctx.root, &vehicle_dir, opts, &frame)?;
            }

            let binary = builder::vehicle_binary_path(
                &ctx.root, &vehicle_dir, &vehicle, opts, &frame
            );

            vehicle::start_vehicle(
                runner,
                cleanup,
                &vehicle,
                &binary,
                &ctx.autotest_dir,
                opts,
                &frame,
                &home
            )?
        }
    };

    if opts.delay_start > 0.0 {
        if let Some(delay) = time::seconds_to_duration(opts.delay_start) {
            info!("Sleeping for {} seconds", opts.delay_start);
            thread::sleep(delay);
        }
    }

    // Ctrl-C only belongs to the ground station once it is running
    if runner.interrupted() {
        return Err(LaunchError::Interrupted);
    }

    let gcs_cmd = gcs::gcs_command(
        opts,
        &frame,
        tracker.as_ref().map(|t| t.address.as_str()),
        &ctx.env,
        &ctx.params
    );
    let status = gcs::start_gcs(runner, &gcs_cmd)?;

    Ok(LaunchRecord {
        vehicle,
        frame: frame_name,
        frame_options: frame,
        build_system: opts.build_system,
        home,
        tracker,
        simulator,
        gcs: gcs_cmd,
        gcs_exit_code: status.code,
    })
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::process::mock::RecordingRunner;
    use std::fs;
    use tempfile::TempDir;

    const LOCATIONS: &str = "\
CMAC=-35.363261,149.165230,584,353
CMAC_PILOTSBOX=-35.362734,149.165300,585,0
";

    fn opts(args: &[&str]) -> Opts {
        let mut argv = vec!["sim_vehicle"];
        argv.extend_from_slice(args);
        Opts::parse_from(argv).unwrap()
    }

    /// A source tree with a built quad copter.
    fn source_tree() -> (TempDir, LaunchContext) {
        let root = tempfile::tempdir().unwrap();
        let autotest = root.path().join("Tools/autotest");
        fs::create_dir_all(&autotest).unwrap();
        fs::write(autotest.join(location::LOCATIONS_FILE), LOCATIONS).unwrap();
        fs::create_dir_all(root.path().join("ArduCopter")).unwrap();

        let bin_dir = root.path().join("build/sitl/bin");
        fs::create_dir_all(&bin_dir).unwrap();
        fs::write(bin_dir.join("arducopter-quad"), "").unwrap();

        let ctx = LaunchContext {
            root: root.path().to_path_buf(),
            autotest_dir: autotest,
            cwd: root.path().join("ArduCopter"),
            params: SimExecParams::default(),
            env: GcsEnv::default(),
        };

        (root, ctx)
    }

    #[test]
    fn test_resolve_vehicle() {
        assert_eq!(
            resolve_vehicle(None, Path::new("/ap/ArduPlane")).unwrap(),
            "ArduPlane"
        );
        assert_eq!(
            resolve_vehicle(Some("APMrover2"), Path::new("/ap/ArduPlane")).unwrap(),
            "APMrover2"
        );
        assert_eq!(
            resolve_vehicle(None, Path::new("/ap/somewhere")).unwrap(),
            "somewhere"
        );
        assert!(matches!(
            resolve_vehicle(None, Path::new("/")),
            Err(LaunchError::NoVehicle(_))
        ));
    }

    #[test]
    fn test_run_waf_session() {
        let (_root, ctx) = source_tree();
        let mut runner = RecordingRunner::default();
        let mut cleanup = Cleanup::files_only();

        let record = run(&mut runner, &mut cleanup, &ctx, &opts(&[])).unwrap();

        assert_eq!(record.vehicle, "ArduCopter");
        assert_eq!(record.frame, "quad");
        assert_eq!(record.home, "-35.363261,149.165230,584,353");
        assert_eq!(record.gcs_exit_code, Some(0));
        assert!(record.tracker.is_none());

        assert_eq!(
            runner.calls.iter().map(|c| c.what.as_str()).collect::<Vec<_>>(),
            vec!["Configure waf", "Building", "ArduCopter", "Run MavProxy"]
        );
        assert_eq!(
            runner.terminal_calls()[0].argv[0],
            ctx.root.join("build/sitl/bin/arducopter-quad").to_string_lossy()
        );
        assert_eq!(record.gcs[0], "mavproxy.py");
    }

    #[test]
    fn test_run_without_rebuild_custom_location() {
        let (_root, ctx) = source_tree();
        let mut runner = RecordingRunner::default();
        let mut cleanup = Cleanup::files_only();

        let record = run(
            &mut runner,
            &mut cleanup,
            &ctx,
            &opts(&["-N", "-l", "1,2,3,4", "-v", "ArduCopter", "-f", "+"])
        ).unwrap();

        assert_eq!(record.home, "1,2,3,4");
        assert_eq!(
            runner.calls.iter().map(|c| c.what.as_str()).collect::<Vec<_>>(),
            vec!["ArduCopter", "Run MavProxy"]
        );
    }

    #[test]
    fn test_run_hil() {
        let (_root, ctx) = source_tree();
        let mut runner = RecordingRunner::default();
        let mut cleanup = Cleanup::files_only();

        let record = run(&mut runner, &mut cleanup, &ctx, &opts(&["-H"])).unwrap();

        assert_eq!(record.simulator.name, "JSBSim");
        assert_eq!(
            runner.calls.iter().map(|c| c.what.as_str()).collect::<Vec<_>>(),
            vec!["JSBSim", "Run MavProxy"]
        );
        assert_eq!(record.gcs[1..3], ["--load-module".to_string(), "HIL".to_string()]);
    }

    #[test]
    fn test_run_failures() {
        let (_root, ctx) = source_tree();
        let mut cleanup = Cleanup::files_only();

        let mut runner = RecordingRunner::default();
        assert!(matches!(
            run(&mut runner, &mut cleanup, &ctx, &opts(&["-L", "NOWHERE"])),
            Err(LaunchError::LocationError(LocationError::NotFound(_)))
        ));

        let mut runner = RecordingRunner::default();
        assert!(matches!(
            run(&mut runner, &mut cleanup, &ctx, &opts(&["-v", "APMrover2"])),
            Err(LaunchError::VehicleDirNotFound(_))
        ));

        let mut runner = RecordingRunner::default();
        assert!(matches!(
            run(&mut runner, &mut cleanup, &ctx, &opts(&["-v", "ArduPlane"])),
            Err(LaunchError::VehicleError(VehicleError::WrongJsbSim))
        ));

        let mut runner = RecordingRunner::with_exit_codes(&[0, 1, 0, 1]);
        assert!(matches!(
            run(&mut runner, &mut cleanup, &ctx, &opts(&[])),
            Err(LaunchError::BuildError(BuildError::BuildFailed(_)))
        ));
        assert!(runner.terminal_calls().is_empty());

        let mut runner = RecordingRunner::default();
        assert!(matches!(
            run(&mut runner, &mut cleanup, &ctx, &opts(&["-N", "-D"])),
            Err(LaunchError::VehicleError(VehicleError::BinaryNotFound(_)))
        ));
    }

    #[test]
    fn test_run_interrupted() {
        let (_root, ctx) = source_tree();
        let mut cleanup = Cleanup::files_only();

        // During the build: no clean, no rebuild, nothing started
        let mut runner = RecordingRunner::with_exit_codes(&[0, 130]);
        runner.interrupt_after = Some(2);
        assert!(matches!(
            run(&mut runner, &mut cleanup, &ctx, &opts(&[])),
            Err(LaunchError::BuildError(BuildError::Interrupted(_)))
        ));
        assert_eq!(runner.blocking_whats(), vec!["Configure waf", "Building"]);
        assert!(runner.terminal_calls().is_empty());

        // After the vehicle started: the ground station is never run
        let mut runner = RecordingRunner::default();
        runner.interrupt_after = Some(0);
        assert!(matches!(
            run(&mut runner, &mut cleanup, &ctx, &opts(&["-N"])),
            Err(LaunchError::Interrupted)
        ));
        assert_eq!(
            runner.calls.iter().map(|c| c.what.as_str()).collect::<Vec<_>>(),
            vec!["ArduCopter"]
        );
    }
}
