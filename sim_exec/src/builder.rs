//! # Builder
//!
//! Drives `waf` or `make` to build a SITL binary, with a single clean and
//! rebuild if the first build fails.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cli::{BuildSystem, Opts};
use crate::frame::FrameOptions;
use crate::process::{ProcessError, Runner};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Location of waf within the source tree.
const WAF_LIGHT_REL_PATH: &str = "modules/waf/waf-light";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to configure waf")]
    ConfigureFailed,

    #[error("Build failed ({0})")]
    BuildFailed(String),

    #[error("Build of {0} interrupted")]
    Interrupted(String),

    #[error(transparent)]
    ProcessError(#[from] ProcessError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the target for `frame` with the build system chosen in `opts`.
///
/// waf builds run in the source root, make builds in the vehicle directory.
pub fn build(
    runner: &mut dyn Runner,
    root: &Path,
    vehicle_dir: &Path,
    opts: &Opts,
    frame: &FrameOptions
) -> Result<(), BuildError> {
    match opts.build_system {
        BuildSystem::Waf => build_waf(runner, root, opts, frame),
        BuildSystem::Make => build_make(runner, vehicle_dir, opts, frame),
    }
}

/// Configure and build with waf.
pub fn build_waf(
    runner: &mut dyn Runner,
    root: &Path,
    opts: &Opts,
    frame: &FrameOptions
) -> Result<(), BuildError> {
    info!("WAF build");

    let waf_light = root.join(WAF_LIGHT_REL_PATH).to_string_lossy().into_owned();

    let mut cmd_configure = args(&[&waf_light, "configure", "--board", "sitl"]);
    if opts.debug {
        cmd_configure.push("--debug".into());
    }

    if !runner.run_blocking("Configure waf", &cmd_configure, Some(root))?.success() {
        if runner.interrupted() {
            return Err(BuildError::Interrupted(frame.waf_target.clone()));
        }
        return Err(BuildError::ConfigureFailed);
    }

    let cmd_clean = args(&[&waf_light, "clean"]);
    if opts.clean {
        runner.run_blocking("Building clean", &cmd_clean, Some(root))?;
    }

    let mut cmd_build = args(&[&waf_light, "build", "--target", &frame.waf_target]);
    push_jobs(&mut cmd_build, opts.jobs);

    build_with_retry(
        runner,
        "Building",
        &cmd_build,
        ("Building clean", &cmd_clean),
        root,
        opts.rebuild_on_failure(),
        &frame.waf_target
    )
}

/// Build with make in the vehicle directory.
pub fn build_make(
    runner: &mut dyn Runner,
    vehicle_dir: &Path,
    opts: &Opts,
    frame: &FrameOptions
) -> Result<(), BuildError> {
    let cmd_clean = args(&["make", "clean"]);
    if opts.clean {
        runner.run_blocking("Building clean", &cmd_clean, Some(vehicle_dir))?;
    }

    let target = make_target(opts, frame);

    let mut cmd_build = args(&["make", &target]);
    push_jobs(&mut cmd_build, opts.jobs);

    build_with_retry(
        runner,
        &format!("Building {}", target),
        &cmd_build,
        ("Cleaning", &cmd_clean),
        vehicle_dir,
        opts.rebuild_on_failure(),
        &target
    )
}

/// The make target for the frame, with `-debug` appended for debug builds.
pub fn make_target(opts: &Opts, frame: &FrameOptions) -> String {
    match opts.debug {
        true => format!("{}-debug", frame.make_target),
        false => frame.make_target.clone(),
    }
}

/// Where the build leaves the vehicle binary.
pub fn vehicle_binary_path(
    root: &Path,
    vehicle_dir: &Path,
    vehicle: &str,
    opts: &Opts,
    frame: &FrameOptions
) -> PathBuf {
    match opts.build_system {
        BuildSystem::Waf => root
            .join(waf_build_dir(opts.debug))
            .join(&frame.waf_target),
        BuildSystem::Make => vehicle_dir.join(format!("{}.elf", vehicle)),
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn waf_build_dir(debug: bool) -> &'static str {
    match debug {
        true => "build/sitl-debug",
        false => "build/sitl",
    }
}

fn args(a: &[&str]) -> Vec<String> {
    a.iter().map(|s| s.to_string()).collect()
}

fn push_jobs(cmd: &mut Vec<String>, jobs: Option<u32>) {
    if let Some(j) = jobs {
        cmd.push("-j".into());
        cmd.push(j.to_string());
    }
}

fn build_with_retry(
    runner: &mut dyn Runner,
    what: &str,
    cmd_build: &[String],
    (clean_what, cmd_clean): (&str, &[String]),
    cwd: &Path,
    retry: bool,
    target: &str
) -> Result<(), BuildError> {
    if runner.run_blocking(what, cmd_build, Some(cwd))?.success() {
        return Ok(());
    }

    // The build shares our terminal, so Ctrl-C kills it too
    if runner.interrupted() {
        return Err(BuildError::Interrupted(target.to_string()));
    }

    if retry {
        info!("Build failed; cleaning and rebuilding");
        runner.run_blocking(clean_what, cmd_clean, Some(cwd))?;

        if runner.run_blocking(what, cmd_build, Some(cwd))?.success() {
            return Ok(());
        }
    }

    info!("Build failed");
    Err(BuildError::BuildFailed(target.to_string()))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::frame::options_for_frame;
    use crate::process::mock::RecordingRunner;

    fn opts(args: &[&str]) -> Opts {
        let mut argv = vec!["sim_vehicle"];
        argv.extend_from_slice(args);
        Opts::parse_from(argv).unwrap()
    }

    fn quad() -> FrameOptions {
        options_for_frame("quad", "ArduCopter", None).unwrap()
    }

    #[test]
    fn test_waf_build_commands() {
        let mut runner = RecordingRunner::default();
        let root = Path::new("/ap");

        build_waf(&mut runner, root, &opts(&["-D", "-c", "-j", "8"]), &quad()).unwrap();

        assert_eq!(
            runner.blocking_whats(),
            vec!["Configure waf", "Building clean", "Building"]
        );
        assert_eq!(
            runner.calls[0].argv,
            args(&["/ap/modules/waf/waf-light", "configure", "--board", "sitl", "--debug"])
        );
        assert_eq!(
            runner.calls[2].argv,
            args(&[
                "/ap/modules/waf/waf-light", "build", "--target", "bin/arducopter-quad",
                "-j", "8"
            ])
        );
        assert!(runner.calls.iter().all(|c| c.cwd.as_deref() == Some(root)));
    }

    #[test]
    fn test_waf_retry_after_failure() {
        let mut runner = RecordingRunner::with_exit_codes(&[0, 1, 0, 0]);

        build_waf(&mut runner, Path::new("/ap"), &opts(&[]), &quad()).unwrap();

        assert_eq!(
            runner.blocking_whats(),
            vec!["Configure waf", "Building", "Building clean", "Building"]
        );
    }

    #[test]
    fn test_waf_second_failure_is_fatal() {
        let mut runner = RecordingRunner::with_exit_codes(&[0, 1, 0, 1]);

        assert!(matches!(
            build_waf(&mut runner, Path::new("/ap"), &opts(&[]), &quad()),
            Err(BuildError::BuildFailed(t)) if t == "bin/arducopter-quad"
        ));
        assert_eq!(runner.calls.len(), 4);
    }

    #[test]
    fn test_waf_no_retry() {
        let mut runner = RecordingRunner::with_exit_codes(&[0, 2]);

        assert!(build_waf(
            &mut runner,
            Path::new("/ap"),
            &opts(&["--no-rebuild-on-failure"]),
            &quad()
        ).is_err());
        assert_eq!(runner.blocking_whats(), vec!["Configure waf", "Building"]);
    }

    #[test]
    fn test_interrupted_build_is_not_retried() {
        let mut runner = RecordingRunner::with_exit_codes(&[0, 130]);
        runner.interrupt_after = Some(2);

        assert!(matches!(
            build_waf(&mut runner, Path::new("/ap"), &opts(&[]), &quad()),
            Err(BuildError::Interrupted(t)) if t == "bin/arducopter-quad"
        ));
        assert_eq!(runner.blocking_whats(), vec!["Configure waf", "Building"]);

        let mut runner = RecordingRunner::with_exit_codes(&[130]);
        runner.interrupt_after = Some(1);
        assert!(matches!(
            build_waf(&mut runner, Path::new("/ap"), &opts(&[]), &quad()),
            Err(BuildError::Interrupted(_))
        ));
    }

    #[test]
    fn test_waf_configure_failure() {
        let mut runner = RecordingRunner::with_exit_codes(&[1]);

        assert!(matches!(
            build_waf(&mut runner, Path::new("/ap"), &opts(&[]), &quad()),
            Err(BuildError::ConfigureFailed)
        ));
        assert_eq!(runner.calls.len(), 1);
    }

    #[test]
    fn test_make_build_commands() {
        let mut runner = RecordingRunner::with_exit_codes(&[0, 1, 0, 0]);
        let vehicle_dir = Path::new("/ap/ArduCopter");
        let frame = options_for_frame("octa", "ArduCopter", None).unwrap();

        build(
            &mut runner,
            Path::new("/ap"),
            vehicle_dir,
            &opts(&["-s", "make", "-c", "-D"]),
            &frame
        ).unwrap();

        assert_eq!(
            runner.blocking_whats(),
            vec!["Building clean", "Building sitl-octa-debug", "Cleaning", "Building sitl-octa-debug"]
        );
        assert_eq!(runner.calls[1].argv, args(&["make", "sitl-octa-debug"]));
        assert!(runner.calls.iter().all(|c| c.cwd.as_deref() == Some(vehicle_dir)));
    }

    #[test]
    fn test_vehicle_binary_path() {
        let root = Path::new("/ap");
        let vehicle_dir = Path::new("/ap/ArduCopter");

        assert_eq!(
            vehicle_binary_path(root, vehicle_dir, "ArduCopter", &opts(&[]), &quad()),
            Path::new("/ap/build/sitl/bin/arducopter-quad")
        );
        assert_eq!(
            vehicle_binary_path(root, vehicle_dir, "ArduCopter", &opts(&["-D"]), &quad()),
            Path::new("/ap/build/sitl-debug/bin/arducopter-quad")
        );
        assert_eq!(
            vehicle_binary_path(root, vehicle_dir, "ArduCopter", &opts(&["-s", "make"]), &quad()),
            Path::new("/ap/ArduCopter/ArduCopter.elf")
        );
    }
}
