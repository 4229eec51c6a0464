//! Main SITL launcher executable entry point.
//!
//! # Architecture
//!
//! The execution consists of:
//!
//!     - Parse and validate the command line
//!     - Find the source tree, load parameters and start the session
//!     - Build the vehicle, start it (and the tracker) in terminal windows
//!     - Run the ground station until it exits
//!     - Kill stray simulator processes and remove temporary files

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use log::{debug, info, warn};
use std::env;
use std::sync::atomic::Ordering;

// Internal
use sim_lib::{
    cleanup::{self, Cleanup},
    cli::{CliError, Opts},
    gcs::GcsEnv,
    launcher::{self, LaunchContext},
    params::{SimExecParams, PARAMS_FILE},
    process::SystemRunner,
};
use util::{
    host,
    logger::{logger_init, parse_level},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const EXEC_NAME: &str = "sim_vehicle";

/// Session-relative file the launch plan is saved to.
const LAUNCH_RECORD_FILE: &str = "launch.json";

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- COMMAND LINE ----

    let opts = match Opts::parse_from(env::args_os()) {
        Ok(o) => o,
        // Help and usage errors are printed and exited on by clap itself
        Err(CliError::Clap(e)) => e.exit(),
        Err(e) => return Err(e.into()),
    };

    let warnings = opts.validate()?;

    // ---- EARLY INITIALISATION ----

    let root = host::find_sw_root().wrap_err("Failed to find the source tree")?;
    let autotest_dir = root.join(host::AUTOTEST_REL_PATH);

    let params: SimExecParams = util::params::load_or_default(&autotest_dir.join(PARAMS_FILE))
        .wrap_err("Could not load the launcher parameters")?;

    // Initialise session
    let session = Session::new(EXEC_NAME, &root.join(&params.sessions_dir))
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    let log_level = parse_level(&params.log_level)
        .ok_or_else(|| eyre!("Invalid log level in parameters: {}", params.log_level))?;
    logger_init(log_level, &session, "SIM_VEHICLE")
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("SITL Vehicle Launcher\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Source root: {:?}", root);
    info!("Session directory: {:?}\n", session.session_root);
    debug!("Options: {:#?}", opts);

    for w in warnings {
        warn!("{}", w);
    }

    // ---- LAUNCH ----

    let interrupted = cleanup::catch_interrupts()
        .wrap_err("Failed to set the interrupt handler")?;

    let mut cleanup = Cleanup::new(params.kill_victims.clone());
    // The flag stops the launch if set before the ground station runs
    let mut runner = SystemRunner::new(autotest_dir.join(&params.terminal_helper))
        .with_interrupt_flag(interrupted.clone());

    let ctx = LaunchContext {
        root,
        autotest_dir,
        cwd: env::current_dir().wrap_err("Cannot get the current directory")?,
        params,
        env: GcsEnv::detect(),
    };

    let record = launcher::run(&mut runner, &mut cleanup, &ctx, &opts)
        .wrap_err("Launch failed")?;

    if interrupted.load(Ordering::SeqCst) {
        info!("Interrupted");
    }

    session.save(LAUNCH_RECORD_FILE, record);

    // ---- SHUTDOWN ----

    drop(cleanup);
    session.exit();

    Ok(())
}
