//! # Ground station
//!
//! Builds and runs the MAVProxy command attached to the simulated vehicle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use serde::Serialize;

use crate::cli::Opts;
use crate::frame::FrameOptions;
use crate::params::SimExecParams;
use crate::process::{ProcessError, RunStatus, Runner};
use util::host;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const LOCALHOST: &str = "127.0.0.1";

/// User name of the default account in a vagrant guest.
const VAGRANT_USER: &str = "vagrant";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Port layout of the simulator instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ports {
    pub master_base: u16,
    pub sitl_base: u16,
    pub stride: u16,
}

/// Facts about the host which change the ground station command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcsEnv {
    /// Name of the user running the launcher
    pub user: Option<String>,

    /// Whether the launcher runs under Cygwin
    pub cygwin: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Ports {
    fn default() -> Self {
        Self {
            master_base: 5760,
            sitl_base: 5501,
            stride: 10,
        }
    }
}

impl Ports {
    pub fn from_params(params: &SimExecParams) -> Self {
        Self {
            master_base: params.master_base_port,
            sitl_base: params.sitl_base_port,
            stride: params.port_stride,
        }
    }

    /// MAVLink TCP address of the given instance.
    pub fn master(&self, instance: u16) -> String {
        format!("tcp:{}:{}", LOCALHOST, self.port(self.master_base, instance))
    }

    /// Address the given instance sends simulator state to.
    pub fn sitl_out(&self, instance: u16) -> String {
        format!("{}:{}", LOCALHOST, self.port(self.sitl_base, instance))
    }

    fn port(&self, base: u16, instance: u16) -> u32 {
        base as u32 + self.stride as u32 * instance as u32
    }
}

impl GcsEnv {
    /// Inspect the current host.
    pub fn detect() -> Self {
        Self {
            user: host::current_user(),
            cygwin: host::under_cygwin(),
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the ground station command.
///
/// `tracker_address` is the tracker's MAVLink address if one was started.
pub fn gcs_command(
    opts: &Opts,
    frame: &FrameOptions,
    tracker_address: Option<&str>,
    env: &GcsEnv,
    params: &SimExecParams
) -> Vec<String> {
    let ports = Ports::from_params(params);
    let mut cmd: Vec<String> = Vec::new();
    let mut extra_cmd = String::new();

    if env.cygwin {
        cmd.push(host::CYGSTART_PATH.into());
        cmd.push("-w".into());
        cmd.push(params.gcs_windows_path.clone());
    }
    else {
        cmd.push(params.gcs_command.clone());
    }

    if opts.hil {
        push_pair(&mut cmd, "--load-module", "HIL");
    }
    else {
        push_pair(&mut cmd, "--master", &ports.master(opts.instance));
        push_pair(&mut cmd, "--sitl", &ports.sitl_out(opts.instance));
    }

    // Forward to the host OS when running in a vagrant guest
    if env.user.as_deref() == Some(VAGRANT_USER) {
        push_pair(&mut cmd, "--out", &params.vagrant_out);
    }

    for port in &params.gcs_out_ports {
        push_pair(&mut cmd, "--out", &format!("{}:{}", LOCALHOST, port));
    }

    if opts.tracker {
        push_pair(&mut cmd, "--load-module", "tracker");
        if let Some(addr) = tracker_address {
            extra_cmd.push_str(&format!(
                "module load map; tracker set port {}; tracker start; tracker arm;",
                addr
            ));
        }
    }

    if opts.mavlink_gimbal {
        push_pair(&mut cmd, "--load-module", "gimbal");
    }

    if let Some(ref extra) = frame.extra_gcs_cmds {
        extra_cmd.push(' ');
        extra_cmd.push_str(extra);
    }

    if let Some(ref args) = opts.mavproxy_args {
        cmd.extend(args.split_whitespace().map(String::from));
    }

    for out in &opts.out {
        push_pair(&mut cmd, "--out", out);
    }
    if opts.map {
        cmd.push("--map".into());
    }
    if opts.console {
        cmd.push("--console".into());
    }

    if !extra_cmd.is_empty() {
        push_pair(&mut cmd, "--cmd", &extra_cmd);
    }

    cmd
}

/// Run the ground station until it exits.
pub fn start_gcs(runner: &mut dyn Runner, cmd: &[String]) -> Result<RunStatus, ProcessError> {
    let status = runner.run_blocking("Run MavProxy", cmd, None)?;
    info!("MAVProxy exited");
    Ok(status)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn push_pair(cmd: &mut Vec<String>, flag: &str, value: &str) {
    cmd.push(flag.into());
    cmd.push(value.into());
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
