//! # Launcher Parameters
//!
//! Read from `sim_vehicle.toml` in the autotest directory if present. Every
//! field is optional.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Name of the parameter file within the autotest directory.
pub const PARAMS_FILE: &str = "sim_vehicle.toml";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimExecParams {

    /// Minimum log level, `info`, `debug` or `trace`
    pub log_level: String,

    /// Directory, relative to the source root, in which sessions are created
    pub sessions_dir: String,

    /// Script opening a command in a new terminal window, relative to the
    /// autotest directory
    pub terminal_helper: String,

    /// The ground station executable
    pub gcs_command: String,

    /// The ground station executable when running under Cygwin
    pub gcs_windows_path: String,

    /// Local UDP ports the ground station forwards telemetry to
    pub gcs_out_ports: Vec<u16>,

    /// Output added when running inside a vagrant guest, reaching the host
    pub vagrant_out: String,

    /// MAVLink TCP port of instance 0
    pub master_base_port: u16,

    /// Simulator output port of instance 0
    pub sitl_base_port: u16,

    /// Port offset between consecutive instances
    pub port_stride: u16,

    /// Process names killed before and after a run
    pub kill_victims: Vec<String>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimExecParams {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            sessions_dir: "sessions".into(),
            terminal_helper: "run_in_terminal_window.sh".into(),
            gcs_command: "mavproxy.py".into(),
            gcs_windows_path: "/cygdrive/c/Program Files (x86)/MAVProxy/mavproxy.exe".into(),
            gcs_out_ports: vec![14550, 14551],
            vagrant_out: "10.0.2.2:14550".into(),
            master_base_port: 5760,
            sitl_base_port: 5501,
            port_stride: 10,
            kill_victims: [
                "JSBSim",
                "lt-JSBSim",
                "ArduPlane.elf",
                "ArduCopter.elf",
                "APMrover2.elf",
                "AntennaTracker.elf",
                "JSBSIm.exe",
                "MAVProxy.exe",
                "runsim.py",
                // waf binaries
                "arducopter-quad",
                "arducopter-coax",
                "arducopter-octa",
                "arducopter-tri",
                "arducopter-y6",
                "arducopter-firefly",
                "arducopter-heli",
                "arduplane",
                "ardurover",
                "antennatracker",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let params: SimExecParams = toml::from_str(
            "log_level = \"debug\"\ngcs_out_ports = [14560]\n"
        ).unwrap();

        assert_eq!(params.log_level, "debug");
        assert_eq!(params.gcs_out_ports, vec![14560]);
        assert_eq!(params.master_base_port, 5760);
        assert_eq!(params.kill_victims.len(), 19);
    }

    #[test]
    fn test_default_victims_cover_waf_binaries() {
        let victims = SimExecParams::default().kill_victims;

        for target in &["arducopter-quad", "arducopter-heli", "arduplane", "ardurover", "antennatracker"] {
            assert!(victims.iter().any(|v| v == target), "{} not killed", target);
        }
        assert!(victims.iter().any(|v| v == "ArduCopter.elf"));
    }
}
