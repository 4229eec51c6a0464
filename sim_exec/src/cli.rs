//! # Command line interface
//!
//! Options accepted by `sim_vehicle`, plus the compatibility mode of the old
//! shell launcher: with `-C` the first option not understood, and everything
//! after it, is handed to the ground station verbatim.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;
use structopt::clap::AppSettings;
use structopt::StructOpt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const EPILOG: &str = "\
eeprom.bin in the starting directory contains the parameters for your simulated vehicle. \
Always start from the same directory. It is recommended that you start in the main vehicle \
directory for the vehicle you are simulating, for example, start in the ArduPlane directory \
to simulate ArduPlane";

/// Short options which take no value.
const SHORT_FLAGS: &str = "hCHNDcVTGgMw";

/// Short options which take a value.
const SHORT_VALUES: &str = "vfjbsIAdBLlStm";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The build system used to compile the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    Make,
    Waf,
}

/// Errors raised while parsing or validating the command line.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Clap(#[from] structopt::clap::Error),

    #[error("no such option: {0}\nPerhaps you want --sim_vehicle_sh_compatible (-C)?")]
    UnknownOption(String),

    #[error("Unexpected argument ({0})")]
    UnexpectedArgument(String),

    #[error("--mavproxy-args not permitted in compat mode")]
    MavproxyArgsInCompat,

    #[error("May not use valgrind with hil")]
    ValgrindWithHil,

    #[error("May not use gdb with hil")]
    GdbWithHil,

    #[error("May not use strace with hil")]
    StraceWithHil,

    #[error("May not use valgrind with gdb")]
    ValgrindWithGdb,

    #[error("May not use strace with gdb")]
    StraceWithGdb,

    #[error("Invalid start delay ({0} s), expected a non-negative number of seconds")]
    InvalidDelay(f64),
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Start a simulated vehicle and connect it to MAVProxy.
#[derive(Debug, Clone, StructOpt)]
#[structopt(name = "sim_vehicle", after_help = EPILOG)]
#[structopt(setting = AppSettings::DisableVersion)]
#[structopt(setting = AppSettings::AllowLeadingHyphen)]
#[structopt(setting = AppSettings::TrailingVarArg)]
pub struct Opts {
    /// Vehicle type (ArduPlane, ArduCopter or APMrover2)
    #[structopt(short = "v", long)]
    pub vehicle: Option<String>,

    /// Set aircraft frame type. For copters can choose +, X, quad or octa, for
    /// planes can choose elevon or vtail
    #[structopt(short = "f", long)]
    pub frame: Option<String>,

    /// Be compatible with the way sim_vehicle.sh works; make this the first option
    #[structopt(short = "C", long = "sim_vehicle_sh_compatible")]
    pub sim_vehicle_sh_compatible: bool,

    /// Start HIL
    #[structopt(short = "H", long)]
    pub hil: bool,

    // ---- BUILD OPTIONS ----

    /// Don't rebuild before starting ardupilot
    #[structopt(short = "N", long)]
    pub no_rebuild: bool,

    /// Build with debugging
    #[structopt(short = "D", long)]
    pub debug: bool,

    /// Do a make clean before building
    #[structopt(short = "c", long)]
    pub clean: bool,

    /// Number of processors to use during build (default for waf: number of
    /// processors, for make: 1)
    #[structopt(short = "j", long)]
    pub jobs: Option<u32>,

    /// Override SITL build target
    #[structopt(short = "b", long)]
    pub build_target: Option<String>,

    /// Build system to use
    #[structopt(
        short = "s",
        long,
        default_value = "waf",
        possible_values = &["make", "waf"]
    )]
    pub build_system: BuildSystem,

    /// If build fails, do not clean and rebuild
    #[structopt(long)]
    pub no_rebuild_on_failure: bool,

    // ---- SIMULATION OPTIONS ----

    /// Instance of simulator
    #[structopt(short = "I", long, default_value = "0")]
    pub instance: u16,

    /// Enable valgrind for memory access checking (very slow!)
    #[structopt(short = "V", long)]
    pub valgrind: bool,

    /// Start an antenna tracker instance
    #[structopt(short = "T", long)]
    pub tracker: bool,

    /// Pass arguments to SITL instance
    #[structopt(short = "A", long)]
    pub sitl_instance_args: Option<String>,

    /// Use gdb for debugging ardupilot
    #[structopt(short = "G", long)]
    pub gdb: bool,

    /// Use gdb for debugging ardupilot (no auto-start)
    #[structopt(short = "g", long)]
    pub gdb_stopped: bool,

    /// Delays the start of mavproxy by the number of seconds
    #[structopt(short = "d", long, default_value = "0")]
    pub delay_start: f64,

    /// Add a breakpoint at given location in debugger
    #[structopt(short = "B", long, number_of_values = 1)]
    pub breakpoint: Vec<String>,

    /// Enable MAVLink gimbal
    #[structopt(short = "M", long)]
    pub mavlink_gimbal: bool,

    /// Select start location from Tools/autotest/locations.txt
    #[structopt(short = "L", long, default_value = "CMAC")]
    pub location: String,

    /// Set custom start location
    #[structopt(short = "l", long)]
    pub custom_location: Option<String>,

    /// Set simulation speedup (1 for wall clock time)
    #[structopt(short = "S", long, default_value = "1")]
    pub speedup: u32,

    /// Set antenna tracker start location
    #[structopt(short = "t", long, default_value = "CMAC_PILOTSBOX")]
    pub tracker_location: String,

    /// Wipe EEPROM and reload parameters
    #[structopt(short = "w", long)]
    pub wipe_eeprom: bool,

    /// Additional arguments to pass to mavproxy.py
    #[structopt(short = "m", long)]
    pub mavproxy_args: Option<String>,

    /// Strace the ArduPilot binary
    #[structopt(long)]
    pub strace: bool,

    // ---- COMPATIBILITY MAVPROXY OPTIONS ----

    /// Create an additional mavlink output
    #[structopt(long, number_of_values = 1)]
    pub out: Vec<String>,

    /// Load map module on startup
    #[structopt(long)]
    pub map: bool,

    /// Load console module on startup
    #[structopt(long)]
    pub console: bool,

    /// The first unrecognised option and everything after it (compat mode only)
    #[structopt(name = "MAVPROXY_ARGS", hidden = true)]
    pub passthrough: Vec<String>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Opts {
    /// Parse the command line, resolving compatibility mode.
    ///
    /// The first item of `args` is the program name.
    pub fn parse_from<I, T>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();

        // clap hands a short cluster holding any unknown letter to the
        // pass-through whole, so split it up and parse again. The pass-through
        // is always the tail of the arguments.
        let mut opts = loop {
            let opts = Self::from_iter_safe(args.iter().cloned())?;
            let start = args.len() - opts.passthrough.len();

            let split = match opts.passthrough.first() {
                Some(first) if start == 0 || args[start - 1] != "--" => split_short_cluster(first),
                _ => None,
            };

            match split {
                Some(split) => {
                    args.splice(start..start + 1, split.into_iter().map(OsString::from));
                }
                None => break opts,
            }
        };

        opts.resolve_compat()?;
        Ok(opts)
    }

    /// Check for option combinations which can't work together.
    ///
    /// On success returns warnings about combinations which are allowed but
    /// probably unwise.
    pub fn validate(&self) -> Result<Vec<String>, CliError> {
        let mut warnings = Vec::new();

        if self.hil {
            if self.valgrind {
                return Err(CliError::ValgrindWithHil);
            }
            if self.uses_gdb() {
                return Err(CliError::GdbWithHil);
            }
            if self.strace {
                return Err(CliError::StraceWithHil);
            }
        }

        if self.valgrind && self.uses_gdb() {
            return Err(CliError::ValgrindWithGdb);
        }

        if self.strace && self.uses_gdb() {
            return Err(CliError::StraceWithGdb);
        }

        if self.strace && self.valgrind {
            warnings.push("valgrind and strace almost certainly not a good idea".to_string());
        }

        if !self.delay_start.is_finite() || self.delay_start < 0.0 {
            return Err(CliError::InvalidDelay(self.delay_start));
        }

        Ok(warnings)
    }

    /// Whether the vehicle runs under gdb, auto-started or not.
    pub fn uses_gdb(&self) -> bool {
        self.gdb || self.gdb_stopped
    }

    /// Whether a failed build is retried after a clean.
    pub fn rebuild_on_failure(&self) -> bool {
        !self.no_rebuild_on_failure
    }

    fn resolve_compat(&mut self) -> Result<(), CliError> {
        if self.sim_vehicle_sh_compatible && self.jobs.is_none() {
            self.jobs = Some(1);
        }

        let first = match self.passthrough.first() {
            Some(a) => a.clone(),
            None => return Ok(()),
        };

        if !self.sim_vehicle_sh_compatible {
            return Err(match first.starts_with('-') {
                true => CliError::UnknownOption(first),
                false => CliError::UnexpectedArgument(first),
            });
        }

        if self.mavproxy_args.is_some() {
            return Err(CliError::MavproxyArgsInCompat);
        }

        self.mavproxy_args = Some(self.passthrough.join(" "));

        Ok(())
    }
}

impl FromStr for BuildSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "make" => Ok(BuildSystem::Make),
            "waf" => Ok(BuildSystem::Waf),
            other => Err(format!("Unknown build system {}", other)),
        }
    }
}

impl fmt::Display for BuildSystem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BuildSystem::Make => write!(f, "make"),
            BuildSystem::Waf => write!(f, "waf"),
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Split a cluster of short options (`-Nq`, `-Dj4`) into separate arguments.
///
/// Known letters become options of their own. A letter taking a value takes
/// the rest of the cluster as that value. The first unknown letter starts a
/// single argument holding the rest of the cluster. Returns `None` if there
/// is nothing to split.
fn split_short_cluster(arg: &str) -> Option<Vec<String>> {
    let letters = match arg.strip_prefix('-') {
        Some(l) if !l.starts_with('-') && l.chars().count() > 1 => l,
        _ => return None,
    };

    let mut split = Vec::new();

    for (i, c) in letters.char_indices() {
        let rest = &letters[i + c.len_utf8()..];

        if SHORT_FLAGS.contains(c) {
            split.push(format!("-{}", c));
        }
        else if SHORT_VALUES.contains(c) {
            split.push(format!("-{}", c));
            if !rest.is_empty() {
                split.push(rest.to_string());
            }
            break;
        }
        else {
            // Nothing known at the front, leave it alone
            if i == 0 {
                return None;
            }
            split.push(format!("-{}", &letters[i..]));
            break;
        }
    }

    Some(split)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Result<Opts, CliError> {
        Opts::parse_from(std::iter::once("sim_vehicle").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let opts = parse(&[]).unwrap();

        assert_eq!(opts.vehicle, None);
        assert_eq!(opts.frame, None);
        assert_eq!(opts.build_system, BuildSystem::Waf);
        assert_eq!(opts.jobs, None);
        assert_eq!(opts.instance, 0);
        assert_eq!(opts.speedup, 1);
        assert_eq!(opts.delay_start, 0.0);
        assert_eq!(opts.location, "CMAC");
        assert_eq!(opts.tracker_location, "CMAC_PILOTSBOX");
        assert!(opts.rebuild_on_failure());
        assert!(opts.breakpoint.is_empty());
        assert!(opts.out.is_empty());
        assert_eq!(opts.mavproxy_args, None);
    }

    #[test]
    fn test_parse_options() {
        let opts = parse(&[
            "-v", "ArduPlane", "-f", "quadplane", "-s", "make", "-j", "4",
            "-I", "2", "-S", "10", "-B", "main", "-B", "setup",
            "--out", "udp:10.0.0.1:14550", "--map", "--console",
            "--no-rebuild-on-failure", "-d", "2.5", "-l", "1,2,3,4",
        ]).unwrap();

        assert_eq!(opts.vehicle.as_deref(), Some("ArduPlane"));
        assert_eq!(opts.frame.as_deref(), Some("quadplane"));
        assert_eq!(opts.build_system, BuildSystem::Make);
        assert_eq!(opts.jobs, Some(4));
        assert_eq!(opts.instance, 2);
        assert_eq!(opts.speedup, 10);
        assert_eq!(opts.breakpoint, vec!["main", "setup"]);
        assert_eq!(opts.out, vec!["udp:10.0.0.1:14550"]);
        assert!(opts.map && opts.console);
        assert!(!opts.rebuild_on_failure());
        assert_eq!(opts.delay_start, 2.5);
        assert_eq!(opts.custom_location.as_deref(), Some("1,2,3,4"));
    }

    #[test]
    fn test_invalid_build_system() {
        assert!(matches!(parse(&["-s", "ninja"]), Err(CliError::Clap(_))));
    }

    #[test]
    fn test_unknown_option_without_compat() {
        match parse(&["-v", "ArduCopter", "--aircraft", "test"]) {
            Err(CliError::UnknownOption(o)) => assert_eq!(o, "--aircraft"),
            other => panic!("Expected UnknownOption, got {:?}", other),
        }

        let msg = parse(&["--aircraft"]).unwrap_err().to_string();
        assert!(msg.contains("Perhaps you want --sim_vehicle_sh_compatible (-C)?"));
    }

    #[test]
    fn test_unexpected_positional_argument() {
        assert!(matches!(
            parse(&["ArduCopter"]),
            Err(CliError::UnexpectedArgument(a)) if a == "ArduCopter"
        ));
    }

    #[test]
    fn test_compat_passthrough() {
        let opts = parse(&[
            "-C", "-v", "ArduCopter", "--aircraft", "test", "--map", "-N",
        ]).unwrap();

        assert!(opts.sim_vehicle_sh_compatible);
        assert_eq!(opts.vehicle.as_deref(), Some("ArduCopter"));
        // Everything from the first unknown option is passed through, even
        // options we'd otherwise understand
        assert_eq!(opts.mavproxy_args.as_deref(), Some("--aircraft test --map -N"));
        assert!(!opts.map);
        assert!(!opts.no_rebuild);
    }

    #[test]
    fn test_compat_short_unknown_option() {
        let opts = parse(&["-C", "-N", "-q"]).unwrap();
        assert!(opts.no_rebuild);
        assert_eq!(opts.mavproxy_args.as_deref(), Some("-q"));
    }

    #[test]
    fn test_split_short_cluster() {
        let split = |a: &[&str]| Some(a.iter().map(|s| s.to_string()).collect::<Vec<_>>());

        assert_eq!(split_short_cluster("-Nq"), split(&["-N", "-q"]));
        assert_eq!(split_short_cluster("-Dj4"), split(&["-D", "-j", "4"]));
        assert_eq!(split_short_cluster("-NDc"), split(&["-N", "-D", "-c"]));
        assert_eq!(split_short_cluster("-Nqx"), split(&["-N", "-qx"]));
        assert_eq!(split_short_cluster("-q"), None);
        assert_eq!(split_short_cluster("-qN"), None);
        assert_eq!(split_short_cluster("-35.3,149.1"), None);
        assert_eq!(split_short_cluster("--aircraft"), None);
        assert_eq!(split_short_cluster("map"), None);
    }

    #[test]
    fn test_short_clusters() {
        let opts = parse(&["-Nj4", "-Dc"]).unwrap();
        assert!(opts.no_rebuild && opts.debug && opts.clean);
        assert_eq!(opts.jobs, Some(4));

        // Known letters are applied, only the unknown one is passed through
        let opts = parse(&["-C", "-Nq", "--map"]).unwrap();
        assert!(opts.no_rebuild);
        assert!(!opts.map);
        assert_eq!(opts.mavproxy_args.as_deref(), Some("-q --map"));

        match parse(&["-Nq"]) {
            Err(CliError::UnknownOption(o)) => assert_eq!(o, "-q"),
            other => panic!("Expected UnknownOption, got {:?}", other),
        }

        // Values are never split
        let opts = parse(&["-l", "-35.36,149.16,584,353", "-A", "-Nq"]).unwrap();
        assert_eq!(opts.custom_location.as_deref(), Some("-35.36,149.16,584,353"));
        assert_eq!(opts.sitl_instance_args.as_deref(), Some("-Nq"));
    }

    #[test]
    fn test_short_option_tables() {
        // Every letter the splitter knows is a real option
        for c in SHORT_FLAGS.chars().filter(|c| *c != 'h') {
            let flag = format!("-{}", c);
            let opts = parse(&[flag.as_str()]).unwrap();
            assert!(opts.passthrough.is_empty(), "{} not a flag", flag);
        }

        for c in SHORT_VALUES.chars() {
            let opt = format!("-{}", c);
            let value = if c == 's' { "make" } else { "1" };
            let opts = parse(&[opt.as_str(), value]).unwrap();
            assert!(opts.passthrough.is_empty(), "{} takes no value", opt);
        }
    }

    #[test]
    fn test_compat_must_come_first() {
        assert!(matches!(
            parse(&["--aircraft", "test", "-C"]),
            Err(CliError::UnknownOption(_))
        ));
    }

    #[test]
    fn test_compat_rejects_mavproxy_args() {
        assert!(matches!(
            parse(&["-C", "-m", "map", "--aircraft", "test"]),
            Err(CliError::MavproxyArgsInCompat)
        ));

        // Without anything to pass through -m is fine
        let opts = parse(&["-C", "-m", "--aircraft test"]).unwrap();
        assert_eq!(opts.mavproxy_args.as_deref(), Some("--aircraft test"));
    }

    #[test]
    fn test_compat_defaults_jobs_to_one() {
        assert_eq!(parse(&["-C"]).unwrap().jobs, Some(1));
        assert_eq!(parse(&["-C", "-j", "8"]).unwrap().jobs, Some(8));
        assert_eq!(parse(&["-j", "8"]).unwrap().jobs, Some(8));
    }

    #[test]
    fn test_validate_hil_conflicts() {
        assert!(matches!(
            parse(&["-H", "-V"]).unwrap().validate(),
            Err(CliError::ValgrindWithHil)
        ));
        assert!(matches!(
            parse(&["-H", "-G"]).unwrap().validate(),
            Err(CliError::GdbWithHil)
        ));
        assert!(matches!(
            parse(&["-H", "-g"]).unwrap().validate(),
            Err(CliError::GdbWithHil)
        ));
        assert!(matches!(
            parse(&["-H", "--strace"]).unwrap().validate(),
            Err(CliError::StraceWithHil)
        ));
        // Valgrind is reported first
        assert!(matches!(
            parse(&["-H", "-V", "-G", "--strace"]).unwrap().validate(),
            Err(CliError::ValgrindWithHil)
        ));
    }

    #[test]
    fn test_validate_debugger_conflicts() {
        assert!(matches!(
            parse(&["-V", "-g"]).unwrap().validate(),
            Err(CliError::ValgrindWithGdb)
        ));
        assert!(matches!(
            parse(&["--strace", "-G"]).unwrap().validate(),
            Err(CliError::StraceWithGdb)
        ));
    }

    #[test]
    fn test_validate_warnings() {
        let warnings = parse(&["-V", "--strace"]).unwrap().validate().unwrap();
        assert_eq!(warnings, vec!["valgrind and strace almost certainly not a good idea"]);

        assert!(parse(&["-H"]).unwrap().validate().unwrap().is_empty());
        assert!(parse(&["-G", "-B", "main"]).unwrap().validate().unwrap().is_empty());
    }

    #[test]
    fn test_validate_delay() {
        assert!(matches!(
            parse(&["-d", "-1"]).unwrap().validate(),
            Err(CliError::InvalidDelay(_))
        ));
        assert!(parse(&["-d", "0.5"]).unwrap().validate().is_ok());
    }
}
