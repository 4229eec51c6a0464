//! # Frame table
//!
//! Maps vehicle and frame names onto the build targets, simulator model and
//! default parameter file used to launch them.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Make target used when a frame doesn't name one.
pub const DEFAULT_MAKE_TARGET: &str = "sitl";

/// Suffix which selects the helicopter entry for otherwise unknown frames.
const HELI_SUFFIX: &str = "-heli";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One row of the frame table. `None` fields take the defaults described on
/// [`options_for_frame`].
struct FrameEntry {
    name: &'static str,
    model: Option<&'static str>,
    make_target: Option<&'static str>,
    waf_target: Option<&'static str>,
    default_params: Option<&'static str>,
    extra_gcs_cmds: Option<&'static str>,
}

/// Fully resolved build and runtime options for a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameOptions {
    /// Simulator model passed to the vehicle binary (`--model`)
    pub model: String,

    /// Target given to `make`
    pub make_target: String,

    /// Target given to `waf`, also the binary path under the build directory
    pub waf_target: String,

    /// Default parameter file, relative to the autotest directory
    pub default_params: Option<String>,

    /// Commands run by the ground station on startup
    pub extra_gcs_cmds: Option<String>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FrameError {
    #[error(
        "No default frame for vehicle ({0}), choose one with -f/--frame or \
        select the vehicle with -v"
    )]
    NoDefaultFrame(String),

    #[error(
        "No default waf target for vehicle ({0}) and frame ({1}), choose one \
        with -b/--build-target"
    )]
    NoDefaultWafTarget(String, String),
}

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

/// Default frame for each known vehicle.
static DEFAULT_FRAMES: [(&str, &str); 4] = [
    ("APMrover2", "rover"),
    ("ArduPlane", "jsbsim"),
    ("ArduCopter", "quad"),
    ("AntennaTracker", "tracker"),
];

/// Default waf target for each known vehicle.
static DEFAULT_WAF_TARGETS: [(&str, &str); 4] = [
    ("ArduPlane", "bin/arduplane"),
    ("ArduCopter", "bin/arducopter-quad"),
    ("APMrover2", "bin/ardurover"),
    ("AntennaTracker", "bin/antennatracker"),
];

/// Prefixes tried, in order, when a frame has no exact entry.
static FRAME_PREFIXES: [&str; 11] = [
    "octa",
    "tri",
    "y6",
    "firefly",
    "heli",
    "last_letter",
    "jsbsim",
    "quadplane",
    "plane-elevon",
    "plane-vtail",
    "plane",
];

const COPTER_PARAMS: &str = "copter_params.parm";

static FRAME_TABLE: [FrameEntry; 21] = [
    FrameEntry {
        name: "+",
        model: None,
        make_target: None,
        waf_target: Some("bin/arducopter-quad"),
        default_params: Some(COPTER_PARAMS),
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "quad",
        model: Some("+"),
        make_target: None,
        waf_target: Some("bin/arducopter-quad"),
        default_params: Some(COPTER_PARAMS),
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "X",
        model: None,
        make_target: None,
        waf_target: Some("bin/arducopter-quad"),
        default_params: Some(COPTER_PARAMS),
        // The ground station only sets parameters it has already fetched
        extra_gcs_cmds: Some("param fetch frame; param set FRAME 1;"),
    },
    FrameEntry {
        name: "heli-dual",
        model: None,
        make_target: Some("sitl-heli-dual"),
        waf_target: Some("bin/arducopter-coax"),
        default_params: None,
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "heli-compound",
        model: None,
        make_target: Some("sitl-heli-compound"),
        waf_target: Some("bin/arducopter-coax"),
        default_params: None,
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "IrisRos",
        model: None,
        make_target: None,
        waf_target: Some("bin/arducopter-quad"),
        default_params: Some(COPTER_PARAMS),
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "Gazebo",
        model: None,
        make_target: None,
        waf_target: Some("bin/arducopter-quad"),
        default_params: Some(COPTER_PARAMS),
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "octa",
        model: None,
        make_target: Some("sitl-octa"),
        waf_target: Some("bin/arducopter-octa"),
        default_params: Some(COPTER_PARAMS),
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "tri",
        model: None,
        make_target: Some("sitl-tri"),
        waf_target: Some("bin/arducopter-tri"),
        default_params: Some("tri_params.parm"),
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "y6",
        model: None,
        make_target: Some("sitl-y6"),
        waf_target: Some("bin/arducopter-y6"),
        default_params: Some("y6_params.parm"),
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "firefly",
        model: None,
        make_target: None,
        waf_target: Some("bin/arducopter-firefly"),
        default_params: Some("firefly.parm"),
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "heli",
        model: None,
        make_target: Some("sitl-heli"),
        waf_target: Some("bin/arducopter-heli"),
        default_params: Some("Helicopter.parm"),
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "last_letter",
        model: None,
        make_target: None,
        waf_target: Some("bin/arduplane"),
        default_params: None,
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "CRRCSim",
        model: None,
        make_target: None,
        waf_target: Some("bin/arduplane"),
        default_params: None,
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "jsbsim",
        model: None,
        make_target: None,
        waf_target: Some("bin/arduplane"),
        default_params: Some("ArduPlane.parm"),
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "quadplane-tilttri",
        model: None,
        make_target: None,
        waf_target: None,
        default_params: Some("quadplane-tilttri.parm"),
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "quadplane",
        model: None,
        make_target: None,
        waf_target: Some("bin/arduplane"),
        default_params: Some("quadplane.parm"),
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "plane-elevon",
        model: None,
        make_target: None,
        waf_target: Some("bin/arduplane"),
        default_params: Some("plane-elevons.parm"),
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "plane-vtail",
        model: None,
        make_target: None,
        waf_target: Some("bin/arduplane"),
        default_params: Some("plane-vtail.parm"),
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "plane",
        model: None,
        make_target: None,
        waf_target: Some("bin/arduplane"),
        default_params: Some("plane.parm"),
        extra_gcs_cmds: None,
    },
    FrameEntry {
        name: "rover",
        model: None,
        make_target: None,
        waf_target: Some("bin/ardurover"),
        default_params: Some("Rover.parm"),
        extra_gcs_cmds: None,
    },
];

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Whether the vehicle is one the launcher knows about.
pub fn is_known_vehicle(vehicle: &str) -> bool {
    lookup(&DEFAULT_FRAMES, vehicle).is_some()
}

/// The frame used for a vehicle when none is given.
pub fn default_frame_for_vehicle(vehicle: &str) -> Option<&'static str> {
    lookup(&DEFAULT_FRAMES, vehicle)
}

/// The waf target used for a vehicle when its frame doesn't name one.
pub fn default_waf_target(vehicle: &str) -> Option<&'static str> {
    lookup(&DEFAULT_WAF_TARGETS, vehicle)
}

/// Resolve the frame to use, either the one requested or the vehicle's default.
pub fn resolve_frame(frame: Option<&str>, vehicle: &str) -> Result<String, FrameError> {
    match frame {
        Some(f) => Ok(f.to_string()),
        None => default_frame_for_vehicle(vehicle)
            .map(String::from)
            .ok_or_else(|| FrameError::NoDefaultFrame(vehicle.to_string()))
    }
}

/// Return the build and runtime options for the given frame.
///
/// The entry is found by, in order:
/// 1. an exact name match,
/// 2. the first matching prefix in [`FRAME_PREFIXES`],
/// 3. the `heli` entry for names ending in `-heli`,
/// 4. an empty entry.
///
/// Then:
/// - `model` defaults to the requested frame name,
/// - `make_target` defaults to `sitl`,
/// - `waf_target` defaults to the vehicle's default waf target,
/// - `build_target`, if given, replaces both targets.
pub fn options_for_frame(
    frame: &str,
    vehicle: &str,
    build_target: Option<&str>
) -> Result<FrameOptions, FrameError> {
    let entry = find_entry(frame);

    let (make_target, waf_target) = match build_target {
        Some(t) => (t.to_string(), t.to_string()),
        None => {
            let waf_target = entry
                .and_then(|e| e.waf_target)
                .or_else(|| default_waf_target(vehicle))
                .ok_or_else(|| FrameError::NoDefaultWafTarget(
                    vehicle.to_string(), frame.to_string()
                ))?;
            let make_target = entry
                .and_then(|e| e.make_target)
                .unwrap_or(DEFAULT_MAKE_TARGET);

            (make_target.to_string(), waf_target.to_string())
        }
    };

    Ok(FrameOptions {
        model: entry
            .and_then(|e| e.model)
            .unwrap_or(frame)
            .to_string(),
        make_target,
        waf_target,
        default_params: entry.and_then(|e| e.default_params).map(String::from),
        extra_gcs_cmds: entry.and_then(|e| e.extra_gcs_cmds).map(String::from),
    })
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn entry_named(name: &str) -> Option<&'static FrameEntry> {
    FRAME_TABLE.iter().find(|e| e.name == name)
}

fn find_entry(frame: &str) -> Option<&'static FrameEntry> {
    if let Some(e) = entry_named(frame) {
        return Some(e);
    }

    if let Some(prefix) = FRAME_PREFIXES.iter().find(|p| frame.starts_with(*p)) {
        return entry_named(prefix);
    }

    if frame.ends_with(HELI_SUFFIX) {
        return entry_named("heli");
    }

    None
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
