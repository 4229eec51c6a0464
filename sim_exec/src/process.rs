//! # Process module
//!
//! Running external tools: blocking runs (builds, the ground station),
//! detached runs in a new terminal window (the simulator) and best-effort
//! cleanup of stray simulator processes.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The kernel truncates process names to this many bytes.
const MAX_PROC_NAME_LEN: usize = 15;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Something which can run external commands.
///
/// `argv[0]` is the program, the rest its arguments. When `cwd` is `None` the
/// command runs in the launcher's working directory.
pub trait Runner {
    /// Run the command and wait for it to finish.
    fn run_blocking(
        &mut self,
        what: &str,
        argv: &[String],
        cwd: Option<&Path>
    ) -> Result<RunStatus, ProcessError>;

    /// Start the command in a new terminal window named `name` without
    /// waiting for it.
    fn run_in_terminal(
        &mut self,
        name: &str,
        argv: &[String],
        cwd: Option<&Path>
    ) -> Result<(), ProcessError>;

    /// Run the command and return its standard output.
    fn capture_stdout(&mut self, what: &str, argv: &[String]) -> Result<String, ProcessError>;

    /// Whether the user has interrupted the launcher (Ctrl-C).
    fn interrupted(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// How a blocking command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    /// The exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
}

/// Runs commands as real child processes.
#[derive(Debug)]
pub struct SystemRunner {
    /// Script which opens a terminal window and runs a command in it
    terminal_helper: PathBuf,

    /// Set by the interrupt handler, if one is installed
    interrupt_flag: Option<Arc<AtomicBool>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Cannot run an empty command ({0})")]
    EmptyCommand(String),

    #[error("Failed to start {0}: {1}")]
    SpawnError(String, std::io::Error),

    #[error("Failed waiting for {0}: {1}")]
    WaitError(String, std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RunStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for RunStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        RunStatus { code: status.code() }
    }
}

impl SystemRunner {
    pub fn new<P: Into<PathBuf>>(terminal_helper: P) -> Self {
        Self {
            terminal_helper: terminal_helper.into(),
            interrupt_flag: None,
        }
    }

    /// Report interrupts through the given flag.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt_flag = Some(flag);
        self
    }

    fn command(what: &str, argv: &[String], cwd: Option<&Path>) -> Result<Command, ProcessError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ProcessError::EmptyCommand(what.to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        Ok(cmd)
    }
}

impl Runner for SystemRunner {
    fn run_blocking(
        &mut self,
        what: &str,
        argv: &[String],
        cwd: Option<&Path>
    ) -> Result<RunStatus, ProcessError> {
        progress_cmd(what, argv);

        let status = Self::command(what, argv, cwd)?
            .status()
            .map_err(|e| ProcessError::SpawnError(argv[0].clone(), e))?;

        debug!("{} finished with {}", what, status);

        Ok(status.into())
    }

    fn run_in_terminal(
        &mut self,
        name: &str,
        argv: &[String],
        cwd: Option<&Path>
    ) -> Result<(), ProcessError> {
        let runme = terminal_command(&self.terminal_helper, name, argv);
        progress_cmd(&format!("Run {}", name), &runme);

        // Not waited on, the child lives in its own window
        let child = Self::command(name, &runme, cwd)?
            .spawn()
            .map_err(|e| ProcessError::SpawnError(runme[0].clone(), e))?;

        debug!("{} started with pid {}", name, child.id());

        Ok(())
    }

    fn capture_stdout(&mut self, what: &str, argv: &[String]) -> Result<String, ProcessError> {
        progress_cmd(what, argv);

        let output = Self::command(what, argv, None)?
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| ProcessError::WaitError(argv[0].clone(), e))?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn interrupted(&self) -> bool {
        self.interrupt_flag
            .as_ref()
            .map_or(false, |f| f.load(Ordering::SeqCst))
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Render a command so that a user could cut-and-paste it into a shell.
pub fn shell_text(argv: &[String]) -> String {
    argv.iter()
        .map(|a| format!("\"{}\"", a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Log what is about to be run, and how.
pub fn progress_cmd(what: &str, argv: &[String]) {
    info!("{}", what);
    info!("{}", shell_text(argv));
}

/// The full command used to run `argv` inside a new terminal window.
pub fn terminal_command(terminal_helper: &Path, name: &str, argv: &[String]) -> Vec<String> {
    let mut runme = vec![
        terminal_helper.to_string_lossy().into_owned(),
        name.to_string(),
    ];
    runme.extend(argv.iter().cloned());
    runme
}

/// Kill every process whose name is one of the victims.
///
/// This is a shotgun approach to clearing up simulators left over from earlier
/// runs, failures are logged and otherwise ignored.
pub fn kill_tasks(victims: &[String]) {
    for victim in victims {
        let argv = pkill_command(victim);

        match Command::new(&argv[0])
            .args(&argv[1..])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            // pkill exits with 1 when nothing matched
            Ok(s) if s.success() => debug!("Killed stray {} processes", victim),
            Ok(_) => (),
            Err(e) => {
                warn!("Could not run {} to kill stray processes: {}", argv[0], e);
                return;
            }
        }
    }
}

/// The `pkill` invocation which kills processes named `victim`.
pub fn pkill_command(victim: &str) -> Vec<String> {
    let mut name_end = victim.len().min(MAX_PROC_NAME_LEN);
    while !victim.is_char_boundary(name_end) {
        name_end -= 1;
    }

    vec![
        "pkill".to_string(),
        "-KILL".to_string(),
        "-x".to_string(),
        victim[..name_end].to_string(),
    ]
}

// ---------------------------------------------------------------------------
// MOCK RUNNER
// ---------------------------------------------------------------------------

/// A runner which records what it was asked to run instead of running it.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;

    /// One recorded call.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Call {
        pub what: String,
        pub argv: Vec<String>,
        pub cwd: Option<PathBuf>,
        pub in_terminal: bool,
    }

    #[derive(Debug, Default)]
    pub struct RecordingRunner {
        pub calls: Vec<Call>,

        /// Exit codes handed out to blocking runs in order, 0 once exhausted
        pub exit_codes: VecDeque<i32>,

        /// Output of every captured command
        pub stdout: String,

        /// Number of blocking runs after which the user interrupts
        pub interrupt_after: Option<usize>,
    }

    impl RecordingRunner {
        pub fn with_exit_codes(codes: &[i32]) -> Self {
            Self {
                exit_codes: codes.iter().cloned().collect(),
                ..Default::default()
            }
        }

        /// The `what` of every blocking call, in order.
        pub fn blocking_whats(&self) -> Vec<&str> {
            self.calls
                .iter()
                .filter(|c| !c.in_terminal)
                .map(|c| c.what.as_str())
                .collect()
        }

        pub fn terminal_calls(&self) -> Vec<&Call> {
            self.calls.iter().filter(|c| c.in_terminal).collect()
        }
    }

    impl Runner for RecordingRunner {
        fn run_blocking(
            &mut self,
            what: &str,
            argv: &[String],
            cwd: Option<&Path>
        ) -> Result<RunStatus, ProcessError> {
            self.calls.push(Call {
                what: what.to_string(),
                argv: argv.to_vec(),
                cwd: cwd.map(Path::to_path_buf),
                in_terminal: false,
            });

            Ok(RunStatus { code: Some(self.exit_codes.pop_front().unwrap_or(0)) })
        }

        fn run_in_terminal(
            &mut self,
            name: &str,
            argv: &[String],
            cwd: Option<&Path>
        ) -> Result<(), ProcessError> {
            self.calls.push(Call {
                what: name.to_string(),
                argv: argv.to_vec(),
                cwd: cwd.map(Path::to_path_buf),
                in_terminal: true,
            });

            Ok(())
        }

        fn capture_stdout(&mut self, what: &str, argv: &[String]) -> Result<String, ProcessError> {
            self.calls.push(Call {
                what: what.to_string(),
                argv: argv.to_vec(),
                cwd: None,
                in_terminal: false,
            });

            Ok(self.stdout.clone())
        }

        fn interrupted(&self) -> bool {
            let blocking = self.calls.iter().filter(|c| !c.in_terminal).count();
            self.interrupt_after.map_or(false, |n| blocking >= n)
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
