//! External-process simulation engine.
//!
//! Runs the configured engine command once per batch:
//!
//! ```text
//! <engine_command...> --park <file> [--turbine-types <file>] [--simulation <file>]
//! ```
//!
//! The batch is written to stdin as JSON; a [`SimulationOutput`] JSON document
//! is expected on stdout. A non-zero exit is an engine failure carrying the
//! tail of stderr. The child is polled so cancellation can kill it.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::{ForecastBatch, SimulationOutput};
use crate::error::{ConfigError, SimulationError};
use crate::port::{SimulationEngine, SimulationFiles};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Bytes of stderr kept for error messages.
const STDERR_TAIL: usize = 2048;

pub struct ProcessEngine {
    program: String,
    args: Vec<String>,
    name: String,
}

impl ProcessEngine {
    /// Build the engine and let it validate its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for an empty command and
    /// [`ConfigError::Engine`] when the `--check` invocation fails.
    pub fn new(command: &[String], files: &SimulationFiles) -> Result<Self, ConfigError> {
        let (program, base_args) = command.split_first().ok_or(ConfigError::MissingField {
            field: "engine_command",
        })?;

        let mut args = base_args.to_vec();
        push_path(&mut args, "--park", &files.park);
        if let Some(path) = &files.turbine_types {
            push_path(&mut args, "--turbine-types", path);
        }
        if let Some(path) = &files.simulation {
            push_path(&mut args, "--simulation", path);
        }

        let engine = Self {
            name: Path::new(program)
                .file_name()
                .map_or_else(|| program.clone(), |n| n.to_string_lossy().into_owned()),
            program: program.clone(),
            args,
        };
        engine.check()?;
        Ok(engine)
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }

    /// Run `<command> --check` and require a zero exit.
    fn check(&self) -> Result<(), ConfigError> {
        let output = self
            .command()
            .arg("--check")
            .stdin(Stdio::null())
            .output()
            .map_err(|err| ConfigError::Engine(format!("cannot start '{}': {err}", self.program)))?;

        if output.status.success() {
            debug!(engine = %self.name, "Engine accepted its configuration");
            return Ok(());
        }
        Err(ConfigError::Engine(format!(
            "'{}' --check exited with {}: {}",
            self.program,
            output.status,
            tail(&output.stderr)
        )))
    }

    fn wait(
        &self,
        child: &mut Child,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus, SimulationError> {
        loop {
            if let Some(status) = child
                .try_wait()
                .context("waiting for engine process")
                .map_err(SimulationError::Engine)?
            {
                return Ok(status);
            }
            if cancel.is_cancelled() {
                if let Err(err) = child.kill() {
                    warn!(engine = %self.name, error = %err, "Failed to kill engine process");
                }
                let _ = child.wait();
                return Err(SimulationError::Cancelled);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn push_path(args: &mut Vec<String>, flag: &str, path: &Path) {
    args.push(flag.to_string());
    args.push(path.to_string_lossy().into_owned());
}

fn tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(STDERR_TAIL);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

impl SimulationEngine for ProcessEngine {
    fn simulate(
        &self,
        batch: &ForecastBatch,
        cancel: &CancellationToken,
    ) -> Result<SimulationOutput, SimulationError> {
        if cancel.is_cancelled() {
            return Err(SimulationError::Cancelled);
        }
        let input = serde_json::to_vec(batch)
            .context("encoding forecast batch")
            .map_err(SimulationError::Engine)?;

        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("starting '{}'", self.program))
            .map_err(SimulationError::Engine)?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || {
                let _ = stdin.write_all(&input);
            })
        });

        let status = self.wait(&mut child, cancel)?;
        if let Some(writer) = writer {
            let _ = writer.join();
        }
        let stdout = stdout.and_then(|h| h.join().ok()).unwrap_or_default();
        let stderr = stderr.and_then(|h| h.join().ok()).unwrap_or_default();

        if !status.success() {
            return Err(SimulationError::Engine(anyhow!(
                "'{}' exited with {status}: {}",
                self.name,
                tail(&stderr)
            )));
        }

        serde_json::from_slice(&stdout).map_err(|err| SimulationError::InvalidOutput {
            reason: format!("engine stdout is not a simulation output: {err}"),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
