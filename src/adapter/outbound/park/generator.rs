//! Park configuration produced by an external generator.
//!
//! The generator is invoked as
//!
//! ```text
//! <command...> --park-name <name> --scenario <scenario>
//!              --park-output <dir>/park/park_<slug>.yaml
//!              --turbine-types-output <dir>/turbine-types/turbinetypes_<slug>.yaml
//! ```
//!
//! and must leave both files behind.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::info;

use crate::error::ConfigError;
use crate::infrastructure::config::simulation::GeneratorConfig;
use crate::port::{ParkConfigResolver, SimulationFiles};

pub struct GeneratedFiles {
    command: Vec<String>,
    park_name: String,
    scenario: String,
    output_dir: PathBuf,
    simulation: Option<PathBuf>,
}

/// File-name slug: lowercase, spaces replaced by underscores.
pub fn slug(park_name: &str) -> String {
    park_name.trim().to_lowercase().replace(' ', "_")
}

impl GeneratedFiles {
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the generator has no
    /// command or park name.
    pub fn new(config: &GeneratorConfig, simulation: Option<PathBuf>) -> Result<Self, ConfigError> {
        if config.command.is_empty() {
            return Err(ConfigError::MissingField {
                field: "generator.command",
            });
        }
        let park_name = config
            .park_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .ok_or(ConfigError::MissingField {
                field: "generator.park_name",
            })?;

        Ok(Self {
            command: config.command.clone(),
            park_name,
            scenario: config.scenario.clone(),
            output_dir: config.output_dir.clone(),
            simulation,
        })
    }

    #[must_use]
    pub fn park_path(&self) -> PathBuf {
        self.output_dir
            .join("park")
            .join(format!("park_{}.yaml", slug(&self.park_name)))
    }

    #[must_use]
    pub fn turbine_types_path(&self) -> PathBuf {
        self.output_dir
            .join("turbine-types")
            .join(format!("turbinetypes_{}.yaml", slug(&self.park_name)))
    }
}

fn create_parent(path: &Path) -> Result<(), ConfigError> {
    match path.parent() {
        Some(dir) => std::fs::create_dir_all(dir)
            .map_err(|err| ConfigError::Generator(format!("{}: {err}", dir.display()))),
        None => Ok(()),
    }
}

impl ParkConfigResolver for GeneratedFiles {
    fn resolve(&self) -> Result<SimulationFiles, ConfigError> {
        let park = self.park_path();
        let turbine_types = self.turbine_types_path();
        create_parent(&park)?;
        create_parent(&turbine_types)?;

        let (program, args) = self
            .command
            .split_first()
            .ok_or(ConfigError::MissingField {
                field: "generator.command",
            })?;
        info!(
            park_name = %self.park_name,
            scenario = %self.scenario,
            "Generating park configuration"
        );
        let output = Command::new(program)
            .args(args)
            .arg("--park-name")
            .arg(&self.park_name)
            .arg("--scenario")
            .arg(&self.scenario)
            .arg("--park-output")
            .arg(&park)
            .arg("--turbine-types-output")
            .arg(&turbine_types)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| ConfigError::Generator(format!("cannot start '{program}': {err}")))?;

        if !output.status.success() {
            return Err(ConfigError::Generator(format!(
                "'{program}' exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        for path in [&park, &turbine_types] {
            if !path.is_file() {
                return Err(ConfigError::Generator(format!(
                    "generator did not produce {}",
                    path.display()
                )));
            }
        }

        Ok(SimulationFiles {
            park,
            turbine_types: Some(turbine_types),
            simulation: self.simulation.clone(),
        })
    }

    fn source(&self) -> &'static str {
        "generator"
    }
}
