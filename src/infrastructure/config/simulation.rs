//! Simulation engine and park configuration references.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// How the simulation engine is built.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulationConfig {
    /// Park layout file.
    #[serde(default)]
    pub park_config: Option<PathBuf>,
    /// Turbine type definitions.
    #[serde(default)]
    pub turbine_types_config: Option<PathBuf>,
    /// Simulation settings file.
    #[serde(default)]
    pub simulation_config: Option<PathBuf>,
    /// Program and arguments of the external engine.
    #[serde(default)]
    pub engine_command: Vec<String>,
    /// Optional park configuration generator.
    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// External park configuration generator (e.g. a knowledge-graph export).
///
/// When enabled and successful, the generated files take precedence over
/// `park_config` / `turbine_types_config`.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Program and arguments of the generator.
    #[serde(default)]
    pub command: Vec<String>,
    /// Park to generate configuration for.
    #[serde(default)]
    pub park_name: Option<String>,
    #[serde(default = "default_scenario")]
    pub scenario: String,
    /// Directory the generator writes into.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_scenario() -> String {
    "BaselineAlkmaar".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("eolica-configs")
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: Vec::new(),
            park_name: None,
            scenario: default_scenario(),
            output_dir: default_output_dir(),
        }
    }
}

impl SimulationConfig {
    /// Resolve relative paths against `base`.
    pub(crate) fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.park_config,
            &mut self.turbine_types_config,
            &mut self.simulation_config,
        ]
        .into_iter()
        .flatten()
        {
            *path = rebase(base, path);
        }
        self.generator.output_dir = rebase(base, &self.generator.output_dir);
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
