//! Park configuration taken straight from `[simulation]`.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::port::{ParkConfigResolver, SimulationFiles};

pub struct StaticFiles {
    park: Option<PathBuf>,
    turbine_types: Option<PathBuf>,
    simulation: Option<PathBuf>,
}

impl StaticFiles {
    pub fn new(
        park: Option<PathBuf>,
        turbine_types: Option<PathBuf>,
        simulation: Option<PathBuf>,
    ) -> Self {
        Self {
            park,
            turbine_types,
            simulation,
        }
    }
}

fn existing(field: &'static str, path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("{} does not exist", path.display()),
        })
    }
}

impl ParkConfigResolver for StaticFiles {
    fn resolve(&self) -> Result<SimulationFiles, ConfigError> {
        let park = self
            .park
            .as_deref()
            .ok_or(ConfigError::MissingField {
                field: "park_config",
            })
            .and_then(|path| existing("park_config", path))?;

        Ok(SimulationFiles {
            park,
            turbine_types: self
                .turbine_types
                .as_deref()
                .map(|path| existing("turbine_types_config", path))
                .transpose()?,
            simulation: self
                .simulation
                .as_deref()
                .map(|path| existing("simulation_config", path))
                .transpose()?,
        })
    }

    fn source(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let park = dir.path().join("park.yaml");
        std::fs::write(&park, "name: test\n").unwrap();

        let files = StaticFiles::new(Some(park.clone()), None, None)
            .resolve()
            .unwrap();

        assert_eq!(files.park, park);
        assert!(files.turbine_types.is_none());
    }

    #[test]
    fn missing_file_is_an_invalid_value() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = StaticFiles::new(Some(dir.path().join("absent.yaml")), None, None);

        assert!(matches!(
            resolver.resolve(),
            Err(ConfigError::InvalidValue {
                field: "park_config",
                ..
            })
        ));
    }

    #[test]
    fn unset_park_is_missing() {
        assert!(matches!(
            StaticFiles::new(None, None, None).resolve(),
            Err(ConfigError::MissingField {
                field: "park_config"
            })
        ));
    }
}
