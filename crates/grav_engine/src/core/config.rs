//! Simulation configuration.
//!
//! All tunable parameters live in [`SimulationConfig`], loadable from a TOML
//! file with sensible defaults for every field. Validation happens once at
//! startup; a particle count that does not divide evenly into compute
//! workgroups is a configuration error, not something to silently truncate
//! on the GPU.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A parameter combination is invalid.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Window parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Initial framebuffer width in pixels.
    pub width: u32,
    /// Initial framebuffer height in pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 2560,
            height: 1440,
            title: "Particle Gravity Simulation".to_string(),
        }
    }
}

/// Paths to precompiled SPIR-V shader binaries.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Point-sprite vertex shader.
    pub vertex: String,
    /// Fragment shader.
    pub fragment: String,
    /// Gravity integration compute shader.
    pub compute: String,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: "shaders/particle.vert.spv".to_string(),
            fragment: "shaders/particle.frag.spv".to_string(),
            compute: "shaders/particle.comp.spv".to_string(),
        }
    }
}

/// Initial particle placement strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    /// One disk centered on the origin with a tangential velocity field.
    SpinningDisk,
    /// Two square clusters, each orbiting its own center.
    TwinClusters,
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Window parameters.
    pub window: WindowConfig,
    /// Shader binary paths.
    pub shaders: ShaderConfig,
    /// Total number of particles. Fixed for the lifetime of the process.
    pub particle_count: u32,
    /// Compute shader local workgroup size. Must evenly divide
    /// `particle_count` and must match `local_size_x` in the compute shader.
    pub local_group_size: u32,
    /// Seed for the initial particle distribution.
    pub seed: u64,
    /// Initial placement strategy.
    pub distribution: DistributionKind,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            shaders: ShaderConfig::default(),
            particle_count: 256 * 256,
            local_group_size: 256,
            seed: 0x6772_6176, // arbitrary fixed default; runs are reproducible
            distribution: DistributionKind::SpinningDisk,
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist. A file that exists but fails to parse or validate
    /// is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            log::info!("Loading configuration from {}", path.display());
            Self::load(path)
        } else {
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Validate parameter combinations. Called by the loaders; call directly
    /// when constructing a config in code.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(
                "window extent must be non-zero".to_string(),
            ));
        }
        if self.particle_count == 0 {
            return Err(ConfigError::Invalid(
                "particle count must be non-zero".to_string(),
            ));
        }
        if self.local_group_size == 0 {
            return Err(ConfigError::Invalid(
                "local workgroup size must be non-zero".to_string(),
            ));
        }
        if self.particle_count % self.local_group_size != 0 {
            return Err(ConfigError::Invalid(format!(
                "particle count {} is not divisible by local workgroup size {}",
                self.particle_count, self.local_group_size
            )));
        }
        Ok(())
    }

    /// Number of compute workgroups dispatched per frame.
    ///
    /// Only meaningful after [`SimulationConfig::validate`] has passed.
    pub fn workgroup_count(&self) -> u32 {
        self.particle_count / self.local_group_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn workgroup_count_has_zero_remainder() {
        let config = SimulationConfig {
            particle_count: 65536,
            local_group_size: 256,
            ..SimulationConfig::default()
        };
        config.validate().unwrap();
        assert_eq!(config.workgroup_count(), 256);
        assert_eq!(config.particle_count % config.local_group_size, 0);
    }

    #[test]
    fn non_divisible_particle_count_fails_validation() {
        let config = SimulationConfig {
            particle_count: 65537,
            local_group_size: 256,
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_extent_fails_validation() {
        let mut config = SimulationConfig::default();
        config.window.width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_group_size_fails_validation() {
        let config = SimulationConfig {
            local_group_size: 0,
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: SimulationConfig = toml::from_str(
            r#"
            particle_count = 1024
            local_group_size = 256

            [window]
            width = 800
            height = 600
            "#,
        )
        .unwrap();
        assert_eq!(config.particle_count, 1024);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.title, "Particle Gravity Simulation");
        assert_eq!(config.distribution, DistributionKind::SpinningDisk);
        config.validate().unwrap();
        assert_eq!(config.workgroup_count(), 4);
    }
}
