use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Hard maximum of rotation keys a single operation may list.
pub const MAX_ROTATION_KEYS: usize = 5;

/// Bounds applied to every loop over untrusted input.
///
/// Each validator runs with its own `Limits`; see [`Config`].
///
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Limits {
    /// Cycle ceiling for one invocation.
    /// `u64::MAX` disables the ceiling for off-chain folds.
    ///
    pub max_cycles: u64,
    /// Upper bound of `rotationKeys` entries per operation.
    /// Can't exceed [`MAX_ROTATION_KEYS`].
    ///
    pub max_rotation_keys: usize,
    /// Upper bound of operations replayed in one call.
    ///
    pub max_history_len: usize,
    /// Upper bound of a single encoded operation.
    ///
    pub max_operation_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_cycles: u64::MAX,
            max_rotation_keys: MAX_ROTATION_KEYS,
            max_history_len: 1024,
            max_operation_bytes: 7500,
        }
    }
}

impl Limits {
    pub fn registry() -> Self {
        Self {
            max_cycles: 26_000_000,
            max_history_len: 1,
            ..Self::default()
        }
    }

    pub fn binding() -> Self {
        Self {
            max_cycles: 200_000_000,
            max_history_len: 32,
            ..Self::default()
        }
    }

    fn validate(&self, section: &str) -> Result<()> {
        if self.max_rotation_keys == 0 || self.max_rotation_keys > MAX_ROTATION_KEYS {
            return Err(Error::InvalidConfig(format!(
                "{section}.max-rotation-keys must be within 1..={MAX_ROTATION_KEYS}"
            )));
        }
        if self.max_history_len == 0 {
            return Err(Error::InvalidConfig(format!(
                "{section}.max-history-len must be positive"
            )));
        }
        if self.max_operation_bytes == 0 || self.max_cycles == 0 {
            return Err(Error::InvalidConfig(format!(
                "{section} limits must be positive"
            )));
        }
        if self.max_cycles == u64::MAX {
            return Err(Error::InvalidConfig(format!(
                "{section}.max-cycles must be a finite ceiling"
            )));
        }
        Ok(())
    }
}

/// A possibly partial `[registry]` or `[binding]` section.
#[derive(Deserialize, Default)]
#[serde(default, rename_all = "kebab-case")]
struct LimitsSection {
    max_cycles: Option<u64>,
    max_rotation_keys: Option<usize>,
    max_history_len: Option<usize>,
    max_operation_bytes: Option<usize>,
}

impl LimitsSection {
    fn over(self, base: Limits) -> Limits {
        Limits {
            max_cycles: self.max_cycles.unwrap_or(base.max_cycles),
            max_rotation_keys: self.max_rotation_keys.unwrap_or(base.max_rotation_keys),
            max_history_len: self.max_history_len.unwrap_or(base.max_history_len),
            max_operation_bytes: self.max_operation_bytes.unwrap_or(base.max_operation_bytes),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    registry: LimitsSection,
    binding: LimitsSection,
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        Self {
            registry: file.registry.over(Limits::registry()),
            binding: file.binding.over(Limits::binding()),
        }
    }
}

/// Limits of both validators.
///
/// Keys missing from a section keep that validator's own defaults.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(from = "ConfigFile")]
pub struct Config {
    pub registry: Limits,
    pub binding: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry: Limits::registry(),
            binding: Limits::binding(),
        }
    }
}

impl Config {
    /// Parses TOML such as
    ///
    /// ```toml
    /// [registry]
    /// max-cycles = 26000000
    ///
    /// [binding]
    /// max-history-len = 16
    /// ```
    ///
    /// Omitted keys and sections keep the values of [`Config::default`].
    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.registry.validate("registry")?;
        config.binding.validate("binding")?;
        Ok(config)
    }
}
