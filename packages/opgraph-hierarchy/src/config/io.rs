//! YAML loading

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ConfigResult;
use super::params::{BuildParams, HierarchyParams, ParserOptions};

/// Everything needed to go from text to hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphLoadConfig {
    pub parser: ParserOptions,
    pub build: BuildParams,
    pub hierarchy: HierarchyParams,
}

impl GraphLoadConfig {
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: GraphLoadConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading graph load config");
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.parser.validate()?;
        self.build.validate()?;
        Ok(())
    }
}
