use serde::Deserialize;
use pdp_core::{PdpError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdpConfig {
    pub version: u32,

    #[serde(default)]
    pub engine: EngineSection,
}

impl Default for PdpConfig {
    fn default() -> Self {
        Self {
            version: 1,
            engine: EngineSection::default(),
        }
    }
}

impl PdpConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PdpError::UnsupportedVersion(self.version));
        }

        self.engine.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Max nesting depth of policy sets.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Folds several mapper matches unless the mapper names its own.
    #[serde(default = "default_mapper_sub_algorithm")]
    pub mapper_sub_algorithm: String,

    #[serde(default)]
    pub trace_decisions: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            mapper_sub_algorithm: default_mapper_sub_algorithm(),
            trace_decisions: false,
        }
    }
}

impl EngineSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=1024).contains(&self.max_depth) {
            return Err(PdpError::Config(
                "engine.max_depth must be between 1 and 1024".into(),
            ));
        }
        if self.mapper_sub_algorithm.trim().is_empty() {
            return Err(PdpError::Config(
                "engine.mapper_sub_algorithm must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_max_depth() -> usize {
    64
}
fn default_mapper_sub_algorithm() -> String {
    "firstapplicableeffect".into()
}
