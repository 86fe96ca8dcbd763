//! Engine config loader (strict parsing).

pub mod schema;

use std::fs;

use pdp_core::{PdpError, Result};

pub use schema::{EngineSection, PdpConfig};

pub fn load_from_file(path: &str) -> Result<PdpConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| PdpError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<PdpConfig> {
    let cfg: PdpConfig =
        serde_yaml::from_str(s).map_err(|e| PdpError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
