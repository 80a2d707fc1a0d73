//! Operation engine configuration.

use std::path::Path;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Transfer chunk size used by every streaming loop.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Default recursion cap for directory walks.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Configuration shared by all file operations.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct OpsConfig {
    /// Size of the intermediate buffer for byte copies.
    #[builder(default = "DEFAULT_CHUNK_SIZE")]
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum directory depth a recursive walk may descend to.
    #[builder(default = "DEFAULT_MAX_DEPTH")]
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Name of the configuration artifact that marks a volume root.
    #[builder(default = "default_volume_config_name()")]
    #[serde(default = "default_volume_config_name")]
    pub volume_config_name: String,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_volume_config_name() -> String {
    "gocryptfs.conf".to_string()
}

impl OpsConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.chunk_size == Some(0) {
            return Err("Chunk size must be greater than zero".to_string());
        }
        if self.max_depth == Some(0) {
            return Err("Max depth must be greater than zero".to_string());
        }
        if let Some(ref name) = self.volume_config_name {
            if name.is_empty() || name.contains('/') {
                return Err(format!("Invalid volume config name: {name:?}"));
            }
        }
        Ok(())
    }
}

impl OpsConfig {
    /// Create a new config builder.
    pub fn builder() -> OpsConfigBuilder {
        OpsConfigBuilder::default()
    }

    /// Path of the configuration artifact for a volume rooted at `root`.
    pub fn volume_config_path(&self, root: &Path) -> std::path::PathBuf {
        root.join(&self.volume_config_name)
    }
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            volume_config_name: default_volume_config_name(),
        }
    }
}
