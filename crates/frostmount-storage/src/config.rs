//! Configuration for the game loader

use crate::revision::EngineRevision;
use crate::{DEFAULT_GAME_ROOT, MountError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How structural parse failures are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Unknown headers and missing layouts abort; the first failed unit aborts a mount pass
    #[default]
    Strict,
    /// Unknown headers skip the file; missing layouts yield an empty result
    Lenient,
}

/// Configuration for [`crate::GameLoader`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Virtual path the game directory is mounted at
    pub game_root: String,

    /// Failure policy
    pub strictness: Strictness,

    /// Engine revision selecting the parsing codec
    pub engine: EngineRevision,

    /// Mount independent superbundles on the rayon pool
    pub parallel_mount: bool,

    /// Mount every bundle during [`crate::GameLoader::load`]
    pub mount_bundles_on_load: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            game_root: DEFAULT_GAME_ROOT.to_string(),
            strictness: Strictness::Strict,
            engine: EngineRevision::Frostbite2013_2,
            parallel_mount: false,
            mount_bundles_on_load: false,
        }
    }
}

impl LoaderConfig {
    /// Parse a JSON configuration; missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| MountError::FatalConfiguration(format!("invalid loader config: {e}")))
    }

    /// Read a JSON configuration file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Set the virtual game root
    #[must_use]
    pub fn with_game_root(mut self, root: impl Into<String>) -> Self {
        self.game_root = root.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the failure policy
    #[must_use]
    pub const fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// Set the engine revision
    #[must_use]
    pub const fn with_engine(mut self, engine: EngineRevision) -> Self {
        self.engine = engine;
        self
    }

    /// Enable or disable parallel superbundle mounting
    #[must_use]
    pub const fn with_parallel_mount(mut self, enable: bool) -> Self {
        self.parallel_mount = enable;
        self
    }

    /// Enable or disable mounting bundles during load
    #[must_use]
    pub const fn with_mount_bundles_on_load(mut self, enable: bool) -> Self {
        self.mount_bundles_on_load = enable;
        self
    }

    /// Whether failures abort instead of being skipped
    pub const fn is_strict(&self) -> bool {
        matches!(self.strictness, Strictness::Strict)
    }

    /// Virtual base data directory
    pub fn data_dir(&self) -> String {
        format!("{}/{}", self.game_root, crate::DATA_DIR)
    }

    /// Virtual update package directory
    pub fn update_dir(&self) -> String {
        format!("{}/{}", self.game_root, crate::UPDATE_DIR)
    }
}
