//! TOML configuration for the `patch` command
//!
//! ```toml
//! [patch]
//! artifacts = true
//! bbox = true
//!
//! [encryption]
//! user_password = "reader"
//! owner_password = "editor"
//! revision = 6
//! print = "low"
//! extract = false
//! ```

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use pdftag_core::{EncryptionRevision, EncryptionSettings};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchConfig {
    #[serde(default)]
    pub patch: PatchSteps,
    /// Absent means the output is written unencrypted
    #[serde(default)]
    pub encryption: Option<EncryptionSettings>,
}

/// Which fixes to apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchSteps {
    pub artifacts: bool,
    pub bbox: bool,
}

impl Default for PatchSteps {
    fn default() -> Self {
        Self {
            artifacts: true,
            bbox: true,
        }
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub no_artifacts: bool,
    pub no_bbox: bool,
    pub user_password: Option<String>,
    pub owner_password: Option<String>,
    pub revision: Option<u8>,
}

impl PatchConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    pub fn with_overrides(mut self, overrides: &Overrides) -> anyhow::Result<Self> {
        if overrides.no_artifacts {
            self.patch.artifacts = false;
        }
        if overrides.no_bbox {
            self.patch.bbox = false;
        }

        let wants_password =
            overrides.user_password.is_some() || overrides.owner_password.is_some();
        if wants_password && self.encryption.is_none() {
            self.encryption = Some(EncryptionSettings::default());
        }

        match self.encryption.as_mut() {
            Some(settings) => {
                if let Some(user) = &overrides.user_password {
                    settings.user_password = user.clone();
                }
                if let Some(owner) = &overrides.owner_password {
                    settings.owner_password = owner.clone();
                }
                if let Some(revision) = overrides.revision {
                    settings.revision = EncryptionRevision::try_from(revision)?;
                }
            }
            None if overrides.revision.is_some() => {
                bail!("--revision needs a user or owner password to encrypt with")
            }
            None => {}
        }
        Ok(self)
    }
}
