//! Deployment configuration for the catalog.
//!
//! Loaded from YAML:
//!
//! ```yaml
//! environment: production
//! enforce_publication_completeness: true
//! structural_check_on_create: true
//! page_size: 30
//! ```
//!
//! Every key is optional.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where the catalog runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Live deployment.
    Production,
    /// Local development.
    #[default]
    Development,
    /// Automated tests.
    Test,
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Environment::Production => "production",
            Environment::Development => "development",
            Environment::Test => "test",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            other => Err(format!("unknown environment {:?}", other)),
        }
    }
}

/// Errors raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("could not read {path}: {source}")]
    Io {
        /// The file.
        path: String,
        /// Underlying failure.
        source: std::io::Error,
    },
    /// The file is not valid configuration YAML.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yml::Error),
}

/// Catalog settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Deployment environment.
    pub environment: Environment,
    /// Overrides whether publication requires a complete species.  Unset means "only in
    /// production".
    pub enforce_publication_completeness: Option<bool>,
    /// Also run the kind exclusivity check when species and sub-documents are created.
    pub structural_check_on_create: bool,
    /// Items per page on collection reads.
    pub page_size: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            enforce_publication_completeness: None,
            structural_check_on_create: true,
            page_size: 30,
        }
    }
}

impl CatalogConfig {
    /// Defaults for `environment`.
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            ..Self::default()
        }
    }

    /// Parses YAML configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Reads YAML configuration from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// True when `posted -> published` requires the completion check.
    pub fn enforces_publication_completeness(&self) -> bool {
        self.enforce_publication_completeness
            .unwrap_or(self.environment == Environment::Production)
    }
}
