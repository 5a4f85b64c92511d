use anyhow::{bail, Context};
use conductor_orchestrator::RunConfig;
use conductor_security::{CredentialBinding, StaticCredentialBackend};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

/// Contents of `conductor.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct ConductorConfig {
    #[serde(default)]
    pub run: RunConfig,
    /// Catalog JSON, relative to the config file's directory.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    #[serde(default)]
    pub credentials: Vec<CredentialBinding>,
}

impl ConductorConfig {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw)?;
        Ok(config)
    }

    /// Read the config file. A missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Self::parse(&raw)
                .with_context(|| format!("Failed to parse config file '{}'", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read config file '{}'", path.display())),
        }
    }

    /// The catalog to load: the flag if given, else `catalog_path` resolved
    /// against `config_dir`.
    pub fn catalog_path(&self, flag: Option<&Path>, config_dir: &Path) -> anyhow::Result<PathBuf> {
        if let Some(path) = flag {
            return Ok(path.to_path_buf());
        }
        match &self.catalog_path {
            Some(path) if path.is_absolute() => Ok(path.clone()),
            Some(path) => Ok(config_dir.join(path)),
            None => bail!("No catalog configured: set catalog_path or pass --catalog"),
        }
    }

    pub fn credential_backend(&self) -> StaticCredentialBackend {
        StaticCredentialBackend::new(self.credentials.iter().cloned())
    }
}
