//! Registry configuration, loaded from TOML.
//!
//! ```toml
//! data_dir = "/var/lib/sfpr"
//!
//! [validation]
//! min_size = 128
//! max_size = 512
//!
//! [policy]
//! auto_approve_new = false
//!
//! [publish]
//! blob_base_url = "https://modules.example.org/blobs"
//! keep_history = true
//!
//! [server]
//! bind_addr = "127.0.0.1:8080"
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sfpr_staging::ApprovalPolicy;
use sfpr_validate::ValidatorConfig;

use crate::error::{RegistryError, RegistryResult};

/// Everything a registry instance needs to know.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Root for `blobs/`, `staging/` and `index/`.
    pub data_dir: PathBuf,
    pub validation: ValidatorConfig,
    pub policy: ApprovalPolicy,
    pub publish: PublishConfig,
    pub server: ServerConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("registry"),
            validation: ValidatorConfig::default(),
            policy: ApprovalPolicy::default(),
            publish: PublishConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Prefix for `blob_url` in published records.
    pub blob_base_url: String,
    /// Archive every version under `index/history/`.
    pub keep_history: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            blob_base_url: "blobs".into(),
            keep_history: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Upper bound on a request body. Submissions are tiny; this mostly
    /// guards against abuse.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            max_body_bytes: 64 * 1024,
        }
    }
}

impl RegistryConfig {
    /// A default configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Read and check a TOML configuration file.
    ///
    /// A relative `data_dir` is resolved against the file's directory.
    pub fn load(path: &Path) -> RegistryResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        if config.data_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.data_dir = parent.join(&config.data_dir);
            }
        }
        tracing::debug!(path = %path.display(), data_dir = %config.data_dir.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> RegistryResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> RegistryResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the configuration for internal consistency.
    pub fn check(&self) -> RegistryResult<()> {
        self.validation.check().map_err(RegistryError::Config)?;
        if self.publish.blob_base_url.trim().is_empty() {
            return Err(RegistryError::Config(
                "publish.blob_base_url must not be empty".into(),
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(RegistryError::Config(
                "server.max_body_bytes must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join("staging")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = RegistryConfig::default();
        assert_eq!(c.validation.min_size, 128);
        assert_eq!(c.validation.max_size, 512);
        assert!(!c.policy.auto_approve_new);
        assert_eq!(c.publish.blob_base_url, "blobs");
        assert!(c.publish.keep_history);
        assert_eq!(c.server.bind_addr.port(), 8080);
        c.check().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = RegistryConfig::from_toml_str(
            r#"
            data_dir = "/srv/sfpr"

            [policy]
            auto_approve_new = true

            [server]
            bind_addr = "0.0.0.0:9000"
            "#,
        )
        .unwrap();
        assert_eq!(c.data_dir, PathBuf::from("/srv/sfpr"));
        assert!(c.policy.auto_approve_new);
        assert_eq!(c.server.bind_addr.port(), 9000);
        assert_eq!(c.validation, ValidatorConfig::default());
        assert_eq!(c.index_dir(), PathBuf::from("/srv/sfpr/index"));
    }

    #[test]
    fn inverted_size_bounds_are_refused() {
        let err = RegistryConfig::from_toml_str(
            r#"
            [validation]
            min_size = 600
            max_size = 512
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::Config(_)));
    }

    #[test]
    fn empty_base_url_is_refused() {
        let err = RegistryConfig::from_toml_str("[publish]\nblob_base_url = \"\"\n").unwrap_err();
        assert!(matches!(err, RegistryError::Config(_)));
    }

    #[test]
    fn toml_round_trip() {
        let c = RegistryConfig::with_data_dir("/tmp/reg");
        let text = c.to_toml_string().unwrap();
        assert_eq!(RegistryConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn relative_data_dir_follows_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sfpr.toml");
        std::fs::write(&path, "data_dir = \"data\"\n").unwrap();
        let c = RegistryConfig::load(&path).unwrap();
        assert_eq!(c.data_dir, dir.path().join("data"));
    }
}
