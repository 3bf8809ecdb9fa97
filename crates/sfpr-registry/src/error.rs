use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("cannot encode configuration: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("store error: {0}")]
    Store(#[from] sfpr_store::StoreError),

    #[error("staging error: {0}")]
    Staging(#[from] sfpr_staging::StagingError),

    #[error("publish error: {0}")]
    Publish(#[from] sfpr_publish::PublishError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data directory {0} is in use by another registry")]
    Locked(std::path::PathBuf),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
