use thiserror::Error;

pub type Result<T> = std::result::Result<T, FleetError>;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("secret error: {0}")]
    Secret(#[from] SecretError),
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),
}

impl FleetError {
    /// Config-scoped failures skip the offending config; anything else
    /// aborts the run.
    pub fn is_config_scoped(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Secret(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    MissingConfig(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported domain `{0}`")]
    UnsupportedDomain(String),
    #[error("unreadable ABI `{abi}`: {reason}")]
    AbiLookup { abi: String, reason: String },
    #[error("event `{event}` not found in ABI `{abi}`")]
    EventLookup { abi: String, event: String },
}

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("environment variable `{var}` for secret `{key}` is unset")]
    MissingEnv { key: String, var: String },
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no usable signing credential: {0}")]
    NoCredential(String),
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("keystore decryption failed for `{path}`: {reason}")]
    Keystore { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("transaction `{context}` failed: {reason}")]
    Transaction { context: String, reason: String },
    #[error("vendor API call failed: {0}")]
    VendorApi(String),
}
