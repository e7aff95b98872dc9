use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtherscanError>;

/// Root error for everything the explorer adapter can raise.
#[derive(Debug, Error)]
pub enum EtherscanError {
    #[error("Unsupported Ecosystem: {0}")]
    UnsupportedEcosystem(String),

    #[error("Unsupported network '{network}' for ecosystem '{ecosystem}'")]
    UnsupportedNetwork { ecosystem: String, network: String },

    #[error("Response indicated failure: {message}")]
    Response { message: String },

    #[error("Response indicated failure: {message}")]
    TooManyRequests { message: String },

    #[error("Unhandled result type: {0}")]
    UnhandledResultType(String),

    #[error("Contract verification failed: {0}")]
    ContractVerification(String),

    #[error("Incompatible compiler settings: {0}")]
    IncompatibleCompilerSettings(String),

    #[error("Contract '{0}' is not verified")]
    ContractNotVerified(String),

    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

impl EtherscanError {
    pub fn response(message: impl Into<String>) -> Self {
        EtherscanError::Response {
            message: message.into(),
        }
    }

    /// Rate-limit error, pointing at the API key variable when none is set.
    pub fn too_many_requests(api_key_env: &str, has_api_key: bool) -> Self {
        let mut message = "Etherscan API server rate limit exceeded.".to_string();
        if !has_api_key {
            message = format!("{} Try setting '{}'.", message, api_key_env);
        }
        EtherscanError::TooManyRequests { message }
    }

    pub fn is_resource_not_found(&self) -> bool {
        matches!(self, EtherscanError::Response { message } if message.contains("Resource not found"))
    }
}
