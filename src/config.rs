use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;
use crate::verify::VerificationApproach;

/// Root configuration structure, deserialized from `.etherscan/config.toml`.
///
/// Every top-level table other than `[verification]` is an ecosystem
/// (e.g. `[ethereum]`, `[polygon]`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EtherscanConfig {
    /// How contracts are published.
    #[serde(default)]
    pub verification: VerificationConfig,
    /// Per-ecosystem settings keyed by ecosystem name.
    #[serde(flatten)]
    pub ecosystems: HashMap<String, EcosystemConfig>,
}

/// Settings shared by every network of one ecosystem.
#[derive(Debug, Clone, Deserialize)]
pub struct EcosystemConfig {
    /// Requests per second. Defaults to `5`.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    /// Retries after a rate-limited response, on top of the first attempt.
    /// Defaults to `5`.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Custom explorer locations keyed by network name.
    #[serde(flatten)]
    pub networks: HashMap<String, NetworkConfig>,
}

/// Explorer location overrides for a single network.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfig {
    /// Explorer web URI used for address and transaction links.
    pub uri: Option<String>,
    /// API endpoint; replaces the default multichain endpoint entirely.
    pub api_uri: Option<String>,
    /// Chain id, only needed for custom networks without an `api_uri`.
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    #[serde(default)]
    pub approach: VerificationApproach,
    /// Delay between `checkverifystatus` polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_status_checks")]
    pub max_status_checks: u32,
    /// Delay between lookups of the contract's creation transaction.
    #[serde(default = "default_deploy_poll_interval_ms")]
    pub deploy_poll_interval_ms: u64,
    #[serde(default = "default_max_deploy_checks")]
    pub max_deploy_checks: u32,
}

fn default_rate_limit() -> u32 {
    5
}

fn default_retries() -> u32 {
    5
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_max_status_checks() -> u32 {
    100
}

fn default_deploy_poll_interval_ms() -> u64 {
    2500
}

fn default_max_deploy_checks() -> u32 {
    20
}

impl Default for EcosystemConfig {
    fn default() -> Self {
        EcosystemConfig {
            rate_limit: default_rate_limit(),
            retries: default_retries(),
            networks: HashMap::new(),
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        VerificationConfig {
            approach: VerificationApproach::default(),
            poll_interval_ms: default_poll_interval_ms(),
            max_status_checks: default_max_status_checks(),
            deploy_poll_interval_ms: default_deploy_poll_interval_ms(),
            max_deploy_checks: default_max_deploy_checks(),
        }
    }
}

impl VerificationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn deploy_poll_interval(&self) -> Duration {
        Duration::from_millis(self.deploy_poll_interval_ms)
    }
}

impl EtherscanConfig {
    /// Settings for `ecosystem`, falling back to defaults when unconfigured.
    pub fn ecosystem(&self, ecosystem: &str) -> EcosystemConfig {
        self.ecosystems
            .get(&ecosystem.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Overrides for one network, if any were configured.
    pub fn network(&self, ecosystem: &str, network: &str) -> Option<&NetworkConfig> {
        self.ecosystems
            .get(&ecosystem.to_lowercase())
            .and_then(|eco| eco.networks.get(network))
    }
}

/// Parse a configuration document.
pub fn parse_config(content: &str) -> Result<EtherscanConfig> {
    Ok(toml::from_str(content)?)
}

/// Load the configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<project_path>/.etherscan/config.toml`
/// 3. `~/.config/etherscan/config.toml`
/// 4. Built-in [`EtherscanConfig::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<EtherscanConfig> {
    if let Some(path) = config_override {
        let content = std::fs::read_to_string(path)?;
        return parse_config(&content);
    }

    let project_config = project_path.join(".etherscan").join("config.toml");
    if project_config.exists() {
        let content = std::fs::read_to_string(&project_config)?;
        return parse_config(&content);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("etherscan").join("config.toml");
        if home_config.exists() {
            let content = std::fs::read_to_string(&home_config)?;
            return parse_config(&content);
        }
    }

    Ok(EtherscanConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EtherscanConfig::default();
        let eco = cfg.ecosystem("ethereum");
        assert_eq!(eco.rate_limit, 5);
        assert_eq!(eco.retries, 5);
        assert_eq!(cfg.verification.approach, VerificationApproach::StandardJson);
        assert_eq!(cfg.verification.max_status_checks, 100);
    }

    #[test]
    fn test_rate_limit() {
        let cfg = parse_config("[ethereum]\nrate_limit = 123\n").unwrap();
        assert_eq!(cfg.ecosystem("ethereum").rate_limit, 123);
        assert_eq!(cfg.ecosystem("ethereum").retries, 5);
    }

    #[test]
    fn test_retries() {
        let cfg = parse_config("[ethereum]\nretries = 321\n").unwrap();
        assert_eq!(cfg.ecosystem("ethereum").rate_limit, 5);
        assert_eq!(cfg.ecosystem("ethereum").retries, 321);
    }

    #[test]
    fn test_custom_network_uri() {
        let content = r#"
[verification]
approach = "flatten"

[ethereum]
rate_limit = 2

[ethereum.monkechain]
uri = "https://monke.chain/"
api_uri = "https://api.monke.chain/api"
"#;
        let cfg = parse_config(content).unwrap();
        let net = cfg.network("ethereum", "monkechain").unwrap();
        assert_eq!(net.uri.as_deref(), Some("https://monke.chain/"));
        assert_eq!(net.api_uri.as_deref(), Some("https://api.monke.chain/api"));
        assert_eq!(cfg.ecosystem("ethereum").rate_limit, 2);
        assert_eq!(cfg.verification.approach, VerificationApproach::Flatten);
        assert!(cfg.network("ethereum", "mainnet").is_none());
    }

    #[test]
    fn test_load_project_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join(".etherscan");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(cfg_dir.join("config.toml"), "[polygon]\nretries = 1\n").unwrap();

        let cfg = load_config(dir.path(), None).unwrap();
        assert_eq!(cfg.ecosystem("polygon").retries, 1);
    }

    #[test]
    fn test_load_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[bsc]\nrate_limit = 9\n").unwrap();

        let cfg = load_config(dir.path(), Some(&path)).unwrap();
        assert_eq!(cfg.ecosystem("bsc").rate_limit, 9);
    }
}
