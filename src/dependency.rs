use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::EtherscanConfig;
use crate::error::{EtherscanError, Result};
use crate::explorer::Etherscan;
use crate::models::{checksum_address, PackageManifest};
use crate::networks::EtherscanInstance;

/// A verified contract used as a project dependency, e.g.
///
/// ```toml
/// [[dependencies]]
/// name = "dai"
/// etherscan = "0x6B175474E89094C44Da98b954EedeAC495271d0F"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EtherscanDependency {
    pub name: String,
    #[serde(rename = "etherscan")]
    pub address: String,
    #[serde(default = "default_ecosystem")]
    pub ecosystem: String,
    #[serde(default = "default_network")]
    pub network: String,
}

fn default_ecosystem() -> String {
    "ethereum".to_string()
}

fn default_network() -> String {
    "mainnet".to_string()
}

impl EtherscanDependency {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        EtherscanDependency {
            name: name.into(),
            address: address.into(),
            ecosystem: default_ecosystem(),
            network: default_network(),
        }
    }

    pub fn version_id(&self) -> String {
        format!("{}_{}", self.ecosystem, self.network)
    }

    pub fn checksum_address(&self) -> Result<String> {
        checksum_address(&self.address)
    }

    /// Explorer page showing the dependency's verified code.
    pub fn uri(&self, config: &EtherscanConfig) -> Result<String> {
        let instance = EtherscanInstance::resolve(config, &self.ecosystem, &self.network)?;
        Ok(format!("{}#code", instance.address_url(&self.checksum_address()?)))
    }

    pub fn explorer(&self, config: &EtherscanConfig) -> Result<Etherscan> {
        Etherscan::new(config, &self.ecosystem, &self.network)
    }

    /// The dependency's manifest, from the cache when allowed, otherwise from
    /// the explorer. Fetched manifests are written back to the cache.
    pub async fn extract_manifest(
        &self,
        explorer: &Etherscan,
        cache: &ManifestCache,
        use_cache: bool,
    ) -> Result<PackageManifest> {
        let version_id = self.version_id();
        if use_cache {
            if let Some(manifest) = cache.load(&self.name, &version_id)? {
                debug!(name = %self.name, version = %version_id, "using cached manifest");
                return Ok(manifest);
            }
        }

        let mut manifest = explorer
            .get_manifest(&self.address)
            .await?
            .ok_or_else(|| EtherscanError::ContractNotVerified(self.name.clone()))?;
        manifest.name = Some(self.name.clone());
        manifest.version = Some(version_id.clone());

        let path = cache.store(&self.name, &version_id, &manifest)?;
        info!("Cached '{}' manifest at {}", self.name, path.display());
        Ok(manifest)
    }
}

/// On-disk manifest cache laid out as `<root>/<name>/<version_id>.json`.
#[derive(Debug, Clone)]
pub struct ManifestCache {
    root: PathBuf,
}

impl ManifestCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ManifestCache { root: root.into() }
    }

    /// `~/.cache/etherscan/packages` or the platform equivalent.
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("etherscan")
            .join("packages")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str, version_id: &str) -> PathBuf {
        self.root.join(name).join(format!("{}.json", version_id))
    }

    pub fn load(&self, name: &str, version_id: &str) -> Result<Option<PackageManifest>> {
        let path = self.path(name, version_id);
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn store(&self, name: &str, version_id: &str, manifest: &PackageManifest) -> Result<PathBuf> {
        let path = self.path(name, version_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(manifest)?)?;
        Ok(path)
    }
}

impl Default for ManifestCache {
    fn default() -> Self {
        ManifestCache::new(Self::default_root())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::parse_config;

    const DAI: &str = "0x6b175474e89094c44da98b954eedeac495271d0f";

    fn explorer(server: &MockServer) -> Etherscan {
        let cfg = parse_config(&format!(
            "[ethereum]\nrate_limit = 1000\n\n[ethereum.mainnet]\napi_uri = \"{}\"\n",
            server.uri()
        ))
        .unwrap();
        Etherscan::new(&cfg, "ethereum", "mainnet").unwrap()
    }

    #[test]
    fn test_defaults_and_uri() {
        let dep: EtherscanDependency =
            toml::from_str(&format!("name = \"dai\"\netherscan = \"{}\"\n", DAI)).unwrap();
        assert_eq!(dep.ecosystem, "ethereum");
        assert_eq!(dep.network, "mainnet");
        assert_eq!(dep.version_id(), "ethereum_mainnet");
        assert_eq!(
            dep.uri(&EtherscanConfig::default()).unwrap(),
            "https://etherscan.io/address/0x6B175474E89094C44Da98b954EedeAC495271d0F#code"
        );
    }

    #[test]
    fn test_uri_other_network() {
        let dep = EtherscanDependency {
            network: "sepolia".into(),
            ..EtherscanDependency::new("dai", DAI)
        };
        assert_eq!(dep.version_id(), "ethereum_sepolia");
        assert!(dep
            .uri(&EtherscanConfig::default())
            .unwrap()
            .starts_with("https://sepolia.etherscan.io/address/"));
    }

    #[tokio::test]
    async fn test_extract_manifest_uses_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "getsourcecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "1",
                "result": [{
                    "SourceCode": "contract Dai {}",
                    "ABI": "[]",
                    "ContractName": "Dai",
                    "CompilerVersion": "v0.5.12+commit.7709ece9"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = ManifestCache::new(dir.path());
        let dep = EtherscanDependency::new("dai", DAI);
        let explorer = explorer(&server);

        let fetched = dep.extract_manifest(&explorer, &cache, true).await.unwrap();
        assert_eq!(fetched.name.as_deref(), Some("dai"));
        assert!(cache.path("dai", "ethereum_mainnet").is_file());

        let cached = dep.extract_manifest(&explorer, &cache, true).await.unwrap();
        assert_eq!(fetched, cached);
    }

    #[tokio::test]
    async fn test_extract_manifest_unverified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "1", "result": [{"SourceCode": "", "ABI": "Contract source code not verified"}]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = EtherscanDependency::new("dai", DAI)
            .extract_manifest(&explorer(&server), &ManifestCache::new(dir.path()), false)
            .await
            .unwrap_err();
        assert!(matches!(err, EtherscanError::ContractNotVerified(name) if name == "dai"));
    }
}
