//! Supported explorers and URI resolution.
//!
//! Every supported chain is reached through the Etherscan multichain (v2)
//! endpoint keyed by chain id; the per-chain explorer hosts are only used for
//! human-facing links.

use crate::config::EtherscanConfig;
use crate::error::{EtherscanError, Result};

pub const ETHERSCAN_V2_API: &str = "https://api.etherscan.io/v2/api";

/// Fallback API key variable accepted for every ecosystem.
pub const DEFAULT_API_KEY_ENV: &str = "ETHERSCAN_API_KEY";

const FORK_SUFFIX: &str = "-fork";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    pub name: &'static str,
    pub chain_id: u64,
    /// Explorer web host, without scheme.
    pub explorer: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct EcosystemInfo {
    pub name: &'static str,
    pub api_key_env: &'static str,
    pub networks: &'static [NetworkInfo],
}

const fn net(name: &'static str, chain_id: u64, explorer: &'static str) -> NetworkInfo {
    NetworkInfo {
        name,
        chain_id,
        explorer,
    }
}

pub const ECOSYSTEMS: &[EcosystemInfo] = &[
    EcosystemInfo {
        name: "arbitrum",
        api_key_env: "ARBISCAN_API_KEY",
        networks: &[
            net("mainnet", 42161, "arbiscan.io"),
            net("sepolia", 421614, "sepolia.arbiscan.io"),
            net("nova", 42170, "nova.arbiscan.io"),
        ],
    },
    EcosystemInfo {
        name: "avalanche",
        api_key_env: "SNOWTRACE_API_KEY",
        networks: &[
            net("mainnet", 43114, "snowtrace.io"),
            net("fuji", 43113, "testnet.snowtrace.io"),
        ],
    },
    EcosystemInfo {
        name: "base",
        api_key_env: "BASESCAN_API_KEY",
        networks: &[
            net("mainnet", 8453, "basescan.org"),
            net("sepolia", 84532, "sepolia.basescan.org"),
        ],
    },
    EcosystemInfo {
        name: "blast",
        api_key_env: "BLASTSCAN_API_KEY",
        networks: &[
            net("mainnet", 81457, "blastscan.io"),
            net("sepolia", 168587773, "sepolia.blastscan.io"),
        ],
    },
    EcosystemInfo {
        name: "bsc",
        api_key_env: "BSCSCAN_API_KEY",
        networks: &[
            net("mainnet", 56, "bscscan.com"),
            net("testnet", 97, "testnet.bscscan.com"),
            net("opbnb", 204, "opbnb.bscscan.com"),
            net("opbnb-testnet", 5611, "opbnb-testnet.bscscan.com"),
        ],
    },
    EcosystemInfo {
        name: "bttc",
        api_key_env: "BTTCSCAN_API_KEY",
        networks: &[
            net("mainnet", 199, "bttcscan.com"),
            net("donau", 1029, "testnet.bttcscan.com"),
        ],
    },
    EcosystemInfo {
        name: "celo",
        api_key_env: "CELOSCAN_API_KEY",
        networks: &[
            net("mainnet", 42220, "celoscan.io"),
            net("alfajores", 44787, "alfajores.celoscan.io"),
        ],
    },
    EcosystemInfo {
        name: "ethereum",
        api_key_env: "ETHERSCAN_API_KEY",
        networks: &[
            net("mainnet", 1, "etherscan.io"),
            net("holesky", 17000, "holesky.etherscan.io"),
            net("sepolia", 11155111, "sepolia.etherscan.io"),
        ],
    },
    EcosystemInfo {
        name: "fantom",
        api_key_env: "FTMSCAN_API_KEY",
        networks: &[
            net("opera", 250, "ftmscan.com"),
            net("testnet", 4002, "testnet.ftmscan.com"),
        ],
    },
    EcosystemInfo {
        name: "fraxtal",
        api_key_env: "FRAXSCAN_API_KEY",
        networks: &[
            net("mainnet", 252, "fraxscan.com"),
            net("holesky", 2522, "holesky.fraxscan.com"),
        ],
    },
    EcosystemInfo {
        name: "gnosis",
        api_key_env: "GNOSISSCAN_API_KEY",
        networks: &[net("mainnet", 100, "gnosisscan.io")],
    },
    EcosystemInfo {
        name: "kroma",
        api_key_env: "KROMASCAN_API_KEY",
        networks: &[
            net("mainnet", 255, "kromascan.com"),
            net("sepolia", 2358, "sepolia.kromascan.com"),
        ],
    },
    EcosystemInfo {
        name: "moonbeam",
        api_key_env: "MOONSCAN_API_KEY",
        networks: &[
            net("mainnet", 1284, "moonbeam.moonscan.io"),
            net("moonbase", 1287, "moonbase.moonscan.io"),
            net("moonriver", 1285, "moonriver.moonscan.io"),
        ],
    },
    EcosystemInfo {
        name: "optimism",
        api_key_env: "OPTIMISTIC_ETHERSCAN_API_KEY",
        networks: &[
            net("mainnet", 10, "optimistic.etherscan.io"),
            net("sepolia", 11155420, "sepolia-optimism.etherscan.io"),
        ],
    },
    EcosystemInfo {
        name: "polygon",
        api_key_env: "POLYGONSCAN_API_KEY",
        networks: &[
            net("mainnet", 137, "polygonscan.com"),
            net("amoy", 80002, "amoy.polygonscan.com"),
        ],
    },
    EcosystemInfo {
        name: "polygon-zkevm",
        api_key_env: "POLYGON_ZKEVM_ETHERSCAN_API_KEY",
        networks: &[
            net("mainnet", 1101, "zkevm.polygonscan.com"),
            net("cardona", 2442, "cardona-zkevm.polygonscan.com"),
        ],
    },
    EcosystemInfo {
        name: "scroll",
        api_key_env: "SCROLLSCAN_API_KEY",
        networks: &[
            net("mainnet", 534352, "scrollscan.com"),
            net("sepolia", 534351, "sepolia.scrollscan.com"),
            net("testnet", 534353, "alpha.scrollscan.com"),
        ],
    },
    EcosystemInfo {
        name: "unichain",
        api_key_env: "UNISCAN_API_KEY",
        networks: &[
            net("mainnet", 130, "uniscan.xyz"),
            net("sepolia", 1301, "sepolia.uniscan.xyz"),
        ],
    },
];

/// Strip the `-fork` suffix local forks carry.
pub fn normalize_network_name(network: &str) -> &str {
    network.strip_suffix(FORK_SUFFIX).unwrap_or(network)
}

pub fn find_ecosystem(name: &str) -> Option<&'static EcosystemInfo> {
    let name = name.to_lowercase();
    ECOSYSTEMS.iter().find(|e| e.name == name)
}

pub fn find_network(ecosystem: &str, network: &str) -> Result<&'static NetworkInfo> {
    let eco = find_ecosystem(ecosystem)
        .ok_or_else(|| EtherscanError::UnsupportedEcosystem(ecosystem.to_string()))?;
    let network = normalize_network_name(network);
    eco.networks
        .iter()
        .find(|n| n.name == network)
        .ok_or_else(|| EtherscanError::UnsupportedNetwork {
            ecosystem: eco.name.to_string(),
            network: network.to_string(),
        })
}

pub fn find_by_chain_id(chain_id: u64) -> Option<(&'static EcosystemInfo, &'static NetworkInfo)> {
    ECOSYSTEMS.iter().find_map(|eco| {
        eco.networks
            .iter()
            .find(|n| n.chain_id == chain_id)
            .map(|n| (eco, n))
    })
}

pub fn is_supported(ecosystem: &str, network: &str) -> bool {
    find_network(ecosystem, network).is_ok()
}

/// Environment variable holding the API key for `ecosystem`.
pub fn api_key_env(ecosystem: &str) -> &'static str {
    find_ecosystem(ecosystem)
        .map(|e| e.api_key_env)
        .unwrap_or(DEFAULT_API_KEY_ENV)
}

/// API key for `ecosystem`: its own variable first, then `ETHERSCAN_API_KEY`.
pub fn api_key(ecosystem: &str) -> Option<String> {
    api_key_from(ecosystem, |var| std::env::var(var).ok())
}

fn api_key_from(ecosystem: &str, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    [api_key_env(ecosystem), DEFAULT_API_KEY_ENV]
        .into_iter()
        .filter_map(lookup)
        .find(|key| !key.trim().is_empty())
}

/// Explorer web URI for a network, without a trailing slash.
pub fn get_etherscan_uri(config: &EtherscanConfig, ecosystem: &str, network: &str) -> Result<String> {
    let network = normalize_network_name(network);
    if let Some(uri) = config.network(ecosystem, network).and_then(|n| n.uri.as_deref()) {
        return Ok(uri.trim_end_matches('/').to_string());
    }

    let info = find_network(ecosystem, network)?;
    Ok(format!("https://{}", info.explorer))
}

/// API endpoint for a network.
pub fn get_etherscan_api_uri(
    config: &EtherscanConfig,
    ecosystem: &str,
    network: &str,
) -> Result<String> {
    let network = normalize_network_name(network);
    let custom = config.network(ecosystem, network);
    if let Some(api_uri) = custom.and_then(|n| n.api_uri.as_deref()) {
        return Ok(api_uri.to_string());
    }

    let chain_id = match custom.and_then(|n| n.chain_id) {
        Some(id) => id,
        None => find_network(ecosystem, network)?.chain_id,
    };
    Ok(format!("{}?chainid={}", ETHERSCAN_V2_API, chain_id))
}

/// Resolved explorer location for one ecosystem / network pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtherscanInstance {
    pub ecosystem: String,
    pub network: String,
    pub chain_id: Option<u64>,
    pub uri: String,
    pub api_uri: String,
}

impl EtherscanInstance {
    pub fn resolve(config: &EtherscanConfig, ecosystem: &str, network: &str) -> Result<Self> {
        let ecosystem = ecosystem.to_lowercase();
        let network = normalize_network_name(network).to_string();
        let uri = get_etherscan_uri(config, &ecosystem, &network)?;
        let api_uri = get_etherscan_api_uri(config, &ecosystem, &network)?;
        let chain_id = config
            .network(&ecosystem, &network)
            .and_then(|n| n.chain_id)
            .or_else(|| find_network(&ecosystem, &network).ok().map(|n| n.chain_id));

        Ok(EtherscanInstance {
            ecosystem,
            network,
            chain_id,
            uri,
            api_uri,
        })
    }

    pub fn address_url(&self, address: &str) -> String {
        format!("{}/address/{}", self.uri, address)
    }

    pub fn transaction_url(&self, transaction_hash: &str) -> String {
        format!("{}/tx/{}", self.uri, transaction_hash)
    }
}
