use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::client::{ClientFactory, ClientSettings};
use crate::config::{EtherscanConfig, VerificationConfig};
use crate::detector::SourceLanguage;
use crate::error::{EtherscanError, Result};
use crate::models::{
    checksum_address, Compiler, ContractType, PackageManifest, Source, SourceCodeResponse,
};
use crate::networks::{self, EtherscanInstance};
use crate::verify::{SourceVerifier, VerificationRequest, VerifierOptions};

/// Explorer for one ecosystem / network pair.
#[derive(Debug)]
pub struct Etherscan {
    factory: ClientFactory,
    verification: VerificationConfig,
    /// Keyed by lowercased address.
    contract_types: Mutex<HashMap<String, ContractType>>,
}

impl Etherscan {
    pub fn new(config: &EtherscanConfig, ecosystem: &str, network: &str) -> Result<Self> {
        let instance = EtherscanInstance::resolve(config, ecosystem, network)?;
        let settings = ClientSettings::from(&config.ecosystem(&instance.ecosystem));
        Ok(Self::with_client_factory(
            ClientFactory::new(instance, settings)?,
            config.verification.clone(),
        ))
    }

    /// Explorer for the network with `chain_id`, known or configured.
    pub fn from_chain_id(config: &EtherscanConfig, chain_id: u64) -> Result<Self> {
        if let Some((eco, net)) = networks::find_by_chain_id(chain_id) {
            return Self::new(config, eco.name, net.name);
        }

        let custom = config.ecosystems.iter().find_map(|(eco, eco_config)| {
            eco_config
                .networks
                .iter()
                .find(|(_, n)| n.chain_id == Some(chain_id))
                .map(|(net, _)| (eco.clone(), net.clone()))
        });
        match custom {
            Some((eco, net)) => Self::new(config, &eco, &net),
            None => Err(EtherscanError::UnsupportedNetwork {
                ecosystem: "unknown".to_string(),
                network: format!("chain {}", chain_id),
            }),
        }
    }

    pub fn with_client_factory(factory: ClientFactory, verification: VerificationConfig) -> Self {
        Etherscan {
            factory,
            verification,
            contract_types: Mutex::new(HashMap::new()),
        }
    }

    pub fn instance(&self) -> &EtherscanInstance {
        self.factory.instance()
    }

    pub fn client_factory(&self) -> &ClientFactory {
        &self.factory
    }

    pub fn get_address_url(&self, address: &str) -> String {
        self.instance().address_url(address)
    }

    pub fn get_transaction_url(&self, transaction_hash: &str) -> String {
        self.instance().transaction_url(transaction_hash)
    }

    /// ABI and name of a verified contract, or `None` when the source is not
    /// published. Proxies report the implementation's ABI under their own name.
    pub async fn get_contract_type(&self, address: &str) -> Result<Option<ContractType>> {
        let address = checksum_address(address)?;
        let key = address.to_lowercase();
        if let Some(cached) = self.cached_contract_type(&key) {
            return Ok(Some(cached));
        }

        let Some(source) = self.verified_source(&address).await? else {
            return Ok(None);
        };

        let abi_source = if source.is_proxy() {
            debug!(proxy = %address, implementation = %source.implementation, "resolving proxy ABI");
            let implementation = checksum_address(&source.implementation)?;
            self.verified_source(&implementation).await?.unwrap_or_else(|| source.clone())
        } else {
            source.clone()
        };

        let abi = match abi_source.parsed_abi() {
            Ok(abi) => abi,
            Err(err) => {
                error!("Error with contract ABI: {}", err);
                return Ok(None);
            }
        };

        let contract_type = ContractType {
            contract_name: Some(source.contract_name.clone()),
            abi,
            ..Default::default()
        };

        self.contract_types
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, contract_type.clone());
        Ok(Some(contract_type))
    }

    fn cached_contract_type(&self, key: &str) -> Option<ContractType> {
        self.contract_types
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    async fn verified_source(&self, address: &str) -> Result<Option<SourceCodeResponse>> {
        let source = self
            .factory
            .get_contract_client(address)
            .get_source_code()
            .await?;
        Ok(source.filter(SourceCodeResponse::is_verified))
    }

    /// Package manifest holding the contract's published sources, or `None`
    /// when the contract is not verified.
    pub async fn get_manifest(&self, address: &str) -> Result<Option<PackageManifest>> {
        let address = checksum_address(address)?;
        match self.verified_source(&address).await? {
            Some(source) => Ok(Some(manifest_from_source(&source)?)),
            None => Ok(None),
        }
    }

    /// Publish a contract's source; returns its explorer URL.
    pub async fn publish_contract(&self, request: VerificationRequest) -> Result<String> {
        let verifier = SourceVerifier::new(&self.factory, request, VerifierOptions::from(&self.verification));
        verifier.attempt_verification().await
    }
}

#[derive(Debug, Deserialize)]
struct StandardJsonInput {
    #[serde(default)]
    sources: BTreeMap<String, Source>,
    #[serde(default)]
    settings: Value,
}

/// Build a manifest from a `getsourcecode` item.
///
/// `SourceCode` arrives as a single file, as a JSON object of files, or as
/// standard JSON input wrapped in an extra pair of braces.
pub fn manifest_from_source(source: &SourceCodeResponse) -> Result<PackageManifest> {
    let language = if source.is_vyper() {
        SourceLanguage::Vyper
    } else {
        SourceLanguage::Solidity
    };
    let name = source.contract_name.clone();
    let raw = source.source_code.trim();

    let (sources, settings) = if raw.starts_with("{{") && raw.ends_with("}}") {
        let input: StandardJsonInput = serde_json::from_str(&raw[1..raw.len() - 1])?;
        (input.sources, input.settings)
    } else if raw.starts_with('{') {
        let files: BTreeMap<String, Source> = serde_json::from_str(raw)?;
        (files, flat_settings(source))
    } else {
        let mut files = BTreeMap::new();
        files.insert(
            format!("{}.{}", name, language.extension()),
            Source {
                content: source.source_code.clone(),
            },
        );
        (files, flat_settings(source))
    };

    let source_id = primary_source_id(&sources, &name)?;
    let abi = source.parsed_abi().unwrap_or_default();
    let contract_type = ContractType {
        contract_name: Some(name.clone()),
        source_id,
        abi,
        ..Default::default()
    };

    let compiler = Compiler {
        name: language.to_string(),
        version: clean_compiler_version(&source.compiler_version),
        settings,
        contract_types: vec![name.clone()],
    };

    let mut contract_types = BTreeMap::new();
    contract_types.insert(name, contract_type);
    Ok(PackageManifest {
        sources,
        contract_types,
        compilers: vec![compiler],
        ..Default::default()
    })
}

/// Compiler settings reconstructed from the flat response fields.
fn flat_settings(source: &SourceCodeResponse) -> Value {
    let runs: u64 = source.runs.trim().parse().unwrap_or(200);
    let mut settings = json!({
        "optimizer": {"enabled": source.optimized(), "runs": runs},
    });
    let evm = source.evm_version.trim();
    if !evm.is_empty() && !evm.eq_ignore_ascii_case("default") {
        settings["evmVersion"] = Value::String(evm.to_string());
    }
    settings
}

/// The file declaring `name`: matched by file stem first, then by declaration.
fn primary_source_id(sources: &BTreeMap<String, Source>, name: &str) -> Result<Option<String>> {
    let by_stem = sources.keys().find(|id| {
        let file = id.rsplit('/').next().unwrap_or(id);
        file.split('.').next() == Some(name)
    });
    if let Some(id) = by_stem {
        return Ok(Some(id.clone()));
    }

    let declaration = Regex::new(&format!(
        r"\b(?:abstract\s+contract|contract|library|interface)\s+{}\b",
        regex::escape(name)
    ))?;
    Ok(sources
        .iter()
        .find(|(_, s)| declaration.is_match(&s.content))
        .or_else(|| sources.iter().next())
        .map(|(id, _)| id.clone()))
}

fn clean_compiler_version(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw.strip_prefix("vyper:").unwrap_or(raw);
    raw.strip_prefix('v').unwrap_or(raw).to_string()
}
