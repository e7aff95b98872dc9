use std::collections::BTreeMap;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EtherscanError, Result};

/// A compiled contract, in the ethPM contract-type shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractType {
    pub contract_name: Option<String>,
    pub source_id: Option<String>,
    #[serde(default)]
    pub abi: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_bytecode: Option<Bytecode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_bytecode: Option<Bytecode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bytecode {
    pub bytecode: Option<String>,
}

impl ContractType {
    pub fn name(&self) -> &str {
        self.contract_name.as_deref().unwrap_or("")
    }

    /// Deployment bytecode as bare hex (no `0x`).
    pub fn deployment_hex(&self) -> Option<&str> {
        self.deployment_bytecode
            .as_ref()
            .and_then(|b| b.bytecode.as_deref())
            .map(strip_hex_prefix)
            .filter(|b| !b.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compiler {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub settings: Value,
    #[serde(default)]
    pub contract_types: Vec<String>,
}

/// ethPM v3 package manifest, limited to the fields an explorer can fill in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub manifest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub sources: BTreeMap<String, Source>,
    #[serde(default)]
    pub contract_types: BTreeMap<String, ContractType>,
    #[serde(default)]
    pub compilers: Vec<Compiler>,
}

impl Default for PackageManifest {
    fn default() -> Self {
        PackageManifest {
            manifest: "ethpm/3".to_string(),
            name: None,
            version: None,
            sources: BTreeMap::new(),
            contract_types: BTreeMap::new(),
            compilers: Vec::new(),
        }
    }
}

/// One item of a `getsourcecode` response. Every field arrives as a string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SourceCodeResponse {
    #[serde(default)]
    pub source_code: String,
    #[serde(default, rename = "ABI")]
    pub abi: String,
    #[serde(default)]
    pub contract_name: String,
    #[serde(default)]
    pub compiler_version: String,
    #[serde(default)]
    pub optimization_used: String,
    #[serde(default)]
    pub runs: String,
    #[serde(default)]
    pub constructor_arguments: String,
    #[serde(default, rename = "EVMVersion")]
    pub evm_version: String,
    #[serde(default)]
    pub library: String,
    #[serde(default)]
    pub license_type: String,
    #[serde(default)]
    pub proxy: String,
    #[serde(default)]
    pub implementation: String,
}

const NOT_VERIFIED_ABI: &str = "Contract source code not verified";

impl SourceCodeResponse {
    pub fn is_verified(&self) -> bool {
        !self.source_code.trim().is_empty() && self.abi != NOT_VERIFIED_ABI
    }

    pub fn is_proxy(&self) -> bool {
        self.proxy == "1" && !self.implementation.trim().is_empty()
    }

    pub fn is_vyper(&self) -> bool {
        self.compiler_version.to_lowercase().starts_with("vyper")
    }

    pub fn optimized(&self) -> bool {
        self.optimization_used == "1"
    }

    pub fn parsed_abi(&self) -> serde_json::Result<Vec<Value>> {
        serde_json::from_str(&self.abi)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCreation {
    pub contract_address: String,
    pub contract_creator: String,
    pub tx_hash: String,
}

/// A mined transaction as reported by an account `txlist` query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub txn_hash: String,
    pub block_number: u64,
    pub sender: String,
    pub receiver: Option<String>,
    pub nonce: Option<u64>,
    pub value: String,
    pub gas_used: u64,
    pub status: u8,
    pub required_confirmations: u64,
    pub contract_address: Option<String>,
    pub input: String,
    pub chain_id: Option<u64>,
}

pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// EIP-55 checksummed form of `raw`, which may use any letter case.
pub fn checksum_address(raw: &str) -> Result<String> {
    raw.trim()
        .parse::<Address>()
        .map(|a| a.to_checksum(None))
        .map_err(|_| EtherscanError::InvalidAddress(raw.to_string()))
}

pub fn same_address(a: &str, b: &str) -> bool {
    match (a.trim().parse::<Address>(), b.trim().parse::<Address>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.eq_ignore_ascii_case(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_code_response_fields() {
        let raw = serde_json::json!({
            "SourceCode": "contract A {}",
            "ABI": "[]",
            "ContractName": "A",
            "CompilerVersion": "v0.8.20+commit.a1b79de6",
            "OptimizationUsed": "1",
            "Runs": "200",
            "EVMVersion": "Default",
            "Proxy": "0",
            "Implementation": ""
        });
        let resp: SourceCodeResponse = serde_json::from_value(raw).unwrap();
        assert!(resp.is_verified());
        assert!(resp.optimized());
        assert!(!resp.is_proxy());
        assert!(!resp.is_vyper());
        assert_eq!(resp.evm_version, "Default");
    }

    #[test]
    fn test_unverified_response() {
        let resp = SourceCodeResponse {
            abi: NOT_VERIFIED_ABI.to_string(),
            ..Default::default()
        };
        assert!(!resp.is_verified());
    }

    #[test]
    fn test_checksum_address() {
        assert_eq!(
            checksum_address("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap(),
            "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        );
        assert!(matches!(
            checksum_address("0x1234"),
            Err(EtherscanError::InvalidAddress(_))
        ));
        assert!(same_address(
            "0x5FBDB2315678AFECB367F032D93F642F64180AA3",
            "0x5fbdb2315678afecb367f032d93f642f64180aa3"
        ));
    }

    #[test]
    fn test_contract_type_camel_case() {
        let ct: ContractType = serde_json::from_str(
            r#"{"contractName":"foo","sourceId":"foo.sol","deploymentBytecode":{"bytecode":"0x6080"}}"#,
        )
        .unwrap();
        assert_eq!(ct.name(), "foo");
        assert_eq!(ct.deployment_hex(), Some("6080"));
    }
}
