//! Contract source verification (publishing).
//!
//! - [`imports`] — walks a contract's import graph inside the contracts folder.
//! - [`standard_json`] — bundles sources as compiler standard JSON input.
//! - [`flatten`] — bundles sources as one flattened file.

pub mod flatten;
pub mod imports;
pub mod standard_json;

use std::path::PathBuf;
use std::time::Duration;

use futures::TryStreamExt;
use semver::Version;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::account::TransactionListOptions;
use crate::client::contract::VerificationSubmission;
use crate::client::{ClientFactory, ContractClient};
use crate::config::VerificationConfig;
use crate::detector::{detect_language, SourceLanguage};
use crate::error::{EtherscanError, Result};
use crate::license::classifier::license_from_file;
use crate::license::LicenseType;
use crate::models::{strip_hex_prefix, Compiler, ContractType};
use flatten::FlattenBundler;
use imports::{ImportResolver, Remapping, SourceFile};
use standard_json::StandardJsonBundler;

const PASS_KEY: &str = "Pass - ";
const FAIL_KEY: &str = "Fail - ";
const ALREADY_VERIFIED: &str = "Already Verified";
const DEFAULT_OPTIMIZER_RUNS: u32 = 200;

/// How sources are packaged for the explorer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationApproach {
    #[default]
    StandardJson,
    Flatten,
}

impl VerificationApproach {
    pub fn bundler(&self) -> Box<dyn SourceBundler> {
        match self {
            VerificationApproach::StandardJson => Box::new(StandardJsonBundler),
            VerificationApproach::Flatten => Box::new(FlattenBundler),
        }
    }
}

/// Everything a bundler needs to package one contract.
pub struct BundleInput<'a> {
    pub language: SourceLanguage,
    pub source_id: &'a str,
    /// Dependencies before dependents.
    pub sources: &'a [SourceFile],
    pub settings: &'a Value,
}

pub trait SourceBundler {
    /// The explorer's `codeformat` value for this bundle.
    fn code_format(&self, language: SourceLanguage) -> Result<&'static str>;
    fn contract_name(&self, source_id: &str, name: &str) -> String;
    fn bundle(&self, input: &BundleInput<'_>) -> Result<String>;
}

/// A contract to publish, as the build produced it.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub address: String,
    pub contract_type: ContractType,
    pub contracts_folder: PathBuf,
    /// Compilers used by the project; the entry listing the contract is picked.
    pub compilers: Vec<Compiler>,
    pub approach: VerificationApproach,
    /// ABI-encoded constructor arguments. Looked up from the creation
    /// transaction when absent.
    pub constructor_arguments: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VerifierOptions {
    pub poll_interval: Duration,
    pub max_status_checks: u32,
    pub deploy_poll_interval: Duration,
    pub max_deploy_checks: u32,
}

impl From<&VerificationConfig> for VerifierOptions {
    fn from(config: &VerificationConfig) -> Self {
        VerifierOptions {
            poll_interval: config.poll_interval(),
            max_status_checks: config.max_status_checks,
            deploy_poll_interval: config.deploy_poll_interval(),
            max_deploy_checks: config.max_deploy_checks,
        }
    }
}

pub struct SourceVerifier<'a> {
    factory: &'a ClientFactory,
    request: VerificationRequest,
    options: VerifierOptions,
}

impl<'a> SourceVerifier<'a> {
    pub fn new(factory: &'a ClientFactory, request: VerificationRequest, options: VerifierOptions) -> Self {
        SourceVerifier {
            factory,
            request,
            options,
        }
    }

    fn source_id(&self) -> Result<&str> {
        self.request
            .contract_type
            .source_id
            .as_deref()
            .ok_or_else(|| EtherscanError::ContractVerification("Contract type has no source id.".to_string()))
    }

    fn source_path(&self) -> Result<PathBuf> {
        Ok(self.request.contracts_folder.join(self.source_id()?))
    }

    fn language(&self) -> Result<SourceLanguage> {
        let path = self.source_path()?;
        detect_language(&path).ok_or_else(|| {
            EtherscanError::ContractVerification(format!(
                "Unsupported source type '{}'.",
                path.display()
            ))
        })
    }

    /// The compiler that built the contract; the newest one if several did.
    pub fn compiler(&self) -> Result<(&Compiler, Version)> {
        let name = self.request.contract_type.name();
        let used: Vec<&Compiler> = self
            .request
            .compilers
            .iter()
            .filter(|c| c.contract_types.iter().any(|ct| ct == name))
            .collect();

        if used.is_empty() {
            return Err(EtherscanError::ContractVerification(
                "Compiler data missing from project manifest.".to_string(),
            ));
        }
        if used.len() > 1 {
            warn!("Source was compiled by multiple versions. Using max.");
        }

        let mut best: Option<(&Compiler, Version)> = None;
        for compiler in used {
            let version = parse_compiler_version(&compiler.version)?;
            if best.as_ref().map_or(true, |(_, v)| version > *v) {
                best = Some((compiler, version));
            }
        }
        best.ok_or_else(|| EtherscanError::ContractVerification("Unable to find compiler version used.".to_string()))
    }

    /// The license type declared by the contract's source header.
    pub fn license_code(&self) -> Result<LicenseType> {
        license_from_file(&self.source_path()?)
    }

    /// Constructor arguments, taken from the request or from the creation
    /// transaction. A fresh deployment can take a while to show up.
    pub async fn constructor_arguments(&self) -> Result<String> {
        if let Some(args) = &self.request.constructor_arguments {
            return Ok(strip_hex_prefix(args).to_string());
        }

        let bytecode = self.request.contract_type.deployment_hex().ok_or_else(|| {
            EtherscanError::ContractVerification(
                "Deployment bytecode missing; pass constructor arguments explicitly.".to_string(),
            )
        })?;

        let client = self.factory.get_account_client(&self.request.address);
        for _ in 0..self.options.max_deploy_checks.max(1) {
            let options = TransactionListOptions {
                offset: 1,
                ..TransactionListOptions::default()
            };
            let mut txns = Box::pin(client.get_all_normal_transactions(options));
            if let Some(tx) = txns.try_next().await? {
                let input = tx.get("input").and_then(Value::as_str).unwrap_or("");
                return Ok(extract_constructor_arguments(input, bytecode));
            }

            debug!("Waiting for deploy receipt in Etherscan...");
            tokio::time::sleep(self.options.deploy_poll_interval).await;
        }

        Err(EtherscanError::ContractVerification(format!(
            "Failed to find deploy receipt for '{}'",
            self.request.address
        )))
    }

    /// Gather sources and settings into the form the explorer expects.
    pub fn build_submission(&self, constructor_arguments: String) -> Result<VerificationSubmission> {
        let source_id = self.source_id()?;
        let language = self.language()?;
        let (compiler, version) = self.compiler()?;
        if let Some(built_with) = SourceLanguage::from_compiler_name(&compiler.name) {
            if built_with != language {
                return Err(EtherscanError::IncompatibleCompilerSettings(format!(
                    "'{}' is a {} source but the {} compiler built it.",
                    source_id, language, built_with
                )));
            }
        }
        let bundler = self.request.approach.bundler();
        let code_format = bundler.code_format(language)?;

        let settings = &compiler.settings;
        let optimizer = settings.get("optimizer");
        let optimization_used = optimizer
            .and_then(|o| o.get("enabled"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let optimization_runs = optimizer
            .and_then(|o| o.get("runs"))
            .and_then(Value::as_u64)
            .map(|r| r as u32)
            .unwrap_or(DEFAULT_OPTIMIZER_RUNS);
        let evm_version = settings
            .get("evmVersion")
            .and_then(Value::as_str)
            .map(str::to_string);

        let remappings: Vec<Remapping> = settings
            .get("remappings")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(Remapping::parse)
                    .collect()
            })
            .unwrap_or_default();
        let resolver = ImportResolver::new(&self.request.contracts_folder, language, remappings);
        let sources = resolver.collect(source_id)?;

        let source_code = bundler.bundle(&BundleInput {
            language,
            source_id,
            sources: &sources,
            settings,
        })?;

        // Standard JSON carries libraries inside its settings.
        let libraries = match self.request.approach {
            VerificationApproach::Flatten => linked_libraries(settings),
            VerificationApproach::StandardJson => Vec::new(),
        };

        Ok(VerificationSubmission {
            source_code,
            code_format: code_format.to_string(),
            contract_name: bundler.contract_name(source_id, self.request.contract_type.name()),
            compiler_version: explorer_compiler_version(language, &version)?,
            optimization_used,
            optimization_runs,
            constructor_arguments,
            evm_version,
            license_type: Some(self.license_code()?.code()),
            libraries,
        })
    }

    /// Submit the source and wait for the explorer's verdict.
    ///
    /// Returns the contract's explorer URL. Already-verified bytecode counts
    /// as success.
    pub async fn attempt_verification(&self) -> Result<String> {
        let constructor_arguments = self.constructor_arguments().await?;
        let submission = self.build_submission(constructor_arguments)?;
        let client = self.factory.get_contract_client(&self.request.address);

        let guid = match client.verify_source_code(&submission).await {
            Ok(guid) => guid,
            Err(EtherscanError::Response { message })
                if message.to_lowercase().contains("already verified") =>
            {
                return Ok(self.success_url());
            }
            Err(err) => return Err(err),
        };

        self.wait_for_verification(&client, &guid).await
    }

    async fn wait_for_verification(&self, client: &ContractClient, guid: &str) -> Result<String> {
        let mut guid_did_exist = false;

        for _ in 0..self.options.max_status_checks {
            let status = match client.check_verify_status(guid).await {
                Ok(status) => {
                    guid_did_exist = true;
                    status
                }
                // The GUID can disappear right before a passing result shows up.
                Err(err) if err.is_resource_not_found() && guid_did_exist => {
                    format!("{}Complete", PASS_KEY)
                }
                Err(err) => return Err(err),
            };

            if let Some(reason) = status.strip_prefix(FAIL_KEY) {
                return Err(EtherscanError::ContractVerification(reason.trim().to_string()));
            }
            if status == ALREADY_VERIFIED || status.starts_with(PASS_KEY) {
                return Ok(self.success_url());
            }

            info!("Contract verification status: {}", status);
            tokio::time::sleep(self.options.poll_interval).await;
        }

        Err(EtherscanError::ContractVerification(
            "Timed out waiting for contract verification.".to_string(),
        ))
    }

    fn success_url(&self) -> String {
        let url = format!("{}#code", self.factory.instance().address_url(&self.request.address));
        info!("Contract verification successful!\n{}", url);
        url
    }
}

/// Strip the deployment bytecode from a creation transaction's input.
pub fn extract_constructor_arguments(input: &str, deployment_bytecode: &str) -> String {
    let input = strip_hex_prefix(input);
    let bytecode = strip_hex_prefix(deployment_bytecode);
    input.get(bytecode.len()..).unwrap_or("").to_string()
}

fn parse_compiler_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim().trim_start_matches('v');
    Version::parse(trimmed).map_err(|e| {
        EtherscanError::IncompatibleCompilerSettings(format!("Invalid compiler version '{}': {}", raw, e))
    })
}

/// Version string in the explorer's notation.
fn explorer_compiler_version(language: SourceLanguage, version: &Version) -> Result<String> {
    match language {
        SourceLanguage::Solidity => {
            // solc builds are identified by their commit.
            if version.build.is_empty() {
                return Err(EtherscanError::IncompatibleCompilerSettings(format!(
                    "Compiler version '{}' lacks a commit hash (e.g. '{}+commit.a1b79de6').",
                    version, version
                )));
            }
            Ok(format!("v{}", version))
        }
        SourceLanguage::Vyper => Ok(format!(
            "vyper:{}.{}.{}",
            version.major, version.minor, version.patch
        )),
    }
}

/// `(name, address)` pairs from solc's `settings.libraries`.
fn linked_libraries(settings: &Value) -> Vec<(String, String)> {
    let Some(by_source) = settings.get("libraries").and_then(Value::as_object) else {
        return Vec::new();
    };

    by_source
        .values()
        .filter_map(Value::as_object)
        .flat_map(|libs| {
            libs.iter()
                .filter_map(|(name, address)| address.as_str().map(|a| (name.clone(), a.to_string())))
        })
        .collect()
}
