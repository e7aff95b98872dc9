use serde_json::Value;
use tracing::debug;

use super::ApiClient;
use crate::error::{EtherscanError, Result};
use crate::models::{ContractCreation, SourceCodeResponse};

/// Form fields of a `verifysourcecode` submission.
#[derive(Debug, Clone, Default)]
pub struct VerificationSubmission {
    pub source_code: String,
    pub code_format: String,
    pub contract_name: String,
    pub compiler_version: String,
    pub optimization_used: bool,
    pub optimization_runs: u32,
    pub constructor_arguments: String,
    pub evm_version: Option<String>,
    pub license_type: Option<u8>,
    /// `(name, address)` pairs for linked libraries.
    pub libraries: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ContractClient {
    api: ApiClient,
    address: String,
}

impl ContractClient {
    pub(crate) fn new(api: ApiClient, address: &str) -> Self {
        ContractClient {
            api,
            address: address.to_string(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn base_uri(&self) -> &str {
        self.api.base_uri()
    }

    /// Fetch the verified source, or `None` when the explorer returns no single entry.
    pub async fn get_source_code(&self) -> Result<Option<SourceCodeResponse>> {
        let params = vec![
            ("action", "getsourcecode".to_string()),
            ("address", self.address.clone()),
        ];
        let mut items = self.api.get(params, true).await?.list()?;
        if items.len() != 1 {
            return Ok(None);
        }

        Ok(Some(serde_json::from_value(items.remove(0))?))
    }

    pub async fn get_creation_data(&self) -> Result<Vec<ContractCreation>> {
        let params = vec![
            ("action", "getcontractcreation".to_string()),
            ("contractaddresses", self.address.clone()),
        ];
        let items = self.api.get(params, true).await?.list()?;
        items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(EtherscanError::from))
            .collect()
    }

    /// Submit source for verification and return the GUID to poll.
    pub async fn verify_source_code(&self, submission: &VerificationSubmission) -> Result<String> {
        let library_fields = library_field_names(submission.libraries.len());
        let mut data = vec![
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", self.address.clone()),
            ("sourceCode", submission.source_code.clone()),
            ("codeformat", submission.code_format.clone()),
            ("contractname", submission.contract_name.clone()),
            ("compilerversion", submission.compiler_version.clone()),
            (
                "optimizationUsed",
                if submission.optimization_used { "1" } else { "0" }.to_string(),
            ),
            ("runs", submission.optimization_runs.to_string()),
            // Misspelling is part of the API.
            ("constructorArguements", submission.constructor_arguments.clone()),
            ("evmversion", submission.evm_version.clone().unwrap_or_default()),
        ];
        if let Some(code) = submission.license_type {
            data.push(("licenseType", code.to_string()));
        }

        for ((name_key, address_key), (name, address)) in
            library_fields.iter().zip(&submission.libraries)
        {
            data.push((name_key.as_str(), name.clone()));
            data.push((address_key.as_str(), address.clone()));
        }

        debug!(contract = %submission.contract_name, format = %submission.code_format, "submitting verification");
        self.api.post(data, true).await?.string()
    }

    /// Current verification status text for `guid`. Failures come back as text too.
    pub async fn check_verify_status(&self, guid: &str) -> Result<String> {
        let params = vec![
            ("action", "checkverifystatus".to_string()),
            ("guid", guid.to_string()),
        ];
        match self.api.get(params, false).await?.value()? {
            Value::String(text) => Ok(text),
            other => Ok(other.to_string()),
        }
    }
}

/// Explorers accept at most ten linked libraries.
fn library_field_names(count: usize) -> Vec<(String, String)> {
    (1..=count.min(10))
        .map(|i| (format!("libraryname{}", i), format!("libraryaddress{}", i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::factory;
    use wiremock::matchers::{body_string_contains, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const ADDRESS: &str = "0x388C818CA8B9251b393131C08a736A67ccB19297";

    #[tokio::test]
    async fn test_get_source_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("module", "contract"))
            .and(query_param("action", "getsourcecode"))
            .and(query_param("address", ADDRESS))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "1",
                "message": "OK",
                "result": [{"SourceCode": "contract A {}", "ABI": "[]", "ContractName": "A"}]
            })))
            .mount(&server)
            .await;

        let client = factory(&server.uri()).get_contract_client(ADDRESS);
        let source = client.get_source_code().await.unwrap().unwrap();
        assert_eq!(source.contract_name, "A");
        assert!(source.is_verified());
    }

    #[tokio::test]
    async fn test_get_creation_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "getcontractcreation"))
            .and(query_param("contractaddresses", ADDRESS))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "1",
                "result": [{
                    "contractAddress": ADDRESS,
                    "contractCreator": "0xdb65702a9b26f8a643a31a4c84b9392589e03d7c",
                    "txHash": "0xd72cf25e4a5fe3677b6f9b2ae13771e02ad66f8d2419f333bb8bde3147bd4294"
                }]
            })))
            .mount(&server)
            .await;

        let client = factory(&server.uri()).get_contract_client(ADDRESS);
        let creation = client.get_creation_data().await.unwrap();
        assert_eq!(creation.len(), 1);
        assert_eq!(creation[0].contract_creator, "0xdb65702a9b26f8a643a31a4c84b9392589e03d7c");
    }

    #[tokio::test]
    async fn test_verify_source_code_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("action=verifysourcecode"))
            .and(body_string_contains("codeformat=solidity-standard-json-input"))
            .and(body_string_contains("constructorArguements=2a"))
            .and(body_string_contains("optimizationUsed=1"))
            .and(body_string_contains("licenseType=13"))
            .and(body_string_contains("libraryname1=MyLib"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "1", "message": "OK", "result": "123"
            })))
            .mount(&server)
            .await;

        let submission = VerificationSubmission {
            source_code: "{}".into(),
            code_format: "solidity-standard-json-input".into(),
            contract_name: "foo.sol:foo".into(),
            compiler_version: "v0.8.20+commit.a1b79de6".into(),
            optimization_used: true,
            optimization_runs: 200,
            constructor_arguments: "2a".into(),
            evm_version: None,
            license_type: Some(13),
            libraries: vec![("MyLib".into(), "0x0000000000000000000000000000000000000001".into())],
        };
        let client = factory(&server.uri()).get_contract_client(ADDRESS);
        assert_eq!(client.verify_source_code(&submission).await.unwrap(), "123");
    }

    #[tokio::test]
    async fn test_check_verify_status_does_not_raise() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "checkverifystatus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "0", "message": "NOTOK", "result": "Fail - Unable to verify"
            })))
            .mount(&server)
            .await;

        let client = factory(&server.uri()).get_contract_client(ADDRESS);
        let status = client.check_verify_status("123").await.unwrap();
        assert_eq!(status, "Fail - Unable to verify");
    }

    #[test]
    fn test_library_fields_capped() {
        assert_eq!(library_field_names(12).len(), 10);
        assert_eq!(library_field_names(1)[0].0, "libraryname1");
    }
}
