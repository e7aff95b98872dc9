//! Async HTTP clients for the Etherscan REST API.
//!
//! A [`ClientFactory`] owns the HTTP connection pool and the request throttle
//! for one explorer instance; the per-module clients it hands out
//! ([`ContractClient`], [`AccountClient`]) share both.

pub mod account;
pub mod contract;
pub mod response;

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, Method, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub use account::AccountClient;
pub use contract::ContractClient;
pub use response::EtherscanResponse;

use crate::config::EcosystemConfig;
use crate::error::{EtherscanError, Result};
use crate::networks::{self, EtherscanInstance};

const USER_AGENT: &str = concat!("etherscan-plugin/", env!("CARGO_PKG_VERSION"));

/// Request ordering and retry knobs for one explorer.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Requests per second.
    pub rate_limit: u32,
    pub retries: u32,
    /// First backoff delay after a throttled response; doubles per attempt.
    pub backoff: Duration,
    pub timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        ClientSettings {
            rate_limit: 5,
            retries: 5,
            backoff: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&EcosystemConfig> for ClientSettings {
    fn from(config: &EcosystemConfig) -> Self {
        ClientSettings {
            rate_limit: config.rate_limit,
            retries: config.retries,
            ..ClientSettings::default()
        }
    }
}

#[derive(Debug)]
struct Shared {
    http: Client,
    instance: EtherscanInstance,
    settings: ClientSettings,
    api_key: Option<String>,
    last_request: Mutex<Option<Instant>>,
}

#[derive(Debug, Clone)]
pub struct ClientFactory {
    shared: Arc<Shared>,
}

impl ClientFactory {
    pub fn new(instance: EtherscanInstance, settings: ClientSettings) -> Result<Self> {
        let api_key = networks::api_key(&instance.ecosystem);
        Self::with_api_key(instance, settings, api_key)
    }

    pub fn with_api_key(
        instance: EtherscanInstance,
        settings: ClientSettings,
        api_key: Option<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(ClientFactory {
            shared: Arc::new(Shared {
                http,
                instance,
                settings,
                api_key,
                last_request: Mutex::new(None),
            }),
        })
    }

    pub fn instance(&self) -> &EtherscanInstance {
        &self.shared.instance
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.shared.settings
    }

    pub fn get_contract_client(&self, address: &str) -> ContractClient {
        ContractClient::new(self.api_client("contract"), address)
    }

    pub fn get_account_client(&self, address: &str) -> AccountClient {
        AccountClient::new(self.api_client("account"), address)
    }

    fn api_client(&self, module: &'static str) -> ApiClient {
        ApiClient {
            shared: Arc::clone(&self.shared),
            module,
        }
    }
}

/// Module-scoped request helper shared by the concrete clients.
#[derive(Debug, Clone)]
pub(crate) struct ApiClient {
    shared: Arc<Shared>,
    module: &'static str,
}

impl ApiClient {
    pub(crate) fn base_uri(&self) -> &str {
        &self.shared.instance.api_uri
    }

    pub(crate) fn retries(&self) -> u32 {
        self.shared.settings.retries
    }

    pub(crate) async fn get(
        &self,
        params: Vec<(&str, String)>,
        raise_on_exceptions: bool,
    ) -> Result<EtherscanResponse> {
        self.request(Method::GET, params, raise_on_exceptions).await
    }

    pub(crate) async fn post(
        &self,
        data: Vec<(&str, String)>,
        raise_on_exceptions: bool,
    ) -> Result<EtherscanResponse> {
        self.request(Method::POST, data, raise_on_exceptions).await
    }

    async fn request(
        &self,
        method: Method,
        params: Vec<(&str, String)>,
        raise_on_exceptions: bool,
    ) -> Result<EtherscanResponse> {
        let mut fields: Vec<(&str, String)> = Vec::with_capacity(params.len() + 2);
        fields.push(("module", self.module.to_string()));
        fields.extend(params);

        let is_get = method == Method::GET;
        if let Some(key) = &self.shared.api_key {
            // The API spells the key differently for query and form payloads.
            fields.push((if is_get { "apikey" } else { "apiKey" }, key.clone()));
        }

        let ecosystem = &self.shared.instance.ecosystem;
        let attempts = self.retries().saturating_add(1);
        for attempt in 0..attempts {
            self.throttle().await;

            let builder = self.shared.http.request(method.clone(), self.base_uri());
            let builder = if is_get {
                builder.query(&fields)
            } else {
                builder.form(&fields)
            };

            debug!(module = self.module, %method, attempt, "explorer request");
            let response = builder.send().await?;
            let status = response.status();
            let text = response.text().await?;

            if status == StatusCode::TOO_MANY_REQUESTS
                || text.to_lowercase().contains("max rate limit reached")
            {
                let delay = self.shared.settings.backoff * 2u32.saturating_pow(attempt);
                warn!(
                    "Rate limited by {} explorer, retrying in {:?} ({}/{})",
                    ecosystem,
                    delay,
                    attempt + 1,
                    attempts
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Ok(EtherscanResponse::new(
                status.as_u16(),
                text,
                ecosystem,
                raise_on_exceptions,
                self.shared.api_key.is_some(),
            ));
        }

        Err(EtherscanError::too_many_requests(
            networks::api_key_env(ecosystem),
            self.shared.api_key.is_some(),
        ))
    }

    /// Hold requests back so at most `rate_limit` leave per second.
    async fn throttle(&self) {
        let rate_limit = self.shared.settings.rate_limit.max(1);
        let min_gap = Duration::from_secs_f64(1.0 / f64::from(rate_limit));

        let mut last = self.shared.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < min_gap {
                tokio::time::sleep(min_gap - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Factory pointed at a mock server, with fast retries and no API key.
    pub(crate) fn factory(api_uri: &str) -> ClientFactory {
        let instance = EtherscanInstance {
            ecosystem: "ethereum".to_string(),
            network: "mainnet".to_string(),
            chain_id: Some(1),
            uri: "https://etherscan.io".to_string(),
            api_uri: api_uri.to_string(),
        };
        let settings = ClientSettings {
            rate_limit: 1000,
            retries: 3,
            backoff: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        };
        ClientFactory::with_api_key(instance, settings, None).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::factory;
    use super::*;
    use crate::config::parse_config;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_clients_use_configured_api_uri() {
        let cfg = parse_config(
            r#"
[ethereum.monkechain]
uri = "https://monke.chain/"
api_uri = "https://api.monke.chain/api"
"#,
        )
        .unwrap();
        let instance = EtherscanInstance::resolve(&cfg, "ethereum", "monkechain").unwrap();
        let factory = ClientFactory::new(instance, ClientSettings::from(&cfg.ecosystem("ethereum"))).unwrap();

        let account = factory.get_account_client("0xabc");
        assert_eq!(account.base_uri(), "https://api.monke.chain/api");
        assert_eq!(account.retries(), 5);
        let contract = factory.get_contract_client("0xabc");
        assert_eq!(contract.base_uri(), "https://api.monke.chain/api");
    }

    #[test]
    fn test_settings_from_config() {
        let cfg = parse_config("[ethereum]\nretries = 321\nrate_limit = 7\n").unwrap();
        let settings = ClientSettings::from(&cfg.ecosystem("ethereum"));
        assert_eq!(settings.retries, 321);
        assert_eq!(settings.rate_limit, 7);
    }

    #[tokio::test]
    async fn test_retries_throttled_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("module", "contract"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"1","result":"ok"}"#))
            .mount(&server)
            .await;

        let client = factory(&format!("{}/api", server.uri())).api_client("contract");
        let resp = client.get(vec![("action", "ping".to_string())], true).await.unwrap();
        assert_eq!(resp.string().unwrap(), "ok");
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"status":"0","message":"NOTOK","result":"Max rate limit reached"}"#),
            )
            .mount(&server)
            .await;

        let client = factory(&server.uri()).api_client("account");
        let err = client.get(vec![], true).await.unwrap_err();
        assert!(matches!(err, EtherscanError::TooManyRequests { .. }));
        assert!(err.to_string().contains("ETHERSCAN_API_KEY"));
        // First attempt plus three retries.
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_post_sends_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(wiremock::matchers::body_string_contains("module=contract"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"1","result":"guid"}"#))
            .mount(&server)
            .await;

        let client = factory(&server.uri()).api_client("contract");
        let resp = client
            .post(vec![("action", "verifysourcecode".to_string())], true)
            .await
            .unwrap();
        assert_eq!(resp.string().unwrap(), "guid");
    }

    fn keyed_client(api_uri: &str, module: &'static str) -> ApiClient {
        let unkeyed = factory(api_uri);
        ClientFactory::with_api_key(
            unkeyed.instance().clone(),
            unkeyed.settings().clone(),
            Some("secret".to_string()),
        )
        .unwrap()
        .api_client(module)
    }

    #[tokio::test]
    async fn test_get_sends_lowercase_apikey() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("apikey", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"1","result":"ok"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = keyed_client(&server.uri(), "contract");
        let resp = client.get(vec![("action", "getabi".to_string())], true).await.unwrap();
        assert_eq!(resp.string().unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_post_sends_camel_case_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(wiremock::matchers::body_string_contains("apiKey=secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"1","result":"guid"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = keyed_client(&server.uri(), "contract");
        let resp = client
            .post(vec![("action", "verifysourcecode".to_string())], true)
            .await
            .unwrap();
        assert_eq!(resp.string().unwrap(), "guid");

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(!body.contains("apikey="));
    }
}
