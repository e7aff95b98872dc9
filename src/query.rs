use std::collections::HashMap;
use std::sync::Mutex;

use futures::TryStreamExt;
use serde_json::Value;
use tracing::debug;

use crate::client::account::TransactionListOptions;
use crate::client::ClientFactory;
use crate::error::{EtherscanError, Result};
use crate::models::{same_address, ContractCreation, Receipt};
use crate::networks;

/// A data request the explorer can answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Transactions sent by `account` with a nonce in `start_nonce..=stop_nonce`.
    AccountTransactions {
        account: String,
        start_nonce: u64,
        stop_nonce: u64,
    },
    ContractCreation { contract: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Receipts(Vec<Receipt>),
    ContractCreation(Option<ContractCreation>),
}

pub struct EtherscanQueryEngine {
    factory: ClientFactory,
    /// Receipts seen while querying other accounts, keyed by lowercased sender.
    history: Mutex<HashMap<String, Vec<Receipt>>>,
}

impl EtherscanQueryEngine {
    pub fn new(factory: ClientFactory) -> Self {
        EtherscanQueryEngine {
            factory,
            history: Mutex::new(HashMap::new()),
        }
    }

    fn is_supported(&self) -> bool {
        let instance = self.factory.instance();
        networks::is_supported(&instance.ecosystem, &instance.network)
    }

    /// Expected run time of `query` in milliseconds, or `None` when the
    /// network has no known explorer.
    pub fn estimate(&self, query: &Query) -> Option<u64> {
        if !self.is_supported() {
            return None;
        }

        match query {
            Query::AccountTransactions {
                start_nonce,
                stop_nonce,
                ..
            } => {
                let span = stop_nonce.saturating_sub(*start_nonce);
                // About 15 ms per page of 100 transactions.
                if span <= 100 {
                    return Some(15);
                }
                let rate_limit = u64::from(self.factory.settings().rate_limit.max(1));
                Some((10_000 / rate_limit).saturating_mul(span.saturating_add(1)) / 100)
            }
            Query::ContractCreation { .. } => Some(300),
        }
    }

    pub async fn perform(&self, query: &Query) -> Result<QueryResult> {
        match query {
            Query::AccountTransactions {
                account,
                start_nonce,
                stop_nonce,
            } => Ok(QueryResult::Receipts(
                self.account_transactions(account, *start_nonce, *stop_nonce)
                    .await?,
            )),
            Query::ContractCreation { contract } => Ok(QueryResult::ContractCreation(
                self.contract_creation(contract).await?,
            )),
        }
    }

    pub async fn account_transactions(
        &self,
        account: &str,
        start_nonce: u64,
        stop_nonce: u64,
    ) -> Result<Vec<Receipt>> {
        let client = self.factory.get_account_client(account);
        let chain_id = self.factory.instance().chain_id;
        let mut txns = Box::pin(client.get_all_normal_transactions(TransactionListOptions::default()));

        let mut receipts = Vec::new();
        while let Some(data) = txns.try_next().await? {
            let receipt = normalize_receipt(&data, chain_id)?;

            if !same_address(&receipt.sender, account) {
                // Likely `account` is a contract; keep the receipt for its sender.
                self.remember(receipt);
            } else if receipt
                .nonce
                .map_or(false, |n| (start_nonce..=stop_nonce).contains(&n))
            {
                receipts.push(receipt);
            }
        }
        Ok(receipts)
    }

    pub async fn contract_creation(&self, contract: &str) -> Result<Option<ContractCreation>> {
        let mut creation = self
            .factory
            .get_contract_client(contract)
            .get_creation_data()
            .await?;
        match creation.len() {
            0 => Ok(None),
            1 => Ok(creation.pop()),
            n => Err(EtherscanError::UnhandledResultType(format!(
                "Expecting single creation data, got {}",
                n
            ))),
        }
    }

    /// Receipts cached for `sender` by earlier account queries.
    pub fn history(&self, sender: &str) -> Vec<Receipt> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&sender.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    fn remember(&self, receipt: Receipt) {
        debug!(sender = %receipt.sender, hash = %receipt.txn_hash, "caching receipt for other sender");
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(receipt.sender.to_lowercase())
            .or_default()
            .push(receipt);
    }
}

/// Convert a `txlist` item into a [`Receipt`].
///
/// Every field arrives as a string; an empty `txreceipt_status` means `0`
/// and an empty nonce means unknown.
pub fn normalize_receipt(data: &Value, chain_id: Option<u64>) -> Result<Receipt> {
    let text = |key: &str| data.get(key).and_then(Value::as_str).unwrap_or("").trim();
    let number = |key: &str| text(key).parse::<u64>().ok();
    let optional = |key: &str| Some(text(key).to_string()).filter(|s| !s.is_empty());

    let txn_hash = optional("hash").ok_or_else(|| {
        EtherscanError::UnhandledResultType(format!("transaction without hash: {}", data))
    })?;

    Ok(Receipt {
        txn_hash,
        block_number: number("blockNumber").unwrap_or(0),
        sender: text("from").to_string(),
        receiver: optional("to"),
        nonce: number("nonce"),
        value: optional("value").unwrap_or_else(|| "0".to_string()),
        gas_used: number("gasUsed").unwrap_or(0),
        status: text("txreceipt_status").parse().unwrap_or(0),
        required_confirmations: number("confirmations").unwrap_or(0),
        contract_address: optional("contractAddress"),
        input: optional("input").unwrap_or_else(|| "0x".to_string()),
        chain_id,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::test_support::factory;
    use crate::client::ClientSettings;
    use crate::networks::EtherscanInstance;

    const ACCOUNT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    const OTHER: &str = "0x388c818ca8b9251b393131c08a736a67ccb19297";

    fn tx(from: &str, nonce: &str, status: &str) -> Value {
        json!({
            "hash": format!("0x{:0>64}", nonce),
            "blockNumber": "12",
            "from": from,
            "to": "",
            "nonce": nonce,
            "value": "0",
            "gasUsed": "21000",
            "txreceipt_status": status,
            "confirmations": "7",
            "contractAddress": "",
            "input": "0x"
        })
    }

    #[test]
    fn test_normalize_receipt() {
        let receipt = normalize_receipt(&tx(ACCOUNT, "", ""), Some(1)).unwrap();
        assert_eq!(receipt.status, 0);
        assert_eq!(receipt.nonce, None);
        assert_eq!(receipt.required_confirmations, 7);
        assert_eq!(receipt.receiver, None);
        assert_eq!(receipt.chain_id, Some(1));

        let receipt = normalize_receipt(&tx(ACCOUNT, "3", "1"), None).unwrap();
        assert_eq!(receipt.status, 1);
        assert_eq!(receipt.nonce, Some(3));
    }

    #[test]
    fn test_estimates() {
        let engine = EtherscanQueryEngine::new(factory("http://localhost"));
        let small = Query::AccountTransactions {
            account: ACCOUNT.into(),
            start_nonce: 0,
            stop_nonce: 50,
        };
        assert_eq!(engine.estimate(&small), Some(15));

        // factory() runs at 1000 requests per second.
        let large = Query::AccountTransactions {
            account: ACCOUNT.into(),
            start_nonce: 0,
            stop_nonce: 999,
        };
        assert_eq!(engine.estimate(&large), Some(10 * 1000 / 100));
        assert_eq!(
            engine.estimate(&Query::ContractCreation { contract: ACCOUNT.into() }),
            Some(300)
        );
    }

    #[test]
    fn test_estimate_saturates_on_huge_ranges() {
        let engine = EtherscanQueryEngine::new(factory("http://localhost"));
        for stop_nonce in [u64::MAX, 1 << 62] {
            let query = Query::AccountTransactions {
                account: ACCOUNT.into(),
                start_nonce: 0,
                stop_nonce,
            };
            let estimate = engine.estimate(&query).unwrap();
            assert!(estimate > 15);
        }
        let whole_range = Query::AccountTransactions {
            account: ACCOUNT.into(),
            start_nonce: 0,
            stop_nonce: u64::MAX,
        };
        assert_eq!(engine.estimate(&whole_range), Some(u64::MAX / 100));
    }

    #[test]
    fn test_unsupported_network_has_no_estimate() {
        let instance = EtherscanInstance {
            ecosystem: "ethereum".into(),
            network: "monkechain".into(),
            chain_id: None,
            uri: "https://monke.chain".into(),
            api_uri: "https://api.monke.chain/api".into(),
        };
        let factory = ClientFactory::with_api_key(instance, ClientSettings::default(), None).unwrap();
        let engine = EtherscanQueryEngine::new(factory);
        assert_eq!(
            engine.estimate(&Query::ContractCreation { contract: ACCOUNT.into() }),
            None
        );
    }

    #[tokio::test]
    async fn test_account_transactions_filters_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "txlist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "1",
                "result": [
                    tx(ACCOUNT, "0", "1"),
                    tx(&ACCOUNT.to_lowercase(), "1", "1"),
                    tx(ACCOUNT, "5", ""),
                    tx(OTHER, "9", "1"),
                ]
            })))
            .mount(&server)
            .await;

        let engine = EtherscanQueryEngine::new(factory(&server.uri()));
        let result = engine
            .perform(&Query::AccountTransactions {
                account: ACCOUNT.into(),
                start_nonce: 0,
                stop_nonce: 2,
            })
            .await
            .unwrap();

        let QueryResult::Receipts(receipts) = result else {
            panic!("expected receipts");
        };
        let nonces: Vec<_> = receipts.iter().map(|r| r.nonce).collect();
        assert_eq!(nonces, vec![Some(0), Some(1)]);
        assert_eq!(engine.history(OTHER).len(), 1);
        assert!(engine.history(ACCOUNT).is_empty());
    }

    #[tokio::test]
    async fn test_contract_creation() {
        let server = MockServer::start().await;
        let creation = json!({
            "contractAddress": ACCOUNT,
            "contractCreator": OTHER,
            "txHash": "0xd72cf25e4a5fe3677b6f9b2ae13771e02ad66f8d2419f333bb8bde3147bd4294"
        });
        Mock::given(method("GET"))
            .and(query_param("action", "getcontractcreation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "1", "result": [creation.clone(), creation]
            })))
            .mount(&server)
            .await;

        let engine = EtherscanQueryEngine::new(factory(&server.uri()));
        assert!(engine.contract_creation(ACCOUNT).await.is_err());
    }

    #[tokio::test]
    async fn test_contract_creation_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "0", "message": "No data found", "result": null
            })))
            .mount(&server)
            .await;

        let engine = EtherscanQueryEngine::new(factory(&server.uri()));
        assert_eq!(engine.contract_creation(ACCOUNT).await.unwrap(), None);
    }
}
