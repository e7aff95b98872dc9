use futures::stream::{self, Stream, TryStreamExt};
use serde_json::Value;

use super::ApiClient;
use crate::error::{EtherscanError, Result};

#[derive(Debug, Clone)]
pub struct TransactionListOptions {
    pub start_block: Option<u64>,
    pub end_block: Option<u64>,
    /// Page size.
    pub offset: u32,
    /// `asc` or `desc`.
    pub sort: String,
}

impl Default for TransactionListOptions {
    fn default() -> Self {
        TransactionListOptions {
            start_block: None,
            end_block: None,
            offset: 100,
            sort: "asc".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccountClient {
    api: ApiClient,
    address: String,
}

impl AccountClient {
    pub(crate) fn new(api: ApiClient, address: &str) -> Self {
        AccountClient {
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

    pub fn retries(&self) -> u32 {
        self.api.retries()
    }

    /// Every normal transaction of the account, fetched page by page.
    ///
    /// Paging stops at the first page holding fewer than `offset` items.
    pub fn get_all_normal_transactions(
        &self,
        options: TransactionListOptions,
    ) -> impl Stream<Item = Result<Value>> + '_ {
        stream::try_unfold(Some(1u32), move |page| {
            let options = options.clone();
            async move {
                let page = match page {
                    Some(page) => page,
                    None => return Ok(None),
                };

                let items = self.get_normal_transactions_page(&options, page).await?;
                let next = if !items.is_empty() && items.len() as u32 >= options.offset {
                    Some(page + 1)
                } else {
                    None
                };
                let pages = stream::iter(items.into_iter().map(Ok::<Value, EtherscanError>));
                Ok::<_, EtherscanError>(Some((pages, next)))
            }
        })
        .try_flatten()
    }

    async fn get_normal_transactions_page(
        &self,
        options: &TransactionListOptions,
        page: u32,
    ) -> Result<Vec<Value>> {
        let mut params = vec![
            ("action", "txlist".to_string()),
            ("address", self.address.clone()),
            ("page", page.to_string()),
            ("offset", options.offset.to_string()),
            ("sort", options.sort.clone()),
        ];
        if let Some(start) = options.start_block {
            params.push(("startblock", start.to_string()));
        }
        if let Some(end) = options.end_block {
            params.push(("endblock", end.to_string()));
        }

        // An account without history answers with a NOTOK message and an empty list.
        self.api.get(params, false).await?.list()
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::test_support::factory;
    use super::*;

    const ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    async fn mount_page(server: &MockServer, page: u32, result: Value) {
        Mock::given(method("GET"))
            .and(query_param("module", "account"))
            .and(query_param("action", "txlist"))
            .and(query_param("address", ADDRESS))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": result })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_get_all_normal_transactions_pages() {
        let server = MockServer::start().await;
        mount_page(&server, 1, json!([{"page": 1}])).await;
        mount_page(&server, 2, json!([{"page": 2}])).await;
        mount_page(&server, 3, json!([])).await;

        let factory = factory(&server.uri());
        let client = factory.get_account_client(ADDRESS);
        let options = TransactionListOptions {
            start_block: Some(6),
            end_block: Some(8),
            offset: 1,
            sort: "desc".to_string(),
        };
        let actual: Vec<Value> = client
            .get_all_normal_transactions(options)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(actual, vec![json!({"page": 1}), json!({"page": 2})]);
    }

    #[tokio::test]
    async fn test_short_page_stops_paging() {
        let server = MockServer::start().await;
        mount_page(&server, 1, json!([{"n": 1}, {"n": 2}])).await;

        let factory = factory(&server.uri());
        let client = factory.get_account_client(ADDRESS);
        let actual: Vec<Value> = client
            .get_all_normal_transactions(TransactionListOptions::default())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(actual.len(), 2);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_transactions_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "0", "message": "No transactions found", "result": []
            })))
            .mount(&server)
            .await;

        let factory = factory(&server.uri());
        let client = factory.get_account_client(ADDRESS);
        let actual: Vec<Value> = client
            .get_all_normal_transactions(TransactionListOptions::default())
            .try_collect()
            .await
            .unwrap();
        assert!(actual.is_empty());
    }
}
