use super::{AssetTransfer, Direction, IndexerError, TransferIndexer};
use crate::rpc::JsonRpcTransport;
use async_trait::async_trait;
use ethers_core::types::{Address, U64};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssetTransfersParams<'a> {
    from_block: &'static str,
    to_block: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to_address: Option<Address>,
    category: [&'static str; 1],
    with_metadata: bool,
    exclude_zero_value: bool,
    max_count: U64,
    order: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetTransfersResult {
    #[serde(default)]
    transfers: Vec<AssetTransfer>,
    #[serde(default)]
    page_key: Option<String>,
}

/// Transfer history from the `alchemy_getAssetTransfers` endpoint.
pub struct AlchemyIndexer {
    transport: JsonRpcTransport,
    page_size: u64,
    max_pages: NonZeroUsize,
}

impl AlchemyIndexer {
    pub fn new(transport: JsonRpcTransport, page_size: u64, max_pages: NonZeroUsize) -> Self {
        Self {
            transport,
            page_size,
            max_pages,
        }
    }
}

#[async_trait]
impl TransferIndexer for AlchemyIndexer {
    async fn transfers(
        &self,
        address: Address,
        direction: Direction,
    ) -> Result<Vec<AssetTransfer>, IndexerError> {
        let (from_address, to_address) = match direction {
            Direction::From => (Some(address), None),
            Direction::To => (None, Some(address)),
        };

        let mut transfers = Vec::new();
        let mut page_key: Option<String> = None;
        for _ in 0..self.max_pages.get() {
            let params = AssetTransfersParams {
                from_block: "0x0",
                to_block: "latest",
                from_address,
                to_address,
                category: ["external"],
                with_metadata: true,
                exclude_zero_value: false,
                max_count: U64::from(self.page_size),
                order: "desc",
                page_key: page_key.as_deref(),
            };
            let page: AssetTransfersResult = self
                .transport
                .request("alchemy_getAssetTransfers", [params])
                .await
                .map_err(|source| IndexerError::Request { direction, source })?;
            transfers.extend(page.transfers);
            match page.page_key {
                Some(next) => page_key = Some(next),
                None => break,
            }
        }
        log::debug!(
            target: "indexer",
            "fetched {} transfers {} {:?}",
            transfers.len(),
            direction,
            address
        );
        Ok(transfers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::H256;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use url::Url;
    use wiremock::{
        matchers::{body_partial_json, method},
        Mock, MockServer, ResponseTemplate,
    };

    fn indexer(server: &MockServer, max_pages: usize) -> AlchemyIndexer {
        let transport = JsonRpcTransport::new(
            Url::parse(&server.uri()).unwrap(),
            Duration::from_secs(5),
            NonZeroUsize::new(1).unwrap(),
        )
        .unwrap();
        AlchemyIndexer::new(transport, 100, NonZeroUsize::new(max_pages).unwrap())
    }

    fn raw_transfer(hash: u64, block: u64) -> serde_json::Value {
        json!({
            "blockNum": U64::from(block),
            "hash": H256::from_low_u64_be(hash),
            "from": Address::from_low_u64_be(0x10),
            "to": null,
            "value": 0,
            "asset": "ETH",
            "category": "external",
            "metadata": {"blockTimestamp": "2025-06-21T17:32:49.000Z"}
        })
    }

    #[tokio::test]
    async fn sends_expected_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "alchemy_getAssetTransfers",
                "params": [{
                    "fromBlock": "0x0",
                    "toBlock": "latest",
                    "fromAddress": Address::from_low_u64_be(0x10),
                    "category": ["external"],
                    "withMetadata": true,
                    "excludeZeroValue": false,
                    "maxCount": "0x64",
                    "order": "desc"
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"transfers": [raw_transfer(1, 5)]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transfers = indexer(&server, 3)
            .transfers(Address::from_low_u64_be(0x10), Direction::From)
            .await
            .unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].hash, H256::from_low_u64_be(1));
    }

    #[tokio::test]
    async fn follows_page_keys_up_to_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"params": [{"pageKey": "second"}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 2,
                "result": {"transfers": [raw_transfer(2, 4)], "pageKey": "third"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"transfers": [raw_transfer(1, 5)], "pageKey": "second"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let hashes: Vec<_> = indexer(&server, 2)
            .transfers(Address::from_low_u64_be(0x10), Direction::To)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.hash)
            .collect();
        assert_eq!(
            hashes,
            vec![H256::from_low_u64_be(1), H256::from_low_u64_be(2)]
        );
    }

    #[tokio::test]
    async fn rpc_error_is_reported_with_direction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32602, "message": "invalid address"}
            })))
            .mount(&server)
            .await;

        let err = indexer(&server, 1)
            .transfers(Address::from_low_u64_be(0x10), Direction::To)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "transfer history request (to) failed: json-rpc error -32602: invalid address"
        );
    }
}
