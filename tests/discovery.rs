use escrow_dapp::{
    AlchemyIndexer, ContractDetails, ContractDiscovery, ContractRecord, ContractStore,
    HttpChainClient, JsonRpcTransport, MemoryStorage,
};
use ethabi::Token;
use ethers_core::types::{Address, H256, U256};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::{num::NonZeroUsize, str::FromStr, sync::Arc, time::Duration};
use url::Url;
use wiremock::{
    matchers::{body_partial_json, method},
    Mock, MockServer, ResponseTemplate,
};

const USER: &str = "0x00000000000000000000000000000000000000aa";
const CACHED_DEAL: &str = "0x00000000000000000000000000000000000000d1";
const STALE_DEAL: &str = "0x00000000000000000000000000000000000000d2";
const CREATED_ACP: &str = "0x00000000000000000000000000000000000000a1";
const CREATION_TX: &str = "0x00000000000000000000000000000000000000000000000000000000000000c1";

fn address(value: &str) -> Address {
    Address::from_str(value).unwrap()
}

fn transport(server: &MockServer) -> JsonRpcTransport {
    JsonRpcTransport::new(
        Url::parse(&server.uri()).unwrap(),
        Duration::from_secs(5),
        NonZeroUsize::new(1).unwrap(),
    )
    .unwrap()
}

async fn mount_result(server: &MockServer, body: Value, result: Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(body))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": result})),
        )
        .mount(server)
        .await;
}

/// Answers `eth_call` of `signature` on `to` with the abi encoded `output`.
async fn mount_view(server: &MockServer, to: &str, signature: &str, output: Token) {
    let selector = format!("0x{}", hex::encode(ethers_core::utils::id(signature)));
    let encoded = format!("0x{}", hex::encode(ethabi::encode(&[output])));
    mount_result(
        server,
        json!({"method": "eth_call", "params": [{"to": to, "data": selector}]}),
        json!(encoded),
    )
    .await;
}

async fn mount_deal(server: &MockServer, deal: &str, parties: [&str; 3], limitation_date: u64) {
    let [buyer, seller, evaluator] = parties;
    mount_view(server, deal, "buyer()", Token::Address(address(buyer))).await;
    mount_view(server, deal, "seller()", Token::Address(address(seller))).await;
    mount_view(server, deal, "evaluatorAddress()", Token::Address(address(evaluator))).await;
    mount_view(
        server,
        deal,
        "limitationDate()",
        Token::Uint(U256::from(limitation_date)),
    )
    .await;
}

fn cached_record(deal: &str) -> ContractRecord {
    serde_json::from_value(json!({
        "address": deal,
        "type": "simple",
        "deployedAt": "2025-06-21T17:32:49Z",
        "transactionHash": "0x00000000000000000000000000000000000000000000000000000000000000b1",
        "buyer": USER,
        "seller": "0x0000000000000000000000000000000000000002",
        "evaluatorAddress": "0x0000000000000000000000000000000000000003",
        "limitationDate": "1750541569"
    }))
    .unwrap()
}

fn transfer(hash: &str, to: Option<&str>, block: &str) -> Value {
    json!({
        "blockNum": block,
        "hash": hash,
        "from": USER,
        "to": to,
        "value": 0.0,
        "asset": "ETH",
        "category": "external",
        "metadata": {"blockTimestamp": "2025-06-22T08:00:00.000Z"}
    })
}

#[tokio::test]
async fn discovery_reconciles_cache_with_chain_and_indexer() {
    let chain_server = MockServer::start().await;
    let indexer_server = MockServer::start().await;

    mount_deal(
        &chain_server,
        CACHED_DEAL,
        [USER, "0x0000000000000000000000000000000000000002", "0x0000000000000000000000000000000000000004"],
        1760000000,
    )
    .await;
    mount_view(&chain_server, CREATED_ACP, "platformFee()", Token::Uint(U256::from(250u64))).await;
    mount_result(
        &chain_server,
        json!({"method": "eth_getTransactionReceipt", "params": [CREATION_TX]}),
        json!({
            "transactionHash": CREATION_TX,
            "transactionIndex": "0x0",
            "blockHash": H256::from_low_u64_be(0xbb),
            "blockNumber": "0x20",
            "from": USER,
            "to": null,
            "cumulativeGasUsed": "0x5208",
            "gasUsed": "0x5208",
            "contractAddress": CREATED_ACP,
            "logs": [],
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "status": "0x1",
        }),
    )
    .await;

    mount_result(
        &indexer_server,
        json!({"method": "alchemy_getAssetTransfers", "params": [{"fromAddress": USER}]}),
        json!({"transfers": [
            transfer(CREATION_TX, None, "0x20"),
            transfer(
                "0x00000000000000000000000000000000000000000000000000000000000000c2",
                Some(CACHED_DEAL),
                "0x21",
            ),
        ]}),
    )
    .await;
    mount_result(
        &indexer_server,
        json!({"method": "alchemy_getAssetTransfers", "params": [{"toAddress": USER}]}),
        json!({"transfers": [transfer(CREATION_TX, None, "0x20")]}),
    )
    .await;

    let store = Arc::new(ContractStore::new(Arc::new(MemoryStorage::default())));
    store
        .replace_all(&[cached_record(CACHED_DEAL), cached_record(STALE_DEAL)])
        .unwrap();

    let discovery = ContractDiscovery::new(store.clone())
        .with_chain(Arc::new(HttpChainClient::new(transport(&chain_server))))
        .with_indexer(Arc::new(AlchemyIndexer::new(
            transport(&indexer_server),
            100,
            NonZeroUsize::new(1).unwrap(),
        )));
    let records = discovery.discover(address(USER)).await;

    let mut refreshed = cached_record(CACHED_DEAL);
    refreshed.details = ContractDetails::Simple {
        buyer: address(USER),
        seller: address("0x0000000000000000000000000000000000000002"),
        evaluator_address: address("0x0000000000000000000000000000000000000004"),
        limitation_date: 1760000000,
    };
    let discovered: ContractRecord = serde_json::from_value(json!({
        "address": CREATED_ACP,
        "type": "acp",
        "deployedAt": "2025-06-22T08:00:00Z",
        "transactionHash": CREATION_TX,
        "platformFee": "250"
    }))
    .unwrap();
    assert_eq!(records, vec![refreshed, discovered]);

    // the stale deal is evicted, the discovered contract is not persisted
    assert_eq!(store.all(), vec![cached_record(CACHED_DEAL)]);
}

#[tokio::test]
async fn unreachable_indexer_keeps_validated_cache() {
    let chain_server = MockServer::start().await;
    let indexer_server = MockServer::start().await;
    mount_deal(
        &chain_server,
        CACHED_DEAL,
        [USER, "0x0000000000000000000000000000000000000002", "0x0000000000000000000000000000000000000003"],
        1750541569,
    )
    .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&indexer_server)
        .await;

    let store = Arc::new(ContractStore::new(Arc::new(MemoryStorage::default())));
    store.replace_all(&[cached_record(CACHED_DEAL)]).unwrap();

    let records = ContractDiscovery::new(store.clone())
        .with_chain(Arc::new(HttpChainClient::new(transport(&chain_server))))
        .with_indexer(Arc::new(AlchemyIndexer::new(
            transport(&indexer_server),
            100,
            NonZeroUsize::new(1).unwrap(),
        )))
        .discover(address(USER))
        .await;
    assert_eq!(records, vec![cached_record(CACHED_DEAL)]);
}

#[tokio::test]
async fn unreachable_chain_keeps_cache() {
    let indexer_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&indexer_server)
        .await;

    let store = Arc::new(ContractStore::new(Arc::new(MemoryStorage::default())));
    let cached = vec![cached_record(CACHED_DEAL), cached_record(STALE_DEAL)];
    store.replace_all(&cached).unwrap();

    // nothing listens on port 1
    let chain = HttpChainClient::new(
        JsonRpcTransport::new(
            Url::parse("http://127.0.0.1:1/").unwrap(),
            Duration::from_secs(5),
            NonZeroUsize::new(2).unwrap(),
        )
        .unwrap(),
    );
    let records = ContractDiscovery::new(store.clone())
        .with_chain(Arc::new(chain))
        .with_indexer(Arc::new(AlchemyIndexer::new(
            transport(&indexer_server),
            100,
            NonZeroUsize::new(1).unwrap(),
        )))
        .discover(address(USER))
        .await;
    assert_eq!(records, cached);
    assert_eq!(store.all(), cached);
}
