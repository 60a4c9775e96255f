//! Reconciles the local contract cache with what the chain and the transfer
//! indexer know about a user.

use crate::{
    chain::{block_timestamp, ChainClient, ChainError},
    contract::CallError,
    indexer::{self, AssetTransfer, TransferIndexer},
    probe,
    storage::ContractStore,
    types::ContractRecord,
};
use ethers_core::types::{Address, H256};
use std::{collections::HashSet, sync::Arc};
use thiserror::Error;

#[derive(Error, Debug)]
enum CandidateError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("receipt not found")]
    NoReceipt,
    #[error("receipt has no contract address")]
    NoContractAddress,
    #[error("contract {0:?} matches no known interface")]
    Unrecognized(Address),
    #[error("creation time is unknown")]
    NoTimestamp,
}

pub struct ContractDiscovery {
    store: Arc<ContractStore>,
    chain: Option<Arc<dyn ChainClient>>,
    indexer: Option<Arc<dyn TransferIndexer>>,
}

impl ContractDiscovery {
    pub fn new(store: Arc<ContractStore>) -> Self {
        Self {
            store,
            chain: None,
            indexer: None,
        }
    }

    pub fn with_chain(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_indexer(mut self, indexer: Arc<dyn TransferIndexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    /// Returns the cached contracts still valid on chain together with the
    /// contracts created by `user`, without repeated addresses.
    ///
    /// Never fails: unreachable services degrade the result to what is known
    /// locally. Cached contracts which no longer answer to any known interface
    /// are evicted from the cache, duplicated cache entries are dropped.
    pub async fn discover(&self, user: Address) -> Vec<ContractRecord> {
        let cached = self.store.all();
        let chain = match &self.chain {
            Some(chain) => chain.as_ref(),
            None => {
                log::debug!(target: "discovery", "no chain client, returning {} cached contracts", cached.len());
                return cached;
            }
        };

        let mut records = match self.validate_cache(chain, &cached).await {
            Ok(records) => records,
            Err(err) => {
                log::warn!(target: "discovery", "chain is unreachable, returning {} cached contracts: {}", cached.len(), err);
                return cached;
            }
        };

        let indexer = match &self.indexer {
            Some(indexer) => indexer.as_ref(),
            None => return records,
        };
        let history = match indexer::fetch_history(indexer, user).await {
            Ok(history) => history,
            Err(err) => {
                log::warn!(target: "discovery", "transfer history of {:?} is unavailable: {}", user, err);
                return records;
            }
        };

        let mut known: HashSet<Address> = records.iter().map(|record| record.address).collect();
        for transfer in indexer::creation_candidates(&history) {
            match discover_candidate(chain, transfer, &known).await {
                Ok(Some(record)) => {
                    log::info!(
                        target: "discovery",
                        "discovered {} contract {:?} created in {:?}",
                        record.kind(),
                        record.address,
                        record.transaction_hash
                    );
                    known.insert(record.address);
                    records.push(record);
                }
                Ok(None) => {}
                Err(err) => {
                    log::warn!(target: "discovery", "skipping creation transaction {:?}: {}", transfer.hash, err)
                }
            }
        }
        records
    }

    /// Re-probes cached records, refreshing their details from the chain.
    /// The persisted cache is rewritten once, and only if it held stale or
    /// duplicated entries. Nothing is evicted when the node is unreachable.
    async fn validate_cache(
        &self,
        chain: &dyn ChainClient,
        cached: &[ContractRecord],
    ) -> Result<Vec<ContractRecord>, CallError> {
        let mut valid: Vec<ContractRecord> = Vec::with_capacity(cached.len());
        let mut kept: Vec<ContractRecord> = Vec::with_capacity(cached.len());
        for record in cached {
            if kept.iter().any(|r| r.address == record.address) {
                log::debug!(target: "discovery", "dropping duplicated cache entry {:?}", record.address);
                continue;
            }
            match probe::try_classify(chain, record.address).await? {
                Some(details) => {
                    valid.push(ContractRecord {
                        details,
                        ..record.clone()
                    });
                    kept.push(record.clone());
                }
                None => {
                    log::info!(target: "discovery", "evicting stale contract {:?} from cache", record.address)
                }
            }
        }
        if kept.len() != cached.len() {
            if let Err(err) = self.store.replace_all(&kept) {
                log::error!(target: "discovery", "failed to rewrite contract cache: {}", err);
            }
        }
        Ok(valid)
    }
}

/// Resolves the contract created by `transfer`. `Ok(None)` for contracts already in `known`.
async fn discover_candidate(
    chain: &dyn ChainClient,
    transfer: &AssetTransfer,
    known: &HashSet<Address>,
) -> Result<Option<ContractRecord>, CandidateError> {
    let receipt = chain
        .transaction_receipt(transfer.hash)
        .await?
        .ok_or(CandidateError::NoReceipt)?;
    let address = receipt
        .contract_address
        .ok_or(CandidateError::NoContractAddress)?;
    if known.contains(&address) {
        return Ok(None);
    }
    let details = probe::classify(chain, address)
        .await
        .ok_or(CandidateError::Unrecognized(address))?;

    let block_number = receipt.block_number.unwrap_or(transfer.block_num);
    let deployed_at = match block_timestamp(chain, block_number).await {
        Ok(timestamp) => timestamp,
        Err(err) => {
            log::debug!(target: "discovery", "cannot fetch block {}: {}", block_number, err);
            None
        }
    }
    .or_else(|| transfer.block_timestamp())
    .ok_or(CandidateError::NoTimestamp)?;

    Ok(Some(ContractRecord {
        address,
        deployed_at,
        transaction_hash: creation_hash(transfer.hash, receipt.transaction_hash),
        details,
    }))
}

fn creation_hash(transfer: H256, receipt: H256) -> H256 {
    if receipt.is_zero() {
        transfer
    } else {
        receipt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        storage::MemoryStorage,
        tests::mock::{acp_record, simple_record, transfer, MockChain, MockIndexer},
        types::{ContractDetails, ContractKind},
    };
    use chrono::{TimeZone, Utc};
    use ethers_core::types::U256;
    use pretty_assertions::assert_eq;

    const USER: u64 = 0x10;

    fn setup(cached: Vec<ContractRecord>) -> (Arc<ContractStore>, Arc<MockChain>) {
        let store = Arc::new(ContractStore::new(Arc::new(MemoryStorage::default())));
        store.replace_all(&cached).unwrap();
        (store, Arc::new(MockChain::default()))
    }

    fn discovery(
        store: &Arc<ContractStore>,
        chain: &Arc<MockChain>,
        indexer: MockIndexer,
    ) -> ContractDiscovery {
        ContractDiscovery::new(store.clone())
            .with_chain(chain.clone())
            .with_indexer(Arc::new(indexer))
    }

    fn addresses(records: &[ContractRecord]) -> Vec<Address> {
        records.iter().map(|record| record.address).collect()
    }

    #[tokio::test]
    async fn stale_cached_record_is_evicted() {
        let (store, chain) = setup(vec![
            simple_record(1, [USER, 2, 3]),
            simple_record(2, [USER, 2, 3]),
        ]);
        chain.deploy_simple(Address::from_low_u64_be(1), [USER, 2, 3], 1750541569);

        let records = discovery(&store, &chain, MockIndexer::new(vec![], vec![]))
            .discover(Address::from_low_u64_be(USER))
            .await;
        assert_eq!(addresses(&records), vec![Address::from_low_u64_be(1)]);
        assert_eq!(store.all(), vec![simple_record(1, [USER, 2, 3])]);
    }

    #[tokio::test]
    async fn duplicated_cache_entries_are_dropped() {
        let first = simple_record(1, [USER, 2, 3]);
        let duplicate = simple_record(1, [USER, 5, 6]);
        let (store, chain) = setup(vec![first.clone(), duplicate, acp_record(2, 5)]);
        chain.deploy_simple(first.address, [USER, 2, 3], 1750541569);
        chain.deploy_acp(Address::from_low_u64_be(2), 5);

        let records = ContractDiscovery::new(store.clone())
            .with_chain(chain)
            .discover(Address::from_low_u64_be(USER))
            .await;
        assert_eq!(records, vec![first.clone(), acp_record(2, 5)]);
        assert_eq!(store.all(), vec![first, acp_record(2, 5)]);
    }

    #[tokio::test]
    async fn valid_cache_is_not_rewritten() {
        let cached = simple_record(1, [USER, 2, 3]);
        let (store, chain) = setup(vec![cached.clone()]);
        chain.deploy_simple(cached.address, [USER, 2, 9], 1750541569);

        let records = ContractDiscovery::new(store.clone())
            .with_chain(chain)
            .discover(Address::from_low_u64_be(USER))
            .await;
        assert_ne!(records, vec![cached.clone()]);
        // refreshed details are returned, the persisted record stays as saved
        assert_eq!(store.all(), vec![cached]);
    }

    #[tokio::test]
    async fn cached_records_take_details_from_chain() {
        let (store, chain) = setup(vec![simple_record(1, [USER, 2, 3])]);
        chain.deploy_simple(Address::from_low_u64_be(1), [USER, 2, 4], 42);

        let records = ContractDiscovery::new(store)
            .with_chain(chain)
            .discover(Address::from_low_u64_be(USER))
            .await;
        assert_eq!(
            records[0].details,
            ContractDetails::Simple {
                buyer: Address::from_low_u64_be(USER),
                seller: Address::from_low_u64_be(2),
                evaluator_address: Address::from_low_u64_be(4),
                limitation_date: 42,
            }
        );
    }

    #[tokio::test]
    async fn discovers_simple_contract() {
        let (store, chain) = setup(vec![]);
        let created = Address::from_low_u64_be(0xd1);
        chain.deploy_simple(created, [USER, 2, 3], 1750541569);
        chain.add_receipt(H256::from_low_u64_be(0xaa), Some(created), 7);
        chain.add_block(7, 1750000000);
        let indexer = MockIndexer::new(vec![transfer(0xaa, 7, None)], vec![]);

        let records = discovery(&store, &chain, indexer)
            .discover(Address::from_low_u64_be(USER))
            .await;
        assert_eq!(
            records,
            vec![ContractRecord {
                address: created,
                deployed_at: Utc.timestamp_opt(1750000000, 0).unwrap(),
                transaction_hash: H256::from_low_u64_be(0xaa),
                details: ContractDetails::Simple {
                    buyer: Address::from_low_u64_be(USER),
                    seller: Address::from_low_u64_be(2),
                    evaluator_address: Address::from_low_u64_be(3),
                    limitation_date: 1750541569,
                },
            }]
        );
        // discovered contracts are not written back
        assert!(store.all().is_empty());
    }

    #[tokio::test]
    async fn discovers_acp_contract_with_indexer_timestamp() {
        let (store, chain) = setup(vec![]);
        let created = Address::from_low_u64_be(0xa1);
        chain.deploy_acp(created, 250);
        chain.add_receipt(H256::from_low_u64_be(0xab), Some(created), 9);
        let creation = transfer(0xab, 9, None);
        let expected_time = creation.block_timestamp().unwrap();

        let records = discovery(&store, &chain, MockIndexer::new(vec![], vec![creation]))
            .discover(Address::from_low_u64_be(USER))
            .await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), ContractKind::Acp);
        assert_eq!(
            records[0].details,
            ContractDetails::Acp {
                platform_fee: U256::from(250u64)
            }
        );
        assert_eq!(records[0].deployed_at, expected_time);
    }

    #[tokio::test]
    async fn merged_output_has_unique_addresses() {
        let cached = simple_record(1, [USER, 2, 3]);
        let (store, chain) = setup(vec![cached.clone()]);
        chain.deploy_simple(cached.address, [USER, 2, 3], 1750541569);
        let other = Address::from_low_u64_be(0xa1);
        chain.deploy_acp(other, 1);
        chain.add_receipt(H256::from_low_u64_be(0xaa), Some(cached.address), 5);
        chain.add_receipt(H256::from_low_u64_be(0xab), Some(other), 6);
        chain.add_receipt(H256::from_low_u64_be(0xac), Some(other), 7);
        let indexer = MockIndexer::new(
            vec![transfer(0xaa, 5, None), transfer(0xab, 6, None)],
            vec![transfer(0xac, 7, None), transfer(0xab, 6, None)],
        );

        let records = discovery(&store, &chain, indexer)
            .discover(Address::from_low_u64_be(USER))
            .await;
        assert_eq!(addresses(&records), vec![cached.address, other]);
        // cached entry wins over the rediscovered one
        assert_eq!(records[0], cached);
    }

    #[tokio::test]
    async fn without_chain_returns_cache_unmodified() {
        let cached = vec![simple_record(1, [USER, 2, 3]), acp_record(2, 5)];
        let (store, _) = setup(cached.clone());

        let records = ContractDiscovery::new(store.clone())
            .with_indexer(Arc::new(MockIndexer::new(vec![transfer(0xaa, 1, None)], vec![])))
            .discover(Address::from_low_u64_be(USER))
            .await;
        assert_eq!(records, cached);
        assert_eq!(store.all(), cached);
    }

    #[tokio::test]
    async fn transfers_with_recipient_are_ignored() {
        let (store, chain) = setup(vec![]);
        let contract = Address::from_low_u64_be(0xd1);
        chain.deploy_simple(contract, [USER, 2, 3], 1);
        chain.add_receipt(H256::from_low_u64_be(0xaa), Some(contract), 3);
        let indexer = MockIndexer::new(vec![transfer(0xaa, 3, Some(0xd1))], vec![]);

        let records = discovery(&store, &chain, indexer)
            .discover(Address::from_low_u64_be(USER))
            .await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn failing_candidates_are_skipped() {
        let (store, chain) = setup(vec![]);
        let unknown = Address::from_low_u64_be(0xee);
        let good = Address::from_low_u64_be(0xd1);
        chain.deploy_simple(good, [USER, 2, 3], 1);
        chain.add_receipt(H256::from_low_u64_be(0xa1), Some(unknown), 3);
        chain.add_receipt(H256::from_low_u64_be(0xa2), None, 4);
        chain.add_receipt(H256::from_low_u64_be(0xa3), Some(good), 5);
        let indexer = MockIndexer::new(
            vec![
                transfer(0xa0, 2, None),
                transfer(0xa1, 3, None),
                transfer(0xa2, 4, None),
                transfer(0xa3, 5, None),
            ],
            vec![],
        );

        let records = discovery(&store, &chain, indexer)
            .discover(Address::from_low_u64_be(USER))
            .await;
        assert_eq!(addresses(&records), vec![good]);
    }

    #[tokio::test]
    async fn indexer_failure_falls_back_to_validated_cache() {
        let (store, chain) = setup(vec![acp_record(1, 5), acp_record(2, 5)]);
        chain.deploy_acp(Address::from_low_u64_be(2), 7);

        let records = discovery(&store, &chain, MockIndexer::failing())
            .discover(Address::from_low_u64_be(USER))
            .await;
        assert_eq!(
            records,
            vec![ContractRecord {
                details: ContractDetails::Acp {
                    platform_fee: U256::from(7u64)
                },
                ..acp_record(2, 5)
            }]
        );
        assert_eq!(addresses(&store.all()), vec![Address::from_low_u64_be(2)]);
    }
}
