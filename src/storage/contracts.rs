use super::{KeyValueStorage, StorageError};
use crate::{consts::DEPLOYED_CONTRACTS_KEY, types::ContractRecord};
use ethers_core::types::Address;
use std::sync::Arc;

/// Local cache of deployed contracts, persisted as a json array under a single storage key.
///
/// The cache only speeds up discovery, the chain stays the source of truth.
pub struct ContractStore {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
}

impl ContractStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_key(storage, DEPLOYED_CONTRACTS_KEY)
    }

    pub fn with_key(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Returns every cached record. Unreadable content is logged and treated as an empty cache.
    pub fn all(&self) -> Vec<ContractRecord> {
        let raw = match self.storage.get_item(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return vec![],
            Err(err) => {
                log::error!(target: "contract_store", "failed to get deployed contracts: {}", err);
                return vec![];
            }
        };
        let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(values) => values,
            Err(err) => {
                log::error!(target: "contract_store", "deployed contracts are not a json array: {}", err);
                return vec![];
            }
        };
        values
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(err) => {
                    log::warn!(target: "contract_store", "skipping malformed contract record: {}", err);
                    None
                }
            })
            .collect()
    }

    pub fn get(&self, address: &Address) -> Option<ContractRecord> {
        self.all()
            .into_iter()
            .find(|record| &record.address == address)
    }

    /// Stores the record, replacing a cached record with the same address.
    pub fn save(&self, record: ContractRecord) -> Result<(), StorageError> {
        let mut records = self.all();
        match records.iter_mut().find(|r| r.address == record.address) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.replace_all(&records)
    }

    /// Returns whether a record was removed.
    pub fn remove(&self, address: &Address) -> Result<bool, StorageError> {
        let mut records = self.all();
        let before = records.len();
        records.retain(|record| &record.address != address);
        if records.len() == before {
            return Ok(false);
        }
        self.replace_all(&records)?;
        Ok(true)
    }

    pub fn replace_all(&self, records: &[ContractRecord]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(records)?;
        self.storage.set_item(&self.key, raw)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove_item(&self.key)
    }

    /// Deal contracts where `user` is the buyer, the seller or the evaluator.
    pub fn by_participant(&self, user: &Address) -> Vec<ContractRecord> {
        self.all()
            .into_iter()
            .filter(|record| record.details.has_participant(user))
            .collect()
    }
}
