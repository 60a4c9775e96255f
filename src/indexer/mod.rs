mod alchemy;

pub use alchemy::AlchemyIndexer;

use crate::rpc::RpcError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers_core::types::{Address, H256, U64};
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::HashSet, fmt};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Transfers sent by the address.
    From,
    /// Transfers received by the address.
    To,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::From => f.write_str("from"),
            Direction::To => f.write_str("to"),
        }
    }
}

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("transfer history request ({direction}) failed: {source}")]
    Request {
        direction: Direction,
        source: RpcError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTransfer {
    pub hash: H256,
    pub from: Address,
    /// Empty for contract creation transactions.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub to: Option<Address>,
    /// Amount in units of `asset`.
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub asset: Option<String>,
    pub block_num: U64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub metadata: Option<TransferMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMetadata {
    #[serde(default)]
    pub block_timestamp: Option<DateTime<Utc>>,
}

impl AssetTransfer {
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    pub fn block_timestamp(&self) -> Option<DateTime<Utc>> {
        self.metadata.as_ref().and_then(|m| m.block_timestamp)
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(address) => address
            .parse()
            .map(Some)
            .map_err(<D::Error as serde::de::Error>::custom),
    }
}

/// Source of an address' transfer history.
#[async_trait]
pub trait TransferIndexer: Send + Sync {
    async fn transfers(
        &self,
        address: Address,
        direction: Direction,
    ) -> Result<Vec<AssetTransfer>, IndexerError>;
}

/// Fetches outbound and inbound transfers concurrently and merges them with [`merge_transfers`].
pub async fn fetch_history<I>(indexer: &I, address: Address) -> Result<Vec<AssetTransfer>, IndexerError>
where
    I: TransferIndexer + ?Sized,
{
    let (outbound, inbound) = futures::try_join!(
        indexer.transfers(address, Direction::From),
        indexer.transfers(address, Direction::To),
    )?;
    Ok(merge_transfers(outbound, inbound))
}

/// Union of both lists without repeated transaction hashes, newest block first.
pub fn merge_transfers(
    outbound: Vec<AssetTransfer>,
    inbound: Vec<AssetTransfer>,
) -> Vec<AssetTransfer> {
    let mut seen = HashSet::new();
    let mut transfers: Vec<_> = outbound
        .into_iter()
        .chain(inbound)
        .filter(|transfer| seen.insert(transfer.hash))
        .collect();
    transfers.sort_by(|a, b| b.block_num.cmp(&a.block_num));
    transfers
}

/// Transfers which created a contract.
pub fn creation_candidates(transfers: &[AssetTransfer]) -> Vec<&AssetTransfer> {
    transfers
        .iter()
        .filter(|transfer| transfer.is_contract_creation())
        .collect()
}
