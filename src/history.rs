//! Transfer history of the connected account as shown to the user.

use crate::{
    chain::Network,
    indexer::{fetch_history, AssetTransfer, IndexerError, TransferIndexer},
};
use ethers_core::types::{Address, H256};
use std::fmt;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    ContractCreation,
    Transfer,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::ContractCreation => f.write_str("Contract Creation"),
            TransactionKind::Transfer => f.write_str("Transfer"),
        }
    }
}

pub fn kind(transfer: &AssetTransfer) -> TransactionKind {
    if transfer.is_contract_creation() {
        TransactionKind::ContractCreation
    } else {
        TransactionKind::Transfer
    }
}

/// Ether amounts with six decimals, other assets as reported by the indexer.
pub fn format_value(transfer: &AssetTransfer) -> String {
    match (transfer.value, transfer.asset.as_deref()) {
        (None, _) => "-".to_string(),
        (Some(value), None | Some("ETH")) => format!("{value:.6} ETH"),
        (Some(value), Some(asset)) => format!("{value} {asset}"),
    }
}

/// `0x1234...abcd`
pub fn short_address(address: &Address) -> String {
    let hex = hex::encode(address.as_bytes());
    format!("0x{}...{}", &hex[..4], &hex[hex.len() - 4..])
}

pub fn explorer_tx_url(network: Network, hash: &H256) -> Result<Url, url::ParseError> {
    network
        .explorer_url()
        .join(&format!("tx/0x{}", hex::encode(hash.as_bytes())))
}

pub fn explorer_address_url(network: Network, address: &Address) -> Result<Url, url::ParseError> {
    network
        .explorer_url()
        .join(&format!("address/0x{}", hex::encode(address.as_bytes())))
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionHistory {
    pub address: Address,
    /// Newest first.
    pub transfers: Vec<AssetTransfer>,
}

impl TransactionHistory {
    pub async fn load<I>(indexer: &I, address: Address) -> Result<Self, IndexerError>
    where
        I: TransferIndexer + ?Sized,
    {
        let transfers = fetch_history(indexer, address).await?;
        log::info!(target: "history", "loaded {} transactions of {:?}", transfers.len(), address);
        Ok(Self { address, transfers })
    }

    /// Transfers whose hash, sender or recipient contain `search`, ignoring case.
    pub fn filter(&self, search: &str) -> Vec<&AssetTransfer> {
        let search = search.trim().to_lowercase();
        self.transfers
            .iter()
            .filter(|transfer| {
                let hash = hex::encode(transfer.hash.as_bytes());
                let from = hex::encode(transfer.from.as_bytes());
                let to = transfer
                    .to
                    .map(|to| hex::encode(to.as_bytes()))
                    .unwrap_or_default();
                [hash, from, to]
                    .iter()
                    .any(|field| format!("0x{field}").contains(&search))
            })
            .collect()
    }
}
