mod http;
mod networks;

pub use http::{HttpChainClient, Wallet};
pub use networks::Network;

use crate::rpc::RpcError;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ethers_core::types::{
    Address, Block, Bytes, TransactionReceipt, TransactionRequest, H256, U256, U64,
};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("wallet does not expose any account")]
    NoAccounts,
    #[error("transaction {0:?} was not mined in time")]
    ReceiptTimeout(H256),
}

/// Read access to the chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// `eth_call` against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;

    async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ChainError>;

    async fn block(&self, number: U64) -> Result<Option<Block<H256>>, ChainError>;
}

/// A connected wallet. Signing happens on the wallet side.
#[async_trait]
pub trait WalletClient: ChainClient {
    fn account(&self) -> Address;

    /// Sends the transaction from [`WalletClient::account`] and returns its hash.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256, ChainError>;
}

/// How long to wait for a sent transaction to be mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptPolling {
    pub interval: Duration,
    pub attempts: usize,
}

impl Default for ReceiptPolling {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            attempts: 90,
        }
    }
}

/// Polls for the receipt of `hash` every `interval`, at most `attempts` times.
pub async fn wait_for_receipt<C>(
    client: &C,
    hash: H256,
    interval: Duration,
    attempts: usize,
) -> Result<TransactionReceipt, ChainError>
where
    C: ChainClient + ?Sized,
{
    for attempt in 0..attempts {
        if let Some(receipt) = client.transaction_receipt(hash).await? {
            return Ok(receipt);
        }
        log::debug!(target: "chain", "receipt for {:?} not available yet, attempt {}", hash, attempt + 1);
        tokio::time::sleep(interval).await;
    }
    Err(ChainError::ReceiptTimeout(hash))
}

/// Timestamp of block `number`, `None` if the block is unknown.
pub async fn block_timestamp<C>(
    client: &C,
    number: U64,
) -> Result<Option<DateTime<Utc>>, ChainError>
where
    C: ChainClient + ?Sized,
{
    let block = client.block(number).await?;
    Ok(block.and_then(|block| unix_time(block.timestamp)))
}

fn unix_time(seconds: U256) -> Option<DateTime<Utc>> {
    if seconds.is_zero() || seconds > U256::from(i64::MAX as u64) {
        return None;
    }
    Utc.timestamp_opt(seconds.as_u64() as i64, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mock::MockChain;

    #[tokio::test]
    async fn receipt_waiting() {
        let chain = MockChain::default();
        let hash = H256::from_low_u64_be(1);
        let err = wait_for_receipt(&chain, hash, Duration::from_millis(1), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::ReceiptTimeout(h) if h == hash));

        chain.add_receipt(hash, Some(Address::from_low_u64_be(5)), 10);
        let receipt = wait_for_receipt(&chain, hash, Duration::from_millis(1), 3)
            .await
            .unwrap();
        assert_eq!(receipt.contract_address, Some(Address::from_low_u64_be(5)));
    }

    #[tokio::test]
    async fn block_timestamps() {
        let chain = MockChain::default();
        chain.add_block(7, 1750541569);
        chain.add_block(8, 0);
        assert_eq!(
            block_timestamp(&chain, U64::from(7)).await.unwrap(),
            Some(Utc.timestamp_opt(1750541569, 0).unwrap())
        );
        assert_eq!(block_timestamp(&chain, U64::from(8)).await.unwrap(), None);
        assert_eq!(block_timestamp(&chain, U64::from(9)).await.unwrap(), None);
    }
}
