use super::{ChainClient, ChainError, WalletClient};
use crate::rpc::{JsonRpcTransport, RpcError};
use async_trait::async_trait;
use ethers_core::types::{
    Address, Block, Bytes, TransactionReceipt, TransactionRequest, H256, U64,
};
use serde_json::json;

/// [`ChainClient`] backed by a JSON-RPC node.
pub struct HttpChainClient {
    transport: JsonRpcTransport,
}

impl HttpChainClient {
    pub fn new(transport: JsonRpcTransport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &JsonRpcTransport {
        &self.transport
    }

    pub async fn chain_id(&self) -> Result<U64, ChainError> {
        Ok(self.transport.request("eth_chainId", json!([])).await?)
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let params = json!([{ "to": to, "data": data }, "latest"]);
        Ok(self.transport.request("eth_call", params).await?)
    }

    async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        Ok(self
            .transport
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?)
    }

    async fn block(&self, number: U64) -> Result<Option<Block<H256>>, ChainError> {
        Ok(self
            .transport
            .request("eth_getBlockByNumber", json!([number, false]))
            .await?)
    }
}

/// A wallet reached over JSON-RPC, e.g. a local wallet proxy which prompts the user to sign.
pub struct Wallet {
    client: HttpChainClient,
    account: Address,
}

impl Wallet {
    /// Asks the wallet for its accounts and uses the first one.
    pub async fn connect(client: HttpChainClient) -> Result<Self, ChainError> {
        let accounts: Vec<Address> = match client
            .transport
            .request("eth_requestAccounts", json!([]))
            .await
        {
            Ok(accounts) => accounts,
            Err(RpcError::Rpc { code, message }) => {
                log::debug!(
                    target: "wallet",
                    "eth_requestAccounts is not supported ({}: {}), falling back to eth_accounts",
                    code,
                    message
                );
                client.transport.request("eth_accounts", json!([])).await?
            }
            Err(err) => return Err(err.into()),
        };
        let account = accounts.into_iter().next().ok_or(ChainError::NoAccounts)?;
        log::info!(target: "wallet", "connected wallet account {:?}", account);
        Ok(Self { client, account })
    }
}

#[async_trait]
impl ChainClient for Wallet {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        self.client.call(to, data).await
    }

    async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        self.client.transaction_receipt(hash).await
    }

    async fn block(&self, number: U64) -> Result<Option<Block<H256>>, ChainError> {
        self.client.block(number).await
    }
}

#[async_trait]
impl WalletClient for Wallet {
    fn account(&self) -> Address {
        self.account
    }

    async fn send_transaction(&self, mut tx: TransactionRequest) -> Result<H256, ChainError> {
        tx.from.get_or_insert(self.account);
        let hash: H256 = self
            .client
            .transport
            .request("eth_sendTransaction", json!([tx]))
            .await?;
        log::info!(target: "wallet", "sent transaction {:?}", hash);
        Ok(hash)
    }
}
