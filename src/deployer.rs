use crate::{
    abi::{Artifact, ArtifactError, ACP_ABI, DEAL_ABI},
    chain::{block_timestamp, wait_for_receipt, ChainError, ReceiptPolling, WalletClient},
    storage::ContractStore,
    types::{ContractDetails, ContractKind, ContractRecord},
};
use chrono::Utc;
use ethabi::{Contract, Token};
use ethers_core::types::{Address, TransactionRequest, H256, U256, U64};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("artifact does not implement the {0} contract interface")]
    InterfaceMismatch(ContractKind),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("deployment transaction {0:?} failed")]
    Failed(H256),
}

/// Constructor arguments of the Deal contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealParams {
    pub buyer: Address,
    pub seller: Address,
    pub evaluator: Address,
    /// Unix timestamp in seconds.
    pub limitation_date: u64,
}

/// Deploys contracts through a wallet and records them in the local cache.
pub struct Deployer<W: ?Sized> {
    wallet: Arc<W>,
    store: Arc<ContractStore>,
    polling: ReceiptPolling,
}

impl<W: WalletClient + ?Sized> Deployer<W> {
    pub fn new(wallet: Arc<W>, store: Arc<ContractStore>, polling: ReceiptPolling) -> Self {
        Self {
            wallet,
            store,
            polling,
        }
    }

    pub async fn deploy_deal(
        &self,
        artifact: &Artifact,
        params: &DealParams,
    ) -> Result<ContractRecord, DeployError> {
        let args = [
            Token::Address(params.buyer),
            Token::Address(params.seller),
            Token::Address(params.evaluator),
            Token::Uint(U256::from(params.limitation_date)),
        ];
        let details = ContractDetails::Simple {
            buyer: params.buyer,
            seller: params.seller,
            evaluator_address: params.evaluator,
            limitation_date: params.limitation_date,
        };
        self.deploy(artifact, &DEAL_ABI, &args, details).await
    }

    pub async fn deploy_acp(
        &self,
        artifact: &Artifact,
        platform_fee: U256,
    ) -> Result<ContractRecord, DeployError> {
        let details = ContractDetails::Acp { platform_fee };
        self.deploy(artifact, &ACP_ABI, &[Token::Uint(platform_fee)], details)
            .await
    }

    async fn deploy(
        &self,
        artifact: &Artifact,
        interface: &Contract,
        args: &[Token],
        details: ContractDetails,
    ) -> Result<ContractRecord, DeployError> {
        let kind = details.kind();
        if !artifact.implements(interface) {
            return Err(DeployError::InterfaceMismatch(kind));
        }
        let data = artifact.deploy_data(args)?;
        let tx = TransactionRequest::new()
            .from(self.wallet.account())
            .data(data);
        let hash = self.wallet.send_transaction(tx).await?;
        log::info!(target: "deployer", "sent {} contract deployment {:?}", kind, hash);

        let receipt = wait_for_receipt(
            self.wallet.as_ref(),
            hash,
            self.polling.interval,
            self.polling.attempts,
        )
        .await?;
        if receipt.status == Some(U64::zero()) {
            return Err(DeployError::Failed(hash));
        }
        let address = receipt.contract_address.ok_or(DeployError::Failed(hash))?;

        let deployed_at = match receipt.block_number {
            Some(number) => block_timestamp(self.wallet.as_ref(), number)
                .await
                .unwrap_or_else(|err| {
                    log::warn!(target: "deployer", "cannot fetch block {}: {}", number, err);
                    None
                }),
            None => None,
        }
        .unwrap_or_else(Utc::now);

        let record = ContractRecord {
            address,
            deployed_at,
            transaction_hash: hash,
            details,
        };
        log::info!(target: "deployer", "{} contract deployed at {:?}", kind, address);
        if let Err(err) = self.store.save(record.clone()) {
            log::error!(target: "deployer", "failed to save deployed contract {:?}: {}", address, err);
        }
        Ok(record)
    }
}
