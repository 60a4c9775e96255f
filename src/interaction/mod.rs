//! Reading the state of deployed contracts and sending their state transitions
//! through the connected wallet.

mod acp;
mod deal;

pub use acp::{AcpContract, AcpState, Job, JobPhase, MemoType};
pub use deal::{DealAction, DealContract, DealRole, DealState};

use crate::{
    abi,
    chain::{ChainError, WalletClient},
    contract::CallError,
};
use ethabi::{Contract, Token};
use ethers_core::types::{Address, TransactionRequest, H256, U256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InteractionError {
    #[error(transparent)]
    Call(#[from] CallError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("abi error: {0}")]
    Abi(#[from] ethabi::Error),
    #[error("{action} is not allowed: {reason}")]
    NotAllowed { action: String, reason: String },
    #[error("invalid ether amount `{0}`")]
    InvalidAmount(String),
}

impl InteractionError {
    fn not_allowed(action: impl ToString, reason: impl Into<String>) -> Self {
        InteractionError::NotAllowed {
            action: action.to_string(),
            reason: reason.into(),
        }
    }
}

/// Converts a decimal ether amount such as `1.5` into wei.
pub fn parse_ether_amount(amount: &str) -> Result<U256, InteractionError> {
    let trimmed = amount.trim();
    let invalid = || InteractionError::InvalidAmount(amount.to_string());
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(invalid());
    }
    let wei = ethers_core::utils::parse_ether(trimmed).map_err(|_| invalid())?;
    Ok(wei)
}

/// Sends a call of `function` to `address` from the wallet account.
async fn send<W>(
    wallet: &W,
    abi: &Contract,
    address: Address,
    function: &str,
    args: &[Token],
    value: Option<U256>,
) -> Result<H256, InteractionError>
where
    W: WalletClient + ?Sized,
{
    let data = abi::encode_call(abi, function, args)?;
    let mut tx = TransactionRequest::new()
        .from(wallet.account())
        .to(address)
        .data(data);
    if let Some(value) = value {
        tx = tx.value(value);
    }
    let hash = wallet.send_transaction(tx).await?;
    log::info!(target: "interaction", "sent `{}` to {:?}: {:?}", function, address, hash);
    Ok(hash)
}
