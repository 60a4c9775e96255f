//! Classifies an address by the contract interface it answers to.
//!
//! Known schemas are tried in a fixed priority order and the first one whose
//! identifying reads all succeed wins. A contract satisfying both interfaces
//! is therefore classified by the earlier schema.

use crate::{
    abi::{ACP_ABI, DEAL_ABI},
    chain::ChainClient,
    contract::{self, CallError},
    types::{ContractDetails, ContractKind},
};
use ethers_core::types::Address;

/// Priority in which schemas are probed.
pub const PROBE_ORDER: [ContractKind; 2] = [ContractKind::Simple, ContractKind::Acp];

/// Returns the details of the first schema matching `address`, `None` if none does.
/// Probe failures of any sort count as a mismatch.
pub async fn classify<C>(client: &C, address: Address) -> Option<ContractDetails>
where
    C: ChainClient + ?Sized,
{
    try_classify(client, address).await.unwrap_or_else(|err| {
        log::debug!(target: "probe", "cannot classify {:?}: {}", address, err);
        None
    })
}

/// Like [`classify`], but fails when the node is unreachable instead of
/// reporting a mismatch.
pub async fn try_classify<C>(
    client: &C,
    address: Address,
) -> Result<Option<ContractDetails>, CallError>
where
    C: ChainClient + ?Sized,
{
    for kind in PROBE_ORDER {
        match probe(client, address, kind).await {
            Ok(details) => {
                log::debug!(target: "probe", "{:?} is a {} contract", address, kind);
                return Ok(Some(details));
            }
            Err(err) if err.is_unreachable() => return Err(err),
            Err(err) => {
                log::debug!(target: "probe", "{:?} is not a {} contract: {}", address, kind, err)
            }
        }
    }
    Ok(None)
}

/// Reads the identifying fields of `kind` from `address`.
pub async fn probe<C>(
    client: &C,
    address: Address,
    kind: ContractKind,
) -> Result<ContractDetails, CallError>
where
    C: ChainClient + ?Sized,
{
    match kind {
        ContractKind::Simple => probe_simple(client, address).await,
        ContractKind::Acp => probe_acp(client, address).await,
    }
}

async fn probe_simple<C>(client: &C, address: Address) -> Result<ContractDetails, CallError>
where
    C: ChainClient + ?Sized,
{
    let read_address = |function: &'static str| async move {
        let token = contract::read_single(client, &DEAL_ABI, address, function).await?;
        contract::into_address(token, function)
    };
    let buyer = read_address("buyer").await?;
    let seller = read_address("seller").await?;
    let evaluator_address = read_address("evaluatorAddress").await?;
    let limitation_date = contract::into_u64(
        contract::read_single(client, &DEAL_ABI, address, "limitationDate").await?,
        "limitationDate",
    )?;
    Ok(ContractDetails::Simple {
        buyer,
        seller,
        evaluator_address,
        limitation_date,
    })
}

async fn probe_acp<C>(client: &C, address: Address) -> Result<ContractDetails, CallError>
where
    C: ChainClient + ?Sized,
{
    let platform_fee = contract::into_uint(
        contract::read_single(client, &ACP_ABI, address, "platformFee").await?,
        "platformFee",
    )?;
    Ok(ContractDetails::Acp { platform_fee })
}
