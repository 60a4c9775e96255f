use crate::{
    abi,
    chain::{ChainClient, ChainError},
    rpc::RpcError,
};
use ethabi::{Contract, Token};
use ethers_core::types::{Address, U256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CallError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("abi error: {0}")]
    Abi(#[from] ethabi::Error),
    #[error("unexpected output of `{0}`")]
    UnexpectedOutput(String),
}

impl CallError {
    /// The node could not be reached, so nothing is known about the contract.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, CallError::Chain(ChainError::Rpc(RpcError::Transport(_))))
    }
}

/// Calls a view function of `address` and decodes its outputs.
pub async fn read<C>(
    client: &C,
    abi: &Contract,
    address: Address,
    function: &str,
    args: &[Token],
) -> Result<Vec<Token>, CallError>
where
    C: ChainClient + ?Sized,
{
    let data = abi::encode_call(abi, function, args)?;
    let output = client.call(address, data).await?;
    let output: &[u8] = output.as_ref();
    Ok(abi::decode_output(abi, function, output)?)
}

/// Like [`read`] for functions with exactly one output.
pub async fn read_single<C>(
    client: &C,
    abi: &Contract,
    address: Address,
    function: &str,
) -> Result<Token, CallError>
where
    C: ChainClient + ?Sized,
{
    let tokens = read(client, abi, address, function, &[]).await?;
    single(tokens, function)
}

pub fn single(tokens: Vec<Token>, function: &str) -> Result<Token, CallError> {
    match <[Token; 1]>::try_from(tokens) {
        Ok([token]) => Ok(token),
        Err(_) => Err(CallError::UnexpectedOutput(function.to_string())),
    }
}

pub fn into_address(token: Token, function: &str) -> Result<Address, CallError> {
    token
        .into_address()
        .ok_or_else(|| CallError::UnexpectedOutput(function.to_string()))
}

pub fn into_uint(token: Token, function: &str) -> Result<U256, CallError> {
    token
        .into_uint()
        .ok_or_else(|| CallError::UnexpectedOutput(function.to_string()))
}

pub fn into_u64(token: Token, function: &str) -> Result<u64, CallError> {
    let value = into_uint(token, function)?;
    if value > U256::from(u64::MAX) {
        return Err(CallError::UnexpectedOutput(function.to_string()));
    }
    Ok(value.as_u64())
}

pub fn into_bool(token: Token, function: &str) -> Result<bool, CallError> {
    token
        .into_bool()
        .ok_or_else(|| CallError::UnexpectedOutput(function.to_string()))
}
