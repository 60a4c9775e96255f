//! Interfaces of the two contract kinds and the compiled artifacts used to deploy them.

use ethabi::{Contract, Token};
use ethers_core::types::Bytes;
use lazy_static::lazy_static;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

lazy_static! {
    /// Interface of the three-party Deal escrow contract.
    pub static ref DEAL_ABI: Contract = parse_embedded(include_str!("deal.json"));
    /// Interface of the ACP job, escrow and arbitration contract.
    pub static ref ACP_ABI: Contract = parse_embedded(include_str!("acp.json"));
}

fn parse_embedded(raw: &str) -> Contract {
    serde_json::from_str(raw).expect("embedded abi should be valid")
}

/// Encodes a call of the function `name` with `args`.
pub fn encode_call(abi: &Contract, name: &str, args: &[Token]) -> Result<Bytes, ethabi::Error> {
    let function = abi.function(name)?;
    Ok(function.encode_input(args)?.into())
}

/// Decodes the return data of the function `name`.
pub fn decode_output(abi: &Contract, name: &str, data: &[u8]) -> Result<Vec<Token>, ethabi::Error> {
    abi.function(name)?.decode_output(data)
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("cannot read artifact file: {0}")]
    File(#[from] std::io::Error),
    #[error("invalid artifact json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("artifact has no creation bytecode")]
    EmptyBytecode,
    #[error("cannot encode constructor arguments: {0}")]
    Constructor(#[from] ethabi::Error),
}

#[derive(Deserialize)]
struct RawArtifact {
    abi: Contract,
    bytecode: RawBytecode,
}

/// Hardhat keeps the bytecode as a hex string, Foundry wraps it into an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(Bytes),
    Object { object: Bytes },
}

/// A compiled contract: its interface and creation bytecode.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub abi: Contract,
    pub bytecode: Bytes,
}

impl Artifact {
    pub fn from_json(raw: &str) -> Result<Self, ArtifactError> {
        let raw: RawArtifact = serde_json::from_str(raw)?;
        let bytecode = match raw.bytecode {
            RawBytecode::Hex(bytes) => bytes,
            RawBytecode::Object { object } => object,
        };
        let code: &[u8] = bytecode.as_ref();
        if code.is_empty() {
            return Err(ArtifactError::EmptyBytecode);
        }
        Ok(Self {
            abi: raw.abi,
            bytecode,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ArtifactError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Whether every function of `interface` is present in the artifact abi.
    pub fn implements(&self, interface: &Contract) -> bool {
        interface
            .functions()
            .all(|function| self.abi.function(&function.name).is_ok())
    }

    /// Creation bytecode followed by the encoded constructor arguments.
    pub fn deploy_data(&self, args: &[Token]) -> Result<Bytes, ArtifactError> {
        let code: &[u8] = self.bytecode.as_ref();
        match self.abi.constructor() {
            Some(constructor) => Ok(constructor.encode_input(code.to_vec(), args)?.into()),
            None if args.is_empty() => Ok(self.bytecode.clone()),
            None => Err(ArtifactError::Constructor(ethabi::Error::InvalidData)),
        }
    }
}
