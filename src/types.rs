use chrono::{DateTime, Utc};
use ethers_core::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractKind {
    Simple,
    Acp,
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractKind::Simple => write!(f, "simple"),
            ContractKind::Acp => write!(f, "acp"),
        }
    }
}

/// Fields read from a contract which identify its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContractDetails {
    #[serde(rename_all = "camelCase")]
    Simple {
        buyer: Address,
        seller: Address,
        evaluator_address: Address,
        /// Unix timestamp in seconds.
        #[serde(with = "serde_with::rust::display_fromstr")]
        limitation_date: u64,
    },
    #[serde(rename_all = "camelCase")]
    Acp {
        #[serde(with = "decimal_u256")]
        platform_fee: U256,
    },
}

impl ContractDetails {
    pub fn kind(&self) -> ContractKind {
        match self {
            ContractDetails::Simple { .. } => ContractKind::Simple,
            ContractDetails::Acp { .. } => ContractKind::Acp,
        }
    }

    /// Whether `user` is one of the three deal parties. Always false for ACP contracts.
    pub fn has_participant(&self, user: &Address) -> bool {
        match self {
            ContractDetails::Simple {
                buyer,
                seller,
                evaluator_address,
                ..
            } => [buyer, seller, evaluator_address].contains(&user),
            ContractDetails::Acp { .. } => false,
        }
    }
}

/// A deployed contract as kept in the local cache or produced by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    pub address: Address,
    pub deployed_at: DateTime<Utc>,
    pub transaction_hash: H256,
    #[serde(flatten)]
    pub details: ContractDetails,
}

impl ContractRecord {
    pub fn kind(&self) -> ContractKind {
        self.details.kind()
    }
}

/// uint256 values are kept as decimal strings, `U256::from_str` would read them as hex.
mod decimal_u256 {
    use ethers_core::types::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let value = String::deserialize(deserializer)?;
        U256::from_dec_str(&value).map_err(D::Error::custom)
    }
}
