use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use url::Url;

/// Networks the dApp knows how to reach without extra configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Mainnet,
    Sepolia,
    Base,
    BaseSepolia,
}

impl Default for Network {
    fn default() -> Self {
        Network::BaseSepolia
    }
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Sepolia => 11155111,
            Network::Base => 8453,
            Network::BaseSepolia => 84532,
        }
    }

    pub fn default_rpc_url(&self) -> Url {
        let url = match self {
            Network::Mainnet => "https://eth.merkle.io",
            Network::Sepolia => "https://sepolia.drpc.org",
            Network::Base => "https://mainnet.base.org",
            Network::BaseSepolia => "https://sepolia.base.org",
        };
        Url::parse(url).expect("valid url")
    }

    /// Host of the transfer history indexer for this network, the api key is appended as a path segment.
    pub fn indexer_url(&self) -> Url {
        let url = match self {
            Network::Mainnet => "https://eth-mainnet.g.alchemy.com/v2/",
            Network::Sepolia => "https://eth-sepolia.g.alchemy.com/v2/",
            Network::Base => "https://base-mainnet.g.alchemy.com/v2/",
            Network::BaseSepolia => "https://base-sepolia.g.alchemy.com/v2/",
        };
        Url::parse(url).expect("valid url")
    }

    pub fn explorer_url(&self) -> Url {
        let url = match self {
            Network::Mainnet => "https://etherscan.io/",
            Network::Sepolia => "https://sepolia.etherscan.io/",
            Network::Base => "https://basescan.org/",
            Network::BaseSepolia => "https://sepolia.basescan.org/",
        };
        Url::parse(url).expect("valid url")
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Sepolia => "sepolia",
            Network::Base => "base",
            Network::BaseSepolia => "base-sepolia",
        };
        f.write_str(name)
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "sepolia" => Ok(Network::Sepolia),
            "base" => Ok(Network::Base),
            "base-sepolia" | "base_sepolia" => Ok(Network::BaseSepolia),
            other => Err(format!("unknown network: {other}")),
        }
    }
}
