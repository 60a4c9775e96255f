use crate::{
    chain::{Network, ReceiptPolling},
    consts::{DEFAULT_STORAGE_PATH, DEFAULT_TRANSFERS_PAGE_SIZE, DEFAULT_WALLET_RPC},
};
use anyhow::anyhow;
use config::{Config, File};
use serde::Deserialize;
use std::{num::NonZeroUsize, path::PathBuf, time::Duration};
use url::Url;

pub const CONFIG_PATH_ENV: &str = "ESCROW_DAPP_CONFIG";
pub const ENV_PREFIX: &str = "ESCROW_DAPP";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub network: Network,
    pub chain: ChainSettings,
    pub wallet: WalletSettings,
    pub indexer: IndexerSettings,
    pub storage: StorageSettings,
    pub artifacts: ArtifactsSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainSettings {
    /// Overrides the public rpc endpoint of the network.
    pub rpc_url: Option<Url>,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Number of attempts for each request. Should be at least one.
    pub request_attempts: NonZeroUsize,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            rpc_url: None,
            request_timeout: 10,
            request_attempts: NonZeroUsize::new(3).expect("Is not zero"),
        }
    }
}

impl ChainSettings {
    pub fn rpc_url(&self, network: Network) -> Url {
        self.rpc_url
            .clone()
            .unwrap_or_else(|| network.default_rpc_url())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalletSettings {
    /// JSON-RPC endpoint of the wallet which holds the keys and signs transactions.
    pub rpc_url: Url,
    /// Receipt polling interval in milliseconds.
    pub receipt_poll_interval: u64,
    pub receipt_poll_attempts: usize,
}

impl Default for WalletSettings {
    fn default() -> Self {
        let polling = ReceiptPolling::default();
        Self {
            rpc_url: Url::parse(DEFAULT_WALLET_RPC).expect("valid url"),
            receipt_poll_interval: polling.interval.as_millis() as u64,
            receipt_poll_attempts: polling.attempts,
        }
    }
}

impl WalletSettings {
    pub fn polling(&self) -> ReceiptPolling {
        ReceiptPolling {
            interval: Duration::from_millis(self.receipt_poll_interval),
            attempts: self.receipt_poll_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexerSettings {
    pub enabled: bool,
    /// Full endpoint url, the network default with `api_key` is used when unset.
    pub url: Option<Url>,
    pub api_key: Option<String>,
    /// Transfers requested per page.
    pub max_count: u64,
    pub max_pages: NonZeroUsize,
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            api_key: None,
            max_count: DEFAULT_TRANSFERS_PAGE_SIZE,
            max_pages: NonZeroUsize::new(1).expect("Is not zero"),
        }
    }
}

impl IndexerSettings {
    /// Endpoint of the indexer, `None` when disabled or when neither url nor api key is set.
    pub fn endpoint(&self, network: Network) -> anyhow::Result<Option<Url>> {
        if !self.enabled {
            return Ok(None);
        }
        match (&self.url, &self.api_key) {
            (Some(url), _) => Ok(Some(url.clone())),
            (None, Some(api_key)) => Ok(Some(network.indexer_url().join(api_key)?)),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSettings {
    /// Keep the contract cache in memory only.
    pub in_memory: bool,
    pub path: PathBuf,
    pub key: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            in_memory: false,
            path: PathBuf::from(DEFAULT_STORAGE_PATH),
            key: crate::consts::DEPLOYED_CONTRACTS_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactsSettings {
    /// Hardhat or Foundry artifact of the Deal contract.
    pub deal: PathBuf,
    pub acp: PathBuf,
}

impl Default for ArtifactsSettings {
    fn default() -> Self {
        Self {
            deal: PathBuf::from("artifacts/Deal.json"),
            acp: PathBuf::from("artifacts/ACP.json"),
        }
    }
}

impl Settings {
    /// Reads the file named by `ESCROW_DAPP_CONFIG`, if set, and `ESCROW_DAPP__*` variables.
    pub fn new() -> anyhow::Result<Self> {
        let config_path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::build(config_path)
    }

    pub fn build(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();
        if let Some(config_path) = config_path {
            builder = builder.add_source(File::from(config_path));
        };
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        builder
            .build()?
            .try_deserialize()
            .map_err(|err| anyhow!(err))
    }
}
