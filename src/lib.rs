mod abi;
mod app;
mod chain;
mod cli;
mod consts;
mod contract;
mod deployer;
mod discovery;
mod history;
mod indexer;
mod interaction;
mod probe;
mod rpc;
mod settings;
mod storage;
mod types;


pub use self::settings::Settings;
pub use abi::{Artifact, ArtifactError, ACP_ABI, DEAL_ABI};
pub use app::{run, App};
pub use chain::{
    wait_for_receipt, ChainClient, ChainError, HttpChainClient, Network, ReceiptPolling, Wallet,
    WalletClient,
};
pub use cli::Args;
pub use contract::CallError;
pub use deployer::{DealParams, DeployError, Deployer};
pub use discovery::ContractDiscovery;
pub use history::{TransactionHistory, TransactionKind};
pub use indexer::{
    creation_candidates, fetch_history, merge_transfers, AlchemyIndexer, AssetTransfer, Direction,
    IndexerError, TransferIndexer, TransferMetadata,
};
pub use interaction::{
    parse_ether_amount, AcpContract, AcpState, DealAction, DealContract, DealRole, DealState,
    InteractionError, Job, JobPhase, MemoType,
};
pub use probe::classify;
pub use rpc::{JsonRpcTransport, RpcError};
pub use storage::{ContractStore, FileStorage, KeyValueStorage, MemoryStorage, StorageError};
pub use types::{ContractDetails, ContractKind, ContractRecord};
