/// Key under which the contract cache lives in local storage.
pub const DEPLOYED_CONTRACTS_KEY: &str = "deployed_contracts";

pub const DEFAULT_STORAGE_PATH: &str = "escrow-dapp-storage.json";

pub const DEFAULT_WALLET_RPC: &str = "http://127.0.0.1:1248";

/// `maxCount` of a single transfer history page, `0x64`.
pub const DEFAULT_TRANSFERS_PAGE_SIZE: u64 = 100;
