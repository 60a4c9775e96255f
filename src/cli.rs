use crate::interaction::{parse_ether_amount, JobPhase, MemoType};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use ethers_core::types::{Address, U256};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Config file, overrides `ESCROW_DAPP_CONFIG`.
    #[clap(short, long)]
    pub config_path: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile the contract cache with the chain and list the contracts of the wallet account.
    Discover {
        /// Account to discover contracts of, the wallet is not contacted when set.
        #[clap(long)]
        address: Option<Address>,
        #[clap(long)]
        json: bool,
    },
    /// List cached contracts without touching the network.
    Contracts {
        /// Only deals where this address is a party.
        #[clap(long)]
        participant: Option<Address>,
        #[clap(long)]
        json: bool,
    },
    /// Deploy a Deal escrow contract.
    DeployDeal {
        #[clap(long)]
        buyer: Address,
        #[clap(long)]
        seller: Address,
        #[clap(long)]
        evaluator: Address,
        /// RFC 3339 date or unix seconds.
        #[clap(long, parse(try_from_str = parse_unix_time))]
        limitation_date: u64,
        /// Overrides the configured artifact.
        #[clap(long)]
        artifact: Option<PathBuf>,
    },
    /// Deploy an ACP contract.
    DeployAcp {
        /// Platform fee as a decimal integer.
        #[clap(long, parse(try_from_str = parse_uint))]
        platform_fee: U256,
        #[clap(long)]
        artifact: Option<PathBuf>,
    },
    Deal {
        address: Address,
        #[clap(subcommand)]
        command: DealCommand,
    },
    Acp {
        address: Address,
        #[clap(subcommand)]
        command: AcpCommand,
    },
    /// Show the transaction history of the wallet account.
    History {
        /// Case-insensitive filter on hash, sender and recipient.
        #[clap(long, default_value = "")]
        search: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum DealCommand {
    Show,
    Deposit {
        /// Amount in ETH, e.g. `0.5`.
        #[clap(parse(try_from_str = parse_ether))]
        amount: U256,
    },
    Close,
    Arbitrate,
    Resolve {
        winner: Address,
    },
}

#[derive(Subcommand, Debug)]
pub enum AcpCommand {
    Show,
    Job {
        #[clap(parse(try_from_str = parse_uint))]
        id: U256,
    },
    CreateJob {
        #[clap(long)]
        provider: Address,
        #[clap(long)]
        evaluator: Address,
        /// RFC 3339 date or unix seconds.
        #[clap(long, parse(try_from_str = parse_unix_time))]
        expired_at: u64,
    },
    SetBudget {
        #[clap(parse(try_from_str = parse_uint))]
        job_id: U256,
        /// Budget in ETH.
        #[clap(parse(try_from_str = parse_ether))]
        budget: U256,
    },
    CreateMemo {
        #[clap(parse(try_from_str = parse_uint))]
        job_id: U256,
        content: String,
        #[clap(long, default_value = "message")]
        memo_type: MemoType,
        #[clap(long)]
        secured: bool,
        #[clap(long)]
        next_phase: JobPhase,
    },
    SignMemo {
        #[clap(parse(try_from_str = parse_uint))]
        memo_id: U256,
        #[clap(long)]
        reject: bool,
        #[clap(long, default_value = "")]
        reason: String,
    },
    AddEvaluator {
        evaluator: Address,
    },
    RemoveEvaluator {
        evaluator: Address,
    },
    SetFee {
        #[clap(parse(try_from_str = parse_uint))]
        platform_fee: U256,
    },
}

fn parse_unix_time(value: &str) -> Result<u64, String> {
    if let Ok(seconds) = value.parse::<u64>() {
        return Ok(seconds);
    }
    let date = DateTime::parse_from_rfc3339(value)
        .map_err(|err| format!("expected unix seconds or an RFC 3339 date: {err}"))?;
    u64::try_from(date.timestamp()).map_err(|_| "date is before 1970".to_string())
}

fn parse_uint(value: &str) -> Result<U256, String> {
    U256::from_dec_str(value).map_err(|err| format!("invalid integer: {err}"))
}

fn parse_ether(value: &str) -> Result<U256, String> {
    parse_ether_amount(value).map_err(|err| err.to_string())
}
