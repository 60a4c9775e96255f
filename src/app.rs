//! Wires settings into services and executes cli commands.

use crate::{
    abi::Artifact,
    chain::{wait_for_receipt, HttpChainClient, Network, ReceiptPolling, Wallet, WalletClient},
    cli::{AcpCommand, Args, Command, DealCommand},
    deployer::{DealParams, Deployer},
    discovery::ContractDiscovery,
    history::{self, TransactionHistory},
    indexer::AlchemyIndexer,
    interaction::{AcpContract, DealContract},
    rpc::JsonRpcTransport,
    settings::Settings,
    storage::{ContractStore, FileStorage, KeyValueStorage, MemoryStorage},
    types::{ContractDetails, ContractRecord},
};
use anyhow::Context;
use ethers_core::types::{Address, H256, U64};
use std::{path::PathBuf, sync::Arc};

pub struct App {
    settings: Settings,
    store: Arc<ContractStore>,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        let storage: Arc<dyn KeyValueStorage> = if settings.storage.in_memory {
            Arc::new(MemoryStorage::default())
        } else {
            Arc::new(FileStorage::new(&settings.storage.path))
        };
        let store = Arc::new(ContractStore::with_key(storage, &settings.storage.key));
        Self { settings, store }
    }

    pub fn store(&self) -> &Arc<ContractStore> {
        &self.store
    }

    fn network(&self) -> Network {
        self.settings.network
    }

    fn polling(&self) -> ReceiptPolling {
        self.settings.wallet.polling()
    }

    pub fn chain_client(&self) -> anyhow::Result<HttpChainClient> {
        let chain = &self.settings.chain;
        let transport = JsonRpcTransport::new(
            chain.rpc_url(self.network()),
            chain.timeout(),
            chain.request_attempts,
        )?;
        Ok(HttpChainClient::new(transport))
    }

    pub fn indexer(&self) -> anyhow::Result<Option<AlchemyIndexer>> {
        let settings = &self.settings.indexer;
        let endpoint = match settings.endpoint(self.network())? {
            Some(endpoint) => endpoint,
            None => return Ok(None),
        };
        let transport = JsonRpcTransport::new(
            endpoint,
            self.settings.chain.timeout(),
            self.settings.chain.request_attempts,
        )?;
        Ok(Some(AlchemyIndexer::new(
            transport,
            settings.max_count,
            settings.max_pages,
        )))
    }

    /// Connects to the wallet and checks it is on the configured network.
    pub async fn wallet(&self) -> anyhow::Result<Arc<Wallet>> {
        let wallet_settings = &self.settings.wallet;
        let transport = JsonRpcTransport::new(
            wallet_settings.rpc_url.clone(),
            self.settings.chain.timeout(),
            self.settings.chain.request_attempts,
        )?;
        let client = HttpChainClient::new(transport);
        let chain_id = client
            .chain_id()
            .await
            .context("wallet is not reachable")?;
        if chain_id != U64::from(self.network().chain_id()) {
            anyhow::bail!(
                "wallet is connected to chain {}, expected {} ({})",
                chain_id,
                self.network(),
                self.network().chain_id()
            );
        }
        Ok(Arc::new(Wallet::connect(client).await?))
    }

    pub async fn run(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Discover { address, json } => {
                let user = match address {
                    Some(address) => address,
                    None => self.wallet().await?.account(),
                };
                let mut discovery = ContractDiscovery::new(self.store.clone());
                match self.chain_client() {
                    Ok(chain) => discovery = discovery.with_chain(Arc::new(chain)),
                    Err(err) => log::warn!("chain client is unavailable: {}", err),
                }
                if let Some(indexer) = self.indexer()? {
                    discovery = discovery.with_indexer(Arc::new(indexer));
                }
                let records = discovery.discover(user).await;
                self.print_records(&records, json)
            }
            Command::Contracts { participant, json } => {
                let records = match participant {
                    Some(participant) => self.store.by_participant(&participant),
                    None => self.store.all(),
                };
                self.print_records(&records, json)
            }
            Command::DeployDeal {
                buyer,
                seller,
                evaluator,
                limitation_date,
                artifact,
            } => {
                let artifact = load_artifact(
                    artifact.unwrap_or_else(|| self.settings.artifacts.deal.clone()),
                )?;
                let params = DealParams {
                    buyer,
                    seller,
                    evaluator,
                    limitation_date,
                };
                let record = self
                    .deployer()
                    .await?
                    .deploy_deal(&artifact, &params)
                    .await?;
                self.print_records(&[record], false)
            }
            Command::DeployAcp {
                platform_fee,
                artifact,
            } => {
                let artifact = load_artifact(
                    artifact.unwrap_or_else(|| self.settings.artifacts.acp.clone()),
                )?;
                let record = self
                    .deployer()
                    .await?
                    .deploy_acp(&artifact, platform_fee)
                    .await?;
                self.print_records(&[record], false)
            }
            Command::Deal { address, command } => self.run_deal(address, command).await,
            Command::Acp { address, command } => self.run_acp(address, command).await,
            Command::History { search } => {
                let wallet = self.wallet().await?;
                let indexer = self
                    .indexer()?
                    .context("transfer history needs an indexer url or api key")?;
                let transactions = TransactionHistory::load(&indexer, wallet.account()).await?;
                for transfer in transactions.filter(&search) {
                    let to = transfer
                        .to
                        .as_ref()
                        .map(history::short_address)
                        .unwrap_or_else(|| "-".to_string());
                    let time = transfer
                        .block_timestamp()
                        .map(|time| time.to_rfc3339())
                        .unwrap_or_default();
                    println!(
                        "{:<17} {:>16} {} -> {} block {} {} {}",
                        history::kind(transfer).to_string(),
                        history::format_value(transfer),
                        history::short_address(&transfer.from),
                        to,
                        transfer.block_num,
                        time,
                        history::explorer_tx_url(self.network(), &transfer.hash)?,
                    );
                }
                Ok(())
            }
        }
    }

    async fn deployer(&self) -> anyhow::Result<Deployer<Wallet>> {
        Ok(Deployer::new(
            self.wallet().await?,
            self.store.clone(),
            self.polling(),
        ))
    }

    async fn run_deal(&self, address: Address, command: DealCommand) -> anyhow::Result<()> {
        let wallet = self.wallet().await?;
        let deal = DealContract::new(wallet.clone(), address);
        let hash = match command {
            DealCommand::Show => {
                let state = deal.state().await?;
                let role = state.role(&wallet.account());
                println!("deal        {:?}", state.address);
                println!("buyer       {:?}", state.buyer);
                println!("seller      {:?}", state.seller);
                println!("evaluator   {:?}", state.evaluator);
                match state.limitation_date() {
                    Some(date) => println!("limitation  {}", date.to_rfc3339()),
                    None => println!("limitation  {}", state.limitation_date),
                }
                println!(
                    "status      {}",
                    if state.arbitration {
                        "in arbitration"
                    } else {
                        "active"
                    }
                );
                println!("your role   {:?}", role);
                let actions: Vec<_> = state
                    .allowed_actions(&wallet.account())
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                println!("actions     {}", actions.join(", "));
                return Ok(());
            }
            DealCommand::Deposit { amount } => deal.deposit(amount).await?,
            DealCommand::Close => deal.close_deal().await?,
            DealCommand::Arbitrate => deal.start_arbitration().await?,
            DealCommand::Resolve { winner } => deal.handle_arbitration_results(winner).await?,
        };
        self.confirm(wallet.as_ref(), hash).await
    }

    async fn run_acp(&self, address: Address, command: AcpCommand) -> anyhow::Result<()> {
        let wallet = self.wallet().await?;
        let acp = AcpContract::new(wallet.clone(), address);
        let hash = match command {
            AcpCommand::Show => {
                let state = acp.state().await?;
                println!("acp           {:?}", state.address);
                println!("platform fee  {}", state.platform_fee);
                println!("owner         {:?}", state.owner);
                println!("jobs          {}", state.job_counter);
                println!("you are owner {}", state.is_owner(&wallet.account()));
                return Ok(());
            }
            AcpCommand::Job { id } => {
                let job = acp.job(id).await?.context("job does not exist")?;
                let phase = job
                    .phase()
                    .map(|phase| phase.to_string())
                    .unwrap_or_else(|| format!("unknown ({})", job.phase));
                println!("job         {}", job.id);
                println!("client      {:?}", job.client);
                println!("provider    {:?}", job.provider);
                println!("evaluator   {:?}", job.evaluator);
                println!("budget      {}", job.budget);
                println!("claimed     {}", job.amount_claimed);
                println!("phase       {}", phase);
                println!("memos       {}", job.memo_count);
                println!("expires at  {}", job.expired_at);
                return Ok(());
            }
            AcpCommand::CreateJob {
                provider,
                evaluator,
                expired_at,
            } => acp.create_job(provider, evaluator, expired_at).await?,
            AcpCommand::SetBudget { job_id, budget } => acp.set_budget(job_id, budget).await?,
            AcpCommand::CreateMemo {
                job_id,
                content,
                memo_type,
                secured,
                next_phase,
            } => {
                acp.create_memo(job_id, &content, memo_type, secured, next_phase)
                    .await?
            }
            AcpCommand::SignMemo {
                memo_id,
                reject,
                reason,
            } => acp.sign_memo(memo_id, !reject, &reason).await?,
            AcpCommand::AddEvaluator { evaluator } => acp.add_evaluator(evaluator).await?,
            AcpCommand::RemoveEvaluator { evaluator } => acp.remove_evaluator(evaluator).await?,
            AcpCommand::SetFee { platform_fee } => acp.set_platform_fee(platform_fee).await?,
        };
        self.confirm(wallet.as_ref(), hash).await
    }

    async fn confirm(&self, wallet: &Wallet, hash: H256) -> anyhow::Result<()> {
        println!("sent {}", history::explorer_tx_url(self.network(), &hash)?);
        let polling = self.polling();
        let receipt = wait_for_receipt(wallet, hash, polling.interval, polling.attempts).await?;
        match receipt.status {
            Some(status) if status.is_zero() => anyhow::bail!("transaction {:?} reverted", hash),
            _ => {
                println!("confirmed in block {}", receipt.block_number.unwrap_or_default());
                Ok(())
            }
        }
    }

    fn print_records(&self, records: &[ContractRecord], json: bool) -> anyhow::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(records)?);
            return Ok(());
        }
        if records.is_empty() {
            println!("no contracts found");
        }
        for record in records {
            let details = match &record.details {
                ContractDetails::Simple {
                    buyer,
                    seller,
                    evaluator_address,
                    limitation_date,
                } => format!(
                    "buyer {} seller {} evaluator {} limitation {}",
                    history::short_address(buyer),
                    history::short_address(seller),
                    history::short_address(evaluator_address),
                    limitation_date
                ),
                ContractDetails::Acp { platform_fee } => format!("platform fee {}", platform_fee),
            };
            println!(
                "{:<6} {:?} deployed {} {} {}",
                record.kind().to_string(),
                record.address,
                record.deployed_at.to_rfc3339(),
                details,
                history::explorer_address_url(self.network(), &record.address)?
            );
        }
        Ok(())
    }
}

fn load_artifact(path: PathBuf) -> anyhow::Result<Artifact> {
    Artifact::from_file(&path).with_context(|| format!("cannot load artifact {}", path.display()))
}

/// Entry point of the binary.
pub async fn run(args: Args) -> anyhow::Result<()> {
    let settings = match args.config_path {
        Some(path) => Settings::build(Some(path))?,
        None => Settings::new()?,
    };
    log::debug!("using network {}", settings.network);
    App::new(settings).run(args.command).await
}
