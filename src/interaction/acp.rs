use super::{send, InteractionError};
use crate::{
    abi::ACP_ABI,
    chain::WalletClient,
    contract::{self, CallError},
};
use ethabi::Token;
use ethers_core::types::{Address, H256, U256};
use std::{fmt, str::FromStr, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobPhase {
    Request = 0,
    Negotiation = 1,
    Transaction = 2,
    Evaluation = 3,
    Completed = 4,
    Rejected = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MemoType {
    Message = 0,
    ContextUrl = 1,
    ImageUrl = 2,
    VoiceUrl = 3,
    ObjectUrl = 4,
    TxHash = 5,
}

const PHASES: [(JobPhase, &str); 6] = [
    (JobPhase::Request, "request"),
    (JobPhase::Negotiation, "negotiation"),
    (JobPhase::Transaction, "transaction"),
    (JobPhase::Evaluation, "evaluation"),
    (JobPhase::Completed, "completed"),
    (JobPhase::Rejected, "rejected"),
];

const MEMO_TYPES: [(MemoType, &str); 6] = [
    (MemoType::Message, "message"),
    (MemoType::ContextUrl, "context-url"),
    (MemoType::ImageUrl, "image-url"),
    (MemoType::VoiceUrl, "voice-url"),
    (MemoType::ObjectUrl, "object-url"),
    (MemoType::TxHash, "tx-hash"),
];

impl TryFrom<u8> for JobPhase {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        PHASES
            .iter()
            .map(|(phase, _)| *phase)
            .find(|phase| *phase as u8 == value)
            .ok_or(value)
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (_, name) = PHASES[*self as usize];
        f.write_str(name)
    }
}

impl FromStr for JobPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PHASES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map(|(phase, _)| *phase)
            .ok_or_else(|| format!("unknown job phase: {s}"))
    }
}

impl fmt::Display for MemoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (_, name) = MEMO_TYPES[*self as usize];
        f.write_str(name)
    }
}

impl FromStr for MemoType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MEMO_TYPES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map(|(memo_type, _)| *memo_type)
            .ok_or_else(|| format!("unknown memo type: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcpState {
    pub address: Address,
    pub platform_fee: U256,
    pub owner: Address,
    pub job_counter: U256,
}

impl AcpState {
    pub fn is_owner(&self, user: &Address) -> bool {
        &self.owner == user
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: U256,
    pub client: Address,
    pub provider: Address,
    pub evaluator: Address,
    pub budget: U256,
    pub amount_claimed: U256,
    /// Raw phase, see [`Job::phase`].
    pub phase: u8,
    pub memo_count: U256,
    pub expired_at: U256,
}

impl Job {
    pub fn phase(&self) -> Option<JobPhase> {
        JobPhase::try_from(self.phase).ok()
    }

    fn from_tokens(tokens: Vec<Token>) -> Result<Self, CallError> {
        let [id, client, provider, evaluator, budget, amount_claimed, phase, memo_count, expired_at] =
            <[Token; 9]>::try_from(tokens)
                .map_err(|_| CallError::UnexpectedOutput("jobs".to_string()))?;
        let phase = contract::into_uint(phase, "jobs")?;
        if phase > U256::from(u8::MAX) {
            return Err(CallError::UnexpectedOutput("jobs".to_string()));
        }
        Ok(Job {
            id: contract::into_uint(id, "jobs")?,
            client: contract::into_address(client, "jobs")?,
            provider: contract::into_address(provider, "jobs")?,
            evaluator: contract::into_address(evaluator, "jobs")?,
            budget: contract::into_uint(budget, "jobs")?,
            amount_claimed: contract::into_uint(amount_claimed, "jobs")?,
            phase: phase.low_u32() as u8,
            memo_count: contract::into_uint(memo_count, "jobs")?,
            expired_at: contract::into_uint(expired_at, "jobs")?,
        })
    }
}

/// A deployed ACP contract driven by a wallet.
pub struct AcpContract<W: ?Sized> {
    wallet: Arc<W>,
    address: Address,
}

impl<W: WalletClient + ?Sized> AcpContract<W> {
    pub fn new(wallet: Arc<W>, address: Address) -> Self {
        Self { wallet, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn state(&self) -> Result<AcpState, CallError> {
        let wallet = self.wallet.as_ref();
        let read =
            |function: &'static str| contract::read_single(wallet, &ACP_ABI, self.address, function);
        let (platform_fee, owner, job_counter) = futures::try_join!(
            read("platformFee"),
            read("platformOwner"),
            read("jobCounter"),
        )?;
        Ok(AcpState {
            address: self.address,
            platform_fee: contract::into_uint(platform_fee, "platformFee")?,
            owner: contract::into_address(owner, "platformOwner")?,
            job_counter: contract::into_uint(job_counter, "jobCounter")?,
        })
    }

    /// Whether `user` owns the platform and may manage evaluators and the fee.
    pub async fn is_owner(&self, user: &Address) -> Result<bool, CallError> {
        let owner = contract::read_single(self.wallet.as_ref(), &ACP_ABI, self.address, "platformOwner")
            .await?;
        Ok(&contract::into_address(owner, "platformOwner")? == user)
    }

    pub async fn is_evaluator(&self, account: Address) -> Result<bool, CallError> {
        let tokens = contract::read(
            self.wallet.as_ref(),
            &ACP_ABI,
            self.address,
            "isEvaluator",
            &[Token::Address(account)],
        )
        .await?;
        contract::into_bool(contract::single(tokens, "isEvaluator")?, "isEvaluator")
    }

    /// The job with `id`, `None` if it was never created.
    pub async fn job(&self, id: U256) -> Result<Option<Job>, CallError> {
        let tokens = contract::read(
            self.wallet.as_ref(),
            &ACP_ABI,
            self.address,
            "jobs",
            &[Token::Uint(id)],
        )
        .await?;
        let job = Job::from_tokens(tokens)?;
        Ok((!job.client.is_zero()).then(|| job))
    }

    /// Creates a job with the wallet account as the client.
    pub async fn create_job(
        &self,
        provider: Address,
        evaluator: Address,
        expired_at: u64,
    ) -> Result<H256, InteractionError> {
        if provider.is_zero() {
            return Err(InteractionError::not_allowed(
                "create job",
                "the provider address is required",
            ));
        }
        let args = [
            Token::Address(provider),
            Token::Address(evaluator),
            Token::Uint(U256::from(expired_at)),
        ];
        self.send("createJob", &args).await
    }

    /// Sets the budget of a job created by the wallet account.
    pub async fn set_budget(&self, job_id: U256, budget: U256) -> Result<H256, InteractionError> {
        let job = self
            .job(job_id)
            .await?
            .ok_or_else(|| InteractionError::not_allowed("set budget", "the job does not exist"))?;
        if job.client != self.wallet.account() {
            return Err(InteractionError::not_allowed(
                "set budget",
                "only the job client can set its budget",
            ));
        }
        self.send("setBudget", &[Token::Uint(job_id), Token::Uint(budget)])
            .await
    }

    pub async fn create_memo(
        &self,
        job_id: U256,
        content: &str,
        memo_type: MemoType,
        is_secured: bool,
        next_phase: JobPhase,
    ) -> Result<H256, InteractionError> {
        let args = [
            Token::Uint(job_id),
            Token::String(content.to_string()),
            Token::Uint(U256::from(memo_type as u8)),
            Token::Bool(is_secured),
            Token::Uint(U256::from(next_phase as u8)),
        ];
        self.send("createMemo", &args).await
    }

    pub async fn sign_memo(
        &self,
        memo_id: U256,
        approved: bool,
        reason: &str,
    ) -> Result<H256, InteractionError> {
        let args = [
            Token::Uint(memo_id),
            Token::Bool(approved),
            Token::String(reason.to_string()),
        ];
        self.send("signMemo", &args).await
    }

    pub async fn add_evaluator(&self, evaluator: Address) -> Result<H256, InteractionError> {
        self.ensure_owner("add evaluator").await?;
        self.send("addEvaluator", &[Token::Address(evaluator)]).await
    }

    pub async fn remove_evaluator(&self, evaluator: Address) -> Result<H256, InteractionError> {
        self.ensure_owner("remove evaluator").await?;
        self.send("removeEvaluator", &[Token::Address(evaluator)])
            .await
    }

    pub async fn set_platform_fee(&self, platform_fee: U256) -> Result<H256, InteractionError> {
        self.ensure_owner("set platform fee").await?;
        self.send("setPlatformFee", &[Token::Uint(platform_fee)])
            .await
    }

    async fn ensure_owner(&self, action: &str) -> Result<(), InteractionError> {
        if !self.is_owner(&self.wallet.account()).await? {
            return Err(InteractionError::not_allowed(
                action,
                "only the platform owner can do this",
            ));
        }
        Ok(())
    }

    async fn send(&self, function: &str, args: &[Token]) -> Result<H256, InteractionError> {
        send(self.wallet.as_ref(), &ACP_ABI, self.address, function, args, None).await
    }
}
