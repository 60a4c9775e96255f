use super::{send, InteractionError};
use crate::{
    abi::DEAL_ABI,
    chain::WalletClient,
    contract::{self, CallError},
};
use chrono::{DateTime, TimeZone, Utc};
use ethabi::Token;
use ethers_core::types::{Address, H256, U256};
use std::{fmt, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealAction {
    Deposit,
    Close,
    StartArbitration,
    ResolveArbitration,
}

impl fmt::Display for DealAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DealAction::Deposit => "deposit",
            DealAction::Close => "close deal",
            DealAction::StartArbitration => "start arbitration",
            DealAction::ResolveArbitration => "resolve arbitration",
        };
        f.write_str(name)
    }
}

/// Which parties of a deal an account is. One account may hold several roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DealRole {
    pub buyer: bool,
    pub seller: bool,
    pub evaluator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealState {
    pub address: Address,
    pub buyer: Address,
    pub seller: Address,
    pub evaluator: Address,
    pub limitation_date: u64,
    pub arbitration: bool,
}

impl DealState {
    pub fn role(&self, user: &Address) -> DealRole {
        DealRole {
            buyer: &self.buyer == user,
            seller: &self.seller == user,
            evaluator: &self.evaluator == user,
        }
    }

    pub fn allowed_actions(&self, user: &Address) -> Vec<DealAction> {
        [
            DealAction::Deposit,
            DealAction::Close,
            DealAction::StartArbitration,
            DealAction::ResolveArbitration,
        ]
        .into_iter()
        .filter(|action| self.check(*action, user).is_ok())
        .collect()
    }

    /// Errors with the reason `action` cannot be taken by `user` in this state.
    pub fn check(&self, action: DealAction, user: &Address) -> Result<(), InteractionError> {
        let role = self.role(user);
        let (permitted, missing_role) = match action {
            DealAction::Deposit => (role.buyer, "only the buyer can deposit"),
            DealAction::Close => (role.seller, "only the seller can close the deal"),
            DealAction::StartArbitration => (
                role.buyer || role.seller,
                "only the buyer or the seller can start arbitration",
            ),
            DealAction::ResolveArbitration => {
                (role.evaluator, "only the evaluator can resolve arbitration")
            }
        };
        if !permitted {
            return Err(InteractionError::not_allowed(action, missing_role));
        }
        match (action, self.arbitration) {
            (DealAction::ResolveArbitration, false) => Err(InteractionError::not_allowed(
                action,
                "the deal is not in arbitration",
            )),
            (DealAction::ResolveArbitration, true) | (_, false) => Ok(()),
            (_, true) => Err(InteractionError::not_allowed(
                action,
                "the deal is in arbitration",
            )),
        }
    }

    pub fn limitation_date(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.limitation_date)
            .ok()
            .and_then(|seconds| Utc.timestamp_opt(seconds, 0).single())
    }
}

/// A deployed Deal contract driven by a wallet.
pub struct DealContract<W: ?Sized> {
    wallet: Arc<W>,
    address: Address,
}

impl<W: WalletClient + ?Sized> DealContract<W> {
    pub fn new(wallet: Arc<W>, address: Address) -> Self {
        Self { wallet, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn state(&self) -> Result<DealState, CallError> {
        let wallet = self.wallet.as_ref();
        let read = |function: &'static str| {
            contract::read_single(wallet, &DEAL_ABI, self.address, function)
        };
        let (buyer, seller, evaluator, limitation_date, arbitration) = futures::try_join!(
            read("buyer"),
            read("seller"),
            read("evaluatorAddress"),
            read("limitationDate"),
            read("arbitrationFlag"),
        )?;
        Ok(DealState {
            address: self.address,
            buyer: contract::into_address(buyer, "buyer")?,
            seller: contract::into_address(seller, "seller")?,
            evaluator: contract::into_address(evaluator, "evaluatorAddress")?,
            limitation_date: contract::into_u64(limitation_date, "limitationDate")?,
            arbitration: contract::into_bool(arbitration, "arbitrationFlag")?,
        })
    }

    /// Deposits `value` wei into the escrow.
    pub async fn deposit(&self, value: U256) -> Result<H256, InteractionError> {
        if value.is_zero() {
            return Err(InteractionError::not_allowed(
                DealAction::Deposit,
                "the amount must be positive",
            ));
        }
        self.ensure_allowed(DealAction::Deposit).await?;
        self.send("deposit", &[], Some(value)).await
    }

    pub async fn close_deal(&self) -> Result<H256, InteractionError> {
        self.ensure_allowed(DealAction::Close).await?;
        self.send("closeDeal", &[], None).await
    }

    pub async fn start_arbitration(&self) -> Result<H256, InteractionError> {
        self.ensure_allowed(DealAction::StartArbitration).await?;
        self.send("startArbitration", &[], None).await
    }

    /// Settles the arbitration in favour of `winner`, which must be the buyer or the seller.
    pub async fn handle_arbitration_results(
        &self,
        winner: Address,
    ) -> Result<H256, InteractionError> {
        let state = self.ensure_allowed(DealAction::ResolveArbitration).await?;
        if winner != state.buyer && winner != state.seller {
            return Err(InteractionError::not_allowed(
                DealAction::ResolveArbitration,
                "the winner must be the buyer or the seller",
            ));
        }
        self.send("handleArbitrationResults", &[Token::Address(winner)], None)
            .await
    }

    async fn ensure_allowed(&self, action: DealAction) -> Result<DealState, InteractionError> {
        let state = self.state().await?;
        state.check(action, &self.wallet.account())?;
        Ok(state)
    }

    async fn send(
        &self,
        function: &str,
        args: &[Token],
        value: Option<U256>,
    ) -> Result<H256, InteractionError> {
        send(self.wallet.as_ref(), &DEAL_ABI, self.address, function, args, value).await
    }
}
