//! Transactional execution of auction calls.
//!
//! A [`Runtime`] owns the module state together with the token ledger and
//! applies one call at a time. Handlers validate everything before their
//! first write, so a call that fails leaves both exactly as they were.

use std::sync::Arc;

use auction_types::{Address, EmittedEvent};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::call::AuctionCall;
use crate::error::AuctionError;
use crate::genesis::{AuctionGenesisConfig, GenesisValidationError};
use crate::handlers::{dispatch, CallContext, CallReceipt, HandlerResult};
use crate::queries::{handle_query, AuctionQuery, AuctionQueryResponse};
use crate::state::AuctionState;
use crate::token::TokenLedger;

/// Module state plus the ledger it moves funds on.
#[derive(Debug, Clone)]
pub struct Runtime<L> {
    state: AuctionState,
    token: L,
}

impl<L: TokenLedger> Runtime<L> {
    /// Build a runtime from a validated genesis config.
    pub fn new(config: &AuctionGenesisConfig, token: L) -> Result<Self, GenesisValidationError> {
        config.validate()?;
        Ok(Self {
            state: AuctionState::new(config),
            token,
        })
    }

    /// Apply a call atomically.
    pub fn execute(&mut self, ctx: &CallContext, call: AuctionCall) -> HandlerResult<CallReceipt> {
        let name = call.name();

        match dispatch(&mut self.state, &mut self.token, ctx, call) {
            Ok(receipt) => {
                debug!(call = name, sender = %hex::encode(ctx.sender), "Call applied");
                Ok(receipt)
            }
            Err(e) => {
                warn!(call = name, code = e.code(), error = %e, "Call rejected");
                Err(e)
            }
        }
    }

    pub fn query(&self, query: AuctionQuery) -> AuctionQueryResponse {
        handle_query(&self.state, query)
    }

    pub fn state(&self) -> &AuctionState {
        &self.state
    }

    pub fn token(&self) -> &L {
        &self.token
    }

    /// Direct ledger access for hosts (funding, approvals).
    pub fn token_mut(&mut self) -> &mut L {
        &mut self.token
    }

    pub fn treasury_balance(&self) -> u64 {
        self.token.balance_of(&self.state.treasury)
    }

    /// Check that the treasury covers every outstanding obligation.
    pub fn check_reconciliation(&self) -> Result<(), AuctionError> {
        let balance = self.treasury_balance();
        let required = self.state.required_reserve();
        if (balance as u128) < required {
            return Err(AuctionError::InsufficientBalance {
                available: balance,
                required: u64::try_from(required).unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }

    pub fn drain_events(&mut self) -> Vec<EmittedEvent> {
        self.state.drain_events()
    }
}

/// Runtime behind a lock, cloneable across threads.
#[derive(Debug)]
pub struct SharedRuntime<L> {
    inner: Arc<RwLock<Runtime<L>>>,
}

impl<L> Clone for SharedRuntime<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: TokenLedger> SharedRuntime<L> {
    pub fn new(runtime: Runtime<L>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(runtime)),
        }
    }

    pub fn execute(&self, ctx: &CallContext, call: AuctionCall) -> HandlerResult<CallReceipt> {
        self.inner.write().execute(ctx, call)
    }

    pub fn query(&self, query: AuctionQuery) -> AuctionQueryResponse {
        self.inner.read().query(query)
    }

    pub fn balance_of(&self, owner: &Address) -> u64 {
        self.inner.read().token().balance_of(owner)
    }

    /// Run `f` with exclusive access, e.g. to fund accounts.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Runtime<L>) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub fn drain_events(&self) -> Vec<EmittedEvent> {
        self.inner.write().drain_events()
    }
}
