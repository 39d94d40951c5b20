//! State structures for the auction module.

use auction_types::{Address, Auction, AuctionEvent, AuctionParams, EmittedEvent};
use std::collections::HashMap;

use crate::error::AuctionError;
use crate::genesis::AuctionGenesisConfig;
use crate::handlers::CallContext;

/// Auction module state.
///
/// One instance holds the whole ledger. Every mutating call takes it by
/// exclusive reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionState {
    /// Administrative account
    pub owner: Address,

    /// The module's own account on the token ledger
    pub treasury: Address,

    /// Parameters applied to the next auction
    pub params: AuctionParams,

    /// Funding floor checked when an auction starts
    pub min_start_balance: u64,

    /// Id of the most recently created auction (0 = none)
    pub current_auction_id: u64,

    /// All auctions; auction `n` lives at index `n - 1`
    pub auctions: Vec<Auction>,

    /// Total platform fees ever accrued to the owner pool
    pub platform_fees_collected: u64,

    /// Total platform fees ever withdrawn or committed to a prize
    pub platform_fees_claimed: u64,

    /// Unwithdrawn referral rewards per referrer
    pub referral_rewards: HashMap<Address, u64>,

    /// Sum of `referral_rewards`
    pub total_referral_rewards: u64,

    /// Prizes of ended auctions not yet claimed by their winners
    pub reserved_prizes: u64,

    /// Events emitted and not yet drained by the host
    pub events: Vec<EmittedEvent>,

    /// Block of the last emitted event
    event_block: u64,

    /// Log index the next event in `event_block` gets
    next_log_index: u32,
}

impl AuctionState {
    /// Create state from a genesis config.
    ///
    /// The config is expected to have been validated.
    pub fn new(config: &AuctionGenesisConfig) -> Self {
        Self {
            owner: config.owner,
            treasury: config.treasury,
            params: config.params.clone(),
            min_start_balance: config.min_start_balance,
            current_auction_id: 0,
            auctions: Vec::new(),
            platform_fees_collected: 0,
            platform_fees_claimed: 0,
            referral_rewards: HashMap::new(),
            total_referral_rewards: 0,
            reserved_prizes: 0,
            events: Vec::new(),
            event_block: 0,
            next_log_index: 0,
        }
    }

    /// Get auction by ID.
    pub fn get_auction(&self, auction_id: u64) -> Option<&Auction> {
        let index = auction_id.checked_sub(1)?;
        self.auctions.get(usize::try_from(index).ok()?)
    }

    /// Get mutable auction by ID.
    pub fn get_auction_mut(&mut self, auction_id: u64) -> Option<&mut Auction> {
        let index = auction_id.checked_sub(1)?;
        self.auctions.get_mut(usize::try_from(index).ok()?)
    }

    /// The most recently created auction.
    pub fn current_auction(&self) -> Option<&Auction> {
        self.get_auction(self.current_auction_id)
    }

    pub fn current_auction_mut(&mut self) -> Option<&mut Auction> {
        self.get_auction_mut(self.current_auction_id)
    }

    /// Append a new auction; returns its id.
    pub(crate) fn push_auction(&mut self, auction: Auction) -> u64 {
        let auction_id = auction.auction_id;
        debug_assert_eq!(auction_id, self.auctions.len() as u64 + 1);
        self.auctions.push(auction);
        self.current_auction_id = auction_id;
        auction_id
    }

    /// Platform fees the owner may still withdraw.
    pub fn withdrawable_platform_fees(&self) -> u64 {
        self.platform_fees_collected
            .saturating_sub(self.platform_fees_claimed)
    }

    /// Get a referrer's unwithdrawn rewards.
    pub fn get_referral_rewards(&self, address: &Address) -> u64 {
        self.referral_rewards.get(address).copied().unwrap_or(0)
    }

    /// Fail with `Overflow` if crediting `amount` would overflow.
    ///
    /// Each referrer's balance is bounded by the total, so passing this check
    /// guarantees `credit_referral` succeeds.
    pub(crate) fn check_referral_credit(&self, amount: u64) -> Result<(), AuctionError> {
        self.total_referral_rewards
            .checked_add(amount)
            .map(|_| ())
            .ok_or(AuctionError::Overflow)
    }

    /// Add to a referrer's rewards.
    pub(crate) fn credit_referral(
        &mut self,
        referrer: Address,
        amount: u64,
    ) -> Result<(), AuctionError> {
        let total = self
            .total_referral_rewards
            .checked_add(amount)
            .ok_or(AuctionError::Overflow)?;
        let balance = self.referral_rewards.entry(referrer).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(AuctionError::Overflow)?;
        self.total_referral_rewards = total;
        Ok(())
    }

    /// Zero a referrer's rewards and return what they held.
    pub(crate) fn take_referral_rewards(&mut self, referrer: &Address) -> u64 {
        let amount = self.referral_rewards.remove(referrer).unwrap_or(0);
        self.total_referral_rewards -= amount;
        amount
    }

    /// Amount the treasury must hold to cover every outstanding obligation.
    ///
    /// Covers the prize and the refundable highest bid of an unfinished
    /// auction, unclaimed platform fees, referral rewards and reserved prizes.
    pub fn required_reserve(&self) -> u128 {
        let open_auction = self
            .current_auction()
            .filter(|a| !a.ended)
            .map(|a| a.auction_amount as u128 + a.highest_bid as u128)
            .unwrap_or(0);

        open_auction
            + self.withdrawable_platform_fees() as u128
            + self.total_referral_rewards as u128
            + self.reserved_prizes as u128
    }

    /// Record an event for the host to pick up.
    ///
    /// Log indexes count from zero within each block, across drains.
    pub(crate) fn emit(&mut self, ctx: &CallContext, event: AuctionEvent) {
        if ctx.block_height != self.event_block {
            self.event_block = ctx.block_height;
            self.next_log_index = 0;
        }
        let log_index = self.next_log_index;
        self.next_log_index = self.next_log_index.saturating_add(1);
        self.events.push(EmittedEvent {
            block_height: ctx.block_height,
            log_index,
            timestamp: ctx.timestamp,
            event,
        });
    }

    /// Hand all pending events to the caller.
    pub fn drain_events(&mut self) -> Vec<EmittedEvent> {
        std::mem::take(&mut self.events)
    }
}
