//! Call handlers for the auction module.
//!
//! These functions implement the business logic for each call type. Each one
//! checks every precondition and computes every new counter before the first
//! token transfer, so a failing call leaves state as it found it.

use auction_types::{
    non_null, Address, Auction, AuctionCreated, AuctionEnded, AuctionEvent, BidPlaced,
};
use tracing::{debug, info, warn};

use crate::call::AuctionCall;
use crate::error::AuctionError;
use crate::genesis::{check_fee_ordering, check_positive};
use crate::state::AuctionState as ModuleState;
use crate::token::TokenLedger;

/// Context provided by the runtime for each call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallContext {
    /// Sender of the transaction
    pub sender: Address,
    /// Current block height
    pub block_height: u64,
    /// Current timestamp (seconds)
    pub timestamp: u64,
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, AuctionError>;

/// What a successful call produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallReceipt {
    AuctionStarted { auction_id: u64, auction_amount: u64 },
    BidAccepted { amount: u64, finalized: bool },
    AuctionEnded { winner: Option<Address> },
    PrizeClaimed { amount: u64 },
    Withdrawn { amount: u64 },
    ConfigUpdated,
}

/// Route a call to its handler.
pub fn dispatch<L: TokenLedger + ?Sized>(
    state: &mut ModuleState,
    token: &mut L,
    ctx: &CallContext,
    call: AuctionCall,
) -> HandlerResult<CallReceipt> {
    match call {
        AuctionCall::StartAuction => {
            let auction_id = handle_start_auction(state, token, ctx)?;
            let auction_amount = state
                .get_auction(auction_id)
                .map(|a| a.auction_amount)
                .unwrap_or_default();
            Ok(CallReceipt::AuctionStarted {
                auction_id,
                auction_amount,
            })
        }
        AuctionCall::PlaceBid { referral } => {
            let amount = handle_place_bid(state, token, ctx, referral)?;
            let finalized = state.current_auction().map(|a| a.ended).unwrap_or(false);
            Ok(CallReceipt::BidAccepted { amount, finalized })
        }
        AuctionCall::EndAuction => {
            let winner = handle_end_auction(state, ctx)?;
            Ok(CallReceipt::AuctionEnded { winner })
        }
        AuctionCall::ClaimPrize { auction_id } => {
            let amount = handle_claim_prize(state, token, ctx, auction_id)?;
            Ok(CallReceipt::PrizeClaimed { amount })
        }
        AuctionCall::WithdrawPlatformFees => {
            let amount = handle_withdraw_platform_fees(state, token, ctx)?;
            Ok(CallReceipt::Withdrawn { amount })
        }
        AuctionCall::WithdrawReferralRewards => {
            let amount = handle_withdraw_referral_rewards(state, token, ctx)?;
            Ok(CallReceipt::Withdrawn { amount })
        }
        AuctionCall::SetAuctionAmount { amount } => {
            handle_set_auction_amount(state, ctx, amount).map(|_| CallReceipt::ConfigUpdated)
        }
        AuctionCall::SetAuctionDuration { duration } => {
            handle_set_auction_duration(state, ctx, duration).map(|_| CallReceipt::ConfigUpdated)
        }
        AuctionCall::SetAuctionDurationIncrease { increase } => {
            handle_set_auction_duration_increase(state, ctx, increase)
                .map(|_| CallReceipt::ConfigUpdated)
        }
        AuctionCall::SetStartingAmount { amount } => {
            handle_set_starting_amount(state, ctx, amount).map(|_| CallReceipt::ConfigUpdated)
        }
        AuctionCall::SetBidIncrement { increment } => {
            handle_set_bid_increment(state, ctx, increment).map(|_| CallReceipt::ConfigUpdated)
        }
        AuctionCall::SetReferralFee { fee } => {
            handle_set_referral_fee(state, ctx, fee).map(|_| CallReceipt::ConfigUpdated)
        }
        AuctionCall::SetPlatformFee { fee } => {
            handle_set_platform_fee(state, ctx, fee).map(|_| CallReceipt::ConfigUpdated)
        }
    }
}

// =========================
// AUCTION LIFECYCLE
// =========================

/// Handle StartAuction call.
///
/// Funds the new auction from the treasury's free balance: whatever is not
/// owed to referrers or to earlier winners. Unclaimed platform fees count as
/// free and are consumed here, either into the prize or into the surplus
/// paid to the owner.
pub fn handle_start_auction<L: TokenLedger + ?Sized>(
    state: &mut ModuleState,
    token: &mut L,
    ctx: &CallContext,
) -> HandlerResult<u64> {
    // An expired auction that nobody ended is finalized on the way
    let mut stale_prize = 0;
    let mut stale_auction = None;
    if let Some(current) = state.current_auction() {
        if current.is_active(ctx.timestamp) {
            return Err(AuctionError::AuctionAlreadyActive);
        }
        if !current.ended {
            stale_auction = Some(current.auction_id);
            if current.highest_bidder.is_some() {
                stale_prize = current.auction_amount;
            }
        }
    }

    let reserved_prizes = state
        .reserved_prizes
        .checked_add(stale_prize)
        .ok_or(AuctionError::Overflow)?;
    let owed = state
        .total_referral_rewards
        .checked_add(reserved_prizes)
        .ok_or(AuctionError::Overflow)?;

    let balance = token.balance_of(&state.treasury);
    let available = balance.saturating_sub(owed);
    if available < state.min_start_balance {
        return Err(AuctionError::InsufficientBalance {
            available,
            required: state.min_start_balance,
        });
    }

    let params = state.params.clone();
    let (auction_amount, surplus) = if available >= params.auction_amount {
        (params.auction_amount, available - params.auction_amount)
    } else {
        (available, 0)
    };

    let start_time = ctx.timestamp;
    let end_time = start_time
        .checked_add(params.auction_duration)
        .ok_or(AuctionError::Overflow)?;
    let auction_id = state
        .current_auction_id
        .checked_add(1)
        .ok_or(AuctionError::Overflow)?;

    if surplus > 0 {
        token.transfer(&state.treasury, &state.owner, surplus)?;
        info!(surplus, owner = %hex::encode(state.owner), "Surplus paid to owner");
    }

    if let Some(stale_id) = stale_auction {
        finalize(state, ctx, stale_id, reserved_prizes);
    }

    // Unclaimed fees are now either prize money or part of the surplus
    let committed_fees = state.withdrawable_platform_fees();
    state.platform_fees_claimed = state.platform_fees_collected;
    debug!(committed_fees, "Unclaimed platform fees committed");

    state.push_auction(Auction {
        auction_id,
        auction_amount,
        start_time,
        end_time,
        starting_amount: params.starting_amount,
        bid_increment: params.bid_increment,
        referral_fee: params.referral_fee,
        platform_fee: params.platform_fee,
        duration_increase: params.auction_duration_increase,
        bid_count: 0,
        highest_bidder: None,
        highest_bid: 0,
        ended: false,
        prize_claimed: false,
    });

    state.emit(
        ctx,
        AuctionEvent::AuctionCreated(AuctionCreated {
            auction_id,
            auction_amount,
            start_time,
            end_time,
            starting_amount: params.starting_amount,
            bid_increment: params.bid_increment,
            referral_fee: params.referral_fee,
            platform_fee: params.platform_fee,
        }),
    );

    info!(
        auction_id,
        auction_amount,
        end_time,
        degraded = auction_amount < params.auction_amount,
        "Auction started"
    );
    Ok(auction_id)
}

/// Handle PlaceBid call.
///
/// Returns the value of the accepted bid.
pub fn handle_place_bid<L: TokenLedger + ?Sized>(
    state: &mut ModuleState,
    token: &mut L,
    ctx: &CallContext,
    referral: Option<Address>,
) -> HandlerResult<u64> {
    let auction = state.current_auction().ok_or(AuctionError::NoAuction)?;

    if !auction.is_active(ctx.timestamp) {
        return Err(AuctionError::AuctionNotActive);
    }
    if auction.highest_bidder == Some(ctx.sender) {
        return Err(AuctionError::AlreadyHighestBidder);
    }

    let auction_id = auction.auction_id;
    let new_bid = auction.next_bid().ok_or(AuctionError::Overflow)?;
    let total = new_bid
        .checked_add(auction.platform_fee)
        .ok_or(AuctionError::Overflow)?;

    // Self-referrals and the null address earn nothing
    let referrer = non_null(referral).filter(|r| *r != ctx.sender);
    let referral_credit = if referrer.is_some() {
        auction.referral_fee
    } else {
        0
    };
    let owner_fee = auction
        .platform_fee
        .checked_sub(referral_credit)
        .ok_or(AuctionError::Overflow)?;
    let platform_fees_collected = state
        .platform_fees_collected
        .checked_add(owner_fee)
        .ok_or(AuctionError::Overflow)?;
    state.check_referral_credit(referral_credit)?;

    let finalizes = new_bid >= auction.auction_amount;
    let new_end_time = if finalizes {
        auction.end_time
    } else {
        auction
            .end_time
            .checked_add(auction.duration_increase)
            .ok_or(AuctionError::Overflow)?
    };
    let reserved_prizes = if finalizes {
        state
            .reserved_prizes
            .checked_add(auction.auction_amount)
            .ok_or(AuctionError::Overflow)?
    } else {
        state.reserved_prizes
    };
    let bid_count = auction
        .bid_count
        .checked_add(1)
        .ok_or(AuctionError::Overflow)?;
    let outbid = auction.highest_bidder.map(|b| (b, auction.highest_bid));

    // Pull first: the only transfer the caller can make fail. The pull alone
    // covers the refund since every bid exceeds the one it replaces.
    let treasury = state.treasury;
    token.transfer_from(&treasury, &ctx.sender, &treasury, total)?;
    if let Some((previous, amount)) = outbid {
        token.transfer(&treasury, &previous, amount)?;
        debug!(auction_id, previous = %hex::encode(previous), amount, "Refunded outbid bidder");
    }

    state.platform_fees_collected = platform_fees_collected;
    if let Some(referrer) = referrer {
        state.credit_referral(referrer, referral_credit)?;
    }

    let auction = state
        .current_auction_mut()
        .ok_or(AuctionError::NoAuction)?;
    auction.highest_bid = new_bid;
    auction.highest_bidder = Some(ctx.sender);
    auction.bid_count = bid_count;

    if finalizes {
        finalize(state, ctx, auction_id, reserved_prizes);
    } else {
        auction.end_time = new_end_time;
        state.emit(
            ctx,
            AuctionEvent::BidPlaced(BidPlaced {
                auction_id,
                bidder: ctx.sender,
                amount: new_bid,
                referral,
                new_end_time,
            }),
        );
    }

    info!(
        auction_id,
        bidder = %hex::encode(ctx.sender),
        amount = new_bid,
        fee = owner_fee,
        referral_credit,
        finalized = finalizes,
        "Bid placed"
    );
    Ok(new_bid)
}

/// Handle EndAuction call.
///
/// Expiry is not checked here; callers are expected to end an auction only
/// once its `end_time` has passed.
pub fn handle_end_auction(
    state: &mut ModuleState,
    ctx: &CallContext,
) -> HandlerResult<Option<Address>> {
    let auction = state.current_auction().ok_or(AuctionError::NoAuction)?;

    if auction.ended {
        return Err(AuctionError::AuctionAlreadyEnded);
    }
    if ctx.timestamp < auction.end_time {
        warn!(
            auction_id = auction.auction_id,
            end_time = auction.end_time,
            now = ctx.timestamp,
            "Auction ended before its end time"
        );
    }

    let auction_id = auction.auction_id;
    let winner = auction.highest_bidder;
    let reserved_prizes = if winner.is_some() {
        state
            .reserved_prizes
            .checked_add(auction.auction_amount)
            .ok_or(AuctionError::Overflow)?
    } else {
        state.reserved_prizes
    };

    finalize(state, ctx, auction_id, reserved_prizes);
    Ok(winner)
}

/// Handle ClaimPrize call.
pub fn handle_claim_prize<L: TokenLedger + ?Sized>(
    state: &mut ModuleState,
    token: &mut L,
    ctx: &CallContext,
    auction_id: u64,
) -> HandlerResult<u64> {
    let auction = state
        .get_auction(auction_id)
        .ok_or(AuctionError::AuctionNotFound(auction_id))?;

    if !auction.ended {
        return Err(AuctionError::AuctionNotEnded(auction_id));
    }
    if auction.highest_bidder != Some(ctx.sender) {
        return Err(AuctionError::NotWinner(auction_id));
    }
    if auction.prize_claimed {
        return Err(AuctionError::PrizeAlreadyClaimed(auction_id));
    }

    let amount = auction.auction_amount;
    let reserved_prizes = state
        .reserved_prizes
        .checked_sub(amount)
        .ok_or(AuctionError::Overflow)?;

    token.transfer(&state.treasury, &ctx.sender, amount)?;

    state.reserved_prizes = reserved_prizes;
    if let Some(auction) = state.get_auction_mut(auction_id) {
        auction.prize_claimed = true;
    }

    info!(auction_id, winner = %hex::encode(ctx.sender), amount, "Prize claimed");
    Ok(amount)
}

/// Mark an auction ended and reserve its prize.
///
/// `reserved_prizes` is the already-checked new total.
fn finalize(state: &mut ModuleState, ctx: &CallContext, auction_id: u64, reserved_prizes: u64) {
    let Some(auction) = state.get_auction_mut(auction_id) else {
        return;
    };
    auction.ended = true;
    let ended = AuctionEnded {
        auction_id,
        winner: auction.highest_bidder,
        amount: auction.auction_amount,
        highest_bid: auction.highest_bid,
    };

    state.reserved_prizes = reserved_prizes;
    info!(
        auction_id,
        winner = ?ended.winner.map(hex::encode),
        highest_bid = ended.highest_bid,
        "Auction ended"
    );
    state.emit(ctx, AuctionEvent::AuctionEnded(ended));
}

// =========================
// WITHDRAWALS
// =========================

/// Handle WithdrawPlatformFees call (owner only).
pub fn handle_withdraw_platform_fees<L: TokenLedger + ?Sized>(
    state: &mut ModuleState,
    token: &mut L,
    ctx: &CallContext,
) -> HandlerResult<u64> {
    require_owner(state, ctx)?;

    let amount = state.withdrawable_platform_fees();
    if amount == 0 {
        debug!("No platform fees to withdraw");
        return Ok(0);
    }

    token.transfer(&state.treasury, &state.owner, amount)?;
    state.platform_fees_claimed += amount;

    info!(amount, "Platform fees withdrawn");
    Ok(amount)
}

/// Handle WithdrawReferralRewards call.
pub fn handle_withdraw_referral_rewards<L: TokenLedger + ?Sized>(
    state: &mut ModuleState,
    token: &mut L,
    ctx: &CallContext,
) -> HandlerResult<u64> {
    let amount = state.get_referral_rewards(&ctx.sender);
    if amount == 0 {
        return Ok(0);
    }

    token.transfer(&state.treasury, &ctx.sender, amount)?;
    state.take_referral_rewards(&ctx.sender);

    info!(referrer = %hex::encode(ctx.sender), amount, "Referral rewards withdrawn");
    Ok(amount)
}

// =========================
// ADMIN
// =========================

fn require_owner(state: &ModuleState, ctx: &CallContext) -> HandlerResult<()> {
    if ctx.sender != state.owner {
        return Err(AuctionError::NotOwner);
    }
    Ok(())
}

/// Handle SetAuctionAmount call.
pub fn handle_set_auction_amount(
    state: &mut ModuleState,
    ctx: &CallContext,
    amount: u64,
) -> HandlerResult<()> {
    require_owner(state, ctx)?;
    check_positive(amount, "auction amount must be positive")?;
    state.params.auction_amount = amount;
    info!(amount, "Auction amount updated");
    Ok(())
}

/// Handle SetAuctionDuration call.
pub fn handle_set_auction_duration(
    state: &mut ModuleState,
    ctx: &CallContext,
    duration: u64,
) -> HandlerResult<()> {
    require_owner(state, ctx)?;
    check_positive(duration, "auction duration must be positive")?;
    state.params.auction_duration = duration;
    info!(duration, "Auction duration updated");
    Ok(())
}

/// Handle SetAuctionDurationIncrease call. Zero turns off extensions.
pub fn handle_set_auction_duration_increase(
    state: &mut ModuleState,
    ctx: &CallContext,
    increase: u64,
) -> HandlerResult<()> {
    require_owner(state, ctx)?;
    state.params.auction_duration_increase = increase;
    info!(increase, "Auction duration increase updated");
    Ok(())
}

/// Handle SetStartingAmount call.
pub fn handle_set_starting_amount(
    state: &mut ModuleState,
    ctx: &CallContext,
    amount: u64,
) -> HandlerResult<()> {
    require_owner(state, ctx)?;
    check_positive(amount, "starting amount must be positive")?;
    state.params.starting_amount = amount;
    info!(amount, "Starting amount updated");
    Ok(())
}

/// Handle SetBidIncrement call.
pub fn handle_set_bid_increment(
    state: &mut ModuleState,
    ctx: &CallContext,
    increment: u64,
) -> HandlerResult<()> {
    require_owner(state, ctx)?;
    check_positive(increment, "bid increment must be positive")?;
    state.params.bid_increment = increment;
    info!(increment, "Bid increment updated");
    Ok(())
}

/// Handle SetReferralFee call.
pub fn handle_set_referral_fee(
    state: &mut ModuleState,
    ctx: &CallContext,
    fee: u64,
) -> HandlerResult<()> {
    require_owner(state, ctx)?;
    check_fee_ordering(fee, state.params.platform_fee)?;
    state.params.referral_fee = fee;
    info!(fee, "Referral fee updated");
    Ok(())
}

/// Handle SetPlatformFee call.
pub fn handle_set_platform_fee(
    state: &mut ModuleState,
    ctx: &CallContext,
    fee: u64,
) -> HandlerResult<()> {
    require_owner(state, ctx)?;
    check_fee_ordering(state.params.referral_fee, fee)?;
    state.params.platform_fee = fee;
    info!(fee, "Platform fee updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::AuctionGenesisConfig;
    use crate::token::InMemoryToken;
    use auction_types::{AuctionParams, NULL_ADDRESS};

    const OWNER: Address = [1u8; 32];
    const TREASURY: Address = [2u8; 32];
    const ALICE: Address = [10u8; 32];
    const BOB: Address = [11u8; 32];
    const CAROL: Address = [12u8; 32];
    const REFERRER: Address = [20u8; 32];

    fn test_context(sender: Address, timestamp: u64) -> CallContext {
        CallContext {
            sender,
            block_height: 100,
            timestamp,
        }
    }

    /// Small whole-unit parameters: prize 10, bids 1, 2, 3, ...
    fn setup() -> (ModuleState, InMemoryToken) {
        let mut config = AuctionGenesisConfig::new(OWNER, TREASURY);
        config.params = AuctionParams {
            auction_amount: 10,
            auction_duration: 1000,
            auction_duration_increase: 60,
            starting_amount: 1,
            bid_increment: 1,
            referral_fee: 1,
            platform_fee: 2,
        };
        config.min_start_balance = 1;
        let state = ModuleState::new(&config);

        let mut token = InMemoryToken::new();
        token.mint(TREASURY, 10).unwrap();
        for user in [ALICE, BOB, CAROL] {
            token.mint(user, 1_000).unwrap();
            token.approve(user, TREASURY, 1_000);
        }
        (state, token)
    }

    fn assert_reconciled(state: &ModuleState, token: &InMemoryToken) {
        assert!(token.balance_of(&TREASURY) as u128 >= state.required_reserve());
    }

    #[test]
    fn test_start_auction() {
        let (mut state, mut token) = setup();
        let ctx = test_context(ALICE, 1000);

        let auction_id = handle_start_auction(&mut state, &mut token, &ctx).unwrap();
        assert_eq!(auction_id, 1);

        let auction = state.get_auction(1).unwrap();
        assert_eq!(auction.auction_amount, 10);
        assert_eq!(auction.start_time, 1000);
        assert_eq!(auction.end_time, 2000);
        assert_eq!(auction.highest_bidder, None);
        assert_eq!(state.current_auction_id, 1);

        let events = state.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].event, AuctionEvent::AuctionCreated(_)));
    }

    #[test]
    fn test_start_auction_while_active() {
        let (mut state, mut token) = setup();
        handle_start_auction(&mut state, &mut token, &test_context(ALICE, 1000)).unwrap();

        let result = handle_start_auction(&mut state, &mut token, &test_context(BOB, 1999));
        assert!(matches!(result, Err(AuctionError::AuctionAlreadyActive)));
        assert_eq!(state.current_auction_id, 1);
    }

    #[test]
    fn test_start_auction_pays_surplus_to_owner() {
        let (mut state, mut token) = setup();
        token.mint(TREASURY, 5).unwrap();

        handle_start_auction(&mut state, &mut token, &test_context(ALICE, 1000)).unwrap();

        assert_eq!(state.get_auction(1).unwrap().auction_amount, 10);
        assert_eq!(token.balance_of(&OWNER), 5);
        assert_eq!(token.balance_of(&TREASURY), 10);
    }

    #[test]
    fn test_start_auction_degrades_below_target() {
        let (mut state, mut token) = setup();
        token.transfer(&TREASURY, &OWNER, 6).unwrap();

        handle_start_auction(&mut state, &mut token, &test_context(ALICE, 1000)).unwrap();
        assert_eq!(state.get_auction(1).unwrap().auction_amount, 4);
    }

    #[test]
    fn test_start_auction_below_floor() {
        let (mut state, mut token) = setup();
        state.min_start_balance = 11;
        token.transfer(&TREASURY, &OWNER, 1).unwrap();

        let result = handle_start_auction(&mut state, &mut token, &test_context(ALICE, 1000));
        assert_eq!(
            result,
            Err(AuctionError::InsufficientBalance {
                available: 9,
                required: 11
            })
        );
        assert_eq!(state.current_auction_id, 0);
        assert!(state.events.is_empty());
    }

    #[test]
    fn test_place_bid_first_and_outbid() {
        let (mut state, mut token) = setup();
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();

        let amount =
            handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1100), None).unwrap();
        assert_eq!(amount, 1);
        assert_eq!(token.balance_of(&ALICE), 1_000 - 3);

        let amount =
            handle_place_bid(&mut state, &mut token, &test_context(BOB, 1200), None).unwrap();
        assert_eq!(amount, 2);
        // Alice got her bid back, not the fee
        assert_eq!(token.balance_of(&ALICE), 1_000 - 2);
        assert_eq!(token.balance_of(&BOB), 1_000 - 4);

        let auction = state.current_auction().unwrap();
        assert_eq!(auction.highest_bidder, Some(BOB));
        assert_eq!(auction.highest_bid, 2);
        assert_eq!(auction.bid_count, 2);
        assert_eq!(auction.end_time, 2000 + 60 * 2);
        assert_eq!(state.platform_fees_collected, 4);
        assert_reconciled(&state, &token);
    }

    #[test]
    fn test_place_bid_already_highest_bidder() {
        let (mut state, mut token) = setup();
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();
        handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1100), None).unwrap();

        let result = handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1101), None);
        assert!(matches!(result, Err(AuctionError::AlreadyHighestBidder)));
        assert_eq!(state.current_auction().unwrap().bid_count, 1);
    }

    #[test]
    fn test_place_bid_without_auction() {
        let (mut state, mut token) = setup();
        let result = handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1), None);
        assert!(matches!(result, Err(AuctionError::NoAuction)));
    }

    #[test]
    fn test_place_bid_after_end_time() {
        let (mut state, mut token) = setup();
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();

        let result = handle_place_bid(&mut state, &mut token, &test_context(ALICE, 2000), None);
        assert!(matches!(result, Err(AuctionError::AuctionNotActive)));
    }

    #[test]
    fn test_place_bid_referral_rules() {
        let (mut state, mut token) = setup();
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();

        // Self-referral: ignored
        handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1001), Some(ALICE))
            .unwrap();
        assert_eq!(state.get_referral_rewards(&ALICE), 0);

        // Null referral: ignored
        handle_place_bid(&mut state, &mut token, &test_context(BOB, 1002), Some(NULL_ADDRESS))
            .unwrap();
        assert_eq!(state.total_referral_rewards, 0);
        assert_eq!(state.platform_fees_collected, 4);

        // Real referral: credited and carved from the fee
        handle_place_bid(&mut state, &mut token, &test_context(CAROL, 1003), Some(REFERRER))
            .unwrap();
        assert_eq!(state.get_referral_rewards(&REFERRER), 1);
        assert_eq!(state.platform_fees_collected, 5);
        assert_reconciled(&state, &token);
    }

    #[test]
    fn test_place_bid_failed_pull_changes_nothing() {
        let (mut state, mut token) = setup();
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();
        handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1001), None).unwrap();
        state.drain_events();

        let poor = [30u8; 32];
        token.mint(poor, 1).unwrap();
        token.approve(poor, TREASURY, 100);

        let result = handle_place_bid(&mut state, &mut token, &test_context(poor, 1002), Some(BOB));
        assert!(matches!(result, Err(AuctionError::Token(_))));

        let auction = state.current_auction().unwrap();
        assert_eq!(auction.highest_bidder, Some(ALICE));
        assert_eq!(auction.bid_count, 1);
        assert_eq!(state.get_referral_rewards(&BOB), 0);
        assert_eq!(state.platform_fees_collected, 2);
        assert_eq!(token.balance_of(&ALICE), 1_000 - 3);
        assert!(state.events.is_empty());
    }

    #[test]
    fn test_finalizing_bid() {
        let (mut state, mut token) = setup();
        handle_set_bid_increment(&mut state, &test_context(OWNER, 0), 9).unwrap();
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();

        handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1001), None).unwrap();
        let end_time = state.current_auction().unwrap().end_time;
        state.drain_events();

        handle_place_bid(&mut state, &mut token, &test_context(BOB, 1002), None).unwrap();
        let auction = state.current_auction().unwrap();
        assert!(auction.ended);
        assert_eq!(auction.highest_bid, 10);
        assert_eq!(auction.end_time, end_time);
        assert_eq!(state.reserved_prizes, 10);

        let events = state.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].event,
            AuctionEvent::AuctionEnded(AuctionEnded {
                auction_id: 1,
                winner: Some(BOB),
                amount: 10,
                highest_bid: 10,
            })
        );
        assert_reconciled(&state, &token);

        let result = handle_place_bid(&mut state, &mut token, &test_context(CAROL, 1003), None);
        assert!(matches!(result, Err(AuctionError::AuctionNotActive)));
    }

    #[test]
    fn test_end_auction() {
        let (mut state, mut token) = setup();
        assert!(matches!(
            handle_end_auction(&mut state, &test_context(ALICE, 0)),
            Err(AuctionError::NoAuction)
        ));

        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();
        handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1001), None).unwrap();

        let winner = handle_end_auction(&mut state, &test_context(BOB, 5000)).unwrap();
        assert_eq!(winner, Some(ALICE));
        assert!(state.current_auction().unwrap().ended);
        assert_eq!(state.reserved_prizes, 10);

        assert!(matches!(
            handle_end_auction(&mut state, &test_context(BOB, 5001)),
            Err(AuctionError::AuctionAlreadyEnded)
        ));
    }

    #[test]
    fn test_end_auction_without_bids_reserves_nothing() {
        let (mut state, mut token) = setup();
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();

        let winner = handle_end_auction(&mut state, &test_context(BOB, 3000)).unwrap();
        assert_eq!(winner, None);
        assert_eq!(state.reserved_prizes, 0);

        // The unused prize funds the next auction
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 3001)).unwrap();
        assert_eq!(state.get_auction(2).unwrap().auction_amount, 10);
    }

    #[test]
    fn test_start_auction_finalizes_expired_auction() {
        let (mut state, mut token) = setup();
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();
        handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1001), None).unwrap();
        state.drain_events();

        // Treasury: 10 prize + 1 bid + 2 fee. Prize stays reserved for Alice.
        handle_start_auction(&mut state, &mut token, &test_context(BOB, 5000)).unwrap();

        let first = state.get_auction(1).unwrap();
        assert!(first.ended);
        assert_eq!(first.winner(), Some(ALICE));
        assert_eq!(state.get_auction(2).unwrap().auction_amount, 3);
        assert_eq!(state.reserved_prizes, 10);
        assert_eq!(state.withdrawable_platform_fees(), 0);

        let events = state.drain_events();
        assert!(matches!(events[0].event, AuctionEvent::AuctionEnded(_)));
        assert!(matches!(events[1].event, AuctionEvent::AuctionCreated(_)));
        assert_eq!(events[1].log_index, events[0].log_index + 1);
        assert_reconciled(&state, &token);
    }

    #[test]
    fn test_claim_prize() {
        let (mut state, mut token) = setup();
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();
        handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1001), None).unwrap();

        assert!(matches!(
            handle_claim_prize(&mut state, &mut token, &test_context(ALICE, 1002), 1),
            Err(AuctionError::AuctionNotEnded(1))
        ));

        handle_end_auction(&mut state, &test_context(BOB, 3000)).unwrap();

        assert!(matches!(
            handle_claim_prize(&mut state, &mut token, &test_context(BOB, 3001), 1),
            Err(AuctionError::NotWinner(1))
        ));
        assert!(matches!(
            handle_claim_prize(&mut state, &mut token, &test_context(ALICE, 3001), 7),
            Err(AuctionError::AuctionNotFound(7))
        ));

        let before = token.balance_of(&ALICE);
        let amount =
            handle_claim_prize(&mut state, &mut token, &test_context(ALICE, 3002), 1).unwrap();
        assert_eq!(amount, 10);
        assert_eq!(token.balance_of(&ALICE), before + 10);
        assert_eq!(state.reserved_prizes, 0);

        assert!(matches!(
            handle_claim_prize(&mut state, &mut token, &test_context(ALICE, 3003), 1),
            Err(AuctionError::PrizeAlreadyClaimed(1))
        ));
        assert_reconciled(&state, &token);
    }

    #[test]
    fn test_withdraw_platform_fees() {
        let (mut state, mut token) = setup();
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();

        // Nothing yet: succeeds with zero
        assert_eq!(
            handle_withdraw_platform_fees(&mut state, &mut token, &test_context(OWNER, 1001)),
            Ok(0)
        );

        handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1002), None).unwrap();
        handle_place_bid(&mut state, &mut token, &test_context(BOB, 1003), None).unwrap();

        assert!(matches!(
            handle_withdraw_platform_fees(&mut state, &mut token, &test_context(ALICE, 1004)),
            Err(AuctionError::NotOwner)
        ));

        let amount =
            handle_withdraw_platform_fees(&mut state, &mut token, &test_context(OWNER, 1004))
                .unwrap();
        assert_eq!(amount, 4);
        assert_eq!(token.balance_of(&OWNER), 4);
        assert_eq!(state.platform_fees_claimed, 4);
        assert_eq!(state.withdrawable_platform_fees(), 0);
        assert_reconciled(&state, &token);
    }

    #[test]
    fn test_withdraw_referral_rewards() {
        let (mut state, mut token) = setup();
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();

        assert_eq!(
            handle_withdraw_referral_rewards(&mut state, &mut token, &test_context(REFERRER, 1)),
            Ok(0)
        );

        handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1001), Some(REFERRER))
            .unwrap();
        handle_place_bid(&mut state, &mut token, &test_context(BOB, 1002), Some(REFERRER))
            .unwrap();

        let amount =
            handle_withdraw_referral_rewards(&mut state, &mut token, &test_context(REFERRER, 1003))
                .unwrap();
        assert_eq!(amount, 2);
        assert_eq!(token.balance_of(&REFERRER), 2);
        assert_eq!(state.get_referral_rewards(&REFERRER), 0);
        assert_eq!(state.total_referral_rewards, 0);
        assert_reconciled(&state, &token);
    }

    #[test]
    fn test_setters_require_owner() {
        let (mut state, _) = setup();
        let ctx = test_context(ALICE, 0);
        assert_eq!(handle_set_auction_amount(&mut state, &ctx, 5), Err(AuctionError::NotOwner));
        assert_eq!(handle_set_platform_fee(&mut state, &ctx, 5), Err(AuctionError::NotOwner));
        assert_eq!(
            handle_set_auction_duration_increase(&mut state, &ctx, 5),
            Err(AuctionError::NotOwner)
        );
    }

    #[test]
    fn test_setters_validate() {
        let (mut state, _) = setup();
        let ctx = test_context(OWNER, 0);

        assert!(matches!(
            handle_set_auction_amount(&mut state, &ctx, 0),
            Err(AuctionError::InvalidConfig(_))
        ));
        assert!(matches!(
            handle_set_auction_duration(&mut state, &ctx, 0),
            Err(AuctionError::InvalidConfig(_))
        ));
        assert!(matches!(
            handle_set_starting_amount(&mut state, &ctx, 0),
            Err(AuctionError::InvalidConfig(_))
        ));
        assert!(matches!(
            handle_set_bid_increment(&mut state, &ctx, 0),
            Err(AuctionError::InvalidConfig(_))
        ));
        handle_set_auction_duration_increase(&mut state, &ctx, 0).unwrap();
        assert_eq!(state.params.auction_duration_increase, 0);
    }

    #[test]
    fn test_fee_ordering() {
        let (mut state, _) = setup();
        let ctx = test_context(OWNER, 0);

        // referral 1, platform 2
        assert_eq!(
            handle_set_referral_fee(&mut state, &ctx, 3),
            Err(AuctionError::FeeOrderingViolation {
                referral_fee: 3,
                platform_fee: 2
            })
        );
        handle_set_referral_fee(&mut state, &ctx, 2).unwrap();
        assert!(matches!(
            handle_set_platform_fee(&mut state, &ctx, 1),
            Err(AuctionError::FeeOrderingViolation { .. })
        ));
        handle_set_referral_fee(&mut state, &ctx, 0).unwrap();
        assert!(matches!(
            handle_set_platform_fee(&mut state, &ctx, 0),
            Err(AuctionError::FeeOrderingViolation { .. })
        ));
        handle_set_platform_fee(&mut state, &ctx, 1).unwrap();
        assert!(state.params.referral_fee <= state.params.platform_fee);
    }

    #[test]
    fn test_config_changes_do_not_touch_running_auction() {
        let (mut state, mut token) = setup();
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();

        let owner = test_context(OWNER, 1001);
        handle_set_starting_amount(&mut state, &owner, 5).unwrap();
        handle_set_platform_fee(&mut state, &owner, 3).unwrap();
        handle_set_auction_amount(&mut state, &owner, 50).unwrap();
        handle_set_auction_duration_increase(&mut state, &owner, 0).unwrap();

        let amount =
            handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1002), None).unwrap();
        assert_eq!(amount, 1);
        assert_eq!(token.balance_of(&ALICE), 1_000 - 3);
        assert_eq!(state.current_auction().unwrap().auction_amount, 10);
        assert_eq!(state.current_auction().unwrap().end_time, 2060);
    }

    #[test]
    fn test_zero_duration_increase_disables_extension() {
        let (mut state, mut token) = setup();
        handle_set_auction_duration_increase(&mut state, &test_context(OWNER, 0), 0).unwrap();
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();
        state.drain_events();

        handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1001), None).unwrap();
        handle_place_bid(&mut state, &mut token, &test_context(BOB, 1999), None).unwrap();

        let auction = state.current_auction().unwrap();
        assert!(!auction.ended);
        assert_eq!(auction.end_time, auction.start_time + 1000);

        let events = state.drain_events();
        assert_eq!(events.len(), 2);
        for event in &events {
            match &event.event {
                AuctionEvent::BidPlaced(e) => assert_eq!(e.new_end_time, 2000),
                other => panic!("unexpected event {other:?}"),
            }
        }

        // The window still closes on time
        let result = handle_place_bid(&mut state, &mut token, &test_context(CAROL, 2000), None);
        assert!(matches!(result, Err(AuctionError::AuctionNotActive)));
    }

    #[test]
    fn test_bid_event_keeps_supplied_referral() {
        let (mut state, mut token) = setup();
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();
        state.drain_events();

        handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1001), Some(ALICE))
            .unwrap();
        handle_place_bid(&mut state, &mut token, &test_context(BOB, 1002), Some(REFERRER))
            .unwrap();

        let events = state.drain_events();
        let referrals: Vec<_> = events
            .iter()
            .map(|e| match &e.event {
                AuctionEvent::BidPlaced(b) => b.referral,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(referrals, vec![Some(ALICE), Some(REFERRER)]);

        // Only the genuine referral earns anything
        assert_eq!(state.get_referral_rewards(&ALICE), 0);
        assert_eq!(state.get_referral_rewards(&REFERRER), 1);
    }

    #[test]
    fn test_rejected_calls_leave_state_untouched() {
        let (mut state, mut token) = setup();
        handle_start_auction(&mut state, &mut token, &test_context(OWNER, 1000)).unwrap();
        handle_place_bid(&mut state, &mut token, &test_context(ALICE, 1001), Some(REFERRER))
            .unwrap();
        state.drain_events();

        let poor = [30u8; 32];
        token.mint(poor, 2).unwrap();
        token.approve(poor, TREASURY, 100);

        let rejected = [
            (poor, AuctionCall::PlaceBid { referral: Some(REFERRER) }),
            (ALICE, AuctionCall::PlaceBid { referral: None }),
            (BOB, AuctionCall::StartAuction),
            (BOB, AuctionCall::ClaimPrize { auction_id: 1 }),
            (BOB, AuctionCall::ClaimPrize { auction_id: 9 }),
            (BOB, AuctionCall::WithdrawPlatformFees),
            (OWNER, AuctionCall::SetPlatformFee { fee: 0 }),
            (OWNER, AuctionCall::SetReferralFee { fee: 3 }),
            (OWNER, AuctionCall::SetBidIncrement { increment: 0 }),
            (BOB, AuctionCall::SetAuctionAmount { amount: 1 }),
        ];

        for (sender, call) in rejected {
            let state_before = state.clone();
            let token_before = token.clone();
            let name = call.name();

            let result = dispatch(&mut state, &mut token, &test_context(sender, 1002), call);
            assert!(result.is_err(), "{name} should be rejected");
            assert_eq!(state, state_before, "{name} changed module state");
            assert_eq!(token, token_before, "{name} moved tokens");
        }
    }

    #[test]
    fn test_dispatch() {
        let (mut state, mut token) = setup();
        let receipt = dispatch(
            &mut state,
            &mut token,
            &test_context(ALICE, 1000),
            AuctionCall::StartAuction,
        )
        .unwrap();
        assert_eq!(
            receipt,
            CallReceipt::AuctionStarted {
                auction_id: 1,
                auction_amount: 10
            }
        );

        let receipt = dispatch(
            &mut state,
            &mut token,
            &test_context(BOB, 1001),
            AuctionCall::PlaceBid { referral: None },
        )
        .unwrap();
        assert_eq!(
            receipt,
            CallReceipt::BidAccepted {
                amount: 1,
                finalized: false
            }
        );
    }
}
