//! Query handlers for the auction module.
//!
//! These functions provide read-only access to auction state.

use crate::state::AuctionState as ModuleState;
use auction_types::{Address, Auction, AuctionParams, AuctionPhase};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

/// Query request types.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum AuctionQuery {
    /// Id of the most recent auction (0 = none yet).
    CurrentAuctionId,

    /// Get auction details by ID.
    GetAuction { auction_id: u64 },

    /// The most recent auction.
    CurrentAuction,

    /// Get all auctions (paginated, oldest first).
    ListAuctions { offset: u64, limit: u64 },

    /// Lifecycle phase of an auction at a given time.
    GetPhase { auction_id: u64, now: u64 },

    /// Platform fee counters.
    PlatformFees,

    /// Referral rewards held for an address.
    GetReferralRewards {
        #[serde_as(as = "Hex")]
        address: Address,
    },

    /// Parameters applied to the next auction.
    Config,

    Owner,

    Treasury,

    /// Prizes of ended auctions still owed to their winners.
    ReservedPrizes,

    /// What the next bid on the current auction costs.
    NextBid,
}

/// Query response types.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response", content = "value", rename_all = "snake_case")]
pub enum AuctionQueryResponse {
    AuctionId(u64),

    /// Auction details.
    Auction(Option<Auction>),

    /// List of auctions.
    AuctionList(Vec<Auction>),

    Phase(Option<AuctionPhase>),

    PlatformFees(PlatformFeeSummary),

    /// Referral rewards or reserved prizes.
    Amount(u64),

    Config(ConfigSummary),

    Address(#[serde_as(as = "Hex")] Address),

    NextBid(Option<BidQuote>),
}

/// Owner fee pool counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFeeSummary {
    pub collected: u64,
    pub claimed: u64,
    pub withdrawable: u64,
}

/// Next-auction parameters plus the funding floor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSummary {
    #[serde(flatten)]
    pub params: AuctionParams,
    pub min_start_balance: u64,
}

/// Cost of outbidding the current leader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidQuote {
    pub auction_id: u64,
    /// Value the bid will carry
    pub amount: u64,
    pub platform_fee: u64,
    /// Allowance the bidder must grant the treasury
    pub total: u64,
}

/// Handle a query.
pub fn handle_query(state: &ModuleState, query: AuctionQuery) -> AuctionQueryResponse {
    match query {
        AuctionQuery::CurrentAuctionId => AuctionQueryResponse::AuctionId(state.current_auction_id),

        AuctionQuery::GetAuction { auction_id } => {
            AuctionQueryResponse::Auction(state.get_auction(auction_id).cloned())
        }

        AuctionQuery::CurrentAuction => {
            AuctionQueryResponse::Auction(state.current_auction().cloned())
        }

        AuctionQuery::ListAuctions { offset, limit } => {
            let auctions = state
                .auctions
                .iter()
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .cloned()
                .collect();
            AuctionQueryResponse::AuctionList(auctions)
        }

        AuctionQuery::GetPhase { auction_id, now } => {
            AuctionQueryResponse::Phase(state.get_auction(auction_id).map(|a| a.phase(now)))
        }

        AuctionQuery::PlatformFees => AuctionQueryResponse::PlatformFees(PlatformFeeSummary {
            collected: state.platform_fees_collected,
            claimed: state.platform_fees_claimed,
            withdrawable: state.withdrawable_platform_fees(),
        }),

        AuctionQuery::GetReferralRewards { address } => {
            AuctionQueryResponse::Amount(state.get_referral_rewards(&address))
        }

        AuctionQuery::Config => AuctionQueryResponse::Config(ConfigSummary {
            params: state.params.clone(),
            min_start_balance: state.min_start_balance,
        }),

        AuctionQuery::Owner => AuctionQueryResponse::Address(state.owner),

        AuctionQuery::Treasury => AuctionQueryResponse::Address(state.treasury),

        AuctionQuery::ReservedPrizes => AuctionQueryResponse::Amount(state.reserved_prizes),

        AuctionQuery::NextBid => AuctionQueryResponse::NextBid(quote_next_bid(state)),
    }
}

/// Quote the next bid on the current auction.
///
/// `None` when there is no auction, it has ended, or the amounts overflow.
/// Expiry depends on the caller's clock and is not checked here.
pub fn quote_next_bid(state: &ModuleState) -> Option<BidQuote> {
    let auction = state.current_auction().filter(|a| !a.ended)?;
    let amount = auction.next_bid()?;
    Some(BidQuote {
        auction_id: auction.auction_id,
        amount,
        platform_fee: auction.platform_fee,
        total: amount.checked_add(auction.platform_fee)?,
    })
}

/// Auctions accepting bids at `now`. At most the current one.
pub fn get_active_auction(state: &ModuleState, now: u64) -> Option<&Auction> {
    state.current_auction().filter(|a| a.is_active(now))
}

/// Ended auctions whose winner has not claimed the prize yet.
pub fn get_unclaimed_prizes(state: &ModuleState) -> Vec<(u64, Address, u64)> {
    state
        .auctions
        .iter()
        .filter(|a| a.ended && !a.prize_claimed)
        .filter_map(|a| a.highest_bidder.map(|w| (a.auction_id, w, a.auction_amount)))
        .collect()
}
