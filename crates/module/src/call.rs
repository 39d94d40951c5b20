//! Call message types for the auction module.

use auction_types::Address;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

/// Call messages for the auction module.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum AuctionCall {
    // === Auction Lifecycle ===
    /// Fund and open the next auction (anyone).
    StartAuction,

    /// Outbid the current highest bidder (anyone but them).
    PlaceBid {
        #[serde_as(as = "Option<Hex>")]
        referral: Option<Address>,
    },

    /// Finalize the current auction (anyone).
    EndAuction,

    /// Winner pulls the prize of an ended auction.
    ClaimPrize { auction_id: u64 },

    // === Withdrawals ===
    /// Owner pulls unclaimed platform fees.
    WithdrawPlatformFees,

    /// Caller pulls their referral rewards.
    WithdrawReferralRewards,

    // === Admin ===
    SetAuctionAmount { amount: u64 },
    SetAuctionDuration { duration: u64 },
    SetAuctionDurationIncrease { increase: u64 },
    SetStartingAmount { amount: u64 },
    SetBidIncrement { increment: u64 },
    SetReferralFee { fee: u64 },
    SetPlatformFee { fee: u64 },
}

impl AuctionCall {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            AuctionCall::StartAuction => "start_auction",
            AuctionCall::PlaceBid { .. } => "place_bid",
            AuctionCall::EndAuction => "end_auction",
            AuctionCall::ClaimPrize { .. } => "claim_prize",
            AuctionCall::WithdrawPlatformFees => "withdraw_platform_fees",
            AuctionCall::WithdrawReferralRewards => "withdraw_referral_rewards",
            AuctionCall::SetAuctionAmount { .. } => "set_auction_amount",
            AuctionCall::SetAuctionDuration { .. } => "set_auction_duration",
            AuctionCall::SetAuctionDurationIncrease { .. } => "set_auction_duration_increase",
            AuctionCall::SetStartingAmount { .. } => "set_starting_amount",
            AuctionCall::SetBidIncrement { .. } => "set_bid_increment",
            AuctionCall::SetReferralFee { .. } => "set_referral_fee",
            AuctionCall::SetPlatformFee { .. } => "set_platform_fee",
        }
    }
}
