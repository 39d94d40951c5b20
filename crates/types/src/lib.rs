//! Core type definitions for the final bid auction.
//!
//! This crate provides the shared data structures used across the auction system:
//! account addresses, the auction record, configuration parameters and the
//! events consumed by indexers.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

// =========================
// ACCOUNTS
// =========================

/// Generic address type (32 bytes)
pub type Address = [u8; 32];

/// The null address. Never a valid bidder, referrer or owner.
pub const NULL_ADDRESS: Address = [0u8; 32];

/// Returns `true` for the all-zero address.
pub fn is_null(address: &Address) -> bool {
    *address == NULL_ADDRESS
}

/// Collapse `Some(NULL_ADDRESS)` into `None`.
pub fn non_null(address: Option<Address>) -> Option<Address> {
    address.filter(|a| !is_null(a))
}

/// Derive a deterministic account address from a human-readable label.
///
/// Used by local tooling and tests so scenarios can name accounts
/// (`"alice"`, `"owner"`) instead of spelling out 32 bytes.
pub fn derive_address(label: &str) -> Address {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"FINAL_BID_ACCOUNT_V1:");
    hasher.update(label.as_bytes());
    hasher.finalize().into()
}

// =========================
// CONFIGURATION
// =========================

/// Owner-controlled auction parameters.
///
/// A copy of these is taken when an auction starts; later changes only affect
/// auctions created afterwards. Amounts are in the token's smallest unit.
#[derive(
    Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct AuctionParams {
    /// Target prize for a new auction
    pub auction_amount: u64,
    /// Initial bidding window (seconds)
    pub auction_duration: u64,
    /// Extension applied to `end_time` by every non-finalizing bid (seconds)
    pub auction_duration_increase: u64,
    /// Value of the first bid
    pub starting_amount: u64,
    /// Step between consecutive bids
    pub bid_increment: u64,
    /// Reward credited to a referrer per referred bid
    pub referral_fee: u64,
    /// Flat fee charged on top of every bid
    pub platform_fee: u64,
}

impl Default for AuctionParams {
    fn default() -> Self {
        // 6-decimal stablecoin units
        Self {
            auction_amount: 100_000_000,
            auction_duration: 86_400,
            auction_duration_increase: 300,
            starting_amount: 1_000_000,
            bid_increment: 1_000_000,
            referral_fee: 500_000,
            platform_fee: 1_000_000,
        }
    }
}

// =========================
// AUCTION
// =========================

/// Where an auction is in its lifecycle at a given timestamp.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum AuctionPhase {
    /// Accepting bids
    Active,
    /// Bidding window closed, waiting for someone to call `end_auction`
    Expired,
    /// Finalized, either by a bid reaching the prize or explicitly
    Ended,
}

/// A single auction round.
#[serde_as]
#[derive(
    Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Auction {
    pub auction_id: u64,
    pub auction_amount: u64,

    // Timing
    pub start_time: u64,
    pub end_time: u64,

    // Snapshot of the parameters at creation
    pub starting_amount: u64,
    pub bid_increment: u64,
    pub referral_fee: u64,
    pub platform_fee: u64,
    /// Deadline extension applied by each non-finalizing bid
    pub duration_increase: u64,

    // Bidding
    pub bid_count: u64,
    #[serde_as(as = "Option<Hex>")]
    pub highest_bidder: Option<Address>,
    pub highest_bid: u64,

    pub ended: bool,
    pub prize_claimed: bool,
}

impl Auction {
    /// Whether the auction still takes bids at `now`.
    ///
    /// This is also the condition that blocks a new auction from starting.
    pub fn is_active(&self, now: u64) -> bool {
        !(self.ended || now >= self.end_time || self.highest_bid >= self.auction_amount)
    }

    /// Lifecycle phase at `now`.
    pub fn phase(&self, now: u64) -> AuctionPhase {
        if self.ended {
            AuctionPhase::Ended
        } else if self.is_active(now) {
            AuctionPhase::Active
        } else {
            AuctionPhase::Expired
        }
    }

    /// Value the next bid must carry. `None` on overflow.
    pub fn next_bid(&self) -> Option<u64> {
        if self.highest_bid == 0 {
            Some(self.starting_amount)
        } else {
            self.highest_bid.checked_add(self.bid_increment)
        }
    }

    /// Winner of a finalized auction, if anyone bid.
    pub fn winner(&self) -> Option<Address> {
        if self.ended {
            self.highest_bidder
        } else {
            None
        }
    }
}

// =========================
// EVENTS
// =========================

/// Emitted when a new auction is funded and opened.
#[derive(
    Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct AuctionCreated {
    pub auction_id: u64,
    pub auction_amount: u64,
    pub start_time: u64,
    pub end_time: u64,
    pub starting_amount: u64,
    pub bid_increment: u64,
    pub referral_fee: u64,
    pub platform_fee: u64,
}

/// Emitted for every accepted bid that does not finalize the auction.
#[serde_as]
#[derive(
    Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct BidPlaced {
    pub auction_id: u64,
    #[serde_as(as = "Hex")]
    pub bidder: Address,
    pub amount: u64,
    #[serde_as(as = "Option<Hex>")]
    pub referral: Option<Address>,
    pub new_end_time: u64,
}

/// Emitted once per auction when it finalizes.
#[serde_as]
#[derive(
    Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct AuctionEnded {
    pub auction_id: u64,
    #[serde_as(as = "Option<Hex>")]
    pub winner: Option<Address>,
    pub amount: u64,
    pub highest_bid: u64,
}

/// Events consumed by external indexers.
#[derive(
    Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(tag = "type")]
pub enum AuctionEvent {
    AuctionCreated(AuctionCreated),
    BidPlaced(BidPlaced),
    AuctionEnded(AuctionEnded),
}

impl AuctionEvent {
    /// Auction the event belongs to.
    pub fn auction_id(&self) -> u64 {
        match self {
            AuctionEvent::AuctionCreated(e) => e.auction_id,
            AuctionEvent::BidPlaced(e) => e.auction_id,
            AuctionEvent::AuctionEnded(e) => e.auction_id,
        }
    }
}

/// An event together with its position in the chain.
#[derive(
    Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct EmittedEvent {
    pub block_height: u64,
    pub log_index: u32,
    pub timestamp: u64,
    pub event: AuctionEvent,
}
