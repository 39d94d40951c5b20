//! Auction module error types.

use thiserror::Error;

use crate::token::TokenError;

/// Errors that can occur in the auction module.
///
/// Every error aborts the call; nothing it touched is kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    // === Authorization ===
    #[error("Caller is not the owner")]
    NotOwner,

    #[error("Caller is not the winner of auction {0}")]
    NotWinner(u64),

    // === State conflicts ===
    #[error("Auction already active")]
    AuctionAlreadyActive,

    #[error("Auction already ended")]
    AuctionAlreadyEnded,

    #[error("Already highest bidder")]
    AlreadyHighestBidder,

    #[error("No auction has been started")]
    NoAuction,

    #[error("Auction is not accepting bids")]
    AuctionNotActive,

    #[error("Auction not found: {0}")]
    AuctionNotFound(u64),

    #[error("Auction {0} has not ended")]
    AuctionNotEnded(u64),

    #[error("Prize for auction {0} already claimed")]
    PrizeAlreadyClaimed(u64),

    // === Resources ===
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: u64, required: u64 },

    #[error("Token transfer failed: {0}")]
    Token(#[from] TokenError),

    // === Configuration ===
    #[error("Invalid config: {0}")]
    InvalidConfig(&'static str),

    #[error("Referral fee {referral_fee} must not exceed platform fee {platform_fee}")]
    FeeOrderingViolation { referral_fee: u64, platform_fee: u64 },

    #[error("Arithmetic overflow")]
    Overflow,
}

impl AuctionError {
    /// Stable identifier for front-ends and indexers.
    pub fn code(&self) -> &'static str {
        match self {
            AuctionError::NotOwner => "NotOwner",
            AuctionError::NotWinner(_) => "NotWinner",
            AuctionError::AuctionAlreadyActive => "AuctionAlreadyActive",
            AuctionError::AuctionAlreadyEnded => "AuctionAlreadyEnded",
            AuctionError::AlreadyHighestBidder => "AlreadyHighestBidder",
            AuctionError::NoAuction => "NoAuction",
            AuctionError::AuctionNotActive => "AuctionNotActive",
            AuctionError::AuctionNotFound(_) => "AuctionNotFound",
            AuctionError::AuctionNotEnded(_) => "AuctionNotEnded",
            AuctionError::PrizeAlreadyClaimed(_) => "PrizeAlreadyClaimed",
            AuctionError::InsufficientBalance { .. } => "InsufficientBalance",
            AuctionError::Token(e) => e.code(),
            AuctionError::InvalidConfig(_) => "InvalidConfig",
            AuctionError::FeeOrderingViolation { .. } => "FeeOrderingViolation",
            AuctionError::Overflow => "Overflow",
        }
    }
}
