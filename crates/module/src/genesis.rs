//! Genesis configuration for the auction module.
//!
//! This module defines the initial state and configuration for the auction
//! system when the chain starts.

use auction_types::{is_null, Address, AuctionParams};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::error::AuctionError;

/// Default funding floor: one whole token at 6 decimals.
pub const DEFAULT_MIN_START_BALANCE: u64 = 1_000_000;

/// Genesis configuration for the auction module.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuctionGenesisConfig {
    /// Administrative account, fixed for the life of the module
    #[serde_as(as = "Hex")]
    pub owner: Address,

    /// Account on the token ledger that holds prizes, bids and fees
    #[serde_as(as = "Hex")]
    pub treasury: Address,

    /// Initial auction parameters (owner may change them later)
    #[serde(default)]
    pub params: AuctionParams,

    /// Minimum free treasury balance required to start an auction
    #[serde(default = "default_min_start_balance")]
    pub min_start_balance: u64,
}

fn default_min_start_balance() -> u64 {
    DEFAULT_MIN_START_BALANCE
}

impl AuctionGenesisConfig {
    /// Create a config with default parameters.
    pub fn new(owner: Address, treasury: Address) -> Self {
        Self {
            owner,
            treasury,
            params: AuctionParams::default(),
            min_start_balance: DEFAULT_MIN_START_BALANCE,
        }
    }

    /// Validate the genesis configuration.
    pub fn validate(&self) -> Result<(), GenesisValidationError> {
        if is_null(&self.owner) {
            return Err(GenesisValidationError::NullAccount("owner"));
        }
        if is_null(&self.treasury) {
            return Err(GenesisValidationError::NullAccount("treasury"));
        }
        if self.owner == self.treasury {
            return Err(GenesisValidationError::OwnerIsTreasury);
        }
        if self.min_start_balance == 0 {
            return Err(GenesisValidationError::InvalidFloor);
        }

        check_params(&self.params).map_err(GenesisValidationError::InvalidParams)?;

        Ok(())
    }
}

/// Check a full parameter set against the setter rules.
pub fn check_params(params: &AuctionParams) -> Result<(), AuctionError> {
    check_positive(params.auction_amount, "auction amount must be positive")?;
    check_positive(params.auction_duration, "auction duration must be positive")?;
    check_positive(params.starting_amount, "starting amount must be positive")?;
    check_positive(params.bid_increment, "bid increment must be positive")?;
    check_fee_ordering(params.referral_fee, params.platform_fee)
}

pub(crate) fn check_positive(value: u64, reason: &'static str) -> Result<(), AuctionError> {
    if value == 0 {
        return Err(AuctionError::InvalidConfig(reason));
    }
    Ok(())
}

/// The platform fee must be positive and cover the referral fee.
pub(crate) fn check_fee_ordering(referral_fee: u64, platform_fee: u64) -> Result<(), AuctionError> {
    if platform_fee == 0 || referral_fee > platform_fee {
        return Err(AuctionError::FeeOrderingViolation {
            referral_fee,
            platform_fee,
        });
    }
    Ok(())
}

/// Errors that can occur during genesis validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenesisValidationError {
    #[error("Invalid auction parameters: {0}")]
    InvalidParams(AuctionError),

    #[error("The {0} account cannot be the null address")]
    NullAccount(&'static str),

    #[error("Owner and treasury must be different accounts")]
    OwnerIsTreasury,

    #[error("Minimum start balance cannot be zero")]
    InvalidFloor,
}
