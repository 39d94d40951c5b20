//! Scenario file format for the mock chain.
//!
//! Accounts are written either as hex (`0x…`, 32 bytes) or as a plain label
//! such as `alice`, which maps to a deterministic address. The labels `owner`
//! and `treasury` refer to the accounts named in the genesis config.

use auction_module::{AuctionCall, AuctionQuery};
use auction_types::EmittedEvent;
use serde::{Deserialize, Serialize};

/// A scripted run against a fresh chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Starting chain time
    #[serde(default)]
    pub initial_timestamp: u64,

    /// Balances and approvals applied before the first step
    #[serde(default)]
    pub accounts: Vec<AccountSetup>,

    pub steps: Vec<ScenarioStep>,
}

/// Initial funding for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSetup {
    pub account: String,

    #[serde(default)]
    pub mint: u64,

    /// Allowance granted to the treasury
    #[serde(default)]
    pub approve: u64,
}

/// One scenario step. Every step is mined in its own block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Move the clock forward.
    Advance { seconds: u64 },

    /// Jump the clock to an absolute time.
    SetTimestamp { timestamp: u64 },

    /// Credit tokens out of thin air.
    Mint { account: String, amount: u64 },

    /// Set the allowance an account grants the treasury.
    Approve { account: String, amount: u64 },

    /// Submit a module call.
    Call {
        sender: String,
        call: AuctionCall,
        /// Error code the call is expected to fail with
        #[serde(default)]
        expect_error: Option<String>,
    },

    /// Print a query response.
    Query { query: AuctionQuery },
}

/// Block info response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub timestamp: u64,
}

/// Outcome of one call step, printed as a JSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub block: BlockInfo,
    pub call: String,
    pub sender: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub treasury_balance: u64,
    pub events: Vec<EmittedEvent>,
}
