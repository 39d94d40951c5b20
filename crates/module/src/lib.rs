//! Last-bidder-wins auction module over a fungible token.
//!
//! Each auction offers a prize funded from the module's treasury. Bidders
//! outbid each other by a fixed increment and pay a flat platform fee per
//! bid, part of which may go to a referrer. Every bid pushes the deadline
//! out; the auction ends when the deadline passes or a bid reaches the prize.
//!
//! # Architecture
//!
//! - `call`: Message types for state-changing operations
//! - `handlers`: Business logic for processing calls
//! - `queries`: Read-only state access
//! - `state`: Module state and ledger counters
//! - `genesis`: Initial configuration
//! - `token`: Token ledger interface and in-memory ledger
//! - `runtime`: Atomic call execution
//! - `error`: Error types
//!
//! # Example
//!
//! ```ignore
//! use auction_module::{AuctionCall, AuctionGenesisConfig, CallContext, InMemoryToken, Runtime};
//!
//! let mut runtime = Runtime::new(&AuctionGenesisConfig::new(owner, treasury), token)?;
//! let ctx = CallContext { sender, block_height, timestamp };
//!
//! runtime.execute(&ctx, AuctionCall::StartAuction)?;
//! runtime.execute(&ctx, AuctionCall::PlaceBid { referral: None })?;
//! ```

pub mod call;
pub mod error;
pub mod genesis;
pub mod handlers;
pub mod queries;
pub mod runtime;
pub mod state;
pub mod token;

pub use call::AuctionCall;
pub use error::AuctionError;
pub use genesis::{AuctionGenesisConfig, GenesisValidationError};
pub use handlers::{CallContext, CallReceipt, HandlerResult};
pub use queries::{AuctionQuery, AuctionQueryResponse};
pub use runtime::{Runtime, SharedRuntime};
pub use state::AuctionState;
pub use token::{InMemoryToken, TokenError, TokenLedger};
