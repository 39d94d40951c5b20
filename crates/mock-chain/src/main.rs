//! Mock chain for local testing of the auction module.
//!
//! Replays a scenario file against an in-memory chain: a token ledger, the
//! auction module, and a clock that advances one block per step. Each call
//! is printed as a JSON line with the events it emitted.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use auction_module::{
    AuctionCall, AuctionGenesisConfig, CallContext, InMemoryToken, Runtime,
};
use auction_types::{derive_address, Address};

mod types;
use types::*;

#[derive(Parser)]
#[command(name = "mock-chain")]
#[command(about = "Replay auction scenarios against an in-memory chain")]
struct Cli {
    /// Genesis config (JSON). Defaults to label-derived owner and treasury.
    #[arg(long, global = true)]
    genesis: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file
    Run {
        /// Scenario file (JSON)
        #[arg(long)]
        scenario: PathBuf,

        /// Tokens minted to the treasury before the first step
        #[arg(long, default_value_t = 0)]
        fund_treasury: u64,
    },

    /// Run the built-in two-auction walkthrough
    Demo,

    /// Print the genesis config in use
    Genesis,
}

/// Chain state.
struct ChainState {
    /// Module state and token ledger
    runtime: Runtime<InMemoryToken>,
    owner: Address,
    treasury: Address,
    /// Current block height (simulated)
    block_height: u64,
    /// Current timestamp (simulated, can be advanced)
    timestamp: u64,
}

impl ChainState {
    fn new(config: &AuctionGenesisConfig, initial_timestamp: u64) -> Result<Self> {
        let runtime = Runtime::new(config, InMemoryToken::new())
            .context("invalid genesis config")?;
        Ok(Self {
            runtime,
            owner: config.owner,
            treasury: config.treasury,
            block_height: 0,
            timestamp: initial_timestamp,
        })
    }

    fn advance_block(&mut self) -> Result<()> {
        self.block_height = self
            .block_height
            .checked_add(1)
            .ok_or_else(|| anyhow!("block height overflow"))?;
        self.advance_time(12) // ~12 second blocks
    }

    fn advance_time(&mut self, seconds: u64) -> Result<()> {
        self.timestamp = self
            .timestamp
            .checked_add(seconds)
            .ok_or_else(|| anyhow!("clock overflow: {} + {seconds}", self.timestamp))?;
        Ok(())
    }

    fn set_timestamp(&mut self, ts: u64) {
        self.timestamp = ts;
    }

    fn block_info(&self) -> BlockInfo {
        BlockInfo {
            height: self.block_height,
            timestamp: self.timestamp,
        }
    }

    fn resolve(&self, account: &str) -> Result<Address> {
        match account {
            "owner" => Ok(self.owner),
            "treasury" => Ok(self.treasury),
            _ => parse_address(account),
        }
    }

    fn make_context(&self, sender: Address) -> CallContext {
        CallContext {
            sender,
            block_height: self.block_height,
            timestamp: self.timestamp,
        }
    }

    fn mint(&mut self, account: &str, amount: u64) -> Result<()> {
        let to = self.resolve(account)?;
        self.runtime.token_mut().mint(to, amount)?;
        Ok(())
    }

    fn approve(&mut self, account: &str, amount: u64) -> Result<()> {
        let owner = self.resolve(account)?;
        let treasury = self.treasury;
        self.runtime.token_mut().approve(owner, treasury, amount);
        Ok(())
    }

    fn apply_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::Advance { seconds } => self.advance_time(*seconds)?,
            ScenarioStep::SetTimestamp { timestamp } => {
                self.set_timestamp(*timestamp);
            }
            ScenarioStep::Mint { account, amount } => self.mint(account, *amount)?,
            ScenarioStep::Approve { account, amount } => self.approve(account, *amount)?,
            ScenarioStep::Call {
                sender,
                call,
                expect_error,
            } => {
                self.advance_block()?;
                let report = self.submit(sender, call.clone())?;
                println!("{}", serde_json::to_string(&report)?);

                match (expect_error, &report.error) {
                    (None, Some(error)) => warn!(call = %report.call, %error, "Call failed"),
                    (Some(expected), None) => {
                        bail!("{} succeeded, expected {expected}", report.call)
                    }
                    (Some(expected), Some(error)) if !error.starts_with(expected.as_str()) => {
                        bail!("{} failed with {error}, expected {expected}", report.call)
                    }
                    _ => {}
                }
            }
            ScenarioStep::Query { query } => {
                let response = self.runtime.query(query.clone());
                println!("{}", serde_json::to_string(&response)?);
            }
        }
        Ok(())
    }

    fn submit(&mut self, sender: &str, call: AuctionCall) -> Result<StepReport> {
        let address = self.resolve(sender)?;
        let ctx = self.make_context(address);
        let name = call.name().to_string();

        let error = match self.runtime.execute(&ctx, call) {
            Ok(receipt) => {
                info!(call = %name, ?receipt, "Call applied");
                None
            }
            Err(e) => Some(format!("{}: {e}", e.code())),
        };

        self.runtime
            .check_reconciliation()
            .map_err(|e| anyhow!("treasury out of balance after {name}: {e}"))?;

        Ok(StepReport {
            block: self.block_info(),
            call: name,
            sender: hex::encode(address),
            ok: error.is_none(),
            error,
            treasury_balance: self.runtime.treasury_balance(),
            events: self.runtime.drain_events(),
        })
    }
}

fn run_scenario(config: &AuctionGenesisConfig, scenario: &Scenario, fund_treasury: u64) -> Result<()> {
    let mut chain = ChainState::new(config, scenario.initial_timestamp)?;

    if fund_treasury > 0 {
        chain.mint("treasury", fund_treasury)?;
    }
    for setup in &scenario.accounts {
        chain.mint(&setup.account, setup.mint)?;
        chain.approve(&setup.account, setup.approve)?;
    }

    info!(steps = scenario.steps.len(), "Running scenario");
    for (index, step) in scenario.steps.iter().enumerate() {
        chain
            .apply_step(step)
            .with_context(|| format!("step {index} failed"))?;
    }

    let info = chain.block_info();
    info!(height = info.height, timestamp = info.timestamp, "Scenario complete");
    Ok(())
}

/// Two auctions: a contested one that runs out the clock, then one that a
/// bid closes early by reaching the prize.
fn demo_scenario() -> Scenario {
    let call = |sender: &str, call: AuctionCall| ScenarioStep::Call {
        sender: sender.to_string(),
        call,
        expect_error: None,
    };
    let bid = |sender: &str, referral: Option<&str>| {
        call(
            sender,
            AuctionCall::PlaceBid {
                referral: referral.map(derive_address),
            },
        )
    };

    let accounts = ["alice", "bob", "carol"]
        .into_iter()
        .map(|name| AccountSetup {
            account: name.to_string(),
            mint: 1_000_000_000,
            approve: 1_000_000_000,
        })
        .collect();

    Scenario {
        initial_timestamp: 1_700_000_000,
        accounts,
        steps: vec![
            ScenarioStep::Mint {
                account: "treasury".to_string(),
                amount: 100_000_000,
            },
            call("alice", AuctionCall::StartAuction),
            bid("alice", None),
            bid("bob", Some("carol")),
            ScenarioStep::Call {
                sender: "bob".to_string(),
                call: AuctionCall::PlaceBid { referral: None },
                expect_error: Some("AlreadyHighestBidder".to_string()),
            },
            bid("carol", Some("alice")),
            ScenarioStep::Advance { seconds: 90_000 },
            call("bob", AuctionCall::EndAuction),
            call("carol", AuctionCall::ClaimPrize { auction_id: 1 }),
            call("carol", AuctionCall::WithdrawReferralRewards),
            call("owner", AuctionCall::SetBidIncrement { increment: 99_000_000 }),
            ScenarioStep::Mint {
                account: "treasury".to_string(),
                amount: 100_000_000,
            },
            call("bob", AuctionCall::StartAuction),
            bid("alice", None),
            bid("bob", None),
            ScenarioStep::Call {
                sender: "alice".to_string(),
                call: AuctionCall::ClaimPrize { auction_id: 1 },
                expect_error: Some("NotWinner".to_string()),
            },
            call("bob", AuctionCall::ClaimPrize { auction_id: 2 }),
            call("owner", AuctionCall::WithdrawPlatformFees),
            ScenarioStep::Query {
                query: auction_module::AuctionQuery::PlatformFees,
            },
        ],
    }
}

fn load_genesis(path: Option<&Path>) -> Result<AuctionGenesisConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => AuctionGenesisConfig::new(derive_address("owner"), derive_address("treasury")),
    };
    config.validate()?;
    Ok(config)
}

/// Parse a hex address (`0x` optional) or map a label to its derived address.
fn parse_address(s: &str) -> Result<Address> {
    let hex_part = s.strip_prefix("0x").unwrap_or(s);
    if hex_part.len() == 64 && hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        let mut addr = [0u8; 32];
        hex::decode_to_slice(hex_part, &mut addr)?;
        return Ok(addr);
    }
    if s.starts_with("0x") {
        bail!("invalid address {s}: expected 32 hex-encoded bytes");
    }
    Ok(derive_address(s))
}

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mock_chain=info,auction_module=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_genesis(cli.genesis.as_deref())?;

    match cli.command {
        Commands::Run {
            scenario,
            fund_treasury,
        } => {
            let raw = std::fs::read_to_string(&scenario)
                .with_context(|| format!("reading {}", scenario.display()))?;
            let scenario: Scenario = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", scenario.display()))?;
            run_scenario(&config, &scenario, fund_treasury)?;
        }
        Commands::Demo => run_scenario(&config, &demo_scenario(), 0)?,
        Commands::Genesis => println!("{}", serde_json::to_string_pretty(&config)?),
    }

    Ok(())
}
