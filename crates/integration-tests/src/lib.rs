//! End-to-end integration tests for the auction module.
//!
//! These tests drive the module through its runtime the way a host would:
//! funding accounts on the token ledger, advancing a clock, and submitting
//! calls. After every call the treasury must still cover what it owes.

use auction_module::{
    AuctionCall, AuctionError, AuctionGenesisConfig, AuctionQuery, AuctionQueryResponse,
    CallContext, CallReceipt, InMemoryToken, Runtime, SharedRuntime, TokenError, TokenLedger,
};
use auction_types::{derive_address, Address, AuctionEvent, AuctionParams, AuctionPhase};

/// One whole token at 6 decimals.
const UNIT: u64 = 1_000_000;

struct TestChain {
    runtime: Runtime<InMemoryToken>,
    owner: Address,
    treasury: Address,
    block_height: u64,
    timestamp: u64,
}

impl TestChain {
    fn new(params: AuctionParams, min_start_balance: u64) -> Self {
        let owner = derive_address("owner");
        let treasury = derive_address("treasury");
        let mut config = AuctionGenesisConfig::new(owner, treasury);
        config.params = params;
        config.min_start_balance = min_start_balance;

        Self {
            runtime: Runtime::new(&config, InMemoryToken::new()).unwrap(),
            owner,
            treasury,
            block_height: 0,
            timestamp: 1_000,
        }
    }

    /// Whole-unit parameters: 1 unit starting bid and increment, 1 unit fee.
    fn with_defaults() -> Self {
        Self::new(
            AuctionParams {
                auction_amount: 100 * UNIT,
                auction_duration: 3_600,
                auction_duration_increase: 60,
                starting_amount: UNIT,
                bid_increment: UNIT,
                referral_fee: UNIT / 2,
                platform_fee: UNIT,
            },
            UNIT,
        )
    }

    fn fund_treasury(&mut self, amount: u64) {
        let treasury = self.treasury;
        self.runtime.token_mut().mint(treasury, amount).unwrap();
    }

    /// Mint to a bidder and approve the treasury for all of it.
    fn fund_bidder(&mut self, name: &str, amount: u64) -> Address {
        let bidder = derive_address(name);
        let treasury = self.treasury;
        let token = self.runtime.token_mut();
        token.mint(bidder, amount).unwrap();
        token.approve(bidder, treasury, amount);
        bidder
    }

    fn balance(&self, who: &Address) -> u64 {
        self.runtime.token().balance_of(who)
    }

    fn advance(&mut self, seconds: u64) {
        self.timestamp += seconds;
    }

    fn call(&mut self, sender: Address, call: AuctionCall) -> Result<CallReceipt, AuctionError> {
        self.block_height += 1;
        self.timestamp += 1;
        let ctx = CallContext {
            sender,
            block_height: self.block_height,
            timestamp: self.timestamp,
        };
        let result = self.runtime.execute(&ctx, call);
        self.runtime.check_reconciliation().unwrap();
        result
    }

    fn start(&mut self) -> Result<CallReceipt, AuctionError> {
        let owner = self.owner;
        self.call(owner, AuctionCall::StartAuction)
    }

    fn bid(&mut self, bidder: Address, referral: Option<Address>) -> Result<CallReceipt, AuctionError> {
        self.call(bidder, AuctionCall::PlaceBid { referral })
    }

    fn owner_call(&mut self, call: AuctionCall) -> Result<CallReceipt, AuctionError> {
        let owner = self.owner;
        self.call(owner, call)
    }

    fn current(&self) -> auction_types::Auction {
        self.runtime.state().current_auction().cloned().unwrap()
    }
}

// ========================================
// Funding
// ========================================

#[test]
fn test_start_degrades_to_available_balance() {
    let mut chain = TestChain::with_defaults();
    chain.fund_treasury(50 * UNIT);

    let receipt = chain.start().unwrap();
    assert_eq!(
        receipt,
        CallReceipt::AuctionStarted {
            auction_id: 1,
            auction_amount: 50 * UNIT
        }
    );
    assert_eq!(chain.current().auction_amount, 50 * UNIT);
    let owner = chain.owner;
    assert_eq!(chain.balance(&owner), 0);
}

#[test]
fn test_start_below_floor_fails() {
    let mut chain = TestChain::with_defaults();
    chain.fund_treasury(UNIT / 2);

    let result = chain.start();
    assert_eq!(
        result,
        Err(AuctionError::InsufficientBalance {
            available: UNIT / 2,
            required: UNIT
        })
    );
    assert_eq!(chain.runtime.state().current_auction_id, 0);
    assert!(chain.runtime.drain_events().is_empty());
}

#[test]
fn test_second_start_while_active_fails() {
    let mut chain = TestChain::with_defaults();
    chain.fund_treasury(200 * UNIT);
    chain.start().unwrap();
    assert_eq!(chain.start(), Err(AuctionError::AuctionAlreadyActive));
}

#[test]
fn test_surplus_goes_to_owner() {
    let mut chain = TestChain::with_defaults();
    chain.fund_treasury(130 * UNIT);
    chain.start().unwrap();

    assert_eq!(chain.current().auction_amount, 100 * UNIT);
    let owner = chain.owner;
    assert_eq!(chain.balance(&owner), 30 * UNIT);
}

// ========================================
// Bidding
// ========================================

#[test]
fn test_sequential_bidders_refunded() {
    let mut chain = TestChain::with_defaults();
    chain.fund_treasury(100 * UNIT);
    let a = chain.fund_bidder("a", 10 * UNIT);
    let b = chain.fund_bidder("b", 10 * UNIT);
    let c = chain.fund_bidder("c", 10 * UNIT);
    chain.start().unwrap();

    chain.bid(a, None).unwrap();
    chain.bid(b, None).unwrap();
    chain.bid(c, None).unwrap();

    let auction = chain.current();
    assert_eq!(auction.highest_bid, 3 * UNIT);
    assert_eq!(auction.bid_count, 3);
    assert_eq!(auction.highest_bidder, Some(c));

    // A and B keep only the fee they paid
    assert_eq!(chain.balance(&a), 9 * UNIT);
    assert_eq!(chain.balance(&b), 9 * UNIT);
    assert_eq!(chain.balance(&c), 6 * UNIT);
}

#[test]
fn test_bids_strictly_increase_and_extend_deadline() {
    let mut chain = TestChain::with_defaults();
    chain.fund_treasury(100 * UNIT);
    let a = chain.fund_bidder("a", 100 * UNIT);
    let b = chain.fund_bidder("b", 100 * UNIT);
    chain.start().unwrap();

    let mut last_bid = 0;
    let mut end_time = chain.current().end_time;
    for round in 0..10 {
        let bidder = if round % 2 == 0 { a } else { b };
        chain.bid(bidder, None).unwrap();

        let auction = chain.current();
        assert!(auction.highest_bid > last_bid);
        assert_eq!(auction.end_time, end_time + 60);
        last_bid = auction.highest_bid;
        end_time = auction.end_time;
    }

    assert_eq!(chain.bid(b, None), Err(AuctionError::AlreadyHighestBidder));
}

#[test]
fn test_zero_increase_keeps_deadline() {
    let mut chain = TestChain::with_defaults();
    chain
        .owner_call(AuctionCall::SetAuctionDurationIncrease { increase: 0 })
        .unwrap();
    chain.fund_treasury(100 * UNIT);
    let a = chain.fund_bidder("a", 10 * UNIT);
    let b = chain.fund_bidder("b", 10 * UNIT);
    chain.start().unwrap();
    chain.runtime.drain_events();

    chain.bid(a, None).unwrap();
    chain.bid(b, None).unwrap();

    let auction = chain.current();
    assert_eq!(auction.end_time, auction.start_time + 3_600);
    for event in chain.runtime.drain_events() {
        match event.event {
            AuctionEvent::BidPlaced(e) => assert_eq!(e.new_end_time, auction.end_time),
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[test]
fn test_finalizing_bid_does_not_extend() {
    let mut chain = TestChain::with_defaults();
    chain.owner_call(AuctionCall::SetBidIncrement { increment: 99 * UNIT }).unwrap();
    chain.fund_treasury(100 * UNIT);
    let a = chain.fund_bidder("a", 200 * UNIT);
    let b = chain.fund_bidder("b", 200 * UNIT);
    chain.start().unwrap();

    chain.bid(a, None).unwrap();
    let end_time = chain.current().end_time;
    chain.runtime.drain_events();

    let receipt = chain.bid(b, None).unwrap();
    assert_eq!(
        receipt,
        CallReceipt::BidAccepted {
            amount: 100 * UNIT,
            finalized: true
        }
    );
    let auction = chain.current();
    assert!(auction.ended);
    assert_eq!(auction.end_time, end_time);

    let events = chain.runtime.drain_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0].event, AuctionEvent::AuctionEnded(_)));

    assert_eq!(chain.bid(a, None), Err(AuctionError::AuctionNotActive));
    assert_eq!(
        chain.call(a, AuctionCall::EndAuction),
        Err(AuctionError::AuctionAlreadyEnded)
    );
}

#[test]
fn test_no_bids_after_deadline() {
    let mut chain = TestChain::with_defaults();
    chain.fund_treasury(100 * UNIT);
    let a = chain.fund_bidder("a", 10 * UNIT);
    chain.start().unwrap();

    chain.advance(3_600);
    assert_eq!(chain.bid(a, None), Err(AuctionError::AuctionNotActive));
    assert_eq!(
        chain.runtime.query(AuctionQuery::GetPhase {
            auction_id: 1,
            now: chain.timestamp
        }),
        AuctionQueryResponse::Phase(Some(AuctionPhase::Expired))
    );
}

#[test]
fn test_failed_pull_rolls_back() {
    let mut chain = TestChain::with_defaults();
    chain.fund_treasury(100 * UNIT);
    let a = chain.fund_bidder("a", 10 * UNIT);
    // Enough for the bid but not the fee
    let b = chain.fund_bidder("b", 2 * UNIT);
    let referrer = derive_address("referrer");
    chain.start().unwrap();
    chain.bid(a, None).unwrap();
    chain.runtime.drain_events();

    let result = chain.bid(b, Some(referrer));
    assert_eq!(
        result,
        Err(AuctionError::Token(TokenError::InsufficientAllowance {
            required: 3 * UNIT,
            allowed: 2 * UNIT
        }))
    );

    let auction = chain.current();
    assert_eq!(auction.highest_bidder, Some(a));
    assert_eq!(auction.highest_bid, UNIT);
    assert_eq!(auction.bid_count, 1);
    assert_eq!(chain.balance(&a), 8 * UNIT);
    assert_eq!(chain.balance(&b), 2 * UNIT);
    assert_eq!(chain.runtime.state().get_referral_rewards(&referrer), 0);
    assert!(chain.runtime.drain_events().is_empty());
}

// ========================================
// Fees and referrals
// ========================================

#[test]
fn test_double_referral() {
    let mut chain = TestChain::new(
        AuctionParams {
            auction_amount: 100 * UNIT,
            auction_duration: 3_600,
            auction_duration_increase: 60,
            starting_amount: UNIT,
            bid_increment: UNIT,
            referral_fee: UNIT,
            platform_fee: UNIT,
        },
        UNIT,
    );
    chain.fund_treasury(100 * UNIT);
    let a = chain.fund_bidder("a", 10 * UNIT);
    let b = chain.fund_bidder("b", 10 * UNIT);
    let x = derive_address("x");
    chain.start().unwrap();

    chain.bid(a, Some(x)).unwrap();
    chain.bid(b, Some(x)).unwrap();
    chain.bid(a, Some(x)).unwrap();

    assert_eq!(chain.runtime.state().get_referral_rewards(&x), 3 * UNIT);
    // The whole fee went to the referrer
    assert_eq!(chain.runtime.state().withdrawable_platform_fees(), 0);

    assert_eq!(
        chain.call(x, AuctionCall::WithdrawReferralRewards),
        Ok(CallReceipt::Withdrawn { amount: 3 * UNIT })
    );
    assert_eq!(chain.balance(&x), 3 * UNIT);
}

#[test]
fn test_referral_twice_by_same_bidder_accumulates() {
    let mut chain = TestChain::new(
        AuctionParams {
            platform_fee: UNIT,
            referral_fee: UNIT,
            ..TestChain::with_defaults().runtime.state().params.clone()
        },
        UNIT,
    );
    chain.fund_treasury(100 * UNIT);
    let a = chain.fund_bidder("a", 10 * UNIT);
    let b = chain.fund_bidder("b", 10 * UNIT);
    let x = derive_address("x");
    chain.start().unwrap();

    chain.bid(a, Some(x)).unwrap();
    chain.bid(b, None).unwrap();
    chain.bid(a, Some(x)).unwrap();

    assert_eq!(chain.runtime.state().get_referral_rewards(&x), 2 * UNIT);
    assert_eq!(chain.runtime.state().withdrawable_platform_fees(), UNIT);
}

#[test]
fn test_zero_withdrawals_are_noops() {
    let mut chain = TestChain::with_defaults();
    let nobody = derive_address("nobody");

    assert_eq!(
        chain.owner_call(AuctionCall::WithdrawPlatformFees),
        Ok(CallReceipt::Withdrawn { amount: 0 })
    );
    assert_eq!(
        chain.call(nobody, AuctionCall::WithdrawReferralRewards),
        Ok(CallReceipt::Withdrawn { amount: 0 })
    );
    assert_eq!(
        chain.call(nobody, AuctionCall::WithdrawPlatformFees),
        Err(AuctionError::NotOwner)
    );
}

#[test]
fn test_fee_ordering_holds_after_any_setter_sequence() {
    let mut chain = TestChain::with_defaults();
    let values = [0, 1, UNIT / 2, UNIT, 2 * UNIT, 3 * UNIT];

    for (i, first) in values.iter().enumerate() {
        for second in values.iter().skip(i % 3) {
            let calls = [
                AuctionCall::SetReferralFee { fee: *first },
                AuctionCall::SetPlatformFee { fee: *second },
                AuctionCall::SetPlatformFee { fee: *first },
                AuctionCall::SetReferralFee { fee: *second },
            ];
            for call in calls {
                if let Err(e) = chain.owner_call(call) {
                    assert!(matches!(e, AuctionError::FeeOrderingViolation { .. }));
                }
                let params = &chain.runtime.state().params;
                assert!(params.referral_fee <= params.platform_fee);
                assert!(params.platform_fee > 0);
            }
        }
    }
}

#[test]
fn test_config_changes_apply_to_next_auction() {
    let mut chain = TestChain::with_defaults();
    chain.fund_treasury(300 * UNIT);
    let a = chain.fund_bidder("a", 100 * UNIT);
    chain.start().unwrap();

    chain.owner_call(AuctionCall::SetStartingAmount { amount: 5 * UNIT }).unwrap();
    chain.owner_call(AuctionCall::SetPlatformFee { fee: 2 * UNIT }).unwrap();
    chain.owner_call(AuctionCall::SetAuctionDuration { duration: 10 }).unwrap();
    assert_eq!(
        chain.call(a, AuctionCall::SetAuctionAmount { amount: 1 }),
        Err(AuctionError::NotOwner)
    );

    chain.bid(a, None).unwrap();
    assert_eq!(chain.current().highest_bid, UNIT);
    assert_eq!(chain.balance(&a), 98 * UNIT);

    chain.advance(10_000);
    chain.call(a, AuctionCall::EndAuction).unwrap();
    chain.start().unwrap();

    let second = chain.current();
    assert_eq!(second.starting_amount, 5 * UNIT);
    assert_eq!(second.platform_fee, 2 * UNIT);
    assert_eq!(second.end_time - second.start_time, 10);
}

// ========================================
// Lifecycle
// ========================================

#[test]
fn test_prize_claim_lifecycle() {
    let mut chain = TestChain::with_defaults();
    chain.fund_treasury(100 * UNIT);
    let a = chain.fund_bidder("a", 10 * UNIT);
    let b = chain.fund_bidder("b", 10 * UNIT);
    chain.start().unwrap();
    chain.bid(a, None).unwrap();
    chain.bid(b, None).unwrap();

    assert_eq!(
        chain.call(b, AuctionCall::ClaimPrize { auction_id: 1 }),
        Err(AuctionError::AuctionNotEnded(1))
    );

    chain.advance(4_000);
    assert_eq!(
        chain.call(a, AuctionCall::EndAuction),
        Ok(CallReceipt::AuctionEnded { winner: Some(b) })
    );
    assert_eq!(chain.runtime.state().reserved_prizes, 100 * UNIT);

    // Only the winning bid and fees fund the next auction: 2 + 2 + 0.5 units
    chain.fund_treasury(UNIT / 2);
    assert_eq!(
        chain.start(),
        Ok(CallReceipt::AuctionStarted {
            auction_id: 2,
            auction_amount: 4 * UNIT + UNIT / 2
        })
    );

    assert_eq!(
        chain.call(a, AuctionCall::ClaimPrize { auction_id: 1 }),
        Err(AuctionError::NotWinner(1))
    );
    assert_eq!(
        chain.call(b, AuctionCall::ClaimPrize { auction_id: 1 }),
        Ok(CallReceipt::PrizeClaimed { amount: 100 * UNIT })
    );
    assert_eq!(chain.balance(&b), 7 * UNIT + 100 * UNIT);
    assert_eq!(
        chain.call(b, AuctionCall::ClaimPrize { auction_id: 1 }),
        Err(AuctionError::PrizeAlreadyClaimed(1))
    );
    assert_eq!(chain.runtime.state().reserved_prizes, 0);
}

#[test]
fn test_start_finalizes_expired_auction() {
    let mut chain = TestChain::with_defaults();
    chain.fund_treasury(100 * UNIT);
    let a = chain.fund_bidder("a", 10 * UNIT);
    chain.start().unwrap();
    chain.bid(a, None).unwrap();
    chain.advance(4_000);
    chain.fund_treasury(100 * UNIT);
    chain.runtime.drain_events();

    chain.start().unwrap();

    let first = chain.runtime.state().get_auction(1).unwrap().clone();
    assert!(first.ended);
    assert_eq!(first.winner(), Some(a));

    let events = chain.runtime.drain_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0].event, AuctionEvent::AuctionEnded(e) if e.winner == Some(a)));
    assert!(matches!(&events[1].event, AuctionEvent::AuctionCreated(e) if e.auction_id == 2));
    assert_eq!(events[0].block_height, events[1].block_height);
    assert_eq!((events[0].log_index, events[1].log_index), (0, 1));

    chain.call(a, AuctionCall::ClaimPrize { auction_id: 1 }).unwrap();
}

#[test]
fn test_early_end_is_allowed() {
    let mut chain = TestChain::with_defaults();
    assert_eq!(
        chain.call(derive_address("a"), AuctionCall::EndAuction),
        Err(AuctionError::NoAuction)
    );

    chain.fund_treasury(100 * UNIT);
    chain.start().unwrap();
    assert_eq!(
        chain.call(derive_address("a"), AuctionCall::EndAuction),
        Ok(CallReceipt::AuctionEnded { winner: None })
    );
    assert_eq!(chain.runtime.state().reserved_prizes, 0);

    // The untouched prize funds the next round
    chain.start().unwrap();
    assert_eq!(chain.current().auction_amount, 100 * UNIT);
}

#[test]
fn test_event_log() {
    let mut chain = TestChain::with_defaults();
    chain.fund_treasury(100 * UNIT);
    let a = chain.fund_bidder("a", 10 * UNIT);
    let x = derive_address("x");
    chain.start().unwrap();
    chain.bid(a, Some(x)).unwrap();

    let events = chain.runtime.drain_events();
    assert_eq!(events.len(), 2);
    match &events[1].event {
        AuctionEvent::BidPlaced(e) => {
            assert_eq!(e.bidder, a);
            assert_eq!(e.amount, UNIT);
            assert_eq!(e.referral, Some(x));
            assert_eq!(e.new_end_time, chain.current().end_time);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(events[0].block_height < events[1].block_height);

    let json = serde_json::to_value(&events[1]).unwrap();
    assert_eq!(json["event"]["type"], "BidPlaced");
    assert_eq!(json["event"]["bidder"], hex::encode(a));
}

#[test]
fn test_reconciliation_over_many_auctions() {
    let mut chain = TestChain::with_defaults();
    let bidders: Vec<Address> = (0..4)
        .map(|i| chain.fund_bidder(&format!("bidder-{i}"), 1_000 * UNIT))
        .collect();
    let referrer = derive_address("referrer");

    for round in 0..5u64 {
        chain.fund_treasury(100 * UNIT);
        chain.start().unwrap();
        for i in 0..(3 + round as usize) {
            let referral = (i % 2 == 0).then_some(referrer);
            chain.bid(bidders[i % bidders.len()], referral).unwrap();
        }
        if round % 2 == 0 {
            chain.owner_call(AuctionCall::WithdrawPlatformFees).unwrap();
        }
        chain.advance(5_000);
        if round != 3 {
            chain.call(referrer, AuctionCall::EndAuction).unwrap();
        }
        chain.call(referrer, AuctionCall::WithdrawReferralRewards).unwrap();
    }

    let state = chain.runtime.state();
    assert_eq!(state.current_auction_id, 5);
    assert!(state.platform_fees_claimed <= state.platform_fees_collected);

    let unclaimed = auction_module::queries::get_unclaimed_prizes(state);
    assert_eq!(unclaimed.len(), 5);
    for (auction_id, winner, _) in unclaimed {
        chain.call(winner, AuctionCall::ClaimPrize { auction_id }).unwrap();
    }
    assert_eq!(chain.runtime.state().reserved_prizes, 0);
}

#[test]
fn test_shared_runtime_across_threads() {
    let mut chain = TestChain::with_defaults();
    chain.fund_treasury(100 * UNIT);
    let bidders: Vec<Address> = (0..8)
        .map(|i| chain.fund_bidder(&format!("thread-{i}"), 10 * UNIT))
        .collect();
    chain.start().unwrap();
    let now = chain.timestamp;

    let shared = SharedRuntime::new(chain.runtime);
    std::thread::scope(|scope| {
        for bidder in &bidders {
            let shared = shared.clone();
            scope.spawn(move || {
                let ctx = CallContext {
                    sender: *bidder,
                    block_height: 10,
                    timestamp: now + 1,
                };
                shared
                    .execute(&ctx, AuctionCall::PlaceBid { referral: None })
                    .unwrap();
            });
        }
    });

    shared.with_mut(|rt| {
        let auction = rt.state().current_auction().unwrap();
        assert_eq!(auction.bid_count, 8);
        assert_eq!(auction.highest_bid, 8 * UNIT);
        rt.check_reconciliation().unwrap();
    });
    assert!(matches!(
        shared.query(AuctionQuery::NextBid),
        AuctionQueryResponse::NextBid(Some(quote)) if quote.amount == 9 * UNIT
    ));
}
