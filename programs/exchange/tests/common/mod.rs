#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt::Debug;

use anchor_lang::prelude::*;
use exchange::oracle::{OraclePrice, PriceFeed};
use exchange::processor::InitParams;
use exchange::utils::adjust_staking_account;
use exchange::{ErrorCode, Exchange, ExchangeAccount, InstructionContext, TokenCustody};

pub const AMOUNT_PER_ROUND: u64 = 100;
pub const ROUND_LENGTH: u64 = 20;

#[derive(Default)]
pub struct MemoryCustody {
    pub balances: HashMap<Pubkey, u64>,
}

impl TokenCustody for MemoryCustody {
    fn balance_of(&self, token_account: &Pubkey) -> u64 {
        self.balances.get(token_account).copied().unwrap_or(0)
    }

    fn transfer(&mut self, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        let balance = self.balance_of(from);
        require!(balance >= amount, ErrorCode::InsufficientFund);
        self.balances.insert(*from, balance - amount);
        *self.balances.entry(*to).or_insert(0) += amount;
        Ok(())
    }

    fn mint_to(&mut self, _mint: &Pubkey, to: &Pubkey, amount: u64) -> Result<()> {
        *self.balances.entry(*to).or_insert(0) += amount;
        Ok(())
    }

    fn burn(&mut self, _mint: &Pubkey, from: &Pubkey, amount: u64) -> Result<()> {
        let balance = self.balance_of(from);
        require!(balance >= amount, ErrorCode::InsufficientFund);
        self.balances.insert(*from, balance - amount);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFeed {
    pub prices: HashMap<Pubkey, OraclePrice>,
}

impl PriceFeed for MemoryFeed {
    fn get_price(&self, feed: &Pubkey) -> Result<OraclePrice> {
        self.prices
            .get(feed)
            .copied()
            .ok_or_else(|| ErrorCode::InvalidOracle.into())
    }
}

pub struct User {
    pub owner: Pubkey,
    pub account: ExchangeAccount,
    pub collateral_account: Pubkey,
    pub usd_account: Pubkey,
}

pub struct TestExchange {
    pub exchange: Exchange<MemoryCustody>,
    pub feed: MemoryFeed,
    pub admin: Pubkey,
    pub usd_token: Pubkey,
    pub collateral_token: Pubkey,
    pub collateral_feed: Pubkey,
    pub collateral_reserve: Pubkey,
    pub liquidation_fund: Pubkey,
    pub staking_fund: Pubkey,
    /// Collateral token price with 6 decimals
    pub collateral_price: i64,
    pub slot: u64,
}

impl TestExchange {
    pub fn new(slot: u64) -> Self {
        let admin = Pubkey::new_unique();
        let usd_token = Pubkey::new_unique();
        let collateral_token = Pubkey::new_unique();
        let collateral_feed = Pubkey::new_unique();
        let collateral_reserve = Pubkey::new_unique();
        let liquidation_fund = Pubkey::new_unique();
        let staking_fund = Pubkey::new_unique();

        let clock = Clock {
            slot,
            ..Default::default()
        };
        let exchange = Exchange::init(
            &InstructionContext::new(&clock, &[admin]),
            InitParams {
                admin,
                nonce: 255,
                exchange_authority: Pubkey::new_unique(),
                assets_list: Pubkey::new_unique(),
                usd_token,
                collateral_token,
                collateral_token_feed: collateral_feed,
                collateral_token_decimals: 6,
                collateral_reserve,
                liquidation_fund,
                staking_fund_account: staking_fund,
                amount_per_round: AMOUNT_PER_ROUND,
                staking_round_length: ROUND_LENGTH,
            },
            MemoryCustody::default(),
        )
        .unwrap();

        let mut test = TestExchange {
            exchange,
            feed: MemoryFeed::default(),
            admin,
            usd_token,
            collateral_token,
            collateral_feed,
            collateral_reserve,
            liquidation_fund,
            staking_fund,
            collateral_price: 2_000000,
            slot,
        };
        test.refresh_prices();
        test
    }

    pub fn run<R>(
        &mut self,
        signers: &[Pubkey],
        instruction: impl FnOnce(&mut Exchange<MemoryCustody>, &InstructionContext) -> R,
    ) -> R {
        let clock = Clock {
            slot: self.slot,
            ..Default::default()
        };
        let ctx = InstructionContext::new(&clock, signers);
        instruction(&mut self.exchange, &ctx)
    }

    pub fn refresh_prices(&mut self) {
        let slot = self.slot;
        self.feed.prices.insert(
            self.collateral_feed,
            OraclePrice {
                price: self.collateral_price,
                expo: -6,
                publish_slot: slot,
            },
        );
        let feeds = [self.collateral_feed];
        let clock = Clock {
            slot,
            ..Default::default()
        };
        let ctx = InstructionContext::new(&clock, &[]);
        self.exchange
            .set_assets_prices(&ctx, &self.feed, &feeds)
            .unwrap();
    }

    pub fn set_collateral_price(&mut self, price: i64) {
        self.collateral_price = price;
        self.refresh_prices();
    }

    /// New account with `deposit` of collateral token deposited.
    pub fn create_user(&mut self, deposit: u64) -> User {
        let owner = Pubkey::new_unique();
        let collateral_account = Pubkey::new_unique();
        let usd_account = Pubkey::new_unique();
        let mut account = self
            .run(&[owner], |exchange, ctx| {
                exchange.create_exchange_account(ctx, owner, 255)
            })
            .unwrap();
        self.exchange
            .custody
            .balances
            .insert(collateral_account, deposit);

        if deposit > 0 {
            let collateral_token = self.collateral_token;
            self.run(&[owner], |exchange, ctx| {
                exchange.deposit(
                    ctx,
                    &mut account,
                    &collateral_token,
                    &collateral_account,
                    deposit,
                )
            })
            .unwrap();
        }
        User {
            owner,
            account,
            collateral_account,
            usd_account,
        }
    }

    pub fn mint(&mut self, user: &mut User, amount: u64) -> Result<()> {
        let (owner, to) = (user.owner, user.usd_account);
        self.run(&[owner], |exchange, ctx| {
            exchange.mint(ctx, &mut user.account, amount, &to)
        })
    }

    pub fn burn(&mut self, user: &mut User, amount: u64) -> Result<u64> {
        let (owner, from) = (user.owner, user.usd_account);
        self.run(&[owner], |exchange, ctx| {
            exchange.burn(ctx, &mut user.account, amount, &from)
        })
    }

    pub fn claim(&mut self, user: &mut User) -> Result<u64> {
        self.run(&[], |exchange, ctx| exchange.claim_rewards(ctx, &mut user.account))
    }

    pub fn balance_of(&self, token_account: &Pubkey) -> u64 {
        self.exchange.custody.balance_of(token_account)
    }

    pub fn next_round_start(&self) -> u64 {
        self.exchange.state.staking.next_round().start
    }
}

pub fn assert_error<T: Debug>(result: Result<T>, code: ErrorCode) {
    let expected = u32::from(code);
    match result {
        Err(anchor_lang::error::Error::AnchorError(error)) => {
            assert_eq!(error.error_code_number, expected, "{}", error.error_msg)
        }
        other => panic!("expected error {}, got {:?}", expected, other),
    }
}

/// Checks global totals against the accounts of every user of the exchange.
pub fn assert_ledger_consistent(test: &TestExchange, users: &[&User]) {
    let state = &test.exchange.state;
    let staking = &state.staking;

    let debt_shares: u128 = users.iter().map(|user| user.account.debt_shares).sum();
    assert_eq!(debt_shares, state.debt_shares);

    let entries: Vec<_> = users
        .iter()
        .flat_map(|user| user.account.entries().iter())
        .collect();
    let collateral: u128 = entries.iter().map(|entry| entry.amount as u128).sum();
    assert_eq!(collateral, state.collateral_shares);
    for (index, asset) in test.exchange.assets_list.active().iter().enumerate() {
        let deposited: u64 = entries
            .iter()
            .filter(|entry| entry.index as usize == index)
            .map(|entry| entry.amount)
            .sum();
        assert_eq!(deposited, asset.collateral.reserve_balance);
        if asset.collateral.is_collateral {
            assert_eq!(
                deposited,
                test.balance_of(&asset.collateral.reserve_address)
            );
        }
    }

    assert!(staking.is_aligned());
    let synced: Vec<_> = users
        .iter()
        .map(|user| {
            let mut data = user.account.user_staking_data;
            adjust_staking_account(&mut data, staking);
            data
        })
        .collect();
    let next_points: u128 = synced.iter().map(|data| data.next_round_points).sum();
    let current_points: u128 = synced.iter().map(|data| data.current_round_points).sum();
    assert_eq!(next_points, staking.next_round().all_points);
    assert_eq!(current_points, staking.current_round().all_points);
}
