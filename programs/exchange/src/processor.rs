use crate::health::{calculate_collateral_value, compute_health, Health};
use crate::math::{
    calculate_burned_shares, calculate_debt, calculate_liquidation, calculate_liquidation_rewards,
    calculate_max_debt_in_usd, calculate_new_shares, calculate_user_debt_in_usd, div_up,
    normalize_price, usd_to_token_amount, ACCURACY, MAX_DECIMALS, PRICE_OFFSET,
};
use crate::oracle::PriceFeed;
use crate::utils::{
    adjust_staking_account, adjust_staking_rounds, cap_current_round_points, claim_finished_round,
    points_for_debt, set_next_round_points,
};
use crate::*;

pub const DEFAULT_FEE: u16 = 300; // 0.3%
pub const DEFAULT_MAX_DELAY: u32 = 0;
pub const DEFAULT_HEALTH_FACTOR: u8 = 50;
pub const DEFAULT_LIQUIDATION_THRESHOLD: u16 = 200;
pub const DEFAULT_COLLATERALIZATION_LEVEL: u16 = 1000;
pub const DEFAULT_PENALTY_TO_LIQUIDATOR: u8 = 12;
pub const DEFAULT_PENALTY_TO_EXCHANGE: u8 = 3;
pub const DEFAULT_LIQUIDATION_BUFFER: u32 = 172800; // about a day
pub const MAX_FEE: u16 = 10000;
pub const MAX_PENALTY: u8 = 25;

pub const USD_INDEX: usize = 0;
pub const COLLATERAL_TOKEN_INDEX: usize = 1;

pub struct InitParams {
    pub admin: Pubkey,
    pub nonce: u8,
    pub exchange_authority: Pubkey,
    pub assets_list: Pubkey,
    pub usd_token: Pubkey,
    pub collateral_token: Pubkey,
    pub collateral_token_feed: Pubkey,
    pub collateral_token_decimals: u8,
    pub collateral_reserve: Pubkey,
    pub liquidation_fund: Pubkey,
    pub staking_fund_account: Pubkey,
    pub amount_per_round: u64,
    pub staking_round_length: u64,
}

pub struct AddNewAssetParams {
    pub asset_address: Pubkey,
    pub feed_address: Pubkey,
    pub decimals: u8,
    pub max_supply: u64,
}

pub struct SetAsCollateralParams {
    pub asset_address: Pubkey,
    pub collateral_address: Pubkey,
    pub reserve_address: Pubkey,
    pub liquidation_fund: Pubkey,
    pub collateral_ratio: u8,
    pub decimals: u8,
}

/// Token accounts taking part in a liquidation.
pub struct LiquidationAccounts {
    pub liquidator: Pubkey,
    pub liquidator_usd_account: Pubkey,
    pub liquidator_collateral_account: Pubkey,
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Liquidation {
    pub burned_amount: u64,
    pub liquidator_reward: u64,
    pub exchange_reward: u64,
}

/// Global exchange ledger together with the token layer it drives.
pub struct Exchange<T: TokenCustody> {
    pub state: State,
    pub assets_list: AssetsList,
    pub custody: T,
}

impl<T: TokenCustody> Exchange<T> {
    pub fn init(ctx: &InstructionContext, params: InitParams, custody: T) -> Result<Self> {
        ctx.require_signer(&params.admin)?;
        require!(
            params.staking_round_length > 0,
            ErrorCode::ParameterOutOfRange
        );
        check_decimals(params.collateral_token_decimals)?;
        let slot = ctx.slot();
        let round_length = params.staking_round_length;
        let amount_per_round = params.amount_per_round;

        let mut assets_list = AssetsList::default();
        assets_list.append_asset(Asset {
            asset_address: params.usd_token,
            price: 10u64.pow(PRICE_OFFSET.into()),
            last_update: u64::MAX,
            decimals: ACCURACY,
            max_supply: u64::MAX,
            ..Default::default()
        })?;
        assets_list.append_asset(Asset {
            feed_address: params.collateral_token_feed,
            asset_address: params.collateral_token,
            decimals: params.collateral_token_decimals,
            collateral: Collateral {
                is_collateral: true,
                collateral_address: params.collateral_token,
                reserve_address: params.collateral_reserve,
                liquidation_fund: params.liquidation_fund,
                reserve_balance: 0,
                collateral_ratio: 100,
                decimals: params.collateral_token_decimals,
            },
            ..Default::default()
        })?;

        let start = |rounds: u64| {
            round_length
                .checked_mul(rounds)
                .and_then(|offset| slot.checked_add(offset))
                .ok_or(ErrorCode::MathOverflow)
        };
        let state = State {
            admin: params.admin,
            halted: false,
            nonce: params.nonce,
            exchange_authority: params.exchange_authority,
            assets_list: params.assets_list,
            debt_shares: 0,
            collateral_shares: 0,
            fee: DEFAULT_FEE,
            max_delay: DEFAULT_MAX_DELAY,
            health_factor: DEFAULT_HEALTH_FACTOR,
            liquidation_threshold: DEFAULT_LIQUIDATION_THRESHOLD,
            collateralization_level: DEFAULT_COLLATERALIZATION_LEVEL,
            penalty_to_liquidator: DEFAULT_PENALTY_TO_LIQUIDATOR,
            penalty_to_exchange: DEFAULT_PENALTY_TO_EXCHANGE,
            liquidation_buffer: DEFAULT_LIQUIDATION_BUFFER,
            staking: Staking {
                fund_account: params.staking_fund_account,
                round_length,
                amount_per_round,
                rounds: [
                    StakingRound {
                        start: slot,
                        all_points: 0,
                        amount: 0,
                    },
                    StakingRound {
                        start: start(1)?,
                        all_points: 0,
                        amount: amount_per_round,
                    },
                    StakingRound {
                        start: start(2)?,
                        all_points: 0,
                        amount: amount_per_round,
                    },
                ],
                round_number: 0,
            },
        };
        msg!("Exchange initialized at slot {}", slot);
        Ok(Exchange {
            state,
            assets_list,
            custody,
        })
    }

    /// Runs `instruction` on copies of the ledger and keeps them only when it succeeds.
    fn execute<R>(
        &mut self,
        exchange_account: &mut ExchangeAccount,
        instruction: impl FnOnce(&mut State, &mut AssetsList, &mut ExchangeAccount, &mut T) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.state.clone();
        let mut assets_list = self.assets_list.clone();
        let mut account = exchange_account.clone();

        let result = instruction(&mut state, &mut assets_list, &mut account, &mut self.custody)?;

        self.state = state;
        self.assets_list = assets_list;
        *exchange_account = account;
        Ok(result)
    }

    fn admin_update(
        &mut self,
        ctx: &InstructionContext,
        update: impl FnOnce(&mut State, &mut AssetsList) -> Result<()>,
    ) -> Result<()> {
        ctx.require_signer(&self.state.admin)?;
        let mut state = self.state.clone();
        let mut assets_list = self.assets_list.clone();

        update(&mut state, &mut assets_list)?;

        self.state = state;
        self.assets_list = assets_list;
        Ok(())
    }

    fn require_not_halted(&self) -> Result<()> {
        require!(!self.state.halted, ErrorCode::ExchangeHalted);
        Ok(())
    }

    pub fn create_exchange_account(
        &self,
        ctx: &InstructionContext,
        owner: Pubkey,
        bump: u8,
    ) -> Result<ExchangeAccount> {
        ctx.require_signer(&owner)?;
        msg!("Created exchange account of {}", owner);
        Ok(ExchangeAccount::new(
            owner,
            bump,
            self.state.staking.round_number,
        ))
    }

    pub fn deposit(
        &mut self,
        ctx: &InstructionContext,
        exchange_account: &mut ExchangeAccount,
        collateral_address: &Pubkey,
        user_token_account: &Pubkey,
        amount: u64,
    ) -> Result<()> {
        ctx.require_signer(&exchange_account.owner)?;
        self.require_not_halted()?;
        require!(amount > 0, ErrorCode::ZeroAmount);
        let slot = ctx.slot();

        self.execute(exchange_account, |state, assets_list, account, custody| {
            sync_staking(state, account, slot)?;

            let index = assets_list.collateral_position(collateral_address)?;
            let collateral = &mut assets_list.assets[index].collateral;
            collateral.reserve_balance = collateral
                .reserve_balance
                .checked_add(amount)
                .ok_or(ErrorCode::MathOverflow)?;
            let reserve_address = collateral.reserve_address;
            state.collateral_shares = state
                .collateral_shares
                .checked_add(amount as u128)
                .ok_or(ErrorCode::MathOverflow)?;

            match account.entry_position(collateral_address) {
                Some(position) => {
                    let entry = &mut account.collaterals[position];
                    entry.amount = entry
                        .amount
                        .checked_add(amount)
                        .ok_or(ErrorCode::MathOverflow)?;
                }
                None => account.append(CollateralEntry {
                    amount,
                    collateral_address: *collateral_address,
                    index: index as u8,
                })?,
            }

            custody.transfer(user_token_account, &reserve_address, amount)?;
            msg!("Deposited {} of {}", amount, collateral_address);
            Ok(())
        })
    }

    pub fn mint(
        &mut self,
        ctx: &InstructionContext,
        exchange_account: &mut ExchangeAccount,
        amount: u64,
        to: &Pubkey,
    ) -> Result<()> {
        ctx.require_signer(&exchange_account.owner)?;
        self.require_not_halted()?;
        require!(amount > 0, ErrorCode::ZeroAmount);
        let slot = ctx.slot();

        self.execute(exchange_account, |state, assets_list, account, custody| {
            sync_staking(state, account, slot)?;

            let total_debt = calculate_debt(assets_list.active(), slot, state.max_delay)?;
            let user_debt =
                calculate_user_debt_in_usd(account.debt_shares, total_debt, state.debt_shares);
            let (_, weighted_value) =
                calculate_collateral_value(assets_list, account, slot, state.max_delay)?;
            let max_debt = calculate_max_debt_in_usd(weighted_value, state.collateralization_level);
            let debt_after = user_debt
                .checked_add(amount)
                .ok_or(ErrorCode::MathOverflow)?;
            require!(debt_after <= max_debt, ErrorCode::InsufficientCollateral);

            let usd = &mut assets_list.assets[USD_INDEX];
            let supply = usd
                .supply
                .checked_add(amount)
                .ok_or(ErrorCode::MathOverflow)?;
            require!(supply <= usd.max_supply, ErrorCode::MaxSupply);
            usd.supply = supply;
            let usd_token = usd.asset_address;

            let new_shares = calculate_new_shares(state.debt_shares, total_debt, amount)?;
            state.debt_shares = state
                .debt_shares
                .checked_add(new_shares)
                .ok_or(ErrorCode::MathOverflow)?;
            account.debt_shares = account
                .debt_shares
                .checked_add(new_shares)
                .ok_or(ErrorCode::MathOverflow)?;

            update_points(state, assets_list, account, slot, false)?;

            custody.mint_to(&usd_token, to, amount)?;
            msg!("Minted {} usd", amount);
            Ok(())
        })
    }

    /// Burns up to `amount` of the account's debt, returns the amount burned.
    pub fn burn(
        &mut self,
        ctx: &InstructionContext,
        exchange_account: &mut ExchangeAccount,
        amount: u64,
        from: &Pubkey,
    ) -> Result<u64> {
        ctx.require_signer(&exchange_account.owner)?;
        self.require_not_halted()?;
        require!(amount > 0, ErrorCode::ZeroAmount);
        let slot = ctx.slot();

        self.execute(exchange_account, |state, assets_list, account, custody| {
            sync_staking(state, account, slot)?;

            let total_debt = calculate_debt(assets_list.active(), slot, state.max_delay)?;
            let user_debt =
                calculate_user_debt_in_usd(account.debt_shares, total_debt, state.debt_shares);
            let burned_amount = amount.min(user_debt);
            require!(burned_amount > 0, ErrorCode::InsufficientFund);

            let usd_token = burn_debt(state, assets_list, account, user_debt, burned_amount)?;
            update_points(state, assets_list, account, slot, true)?;

            custody.burn(&usd_token, from, burned_amount)?;
            msg!("Burned {} usd", burned_amount);
            Ok(burned_amount)
        })
    }

    /// Withdraws collateral, `u64::MAX` takes everything the debt allows.
    /// Returns the withdrawn amount.
    pub fn withdraw(
        &mut self,
        ctx: &InstructionContext,
        exchange_account: &mut ExchangeAccount,
        collateral_address: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<u64> {
        ctx.require_signer(&exchange_account.owner)?;
        self.require_not_halted()?;
        require!(amount > 0, ErrorCode::ZeroAmount);
        let slot = ctx.slot();

        self.execute(exchange_account, |state, assets_list, account, custody| {
            sync_staking(state, account, slot)?;

            let position = account
                .entry_position(collateral_address)
                .ok_or(ErrorCode::NoAssetFound)?;
            let entry = account.collaterals[position];
            let asset = assets_list.assets[entry.index as usize];

            let total_debt = calculate_debt(assets_list.active(), slot, state.max_delay)?;
            let user_debt =
                calculate_user_debt_in_usd(account.debt_shares, total_debt, state.debt_shares);
            let (_, weighted_value) =
                calculate_collateral_value(assets_list, account, slot, state.max_delay)?;

            let collateral = asset.collateral;
            let max_amount = if user_debt == 0
                || !collateral.is_collateral
                || collateral.collateral_ratio == 0
            {
                entry.amount
            } else {
                let required = div_up(
                    user_debt as u128 * state.collateralization_level as u128,
                    100,
                );
                let surplus = (weighted_value as u128).saturating_sub(required);
                let surplus_value = surplus * 100 / collateral.collateral_ratio as u128;
                let surplus_value = surplus_value.min(u64::MAX as u128) as u64;
                usd_to_token_amount(asset.price, collateral.decimals, surplus_value)?
                    .min(entry.amount)
            };
            let amount = if amount == u64::MAX { max_amount } else { amount };
            require!(amount > 0 && amount <= max_amount, ErrorCode::WithdrawLimit);

            let reserve = &mut assets_list.assets[entry.index as usize].collateral;
            reserve.reserve_balance = reserve
                .reserve_balance
                .checked_sub(amount)
                .ok_or(ErrorCode::InsufficientFund)?;
            let reserve_address = reserve.reserve_address;
            state.collateral_shares = state
                .collateral_shares
                .checked_sub(amount as u128)
                .ok_or(ErrorCode::InsufficientFund)?;
            take_collateral(account, position, amount);

            custody.transfer(&reserve_address, to, amount)?;
            msg!("Withdrawn {} of {}", amount, collateral_address);
            Ok(amount)
        })
    }

    /// Credits the account's share of the finished round. Returns the reward credited.
    pub fn claim_rewards(
        &mut self,
        ctx: &InstructionContext,
        exchange_account: &mut ExchangeAccount,
    ) -> Result<u64> {
        let slot = ctx.slot();
        self.execute(exchange_account, |state, _, account, _| {
            sync_staking(state, account, slot)?;
            let reward = claim_finished_round(&state.staking, &mut account.user_staking_data)?;
            msg!(
                "Claimed {} from round {}",
                reward,
                state.staking.finished_round().start
            );
            Ok(reward)
        })
    }

    pub fn withdraw_rewards(
        &mut self,
        ctx: &InstructionContext,
        exchange_account: &mut ExchangeAccount,
        to: &Pubkey,
    ) -> Result<u64> {
        ctx.require_signer(&exchange_account.owner)?;
        self.require_not_halted()?;

        self.execute(exchange_account, |state, _, account, custody| {
            let amount = account.user_staking_data.amount_to_claim;
            require!(amount > 0, ErrorCode::NoRewards);
            let fund_account = state.staking.fund_account;
            require!(
                custody.balance_of(&fund_account) >= amount,
                ErrorCode::InsufficientFund
            );
            account.user_staking_data.amount_to_claim = 0;

            custody.transfer(&fund_account, to, amount)?;
            msg!("Withdrawn {} of rewards", amount);
            Ok(amount)
        })
    }

    pub fn set_assets_prices<F: PriceFeed + ?Sized>(
        &mut self,
        ctx: &InstructionContext,
        price_feed: &F,
        feeds: &[Pubkey],
    ) -> Result<()> {
        let mut assets_list = self.assets_list.clone();
        for feed in feeds {
            let position = assets_list
                .active()
                .iter()
                .position(|asset| asset.feed_address == *feed && *feed != Pubkey::default())
                .ok_or(ErrorCode::NoAssetFound)?;
            let oracle_price = price_feed.get_price(feed)?;
            require!(
                oracle_price.publish_slot <= ctx.slot(),
                ErrorCode::InvalidOracle
            );

            let asset = &mut assets_list.assets[position];
            asset.price = normalize_price(oracle_price.price, oracle_price.expo)?;
            asset.last_update = oracle_price.publish_slot;
        }
        self.assets_list = assets_list;
        Ok(())
    }

    /// Starts the liquidation buffer of an undercollateralized account, clears it for a
    /// healthy one.
    pub fn check_account_collateralization(
        &mut self,
        ctx: &InstructionContext,
        exchange_account: &mut ExchangeAccount,
    ) -> Result<Health> {
        let slot = ctx.slot();
        self.execute(exchange_account, |state, assets_list, account, _| {
            let health = compute_health(state, assets_list, account, slot)?;
            if !health.liquidatable {
                account.liquidation_deadline = u64::MAX;
            } else if account.liquidation_deadline == u64::MAX {
                account.liquidation_deadline = slot.saturating_add(state.liquidation_buffer as u64);
                msg!(
                    "Account {} liquidatable after slot {}",
                    account.owner,
                    account.liquidation_deadline
                );
            }
            Ok(health)
        })
    }

    pub fn liquidate(
        &mut self,
        ctx: &InstructionContext,
        exchange_account: &mut ExchangeAccount,
        collateral_address: &Pubkey,
        accounts: &LiquidationAccounts,
        amount: u64,
    ) -> Result<Liquidation> {
        ctx.require_signer(&accounts.liquidator)?;
        self.require_not_halted()?;
        require!(amount > 0, ErrorCode::ZeroAmount);
        let slot = ctx.slot();
        require!(
            exchange_account.liquidation_deadline <= slot,
            ErrorCode::LiquidationDeadline
        );

        self.execute(exchange_account, |state, assets_list, account, custody| {
            sync_staking(state, account, slot)?;

            let health = compute_health(state, assets_list, account, slot)?;
            require!(health.liquidatable, ErrorCode::NotLiquidatable);

            let (max_burned_amount, _, _) = calculate_liquidation(
                health.collateral_value,
                health.debt_value,
                state.collateralization_level,
                state.penalty_to_liquidator,
                state.penalty_to_exchange,
            )?;
            let burned_amount = amount.min(max_burned_amount);
            require!(burned_amount > 0, ErrorCode::NotLiquidatable);

            let position = account
                .entry_position(collateral_address)
                .ok_or(ErrorCode::NoAssetFound)?;
            let entry = account.collaterals[position];
            let asset = assets_list.assets[entry.index as usize];
            let (user_reward_usd, system_reward_usd) = calculate_liquidation_rewards(
                burned_amount,
                state.penalty_to_liquidator,
                state.penalty_to_exchange,
            )?;
            let liquidator_reward =
                usd_to_token_amount(asset.price, asset.collateral.decimals, user_reward_usd)?;
            let exchange_reward =
                usd_to_token_amount(asset.price, asset.collateral.decimals, system_reward_usd)?;
            let seized = liquidator_reward
                .checked_add(exchange_reward)
                .ok_or(ErrorCode::MathOverflow)?;
            require!(seized <= entry.amount, ErrorCode::InsufficientCollateral);

            let usd_token = burn_debt(state, assets_list, account, health.debt_value, burned_amount)?;

            let reserve = &mut assets_list.assets[entry.index as usize].collateral;
            reserve.reserve_balance = reserve
                .reserve_balance
                .checked_sub(seized)
                .ok_or(ErrorCode::InsufficientFund)?;
            let reserve_address = reserve.reserve_address;
            let liquidation_fund = reserve.liquidation_fund;
            state.collateral_shares = state
                .collateral_shares
                .checked_sub(seized as u128)
                .ok_or(ErrorCode::InsufficientFund)?;
            take_collateral(account, position, seized);

            update_points(state, assets_list, account, slot, true)?;
            if !compute_health(state, assets_list, account, slot)?.liquidatable {
                account.liquidation_deadline = u64::MAX;
            }

            custody.burn(&usd_token, &accounts.liquidator_usd_account, burned_amount)?;
            custody.transfer(
                &reserve_address,
                &accounts.liquidator_collateral_account,
                liquidator_reward,
            )?;
            if exchange_reward > 0 {
                custody.transfer(&reserve_address, &liquidation_fund, exchange_reward)?;
            }
            msg!(
                "Liquidated {} of {} debt",
                burned_amount,
                account.owner
            );
            Ok(Liquidation {
                burned_amount,
                liquidator_reward,
                exchange_reward,
            })
        })
    }

    // Admin

    pub fn set_admin(&mut self, ctx: &InstructionContext, admin: Pubkey) -> Result<()> {
        self.admin_update(ctx, |state, _| {
            state.admin = admin;
            msg!("Admin set to {}", admin);
            Ok(())
        })
    }

    pub fn set_halted(&mut self, ctx: &InstructionContext, halted: bool) -> Result<()> {
        self.admin_update(ctx, |state, _| {
            state.halted = halted;
            msg!("Halted set to {}", halted);
            Ok(())
        })
    }

    pub fn set_fee(&mut self, ctx: &InstructionContext, fee: u16) -> Result<()> {
        self.admin_update(ctx, |state, _| {
            require!(fee <= MAX_FEE, ErrorCode::ParameterOutOfRange);
            state.fee = fee;
            msg!("Fee set to {}", fee);
            Ok(())
        })
    }

    pub fn set_max_delay(&mut self, ctx: &InstructionContext, max_delay: u32) -> Result<()> {
        self.admin_update(ctx, |state, _| {
            state.max_delay = max_delay;
            msg!("Max delay set to {}", max_delay);
            Ok(())
        })
    }

    pub fn set_health_factor(&mut self, ctx: &InstructionContext, factor: u8) -> Result<()> {
        self.admin_update(ctx, |state, _| {
            require!(
                (1..=100).contains(&factor),
                ErrorCode::ParameterOutOfRange
            );
            state.health_factor = factor;
            msg!("Health factor set to {}", factor);
            Ok(())
        })
    }

    pub fn set_liquidation_buffer(&mut self, ctx: &InstructionContext, buffer: u32) -> Result<()> {
        self.admin_update(ctx, |state, _| {
            state.liquidation_buffer = buffer;
            msg!("Liquidation buffer set to {}", buffer);
            Ok(())
        })
    }

    pub fn set_liquidation_threshold(
        &mut self,
        ctx: &InstructionContext,
        threshold: u16,
    ) -> Result<()> {
        self.admin_update(ctx, |state, _| {
            require!(
                threshold > 100 && threshold <= state.collateralization_level,
                ErrorCode::ParameterOutOfRange
            );
            state.liquidation_threshold = threshold;
            msg!("Liquidation threshold set to {}", threshold);
            Ok(())
        })
    }

    pub fn set_liquidation_penalties(
        &mut self,
        ctx: &InstructionContext,
        penalty_to_liquidator: u8,
        penalty_to_exchange: u8,
    ) -> Result<()> {
        self.admin_update(ctx, |state, _| {
            require!(
                penalty_to_liquidator <= MAX_PENALTY && penalty_to_exchange <= MAX_PENALTY,
                ErrorCode::ParameterOutOfRange
            );
            require!(
                state.collateralization_level as u64
                    > 100 + penalty_to_liquidator as u64 + penalty_to_exchange as u64,
                ErrorCode::ParameterOutOfRange
            );
            state.penalty_to_liquidator = penalty_to_liquidator;
            state.penalty_to_exchange = penalty_to_exchange;
            msg!(
                "Liquidation penalties set to {} and {}",
                penalty_to_liquidator,
                penalty_to_exchange
            );
            Ok(())
        })
    }

    pub fn set_collateralization_level(
        &mut self,
        ctx: &InstructionContext,
        level: u16,
    ) -> Result<()> {
        self.admin_update(ctx, |state, _| {
            require!(
                level >= state.liquidation_threshold
                    && level as u64 > 100 + state.liquidation_penalty() as u64,
                ErrorCode::ParameterOutOfRange
            );
            state.collateralization_level = level;
            msg!("Collateralization level set to {}", level);
            Ok(())
        })
    }

    pub fn set_staking_amount_per_round(
        &mut self,
        ctx: &InstructionContext,
        amount_per_round: u64,
    ) -> Result<()> {
        self.admin_update(ctx, |state, _| {
            state.staking.amount_per_round = amount_per_round;
            msg!("Staking amount per round set to {}", amount_per_round);
            Ok(())
        })
    }

    /// Applies the new length from the running round on.
    pub fn set_staking_round_length(
        &mut self,
        ctx: &InstructionContext,
        round_length: u64,
    ) -> Result<()> {
        let slot = ctx.slot();
        self.admin_update(ctx, |state, _| {
            require!(round_length > 0, ErrorCode::ParameterOutOfRange);
            let staking = &mut state.staking;
            adjust_staking_rounds(staking, slot)?;

            let current_start = staking.current_round().start;
            let finished_start = current_start
                .checked_sub(round_length)
                .ok_or(ErrorCode::ParameterOutOfRange)?;
            staking.round_length = round_length;
            staking.next_round_mut().start = current_start
                .checked_add(round_length)
                .ok_or(ErrorCode::MathOverflow)?;
            staking.finished_round_mut().start = finished_start;
            // a shorter round may already be over
            adjust_staking_rounds(staking, slot)?;
            msg!("Staking round length set to {}", round_length);
            Ok(())
        })
    }

    pub fn add_new_asset(
        &mut self,
        ctx: &InstructionContext,
        params: AddNewAssetParams,
    ) -> Result<()> {
        self.admin_update(ctx, |_, assets_list| {
            require!(
                assets_list.position(&params.asset_address).is_none(),
                ErrorCode::AssetAlreadyExists
            );
            check_decimals(params.decimals)?;
            assets_list.append_asset(Asset {
                feed_address: params.feed_address,
                asset_address: params.asset_address,
                decimals: params.decimals,
                max_supply: params.max_supply,
                ..Default::default()
            })?;
            msg!("Added asset {}", params.asset_address);
            Ok(())
        })
    }

    pub fn set_max_supply(
        &mut self,
        ctx: &InstructionContext,
        asset_address: &Pubkey,
        max_supply: u64,
    ) -> Result<()> {
        self.admin_update(ctx, |_, assets_list| {
            let asset = assets_list.find_mut(asset_address)?;
            require!(max_supply >= asset.supply, ErrorCode::MaxSupply);
            asset.max_supply = max_supply;
            msg!("Max supply of {} set to {}", asset_address, max_supply);
            Ok(())
        })
    }

    pub fn set_price_feed(
        &mut self,
        ctx: &InstructionContext,
        asset_address: &Pubkey,
        feed_address: Pubkey,
    ) -> Result<()> {
        self.admin_update(ctx, |_, assets_list| {
            let position = assets_list
                .position(asset_address)
                .ok_or(ErrorCode::NoAssetFound)?;
            require!(position != USD_INDEX, ErrorCode::ParameterOutOfRange);
            assets_list.assets[position].feed_address = feed_address;
            msg!("Price feed of {} set to {}", asset_address, feed_address);
            Ok(())
        })
    }

    pub fn set_as_collateral(
        &mut self,
        ctx: &InstructionContext,
        params: SetAsCollateralParams,
    ) -> Result<()> {
        self.admin_update(ctx, |_, assets_list| {
            require!(
                params.collateral_ratio <= 100,
                ErrorCode::ParameterOutOfRange
            );
            check_decimals(params.decimals)?;
            let position = assets_list
                .position(&params.asset_address)
                .ok_or(ErrorCode::NoAssetFound)?;
            require!(position != USD_INDEX, ErrorCode::ParameterOutOfRange);
            let taken = assets_list.active().iter().enumerate().any(|(index, asset)| {
                index != position
                    && asset.collateral.collateral_address == params.collateral_address
            });
            require!(!taken, ErrorCode::AssetAlreadyExists);

            let collateral = &mut assets_list.assets[position].collateral;
            collateral.is_collateral = true;
            collateral.collateral_address = params.collateral_address;
            collateral.reserve_address = params.reserve_address;
            collateral.liquidation_fund = params.liquidation_fund;
            collateral.collateral_ratio = params.collateral_ratio;
            collateral.decimals = params.decimals;
            msg!(
                "Asset {} accepted as collateral with ratio {}",
                params.asset_address,
                params.collateral_ratio
            );
            Ok(())
        })
    }

    pub fn set_collateral_ratio(
        &mut self,
        ctx: &InstructionContext,
        collateral_address: &Pubkey,
        collateral_ratio: u8,
    ) -> Result<()> {
        self.admin_update(ctx, |_, assets_list| {
            require!(collateral_ratio <= 100, ErrorCode::ParameterOutOfRange);
            let position = assets_list.collateral_position(collateral_address)?;
            assets_list.assets[position].collateral.collateral_ratio = collateral_ratio;
            msg!(
                "Collateral ratio of {} set to {}",
                collateral_address,
                collateral_ratio
            );
            Ok(())
        })
    }
}

fn check_decimals(decimals: u8) -> Result<()> {
    require!(
        (ACCURACY..=MAX_DECIMALS).contains(&decimals),
        ErrorCode::ParameterOutOfRange
    );
    Ok(())
}

fn sync_staking(state: &mut State, account: &mut ExchangeAccount, slot: u64) -> Result<()> {
    adjust_staking_rounds(&mut state.staking, slot)?;
    adjust_staking_account(&mut account.user_staking_data, &state.staking);
    Ok(())
}

/// Recomputes the account's points from its debt after a debt change.
fn update_points(
    state: &mut State,
    assets_list: &AssetsList,
    account: &mut ExchangeAccount,
    slot: u64,
    cap_current: bool,
) -> Result<()> {
    let total_debt = calculate_debt(assets_list.active(), slot, state.max_delay)?;
    let debt = calculate_user_debt_in_usd(account.debt_shares, total_debt, state.debt_shares);
    let points = points_for_debt(debt, state.health_factor);

    set_next_round_points(&mut state.staking, &mut account.user_staking_data, points)?;
    if cap_current {
        cap_current_round_points(&mut state.staking, &mut account.user_staking_data, points)?;
    }
    Ok(())
}

/// Burns `amount` of usd debt from the account, returns the usd mint.
fn burn_debt(
    state: &mut State,
    assets_list: &mut AssetsList,
    account: &mut ExchangeAccount,
    user_debt: u64,
    amount: u64,
) -> Result<Pubkey> {
    let burned_shares = calculate_burned_shares(user_debt, account.debt_shares, amount)?;
    account.debt_shares = account
        .debt_shares
        .checked_sub(burned_shares)
        .ok_or(ErrorCode::MathOverflow)?;
    state.debt_shares = state
        .debt_shares
        .checked_sub(burned_shares)
        .ok_or(ErrorCode::MathOverflow)?;

    let usd = &mut assets_list.assets[USD_INDEX];
    usd.supply = usd
        .supply
        .checked_sub(amount)
        .ok_or(ErrorCode::InsufficientFund)?;
    Ok(usd.asset_address)
}

fn take_collateral(account: &mut ExchangeAccount, position: usize, amount: u64) {
    let entry = &mut account.collaterals[position];
    entry.amount -= amount;
    if entry.amount == 0 {
        account.remove(position);
    }
}
