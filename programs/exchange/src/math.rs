use std::convert::TryInto;

use crate::*;

// Min decimals for asset = 6
pub const ACCURACY: u8 = 6;
// Prices are stored with 6 decimal places
pub const PRICE_OFFSET: u8 = 6;
// Max decimals for asset, keeps 10^decimals * price * amount within u128
pub const MAX_DECIMALS: u8 = 18;

/// `floor(amount * percentage / 100)`, never rounds up.
pub fn mul_by_percentage(amount: u128, percentage: u64) -> u128 {
    // split so the product cannot overflow for any realistic amount
    let percentage = percentage as u128;
    (amount / 100) * percentage + (amount % 100) * percentage / 100
}

pub fn div_up(a: u128, b: u128) -> u128 {
    if b == 0 {
        return 0;
    }
    (a + (b - 1)) / b
}

fn usd_denominator(decimals: u8) -> Result<u128> {
    let exponent = (decimals as u32 + PRICE_OFFSET as u32)
        .checked_sub(ACCURACY as u32)
        .ok_or(ErrorCode::ParameterOutOfRange)?;
    10u128
        .checked_pow(exponent)
        .ok_or(ErrorCode::MathOverflow.into())
}

pub fn calculate_value_in_usd(price: u64, amount: u64, decimals: u8) -> Result<u64> {
    let value = (price as u128)
        .checked_mul(amount as u128)
        .ok_or(ErrorCode::MathOverflow)?
        .checked_div(usd_denominator(decimals)?)
        .ok_or(ErrorCode::MathOverflow)?;
    value.try_into().map_err(|_| ErrorCode::MathOverflow.into())
}

pub fn calculate_debt(assets: &[Asset], slot: u64, max_delay: u32) -> Result<u64> {
    let mut debt = 0u128;
    for asset in assets.iter().filter(|asset| asset.supply > 0) {
        utils::check_feed_update(asset, slot, max_delay)?;

        debt = debt
            .checked_add(div_up(
                (asset.price as u128)
                    .checked_mul(asset.supply as u128)
                    .ok_or(ErrorCode::MathOverflow)?,
                usd_denominator(asset.decimals)?,
            ))
            .ok_or(ErrorCode::MathOverflow)?;
    }
    debt.try_into().map_err(|_| ErrorCode::MathOverflow.into())
}

pub fn calculate_user_debt_in_usd(user_debt_shares: u128, debt: u64, debt_shares: u128) -> u64 {
    if debt_shares == 0 {
        return 0;
    }
    let user_debt = div_up(
        (debt as u128).saturating_mul(user_debt_shares),
        debt_shares,
    );
    // user shares never exceed all shares, so this fits in debt
    user_debt.min(debt as u128) as u64
}

pub fn calculate_max_debt_in_usd(
    weighted_collateral_value: u64,
    collateralization_level: u16,
) -> u64 {
    if collateralization_level == 0 {
        return 0;
    }
    ((weighted_collateral_value as u128) * 100 / collateralization_level as u128) as u64
}

pub fn calculate_new_shares(all_shares: u128, full_amount: u64, new_amount: u64) -> Result<u128> {
    //  full_amount is always != 0 if all_shares > 0
    if all_shares == 0 || full_amount == 0 {
        return Ok(new_amount as u128);
    }
    all_shares
        .checked_mul(new_amount as u128)
        .ok_or(ErrorCode::MathOverflow)?
        .checked_div(full_amount as u128)
        .ok_or(ErrorCode::MathOverflow.into())
}

pub fn calculate_burned_shares(user_debt: u64, user_shares: u128, amount: u64) -> Result<u128> {
    if user_debt == 0 {
        return Ok(0);
    }
    if amount >= user_debt {
        return Ok(user_shares);
    }
    user_shares
        .checked_mul(amount as u128)
        .ok_or(ErrorCode::MathOverflow)?
        .checked_div(user_debt as u128)
        .ok_or(ErrorCode::MathOverflow.into())
}

pub fn usd_to_token_amount(price: u64, decimals: u8, value: u64) -> Result<u64> {
    require!(price > 0, ErrorCode::InvalidOracle);
    let amount = (value as u128)
        .checked_mul(usd_denominator(decimals)?)
        .ok_or(ErrorCode::MathOverflow)?
        .checked_div(price as u128)
        .ok_or(ErrorCode::MathOverflow)?;
    amount.try_into().map_err(|_| ErrorCode::MathOverflow.into())
}

/// Largest debt value that can be burned so the account returns to
/// `collateralization_level`, with the rewards paid out of its collateral for doing so.
pub fn calculate_liquidation(
    collateral_value: u64,
    debt_value: u64,
    collateralization_level: u16, // in %
    penalty_to_liquidator: u8,    // in %
    penalty_to_exchange: u8,      // in %
) -> Result<(u64, u64, u64)> {
    let penalty = penalty_to_liquidator as u128 + penalty_to_exchange as u128;
    let level = collateralization_level as u128;
    require!(level > 100 + penalty, ErrorCode::ParameterOutOfRange);

    let required = (debt_value as u128) * level;
    let owned = (collateral_value as u128) * 100;
    let max_burned_amount = required.saturating_sub(owned) / (level - 100 - penalty);
    let max_burned_amount = max_burned_amount.min(debt_value as u128) as u64;

    let (user_reward_usd, system_reward_usd) =
        calculate_liquidation_rewards(max_burned_amount, penalty_to_liquidator, penalty_to_exchange)?;
    Ok((max_burned_amount, user_reward_usd, system_reward_usd))
}

/// Value paid to the liquidator (burned amount plus penalty) and to the liquidation fund.
pub fn calculate_liquidation_rewards(
    burned_amount: u64,
    penalty_to_liquidator: u8,
    penalty_to_exchange: u8,
) -> Result<(u64, u64)> {
    let burned_amount = burned_amount as u128;
    let user_reward_usd = burned_amount * (100 + penalty_to_liquidator as u128) / 100;
    let system_reward_usd = div_up(burned_amount * penalty_to_exchange as u128, 100);
    Ok((
        user_reward_usd
            .try_into()
            .map_err(|_| ErrorCode::MathOverflow)?,
        system_reward_usd
            .try_into()
            .map_err(|_| ErrorCode::MathOverflow)?,
    ))
}

pub fn calculate_reward(round_amount: u64, points: u128, all_points: u128) -> Result<u64> {
    if points == 0 || all_points == 0 {
        return Ok(0);
    }
    let reward = (round_amount as u128)
        .checked_mul(points)
        .ok_or(ErrorCode::MathOverflow)?
        .checked_div(all_points)
        .ok_or(ErrorCode::MathOverflow)?;
    reward.try_into().map_err(|_| ErrorCode::MathOverflow.into())
}

/// Rescales an oracle price given as `price * 10^expo` to PRICE_OFFSET decimals.
pub fn normalize_price(price: i64, expo: i32) -> Result<u64> {
    require!(price > 0, ErrorCode::InvalidOracle);
    let shift = expo
        .checked_add(PRICE_OFFSET as i32)
        .ok_or(ErrorCode::InvalidOracle)?;
    let scale = 10u128
        .checked_pow(shift.unsigned_abs())
        .ok_or(ErrorCode::InvalidOracle)?;
    let scaled = if shift >= 0 {
        (price as u128)
            .checked_mul(scale)
            .ok_or(ErrorCode::MathOverflow)?
    } else {
        (price as u128) / scale
    };
    scaled.try_into().map_err(|_| ErrorCode::MathOverflow.into())
}
