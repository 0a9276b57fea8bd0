use crate::math::{calculate_reward, mul_by_percentage};
use crate::*;

pub fn check_feed_update(asset: &Asset, slot: u64, max_delay: u32) -> Result<()> {
    if asset.last_update < slot.saturating_sub(max_delay as u64) {
        msg!(
            "Price of {} last updated at slot {}",
            asset.asset_address,
            asset.last_update
        );
        return err!(ErrorCode::StaleOracle);
    }
    Ok(())
}

/// Rotates staking rounds until `next_round.start` lies in the future again.
/// Returns the number of rounds that elapsed.
pub fn adjust_staking_rounds(staking: &mut Staking, slot: u64) -> Result<u64> {
    let next_start = staking.next_round().start;
    if slot < next_start {
        return Ok(0);
    }
    require!(staking.round_length > 0, ErrorCode::InvalidRoundState);

    let elapsed = (slot - next_start) / staking.round_length + 1;
    if elapsed > ROUNDS_IN_FLIGHT {
        // Only the last three rotations are observable, skip straight to them
        let skipped = elapsed - ROUNDS_IN_FLIGHT;
        let next = *staking.next_round();
        let start = skipped
            .checked_mul(staking.round_length)
            .and_then(|offset| next.start.checked_add(offset))
            .ok_or(ErrorCode::MathOverflow)?;
        staking.round_number = staking
            .round_number
            .checked_add(skipped)
            .ok_or(ErrorCode::MathOverflow)?;
        *staking.next_round_mut() = StakingRound { start, ..next };
    }
    for _ in 0..elapsed.min(ROUNDS_IN_FLIGHT) {
        staking.rotate()?;
    }
    msg!(
        "Staking round {} started at slot {} after {} rotations",
        staking.round_number,
        staking.current_round().start,
        elapsed
    );
    Ok(elapsed)
}

/// Promotes the account's point buckets to the rounds the state currently holds.
pub fn adjust_staking_account(user: &mut UserStaking, staking: &Staking) {
    match staking.round_number.saturating_sub(user.last_round) {
        0 => {}
        1 => {
            user.finished_round_points = user.current_round_points;
            user.current_round_points = user.next_round_points;
        }
        _ => {
            user.finished_round_points = user.next_round_points;
            user.current_round_points = user.next_round_points;
        }
    }
    user.last_round = staking.round_number;
}

pub fn points_for_debt(debt: u64, health_factor: u8) -> u128 {
    mul_by_percentage(debt as u128, health_factor as u64)
}

pub fn set_next_round_points(staking: &mut Staking, user: &mut UserStaking, points: u128) -> Result<()> {
    let next = staking.next_round_mut();
    next.all_points = next
        .all_points
        .checked_sub(user.next_round_points)
        .ok_or(ErrorCode::InvalidRoundState)?
        .checked_add(points)
        .ok_or(ErrorCode::MathOverflow)?;
    user.next_round_points = points;
    Ok(())
}

/// Lowers the running round's points to `points`, never raises them.
pub fn cap_current_round_points(
    staking: &mut Staking,
    user: &mut UserStaking,
    points: u128,
) -> Result<()> {
    if points >= user.current_round_points {
        return Ok(());
    }
    let removed = user.current_round_points - points;
    let current = staking.current_round_mut();
    current.all_points = current
        .all_points
        .checked_sub(removed)
        .ok_or(ErrorCode::InvalidRoundState)?;
    user.current_round_points = points;
    Ok(())
}

/// Moves the account's share of the finished round into `amount_to_claim`.
/// Returns the reward credited by this call.
pub fn claim_finished_round(staking: &Staking, user: &mut UserStaking) -> Result<u64> {
    let finished = staking.finished_round();
    if user.finished_round_points == 0 || finished.all_points == 0 {
        return Ok(0);
    }
    require!(
        user.finished_round_points <= finished.all_points,
        ErrorCode::InvalidRoundState
    );
    let reward = calculate_reward(
        finished.amount,
        user.finished_round_points,
        finished.all_points,
    )?;
    user.amount_to_claim = user
        .amount_to_claim
        .checked_add(reward)
        .ok_or(ErrorCode::MathOverflow)?;
    user.finished_round_points = 0;
    Ok(reward)
}
