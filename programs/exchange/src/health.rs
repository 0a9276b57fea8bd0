use crate::math::{
    calculate_debt, calculate_max_debt_in_usd, calculate_user_debt_in_usd,
    calculate_value_in_usd, mul_by_percentage,
};
use crate::utils::check_feed_update;
use crate::*;

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Health {
    pub collateral_value: u64,
    pub max_debt: u64,
    pub debt_value: u64,
    /// Collateral value to debt value in %, `u64::MAX` without debt.
    pub health_factor: u64,
    pub liquidatable: bool,
}

/// Value of every collateral entry and the part of it that may back debt.
pub fn calculate_collateral_value(
    assets_list: &AssetsList,
    exchange_account: &ExchangeAccount,
    slot: u64,
    max_delay: u32,
) -> Result<(u64, u64)> {
    let mut value = 0u64;
    let mut weighted_value = 0u64;
    for entry in exchange_account
        .entries()
        .iter()
        .filter(|entry| entry.amount > 0)
    {
        let asset = &assets_list.assets[entry.index as usize];
        check_feed_update(asset, slot, max_delay)?;

        let entry_value =
            calculate_value_in_usd(asset.price, entry.amount, asset.collateral.decimals)?;
        value = value
            .checked_add(entry_value)
            .ok_or(ErrorCode::MathOverflow)?;
        if asset.collateral.is_collateral {
            weighted_value = weighted_value
                .checked_add(mul_by_percentage(
                    entry_value as u128,
                    asset.collateral.collateral_ratio as u64,
                ) as u64)
                .ok_or(ErrorCode::MathOverflow)?;
        }
    }
    Ok((value, weighted_value))
}

pub fn compute_health(
    state: &State,
    assets_list: &AssetsList,
    exchange_account: &ExchangeAccount,
    slot: u64,
) -> Result<Health> {
    let total_debt = calculate_debt(assets_list.active(), slot, state.max_delay)?;
    let debt_value =
        calculate_user_debt_in_usd(exchange_account.debt_shares, total_debt, state.debt_shares);
    let (collateral_value, weighted_value) =
        calculate_collateral_value(assets_list, exchange_account, slot, state.max_delay)?;

    let health_factor = match debt_value {
        0 => u64::MAX,
        debt => {
            let ratio = (collateral_value as u128) * 100 / debt as u128;
            ratio.min(u64::MAX as u128) as u64
        }
    };
    let liquidatable =
        mul_by_percentage(debt_value as u128, state.liquidation_threshold as u64)
            > collateral_value as u128;

    Ok(Health {
        collateral_value,
        max_debt: calculate_max_debt_in_usd(weighted_value, state.collateralization_level),
        debt_value,
        health_factor,
        liquidatable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::PRICE_OFFSET;

    const SLOT: u64 = 100;

    fn setup(sny_price: u64, deposited: u64, debt: u64) -> (State, AssetsList, ExchangeAccount) {
        let state = State {
            debt_shares: debt as u128,
            collateral_shares: deposited as u128,
            liquidation_threshold: 200,
            collateralization_level: 1000,
            ..Default::default()
        };
        let sny = Pubkey::new_unique();
        let mut assets_list = AssetsList::default();
        assets_list
            .append_asset(Asset {
                price: 10u64.pow(PRICE_OFFSET.into()),
                last_update: u64::MAX,
                supply: debt,
                decimals: 6,
                ..Default::default()
            })
            .unwrap();
        assets_list
            .append_asset(Asset {
                asset_address: sny,
                price: sny_price,
                last_update: SLOT,
                decimals: 6,
                collateral: Collateral {
                    is_collateral: true,
                    collateral_address: sny,
                    collateral_ratio: 100,
                    decimals: 6,
                    ..Default::default()
                },
                ..Default::default()
            })
            .unwrap();
        let mut exchange_account = ExchangeAccount::new(Pubkey::new_unique(), 0, 0);
        exchange_account.debt_shares = debt as u128;
        exchange_account
            .append(CollateralEntry {
                amount: deposited,
                collateral_address: sny,
                index: 1,
            })
            .unwrap();
        (state, assets_list, exchange_account)
    }

    #[test]
    fn test_compute_health() {
        // 1000 SNY at 2 USD backing 200 USD
        let (state, assets_list, exchange_account) =
            setup(2 * 10u64.pow(PRICE_OFFSET.into()), 1000_000000, 200_000000);
        let health = compute_health(&state, &assets_list, &exchange_account, SLOT).unwrap();
        assert_eq!(
            health,
            Health {
                collateral_value: 2000_000000,
                max_debt: 200_000000,
                debt_value: 200_000000,
                health_factor: 1000,
                liquidatable: false,
            }
        );
    }

    #[test]
    fn test_compute_health_liquidatable() {
        // price drops to 0.35, 350 USD < 200% of 200 USD
        let (state, assets_list, exchange_account) = setup(350_000, 1000_000000, 200_000000);
        let health = compute_health(&state, &assets_list, &exchange_account, SLOT).unwrap();
        assert_eq!(health.collateral_value, 350_000000);
        assert_eq!(health.max_debt, 35_000000);
        assert_eq!(health.health_factor, 175);
        assert!(health.liquidatable);

        // exactly at threshold is still safe
        let (state, assets_list, exchange_account) = setup(400_000, 1000_000000, 200_000000);
        let health = compute_health(&state, &assets_list, &exchange_account, SLOT).unwrap();
        assert!(!health.liquidatable);
    }

    #[test]
    fn test_compute_health_without_debt() {
        let (mut state, assets_list, mut exchange_account) =
            setup(2 * 10u64.pow(PRICE_OFFSET.into()), 1000_000000, 0);
        state.debt_shares = 0;
        exchange_account.debt_shares = 0;
        let health = compute_health(&state, &assets_list, &exchange_account, SLOT).unwrap();
        assert_eq!(health.debt_value, 0);
        assert_eq!(health.health_factor, u64::MAX);
        assert!(!health.liquidatable);
    }

    #[test]
    fn test_disabled_collateral_backs_no_debt() {
        let (state, mut assets_list, exchange_account) =
            setup(2 * 10u64.pow(PRICE_OFFSET.into()), 1000_000000, 200_000000);
        assets_list.assets[1].collateral.is_collateral = false;
        let health = compute_health(&state, &assets_list, &exchange_account, SLOT).unwrap();
        assert_eq!(health.collateral_value, 2000_000000);
        assert_eq!(health.max_debt, 0);
    }

    #[test]
    fn test_compute_health_stale_collateral() {
        let (mut state, assets_list, exchange_account) =
            setup(2 * 10u64.pow(PRICE_OFFSET.into()), 1000_000000, 200_000000);
        assert!(compute_health(&state, &assets_list, &exchange_account, SLOT + 1).is_err());
        state.max_delay = 1;
        assert!(compute_health(&state, &assets_list, &exchange_account, SLOT + 1).is_ok());
    }
}
