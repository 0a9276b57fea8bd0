pub mod account;
pub mod context;
pub mod health;
pub mod math;
pub mod oracle;
pub mod processor;
pub mod utils;

use anchor_lang::prelude::*;

pub use account::*;
pub use context::{InstructionContext, TokenCustody};
pub use processor::Exchange;

#[cfg(feature = "mainnet")]
declare_id!("2MDpnAdPjS6EJgRiVEGMFK9mgNgxYv2tvUpPCxJrmrJX");
#[cfg(feature = "testnet")]
declare_id!("6nrnYUkKyyoP1Ju7FRoYVYVnwbHqSMFqGVbntuo3K9yE");
#[cfg(feature = "devnet")]
declare_id!("2MDpnAdPjS6EJgRiVEGMFK9mgNgxYv2tvUpPCxJrmrJX");
#[cfg(not(any(feature = "mainnet", feature = "testnet", feature = "devnet")))]
declare_id!("6hS1rAw2EhhfsgVnAcdLsD1gsf3Nzmf2tmnj9hy9jXmo");

#[error_code]
pub enum ErrorCode {
    #[msg("Missing required signature")]
    Unauthorized,
    #[msg("Exchange is halted")]
    ExchangeHalted,
    #[msg("Not enough collateral")]
    InsufficientCollateral,
    #[msg("Not enough funds")]
    InsufficientFund,
    #[msg("Oracle price is outdated")]
    StaleOracle,
    #[msg("Staking rounds are out of order")]
    InvalidRoundState,
    #[msg("Overflow in arithmetic")]
    MathOverflow,
    #[msg("Parameter out of range")]
    ParameterOutOfRange,
    #[msg("No asset with such address was found")]
    NoAssetFound,
    #[msg("Asset already exists")]
    AssetAlreadyExists,
    #[msg("Assets list is full")]
    AssetsListFull,
    #[msg("Asset is not a collateral")]
    NotCollateral,
    #[msg("Exchange account has no free collateral slot")]
    CollateralEntriesFull,
    #[msg("Asset max_supply crossed")]
    MaxSupply,
    #[msg("Withdraw would leave debt undercollateralized")]
    WithdrawLimit,
    #[msg("No rewards to withdraw")]
    NoRewards,
    #[msg("Invalid oracle account")]
    InvalidOracle,
    #[msg("Account is not liquidatable")]
    NotLiquidatable,
    #[msg("Liquidation buffer has not passed yet")]
    LiquidationDeadline,
    #[msg("Amount must be greater than zero")]
    ZeroAmount,
}
