use std::mem::size_of;

use bytemuck::{pod_read_unaligned, Pod, Zeroable};

use crate::*;

pub const PYTH_MAGIC: u32 = 0xa1b2c3d4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OraclePrice {
    pub price: i64,
    pub expo: i32,
    pub publish_slot: u64,
}

/// Source of external asset prices.
pub trait PriceFeed {
    fn get_price(&self, feed: &Pubkey) -> Result<OraclePrice>;
}

#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
pub struct PriceInfo {
    pub price: i64,
    pub conf: u64,
    pub status: u32,
    pub corp_act: u32,
    pub pub_slot: u64,
}

/// Leading part of a Pyth price account, component prices are not read.
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
pub struct PriceAccount {
    pub magic: u32, // pyth magic number
    pub ver: u32,   // program version
    pub atype: u32, // account type
    pub size: u32,  // price account size
    pub ptype: u32, // price or calculation type
    pub expo: i32,  // price exponent
    pub num: u32,   // number of component prices
    pub unused: u32,
    pub curr_slot: u64,  // currently accumulating price slot
    pub valid_slot: u64, // valid slot-time of agg. price
    pub prod: [u8; 32],
    pub next: [u8; 32],
    pub agg_pub: [u8; 32],
    pub agg: PriceInfo,
}

impl PriceAccount {
    pub fn parse(data: &[u8]) -> Result<PriceAccount> {
        require!(
            data.len() >= size_of::<PriceAccount>(),
            ErrorCode::InvalidOracle
        );
        let account: PriceAccount = pod_read_unaligned(&data[..size_of::<PriceAccount>()]);
        require!(account.magic == PYTH_MAGIC, ErrorCode::InvalidOracle);
        Ok(account)
    }

    pub fn oracle_price(&self) -> OraclePrice {
        OraclePrice {
            price: self.agg.price,
            expo: self.expo,
            publish_slot: self.agg.pub_slot,
        }
    }
}

impl<'info> PriceFeed for [AccountInfo<'info>] {
    fn get_price(&self, feed: &Pubkey) -> Result<OraclePrice> {
        let account = self
            .iter()
            .find(|account| account.key == feed)
            .ok_or(ErrorCode::InvalidOracle)?;
        let data = account.try_borrow_data()?;
        Ok(PriceAccount::parse(&data)?.oracle_price())
    }
}
