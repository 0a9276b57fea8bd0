use crate::*;

pub const MAX_ASSETS: usize = 255;
pub const MAX_COLLATERAL_ENTRIES: usize = 32;
pub const ROUNDS_IN_FLIGHT: u64 = 3;

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Default, Debug)]
pub struct StakingRound {
    // 32
    pub start: u64,       // 8 Slot when round starts
    pub all_points: u128, // 16 All points used to calculate user share in staking rewards
    pub amount: u64,      // 8 Amount of reward tokens distributed in this round
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Default, Debug)]
pub struct Staking {
    // 152
    pub fund_account: Pubkey,  // 32 Source account of reward tokens
    pub round_length: u64,     // 8 Length of round in slots
    pub amount_per_round: u64, // 8 Amount of reward tokens distributed per round
    pub rounds: [StakingRound; ROUNDS_IN_FLIGHT as usize], // 96
    pub round_number: u64,     // 8 Rotations since init, finished round lives at round_number % 3
}

impl Staking {
    fn ring_index(&self, offset: u64) -> usize {
        ((self.round_number % ROUNDS_IN_FLIGHT + offset) % ROUNDS_IN_FLIGHT) as usize
    }
    pub fn finished_round(&self) -> &StakingRound {
        &self.rounds[self.ring_index(0)]
    }
    pub fn current_round(&self) -> &StakingRound {
        &self.rounds[self.ring_index(1)]
    }
    pub fn next_round(&self) -> &StakingRound {
        &self.rounds[self.ring_index(2)]
    }
    pub fn finished_round_mut(&mut self) -> &mut StakingRound {
        let index = self.ring_index(0);
        &mut self.rounds[index]
    }
    pub fn current_round_mut(&mut self) -> &mut StakingRound {
        let index = self.ring_index(1);
        &mut self.rounds[index]
    }
    pub fn next_round_mut(&mut self) -> &mut StakingRound {
        let index = self.ring_index(2);
        &mut self.rounds[index]
    }
    /// Shifts the window by one round. The slot of the finished round is reused for the new
    /// next round, which inherits the points of the round that just became current.
    pub fn rotate(&mut self) -> Result<()> {
        let current = *self.next_round();
        let start = current
            .start
            .checked_add(self.round_length)
            .ok_or(ErrorCode::MathOverflow)?;
        self.round_number = self
            .round_number
            .checked_add(1)
            .ok_or(ErrorCode::MathOverflow)?;
        *self.next_round_mut() = StakingRound {
            start,
            all_points: current.all_points,
            amount: self.amount_per_round,
        };
        Ok(())
    }
    pub fn is_aligned(&self) -> bool {
        let finished = self.finished_round().start;
        let current = self.current_round().start;
        let next = self.next_round().start;
        finished.checked_add(self.round_length) == Some(current)
            && current.checked_add(self.round_length) == Some(next)
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Default, Debug)]
pub struct UserStaking {
    // 64
    pub amount_to_claim: u64,         // 8 Amount of reward tokens accumulated by account
    pub finished_round_points: u128,  // 16 Points are based on debt value in specific round
    pub current_round_points: u128,   // 16
    pub next_round_points: u128,      // 16
    pub last_round: u64,              // 8 Staking round_number at last synchronization
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Default, Debug)]
pub struct Collateral {
    // 107
    pub is_collateral: bool,        // 1
    pub collateral_address: Pubkey, // 32
    pub reserve_address: Pubkey,    // 32
    pub liquidation_fund: Pubkey,   // 32
    pub reserve_balance: u64,       // 8
    pub collateral_ratio: u8,       // 1 In % 0-100%
    pub decimals: u8,               // 1
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Default, Debug)]
pub struct Asset {
    // 204
    pub feed_address: Pubkey,   // 32 Price oracle account address
    pub asset_address: Pubkey,  // 32 Token mint
    pub price: u64,             // 8 Scaled by PRICE_OFFSET
    pub last_update: u64,       // 8 Slot of the last price update
    pub supply: u64,            // 8
    pub max_supply: u64,        // 8
    pub decimals: u8,           // 1
    pub collateral: Collateral, // 107
}

#[account]
#[derive(PartialEq, Debug)]
pub struct AssetsList {
    pub head: u8,                     // 1
    pub assets: [Asset; MAX_ASSETS], // 52020
}
impl Default for AssetsList {
    #[inline]
    fn default() -> AssetsList {
        AssetsList {
            head: 0,
            assets: [Asset {
                ..Default::default()
            }; MAX_ASSETS],
        }
    }
}
impl AssetsList {
    pub const LEN: usize = 8 + 1 + MAX_ASSETS * 204;

    pub fn append_asset(&mut self, new_asset: Asset) -> Result<()> {
        require!((self.head as usize) < MAX_ASSETS, ErrorCode::AssetsListFull);
        self.assets[self.head as usize] = new_asset;
        self.head += 1;
        Ok(())
    }
    pub fn active(&self) -> &[Asset] {
        &self.assets[..self.head as usize]
    }
    pub fn position(&self, asset_address: &Pubkey) -> Option<usize> {
        self.active()
            .iter()
            .position(|asset| asset.asset_address == *asset_address)
    }
    pub fn find_mut(&mut self, asset_address: &Pubkey) -> Result<&mut Asset> {
        let index = self
            .position(asset_address)
            .ok_or(ErrorCode::NoAssetFound)?;
        Ok(&mut self.assets[index])
    }
    /// Index of the asset backing deposits of `collateral_address`.
    pub fn collateral_position(&self, collateral_address: &Pubkey) -> Result<usize> {
        let index = self
            .active()
            .iter()
            .position(|asset| asset.collateral.collateral_address == *collateral_address)
            .ok_or(ErrorCode::NoAssetFound)?;
        require!(
            self.assets[index].collateral.is_collateral,
            ErrorCode::NotCollateral
        );
        Ok(index)
    }
}

#[account]
#[derive(PartialEq, Debug, Default)]
pub struct State {
    // 299
    //8 Account signature
    pub admin: Pubkey,                // 32
    pub halted: bool,                 // 1
    pub nonce: u8,                    // 1
    pub exchange_authority: Pubkey,   // 32
    pub assets_list: Pubkey,          // 32
    pub debt_shares: u128,            // 16
    pub collateral_shares: u128,      // 16 Sum of deposited collateral across all reserves
    pub fee: u16,                     // 2 In basis points
    pub max_delay: u32,               // 4 In slots delay between last oracle update
    pub health_factor: u8,            // 1 In % 1-100% modifier for staking points
    pub liquidation_threshold: u16,   // 2 In % debt multiplier above which account is liquidatable
    pub collateralization_level: u16, // 2 In % required collateral to debt ratio when minting
    pub penalty_to_liquidator: u8,    // 1 In % range 0-25%
    pub penalty_to_exchange: u8,      // 1 In % range 0-25%
    pub liquidation_buffer: u32,      // 4 Time given user to fix collateralization ratio (in slots)
    pub staking: Staking,             // 152
}
impl State {
    pub const LEN: usize = 8 // discriminator
        + 32 * 3 // admin, exchange_authority, assets_list
        + 1 + 1 // halted, nonce
        + 16 * 2 // shares
        + 2 + 4 + 1 + 2 + 2 + 1 + 1 + 4 // parameters
        + 32 + 8 + 8 + 32 * 3 + 8; // staking

    pub fn liquidation_penalty(&self) -> u8 {
        self.penalty_to_liquidator
            .saturating_add(self.penalty_to_exchange)
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Default, Debug)]
pub struct CollateralEntry {
    // 41
    pub amount: u64,                // 8
    pub collateral_address: Pubkey, // 32
    pub index: u8,                  // 1 Position of the asset in assets list
}

#[account]
#[derive(PartialEq, Debug, Default)]
pub struct ExchangeAccount {
    // 1435
    pub owner: Pubkey,                  // 32 Identity controlling account
    pub version: u8,                    // 1 Version of account struct
    pub debt_shares: u128,              // 16 Shares representing part of entire debt pool
    pub liquidation_deadline: u64,      // 8 Slot number after which account can be liquidated
    pub user_staking_data: UserStaking, // 64 Staking information
    pub head: u8,                       // 1
    pub bump: u8,                       // 1
    pub collaterals: [CollateralEntry; MAX_COLLATERAL_ENTRIES], // 1312
}
impl ExchangeAccount {
    pub const LEN: usize = 8 + 32 + 1 + 16 + 8 + 64 + 1 + 1 + MAX_COLLATERAL_ENTRIES * 41;

    pub fn new(owner: Pubkey, bump: u8, round_number: u64) -> Self {
        ExchangeAccount {
            owner,
            version: 0,
            debt_shares: 0,
            liquidation_deadline: u64::MAX,
            user_staking_data: UserStaking {
                last_round: round_number,
                ..Default::default()
            },
            head: 0,
            bump,
            collaterals: [CollateralEntry {
                ..Default::default()
            }; MAX_COLLATERAL_ENTRIES],
        }
    }
    pub fn entries(&self) -> &[CollateralEntry] {
        &self.collaterals[..self.head as usize]
    }
    pub fn append(&mut self, entry: CollateralEntry) -> Result<()> {
        require!(
            (self.head as usize) < MAX_COLLATERAL_ENTRIES,
            ErrorCode::CollateralEntriesFull
        );
        self.collaterals[(self.head) as usize] = entry;
        self.head += 1;
        Ok(())
    }
    pub fn remove(&mut self, index: usize) {
        self.collaterals[index] = self.collaterals[(self.head - 1) as usize];
        self.collaterals[(self.head - 1) as usize] = CollateralEntry {
            ..Default::default()
        };
        self.head -= 1;
    }
    pub fn entry_position(&self, collateral_address: &Pubkey) -> Option<usize> {
        self.entries()
            .iter()
            .position(|entry| entry.collateral_address == *collateral_address)
    }
}
