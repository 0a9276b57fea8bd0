use crate::*;

/// Per-call environment handed to every exchange operation.
#[derive(Clone, Copy, Debug)]
pub struct InstructionContext<'a> {
    pub clock: &'a Clock,
    pub signers: &'a [Pubkey],
}

impl<'a> InstructionContext<'a> {
    pub fn new(clock: &'a Clock, signers: &'a [Pubkey]) -> Self {
        Self { clock, signers }
    }

    pub fn slot(&self) -> u64 {
        self.clock.slot
    }

    pub fn is_signer(&self, key: &Pubkey) -> bool {
        self.signers.iter().any(|signer| signer == key)
    }

    pub fn require_signer(&self, key: &Pubkey) -> Result<()> {
        require!(self.is_signer(key), ErrorCode::Unauthorized);
        Ok(())
    }
}

/// Token movements performed on behalf of the exchange authority.
///
/// Calls are only made after every ledger check has passed, so a failing
/// implementation leaves the ledger untouched.
pub trait TokenCustody {
    fn balance_of(&self, token_account: &Pubkey) -> u64;

    fn transfer(&mut self, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<()>;

    fn mint_to(&mut self, mint: &Pubkey, to: &Pubkey, amount: u64) -> Result<()>;

    fn burn(&mut self, mint: &Pubkey, from: &Pubkey, amount: u64) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_signer() {
        let clock = Clock {
            slot: 42,
            ..Default::default()
        };
        let admin = Pubkey::new_unique();
        let signers = [Pubkey::new_unique(), admin];
        let ctx = InstructionContext::new(&clock, &signers);

        assert_eq!(ctx.slot(), 42);
        assert!(ctx.require_signer(&admin).is_ok());
        assert!(ctx.require_signer(&Pubkey::new_unique()).is_err());

        let nobody = InstructionContext::new(&clock, &[]);
        assert!(nobody.require_signer(&admin).is_err());

        // owner checks share the code, the message names no role
        match ctx.require_signer(&Pubkey::new_unique()) {
            Err(anchor_lang::error::Error::AnchorError(error)) => {
                assert_eq!(error.error_code_number, u32::from(ErrorCode::Unauthorized));
                assert_eq!(error.error_msg, "Missing required signature");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
