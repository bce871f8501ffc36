//! The program's singleton token state account.

use borsh::{BorshDeserialize, BorshSerialize};
use chain_sol::Pubkey;
use sha2::{Digest, Sha256};

use crate::error::ClientError;

/// `sha256("account:TokenData")[..8]`
pub const ACCOUNT_DISCRIMINATOR: [u8; 8] = [0x0a, 0x88, 0xc7, 0x0d, 0x3b, 0x67, 0x81, 0x46];

/// Decoded token state. Written only by the program.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TokenState {
    pub authority: Pubkey,
    pub mint: Pubkey,
    pub total_supply: u64,
    pub decimals: u8,
    pub name: String,
    pub symbol: String,
    pub bump: u8,
}

impl TokenState {
    /// Decode account data. The account is allocated with room for the
    /// longest name and symbol, so trailing bytes are expected.
    pub fn unpack(address: &Pubkey, data: &[u8]) -> Result<Self, ClientError> {
        let invalid = |reason: String| ClientError::InvalidAccountData {
            address: *address,
            reason,
        };

        if data.len() < 8 {
            return Err(invalid(format!("{} bytes is too short", data.len())));
        }
        let (tag, mut body) = data.split_at(8);
        if tag != ACCOUNT_DISCRIMINATOR {
            return Err(invalid(format!("unexpected discriminator {}", hex::encode(tag))));
        }

        TokenState::deserialize(&mut body).map_err(|e| invalid(e.to_string()))
    }

    /// Encode with the account discriminator and no padding.
    pub fn pack(&self) -> Vec<u8> {
        let mut out = ACCOUNT_DISCRIMINATOR.to_vec();
        // Vec<u8> writes are infallible.
        let _ = self.serialize(&mut out);
        out
    }

    pub fn is_minted(&self) -> bool {
        self.total_supply > 0
    }
}

/// Anchor account discriminator for the account type `name`.
pub fn account_discriminator(name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("account:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}
