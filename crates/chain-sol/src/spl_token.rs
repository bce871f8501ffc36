//! SPL Token account layout and associated token accounts (ATA).
//!
//! Only the pieces a client of a token program needs: deriving a holder's
//! canonical token account, creating it idempotently, and decoding the
//! 165-byte account state returned by RPC.

use crate::address::{Pubkey, ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID};
use crate::error::SolError;
use crate::pda::find_program_address;
use crate::transaction::{AccountMeta, Instruction};

/// Size of an SPL token account.
pub const TOKEN_ACCOUNT_LEN: usize = 165;

/// Associated Token Account program `CreateIdempotent` discriminator.
const ATA_CREATE_IDEMPOTENT: u8 = 1;

/// Derive the associated token account address for a wallet + mint pair.
///
/// Seeds: `[wallet, token_program_id, mint]` under the ATA program.
pub fn derive_associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Result<Pubkey, SolError> {
    find_program_address(
        &[wallet.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _bump)| address)
}

/// Build an ATA `CreateIdempotent` instruction.
///
/// The ATA program succeeds without changes when the account already exists
/// with the expected owner and mint.
pub fn build_create_associated_token_account_idempotent(
    payer: &Pubkey,
    wallet: &Pubkey,
    mint: &Pubkey,
) -> Result<Instruction, SolError> {
    let ata = derive_associated_token_address(wallet, mint)?;

    Ok(Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(ata, false),
            AccountMeta::new_readonly(*wallet, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ],
        data: vec![ATA_CREATE_IDEMPOTENT],
    })
}

// ---------------------------------------------------------------------------
// Token account layout
// ---------------------------------------------------------------------------

/// Token account state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AccountState {
    Uninitialized = 0,
    Initialized = 1,
    Frozen = 2,
}

/// Decoded SPL token account.
///
/// ```text
///   0..32    mint
///  32..64    owner
///  64..72    amount                u64 LE
///  72..108   delegate              COption<Pubkey>
/// 108        state                 u8
/// 109..121   is_native             COption<u64>
/// 121..129   delegated_amount      u64 LE
/// 129..165   close_authority       COption<Pubkey>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccount {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub delegate: Option<Pubkey>,
    pub state: AccountState,
    pub is_native: Option<u64>,
    pub delegated_amount: u64,
    pub close_authority: Option<Pubkey>,
}

impl TokenAccount {
    /// A fresh, initialized account with zero balance.
    pub fn new(mint: Pubkey, owner: Pubkey) -> Self {
        Self {
            mint,
            owner,
            amount: 0,
            delegate: None,
            state: AccountState::Initialized,
            is_native: None,
            delegated_amount: 0,
            close_authority: None,
        }
    }

    pub fn unpack(data: &[u8]) -> Result<Self, SolError> {
        if data.len() != TOKEN_ACCOUNT_LEN {
            return Err(SolError::SerializationError(format!(
                "token account must be {TOKEN_ACCOUNT_LEN} bytes, got {}",
                data.len()
            )));
        }

        let state = match data[108] {
            0 => AccountState::Uninitialized,
            1 => AccountState::Initialized,
            2 => AccountState::Frozen,
            other => {
                return Err(SolError::SerializationError(format!(
                    "invalid token account state {other}"
                )))
            }
        };

        Ok(Self {
            mint: Pubkey::new(array(&data[0..32])),
            owner: Pubkey::new(array(&data[32..64])),
            amount: u64::from_le_bytes(array(&data[64..72])),
            delegate: unpack_coption(&data[72..108])?.map(Pubkey::new),
            state,
            is_native: unpack_coption::<8>(&data[109..121])?.map(u64::from_le_bytes),
            delegated_amount: u64::from_le_bytes(array(&data[121..129])),
            close_authority: unpack_coption(&data[129..165])?.map(Pubkey::new),
        })
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TOKEN_ACCOUNT_LEN);
        out.extend_from_slice(self.mint.as_bytes());
        out.extend_from_slice(self.owner.as_bytes());
        out.extend_from_slice(&self.amount.to_le_bytes());
        pack_coption(&mut out, self.delegate.map(|k| k.to_bytes()));
        out.push(self.state as u8);
        pack_coption(&mut out, self.is_native.map(u64::to_le_bytes));
        out.extend_from_slice(&self.delegated_amount.to_le_bytes());
        pack_coption(&mut out, self.close_authority.map(|k| k.to_bytes()));
        out
    }
}

fn array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}

/// `COption<T>` is a u32 LE tag (0 = None, 1 = Some) followed by the value,
/// which is always present on the wire.
fn unpack_coption<const N: usize>(slice: &[u8]) -> Result<Option<[u8; N]>, SolError> {
    match u32::from_le_bytes(array(&slice[..4])) {
        0 => Ok(None),
        1 => Ok(Some(array(&slice[4..4 + N]))),
        tag => Err(SolError::SerializationError(format!(
            "invalid COption tag {tag}"
        ))),
    }
}

fn pack_coption<const N: usize>(out: &mut Vec<u8>, value: Option<[u8; N]>) {
    match value {
        Some(bytes) => {
            out.extend_from_slice(&1u32.to_le_bytes());
            out.extend_from_slice(&bytes);
        }
        None => {
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&[0u8; N]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ata_is_off_curve_and_deterministic() {
        let wallet = Pubkey::new([0xAAu8; 32]);
        let mint = Pubkey::new([0xBBu8; 32]);

        let a = derive_associated_token_address(&wallet, &mint).unwrap();
        let b = derive_associated_token_address(&wallet, &mint).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_on_curve());
    }

    #[test]
    fn ata_differs_per_wallet_and_mint() {
        let mint = Pubkey::new([0xFFu8; 32]);
        let a = derive_associated_token_address(&Pubkey::new([1u8; 32]), &mint).unwrap();
        let b = derive_associated_token_address(&Pubkey::new([2u8; 32]), &mint).unwrap();
        let c = derive_associated_token_address(&Pubkey::new([1u8; 32]), &Pubkey::new([3u8; 32]))
            .unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn create_idempotent_layout() {
        let payer = Pubkey::new([1u8; 32]);
        let wallet = Pubkey::new([2u8; 32]);
        let mint = Pubkey::new([3u8; 32]);

        let ix = build_create_associated_token_account_idempotent(&payer, &wallet, &mint).unwrap();

        assert_eq!(ix.program_id, ASSOCIATED_TOKEN_PROGRAM_ID);
        assert_eq!(ix.data, vec![1]);
        assert_eq!(ix.accounts.len(), 6);
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert_eq!(
            ix.accounts[1].pubkey,
            derive_associated_token_address(&wallet, &mint).unwrap()
        );
        assert!(ix.accounts[1].is_writable);
        assert_eq!(ix.accounts[2].pubkey, wallet);
        assert_eq!(ix.accounts[3].pubkey, mint);
        assert_eq!(ix.accounts[5].pubkey, TOKEN_PROGRAM_ID);
    }

    #[test]
    fn token_account_layout_offsets() {
        let mut account = TokenAccount::new(Pubkey::new([1u8; 32]), Pubkey::new([2u8; 32]));
        account.amount = 42;
        account.delegate = Some(Pubkey::new([3u8; 32]));
        account.delegated_amount = 7;

        let data = account.pack();
        assert_eq!(data.len(), TOKEN_ACCOUNT_LEN);
        assert_eq!(&data[64..72], &42u64.to_le_bytes());
        assert_eq!(&data[72..76], &1u32.to_le_bytes());
        assert_eq!(data[108], 1);
        assert_eq!(&data[121..129], &7u64.to_le_bytes());

        assert_eq!(TokenAccount::unpack(&data).unwrap(), account);
    }

    #[test]
    fn token_account_wrong_length() {
        assert!(TokenAccount::unpack(&[0u8; 82]).is_err());
    }

    #[test]
    fn token_account_bad_coption_tag() {
        let mut data = TokenAccount::new(Pubkey::default(), Pubkey::default()).pack();
        data[72] = 9;
        assert!(TokenAccount::unpack(&data).is_err());
    }
}
