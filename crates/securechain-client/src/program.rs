//! Call interface of the deployed SecureChain token program.
//!
//! The program is an Anchor program: instruction data is the 8-byte
//! discriminator `sha256("global:<name>")[..8]` followed by the Borsh-encoded
//! arguments, and account lists are fixed per instruction.

use borsh::{BorshDeserialize, BorshSerialize};
use chain_sol::{
    derive_associated_token_address, find_program_address, AccountMeta, Instruction, Pubkey,
    ASSOCIATED_TOKEN_PROGRAM_ID, RENT_SYSVAR_ID, SYSTEM_PROGRAM_ID, TOKEN_METADATA_PROGRAM_ID,
    TOKEN_PROGRAM_ID,
};
use sha2::{Digest, Sha256};

use crate::error::ClientError;
use crate::metadata::metadata_address;

/// Default deployment: `3MByoH5v5Mbu3VjL82JMiQQheuFqSEgZ9Ke2ZWvuiiM9`
pub const DEFAULT_PROGRAM_ID: Pubkey = Pubkey::new([
    0x22, 0xe3, 0x67, 0x82, 0xbe, 0xa5, 0xc4, 0xd0, 0x99, 0xb9, 0x30, 0xdb, 0xba, 0x71, 0xe0,
    0x76, 0x34, 0xc0, 0x98, 0x79, 0xcb, 0x45, 0x73, 0xe7, 0xb6, 0x20, 0x0c, 0x50, 0x37, 0x61,
    0x41, 0x5c,
]);

/// Seed of the singleton token state PDA.
pub const TOKEN_DATA_SEED: &[u8] = b"token_data";

/// Supply minted by `mint_initial_supply`: 500 million tokens at 9 decimals.
pub const INITIAL_SUPPLY: u64 = 500_000_000_000_000_000;

/// Values the program writes at initialization.
pub const TOKEN_NAME: &str = "SecureChain AI";
pub const TOKEN_SYMBOL: &str = "SCAI";
pub const TOKEN_DECIMALS: u8 = 9;

/// Anchor instruction discriminator for `name` (snake_case).
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("global:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

#[derive(BorshSerialize, BorshDeserialize)]
struct AmountArgs {
    amount: u64,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct CreateMetadataArgs {
    name: String,
    symbol: String,
    uri: String,
}

/// A program instruction with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramInstruction {
    Initialize,
    MintInitialSupply,
    Transfer { amount: u64 },
    Approve { amount: u64 },
    TransferFrom { amount: u64 },
    Burn { amount: u64 },
    Revoke,
    CreateMetadata { name: String, symbol: String, uri: String },
}

impl ProgramInstruction {
    const NAMES: [&'static str; 8] = [
        "initialize",
        "mint_initial_supply",
        "transfer",
        "approve",
        "transfer_from",
        "burn",
        "revoke",
        "create_metadata",
    ];

    /// The program's method name.
    pub fn name(&self) -> &'static str {
        match self {
            ProgramInstruction::Initialize => "initialize",
            ProgramInstruction::MintInitialSupply => "mint_initial_supply",
            ProgramInstruction::Transfer { .. } => "transfer",
            ProgramInstruction::Approve { .. } => "approve",
            ProgramInstruction::TransferFrom { .. } => "transfer_from",
            ProgramInstruction::Burn { .. } => "burn",
            ProgramInstruction::Revoke => "revoke",
            ProgramInstruction::CreateMetadata { .. } => "create_metadata",
        }
    }

    /// Discriminator followed by Borsh arguments.
    pub fn data(&self) -> Result<Vec<u8>, ClientError> {
        let mut data = instruction_discriminator(self.name()).to_vec();

        let written = match self {
            ProgramInstruction::Transfer { amount }
            | ProgramInstruction::Approve { amount }
            | ProgramInstruction::TransferFrom { amount }
            | ProgramInstruction::Burn { amount } => {
                AmountArgs { amount: *amount }.serialize(&mut data)
            }
            ProgramInstruction::CreateMetadata { name, symbol, uri } => CreateMetadataArgs {
                name: name.clone(),
                symbol: symbol.clone(),
                uri: uri.clone(),
            }
            .serialize(&mut data),
            ProgramInstruction::Initialize
            | ProgramInstruction::MintInitialSupply
            | ProgramInstruction::Revoke => Ok(()),
        };
        written.map_err(|e| ClientError::Encoding(e.to_string()))?;

        Ok(data)
    }

    /// Parse instruction data produced by [`ProgramInstruction::data`].
    pub fn decode(data: &[u8]) -> Result<Self, ClientError> {
        if data.len() < 8 {
            return Err(ClientError::Encoding(format!(
                "instruction data too short: {} bytes",
                data.len()
            )));
        }
        let (tag, mut args) = data.split_at(8);

        let name = Self::NAMES
            .iter()
            .find(|name| instruction_discriminator(name) == tag)
            .ok_or_else(|| ClientError::Encoding(format!("unknown discriminator {}", hex::encode(tag))))?;

        let decode_err = |e: std::io::Error| ClientError::Encoding(format!("{name} args: {e}"));
        let amount = |args: &mut &[u8]| -> Result<u64, ClientError> {
            Ok(AmountArgs::deserialize(args).map_err(decode_err)?.amount)
        };

        let ix = match *name {
            "initialize" => ProgramInstruction::Initialize,
            "mint_initial_supply" => ProgramInstruction::MintInitialSupply,
            "transfer" => ProgramInstruction::Transfer {
                amount: amount(&mut args)?,
            },
            "approve" => ProgramInstruction::Approve {
                amount: amount(&mut args)?,
            },
            "transfer_from" => ProgramInstruction::TransferFrom {
                amount: amount(&mut args)?,
            },
            "burn" => ProgramInstruction::Burn {
                amount: amount(&mut args)?,
            },
            "revoke" => ProgramInstruction::Revoke,
            _ => {
                let parsed = CreateMetadataArgs::deserialize(&mut args).map_err(decode_err)?;
                ProgramInstruction::CreateMetadata {
                    name: parsed.name,
                    symbol: parsed.symbol,
                    uri: parsed.uri,
                }
            }
        };

        if !args.is_empty() {
            return Err(ClientError::Encoding(format!(
                "{name}: {} trailing bytes",
                args.len()
            )));
        }

        Ok(ix)
    }
}

/// Instruction builders for one deployment of the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecureChainProgram {
    program_id: Pubkey,
    token_state: Pubkey,
    token_state_bump: u8,
}

impl SecureChainProgram {
    pub fn new(program_id: Pubkey) -> Result<Self, ClientError> {
        let (token_state, token_state_bump) =
            find_program_address(&[TOKEN_DATA_SEED], &program_id)?;
        Ok(Self {
            program_id,
            token_state,
            token_state_bump,
        })
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    /// Address of the singleton token state account.
    pub fn token_state_address(&self) -> Pubkey {
        self.token_state
    }

    pub fn token_state_bump(&self) -> u8 {
        self.token_state_bump
    }

    fn instruction(
        &self,
        ix: ProgramInstruction,
        accounts: Vec<AccountMeta>,
    ) -> Result<Instruction, ClientError> {
        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data: ix.data()?,
        })
    }

    /// Accounts: token_data(w), mint(w,s), authority(w,s), token_program,
    /// system_program, rent.
    pub fn initialize_ix(&self, authority: &Pubkey, mint: &Pubkey) -> Result<Instruction, ClientError> {
        self.instruction(
            ProgramInstruction::Initialize,
            vec![
                AccountMeta::new(self.token_state, false),
                AccountMeta::new(*mint, true),
                AccountMeta::new(*authority, true),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
                AccountMeta::new_readonly(RENT_SYSVAR_ID, false),
            ],
        )
    }

    /// Accounts: token_data(w), mint(w), authority_token_account(w),
    /// authority(w,s), token_program, associated_token_program,
    /// system_program.
    pub fn mint_initial_supply_ix(
        &self,
        authority: &Pubkey,
        mint: &Pubkey,
    ) -> Result<Instruction, ClientError> {
        let authority_ata = derive_associated_token_address(authority, mint)?;
        self.instruction(
            ProgramInstruction::MintInitialSupply,
            vec![
                AccountMeta::new(self.token_state, false),
                AccountMeta::new(*mint, false),
                AccountMeta::new(authority_ata, false),
                AccountMeta::new(*authority, true),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
        )
    }

    /// Accounts: from_token_account(w), to_token_account(w),
    /// from_authority(s), token_program.
    pub fn transfer_ix(
        &self,
        from: &Pubkey,
        to_token_account: &Pubkey,
        amount: u64,
        mint: &Pubkey,
    ) -> Result<Instruction, ClientError> {
        let from_ata = derive_associated_token_address(from, mint)?;
        self.instruction(
            ProgramInstruction::Transfer { amount },
            vec![
                AccountMeta::new(from_ata, false),
                AccountMeta::new(*to_token_account, false),
                AccountMeta::new_readonly(*from, true),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            ],
        )
    }

    /// Accounts: token_account(w), delegate, owner(s), token_program.
    pub fn approve_ix(
        &self,
        owner: &Pubkey,
        delegate: &Pubkey,
        amount: u64,
        mint: &Pubkey,
    ) -> Result<Instruction, ClientError> {
        let owner_ata = derive_associated_token_address(owner, mint)?;
        self.instruction(
            ProgramInstruction::Approve { amount },
            vec![
                AccountMeta::new(owner_ata, false),
                AccountMeta::new_readonly(*delegate, false),
                AccountMeta::new_readonly(*owner, true),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            ],
        )
    }

    /// Accounts: from_token_account(w), to_token_account(w), delegate(s),
    /// token_program.
    pub fn transfer_from_ix(
        &self,
        delegate: &Pubkey,
        from_token_account: &Pubkey,
        to_token_account: &Pubkey,
        amount: u64,
    ) -> Result<Instruction, ClientError> {
        self.instruction(
            ProgramInstruction::TransferFrom { amount },
            vec![
                AccountMeta::new(*from_token_account, false),
                AccountMeta::new(*to_token_account, false),
                AccountMeta::new_readonly(*delegate, true),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            ],
        )
    }

    /// Accounts: token_data(w), mint(w), token_account(w), authority(s),
    /// token_program.
    pub fn burn_ix(&self, authority: &Pubkey, amount: u64, mint: &Pubkey) -> Result<Instruction, ClientError> {
        let authority_ata = derive_associated_token_address(authority, mint)?;
        self.instruction(
            ProgramInstruction::Burn { amount },
            vec![
                AccountMeta::new(self.token_state, false),
                AccountMeta::new(*mint, false),
                AccountMeta::new(authority_ata, false),
                AccountMeta::new_readonly(*authority, true),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            ],
        )
    }

    /// Accounts: token_account(w), owner(s), token_program.
    pub fn revoke_ix(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Instruction, ClientError> {
        let owner_ata = derive_associated_token_address(owner, mint)?;
        self.instruction(
            ProgramInstruction::Revoke,
            vec![
                AccountMeta::new(owner_ata, false),
                AccountMeta::new_readonly(*owner, true),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            ],
        )
    }

    /// Accounts: token_data(w), mint(w), metadata(w), payer(w,s),
    /// system_program, rent, token_metadata_program.
    pub fn create_metadata_ix(
        &self,
        payer: &Pubkey,
        mint: &Pubkey,
        name: &str,
        symbol: &str,
        uri: &str,
    ) -> Result<Instruction, ClientError> {
        let metadata = metadata_address(mint)?;
        self.instruction(
            ProgramInstruction::CreateMetadata {
                name: name.to_owned(),
                symbol: symbol.to_owned(),
                uri: uri.to_owned(),
            },
            vec![
                AccountMeta::new(self.token_state, false),
                AccountMeta::new(*mint, false),
                AccountMeta::new(metadata, false),
                AccountMeta::new(*payer, true),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
                AccountMeta::new_readonly(RENT_SYSVAR_ID, false),
                AccountMeta::new_readonly(TOKEN_METADATA_PROGRAM_ID, false),
            ],
        )
    }
}
