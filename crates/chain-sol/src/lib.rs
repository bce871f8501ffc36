//! Solana primitives for the SecureChain client.
//!
//! Addresses, program-derived addresses, keypair files, the legacy
//! transaction wire format and the SPL token account layout, implemented
//! directly on `ed25519-dalek`, `curve25519-dalek`, `sha2` and `bs58`
//! instead of `solana-sdk`.

pub mod address;
pub mod error;
pub mod keypair;
pub mod pda;
pub mod spl_token;
pub mod transaction;

pub use address::{
    Pubkey, ASSOCIATED_TOKEN_PROGRAM_ID, RENT_SYSVAR_ID, SYSTEM_PROGRAM_ID,
    TOKEN_METADATA_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
pub use error::SolError;
pub use keypair::{Keypair, Signature};
pub use pda::{create_program_address, find_program_address};
pub use spl_token::{
    build_create_associated_token_account_idempotent, derive_associated_token_address,
    TokenAccount,
};
pub use transaction::{
    compile_message, sign_message, AccountMeta, CompiledInstruction, Instruction, Message,
    Transaction,
};
