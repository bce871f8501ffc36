//! Client for the SecureChain AI token program on Solana.
//!
//! [`SecureChainClient`] drives the deployed program over an
//! [`RpcTransport`]; [`bootstrap`] sequences the first-run setup on top of
//! it and keeps the local [`TokenRecord`] up to date.

pub mod amount;
pub mod bootstrap;
pub mod client;
pub mod error;
pub mod metadata;
pub mod program;
pub mod record;
pub mod rpc;
pub mod state;

pub use amount::{format_base_units, from_base_units, to_base_units, DEFAULT_DECIMALS};
pub use bootstrap::{run_bootstrap, run_metadata, BootstrapConfig, BootstrapReport};
pub use client::{ConfirmOptions, SecureChainClient};
pub use error::{ClientError, ProgramError};
pub use metadata::metadata_address;
pub use program::{
    ProgramInstruction, SecureChainProgram, DEFAULT_PROGRAM_ID, INITIAL_SUPPLY, TOKEN_DECIMALS,
    TOKEN_NAME, TOKEN_SYMBOL,
};
pub use record::{CreatedAt, TokenRecord};
pub use rpc::{AccountInfo, Commitment, HttpRpc, RpcTransport, SignatureStatus};
pub use state::TokenState;
