use chain_sol::{find_program_address, Pubkey, TOKEN_METADATA_PROGRAM_ID};

use crate::error::ClientError;

pub const METADATA_SEED: &[u8] = b"metadata";

/// Token Metadata account for `mint`: PDA of
/// `["metadata", metadata_program, mint]` under the metadata program.
pub fn metadata_address(mint: &Pubkey) -> Result<Pubkey, ClientError> {
    let (address, _) = find_program_address(
        &[METADATA_SEED, TOKEN_METADATA_PROGRAM_ID.as_ref(), mint.as_ref()],
        &TOKEN_METADATA_PROGRAM_ID,
    )?;
    Ok(address)
}
