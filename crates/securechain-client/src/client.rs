//! The SecureChain client facade.
//!
//! One method per remote operation. Every mutating method builds a single
//! instruction, pays fees from the client's payer, signs with every
//! required identity, submits, and waits for confirmation by polling.

use std::time::Duration;

use chain_sol::{
    build_create_associated_token_account_idempotent, compile_message,
    derive_associated_token_address, sign_message, Instruction, Keypair, Pubkey, Signature,
    TokenAccount,
};
use tracing::{debug, info};

use crate::error::{classify_transaction_error, ClientError};
use crate::program::SecureChainProgram;
use crate::rpc::{Commitment, RpcTransport};
use crate::state::TokenState;

/// Bounded polling used for confirmation and read-after-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmOptions {
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub commitment: Commitment,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_polls: 60,
            commitment: Commitment::Confirmed,
        }
    }
}

/// Client for one deployment of the SecureChain token program.
pub struct SecureChainClient<R: RpcTransport> {
    rpc: R,
    program: SecureChainProgram,
    payer: Keypair,
    confirm: ConfirmOptions,
}

impl<R: RpcTransport> SecureChainClient<R> {
    pub fn new(rpc: R, program_id: Pubkey, payer: Keypair) -> Result<Self, ClientError> {
        Ok(Self {
            rpc,
            program: SecureChainProgram::new(program_id)?,
            payer,
            confirm: ConfirmOptions::default(),
        })
    }

    pub fn with_confirm_options(mut self, confirm: ConfirmOptions) -> Self {
        self.confirm = confirm;
        self
    }

    /// Fee payer for every transaction this client submits.
    pub fn payer(&self) -> &Keypair {
        &self.payer
    }

    pub fn program(&self) -> &SecureChainProgram {
        &self.program
    }

    pub fn program_id(&self) -> Pubkey {
        self.program.program_id()
    }

    pub fn token_state_address(&self) -> Pubkey {
        self.program.token_state_address()
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    pub fn confirm_options(&self) -> &ConfirmOptions {
        &self.confirm
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    async fn send(
        &self,
        operation: &str,
        instruction: Instruction,
        signers: &[&Keypair],
    ) -> Result<Signature, ClientError> {
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let message = compile_message(&[instruction], &self.payer.pubkey(), &blockhash)?;

        let mut all_signers: Vec<&Keypair> = Vec::with_capacity(signers.len() + 1);
        all_signers.push(&self.payer);
        for signer in signers {
            if all_signers.iter().all(|kp| kp.pubkey() != signer.pubkey()) {
                all_signers.push(*signer);
            }
        }

        let tx = sign_message(message, &all_signers)?;
        let signature = match self.rpc.send_transaction(&tx).await {
            Ok(signature) => signature,
            // An identical transaction (same signers, instruction and
            // blockhash) is already in flight; follow that one.
            Err(e) if e.is_already_processed() => {
                let signature = tx.signature().copied().ok_or_else(|| ClientError::TransactionFailed {
                    detail: "unsigned transaction".into(),
                    logs: Vec::new(),
                })?;
                debug!(operation, %signature, "already submitted");
                signature
            }
            Err(e) => return Err(e),
        };
        debug!(operation, %signature, "submitted");

        self.confirm_signature(&signature).await?;
        info!(operation, %signature, "confirmed");
        Ok(signature)
    }

    /// Poll the signature status until it reaches the configured commitment.
    pub async fn confirm_signature(&self, signature: &Signature) -> Result<(), ClientError> {
        for poll in 0..self.confirm.max_polls {
            if let Some(status) = self.rpc.get_signature_status(signature).await? {
                if let Some(err) = &status.err {
                    return Err(classify_transaction_error(err, Vec::new()));
                }
                if status.reached(self.confirm.commitment) {
                    return Ok(());
                }
            }
            if poll + 1 < self.confirm.max_polls {
                tokio::time::sleep(self.confirm.poll_interval).await;
            }
        }

        Err(ClientError::ConfirmationTimeout {
            signature: signature.to_string(),
            polls: self.confirm.max_polls,
        })
    }

    // -----------------------------------------------------------------------
    // Program operations
    // -----------------------------------------------------------------------

    /// Create the token state and the mint. `mint` must be a fresh keypair.
    pub async fn initialize(&self, authority: &Keypair, mint: &Keypair) -> Result<Signature, ClientError> {
        let ix = self.program.initialize_ix(&authority.pubkey(), &mint.pubkey())?;
        self.send("initialize", ix, &[authority, mint]).await
    }

    /// Mint the fixed initial supply into the authority's ATA.
    pub async fn mint_initial_supply(&self, authority: &Keypair, mint: &Pubkey) -> Result<Signature, ClientError> {
        let ix = self.program.mint_initial_supply_ix(&authority.pubkey(), mint)?;
        self.send("mint_initial_supply", ix, &[authority]).await
    }

    pub async fn transfer(
        &self,
        from: &Keypair,
        to_token_account: &Pubkey,
        amount: u64,
        mint: &Pubkey,
    ) -> Result<Signature, ClientError> {
        let ix = self
            .program
            .transfer_ix(&from.pubkey(), to_token_account, amount, mint)?;
        self.send("transfer", ix, &[from]).await
    }

    /// Let `delegate` move up to `amount` out of the owner's ATA.
    pub async fn approve(
        &self,
        owner: &Keypair,
        delegate: &Pubkey,
        amount: u64,
        mint: &Pubkey,
    ) -> Result<Signature, ClientError> {
        let ix = self.program.approve_ix(&owner.pubkey(), delegate, amount, mint)?;
        self.send("approve", ix, &[owner]).await
    }

    pub async fn transfer_from(
        &self,
        delegate: &Keypair,
        from_token_account: &Pubkey,
        to_token_account: &Pubkey,
        amount: u64,
    ) -> Result<Signature, ClientError> {
        let ix = self.program.transfer_from_ix(
            &delegate.pubkey(),
            from_token_account,
            to_token_account,
            amount,
        )?;
        self.send("transfer_from", ix, &[delegate]).await
    }

    pub async fn burn(&self, authority: &Keypair, amount: u64, mint: &Pubkey) -> Result<Signature, ClientError> {
        let ix = self.program.burn_ix(&authority.pubkey(), amount, mint)?;
        self.send("burn", ix, &[authority]).await
    }

    pub async fn revoke(&self, owner: &Keypair, mint: &Pubkey) -> Result<Signature, ClientError> {
        let ix = self.program.revoke_ix(&owner.pubkey(), mint)?;
        self.send("revoke", ix, &[owner]).await
    }

    pub async fn create_metadata(
        &self,
        payer: &Keypair,
        mint: &Pubkey,
        name: &str,
        symbol: &str,
        uri: &str,
    ) -> Result<Signature, ClientError> {
        let ix = self
            .program
            .create_metadata_ix(&payer.pubkey(), mint, name, symbol, uri)?;
        self.send("create_metadata", ix, &[payer]).await
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The token state, or `None` while the program is uninitialized.
    pub async fn token_state(&self) -> Result<Option<TokenState>, ClientError> {
        let address = self.program.token_state_address();
        match self.rpc.get_account_info(&address).await? {
            Some(account) => TokenState::unpack(&address, &account.data).map(Some),
            None => Ok(None),
        }
    }

    /// Poll the token state until it exists and satisfies `predicate`.
    pub async fn wait_for_state<F>(&self, predicate: F) -> Result<TokenState, ClientError>
    where
        F: Fn(&TokenState) -> bool,
    {
        for poll in 0..self.confirm.max_polls {
            if let Some(state) = self.token_state().await? {
                if predicate(&state) {
                    return Ok(state);
                }
            }
            if poll + 1 < self.confirm.max_polls {
                tokio::time::sleep(self.confirm.poll_interval).await;
            }
        }
        Err(ClientError::StateTimeout {
            polls: self.confirm.max_polls,
        })
    }

    /// Decoded SPL token account at `address`.
    pub async fn token_account(&self, address: &Pubkey) -> Result<TokenAccount, ClientError> {
        let account = self
            .rpc
            .get_account_info(address)
            .await?
            .ok_or(ClientError::AccountNotFound(*address))?;
        TokenAccount::unpack(&account.data).map_err(|e| ClientError::InvalidAccountData {
            address: *address,
            reason: e.to_string(),
        })
    }

    /// Base-unit balance of the owner's ATA for `mint`.
    pub async fn balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, ClientError> {
        let ata = derive_associated_token_address(owner, mint)?;
        Ok(self.token_account(&ata).await?.amount)
    }

    pub async fn account_exists(&self, address: &Pubkey) -> Result<bool, ClientError> {
        Ok(self.rpc.get_account_info(address).await?.is_some())
    }

    /// Lamports held by `address`.
    pub async fn sol_balance(&self, address: &Pubkey) -> Result<u64, ClientError> {
        self.rpc.get_balance(address).await
    }

    // -----------------------------------------------------------------------
    // Accounts and funding
    // -----------------------------------------------------------------------

    /// Make sure the owner's ATA for `mint` exists and return its address.
    pub async fn ensure_token_account(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey, ClientError> {
        let ata = derive_associated_token_address(owner, mint)?;
        debug!(%owner, %mint, %ata, "ensuring token account");

        let ix = build_create_associated_token_account_idempotent(&self.payer.pubkey(), owner, mint)?;
        match self.send("create_token_account", ix, &[]).await {
            Ok(_) => Ok(ata),
            Err(e) if e.is_account_in_use() => {
                debug!(%ata, "token account already exists");
                Ok(ata)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<Signature, ClientError> {
        let signature = self.rpc.request_airdrop(address, lamports).await?;
        self.confirm_signature(&signature).await?;
        info!(%address, lamports, %signature, "airdrop confirmed");
        Ok(signature)
    }
}
