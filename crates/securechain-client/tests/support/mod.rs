//! In-memory ledger for the integration tests.
//!
//! Implements `RpcTransport` by decoding the submitted wire transaction,
//! verifying every signature, and executing a model of the SecureChain
//! program, the SPL Token program and the Associated Token Account program.
//! A transaction either applies completely or not at all, and rejections
//! come back in the same shape as an RPC preflight failure.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chain_sol::{
    derive_associated_token_address, find_program_address, Keypair, Pubkey, Signature,
    TokenAccount, Transaction, ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID,
    TOKEN_METADATA_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
use securechain_client::error::classify_transaction_error;
use securechain_client::metadata::metadata_address;
use securechain_client::program::TOKEN_DATA_SEED;
use securechain_client::{
    AccountInfo, ClientError, Commitment, ConfirmOptions, ProgramError, ProgramInstruction, RpcTransport,
    SecureChainClient, SignatureStatus, TokenState, DEFAULT_PROGRAM_ID, INITIAL_SUPPLY,
    TOKEN_DECIMALS, TOKEN_NAME, TOKEN_SYMBOL,
};
use serde_json::{json, Value};

pub const FEE_LAMPORTS: u64 = 5_000;
pub const RENT_LAMPORTS: u64 = 2_039_280;

/// Size of the token state account: discriminator plus the longest fields.
const TOKEN_STATE_SPACE: usize = 8 + 32 + 32 + 8 + 1 + (4 + 50) + (4 + 10) + 1;
const MINT_SPACE: usize = 82;

/// Anchor `ConstraintHasOne`.
const CONSTRAINT_HAS_ONE: u32 = 2001;
/// SPL Token `InsufficientFunds` and `OwnerMismatch`.
const SPL_INSUFFICIENT_FUNDS: u32 = 1;
const SPL_OWNER_MISMATCH: u32 = 4;

struct Rejection {
    err: Value,
    log: String,
}

impl Rejection {
    fn custom(code: u32, log: impl Into<String>) -> Self {
        Self {
            err: json!({ "Custom": code }),
            log: log.into(),
        }
    }

    fn program(code: u32) -> Self {
        Self::custom(code, format!("Program failed: custom program error: {code:#x}"))
    }

    fn named(name: &str) -> Self {
        Self {
            err: json!(name),
            log: format!("Program failed: {name}"),
        }
    }
}

#[derive(Default)]
struct Ledger {
    accounts: HashMap<Pubkey, AccountInfo>,
    statuses: HashMap<Signature, u32>,
    submitted: Vec<String>,
    pending_polls: u32,
    status_polls: u32,
    fail_airdrops: bool,
    fixed_blockhash: bool,
    blockhash_counter: u64,
}

/// Shared handle to an in-memory ledger.
#[derive(Clone, Default)]
pub struct MockLedger {
    inner: Arc<Mutex<Ledger>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Ledger) -> T) -> T {
        let mut ledger = self.inner.lock().unwrap();
        f(&mut ledger)
    }

    pub fn fund(&self, address: &Pubkey, lamports: u64) {
        self.with(|l| credit(&mut l.accounts, address, lamports));
    }

    /// Every new signature stays unseen for `polls` status queries.
    pub fn set_pending_polls(&self, polls: u32) {
        self.with(|l| l.pending_polls = polls);
    }

    /// Hand out one blockhash for every request, like a node within a
    /// single slot. Identical transactions then collide.
    pub fn fix_blockhash(&self) {
        self.with(|l| l.fixed_blockhash = true);
    }

    pub fn fail_airdrops(&self, fail: bool) {
        self.with(|l| l.fail_airdrops = fail);
    }

    /// Instruction names of every submitted transaction, rejected ones too.
    pub fn submitted(&self) -> Vec<String> {
        self.with(|l| l.submitted.clone())
    }

    pub fn count(&self, name: &str) -> usize {
        self.with(|l| l.submitted.iter().filter(|n| n.as_str() == name).count())
    }

    pub fn status_polls(&self) -> u32 {
        self.with(|l| l.status_polls)
    }

    pub fn account(&self, address: &Pubkey) -> Option<AccountInfo> {
        self.with(|l| l.accounts.get(address).cloned())
    }

    pub fn set_account(&self, address: Pubkey, account: AccountInfo) {
        self.with(|l| {
            l.accounts.insert(address, account);
        });
    }

    pub fn token_state(&self, program_id: &Pubkey) -> Option<TokenState> {
        let (address, _) = find_program_address(&[TOKEN_DATA_SEED], program_id).unwrap();
        self.account(&address)
            .map(|a| TokenState::unpack(&address, &a.data).unwrap())
    }

    /// SPL token accounts held by `owner` for `mint`.
    pub fn token_accounts_of(&self, owner: &Pubkey, mint: &Pubkey) -> usize {
        self.with(|l| {
            l.accounts
                .values()
                .filter(|a| a.owner == TOKEN_PROGRAM_ID && a.data.len() == 165)
                .filter_map(|a| TokenAccount::unpack(&a.data).ok())
                .filter(|t| t.owner == *owner && t.mint == *mint)
                .count()
        })
    }
}

/// A client over `ledger` that polls without sleeping.
pub fn client(ledger: &MockLedger, payer: Keypair) -> SecureChainClient<MockLedger> {
    SecureChainClient::new(ledger.clone(), DEFAULT_PROGRAM_ID, payer)
        .unwrap()
        .with_confirm_options(ConfirmOptions {
            poll_interval: Duration::ZERO,
            max_polls: 5,
            commitment: Commitment::Confirmed,
        })
}

/// A funded payer and a client for it.
pub fn funded_client(ledger: &MockLedger, seed: u8) -> SecureChainClient<MockLedger> {
    let payer = Keypair::from_seed(&[seed; 32]);
    ledger.fund(&payer.pubkey(), 10_000_000_000);
    client(ledger, payer)
}

fn credit(accounts: &mut HashMap<Pubkey, AccountInfo>, address: &Pubkey, lamports: u64) {
    accounts
        .entry(*address)
        .or_insert_with(|| AccountInfo {
            lamports: 0,
            owner: SYSTEM_PROGRAM_ID,
            data: Vec::new(),
            executable: false,
        })
        .lamports += lamports;
}

#[async_trait]
impl RpcTransport for MockLedger {
    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<AccountInfo>, ClientError> {
        Ok(self.account(address))
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ClientError> {
        Ok(self.account(address).map_or(0, |a| a.lamports))
    }

    async fn get_latest_blockhash(&self) -> Result<[u8; 32], ClientError> {
        let counter = self.with(|l| {
            if !l.fixed_blockhash {
                l.blockhash_counter += 1;
            }
            l.blockhash_counter
        });
        let mut hash = [0u8; 32];
        hash[..8].copy_from_slice(&counter.to_le_bytes());
        Ok(hash)
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, ClientError> {
        // Go through the wire format like a real node would.
        let tx = Transaction::deserialize(&tx.serialize())?;
        if !tx.verify() {
            return Err(ClientError::TransactionFailed {
                detail: "signature verification failure".into(),
                logs: Vec::new(),
            });
        }
        let signature = *tx.signature().ok_or_else(|| ClientError::TransactionFailed {
            detail: "unsigned transaction".into(),
            logs: Vec::new(),
        })?;

        self.with(|l| {
            if l.statuses.contains_key(&signature) {
                return Err(classify_transaction_error(&json!("AlreadyProcessed"), Vec::new()));
            }
            for ix in &tx.message.instructions {
                let program = tx.message.account_keys[ix.program_id_index as usize];
                let name = if program == DEFAULT_PROGRAM_ID {
                    ProgramInstruction::decode(&ix.data)
                        .map(|p| p.name().to_string())
                        .unwrap_or_else(|_| "unknown".into())
                } else if program == ASSOCIATED_TOKEN_PROGRAM_ID {
                    "create_token_account".to_string()
                } else {
                    program.to_string()
                };
                l.submitted.push(name);
            }

            let mut accounts = l.accounts.clone();
            let fee_payer = tx.message.account_keys[0];
            let fee = FEE_LAMPORTS * tx.signatures.len() as u64;
            match accounts.get_mut(&fee_payer) {
                Some(payer) if payer.lamports >= fee => payer.lamports -= fee,
                _ => {
                    return Err(classify_transaction_error(
                        &json!("InsufficientFundsForFee"),
                        Vec::new(),
                    ))
                }
            }

            for (index, ix) in tx.message.instructions.iter().enumerate() {
                let program = tx.message.account_keys[ix.program_id_index as usize];
                let metas: Vec<(Pubkey, bool)> = ix
                    .account_indices
                    .iter()
                    .map(|&i| {
                        let i = i as usize;
                        (
                            tx.message.account_keys[i],
                            i < tx.message.num_required_signatures as usize,
                        )
                    })
                    .collect();

                let mut exec = Exec {
                    accounts: &mut accounts,
                    metas: &metas,
                    payer: fee_payer,
                };
                let result = if program == DEFAULT_PROGRAM_ID {
                    exec.securechain(&ix.data)
                } else if program == ASSOCIATED_TOKEN_PROGRAM_ID {
                    exec.create_ata(&ix.data)
                } else {
                    Err(Rejection::named("IncorrectProgramId"))
                };

                if let Err(rejection) = result {
                    let logs = vec![
                        format!("Program {program} invoke [1]"),
                        rejection.log,
                        format!("Program {program} failed"),
                    ];
                    let err = json!({ "InstructionError": [index, rejection.err] });
                    return Err(classify_transaction_error(&err, logs));
                }
            }

            l.accounts = accounts;
            let pending = l.pending_polls;
            l.statuses.insert(signature, pending);
            Ok(signature)
        })
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, ClientError> {
        Ok(self.with(|l| {
            l.status_polls += 1;
            match l.statuses.get_mut(signature) {
                Some(0) => Some(SignatureStatus {
                    confirmation: Some(Commitment::Finalized),
                    err: None,
                }),
                Some(remaining) => {
                    *remaining -= 1;
                    None
                }
                None => None,
            }
        }))
    }

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<Signature, ClientError> {
        self.with(|l| {
            if l.fail_airdrops {
                return Err(ClientError::Rpc {
                    code: 429,
                    message: "airdrop limit reached".into(),
                    logs: Vec::new(),
                });
            }
            credit(&mut l.accounts, address, lamports);
            l.blockhash_counter += 1;
            let mut bytes = [0xa1u8; 64];
            bytes[..8].copy_from_slice(&l.blockhash_counter.to_le_bytes());
            let signature = Signature::new(bytes);
            l.statuses.insert(signature, 0);
            Ok(signature)
        })
    }
}

// ---------------------------------------------------------------------------
// Program models
// ---------------------------------------------------------------------------

struct Exec<'a> {
    accounts: &'a mut HashMap<Pubkey, AccountInfo>,
    metas: &'a [(Pubkey, bool)],
    payer: Pubkey,
}

impl Exec<'_> {
    fn key(&self, i: usize) -> Result<Pubkey, Rejection> {
        self.metas
            .get(i)
            .map(|m| m.0)
            .ok_or_else(|| Rejection::named("NotEnoughAccountKeys"))
    }

    fn signer(&self, i: usize) -> Result<Pubkey, Rejection> {
        match self.metas.get(i) {
            Some((key, true)) => Ok(*key),
            _ => Err(Rejection::named("MissingRequiredSignature")),
        }
    }

    fn create(&mut self, address: Pubkey, owner: Pubkey, data: Vec<u8>) -> Result<(), Rejection> {
        let in_use = self
            .accounts
            .get(&address)
            .is_some_and(|a| !a.data.is_empty() || a.owner != SYSTEM_PROGRAM_ID);
        if in_use {
            return Err(Rejection::custom(
                0,
                format!("Allocate: account Address {{ address: {address}, base: None }} already in use"),
            ));
        }
        let payer = self
            .accounts
            .get_mut(&self.payer)
            .filter(|p| p.lamports >= RENT_LAMPORTS)
            .ok_or_else(|| Rejection::custom(1, "Transfer: insufficient lamports"))?;
        payer.lamports -= RENT_LAMPORTS;

        let lamports = self.accounts.get(&address).map_or(0, |a| a.lamports);
        self.accounts.insert(
            address,
            AccountInfo {
                lamports: lamports + RENT_LAMPORTS,
                owner,
                data,
                executable: false,
            },
        );
        Ok(())
    }

    fn token_state(&self, address: &Pubkey) -> Result<TokenState, Rejection> {
        let account = self
            .accounts
            .get(address)
            .ok_or_else(|| Rejection::custom(3012, "AccountNotInitialized"))?;
        TokenState::unpack(address, &account.data)
            .map_err(|_| Rejection::custom(3003, "AccountDidNotDeserialize"))
    }

    fn put_token_state(&mut self, address: &Pubkey, state: &TokenState) {
        let mut data = state.pack();
        data.resize(TOKEN_STATE_SPACE, 0);
        if let Some(account) = self.accounts.get_mut(address) {
            account.data = data;
        }
    }

    fn token_account(&self, address: &Pubkey) -> Result<TokenAccount, Rejection> {
        self.accounts
            .get(address)
            .filter(|a| a.owner == TOKEN_PROGRAM_ID)
            .and_then(|a| TokenAccount::unpack(&a.data).ok())
            .ok_or_else(|| Rejection::custom(3012, "AccountNotInitialized"))
    }

    fn put_token_account(&mut self, address: &Pubkey, account: &TokenAccount) {
        if let Some(info) = self.accounts.get_mut(address) {
            info.data = account.pack();
        }
    }

    /// SPL Token transfer: moves `amount` between two accounts of one mint.
    fn spl_transfer(&mut self, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<(), Rejection> {
        let mut source = self.token_account(from)?;
        let mut dest = self.token_account(to)?;
        if source.mint != dest.mint {
            return Err(Rejection::custom(3, "Error: Account not associated with this Mint"));
        }
        if source.amount < amount {
            return Err(Rejection::custom(SPL_INSUFFICIENT_FUNDS, "Error: insufficient funds"));
        }
        source.amount -= amount;
        if from == to {
            source.amount += amount;
            self.put_token_account(from, &source);
            return Ok(());
        }
        dest.amount += amount;
        self.put_token_account(from, &source);
        self.put_token_account(to, &dest);
        Ok(())
    }

    fn create_ata(&mut self, data: &[u8]) -> Result<(), Rejection> {
        if data != [1] {
            return Err(Rejection::named("InvalidInstructionData"));
        }
        self.signer(0)?;
        let ata = self.key(1)?;
        let wallet = self.key(2)?;
        let mint = self.key(3)?;

        match derive_associated_token_address(&wallet, &mint) {
            Ok(expected) if expected == ata => {}
            _ => return Err(Rejection::named("InvalidSeeds")),
        }
        if self.accounts.get(&mint).map(|a| a.owner) != Some(TOKEN_PROGRAM_ID) {
            return Err(Rejection::named("IllegalOwner"));
        }
        if let Ok(existing) = self.token_account(&ata) {
            return if existing.owner == wallet && existing.mint == mint {
                Ok(())
            } else {
                Err(Rejection::named("IllegalOwner"))
            };
        }
        self.create(ata, TOKEN_PROGRAM_ID, TokenAccount::new(mint, wallet).pack())
    }

    fn securechain(&mut self, data: &[u8]) -> Result<(), Rejection> {
        let ix = ProgramInstruction::decode(data)
            .map_err(|_| Rejection::custom(101, "InstructionFallbackNotFound"))?;
        let (token_data, _) = find_program_address(&[TOKEN_DATA_SEED], &DEFAULT_PROGRAM_ID)
            .map_err(|_| Rejection::named("InvalidSeeds"))?;

        match ix {
            ProgramInstruction::Initialize => {
                if self.key(0)? != token_data {
                    return Err(Rejection::custom(2006, "ConstraintSeeds"));
                }
                let mint = self.signer(1)?;
                let authority = self.signer(2)?;
                let (_, bump) = find_program_address(&[TOKEN_DATA_SEED], &DEFAULT_PROGRAM_ID)
                    .map_err(|_| Rejection::named("InvalidSeeds"))?;

                let state = TokenState {
                    authority,
                    mint,
                    total_supply: 0,
                    decimals: TOKEN_DECIMALS,
                    name: TOKEN_NAME.to_string(),
                    symbol: TOKEN_SYMBOL.to_string(),
                    bump,
                };
                let mut state_data = state.pack();
                state_data.resize(TOKEN_STATE_SPACE, 0);
                self.create(token_data, DEFAULT_PROGRAM_ID, state_data)?;
                self.create(mint, TOKEN_PROGRAM_ID, vec![0u8; MINT_SPACE])
            }

            ProgramInstruction::MintInitialSupply => {
                let mut state = self.token_state(&self.key(0)?)?;
                let mint = self.key(1)?;
                let authority_ata = self.key(2)?;
                let authority = self.signer(3)?;
                if state.authority != authority || state.mint != mint {
                    return Err(Rejection::custom(CONSTRAINT_HAS_ONE, "ConstraintHasOne"));
                }
                if derive_associated_token_address(&authority, &mint).ok() != Some(authority_ata) {
                    return Err(Rejection::custom(2009, "ConstraintAssociated"));
                }
                if state.total_supply != 0 {
                    return Err(Rejection::program(ProgramError::AlreadyMinted.code()));
                }
                if self.token_account(&authority_ata).is_err() {
                    self.create(authority_ata, TOKEN_PROGRAM_ID, TokenAccount::new(mint, authority).pack())?;
                }
                let mut account = self.token_account(&authority_ata)?;
                account.amount += INITIAL_SUPPLY;
                self.put_token_account(&authority_ata, &account);
                state.total_supply = INITIAL_SUPPLY;
                self.put_token_state(&token_data, &state);
                Ok(())
            }

            ProgramInstruction::Transfer { amount } => {
                let from = self.key(0)?;
                let to = self.key(1)?;
                let authority = self.signer(2)?;
                if amount == 0 {
                    return Err(Rejection::program(ProgramError::InvalidAmount.code()));
                }
                if self.token_account(&from)?.owner != authority {
                    return Err(Rejection::program(ProgramError::Unauthorized.code()));
                }
                self.spl_transfer(&from, &to, amount)
            }

            ProgramInstruction::Approve { amount } => {
                let address = self.key(0)?;
                let delegate = self.key(1)?;
                let owner = self.signer(2)?;
                let mut account = self.token_account(&address)?;
                if account.owner != owner {
                    return Err(Rejection::program(ProgramError::Unauthorized.code()));
                }
                account.delegate = Some(delegate);
                account.delegated_amount = amount;
                self.put_token_account(&address, &account);
                Ok(())
            }

            ProgramInstruction::TransferFrom { amount } => {
                let from = self.key(0)?;
                let to = self.key(1)?;
                let delegate = self.signer(2)?;
                if amount == 0 {
                    return Err(Rejection::program(ProgramError::InvalidAmount.code()));
                }
                let mut source = self.token_account(&from)?;
                if source.delegate != Some(delegate) {
                    return Err(Rejection::program(ProgramError::InvalidDelegate.code()));
                }
                if source.delegated_amount < amount {
                    return Err(Rejection::program(ProgramError::InsufficientAllowance.code()));
                }
                self.spl_transfer(&from, &to, amount)?;

                source = self.token_account(&from)?;
                source.delegated_amount -= amount;
                if source.delegated_amount == 0 {
                    source.delegate = None;
                }
                self.put_token_account(&from, &source);
                Ok(())
            }

            ProgramInstruction::Burn { amount } => {
                let mut state = self.token_state(&self.key(0)?)?;
                let address = self.key(2)?;
                let authority = self.signer(3)?;
                if amount == 0 {
                    return Err(Rejection::program(ProgramError::InvalidAmount.code()));
                }
                let mut account = self.token_account(&address)?;
                if account.owner != authority {
                    return Err(Rejection::program(ProgramError::Unauthorized.code()));
                }
                if account.amount < amount {
                    return Err(Rejection::program(ProgramError::InsufficientBalance.code()));
                }
                if account.mint != self.key(1)? {
                    return Err(Rejection::custom(3, "Error: Account not associated with this Mint"));
                }
                account.amount -= amount;
                self.put_token_account(&address, &account);
                state.total_supply = state
                    .total_supply
                    .checked_sub(amount)
                    .ok_or_else(|| Rejection::program(ProgramError::Overflow.code()))?;
                self.put_token_state(&token_data, &state);
                Ok(())
            }

            ProgramInstruction::Revoke => {
                let address = self.key(0)?;
                let owner = self.signer(1)?;
                let mut account = self.token_account(&address)?;
                if account.owner != owner {
                    return Err(Rejection::custom(SPL_OWNER_MISMATCH, "Error: owner does not match"));
                }
                account.delegate = None;
                account.delegated_amount = 0;
                self.put_token_account(&address, &account);
                Ok(())
            }

            ProgramInstruction::CreateMetadata { name, symbol, uri } => {
                let state = self.token_state(&self.key(0)?)?;
                let mint = self.key(1)?;
                let metadata = self.key(2)?;
                self.signer(3)?;
                if state.mint != mint {
                    return Err(Rejection::custom(CONSTRAINT_HAS_ONE, "ConstraintHasOne"));
                }
                if metadata_address(&mint).ok() != Some(metadata) {
                    return Err(Rejection::named("InvalidSeeds"));
                }
                if self.key(6)? != TOKEN_METADATA_PROGRAM_ID {
                    return Err(Rejection::custom(2012, "ConstraintAddress"));
                }
                let body = format!("{name}\u{0}{symbol}\u{0}{uri}").into_bytes();
                self.create(metadata, TOKEN_METADATA_PROGRAM_ID, body)
            }
        }
    }
}
