//! First-run orchestration: fund, initialize, mint, attach metadata.
//!
//! Each step inspects remote state first, so re-running after a partial or
//! complete run only performs what is still missing. The [`TokenRecord`] is
//! passed explicitly between steps and written at checkpoints.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use chain_sol::{derive_associated_token_address, Keypair, Pubkey, Signature};
use tracing::{info, warn};

use crate::amount::format_base_units;
use crate::client::SecureChainClient;
use crate::error::ClientError;
use crate::metadata::metadata_address;
use crate::record::{CreatedAt, TokenRecord};
use crate::rpc::RpcTransport;
use crate::state::TokenState;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub record_path: PathBuf,
    pub mint_keypair_path: PathBuf,
    /// Cluster label written to the record and used for explorer links.
    pub network: String,
    /// Request an airdrop below this payer balance.
    pub min_balance_lamports: u64,
    pub airdrop_lamports: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            record_path: PathBuf::from("token-info.json"),
            mint_keypair_path: PathBuf::from("mint.json"),
            network: "devnet".to_string(),
            min_balance_lamports: LAMPORTS_PER_SOL,
            airdrop_lamports: LAMPORTS_PER_SOL,
        }
    }
}

/// What a bootstrap run found and did.
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub state: TokenState,
    pub payer_lamports: u64,
    pub initialize_signature: Option<Signature>,
    pub mint_signature: Option<Signature>,
    pub metadata_account: Pubkey,
    pub metadata_signature: Option<Signature>,
}

impl BootstrapReport {
    /// Whether this run submitted any program transaction.
    pub fn changed_anything(&self) -> bool {
        self.initialize_signature.is_some()
            || self.mint_signature.is_some()
            || self.metadata_signature.is_some()
    }
}

/// Run every step in order.
pub async fn run_bootstrap<R: RpcTransport>(
    client: &SecureChainClient<R>,
    config: &BootstrapConfig,
    record: &mut TokenRecord,
) -> Result<BootstrapReport, ClientError> {
    info!(
        payer = %client.payer().pubkey(),
        program = %client.program_id(),
        network = %config.network,
        "bootstrap starting"
    );

    let payer_lamports = ensure_funded(client, config).await?;

    let (state, initialize_signature) = ensure_initialized(client, config).await?;
    record.network = Some(config.network.clone());
    record.apply_state(client.program_id(), client.token_state_address(), &state);
    record.save(&config.record_path)?;

    let (state, mint_signature) = ensure_initial_supply(client, state).await?;

    let metadata_signature = ensure_metadata(client, config, record, &state).await?;
    let metadata_account = metadata_address(&state.mint)?;

    let state = client
        .token_state()
        .await?
        .ok_or(ClientError::AccountNotFound(client.token_state_address()))?;
    record.apply_state(client.program_id(), client.token_state_address(), &state);
    record.save(&config.record_path)?;

    log_summary(client, config, &state, &metadata_account);

    Ok(BootstrapReport {
        state,
        payer_lamports,
        initialize_signature,
        mint_signature,
        metadata_account,
        metadata_signature,
    })
}

/// Top the payer up from the faucet when it is below the configured floor.
/// A faucet failure is logged and tolerated.
pub async fn ensure_funded<R: RpcTransport>(
    client: &SecureChainClient<R>,
    config: &BootstrapConfig,
) -> Result<u64, ClientError> {
    let payer = client.payer().pubkey();
    let balance = client.sol_balance(&payer).await?;
    info!(%payer, sol = balance as f64 / LAMPORTS_PER_SOL as f64, "payer balance");

    if balance >= config.min_balance_lamports {
        return Ok(balance);
    }

    info!(lamports = config.airdrop_lamports, "requesting airdrop");
    if let Err(e) = client.request_airdrop(&payer, config.airdrop_lamports).await {
        warn!(error = %e, "airdrop failed, continuing");
        return Ok(balance);
    }

    let balance = client.sol_balance(&payer).await?;
    info!(%payer, sol = balance as f64 / LAMPORTS_PER_SOL as f64, "payer balance after airdrop");
    Ok(balance)
}

/// Return the existing token state, or initialize it with the payer as
/// authority and the mint keypair stored at `mint_keypair_path`.
pub async fn ensure_initialized<R: RpcTransport>(
    client: &SecureChainClient<R>,
    config: &BootstrapConfig,
) -> Result<(TokenState, Option<Signature>), ClientError> {
    if let Some(state) = client.token_state().await? {
        info!(mint = %state.mint, supply = state.total_supply, "token already initialized");
        return Ok((state, None));
    }

    info!("token not initialized");
    let mint = load_or_create_mint(config)?;
    let signature = client.initialize(client.payer(), &mint).await?;
    let state = client.wait_for_state(|_| true).await?;
    info!(mint = %state.mint, "token initialized");

    Ok((state, Some(signature)))
}

/// Mint the initial supply when the recorded supply is exactly zero.
pub async fn ensure_initial_supply<R: RpcTransport>(
    client: &SecureChainClient<R>,
    state: TokenState,
) -> Result<(TokenState, Option<Signature>), ClientError> {
    if state.is_minted() {
        return Ok((state, None));
    }

    let signature = client.mint_initial_supply(client.payer(), &state.mint).await?;
    let state = client.wait_for_state(TokenState::is_minted).await?;
    info!(
        supply = %format_base_units(state.total_supply, state.decimals),
        symbol = %state.symbol,
        "initial supply minted"
    );

    Ok((state, Some(signature)))
}

/// Create the metadata account for `state.mint` unless it already exists.
///
/// Requires `metadataUri` in the record and fails with
/// [`ClientError::MissingMetadataUri`] before submitting anything when it is
/// absent. Checkpoints the record after creation.
pub async fn ensure_metadata<R: RpcTransport>(
    client: &SecureChainClient<R>,
    config: &BootstrapConfig,
    record: &mut TokenRecord,
    state: &TokenState,
) -> Result<Option<Signature>, ClientError> {
    let metadata = metadata_address(&state.mint)?;

    if client.account_exists(&metadata).await? {
        info!(%metadata, "metadata already exists");
        record.metadata_created = true;
        record.metadata_account = Some(metadata);
        return Ok(None);
    }

    let uri = record
        .metadata_uri()
        .ok_or_else(|| ClientError::MissingMetadataUri {
            path: config.record_path.display().to_string(),
        })?
        .to_owned();

    info!(%metadata, %uri, "creating metadata");
    let signature = client
        .create_metadata(client.payer(), &state.mint, &state.name, &state.symbol, &uri)
        .await?;

    record.metadata_created = true;
    record.metadata_account = Some(metadata);
    record.metadata_signature = Some(signature.to_string());
    record.metadata_created_at = Some(CreatedAt::Unix(unix_now()));
    record.save(&config.record_path)?;

    Ok(Some(signature))
}

/// Metadata step on its own, for a token initialized by an earlier run.
pub async fn run_metadata<R: RpcTransport>(
    client: &SecureChainClient<R>,
    config: &BootstrapConfig,
    record: &mut TokenRecord,
) -> Result<Option<Signature>, ClientError> {
    let payer = client.payer().pubkey();
    if let Some(authority) = record.authority {
        if authority != payer {
            warn!(%payer, %authority, "loaded keypair is not the recorded authority");
        }
    }

    let state = client
        .token_state()
        .await?
        .ok_or(ClientError::AccountNotFound(client.token_state_address()))?;

    let signature = ensure_metadata(client, config, record, &state).await?;
    if let Some(signature) = &signature {
        info!(
            tx = %explorer_url("tx", &signature.to_string(), &config.network),
            "metadata created"
        );
    }
    Ok(signature)
}

/// Solana explorer link for an address or transaction.
pub fn explorer_url(kind: &str, id: &str, network: &str) -> String {
    match network {
        "mainnet" | "mainnet-beta" => format!("https://explorer.solana.com/{kind}/{id}"),
        cluster => format!("https://explorer.solana.com/{kind}/{id}?cluster={cluster}"),
    }
}

/// Load the mint keypair file, or generate one and write it there.
pub fn load_or_create_mint(config: &BootstrapConfig) -> Result<Keypair, ClientError> {
    let path = &config.mint_keypair_path;
    if path.exists() {
        let mint = Keypair::read_from_file(path)?;
        info!(mint = %mint.pubkey(), path = %path.display(), "loaded mint keypair");
        return Ok(mint);
    }

    let mint = Keypair::generate();
    mint.write_to_file(path)?;
    info!(mint = %mint.pubkey(), path = %path.display(), "generated mint keypair");
    Ok(mint)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn log_summary<R: RpcTransport>(
    client: &SecureChainClient<R>,
    config: &BootstrapConfig,
    state: &TokenState,
    metadata: &Pubkey,
) {
    let network = &config.network;
    info!(
        name = %state.name,
        symbol = %state.symbol,
        decimals = state.decimals,
        supply = %format_base_units(state.total_supply, state.decimals),
        mint = %state.mint,
        authority = %state.authority,
        "token state"
    );
    if let Ok(ata) = derive_associated_token_address(&state.authority, &state.mint) {
        info!(%ata, "authority token account");
    }
    info!(url = %explorer_url("address", &state.mint.to_string(), network), "token");
    info!(url = %explorer_url("address", &client.program_id().to_string(), network), "program");
    info!(url = %explorer_url("address", &metadata.to_string(), network), "metadata");
}
