use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chain_sol::{derive_associated_token_address, Keypair, Pubkey};
use securechain_client::bootstrap::{explorer_url, load_or_create_mint, LAMPORTS_PER_SOL};
use securechain_client::{
    format_base_units, run_bootstrap, run_metadata, to_base_units, BootstrapConfig,
    ConfirmOptions, HttpRpc, SecureChainClient, TokenRecord, DEFAULT_PROGRAM_ID,
};
use tracing::info;

use crate::{Cli, Command, MintArg};

type Client = SecureChainClient<HttpRpc>;

pub(crate) async fn run(cli: Cli) -> Result<()> {
    let keypair_path = match &cli.keypair {
        Some(path) => path.clone(),
        None => default_keypair_path()?,
    };
    let payer = Keypair::read_from_file(&keypair_path)
        .with_context(|| format!("loading payer keypair {}", keypair_path.display()))?;

    let program_id = match &cli.program_id {
        Some(id) => parse_pubkey(id)?,
        None => DEFAULT_PROGRAM_ID,
    };

    let commitment = cli.commitment.into();
    let rpc = HttpRpc::new(cli.rpc_url.clone(), commitment);
    let client = SecureChainClient::new(rpc, program_id, payer)?.with_confirm_options(ConfirmOptions {
        commitment,
        ..ConfirmOptions::default()
    });

    let config = BootstrapConfig {
        record_path: cli.record.clone(),
        mint_keypair_path: cli.mint_keypair.clone(),
        network: cli.network.clone(),
        ..BootstrapConfig::default()
    };

    info!(rpc = %cli.rpc_url, payer = %client.payer().pubkey(), "connected");

    match cli.command.unwrap_or(Command::Bootstrap) {
        Command::Bootstrap => {
            let mut record = TokenRecord::load_or_default(&config.record_path)?;
            let report = run_bootstrap(&client, &config, &mut record).await?;
            if !report.changed_anything() {
                info!("nothing to do, token already set up");
            }
        }

        Command::Metadata => {
            let mut record = TokenRecord::load(&config.record_path)?.ok_or_else(|| {
                anyhow!(
                    "{} not found; run the bootstrap first",
                    config.record_path.display()
                )
            })?;
            run_metadata(&client, &config, &mut record).await?;
        }

        Command::Initialize => {
            let mint = load_or_create_mint(&config)?;
            let signature = client.initialize(client.payer(), &mint).await?;
            print_tx(&config, &signature.to_string());
        }

        Command::MintInitialSupply => {
            let mint = resolve_mint(&client, &MintArg { mint: None }).await?;
            let signature = client.mint_initial_supply(client.payer(), &mint).await?;
            print_tx(&config, &signature.to_string());
        }

        Command::Transfer(args) => {
            let mint = resolve_mint(&client, &args.mint).await?;
            let recipient = parse_pubkey(&args.recipient)?;
            let amount = base_units(&client, args.amount).await?;
            let to = client.ensure_token_account(&recipient, &mint).await?;
            let signature = client.transfer(client.payer(), &to, amount, &mint).await?;
            print_tx(&config, &signature.to_string());
        }

        Command::Approve(args) => {
            let mint = resolve_mint(&client, &args.mint).await?;
            let delegate = parse_pubkey(&args.delegate)?;
            let amount = base_units(&client, args.amount).await?;
            let signature = client.approve(client.payer(), &delegate, amount, &mint).await?;
            print_tx(&config, &signature.to_string());
        }

        Command::TransferFrom(args) => {
            let mint = resolve_mint(&client, &args.mint).await?;
            let delegate = Keypair::read_from_file(&args.delegate_keypair).with_context(|| {
                format!("loading delegate keypair {}", args.delegate_keypair.display())
            })?;
            let owner = parse_pubkey(&args.owner)?;
            let recipient = parse_pubkey(&args.recipient)?;
            let amount = base_units(&client, args.amount).await?;

            let from = derive_associated_token_address(&owner, &mint)?;
            let to = client.ensure_token_account(&recipient, &mint).await?;
            let signature = client.transfer_from(&delegate, &from, &to, amount).await?;
            print_tx(&config, &signature.to_string());
        }

        Command::Burn(args) => {
            let mint = resolve_mint(&client, &args.mint).await?;
            let amount = base_units(&client, args.amount).await?;
            let signature = client.burn(client.payer(), amount, &mint).await?;
            print_tx(&config, &signature.to_string());
        }

        Command::Revoke(args) => {
            let mint = resolve_mint(&client, &args).await?;
            let signature = client.revoke(client.payer(), &mint).await?;
            print_tx(&config, &signature.to_string());
        }

        Command::State => match client.token_state().await? {
            Some(state) => {
                println!("address:      {}", client.token_state_address());
                println!("name:         {}", state.name);
                println!("symbol:       {}", state.symbol);
                println!("decimals:     {}", state.decimals);
                println!(
                    "total supply: {} ({} base units)",
                    format_base_units(state.total_supply, state.decimals),
                    state.total_supply
                );
                println!("mint:         {}", state.mint);
                println!("authority:    {}", state.authority);
            }
            None => println!("token not initialized"),
        },

        Command::Balance(args) => {
            let mint = resolve_mint(&client, &args.mint).await?;
            let owner = match &args.owner {
                Some(owner) => parse_pubkey(owner)?,
                None => client.payer().pubkey(),
            };
            let decimals = decimals(&client).await?;
            let units = client.balance(&owner, &mint).await?;
            println!("{} ({units} base units)", format_base_units(units, decimals));
        }

        Command::EnsureTokenAccount(args) => {
            let mint = resolve_mint(&client, &args.mint).await?;
            let owner = parse_pubkey(&args.owner)?;
            let ata = client.ensure_token_account(&owner, &mint).await?;
            println!("{ata}");
        }

        Command::Airdrop(args) => {
            let lamports = to_base_units(args.sol, 9)?;
            let payer = client.payer().pubkey();
            client.request_airdrop(&payer, lamports).await?;
            let balance = client.sol_balance(&payer).await?;
            println!("{} SOL", balance as f64 / LAMPORTS_PER_SOL as f64);
        }
    }

    Ok(())
}

fn default_keypair_path() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").ok_or_else(|| anyhow!("HOME is not set; pass --keypair"))?;
    Ok(PathBuf::from(home).join(".config/solana/id.json"))
}

fn parse_pubkey(text: &str) -> Result<Pubkey> {
    text.parse()
        .with_context(|| format!("invalid address {text:?}"))
}

/// `--mint` when given, otherwise the mint recorded in the token state.
async fn resolve_mint(client: &Client, arg: &MintArg) -> Result<Pubkey> {
    if let Some(mint) = &arg.mint {
        return parse_pubkey(mint);
    }
    let state = client
        .token_state()
        .await?
        .ok_or_else(|| anyhow!("token not initialized; pass --mint or run the bootstrap"))?;
    Ok(state.mint)
}

async fn decimals(client: &Client) -> Result<u8> {
    Ok(client
        .token_state()
        .await?
        .map_or(securechain_client::DEFAULT_DECIMALS, |s| s.decimals))
}

async fn base_units(client: &Client, amount: f64) -> Result<u64> {
    Ok(to_base_units(amount, decimals(client).await?)?)
}

fn print_tx(config: &BootstrapConfig, signature: &str) {
    println!("{signature}");
    info!(url = %explorer_url("tx", signature, &config.network), "confirmed");
}
