use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use securechain_client::{ClientError, Commitment};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "securechain", version, about = "SecureChain AI token client")]
struct Cli {
    /// JSON-RPC endpoint.
    #[arg(long, env = "SECURECHAIN_RPC_URL", default_value = "https://api.devnet.solana.com")]
    rpc_url: String,

    /// Cluster label for the record and explorer links.
    #[arg(long, default_value = "devnet")]
    network: String,

    /// Deployed program id (Base58).
    #[arg(long, env = "SECURECHAIN_PROGRAM_ID")]
    program_id: Option<String>,

    /// Payer and authority keypair; defaults to ~/.config/solana/id.json.
    #[arg(long, env = "SECURECHAIN_KEYPAIR")]
    keypair: Option<PathBuf>,

    #[arg(long, default_value = "token-info.json")]
    record: PathBuf,

    #[arg(long, default_value = "mint.json")]
    mint_keypair: PathBuf,

    #[arg(long, value_enum, default_value = "confirmed")]
    commitment: CommitmentArg,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Copy, ValueEnum)]
enum CommitmentArg {
    Processed,
    Confirmed,
    Finalized,
}

impl From<CommitmentArg> for Commitment {
    fn from(arg: CommitmentArg) -> Self {
        match arg {
            CommitmentArg::Processed => Commitment::Processed,
            CommitmentArg::Confirmed => Commitment::Confirmed,
            CommitmentArg::Finalized => Commitment::Finalized,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Fund, initialize, mint and attach metadata as needed (default).
    Bootstrap,
    /// Create the metadata account for an initialized token.
    Metadata,
    /// Initialize the token with the mint keypair file.
    Initialize,
    /// Mint the initial supply to the authority.
    MintInitialSupply,
    /// Send tokens to a wallet, creating its token account if needed.
    Transfer(TransferArgs),
    /// Allow a delegate to spend from the payer's token account.
    Approve(ApproveArgs),
    /// Spend an allowance as the delegate.
    TransferFrom(TransferFromArgs),
    Burn(AmountArgs),
    /// Remove the payer's delegate.
    Revoke(MintArg),
    /// Print the token state.
    State,
    /// Print a wallet's token balance.
    Balance(BalanceArgs),
    /// Create a wallet's token account if it does not exist.
    EnsureTokenAccount(OwnerArgs),
    /// Request SOL from the cluster faucet.
    Airdrop(AirdropArgs),
}

#[derive(clap::Args)]
struct MintArg {
    /// Token mint; read from the token state when omitted.
    #[arg(long)]
    mint: Option<String>,
}

#[derive(clap::Args)]
struct AmountArgs {
    /// Human amount, scaled by the token decimals.
    amount: f64,
    #[command(flatten)]
    mint: MintArg,
}

#[derive(clap::Args)]
struct TransferArgs {
    /// Recipient wallet.
    recipient: String,
    amount: f64,
    #[command(flatten)]
    mint: MintArg,
}

#[derive(clap::Args)]
struct ApproveArgs {
    delegate: String,
    amount: f64,
    #[command(flatten)]
    mint: MintArg,
}

#[derive(clap::Args)]
struct TransferFromArgs {
    /// Delegate keypair file.
    #[arg(long)]
    delegate_keypair: PathBuf,
    /// Wallet whose tokens are spent.
    owner: String,
    /// Recipient wallet.
    recipient: String,
    amount: f64,
    #[command(flatten)]
    mint: MintArg,
}

#[derive(clap::Args)]
struct BalanceArgs {
    /// Wallet; defaults to the payer.
    owner: Option<String>,
    #[command(flatten)]
    mint: MintArg,
}

#[derive(clap::Args)]
struct OwnerArgs {
    owner: String,
    #[command(flatten)]
    mint: MintArg,
}

#[derive(clap::Args)]
struct AirdropArgs {
    #[arg(default_value_t = 1.0)]
    sol: f64,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            if let Some(client_error) = e.downcast_ref::<ClientError>() {
                for line in client_error.logs() {
                    error!("  {line}");
                }
            }
            ExitCode::FAILURE
        }
    }
}
