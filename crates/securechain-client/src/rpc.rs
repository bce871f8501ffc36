//! The remote connection.
//!
//! [`RpcTransport`] is the seam between the client and the network: the
//! facade only ever talks to this trait, and [`HttpRpc`] implements it over
//! Solana's JSON-RPC 2.0 HTTP API.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chain_sol::{Pubkey, Signature, Transaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{classify_transaction_error, ClientError};

/// How settled a read or a transaction must be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

/// An account as returned by `getAccountInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub lamports: u64,
    pub owner: Pubkey,
    pub data: Vec<u8>,
    pub executable: bool,
}

/// The status of a submitted transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureStatus {
    /// `None` once the transaction is rooted.
    pub confirmation: Option<Commitment>,
    /// Transaction error, when execution failed.
    pub err: Option<Value>,
}

impl SignatureStatus {
    /// Whether the transaction has reached `target`.
    pub fn reached(&self, target: Commitment) -> bool {
        self.confirmation.map_or(true, |c| c >= target)
    }
}

/// Remote network operations the client depends on.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Fetch an account; `None` when it does not exist.
    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<AccountInfo>, ClientError>;

    /// Lamport balance of an address.
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ClientError>;

    async fn get_latest_blockhash(&self) -> Result<[u8; 32], ClientError>;

    /// Submit a signed transaction. Preflight rejections surface here.
    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, ClientError>;

    /// Status of a submitted transaction; `None` when not yet seen.
    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, ClientError>;

    /// Ask the cluster faucet for lamports.
    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<Signature, ClientError>;
}

// ---------------------------------------------------------------------------
// JSON-RPC over HTTP
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 transport over HTTP.
pub struct HttpRpc {
    http: reqwest::Client,
    url: String,
    commitment: Commitment,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
struct UiAccount {
    lamports: u64,
    owner: String,
    data: (String, String),
    executable: bool,
}

#[derive(Deserialize)]
struct UiBlockhash {
    blockhash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiSignatureStatus {
    confirmation_status: Option<Commitment>,
    err: Option<Value>,
}

impl HttpRpc {
    pub fn new(url: impl Into<String>, commitment: Commitment) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            commitment,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "rpc request");

        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: RpcResponse<T> = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(rpc_error(error));
        }

        response
            .result
            .ok_or_else(|| ClientError::Transport(format!("{method}: response has no result")))
    }
}

/// Map a JSON-RPC error body. Preflight failures carry the transaction
/// error and program logs in `data`.
fn rpc_error(error: RpcErrorBody) -> ClientError {
    let data = error.data.unwrap_or(Value::Null);
    let logs: Vec<String> = data
        .get("logs")
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .filter_map(|l| l.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default();

    match data.get("err") {
        Some(err) if !err.is_null() => classify_transaction_error(err, logs),
        _ => ClientError::Rpc {
            code: error.code,
            message: error.message,
            logs,
        },
    }
}

fn parse_signature(s: &str) -> Result<Signature, ClientError> {
    s.parse().map_err(ClientError::from)
}

#[async_trait]
impl RpcTransport for HttpRpc {
    async fn get_account_info(&self, address: &Pubkey) -> Result<Option<AccountInfo>, ClientError> {
        let response: WithContext<Option<UiAccount>> = self
            .call(
                "getAccountInfo",
                json!([address.to_string(), {
                    "encoding": "base64",
                    "commitment": self.commitment.as_str(),
                }]),
            )
            .await?;

        let Some(account) = response.value else {
            return Ok(None);
        };

        let data = BASE64
            .decode(&account.data.0)
            .map_err(|e| ClientError::InvalidAccountData {
                address: *address,
                reason: format!("base64: {e}"),
            })?;

        Ok(Some(AccountInfo {
            lamports: account.lamports,
            owner: account.owner.parse()?,
            data,
            executable: account.executable,
        }))
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ClientError> {
        let response: WithContext<u64> = self
            .call(
                "getBalance",
                json!([address.to_string(), { "commitment": self.commitment.as_str() }]),
            )
            .await?;
        Ok(response.value)
    }

    async fn get_latest_blockhash(&self) -> Result<[u8; 32], ClientError> {
        let response: WithContext<UiBlockhash> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": self.commitment.as_str() }]),
            )
            .await?;
        let hash: Pubkey = response.value.blockhash.parse()?;
        Ok(hash.to_bytes())
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, ClientError> {
        let encoded = BASE64.encode(tx.serialize());
        let signature: String = self
            .call(
                "sendTransaction",
                json!([encoded, {
                    "encoding": "base64",
                    "preflightCommitment": self.commitment.as_str(),
                }]),
            )
            .await?;
        parse_signature(&signature)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, ClientError> {
        let response: WithContext<Vec<Option<UiSignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature.to_string()], { "searchTransactionHistory": false }]),
            )
            .await?;

        Ok(response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(|status| SignatureStatus {
                confirmation: status.confirmation_status,
                err: status.err,
            }))
    }

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<Signature, ClientError> {
        let signature: String = self
            .call(
                "requestAirdrop",
                json!([address.to_string(), lamports, { "commitment": self.commitment.as_str() }]),
            )
            .await?;
        parse_signature(&signature)
    }
}
