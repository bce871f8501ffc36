use std::fmt;

use chain_sol::{Pubkey, SolError, SYSTEM_PROGRAM_ID};
use serde_json::Value;
use thiserror::Error;

/// Offset of Anchor custom error codes.
const ANCHOR_ERROR_OFFSET: u32 = 6000;

/// Custom error codes declared by the SecureChain program, in declaration
/// order starting at 6000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramError {
    InvalidAmount,
    Overflow,
    Unauthorized,
    InsufficientBalance,
    AlreadyMinted,
    InvalidDelegate,
    InsufficientAllowance,
}

impl ProgramError {
    const ALL: [ProgramError; 7] = [
        ProgramError::InvalidAmount,
        ProgramError::Overflow,
        ProgramError::Unauthorized,
        ProgramError::InsufficientBalance,
        ProgramError::AlreadyMinted,
        ProgramError::InvalidDelegate,
        ProgramError::InsufficientAllowance,
    ];

    pub fn from_code(code: u32) -> Option<Self> {
        let index = code.checked_sub(ANCHOR_ERROR_OFFSET)?;
        Self::ALL.get(index as usize).copied()
    }

    pub fn code(self) -> u32 {
        ANCHOR_ERROR_OFFSET + self as u32
    }

    /// The message text the program attaches to the code.
    pub fn message(self) -> &'static str {
        match self {
            ProgramError::InvalidAmount => "Invalid amount: must be greater than 0",
            ProgramError::Overflow => "Arithmetic overflow occurred",
            ProgramError::Unauthorized => "Unauthorized: caller is not the owner",
            ProgramError::InsufficientBalance => "Insufficient balance",
            ProgramError::AlreadyMinted => "Initial supply has already been minted",
            ProgramError::InvalidDelegate => "Invalid delegate",
            ProgramError::InsufficientAllowance => "Insufficient allowance",
        }
    }
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({}): {}", self, self.code(), self.message())
    }
}

/// Errors raised by the SecureChain client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        logs: Vec<String>,
    },

    #[error("program rejected instruction {index}: {error}")]
    Program {
        index: u8,
        error: ProgramError,
        logs: Vec<String>,
    },

    #[error("instruction {index} failed: {detail}")]
    InstructionFailed {
        index: u8,
        custom: Option<u32>,
        detail: String,
        logs: Vec<String>,
    },

    #[error("transaction rejected: {detail}")]
    TransactionFailed { detail: String, logs: Vec<String> },

    #[error("transaction {signature} not confirmed after {polls} polls")]
    ConfirmationTimeout { signature: String, polls: u32 },

    #[error("token state did not reach the expected condition after {polls} polls")]
    StateTimeout { polls: u32 },

    #[error("account not found: {0}")]
    AccountNotFound(Pubkey),

    #[error("invalid account data for {address}: {reason}")]
    InvalidAccountData { address: Pubkey, reason: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("metadataUri not found in {path}; add \"metadataUri\": \"https://gateway.pinata.cloud/ipfs/<CID>\" and run again")]
    MissingMetadataUri { path: String },

    #[error("record {path}: {reason}")]
    Record { path: String, reason: String },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error(transparent)]
    Sol(#[from] SolError),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

impl ClientError {
    /// Program logs attached to a rejected transaction, if any.
    pub fn logs(&self) -> &[String] {
        match self {
            ClientError::Rpc { logs, .. }
            | ClientError::Program { logs, .. }
            | ClientError::InstructionFailed { logs, .. }
            | ClientError::TransactionFailed { logs, .. } => logs,
            _ => &[],
        }
    }

    /// The SecureChain program error code, when this is a program rejection.
    pub fn program_error(&self) -> Option<ProgramError> {
        match self {
            ClientError::Program { error, .. } => Some(*error),
            _ => None,
        }
    }

    /// Whether the remote side refused to create an account that already
    /// exists (System Program `AccountAlreadyInUse`, custom code 0).
    ///
    /// Custom code 0 means something else in other programs (SPL Token's
    /// `NotRentExempt`), so it only counts when the System Program failed.
    pub fn is_account_in_use(&self) -> bool {
        let logs = self.logs();
        let in_logs = logs.iter().any(|line| line.contains("already in use"));
        match self {
            ClientError::InstructionFailed { custom: Some(0), .. } => {
                let system_failed = format!("Program {SYSTEM_PROGRAM_ID} failed");
                in_logs || logs.iter().any(|line| line.starts_with(&system_failed))
            }
            ClientError::InstructionFailed { .. } | ClientError::TransactionFailed { .. } => in_logs,
            _ => false,
        }
    }

    /// Whether the node already saw this exact transaction. Resending a
    /// byte-identical transaction in the same blockhash window does this.
    pub fn is_already_processed(&self) -> bool {
        match self {
            ClientError::TransactionFailed { detail, .. } => detail.contains("AlreadyProcessed"),
            ClientError::Rpc { message, .. } => message.contains("already been processed"),
            _ => false,
        }
    }
}

/// Classify a transaction error value as returned by RPC (`err` of a
/// simulation or a signature status), e.g.
/// `{"InstructionError":[0,{"Custom":6002}]}`.
pub fn classify_transaction_error(err: &Value, logs: Vec<String>) -> ClientError {
    let instruction_error = err
        .get("InstructionError")
        .and_then(Value::as_array)
        .filter(|parts| parts.len() == 2);

    let Some(parts) = instruction_error else {
        return ClientError::TransactionFailed {
            detail: err.to_string(),
            logs,
        };
    };

    let index = parts[0].as_u64().unwrap_or(0) as u8;
    let custom = parts[1]
        .get("Custom")
        .and_then(Value::as_u64)
        .map(|c| c as u32);

    if let Some(error) = custom.and_then(ProgramError::from_code) {
        return ClientError::Program { index, error, logs };
    }

    let detail = match custom {
        Some(code) => format!("custom program error {code:#x}"),
        None => match &parts[1] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    };

    ClientError::InstructionFailed {
        index,
        custom,
        detail,
        logs,
    }
}
