//! The local token record (`token-info.json`).
//!
//! Written by the bootstrap at checkpoints. Only `metadataUri` and keys a
//! human added by hand are ever read back; everything else mirrors remote
//! state for people and other tools.

use std::fs;
use std::path::Path;

use chain_sol::Pubkey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;
use crate::state::TokenState;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_id: Option<Pubkey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_address: Option<Pubkey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority: Option<Pubkey>,
    #[serde(rename = "tokenDataPDA", skip_serializing_if = "Option::is_none")]
    pub token_data_pda: Option<Pubkey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    /// Decimal string; base-unit supplies exceed what JSON numbers hold
    /// exactly in most readers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    #[serde(default)]
    pub metadata_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_account: Option<Pubkey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_created_at: Option<CreatedAt>,
    /// Keys this crate does not know about, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// When the metadata account was created.
///
/// New records store unix seconds. Records written by the older TypeScript
/// scripts carry an ISO-8601 string, which is kept as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CreatedAt {
    Unix(u64),
    Iso8601(String),
}

impl TokenRecord {
    /// Read the record at `path`; `None` when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>, ClientError> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(record_error(path, e)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| record_error(path, e))
    }

    /// Read the record, or start an empty one.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        Ok(Self::load(path)?.unwrap_or_default())
    }

    /// Write the record: temp file in the same directory, then rename, so
    /// readers never observe a partial file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ClientError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|e| record_error(path, e))?;

        let mut tmp_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "token-info.json".into());
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        fs::write(&tmp, json + "\n").map_err(|e| record_error(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| record_error(path, e))
    }

    /// Mirror the decoded remote state.
    pub fn apply_state(&mut self, program_id: Pubkey, token_data_pda: Pubkey, state: &TokenState) {
        self.program_id = Some(program_id);
        self.token_data_pda = Some(token_data_pda);
        self.mint_address = Some(state.mint);
        self.authority = Some(state.authority);
        self.name = Some(state.name.clone());
        self.symbol = Some(state.symbol.clone());
        self.decimals = Some(state.decimals);
        self.total_supply = Some(state.total_supply.to_string());
    }

    /// A `metadataUri` that is present and not blank.
    pub fn metadata_uri(&self) -> Option<&str> {
        self.metadata_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }
}

fn record_error(path: &Path, e: impl std::fmt::Display) -> ClientError {
    ClientError::Record {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}
