//! Ed25519 signing identities in the Solana CLI file format.
//!
//! A keypair file is a JSON array of 64 numbers: the 32-byte secret seed
//! followed by the 32-byte public key. Secret bytes pass through
//! [`Zeroizing`] buffers so they do not linger after parsing.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::address::Pubkey;
use crate::error::SolError;

/// A 64-byte Ed25519 transaction signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Signature {
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        self.0
    }

    /// Verify this signature over `message` against `pubkey`.
    pub fn verify(&self, pubkey: &Pubkey, message: &[u8]) -> bool {
        let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(pubkey.as_bytes()) else {
            return false;
        };
        key.verify_strict(message, &ed25519_dalek::Signature::from_bytes(&self.0))
            .is_ok()
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl FromStr for Signature {
    type Err = SolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| SolError::SerializationError(format!("signature base58: {e}")))?;
        let arr: [u8; 64] = bytes.try_into().map_err(|v: Vec<u8>| {
            SolError::SerializationError(format!("expected 64 signature bytes, got {}", v.len()))
        })?;
        Ok(Self(arr))
    }
}

/// A local signing identity.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS random number generator.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Build a keypair from a 32-byte secret seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Build a keypair from the 64-byte `secret || public` encoding.
    ///
    /// The public half must match the secret half.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, SolError> {
        let arr: Zeroizing<[u8; 64]> = Zeroizing::new(bytes.try_into().map_err(|_| {
            SolError::InvalidPrivateKey(format!("expected 64 bytes, got {}", bytes.len()))
        })?);

        let signing_key = SigningKey::from_keypair_bytes(&arr)
            .map_err(|e| SolError::InvalidPrivateKey(format!("public key mismatch: {e}")))?;

        Ok(Self { signing_key })
    }

    /// The 64-byte `secret || public` encoding.
    pub fn to_keypair_bytes(&self) -> Zeroizing<[u8; 64]> {
        Zeroizing::new(self.signing_key.to_keypair_bytes())
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey::new(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }

    /// Read a Solana CLI keypair file.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, SolError> {
        let path = path.as_ref();
        let file_err = |reason: String| SolError::KeypairFile {
            path: path.display().to_string(),
            reason,
        };

        let contents = Zeroizing::new(fs::read_to_string(path).map_err(|e| file_err(e.to_string()))?);
        let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
            serde_json::from_str(&contents).map_err(|e| file_err(format!("invalid JSON: {e}")))?,
        );

        Self::from_keypair_bytes(&bytes).map_err(|e| file_err(e.to_string()))
    }

    /// Write this keypair as a Solana CLI keypair file, replacing any
    /// existing file. On Unix the file is created owner-readable only.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SolError> {
        let path = path.as_ref();
        let file_err = |reason: String| SolError::KeypairFile {
            path: path.display().to_string(),
            reason,
        };

        let bytes = self.to_keypair_bytes();
        let json = Zeroizing::new(
            serde_json::to_string(&bytes.to_vec()).map_err(|e| file_err(e.to_string()))?,
        );

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path).map_err(|e| file_err(e.to_string()))?;
        file.write_all(json.as_bytes())
            .map_err(|e| file_err(e.to_string()))?;

        Ok(())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}
