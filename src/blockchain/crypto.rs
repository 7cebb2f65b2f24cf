use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

/// Errors raised by the key-pair provider
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// A wallet address: the base58 encoding of an ed25519 public key.
///
/// The same string identifies an account and verifies that account's signatures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Creates an address from a public key
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        Address(bs58::encode(public_key.as_bytes()).into_string())
    }

    /// Decodes the address back into the public key it names
    pub fn to_public_key(&self) -> Result<VerifyingKey, CryptoError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let key_bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidPublicKey("Invalid public key length".to_string())
        })?;

        VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    /// Parses a strict address, rejecting anything that is not an ed25519 public key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Address(s.to_string());
        address.to_public_key()?;
        Ok(address)
    }
}

/// A detached signature, base58 encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalSignature(pub String);

impl DigitalSignature {
    pub fn from_signature(signature: &Signature) -> Self {
        DigitalSignature(bs58::encode(signature.to_bytes()).into_string())
    }

    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let signature_bytes: [u8; 64] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidSignature("Invalid signature length".to_string())
        })?;

        Ok(Signature::from_bytes(&signature_bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An ed25519 key pair together with the address it controls
#[derive(Debug, Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn new() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(signing_key)
    }

    /// Restores a wallet from its 32-byte secret key
    pub fn from_secret_key(secret_key_bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes_array: [u8; 32] = secret_key_bytes.try_into().map_err(|_| {
            CryptoError::InvalidPrivateKey("Invalid private key length".to_string())
        })?;

        Ok(Self::from_signing_key(SigningKey::from_bytes(&bytes_array)))
    }

    /// Restores a wallet from a hex encoded secret key
    pub fn from_secret_hex(secret_key_hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(secret_key_hex.trim())
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Self::from_secret_key(&bytes)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = VerifyingKey::from(&signing_key);
        let address = Address::from_public_key(&verifying_key);

        Wallet {
            signing_key,
            verifying_key,
            address,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn public_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Signs a message with the wallet's private key
    pub fn sign(&self, message: &[u8]) -> DigitalSignature {
        DigitalSignature::from_signature(&self.signing_key.sign(message))
    }

    /// Exports the secret key as hex
    pub fn export_secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Wallet::new()
    }
}

/// Verifies a signature against a message and public key.
///
/// A well-formed signature that does not verify is `Ok(false)`; only an
/// undecodable signature is an error.
pub fn verify_signature(
    message: &[u8],
    signature: &DigitalSignature,
    public_key: &VerifyingKey,
) -> Result<bool, CryptoError> {
    let signature = signature.to_signature()?;
    Ok(public_key.verify(message, &signature).is_ok())
}
