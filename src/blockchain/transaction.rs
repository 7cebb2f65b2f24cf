use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::crypto::{verify_signature, Address, DigitalSignature, Wallet};

/// Errors that can occur during transaction operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Wallet {signer} cannot sign transactions sent from {sender}")]
    UnauthorizedSigner { signer: String, sender: String },

    #[error("No signature in this transaction")]
    MissingSignature,
}

/// A transfer of `amount` from one address to another.
///
/// A transaction without a sender is a mining reward minted by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender's address, `None` for a mining reward
    pub from_address: Option<Address>,

    /// Recipient's address
    pub to_address: Address,

    /// Amount being transferred
    pub amount: i64,

    /// Creation time. Hashed at full nanosecond precision.
    pub timestamp: DateTime<Utc>,

    /// Signature over `calculate_hash()` by the sender's key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<DigitalSignature>,
}

impl Transaction {
    /// Creates a new unsigned transaction
    ///
    /// # Arguments
    ///
    /// * `from_address` - The sender, whose wallet must sign the transaction
    /// * `to_address` - The recipient
    /// * `amount` - The amount to transfer
    ///
    /// # Returns
    ///
    /// A new Transaction stamped with the current time and no signature
    pub fn new(from_address: Address, to_address: Address, amount: i64) -> Self {
        Transaction {
            from_address: Some(from_address),
            to_address,
            amount,
            timestamp: Utc::now().trunc_subsecs(3),
            signature: None,
        }
    }

    /// Creates a reward transaction paying `amount` to `to_address`
    pub fn new_reward(to_address: Address, amount: i64) -> Self {
        Transaction {
            from_address: None,
            to_address,
            amount,
            timestamp: Utc::now().trunc_subsecs(3),
            signature: None,
        }
    }

    pub fn is_reward(&self) -> bool {
        self.from_address.is_none()
    }

    /// Returns true if `address` sends or receives this transaction
    pub fn involves(&self, address: &Address) -> bool {
        self.from_address.as_ref() == Some(address) || &self.to_address == address
    }

    /// The bytes covered by the content hash.
    ///
    /// Fields are written in a fixed order, each prefixed by its length, so
    /// two different field tuples never produce the same byte string.
    fn hash_bytes(&self) -> Vec<u8> {
        let from = self.from_address.as_ref().map(Address::as_str).unwrap_or("");
        let to = self.to_address.as_str();
        let timestamp = self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true);

        let mut bytes =
            Vec::with_capacity(8 + from.len() + 8 + to.len() + 8 + 8 + timestamp.len());
        bytes.extend_from_slice(&(from.len() as u64).to_le_bytes());
        bytes.extend_from_slice(from.as_bytes());
        bytes.extend_from_slice(&(to.len() as u64).to_le_bytes());
        bytes.extend_from_slice(to.as_bytes());
        bytes.extend_from_slice(&self.amount.to_le_bytes());
        bytes.extend_from_slice(&(timestamp.len() as u64).to_le_bytes());
        bytes.extend_from_slice(timestamp.as_bytes());
        bytes
    }

    /// SHA-256 of the transaction content, hex encoded. The signature is not covered.
    pub fn calculate_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.hash_bytes());
        hex::encode(hasher.finalize())
    }

    /// Signs the transaction with `wallet`, which must own `from_address`.
    pub fn sign(&mut self, wallet: &Wallet) -> Result<(), TransactionError> {
        if self.from_address.as_ref() != Some(wallet.address()) {
            return Err(TransactionError::UnauthorizedSigner {
                signer: wallet.address().to_string(),
                sender: self
                    .from_address
                    .as_ref()
                    .map(Address::to_string)
                    .unwrap_or_default(),
            });
        }

        let hash = self.calculate_hash();
        self.signature = Some(wallet.sign(hash.as_bytes()));
        Ok(())
    }

    /// Checks the signature against the sender's address.
    ///
    /// Rewards are always valid. A sender-bearing transaction without a
    /// signature is malformed and returns `MissingSignature`; a signature
    /// that is present but does not verify returns `Ok(false)`.
    pub fn is_valid(&self) -> Result<bool, TransactionError> {
        let from_address = match &self.from_address {
            None => return Ok(true),
            Some(address) => address,
        };

        let signature = match &self.signature {
            Some(signature) if !signature.is_empty() => signature,
            _ => return Err(TransactionError::MissingSignature),
        };

        let public_key = match from_address.to_public_key() {
            Ok(key) => key,
            Err(err) => {
                debug!("Sender {} is not a usable public key: {}", from_address, err);
                return Ok(false);
            }
        };

        let hash = self.calculate_hash();
        match verify_signature(hash.as_bytes(), signature, &public_key) {
            Ok(valid) => Ok(valid),
            Err(err) => {
                debug!("Undecodable signature on transaction {}: {}", hash, err);
                Ok(false)
            }
        }
    }
}
