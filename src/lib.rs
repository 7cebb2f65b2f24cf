//! A single-node ledger of signed transfers sealed by proof of work.
//!
//! Transactions are signed with ed25519 wallets, batched into blocks linked by
//! SHA-256 hashes, and checked end to end by [`Ledger::is_valid`].

pub mod blockchain;
pub mod config;

pub use blockchain::{
    Address, Block, CancelToken, DigitalSignature, Ledger, LedgerError, MiningOutcome,
    Transaction, TransactionError, Wallet,
};
pub use config::{ConfigError, LedgerConfig};
