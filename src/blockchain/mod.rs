// Blockchain module
//
// This module contains the ledger implementation:
// - Block structure and proof of work
// - Ledger (chain, pending pool, balances, validation)
// - Transaction structure
// - Key pairs, addresses and signatures

pub mod block;
pub mod chain;
pub mod crypto;
pub mod transaction;

// Re-export main components for easier access
pub use block::{Block, CancelToken, MiningOutcome};
pub use chain::{Ledger, LedgerError};
pub use crypto::{Address, DigitalSignature, Wallet};
pub use transaction::{Transaction, TransactionError};
