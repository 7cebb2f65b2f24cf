use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::transaction::Transaction;

/// Number of attempts between progress log lines. Cancellation is polled on every attempt.
const PROGRESS_INTERVAL: u64 = 100_000;

/// Shared stop signal for a running nonce search
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of a cancellable mining attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningOutcome {
    Mined,
    Cancelled,
}

/// Represents a block in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Hash of the previous block, `"0"` for genesis
    pub previous_hash: String,

    /// Creation time. Hashed at full nanosecond precision.
    pub timestamp: DateTime<Utc>,

    /// Transactions sealed by this block, in order
    pub transactions: Vec<Transaction>,

    /// Proof of work counter
    pub nonce: u64,

    /// Hash of this block as of the last computation
    pub hash: String,
}

/// True if the first `difficulty` hex characters of `hash` are all `'0'`
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

impl Block {
    /// Creates a block stamped with the current time
    ///
    /// # Arguments
    ///
    /// * `transactions` - The transactions to seal, in order
    /// * `previous_hash` - The hash of the previous block
    ///
    /// # Returns
    ///
    /// An unmined Block with nonce 0 and its hash already computed
    pub fn new(transactions: Vec<Transaction>, previous_hash: String) -> Self {
        Self::with_timestamp(Utc::now().trunc_subsecs(3), transactions, previous_hash)
    }

    /// Creates a block with an explicit timestamp
    ///
    /// # Arguments
    ///
    /// * `timestamp` - Creation time, covered by the hash at full precision
    /// * `transactions` - The transactions to seal, in order
    /// * `previous_hash` - The hash of the previous block
    ///
    /// # Returns
    ///
    /// An unmined Block with nonce 0 and its hash already computed
    pub fn with_timestamp(
        timestamp: DateTime<Utc>,
        transactions: Vec<Transaction>,
        previous_hash: String,
    ) -> Self {
        let mut block = Block {
            previous_hash,
            timestamp,
            transactions,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Hasher primed with everything except the nonce.
    fn base_hasher(&self) -> Sha256 {
        let transactions = serde_json::to_vec(&self.transactions)
            .expect("transactions always serialize to JSON");

        let mut hasher = Sha256::new();
        hasher.update(self.previous_hash.as_bytes());
        hasher.update(
            self.timestamp
                .to_rfc3339_opts(SecondsFormat::Nanos, true)
                .as_bytes(),
        );
        hasher.update(&transactions);
        hasher
    }

    fn hash_with_nonce(base: &Sha256, nonce: u64) -> String {
        let mut hasher = base.clone();
        hasher.update(nonce.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// SHA-256 over previous hash, timestamp, serialized transactions and nonce
    pub fn calculate_hash(&self) -> String {
        Self::hash_with_nonce(&self.base_hasher(), self.nonce)
    }

    /// Increments the nonce until the hash meets `difficulty`.
    ///
    /// Runs until a nonce is found; difficulty 0 returns immediately.
    pub fn mine(&mut self, difficulty: usize) {
        // A token nobody else holds is never cancelled.
        let outcome = self.mine_with_cancel(difficulty, &CancelToken::new());
        debug_assert_eq!(outcome, MiningOutcome::Mined);
    }

    /// Same search as [`Block::mine`], polling `cancel` between attempts.
    ///
    /// On cancellation the block keeps the last nonce tried, with a hash
    /// that matches it.
    pub fn mine_with_cancel(&mut self, difficulty: usize, cancel: &CancelToken) -> MiningOutcome {
        let base = self.base_hasher();
        self.hash = Self::hash_with_nonce(&base, self.nonce);

        let mut attempts: u64 = 0;
        while !meets_difficulty(&self.hash, difficulty) {
            if cancel.is_cancelled() {
                debug!("Mining cancelled after {} attempts", attempts);
                return MiningOutcome::Cancelled;
            }

            self.nonce = self.nonce.wrapping_add(1);
            self.hash = Self::hash_with_nonce(&base, self.nonce);

            attempts += 1;
            if attempts % PROGRESS_INTERVAL == 0 {
                debug!(
                    "Mining progress: {} hashes tried (difficulty: {})",
                    attempts, difficulty
                );
            }
        }

        MiningOutcome::Mined
    }

    /// Searches nonces on the rayon thread pool.
    ///
    /// The first worker to find a valid nonce stops the others. The nonce
    /// found is not necessarily the smallest one above the current nonce.
    pub fn mine_parallel(&mut self, difficulty: usize, cancel: &CancelToken) -> MiningOutcome {
        let base = self.base_hasher();
        self.hash = Self::hash_with_nonce(&base, self.nonce);
        if meets_difficulty(&self.hash, difficulty) {
            return MiningOutcome::Mined;
        }

        let start = self.nonce.wrapping_add(1);
        let found = (start..u64::MAX).into_par_iter().find_map_any(|nonce| {
            if cancel.is_cancelled() {
                return Some(None);
            }
            let hash = Self::hash_with_nonce(&base, nonce);
            meets_difficulty(&hash, difficulty).then_some(Some((nonce, hash)))
        });

        match found {
            Some(Some((nonce, hash))) => {
                self.nonce = nonce;
                self.hash = hash;
                MiningOutcome::Mined
            }
            _ => {
                debug!("Parallel mining cancelled");
                MiningOutcome::Cancelled
            }
        }
    }

    /// True iff every transaction verifies. A transaction missing its
    /// signature counts as invalid.
    pub fn has_valid_transactions(&self) -> bool {
        self.transactions
            .iter()
            .all(|tx| tx.is_valid().unwrap_or(false))
    }
}
