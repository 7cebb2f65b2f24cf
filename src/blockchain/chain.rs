use chrono::{TimeZone, Utc};
use log::{info, warn};
use thiserror::Error;

use super::block::{Block, CancelToken, MiningOutcome};
use super::crypto::Address;
use super::transaction::{Transaction, TransactionError};
use crate::config::LedgerConfig;

/// Previous-hash sentinel carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Reasons a transaction is refused entry to the pending pool
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Transaction must include both sender and recipient addresses")]
    MissingAddress,

    #[error("Cannot add an invalid transaction to the chain")]
    InvalidSignature,

    #[error("Transaction amount must be greater than 0, got {0}")]
    NonPositiveAmount(i64),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

/// The chain of mined blocks plus the pool of transactions waiting for the next one
#[derive(Debug, Clone)]
pub struct Ledger {
    chain: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    difficulty: usize,
    mining_reward: i64,
    parallel_mining: bool,
}

impl Ledger {
    /// Creates a ledger holding only the genesis block, with default parameters
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    /// Creates a ledger holding only the genesis block
    ///
    /// # Arguments
    ///
    /// * `config` - Difficulty, mining reward and mining strategy. Expected to
    ///   pass [`LedgerConfig::validate`].
    ///
    /// # Returns
    ///
    /// A new Ledger with an empty pending pool
    pub fn with_config(config: LedgerConfig) -> Self {
        debug_assert!(config.validate().is_ok(), "invalid ledger config {:?}", config);
        Ledger {
            chain: vec![Self::genesis_block()],
            pending_transactions: Vec::new(),
            difficulty: config.difficulty,
            mining_reward: config.mining_reward,
            parallel_mining: config.parallel_mining,
        }
    }

    /// The canonical first block. Rebuilt on every call so a tampered
    /// `chain[0]` can be detected by comparison.
    pub fn genesis_block() -> Block {
        let timestamp = Utc
            .with_ymd_and_hms(2021, 11, 1, 0, 0, 0)
            .single()
            .expect("genesis timestamp is a valid UTC time");
        Block::with_timestamp(timestamp, Vec::new(), GENESIS_PREVIOUS_HASH.to_string())
    }

    /// Gets the last block in the chain
    ///
    /// # Returns
    ///
    /// The most recently mined block, or genesis if nothing has been mined
    pub fn latest_block(&self) -> &Block {
        self.chain
            .last()
            .expect("the chain always holds the genesis block")
    }

    /// Gets the entire chain, genesis first
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn mining_reward(&self) -> i64 {
        self.mining_reward
    }

    /// Admits a signed transaction into the pending pool.
    ///
    /// The pool is left untouched on every error. Pending transactions are
    /// not checked against each other, so several of them may together
    /// spend more than the sender's confirmed balance.
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<(), LedgerError> {
        let sender = match &transaction.from_address {
            Some(sender) if !sender.is_empty() && !transaction.to_address.is_empty() => {
                sender.clone()
            }
            _ => {
                warn!("Rejected transaction without sender or recipient");
                return Err(LedgerError::MissingAddress);
            }
        };

        if !transaction.is_valid()? {
            warn!("Rejected transaction from {} with a bad signature", sender);
            return Err(LedgerError::InvalidSignature);
        }

        if transaction.amount <= 0 {
            warn!("Rejected transaction from {} for {}", sender, transaction.amount);
            return Err(LedgerError::NonPositiveAmount(transaction.amount));
        }

        let available = self.balance_of(&sender);
        if available < transaction.amount {
            warn!(
                "Rejected transaction from {}: balance {} below {}",
                sender, available, transaction.amount
            );
            return Err(LedgerError::InsufficientBalance {
                required: transaction.amount,
                available,
            });
        }

        info!(
            "Accepted transaction {} -> {} for {}",
            sender, transaction.to_address, transaction.amount
        );
        self.pending_transactions.push(transaction);
        Ok(())
    }

    /// Seals the pending pool plus a reward for `reward_address` into a new
    /// block, mines it and appends it to the chain.
    pub fn mine_pending_transactions(&mut self, reward_address: &Address) -> &Block {
        let outcome = self.mine_with(reward_address, &CancelToken::new());
        debug_assert_eq!(outcome, MiningOutcome::Mined);
        self.latest_block()
    }

    /// Like [`Ledger::mine_pending_transactions`], but gives up when `cancel`
    /// fires. A cancelled attempt leaves the chain and the pending pool as
    /// they were before the call.
    pub fn mine_pending_transactions_with_cancel(
        &mut self,
        reward_address: &Address,
        cancel: &CancelToken,
    ) -> Option<&Block> {
        match self.mine_with(reward_address, cancel) {
            MiningOutcome::Mined => Some(self.latest_block()),
            MiningOutcome::Cancelled => None,
        }
    }

    fn mine_with(&mut self, reward_address: &Address, cancel: &CancelToken) -> MiningOutcome {
        let reward = Transaction::new_reward(reward_address.clone(), self.mining_reward);

        let mut transactions = std::mem::take(&mut self.pending_transactions);
        transactions.push(reward);

        let mut block = Block::new(transactions, self.latest_block().hash.clone());
        let outcome = if self.parallel_mining {
            block.mine_parallel(self.difficulty, cancel)
        } else {
            block.mine_with_cancel(self.difficulty, cancel)
        };

        match outcome {
            MiningOutcome::Mined => {
                info!(
                    "Mined block {} with nonce {} and hash {}",
                    self.chain.len(),
                    block.nonce,
                    block.hash
                );
                self.chain.push(block);
            }
            MiningOutcome::Cancelled => {
                warn!("Mining of block {} cancelled", self.chain.len());
                block.transactions.pop();
                self.pending_transactions = block.transactions;
            }
        }

        outcome
    }

    /// Confirmed balance of `address`. Pending transactions are not counted.
    ///
    /// The sum saturates at the `i64` bounds instead of overflowing.
    pub fn balance_of(&self, address: &Address) -> i64 {
        let mut balance: i64 = 0;

        for block in &self.chain {
            for tx in &block.transactions {
                if tx.from_address.as_ref() == Some(address) {
                    balance = balance.saturating_sub(tx.amount);
                }

                if &tx.to_address == address {
                    balance = balance.saturating_add(tx.amount);
                }
            }
        }

        balance
    }

    /// Every confirmed transaction sent or received by `address`, in chain order
    pub fn transactions_for(&self, address: &Address) -> Vec<&Transaction> {
        self.chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|tx| tx.involves(address))
            .collect()
    }

    /// Checks the genesis block, every link, every signature and every stored hash
    pub fn is_valid(&self) -> bool {
        if self.chain.first() != Some(&Self::genesis_block()) {
            warn!("Genesis block does not match the canonical genesis");
            return false;
        }

        for (i, pair) in self.chain.windows(2).enumerate() {
            let (previous_block, current_block) = (&pair[0], &pair[1]);
            let index = i + 1;

            if current_block.previous_hash != previous_block.hash {
                warn!("Block {} does not link to its predecessor", index);
                return false;
            }

            if !current_block.has_valid_transactions() {
                warn!("Block {} contains an invalid transaction", index);
                return false;
            }

            if current_block.hash != current_block.calculate_hash() {
                warn!("Block {} hash does not match its contents", index);
                return false;
            }
        }

        true
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Ledger::new()
    }
}
