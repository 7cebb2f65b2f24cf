use proptest::prelude::*;
use signed_ledger::blockchain::block::meets_difficulty;
use signed_ledger::{
    Address, Block, Ledger, LedgerConfig, LedgerError, Transaction, TransactionError, Wallet,
};

fn signed(from: &Wallet, to: &Address, amount: i64) -> Transaction {
    let mut tx = Transaction::new(from.address().clone(), to.clone(), amount);
    tx.sign(from).unwrap();
    tx
}

#[test]
fn reference_scenario() {
    let wallet = Wallet::new();
    let me = wallet.address();
    let mut ledger = Ledger::new();

    assert_eq!(ledger.balance_of(me), 0);

    ledger.mine_pending_transactions(me);
    assert_eq!(ledger.balance_of(me), 85);

    ledger
        .add_transaction(signed(&wallet, &Address::from("address2"), 20))
        .unwrap();
    assert_eq!(ledger.balance_of(me), 85);

    ledger.mine_pending_transactions(me);
    assert_eq!(ledger.balance_of(me), 150);

    ledger
        .add_transaction(signed(&wallet, &Address::from("address1"), 35))
        .unwrap();
    ledger.mine_pending_transactions(me);

    assert_eq!(ledger.balance_of(me), 200);
    assert_eq!(ledger.balance_of(&Address::from("address2")), 20);
    assert_eq!(ledger.balance_of(&Address::from("address1")), 35);
    assert_eq!(ledger.chain().len(), 4);
    assert_eq!(ledger.transactions_for(me).len(), 5);
    assert!(ledger.is_valid());

    for block in &ledger.chain()[1..] {
        assert!(block.hash.starts_with("00"));
    }
}

#[test]
fn rejected_transactions_leave_pool_untouched() {
    let wallet = Wallet::new();
    let stranger = Wallet::new();
    let mut ledger = Ledger::with_config(LedgerConfig::new().with_difficulty(1));
    ledger.mine_pending_transactions(wallet.address());

    let to = Address::from("address2");
    let cases = vec![
        (signed(&wallet, &to, 0), LedgerError::NonPositiveAmount(0)),
        (signed(&wallet, &to, -1), LedgerError::NonPositiveAmount(-1)),
        (
            signed(&stranger, &to, 10),
            LedgerError::InsufficientBalance {
                required: 10,
                available: 0,
            },
        ),
        (
            Transaction::new(wallet.address().clone(), to.clone(), 10),
            LedgerError::Transaction(TransactionError::MissingSignature),
        ),
        (Transaction::new_reward(to.clone(), 10), LedgerError::MissingAddress),
    ];

    for (tx, expected) in cases {
        assert_eq!(ledger.add_transaction(tx), Err(expected));
        assert!(ledger.pending_transactions().is_empty());
    }
}

#[test]
fn ledger_is_single_owner_and_clonable_for_inspection() {
    let wallet = Wallet::new();
    let mut ledger = Ledger::with_config(LedgerConfig::new().with_difficulty(1));
    ledger.mine_pending_transactions(wallet.address());

    let snapshot = ledger.clone();
    ledger.mine_pending_transactions(wallet.address());

    assert_eq!(snapshot.chain().len(), 2);
    assert_eq!(ledger.chain().len(), 3);
    assert_eq!(&ledger.chain()[..2], snapshot.chain());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn mined_hash_meets_difficulty(difficulty in 0usize..=3, amount in 1i64..1_000) {
        let mut block = Block::new(
            vec![Transaction::new_reward(Address::from("miner"), amount)],
            "previous".to_string(),
        );
        block.mine(difficulty);

        prop_assert!(meets_difficulty(&block.hash, difficulty));
        prop_assert!(block.hash.chars().take(difficulty).all(|c| c == '0'));
        prop_assert_eq!(block.hash.clone(), block.calculate_hash());
    }

    #[test]
    fn signature_tracks_amount(amount in 1i64..1_000_000, delta in 1i64..1_000) {
        let wallet = Wallet::new();
        let tx = signed(&wallet, &Address::from("address2"), amount);
        prop_assert_eq!(tx.is_valid(), Ok(true));

        let mut tampered = tx.clone();
        tampered.amount = amount + delta;
        prop_assert_eq!(tampered.is_valid(), Ok(false));
    }
}
