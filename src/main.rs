use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use signed_ledger::{Address, Ledger, LedgerConfig, Transaction, Wallet};

#[derive(Parser)]
#[command(name = "signed-ledger")]
#[command(about = "Single-node signed ledger with proof-of-work mining")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new key pair
    Keygen,

    /// Mine a few blocks and transfer funds between wallets
    Demo {
        /// Hex secret key of the demo wallet (random if omitted)
        #[arg(long)]
        secret_key: Option<String>,

        /// Proof-of-work difficulty (overrides LEDGER_DIFFICULTY)
        #[arg(long)]
        difficulty: Option<usize>,

        /// Mining reward (overrides LEDGER_MINING_REWARD)
        #[arg(long)]
        reward: Option<i64>,

        /// Search nonces on all cores
        #[arg(long)]
        parallel: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    match Cli::parse().command {
        Commands::Keygen => keygen(),
        Commands::Demo {
            secret_key,
            difficulty,
            reward,
            parallel,
        } => {
            let mut config = LedgerConfig::from_env().context("reading ledger config")?;
            if let Some(difficulty) = difficulty {
                config.difficulty = difficulty;
            }
            if let Some(reward) = reward {
                config.mining_reward = reward;
            }
            if parallel {
                config.parallel_mining = true;
            }
            config.validate().context("checking command-line overrides")?;

            let wallet = match secret_key {
                Some(hex) => Wallet::from_secret_hex(&hex).context("loading secret key")?,
                None => Wallet::new(),
            };
            demo(config, &wallet)
        }
    }
}

fn keygen() -> Result<()> {
    let wallet = Wallet::new();
    println!("Public key (wallet address, safe to share):\n{}", wallet.address());
    println!("Private key (keep secret, used to sign transactions):\n{}", wallet.export_secret_hex());
    Ok(())
}

fn send(ledger: &mut Ledger, wallet: &Wallet, to: &str, amount: i64) -> Result<()> {
    let mut tx = Transaction::new(wallet.address().clone(), Address::from(to), amount);
    tx.sign(wallet)?;
    ledger.add_transaction(tx)?;
    Ok(())
}

fn demo(config: LedgerConfig, wallet: &Wallet) -> Result<()> {
    let address = wallet.address();
    info!("Wallet address: {}", address);

    let mut ledger = Ledger::with_config(config);
    info!("Balance: {}", ledger.balance_of(address));

    ledger.mine_pending_transactions(address);
    info!("Balance after first block: {}", ledger.balance_of(address));

    send(&mut ledger, wallet, "address2", 20)?;
    info!("Balance with pending transfer: {}", ledger.balance_of(address));

    ledger.mine_pending_transactions(address);
    info!("Balance after second block: {}", ledger.balance_of(address));

    send(&mut ledger, wallet, "address1", 35)?;
    ledger.mine_pending_transactions(address);
    info!("Balance after third block: {}", ledger.balance_of(address));

    info!(
        "Chain valid: {}",
        if ledger.is_valid() { "yes" } else { "no" }
    );

    let history = serde_json::to_string_pretty(&ledger.transactions_for(address))?;
    println!("{}", history);
    Ok(())
}
