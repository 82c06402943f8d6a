mod constants;

use anyhow::{Context, Result};
use clap::Parser;
use constants::{DEFAULT_MINERS, DEMO_ROUNDS};
use ledger_core::{Difficulty, HashAlgorithm, Ledger, MiningConfig, Transaction};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ledger-node")]
#[command(about = "Simulates miners racing to seal blocks on an in-memory chain")]
struct Args {
    /// Comma separated miner names
    #[arg(long, default_value = DEFAULT_MINERS, value_delimiter = ',')]
    miners: Vec<String>,

    /// Required leading hex characters of every block hash
    #[arg(long, default_value = "0000")]
    difficulty: String,

    /// Block hash algorithm (only sha256 is supported)
    #[arg(long, default_value = "sha256")]
    hash_algorithm: String,

    /// Attempts between checks of the round's cancellation flag
    #[arg(long, default_value_t = ledger_core::constants::CANCEL_CHECK_INTERVAL)]
    check_interval: u64,

    /// Attempts between progress notices
    #[arg(long, default_value_t = ledger_core::constants::PROGRESS_INTERVAL)]
    progress_interval: u64,

    /// Print the final chain as JSON instead of one line per block
    #[arg(long)]
    json: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn mining_config(&self) -> Result<MiningConfig> {
        let algorithm: HashAlgorithm = self
            .hash_algorithm
            .parse()
            .context("invalid --hash-algorithm")?;
        let difficulty = Difficulty::new(self.difficulty.as_str()).context("invalid --difficulty")?;
        let config = MiningConfig {
            difficulty,
            algorithm,
            cancel_check_interval: self.check_interval,
            progress_interval: self.progress_interval,
        };
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("invalid --log-level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.mining_config()?;
    info!(difficulty = %config.difficulty, algorithm = %config.algorithm, "starting ledger");
    let ledger = Ledger::new(config)?;

    for name in args.miners.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        ledger.register_miner(name);
    }

    for (round, batch) in DEMO_ROUNDS.iter().enumerate() {
        info!(round = round + 1, "=== mining round ===");
        for (sender, recipient, amount) in batch.iter() {
            ledger.submit(Transaction::new(*sender, *recipient, *amount));
        }
        match ledger.mine_pending()? {
            Some(outcome) => info!(
                index = outcome.block.index(),
                winner = %outcome.winner,
                attempts = outcome.attempts,
                "round won"
            ),
            None => info!("round skipped, pool was empty"),
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ledger.chain())?);
    } else {
        println!("\nFull chain:");
        print!("{ledger}");
    }

    ledger.verify().context("chain verification failed")?;
    info!(blocks = ledger.len(), "chain verified");
    Ok(())
}
