use crate::{
    config::MiningConfig,
    constants::{GENESIS_INDEX, GENESIS_PREVIOUS_HASH},
    error::LedgerError,
    mine::{Miner, MiningRace, RaceOutcome},
    observer::{MiningObserver, TracingObserver},
    Block, Candidate, Transaction,
};
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};
use tracing::{info, warn};

/// In-memory chain plus the pool of transactions waiting for a block.
///
/// `submit` may be called from any thread while a round is running; rounds
/// themselves are serialised.
pub struct Ledger {
    chain: RwLock<Vec<Block>>,
    pending: Mutex<Vec<Transaction>>,
    miners: RwLock<Vec<Miner>>,
    round: Mutex<()>,
    race: MiningRace,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Ledger {
    /// Validates `config` and seals the genesis block with its difficulty.
    pub fn new(config: MiningConfig) -> Result<Self, LedgerError> {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    pub fn with_observer(
        config: MiningConfig,
        observer: Arc<dyn MiningObserver>,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        let genesis = Candidate::genesis().seal(&config.difficulty);
        info!(
            proof = genesis.block.proof(),
            attempts = genesis.attempts,
            hash = %genesis.block.compute_hash(),
            algorithm = %config.algorithm,
            "genesis block sealed"
        );
        Ok(Self {
            chain: RwLock::new(vec![genesis.block]),
            pending: Mutex::new(Vec::new()),
            miners: RwLock::new(Vec::new()),
            round: Mutex::new(()),
            race: MiningRace::new(config).with_observer(observer),
        })
    }

    pub fn config(&self) -> &MiningConfig {
        self.race.config()
    }

    pub fn register_miner(&self, name: impl Into<String>) -> Miner {
        let miner = Miner::new(name);
        info!(miner = miner.name(), "miner joined");
        self.miners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(miner.clone());
        miner
    }

    pub fn miners(&self) -> Vec<Miner> {
        self.miners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Queues a transaction for the next round. Never fails.
    pub fn submit(&self, tx: Transaction) {
        let mut pending = lock(&self.pending);
        pending.push(tx);
        info!(pending = pending.len(), "transaction queued");
    }

    pub fn pending(&self) -> Vec<Transaction> {
        lock(&self.pending).clone()
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Runs a round with the registered miners.
    pub fn mine_pending(&self) -> Result<Option<RaceOutcome>, LedgerError> {
        let miners = self.miners();
        self.run_mining_round(&miners)
    }

    /// Seals the current pending batch into one new block.
    ///
    /// Returns `Ok(None)` when there is nothing pending. Transactions that
    /// arrive while the race runs are left for the next round.
    pub fn run_mining_round(&self, miners: &[Miner]) -> Result<Option<RaceOutcome>, LedgerError> {
        let _round = lock(&self.round);

        let snapshot = lock(&self.pending).clone();
        if snapshot.is_empty() {
            info!("no pending transactions, nothing to mine");
            return Ok(None);
        }
        let tip = self.tip()?;
        let index = tip.index() + 1;

        let outcome = self
            .race
            .run(index, &snapshot, &tip.compute_hash(), miners)?;

        self.chain
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome.block.clone());
        lock(&self.pending).drain(..snapshot.len());

        info!(
            index,
            winner = %outcome.winner,
            txs = snapshot.len(),
            still_pending = self.pending_len(),
            "block appended"
        );
        Ok(Some(outcome))
    }

    pub fn tip(&self) -> Result<Block, LedgerError> {
        self.chain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
            .ok_or_else(|| LedgerError::invariant("chain is empty, genesis missing"))
    }

    pub fn chain(&self) -> Vec<Block> {
        self.chain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.chain.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Never true for a constructed ledger; genesis is always present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walks the chain checking indices, genesis shape, linkage and proofs.
    pub fn verify(&self) -> Result<(), LedgerError> {
        verify_chain(&self.chain(), self.config())
    }

    pub fn is_valid(&self) -> bool {
        match self.verify() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "chain failed verification");
                false
            }
        }
    }
}

pub fn verify_chain(chain: &[Block], config: &MiningConfig) -> Result<(), LedgerError> {
    let genesis = chain
        .first()
        .ok_or_else(|| LedgerError::invariant("chain is empty, genesis missing"))?;
    if genesis.index() != GENESIS_INDEX
        || genesis.previous_hash() != GENESIS_PREVIOUS_HASH
        || !genesis.transactions().is_empty()
    {
        return Err(LedgerError::invariant("malformed genesis block"));
    }

    for (i, block) in chain.iter().enumerate() {
        if block.index() != i as u64 {
            return Err(LedgerError::invariant(format!(
                "block at position {i} has index {}",
                block.index()
            )));
        }
        if !block.is_sealed(&config.difficulty) {
            return Err(LedgerError::invariant(format!(
                "block {i} hash does not meet difficulty {}",
                config.difficulty
            )));
        }
        if i > 0 {
            let expected = chain[i - 1].compute_hash();
            if block.previous_hash() != expected {
                return Err(LedgerError::invariant(format!(
                    "block {i} links to {} but block {} hashes to {expected}",
                    block.previous_hash(),
                    i - 1
                )));
            }
        }
    }
    Ok(())
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in self.chain() {
            writeln!(f, "{block}")?;
        }
        Ok(())
    }
}
