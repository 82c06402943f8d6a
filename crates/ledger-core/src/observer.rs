//! Fire-and-forget progress notices emitted while mining.
//!
//! Observers only watch; nothing they do feeds back into the search or the
//! choice of winner.
use crate::mine::RaceOutcome;
use tracing::{debug, info};

pub trait MiningObserver: Send + Sync {
    fn round_started(&self, _index: u64, _tx_count: usize, _previous_hash: &str) {}

    /// Called every `progress_interval` attempts of one miner's search.
    fn progress(&self, _miner: &str, _attempts: u64) {}

    fn proof_found(&self, _miner: &str, _proof: u64, _attempts: u64, _hash: &str) {}

    fn search_cancelled(&self, _miner: &str, _attempts: u64) {}

    fn round_finished(&self, _outcome: &RaceOutcome) {}
}

/// Forwards every notice to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl MiningObserver for TracingObserver {
    fn round_started(&self, index: u64, tx_count: usize, previous_hash: &str) {
        info!(index, tx_count, previous_hash, "mining round started");
    }

    fn progress(&self, miner: &str, attempts: u64) {
        debug!(miner, attempts, "still searching");
    }

    fn proof_found(&self, miner: &str, proof: u64, attempts: u64, hash: &str) {
        info!(miner, proof, attempts, hash, "valid proof found");
    }

    fn search_cancelled(&self, miner: &str, attempts: u64) {
        debug!(miner, attempts, "search cancelled");
    }

    fn round_finished(&self, outcome: &RaceOutcome) {
        info!(
            index = outcome.block.index(),
            winner = %outcome.winner,
            attempts = outcome.attempts,
            hash = %outcome.block.compute_hash(),
            "mining round finished"
        );
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl MiningObserver for NoopObserver {}
