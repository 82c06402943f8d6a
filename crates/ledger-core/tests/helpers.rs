#![allow(dead_code)]

use ledger_core::{Difficulty, Ledger, Miner, MiningConfig, NoopObserver, Transaction};
use rand::Rng;
use std::sync::Arc;

/// Ledger with a cheap difficulty and silent telemetry.
pub fn quiet_ledger(zeros: usize) -> Ledger {
    let config = MiningConfig {
        cancel_check_interval: 16,
        ..MiningConfig::with_difficulty(Difficulty::zeros(zeros).expect("valid difficulty"))
    };
    Ledger::with_observer(config, Arc::new(NoopObserver)).expect("ledger should start")
}

pub fn miners(names: &[&str]) -> Vec<Miner> {
    names.iter().map(|n| Miner::new(*n)).collect()
}

pub fn random_batch(len: usize) -> Vec<Transaction> {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|i| {
            Transaction::new(
                format!("sender-{i}"),
                format!("recipient-{}", rng.gen_range(0..100)),
                rng.gen_range(1..10_000) as f64 / 100.0,
            )
        })
        .collect()
}
