use crate::{
    config::MiningConfig,
    error::LedgerError,
    observer::{MiningObserver, TracingObserver},
    pow::{self, SearchControl, SearchOutcome},
    Block, Candidate, Transaction,
};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
};
use tracing::{debug, info};

/// A named competitor. Holds no state beyond its name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Miner {
    name: String,
}

impl Miner {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Miner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// How far one miner got in a round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MinerReport {
    pub miner: String,
    pub attempts: u64,
    pub won: bool,
    /// Stopped by the round's flag before finding a proof.
    pub cancelled: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RaceOutcome {
    pub block: Block,
    pub winner: String,
    /// Hashes the winner evaluated.
    pub attempts: u64,
    /// One entry per miner, in the order the miners were given.
    pub reports: Vec<MinerReport>,
}

struct Win {
    block: Block,
    miner: String,
    attempts: u64,
}

/// Runs one competitive search over a fixed transaction snapshot.
pub struct MiningRace {
    config: MiningConfig,
    observer: Arc<dyn MiningObserver>,
    pool: Mutex<Option<Arc<ThreadPool>>>,
}

impl MiningRace {
    pub fn new(config: MiningConfig) -> Self {
        Self {
            config,
            observer: Arc::new(TracingObserver),
            pool: Mutex::new(None),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn MiningObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// One thread per miner. The pool is kept across rounds and rebuilt only
    /// when the miner count changes.
    pub(crate) fn pool_for(&self, miners: usize) -> Result<Arc<ThreadPool>, LedgerError> {
        let mut cached = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pool) = cached.as_ref().filter(|p| p.current_num_threads() == miners) {
            return Ok(Arc::clone(pool));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(miners)
            .thread_name(|i| format!("miner-{i}"))
            .build()
            .map(Arc::new)
            .map_err(|e| LedgerError::config(format!("cannot start miner threads: {e}")))?;
        debug!(miners, "miner thread pool built");
        *cached = Some(Arc::clone(&pool));
        Ok(pool)
    }

    /// Starts one search per miner on its own pool thread. Every miner builds
    /// its own candidate, so siblings carry their own timestamps. The first
    /// miner to flip the shared flag wins; the others stop at their next
    /// cancellation check. Returns once every search has stopped.
    pub fn run(
        &self,
        index: u64,
        transactions: &[Transaction],
        previous_hash: &str,
        miners: &[Miner],
    ) -> Result<RaceOutcome, LedgerError> {
        self.run_with_stop(index, transactions, previous_hash, miners, &AtomicBool::new(false))
    }

    /// `run` against a caller-owned stop flag. Whoever wins flips it; if it is
    /// already set, every search stops at once and there is no winner.
    pub(crate) fn run_with_stop(
        &self,
        index: u64,
        transactions: &[Transaction],
        previous_hash: &str,
        miners: &[Miner],
        won: &AtomicBool,
    ) -> Result<RaceOutcome, LedgerError> {
        if miners.is_empty() {
            return Err(LedgerError::config("a mining race needs at least one miner"));
        }
        self.config.validate()?;
        let pool = self.pool_for(miners.len())?;

        let observer = self.observer.as_ref();
        let difficulty = &self.config.difficulty;
        let check_interval = self.config.cancel_check_interval;
        let progress_interval = self.config.progress_interval;

        observer.round_started(index, transactions.len(), previous_hash);
        info!(
            index,
            miners = miners.len(),
            difficulty = %difficulty,
            "starting mining race"
        );

        let win: Mutex<Option<Win>> = Mutex::new(None);
        let reports: Mutex<Vec<Option<MinerReport>>> = Mutex::new(vec![None; miners.len()]);

        pool.scope(|s| {
            for (slot, miner) in miners.iter().enumerate() {
                let (win, reports) = (&win, &reports);
                s.spawn(move |_| {
                    let candidate = Candidate::new(index, transactions.to_vec(), previous_hash);
                    let control = SearchControl {
                        miner: miner.name(),
                        cancel: won,
                        check_interval,
                        progress_interval,
                        observer,
                    };
                    let report = match pow::search(candidate, difficulty, &control) {
                        SearchOutcome::Sealed(sealed) => {
                            let claimed = won
                                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                                .is_ok();
                            let attempts = sealed.attempts;
                            if claimed {
                                observer.proof_found(
                                    miner.name(),
                                    sealed.block.proof(),
                                    attempts,
                                    &sealed.block.compute_hash(),
                                );
                                *win.lock().unwrap_or_else(PoisonError::into_inner) = Some(Win {
                                    block: sealed.block,
                                    miner: miner.name().to_string(),
                                    attempts,
                                });
                            } else {
                                debug!(miner = miner.name(), attempts, "late proof discarded");
                            }
                            MinerReport {
                                miner: miner.name().to_string(),
                                attempts,
                                won: claimed,
                                cancelled: false,
                            }
                        }
                        SearchOutcome::Cancelled { attempts } => {
                            observer.search_cancelled(miner.name(), attempts);
                            MinerReport {
                                miner: miner.name().to_string(),
                                attempts,
                                won: false,
                                cancelled: true,
                            }
                        }
                    };
                    reports.lock().unwrap_or_else(PoisonError::into_inner)[slot] = Some(report);
                });
            }
        });

        let Win {
            block,
            miner,
            attempts,
        } = win
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .ok_or_else(|| LedgerError::invariant("mining race ended without a winner"))?;
        let reports = reports
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .flatten()
            .collect();

        let outcome = RaceOutcome {
            block,
            winner: miner,
            attempts,
            reports,
        };
        observer.round_finished(&outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{observer::NoopObserver, pow::Difficulty};
    use std::sync::atomic::AtomicUsize;

    fn race(prefix: &str) -> MiningRace {
        let config = MiningConfig {
            cancel_check_interval: 8,
            ..MiningConfig::with_difficulty(Difficulty::new(prefix).unwrap())
        };
        MiningRace::new(config).with_observer(Arc::new(NoopObserver))
    }

    fn miners(n: usize) -> Vec<Miner> {
        (0..n).map(|i| Miner::new(format!("miner-{i}"))).collect()
    }

    fn txs() -> Vec<Transaction> {
        vec![
            Transaction::new("Alice", "Bob", 50.0),
            Transaction::new("Bob", "Charlie", 30.0),
        ]
    }

    #[derive(Default)]
    struct Counting {
        started: AtomicUsize,
        found: AtomicUsize,
        cancelled: AtomicUsize,
        finished: AtomicUsize,
    }

    impl MiningObserver for Counting {
        fn round_started(&self, _: u64, _: usize, _: &str) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn proof_found(&self, _: &str, _: u64, _: u64, _: &str) {
            self.found.fetch_add(1, Ordering::SeqCst);
        }
        fn search_cancelled(&self, _: &str, _: u64) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
        fn round_finished(&self, _: &RaceOutcome) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn empty_miner_set_is_a_configuration_error() {
        let err = race("00").run(1, &txs(), "0", &[]).unwrap_err();
        assert!(matches!(err, LedgerError::Configuration(_)));
    }

    #[test]
    fn invalid_config_is_rejected_before_mining() {
        let race = MiningRace::new(MiningConfig {
            cancel_check_interval: 0,
            ..MiningConfig::default()
        });
        let err = race.run(1, &txs(), "0", &miners(2)).unwrap_err();
        assert!(matches!(err, LedgerError::Configuration(_)));
    }

    #[test]
    fn single_miner_wins_alone() {
        let outcome = race("000").run(1, &txs(), "abc", &miners(1)).unwrap();
        assert_eq!(outcome.winner, "miner-0");
        assert_eq!(outcome.reports.len(), 1);
        assert!(outcome.reports[0].won);
        assert_eq!(outcome.attempts, outcome.block.proof() + 1);
        assert!(outcome.block.is_sealed(&Difficulty::zeros(3).unwrap()));
    }

    #[test]
    fn exactly_one_winner_among_many() {
        let miners = miners(4);
        let outcome = race("000").run(7, &txs(), "prev", &miners).unwrap();
        let winners: Vec<_> = outcome.reports.iter().filter(|r| r.won).collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].miner, outcome.winner);
        let order: Vec<_> = outcome.reports.iter().map(|r| r.miner.as_str()).collect();
        assert_eq!(order, ["miner-0", "miner-1", "miner-2", "miner-3"]);

        let block = &outcome.block;
        assert_eq!(block.index(), 7);
        assert_eq!(block.previous_hash(), "prev");
        assert_eq!(block.transactions(), txs().as_slice());
        assert!(block.compute_hash().starts_with("000"));
    }

    #[test]
    fn observer_sees_one_round_and_one_winner() {
        let counting = Arc::new(Counting::default());
        let race = race("000").with_observer(counting.clone());
        let outcome = race.run(1, &txs(), "0", &miners(3)).unwrap();
        assert_eq!(counting.started.load(Ordering::SeqCst), 1);
        assert_eq!(counting.found.load(Ordering::SeqCst), 1);
        assert_eq!(counting.finished.load(Ordering::SeqCst), 1);
        let cancelled = outcome.reports.iter().filter(|r| r.cancelled).count();
        assert_eq!(counting.cancelled.load(Ordering::SeqCst), cancelled);
        assert!(outcome.reports.iter().all(|r| !(r.won && r.cancelled)));
    }

    #[test]
    fn raised_stop_flag_reaches_every_miner() {
        let counting = Arc::new(Counting::default());
        let race = race("0000").with_observer(counting.clone());
        let stop = AtomicBool::new(true);
        let err = race
            .run_with_stop(1, &txs(), "0", &miners(3), &stop)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvariantViolation(_)));
        assert_eq!(counting.cancelled.load(Ordering::SeqCst), 3);
        assert_eq!(counting.found.load(Ordering::SeqCst), 0);
        assert_eq!(counting.finished.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn winner_raises_the_stop_flag() {
        let stop = AtomicBool::new(false);
        race("00").run_with_stop(1, &txs(), "0", &miners(2), &stop).unwrap();
        assert!(stop.load(Ordering::SeqCst));
    }

    #[test]
    fn pool_is_reused_until_miner_count_changes() {
        let race = race("00");
        let first = race.pool_for(2).unwrap();
        let again = race.pool_for(2).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        let wider = race.pool_for(3).unwrap();
        assert!(!Arc::ptr_eq(&first, &wider));
        assert_eq!(wider.current_num_threads(), 3);

        race.run(1, &txs(), "0", &miners(3)).unwrap();
        assert!(Arc::ptr_eq(&wider, &race.pool_for(3).unwrap()));
    }

    #[test]
    fn miner_display_is_its_name() {
        assert_eq!(Miner::new("矿工A").to_string(), "矿工A");
    }
}
