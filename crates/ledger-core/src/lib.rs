use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod mine;
pub mod observer;

pub use chain::Ledger;
pub use config::{HashAlgorithm, MiningConfig};
pub use error::LedgerError;
pub use mine::{Miner, MinerReport, MiningRace, RaceOutcome};
pub use observer::{MiningObserver, NoopObserver, TracingObserver};
pub use pow::Difficulty;

pub type Hash = [u8; 32];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: f64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }
}

/// Text form fed into the block hash. Changing it changes every hash.
impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transaction{{sender='{}', recipient='{}', amount={}}}",
            self.sender,
            self.recipient,
            format_amount(self.amount)
        )
    }
}

const AMOUNT_DECIMALS: usize = 6;

/// Six fixed decimals, rounded half-up from the shortest decimal form of
/// `amount` (so `0.0078125` gives `0.007813`, not `0.007812`). Non-finite
/// values print as `NaN`, `Infinity` and `-Infinity`.
pub fn format_amount(amount: f64) -> String {
    if amount.is_nan() {
        return "NaN".to_string();
    }
    let sign = if amount.is_sign_negative() { "-" } else { "" };
    if amount.is_infinite() {
        return format!("{sign}Infinity");
    }

    // `Display` for f64 is the shortest round-trip form and never uses an exponent.
    let shortest = amount.abs().to_string();
    let (int_part, frac_part) = shortest.split_once('.').unwrap_or((shortest.as_str(), ""));
    let round_up = frac_part
        .as_bytes()
        .get(AMOUNT_DECIMALS)
        .is_some_and(|d| *d >= b'5');

    let mut digits: Vec<u8> = int_part.bytes().map(|b| b - b'0').collect();
    let mut frac: Vec<u8> = frac_part.bytes().map(|b| b - b'0').collect();
    frac.resize(AMOUNT_DECIMALS, 0);
    digits.extend(frac);

    if round_up {
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, 1);
                break;
            }
            i -= 1;
            if digits[i] == 9 {
                digits[i] = 0;
            } else {
                digits[i] += 1;
                break;
            }
        }
    }

    let split = digits.len() - AMOUNT_DECIMALS;
    let text: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
    format!("{sign}{}.{}", &text[..split], &text[split..])
}

/// Bracketed, comma separated list form of a transaction batch, e.g.
/// `[Transaction{...}, Transaction{...}]`, or `[]` when empty.
pub fn transactions_repr(txs: &[Transaction]) -> String {
    let items: Vec<String> = txs.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}

/// SHA-256 of `data`, rendered as 64 lowercase hex characters.
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// `index ∥ timestamp ∥ transactions ∥ previous_hash`, the proof goes last.
fn preimage_prefix(index: u64, timestamp: u64, txs: &[Transaction], previous_hash: &str) -> String {
    format!("{index}{timestamp}{}{previous_hash}", transactions_repr(txs))
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// A block whose fields are fixed but whose proof is still unknown.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
}

impl Candidate {
    /// Stamps the candidate with the current time (seconds).
    pub fn new(index: u64, transactions: Vec<Transaction>, previous_hash: impl Into<String>) -> Self {
        Self::with_timestamp(index, unix_now(), transactions, previous_hash)
    }

    pub fn with_timestamp(
        index: u64,
        timestamp: u64,
        transactions: Vec<Transaction>,
        previous_hash: impl Into<String>,
    ) -> Self {
        Self {
            index,
            timestamp,
            transactions,
            previous_hash: previous_hash.into(),
        }
    }

    pub fn genesis() -> Self {
        Self::new(
            constants::GENESIS_INDEX,
            Vec::new(),
            constants::GENESIS_PREVIOUS_HASH,
        )
    }

    /// Everything in the hash preimage except the trailing proof.
    pub fn preimage_prefix(&self) -> String {
        preimage_prefix(
            self.index,
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
        )
    }

    pub fn hash_with_proof(&self, proof: u64) -> String {
        hash_hex(format!("{}{}", self.preimage_prefix(), proof).as_bytes())
    }

    pub fn is_valid_proof(&self, proof: u64, difficulty: &Difficulty) -> bool {
        difficulty.is_met_by_hex(&self.hash_with_proof(proof))
    }

    /// Unbounded ascending search from proof 0. Blocks the calling thread.
    pub fn seal(self, difficulty: &Difficulty) -> pow::Sealed {
        pow::seal(self, difficulty)
    }

    pub fn into_block(self, proof: u64) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            transactions: self.transactions,
            previous_hash: self.previous_hash,
            proof,
        }
    }
}

/// A sealed block. Fields are read-only; the hash is always recomputed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    timestamp: u64,
    transactions: Vec<Transaction>,
    previous_hash: String,
    proof: u64,
}

impl Block {
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn proof(&self) -> u64 {
        self.proof
    }

    fn hash_with_proof(&self, proof: u64) -> String {
        let prefix = preimage_prefix(
            self.index,
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
        );
        hash_hex(format!("{prefix}{proof}").as_bytes())
    }

    pub fn compute_hash(&self) -> String {
        self.hash_with_proof(self.proof)
    }

    pub fn is_valid_proof(&self, proof: u64, difficulty: &Difficulty) -> bool {
        difficulty.is_met_by_hex(&self.hash_with_proof(proof))
    }

    /// True when the stored proof meets `difficulty`.
    pub fn is_sealed(&self, difficulty: &Difficulty) -> bool {
        self.is_valid_proof(self.proof, difficulty)
    }
}

fn abbreviate(s: &str) -> String {
    format!("{}...", s.chars().take(10).collect::<String>())
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block {} {{previousHash='{}', transactions={}, proof={}, hash='{}'}}",
            self.index,
            abbreviate(&self.previous_hash),
            self.transactions.len(),
            self.proof,
            abbreviate(&self.compute_hash())
        )
    }
}

pub mod pow {
    use super::{Block, Candidate, Hash};
    use crate::{constants::DEFAULT_DIFFICULTY_PREFIX, error::LedgerError, observer::MiningObserver};
    use sha2::{Digest, Sha256};
    use std::{
        fmt,
        sync::atomic::{AtomicBool, Ordering},
    };

    /// Required leading hex characters of a valid block hash.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Difficulty {
        prefix: String,
        nibbles: Vec<u8>,
    }

    impl Difficulty {
        /// Accepts 1..=64 lowercase hex characters.
        pub fn new(prefix: impl Into<String>) -> Result<Self, LedgerError> {
            let prefix = prefix.into();
            if prefix.is_empty() || prefix.len() > crate::constants::HASH_HEX_SIZE {
                return Err(LedgerError::config(format!(
                    "difficulty prefix must be 1 to {} hex characters, got {}",
                    crate::constants::HASH_HEX_SIZE,
                    prefix.len()
                )));
            }
            let nibbles = prefix
                .chars()
                .map(|c| match c {
                    '0'..='9' | 'a'..='f' => c.to_digit(16).map(|d| d as u8),
                    _ => None,
                })
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(|| {
                    LedgerError::config(format!(
                        "difficulty prefix `{prefix}` is not lowercase hex"
                    ))
                })?;
            Ok(Self { prefix, nibbles })
        }

        /// `zeros` leading zero hex characters.
        pub fn zeros(zeros: usize) -> Result<Self, LedgerError> {
            Self::new("0".repeat(zeros))
        }

        pub fn prefix(&self) -> &str {
            &self.prefix
        }

        pub fn is_met_by_hex(&self, hash: &str) -> bool {
            hash.starts_with(&self.prefix)
        }

        /// Nibble-wise prefix check on a raw digest; no hex encoding.
        pub fn is_met_by(&self, digest: &Hash) -> bool {
            self.nibbles.iter().enumerate().all(|(i, want)| {
                let byte = digest[i / 2];
                let got = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
                got == *want
            })
        }
    }

    impl Default for Difficulty {
        fn default() -> Self {
            Self {
                prefix: DEFAULT_DIFFICULTY_PREFIX.to_string(),
                nibbles: vec![0; DEFAULT_DIFFICULTY_PREFIX.len()],
            }
        }
    }

    impl fmt::Display for Difficulty {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.prefix)
        }
    }

    /// Hashes `prefix ∥ proof` for many proofs, reusing the absorbed prefix.
    pub struct ProofHasher {
        base: Sha256,
    }

    impl ProofHasher {
        pub fn new(candidate: &Candidate) -> Self {
            let mut base = Sha256::new();
            base.update(candidate.preimage_prefix().as_bytes());
            Self { base }
        }

        pub fn digest(&self, proof: u64) -> Hash {
            let mut hasher = self.base.clone();
            hasher.update(proof.to_string().as_bytes());
            let digest = hasher.finalize();
            let mut out = [0u8; 32];
            out.copy_from_slice(&digest[..]);
            out
        }
    }

    /// A block together with the number of hashes it took to seal it.
    #[derive(Clone, Debug, PartialEq)]
    pub struct Sealed {
        pub block: Block,
        pub attempts: u64,
    }

    #[derive(Clone, Debug, PartialEq)]
    pub enum SearchOutcome {
        Sealed(Sealed),
        Cancelled { attempts: u64 },
    }

    /// Cancellation and telemetry hooks for one miner's search.
    pub struct SearchControl<'a> {
        pub miner: &'a str,
        pub cancel: &'a AtomicBool,
        pub check_interval: u64,
        pub progress_interval: u64,
        pub observer: &'a dyn MiningObserver,
    }

    pub fn seal(candidate: Candidate, difficulty: &Difficulty) -> Sealed {
        let hasher = ProofHasher::new(&candidate);
        let mut proof: u64 = 0;
        loop {
            if difficulty.is_met_by(&hasher.digest(proof)) {
                return Sealed {
                    block: candidate.into_block(proof),
                    attempts: proof + 1,
                };
            }
            proof = proof.wrapping_add(1);
        }
    }

    /// Ascending search from proof 0 that reads `control.cancel` every
    /// `check_interval` attempts, starting before the first one.
    pub fn search(
        candidate: Candidate,
        difficulty: &Difficulty,
        control: &SearchControl<'_>,
    ) -> SearchOutcome {
        let hasher = ProofHasher::new(&candidate);
        let check_interval = control.check_interval.max(1);
        let progress_interval = control.progress_interval.max(1);
        let mut proof: u64 = 0;
        loop {
            if proof % check_interval == 0 && control.cancel.load(Ordering::Acquire) {
                return SearchOutcome::Cancelled { attempts: proof };
            }
            let attempts = proof + 1;
            if difficulty.is_met_by(&hasher.digest(proof)) {
                return SearchOutcome::Sealed(Sealed {
                    block: candidate.into_block(proof),
                    attempts,
                });
            }
            if attempts % progress_interval == 0 {
                control.observer.progress(control.miner, attempts);
            }
            proof = proof.wrapping_add(1);
        }
    }
}
