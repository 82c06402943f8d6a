pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const DEFAULT_DIFFICULTY_PREFIX: &str = "0000";
pub const GENESIS_PREVIOUS_HASH: &str = "0";
pub const GENESIS_INDEX: u64 = 0;
/// Attempts between two reads of the shared cancellation flag.
pub const CANCEL_CHECK_INTERVAL: u64 = 1_024;
/// Attempts between two progress notices.
pub const PROGRESS_INTERVAL: u64 = 100_000;
