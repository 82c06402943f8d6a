pub(crate) const DEFAULT_MINERS: &str = "miner-a,miner-b,miner-c";

/// (sender, recipient, amount) batches mined one round each.
pub(crate) const DEMO_ROUNDS: &[&[(&str, &str, f64)]] = &[
    &[("Alice", "Bob", 50.0), ("Bob", "Charlie", 30.0)],
    &[
        ("Charlie", "David", 20.0),
        ("David", "Alice", 15.0),
        ("Alice", "Eve", 25.0),
    ],
    &[],
];
