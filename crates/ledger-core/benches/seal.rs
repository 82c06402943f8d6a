use criterion::{criterion_group, criterion_main, Criterion};
use ledger_core::{
    pow::{self, ProofHasher},
    Candidate, Difficulty, Transaction,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn batch() -> Vec<Transaction> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..10)
        .map(|i| Transaction::new(format!("alice-{i}"), "bob", rng.gen_range(1..10) as f64))
        .collect()
}

fn bench_seal(c: &mut Criterion) {
    let candidate = Candidate::with_timestamp(1, 1_600_000_000, batch(), "0");

    c.bench_function("seal_prefix_000", |b| {
        let difficulty = Difficulty::zeros(3).unwrap();
        b.iter(|| {
            let _sealed = pow::seal(candidate.clone(), &difficulty);
        });
    });

    c.bench_function("proof_hasher_digest", |b| {
        let hasher = ProofHasher::new(&candidate);
        let mut proof = 0u64;
        b.iter(|| {
            proof += 1;
            hasher.digest(proof)
        });
    });
}

criterion_group!(benches, bench_seal);
criterion_main!(benches);
