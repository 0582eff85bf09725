//! Performance benchmarks for the Axolotl ratchet and its primitives.
//!
//! Run with: `cargo bench -p cadet-crypto`

use cadet_crypto::random::SecureRng;
use cadet_crypto::{AxolotlConfig, AxolotlState, DhKeyPair};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand_core::OsRng;
use std::hint::black_box;

fn paired_states() -> (AxolotlState, AxolotlState) {
    let rk = [7u8; 32];
    let alice_dhrs = DhKeyPair::generate(OsRng);
    let bob_dhrs = DhKeyPair::generate(OsRng);
    let alice_pub = alice_dhrs.public();
    let bob_pub = bob_dhrs.public();

    let chain_a = [1u8; 32];
    let chain_b = [2u8; 32];
    let hk_a = [3u8; 32];
    let hk_b = [4u8; 32];

    let alice = AxolotlState::new(
        rk,
        chain_a,
        chain_b,
        hk_a,
        hk_b,
        [5u8; 32],
        [6u8; 32],
        alice_dhrs,
        Some(bob_pub),
        AxolotlConfig::default(),
        0,
    );
    let bob = AxolotlState::new(
        rk,
        chain_b,
        chain_a,
        hk_b,
        hk_a,
        [6u8; 32],
        [5u8; 32],
        bob_dhrs,
        Some(alice_pub),
        AxolotlConfig::default(),
        0,
    );
    (alice, bob)
}

fn bench_ratchet_encrypt(c: &mut Criterion) {
    let mut group = c.benchmark_group("ratchet_encrypt");

    for size in [64, 256, 1024, 4096] {
        let plaintext = vec![0xAAu8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter_batched(
                paired_states,
                |(mut alice, _bob)| black_box(alice.encrypt(black_box(&plaintext), 0)),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_ratchet_decrypt(c: &mut Criterion) {
    let mut group = c.benchmark_group("ratchet_decrypt");

    for size in [64, 256, 1024, 4096] {
        let plaintext = vec![0xBBu8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter_batched(
                || {
                    let (mut alice, bob) = paired_states();
                    let frame = alice.encrypt(&plaintext, 0);
                    (bob, frame)
                },
                |(mut bob, frame)| black_box(bob.decrypt(black_box(&frame)).unwrap()),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_ratchet_roundtrip_1k(c: &mut Criterion) {
    let plaintext = vec![0xCCu8; 1024];

    c.bench_function("ratchet_roundtrip_1k", |b| {
        b.iter_batched(
            paired_states,
            |(mut alice, mut bob)| {
                let frame = alice.encrypt(black_box(&plaintext), 0);
                black_box(bob.decrypt(black_box(&frame)).unwrap())
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_x25519_exchange(c: &mut Criterion) {
    let alice = DhKeyPair::generate(SecureRng::new());
    let bob = DhKeyPair::generate(SecureRng::new());
    let bob_public = bob.public();

    c.bench_function("x25519_diffie_hellman", |b| {
        b.iter(|| alice.diffie_hellman(black_box(&bob_public)))
    });
}

fn bench_kdf(c: &mut Criterion) {
    use cadet_crypto::hash::{hmac_hash, kdf};

    let key = [0x42u8; 32];

    c.bench_function("hmac_hash", |b| {
        b.iter(|| hmac_hash(black_box(&key), black_box(b"axolotl ratchet")))
    });

    c.bench_function("kdf_three_subkeys", |b| {
        let ikm = hmac_hash(&key, b"dh output");
        b.iter(|| {
            let out: [[u8; 32]; 3] = kdf(black_box("axolotl ratchet"), black_box(&key), black_box(&ikm));
            black_box(out)
        })
    });
}

criterion_group!(
    ratchet_benches,
    bench_ratchet_encrypt,
    bench_ratchet_decrypt,
    bench_ratchet_roundtrip_1k,
);
criterion_group!(primitive_benches, bench_x25519_exchange, bench_kdf);

criterion_main!(ratchet_benches, primitive_benches);
