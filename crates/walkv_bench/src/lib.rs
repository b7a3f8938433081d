//! Benchmarks for walkv. See `benches/`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Deterministic payload of `size` bytes.
pub fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Key for slot `i`.
pub fn bench_key(i: usize) -> Vec<u8> {
    format!("bench-key-{i:08}").into_bytes()
}
